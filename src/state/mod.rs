//! Normalised power/lifecycle states observed on a remote instance.
//!
//! The control plane reports a list of free-form status codes. Only codes
//! carrying the `powerstate/` prefix describe the power state; everything
//! else (for example `provisioningstate/succeeded`) is ignored.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Prefix marking a status code as a power-state report.
pub const POWER_STATE_PREFIX: &str = "powerstate/";

/// Normalised power state of a target.
///
/// Known tokens map to dedicated variants so that matches stay exhaustive.
/// Anything else the backend invents is carried verbatim in
/// [`PowerState::Unknown`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum PowerState {
    /// The target is booting.
    Starting,
    /// The target is powered on.
    Running,
    /// The target is shutting down but keeps its compute allocation.
    Stopping,
    /// The target is powered off with its compute allocation retained.
    Stopped,
    /// The target is releasing its compute allocation.
    Deallocating,
    /// The target is powered off and its compute allocation is released.
    Deallocated,
    /// A power-state token this crate does not recognise.
    Unknown(String),
}

impl PowerState {
    /// Returns `true` for states that are mid-change.
    #[must_use]
    pub const fn is_transitional(&self) -> bool {
        matches!(self, Self::Starting | Self::Stopping | Self::Deallocating)
    }

    /// Returns `true` for states a transition can end in.
    #[must_use]
    pub const fn is_steady(&self) -> bool {
        matches!(self, Self::Running | Self::Stopped | Self::Deallocated)
    }

    /// Returns the steady state a transitional state settles into.
    ///
    /// Steady and unknown states are returned unchanged.
    #[must_use]
    pub fn settled(&self) -> Self {
        match self {
            Self::Starting => Self::Running,
            Self::Stopping => Self::Stopped,
            Self::Deallocating => Self::Deallocated,
            other => other.clone(),
        }
    }

    /// Returns the lower-case token for this state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Deallocating => "deallocating",
            Self::Deallocated => "deallocated",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    /// Normalises a bare token (without the `powerstate/` prefix).
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        let normalised = token.trim().to_ascii_lowercase();
        match normalised.as_str() {
            "starting" => Self::Starting,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "deallocating" => Self::Deallocating,
            "deallocated" => Self::Deallocated,
            _ => Self::Unknown(normalised),
        }
    }
}

impl FromStr for PowerState {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_token(value))
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a status list carries more than one power-state code.
///
/// Scanning order would otherwise decide which code wins, so the scan refuses
/// to pick one.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("status list reports {count} power states: {codes:?}", count = .codes.len())]
pub struct AmbiguousPowerState {
    /// Every power-state code found, in backend order.
    pub codes: Vec<String>,
}

/// Extracts the single power state from a backend status list.
///
/// Returns `Ok(None)` when no code carries the power-state prefix.
///
/// # Errors
///
/// Returns [`AmbiguousPowerState`] when more than one power-state code is
/// present.
pub fn classify_status_codes<I, S>(codes: I) -> Result<Option<PowerState>, AmbiguousPowerState>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let power_codes: Vec<String> = codes
        .into_iter()
        .map(|code| code.as_ref().trim().to_ascii_lowercase())
        .filter(|code| code.starts_with(POWER_STATE_PREFIX))
        .collect();

    if power_codes.len() > 1 {
        return Err(AmbiguousPowerState { codes: power_codes });
    }

    Ok(power_codes
        .first()
        .map(|code| PowerState::from_token(code.trim_start_matches(POWER_STATE_PREFIX))))
}

/// Formats a state as a backend power-state code.
#[must_use]
pub fn power_state_code(state: &PowerState) -> String {
    format!("{POWER_STATE_PREFIX}{state}")
}

#[cfg(test)]
mod tests;
