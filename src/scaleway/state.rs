//! Maps Scaleway server states onto power-state codes.

use crate::state::{PowerState, power_state_code};

/// Translates the `state` field of a Scaleway server into a power state.
///
/// `stopped in place` keeps the allocation and maps to `stopped`; a plain
/// `stopped` server has released its resources and maps to `deallocated`.
/// Anything else is read as a bare power-state token, so unfamiliar states
/// classify as unknown.
#[must_use]
pub fn power_state_for(server_state: &str) -> PowerState {
    let normalised = server_state.trim().to_ascii_lowercase();
    match normalised.as_str() {
        "running" => PowerState::Running,
        "starting" => PowerState::Starting,
        "stopping" => PowerState::Stopping,
        "stopped in place" => PowerState::Stopped,
        "stopped" => PowerState::Deallocated,
        other => PowerState::from_token(other),
    }
}

/// Translates the `state` field of a Scaleway server into a power-state
/// status code.
#[must_use]
pub fn status_code_for(server_state: &str) -> String {
    power_state_code(&power_state_for(server_state))
}
