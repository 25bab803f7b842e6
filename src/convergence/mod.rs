//! Bounded polling until a read path converges.
//!
//! The poller repeatedly calls a caller-supplied probe and classifies each
//! result against a pending set and a target set. Success requires the target
//! state to be seen a configured number of times in a row, which damps
//! flapping list reads. Any other state resets the streak, and a state in
//! neither set fails immediately.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::backend::{ControlPlane, ListFilter};
use crate::context::{Interrupted, OperationContext};
use crate::error::PollError;
use crate::state::{PowerState, classify_status_codes};
use crate::target::TargetId;

/// Probe result meaning the resource is still listed.
pub const EXISTS: &str = "exists";
/// Probe result meaning the resource is no longer listed.
pub const NOT_FOUND: &str = "not found";

const KNOWN_POWER_STATES: [&str; 6] = [
    "starting",
    "running",
    "stopping",
    "stopped",
    "deallocating",
    "deallocated",
];

/// How long to sleep between probes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollCadence {
    /// Constant interval.
    Fixed(Duration),
    /// Doubling interval bounded by `min` and `max`. The wait grows while the
    /// target has not been seen and holds steady while it keeps re-occurring.
    Backoff {
        /// First and smallest wait.
        min: Duration,
        /// Largest wait.
        max: Duration,
    },
}

impl PollCadence {
    const fn initial(self) -> Duration {
        match self {
            Self::Fixed(interval) => interval,
            Self::Backoff { min, .. } => min,
        }
    }

    fn next(self, current: Duration, consecutive: u32) -> Duration {
        match self {
            Self::Fixed(interval) => interval,
            Self::Backoff { min, max } => {
                let grown = if consecutive == 0 {
                    current.saturating_mul(2)
                } else {
                    current
                };
                grown.max(min).min(max)
            }
        }
    }
}

/// Caller-supplied polling parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollSettings {
    /// Interval between probes.
    pub interval: Duration,
    /// Consecutive target observations required for success.
    pub continuous_target_occurrence: u32,
}

/// Everything one wait needs except the deadline, which comes from the
/// [`OperationContext`].
#[derive(Clone, Debug)]
pub struct PollDescriptor<P> {
    pending: BTreeSet<String>,
    target: BTreeSet<String>,
    probe: P,
    cadence: PollCadence,
    continuous_target_occurrence: u32,
    initial_delay: Duration,
}

impl<P> PollDescriptor<P> {
    /// Builds a descriptor polling `probe` every `interval` until a single
    /// target observation.
    pub fn new<I, J, S, T>(pending: I, target: J, probe: P, interval: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            probe,
            cadence: PollCadence::Fixed(interval),
            continuous_target_occurrence: 1,
            initial_delay: Duration::ZERO,
        }
    }

    /// Replaces the cadence.
    #[must_use]
    pub const fn with_cadence(mut self, cadence: PollCadence) -> Self {
        self.cadence = cadence;
        self
    }

    /// Requires `count` consecutive target observations. Zero is treated as
    /// one.
    #[must_use]
    pub fn with_continuous_target_occurrence(mut self, count: u32) -> Self {
        self.continuous_target_occurrence = count.max(1);
        self
    }

    /// Sleeps `delay` before the first probe.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Applies caller-supplied settings.
    #[must_use]
    pub fn with_settings(self, settings: PollSettings) -> Self {
        self.with_cadence(PollCadence::Fixed(settings.interval))
            .with_continuous_target_occurrence(settings.continuous_target_occurrence)
    }

    fn target_label(&self) -> String {
        self.target
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Polls until the descriptor's target state has been observed often enough.
///
/// Returns the target state that ended the wait.
///
/// # Errors
///
/// Returns [`PollError::MissingDeadline`] when `ctx` has no deadline,
/// [`PollError::Probe`] when the probe fails, [`PollError::UnexpectedState`]
/// for a state in neither set (unless the pending set is empty),
/// [`PollError::Timeout`] when the deadline passes first, and
/// [`PollError::Interrupted`] on cancellation.
pub async fn wait_for<P, Fut, E>(
    ctx: &OperationContext,
    mut descriptor: PollDescriptor<P>,
) -> Result<String, PollError<E>>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<String, E>>,
    E: std::error::Error + 'static,
{
    if ctx.deadline().is_none() {
        return Err(PollError::MissingDeadline);
    }
    let required = descriptor.continuous_target_occurrence;
    let mut consecutive = 0_u32;
    let mut last_state: Option<String> = None;
    let mut wait = descriptor.cadence.initial();

    if !descriptor.initial_delay.is_zero() {
        pause(ctx, descriptor.initial_delay, None, 0, required).await?;
    }

    loop {
        let state = match ctx.run((descriptor.probe)()).await {
            Ok(result) => result.map_err(|source| PollError::Probe { source })?,
            Err(reason) => return Err(interruption(reason, last_state, consecutive, required)),
        };

        if descriptor.target.contains(&state) {
            consecutive += 1;
            debug!(%state, consecutive, required, "target state observed");
            if consecutive >= required {
                return Ok(state);
            }
        } else if descriptor.pending.is_empty() || descriptor.pending.contains(&state) {
            debug!(%state, "still pending");
            consecutive = 0;
        } else {
            return Err(PollError::UnexpectedState {
                state,
                target: descriptor.target_label(),
            });
        }

        last_state = Some(state);
        wait = descriptor.cadence.next(wait, consecutive);
        pause(ctx, wait, last_state.as_deref(), consecutive, required).await?;
    }
}

async fn pause<E>(
    ctx: &OperationContext,
    wait: Duration,
    last_state: Option<&str>,
    consecutive: u32,
    required: u32,
) -> Result<(), PollError<E>>
where
    E: std::error::Error + 'static,
{
    ctx.run(tokio::time::sleep(wait)).await.map_err(|reason| {
        interruption(reason, last_state.map(str::to_owned), consecutive, required)
    })
}

fn interruption<E>(
    reason: Interrupted,
    last_state: Option<String>,
    consecutive: u32,
    required: u32,
) -> PollError<E>
where
    E: std::error::Error + 'static,
{
    match reason {
        Interrupted::DeadlineExceeded => PollError::Timeout {
            last_state,
            consecutive,
            required,
        },
        Interrupted::Cancelled => PollError::Interrupted(reason),
    }
}

/// Waits until `id` disappears from the listing selected by `filter`.
///
/// # Errors
///
/// Propagates [`wait_for`] errors, with listing failures reported as
/// [`PollError::Probe`].
pub async fn wait_until_absent<C>(
    control_plane: &C,
    ctx: &OperationContext,
    filter: &ListFilter,
    id: &TargetId,
    settings: PollSettings,
) -> Result<(), PollError<C::Error>>
where
    C: ControlPlane,
{
    let probe = || {
        let listing = control_plane.list_by_scope(filter);
        async move {
            let listed = listing.await?;
            let state = if listed.iter().any(|resource| &resource.id == id) {
                EXISTS
            } else {
                NOT_FOUND
            };
            Ok::<String, C::Error>(state.to_owned())
        }
    };
    let descriptor = PollDescriptor::new([EXISTS], [NOT_FOUND], probe, settings.interval)
        .with_settings(settings);
    wait_for(ctx, descriptor).await.map(|_| ())
}

/// Waits until the target reports `expected` as its power state after an
/// action issued from `from`.
///
/// Transitional states count as pending, and so does `from` while the
/// provider has not yet picked the action up. Any other settled state means
/// the action went elsewhere and fails the wait at once. Unknown, ambiguous
/// or missing power states fail the wait as well.
///
/// # Errors
///
/// Propagates [`wait_for`] errors.
pub async fn wait_for_power_state<C>(
    control_plane: &C,
    ctx: &OperationContext,
    target: &TargetId,
    from: &PowerState,
    expected: &PowerState,
    settings: PollSettings,
) -> Result<(), PollError<C::Error>>
where
    C: ControlPlane,
{
    let pending = KNOWN_POWER_STATES.into_iter().filter(|token| {
        let state = PowerState::from_token(token);
        state != *expected && (state.is_transitional() || state == *from)
    });

    let probe = || {
        let observation = control_plane.observe_state(target);
        async move {
            let codes = observation.await?;
            let state = match classify_status_codes(&codes) {
                Ok(Some(state)) => state.as_str().to_owned(),
                Ok(None) => String::from("unreported"),
                Err(ambiguous) => ambiguous.to_string(),
            };
            Ok::<String, C::Error>(state)
        }
    };
    let descriptor = PollDescriptor::new(pending, [expected.as_str()], probe, settings.interval)
        .with_settings(settings);
    wait_for(ctx, descriptor).await.map(|_| ())
}
