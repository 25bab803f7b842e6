//! Error taxonomy of the orchestration core.
//!
//! Each enum is generic over the control plane's error so callers keep the
//! provider's own error, including whether it is transient.

use thiserror::Error;

use crate::backend::Transience;
use crate::context::Interrupted;
use crate::orchestrator::RestorationOutcome;
use crate::plan::{PlanError, Step};
use crate::state::AmbiguousPowerState;

/// Errors raised while observing, planning or executing a transition.
#[derive(Debug, Error)]
pub enum TransitionError<E>
where
    E: std::error::Error + 'static,
{
    /// The probe call to the control plane failed.
    #[error("failed to observe target state: {source}")]
    ProbeUnavailable {
        /// Control-plane error.
        #[source]
        source: E,
    },
    /// The control plane reported a state that cannot be classified.
    #[error("unrecognised target state: {detail}")]
    UnrecognizedState {
        /// Description of the offending report.
        detail: String,
    },
    /// A planned command did not complete.
    #[error("transition step `{failed}` failed after {} completed step(s): {source}", .completed.len())]
    TransitionFailed {
        /// Steps confirmed before the failure, in order.
        completed: Vec<Step>,
        /// Step whose command failed.
        failed: Step,
        /// Control-plane error.
        #[source]
        source: E,
    },
    /// The operation was cancelled or ran out of time mid-sequence.
    #[error("transition interrupted after {} completed step(s): {reason}", .completed.len())]
    Interrupted {
        /// Step in flight when the interruption fired, if any.
        step: Option<Step>,
        /// Steps confirmed before the interruption, in order.
        completed: Vec<Step>,
        /// Why the operation stopped.
        #[source]
        reason: Interrupted,
    },
}

impl<E> TransitionError<E>
where
    E: std::error::Error + 'static,
{
    /// Wraps an interruption that fired outside of any command.
    #[must_use]
    pub const fn interrupted(reason: Interrupted) -> Self {
        Self::Interrupted {
            step: None,
            completed: Vec::new(),
            reason,
        }
    }

    /// Returns `true` for cancellation or deadline expiry.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// Steps that completed before the error, when known.
    #[must_use]
    pub fn completed_steps(&self) -> &[Step] {
        match self {
            Self::TransitionFailed { completed, .. } | Self::Interrupted { completed, .. } => {
                completed
            }
            Self::ProbeUnavailable { .. } | Self::UnrecognizedState { .. } => &[],
        }
    }
}

impl<E> TransitionError<E>
where
    E: std::error::Error + Transience + 'static,
{
    /// Returns `true` when the wrapped control-plane error is transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ProbeUnavailable { source } | Self::TransitionFailed { source, .. } => {
                source.is_transient()
            }
            Self::UnrecognizedState { .. } | Self::Interrupted { .. } => false,
        }
    }
}

impl<E> From<PlanError> for TransitionError<E>
where
    E: std::error::Error + 'static,
{
    fn from(value: PlanError) -> Self {
        Self::UnrecognizedState {
            detail: value.to_string(),
        }
    }
}

impl<E> From<AmbiguousPowerState> for TransitionError<E>
where
    E: std::error::Error + 'static,
{
    fn from(value: AmbiguousPowerState) -> Self {
        Self::UnrecognizedState {
            detail: value.to_string(),
        }
    }
}

/// Errors raised by a gated mutation.
#[derive(Debug, Error)]
pub enum GateError<E, M>
where
    E: std::error::Error + 'static,
    M: std::error::Error + 'static,
{
    /// The precondition state could not be reached, so the mutation never ran.
    #[error("precondition not reached: {0}")]
    Precondition(#[source] TransitionError<E>),
    /// The mutation failed. Restoration was still attempted and its outcome
    /// is kept alongside the mutation error.
    #[error("mutation failed: {source}{note}", note = restoration_note(.restoration))]
    MutationFailed {
        /// Error returned by the mutation.
        #[source]
        source: M,
        /// Outcome of the best-effort restoration.
        restoration: RestorationOutcome<E>,
    },
    /// The mutation succeeded but the original state was not restored.
    #[error("mutation succeeded but restoring the original state failed: {source}")]
    RestorationFailed {
        /// Restoration error.
        #[source]
        source: TransitionError<E>,
    },
    /// Restoration was cancelled; the target's state is undefined and needs
    /// manual intervention.
    #[error("restoration interrupted, target state needs manual attention: {source}")]
    RestorationInterrupted {
        /// Interruption raised while restoring.
        #[source]
        source: TransitionError<E>,
    },
}

impl<E, M> GateError<E, M>
where
    E: std::error::Error + Transience + 'static,
    M: std::error::Error + Transience + 'static,
{
    /// Returns `true` when the surfaced error is transient.
    ///
    /// For a failed mutation this reflects the mutation's own error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Precondition(source)
            | Self::RestorationFailed { source }
            | Self::RestorationInterrupted { source } => source.is_transient(),
            Self::MutationFailed { source, .. } => source.is_transient(),
        }
    }
}

fn restoration_note<E>(restoration: &RestorationOutcome<E>) -> String
where
    E: std::error::Error + 'static,
{
    match restoration {
        RestorationOutcome::NotRequired => String::new(),
        RestorationOutcome::Restored(_) => String::from(" (original state restored)"),
        RestorationOutcome::Failed(err) => format!("; restoration also failed: {err}"),
    }
}

/// Errors raised by the convergence poller.
#[derive(Debug, Error)]
pub enum PollError<E>
where
    E: std::error::Error + 'static,
{
    /// Waiting requires a deadline on the operation context.
    #[error("convergence wait requires an operation deadline")]
    MissingDeadline,
    /// The caller-supplied probe failed.
    #[error("convergence probe failed: {source}")]
    Probe {
        /// Probe error.
        #[source]
        source: E,
    },
    /// The probe reported a state in neither the pending nor the target set.
    #[error("unexpected state `{state}` while waiting for {target}")]
    UnexpectedState {
        /// State reported by the probe.
        state: String,
        /// Comma-separated target states.
        target: String,
    },
    /// The deadline elapsed before the target state was seen often enough.
    #[error(
        "timed out waiting for convergence after {consecutive}/{required} consecutive target observation(s){last}",
        last = last_state_note(.last_state.as_deref())
    )]
    Timeout {
        /// Last state seen by the probe, if any.
        last_state: Option<String>,
        /// Consecutive target observations at expiry.
        consecutive: u32,
        /// Consecutive target observations required.
        required: u32,
    },
    /// The operation was cancelled while waiting.
    #[error("convergence wait interrupted: {0}")]
    Interrupted(#[source] Interrupted),
}

impl<E> PollError<E>
where
    E: std::error::Error + Transience + 'static,
{
    /// Returns `true` when the probe failure is transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Probe { source } => source.is_transient(),
            _ => false,
        }
    }
}

fn last_state_note(last_state: Option<&str>) -> String {
    last_state
        .map(|state| format!(", last state `{state}`"))
        .unwrap_or_default()
}
