//! Side-effect free observation of a target's power state.

use tracing::{debug, warn};

use crate::backend::ControlPlane;
use crate::context::OperationContext;
use crate::error::TransitionError;
use crate::state::{PowerState, classify_status_codes};
use crate::target::TargetId;

/// Observes the target's power state.
///
/// Returns `Ok(None)` when the control plane reports no power-state code.
///
/// # Errors
///
/// Returns [`TransitionError::ProbeUnavailable`] when the backend call fails,
/// [`TransitionError::UnrecognizedState`] when the status list carries more
/// than one power state, and [`TransitionError::Interrupted`] when the context
/// fires first.
pub async fn observe<C>(
    control_plane: &C,
    ctx: &OperationContext,
    target: &TargetId,
) -> Result<Option<PowerState>, TransitionError<C::Error>>
where
    C: ControlPlane,
{
    let codes = ctx
        .run(control_plane.observe_state(target))
        .await
        .map_err(TransitionError::interrupted)?
        .map_err(|source| TransitionError::ProbeUnavailable { source })?;
    let state = classify_status_codes(&codes)?;
    debug!(resource = %target, ?codes, ?state, "observed power state");
    Ok(state)
}

/// Observes the target, assuming it runs when no power state is reported.
///
/// A silent status list is what control planes return for targets that were
/// never powered off, so `running` is the safe reading for shutdown paths.
///
/// # Errors
///
/// Propagates the errors of [`observe`].
pub async fn observe_assuming_running<C>(
    control_plane: &C,
    ctx: &OperationContext,
    target: &TargetId,
) -> Result<PowerState, TransitionError<C::Error>>
where
    C: ControlPlane,
{
    if let Some(state) = observe(control_plane, ctx, target).await? {
        return Ok(state);
    }
    warn!(resource = %target, "no power state reported; assuming running");
    Ok(PowerState::Running)
}
