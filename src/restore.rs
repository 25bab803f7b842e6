//! Restoration of a target's pre-mutation power state.

use tracing::info;

use crate::backend::ControlPlane;
use crate::context::OperationContext;
use crate::error::TransitionError;
use crate::execute::execute;
use crate::plan::{TransitionPlan, plan};
use crate::probe::observe_assuming_running;
use crate::state::PowerState;
use crate::target::TargetId;

/// What restoration had to do.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Restoration {
    /// The target already matched its snapshot.
    NotNeeded,
    /// The plan that brought the target back.
    Restored(TransitionPlan),
}

/// Drives `target` back to the state captured in `snapshot`.
///
/// A transitional snapshot is restored to the steady state it would have
/// settled in, so the snapshot's own in-flight command is never re-issued.
/// The current state is re-probed rather than inferred from the transition
/// that ran before the mutation.
///
/// # Errors
///
/// Returns [`TransitionError`] when probing, planning or any restoring
/// command fails, or when the context fires mid-way.
pub async fn restore<C>(
    control_plane: &C,
    ctx: &OperationContext,
    target: &TargetId,
    snapshot: &PowerState,
) -> Result<Restoration, TransitionError<C::Error>>
where
    C: ControlPlane,
{
    let desired = snapshot.settled();
    let current = observe_assuming_running(control_plane, ctx, target).await?;
    let planned = plan(&current, &desired)?;
    if planned.plan.is_empty() {
        return Ok(Restoration::NotNeeded);
    }

    info!(resource = %target, %snapshot, %current, plan = %planned.plan, "restoring original power state");
    execute(control_plane, ctx, target, &planned.plan).await?;
    Ok(Restoration::Restored(planned.plan))
}
