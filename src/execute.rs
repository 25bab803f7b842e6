//! Sequential execution of a transition plan.

use tracing::info;

use crate::backend::{BackendFuture, ControlPlane};
use crate::context::OperationContext;
use crate::error::TransitionError;
use crate::plan::{Command, Step, TransitionPlan};
use crate::target::TargetId;

/// Steps confirmed by the control plane during one execution.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Execution {
    /// Confirmed steps, in order.
    pub completed: Vec<Step>,
}

impl Execution {
    /// Returns `true` when at least one command ran, which means the target's
    /// original state has to be restored.
    #[must_use]
    pub const fn occurred(&self) -> bool {
        !self.completed.is_empty()
    }
}

/// Issues a single command through the control plane.
pub fn issue<'a, C>(
    control_plane: &'a C,
    ctx: &'a OperationContext,
    target: &'a TargetId,
    command: Command,
) -> BackendFuture<'a, (), C::Error>
where
    C: ControlPlane,
{
    match command {
        Command::Start => control_plane.start(ctx, target),
        Command::PowerOff { force } => control_plane.stop(ctx, target, force),
        Command::Deallocate { hibernate } => control_plane.deallocate(ctx, target, hibernate),
    }
}

/// Runs every step of `plan`, waiting for each to be confirmed before the
/// next one is issued.
///
/// An empty plan issues nothing and reports that no transition occurred.
///
/// # Errors
///
/// Returns [`TransitionError::TransitionFailed`] carrying the confirmed steps
/// when a command fails, or [`TransitionError::Interrupted`] when the context
/// is cancelled or expires mid-sequence. Nothing is rolled back.
pub async fn execute<C>(
    control_plane: &C,
    ctx: &OperationContext,
    target: &TargetId,
    plan: &TransitionPlan,
) -> Result<Execution, TransitionError<C::Error>>
where
    C: ControlPlane,
{
    let mut completed = Vec::with_capacity(plan.len());
    for step in plan.steps() {
        info!(resource = %target, command = %step.command, expect = %step.expect, "issuing transition");
        let outcome = match ctx.run(issue(control_plane, ctx, target, step.command)).await {
            Ok(outcome) => outcome,
            Err(reason) => {
                return Err(TransitionError::Interrupted {
                    step: Some(step.clone()),
                    completed,
                    reason,
                });
            }
        };
        if let Err(source) = outcome {
            return Err(TransitionError::TransitionFailed {
                completed,
                failed: step.clone(),
                source,
            });
        }
        completed.push(step.clone());
    }
    Ok(Execution { completed })
}
