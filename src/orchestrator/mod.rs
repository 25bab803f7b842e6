//! Gated mutation workflow.
//!
//! [`Orchestrator::mutate`] takes the mutation gate, snapshots the target's
//! power state, transitions it to the mutation's precondition, runs the
//! mutation and finally restores the snapshot. The mutation's own outcome and
//! the restoration outcome are reported side by side in a [`MutationReport`].

use std::future::Future;

use tracing::{debug, info, warn};

use crate::backend::ControlPlane;
use crate::context::OperationContext;
use crate::error::{GateError, TransitionError};
use crate::execute::{Execution, execute};
use crate::gate::LockRegistry;
use crate::plan::{TransitionPlan, choose_precondition, plan};
use crate::probe::{observe, observe_assuming_running};
use crate::restore::{Restoration, restore};
use crate::state::PowerState;
use crate::target::TargetId;

/// When the mutation gate is released during a gated mutation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ReleasePolicy {
    /// Hold the gate until restoration completes.
    #[default]
    HoldThroughRestore,
    /// Release the gate before the mutation runs when no transition was
    /// needed, so independent mutations of an already-prepared target do not
    /// queue behind each other. The gate is still held through restoration
    /// whenever a transition ran.
    ReleaseWhenSatisfied,
}

/// Outcome of the restoration phase.
#[derive(Debug)]
pub enum RestorationOutcome<E>
where
    E: std::error::Error + 'static,
{
    /// No transition ran, so nothing had to be restored.
    NotRequired,
    /// The original state was restored with this plan. The plan is empty when
    /// the target already matched its snapshot.
    Restored(TransitionPlan),
    /// Restoration failed.
    Failed(TransitionError<E>),
}

impl<E> RestorationOutcome<E>
where
    E: std::error::Error + 'static,
{
    /// Returns `true` when restoration failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Side-by-side result of a gated mutation.
#[derive(Debug)]
pub struct MutationReport<T, M, E>
where
    E: std::error::Error + 'static,
{
    /// Result returned by the mutation.
    pub mutation: Result<T, M>,
    /// State observed before any transition.
    pub snapshot: PowerState,
    /// `true` when a transition ran before the mutation.
    pub transitioned: bool,
    /// Outcome of the restoration phase.
    pub restoration: RestorationOutcome<E>,
}

impl<T, M, E> MutationReport<T, M, E>
where
    E: std::error::Error + 'static,
    M: std::error::Error + 'static,
{
    /// Collapses the report into a single result.
    ///
    /// A mutation failure wins over a restoration failure but keeps the
    /// restoration outcome attached.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::MutationFailed`] when the mutation failed,
    /// [`GateError::RestorationInterrupted`] when restoration was cancelled,
    /// and [`GateError::RestorationFailed`] for any other restoration error.
    pub fn into_result(self) -> Result<T, GateError<E, M>> {
        match (self.mutation, self.restoration) {
            (Err(source), restoration) => Err(GateError::MutationFailed {
                source,
                restoration,
            }),
            (Ok(_), RestorationOutcome::Failed(source)) if source.is_interrupted() => {
                Err(GateError::RestorationInterrupted { source })
            }
            (Ok(_), RestorationOutcome::Failed(source)) => {
                Err(GateError::RestorationFailed { source })
            }
            (Ok(value), RestorationOutcome::NotRequired | RestorationOutcome::Restored(_)) => {
                Ok(value)
            }
        }
    }
}

/// Runs precondition-gated mutations against one control plane.
#[derive(Clone, Debug)]
pub struct Orchestrator<C> {
    control_plane: C,
    locks: LockRegistry,
    release_policy: ReleasePolicy,
}

impl<C> Orchestrator<C>
where
    C: ControlPlane,
{
    /// Creates an orchestrator sharing `locks` with other call sites.
    #[must_use]
    pub const fn new(control_plane: C, locks: LockRegistry) -> Self {
        Self {
            control_plane,
            locks,
            release_policy: ReleasePolicy::HoldThroughRestore,
        }
    }

    /// Overrides when the gate is released.
    #[must_use]
    pub const fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }

    /// Control plane used for every call.
    #[must_use]
    pub const fn control_plane(&self) -> &C {
        &self.control_plane
    }

    /// Lock registry guarding the targets.
    #[must_use]
    pub const fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// Observes the target without taking the gate.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the probe fails or the status list is
    /// ambiguous.
    pub async fn observe(
        &self,
        ctx: &OperationContext,
        target: &TargetId,
    ) -> Result<Option<PowerState>, TransitionError<C::Error>> {
        observe(&self.control_plane, ctx, target).await
    }

    /// Drives the target to `desired` under the gate, without restoring it
    /// afterwards. Used for manual intervention after an interrupted
    /// restoration.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the gate cannot be acquired or any
    /// step fails.
    pub async fn ensure_state(
        &self,
        ctx: &OperationContext,
        target: &TargetId,
        desired: &PowerState,
    ) -> Result<Execution, TransitionError<C::Error>> {
        let _guard = self
            .locks
            .acquire(target, ctx)
            .await
            .map_err(TransitionError::interrupted)?;
        let current = observe_assuming_running(&self.control_plane, ctx, target).await?;
        let planned = plan(&current, desired)?;
        info!(resource = %target, %current, %desired, plan = %planned.plan, "ensuring power state");
        execute(&self.control_plane, ctx, target, &planned.plan).await
    }

    /// Runs `mutation` once the target is in `precondition`, then restores
    /// the state observed before the transition.
    ///
    /// Restoration is attempted whenever a transition ran, even when the
    /// mutation failed. The mutation itself is not raced against `ctx`; it
    /// should observe the context on its own when it issues backend calls.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the precondition could not be reached,
    /// in which case the mutation never ran. Steps confirmed before the
    /// failure are listed in the error and are not rolled back.
    pub async fn mutate<F, Fut, T, M>(
        &self,
        ctx: &OperationContext,
        target: &TargetId,
        precondition: &PowerState,
        mutation: F,
    ) -> Result<MutationReport<T, M, C::Error>, TransitionError<C::Error>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, M>>,
    {
        self.mutate_with_any(ctx, target, std::slice::from_ref(precondition), mutation)
            .await
    }

    /// Like [`Orchestrator::mutate`], but any of the `accepted` states
    /// satisfies the mutation. A target already in one of them is not
    /// transitioned; otherwise it is driven to the first entry.
    ///
    /// # Errors
    ///
    /// As for [`Orchestrator::mutate`]. An empty `accepted` list is reported
    /// as [`TransitionError::UnrecognizedState`] before any command runs.
    pub async fn mutate_with_any<F, Fut, T, M>(
        &self,
        ctx: &OperationContext,
        target: &TargetId,
        accepted: &[PowerState],
        mutation: F,
    ) -> Result<MutationReport<T, M, C::Error>, TransitionError<C::Error>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, M>>,
    {
        let guard = self
            .locks
            .acquire(target, ctx)
            .await
            .map_err(TransitionError::interrupted)?;
        let snapshot = observe_assuming_running(&self.control_plane, ctx, target).await?;
        let precondition = choose_precondition(&snapshot, accepted)?;
        let planned = plan(&snapshot, precondition)?;
        let execution = execute(&self.control_plane, ctx, target, &planned.plan).await?;
        let transitioned = execution.occurred();

        let held = if transitioned || self.release_policy == ReleasePolicy::HoldThroughRestore {
            Some(guard)
        } else {
            debug!(resource = %target, "precondition already satisfied; releasing gate early");
            drop(guard);
            None
        };

        let result = mutation().await;

        let restoration = if transitioned {
            self.restore_snapshot(ctx, target, &snapshot).await
        } else {
            RestorationOutcome::NotRequired
        };
        drop(held);

        Ok(MutationReport {
            mutation: result,
            snapshot,
            transitioned,
            restoration,
        })
    }

    /// Convenience wrapper over [`Orchestrator::mutate`] returning one
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] describing the first failure that matters to the
    /// caller.
    pub async fn with_precondition<F, Fut, T, M>(
        &self,
        ctx: &OperationContext,
        target: &TargetId,
        precondition: &PowerState,
        mutation: F,
    ) -> Result<T, GateError<C::Error, M>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, M>>,
        M: std::error::Error + 'static,
    {
        self.with_any_precondition(ctx, target, std::slice::from_ref(precondition), mutation)
            .await
    }

    /// Convenience wrapper over [`Orchestrator::mutate_with_any`] returning
    /// one result.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] describing the first failure that matters to the
    /// caller.
    pub async fn with_any_precondition<F, Fut, T, M>(
        &self,
        ctx: &OperationContext,
        target: &TargetId,
        accepted: &[PowerState],
        mutation: F,
    ) -> Result<T, GateError<C::Error, M>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, M>>,
        M: std::error::Error + 'static,
    {
        self.mutate_with_any(ctx, target, accepted, mutation)
            .await
            .map_err(GateError::Precondition)?
            .into_result()
    }

    async fn restore_snapshot(
        &self,
        ctx: &OperationContext,
        target: &TargetId,
        snapshot: &PowerState,
    ) -> RestorationOutcome<C::Error> {
        match restore(&self.control_plane, ctx, target, snapshot).await {
            Ok(Restoration::NotNeeded) => RestorationOutcome::Restored(TransitionPlan::default()),
            Ok(Restoration::Restored(restored)) => RestorationOutcome::Restored(restored),
            Err(err) => {
                warn!(resource = %target, %snapshot, error = %err, "failed to restore original power state");
                RestorationOutcome::Failed(err)
            }
        }
    }
}
