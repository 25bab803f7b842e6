//! Mutation gate: per-target mutual exclusion.
//!
//! [`LockRegistry`] is an explicit lock table handed to every call site
//! instead of process-global state, so independent registries can coexist in
//! tests. Each target identity gets its own async mutex; waiters on the same
//! key are woken in acquisition order, which is best-effort fairness rather
//! than a guarantee across registries or runtimes.
//!
//! The gate is not re-entrant. A logical operation acquires it once and
//! passes the guard down instead of locking again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::context::{Interrupted, OperationContext};
use crate::target::TargetId;

type LockTable = HashMap<TargetId, Arc<AsyncMutex<()>>>;

/// Named-lock table keyed by [`TargetId`].
///
/// Clones share the same table.
#[derive(Clone, Debug, Default)]
pub struct LockRegistry {
    locks: Arc<Mutex<LockTable>>,
}

/// Exclusive access to one target. The gate opens again on drop.
#[derive(Debug)]
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard {
    target: TargetId,
    locks: Arc<Mutex<LockTable>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl GateGuard {
    /// Identity this guard holds.
    #[must_use]
    pub const fn target(&self) -> &TargetId {
        &self.target
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(self.guard.take());
        prune_idle(&mut table, &self.target);
        debug!(resource = %self.target, "released mutation gate");
    }
}

// Only the table still refers to the lock: nobody holds or awaits it.
fn prune_idle(table: &mut LockTable, target: &TargetId) {
    if table
        .get(target)
        .is_some_and(|lock| Arc::strong_count(lock) == 1)
    {
        table.remove(target);
    }
}

impl LockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, target: &TargetId) -> Arc<AsyncMutex<()>> {
        let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(table.entry(target.clone()).or_default())
    }

    fn guard_for(&self, target: &TargetId, guard: OwnedMutexGuard<()>) -> GateGuard {
        GateGuard {
            target: target.clone(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Waits for exclusive access to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] when the context is cancelled or expires while
    /// waiting.
    pub async fn acquire(
        &self,
        target: &TargetId,
        ctx: &OperationContext,
    ) -> Result<GateGuard, Interrupted> {
        let lock = self.lock_for(target);
        let guard = match ctx.run(lock.lock_owned()).await {
            Ok(guard) => guard,
            Err(reason) => {
                let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
                prune_idle(&mut table, target);
                return Err(reason);
            }
        };
        debug!(resource = %target, "acquired mutation gate");
        Ok(self.guard_for(target, guard))
    }

    /// Takes the gate only if nobody holds it.
    #[must_use]
    pub fn try_acquire(&self, target: &TargetId) -> Option<GateGuard> {
        let guard = self.lock_for(target).try_lock_owned().ok()?;
        Some(self.guard_for(target, guard))
    }

    /// Returns `true` while some guard for `target` is alive.
    #[must_use]
    pub fn is_locked(&self, target: &TargetId) -> bool {
        let table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        table
            .get(target)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Number of identities currently held or awaited.
    ///
    /// An entry is dropped with the last guard for its identity.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when no identity is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `operation` while holding the gate for `target`.
    ///
    /// The gate is released on every exit path, including unwinding.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] when the gate could not be acquired before the
    /// context fired. The operation's own result is returned unchanged.
    pub async fn with_exclusive_access<F, Fut, T>(
        &self,
        target: &TargetId,
        ctx: &OperationContext,
        operation: F,
    ) -> Result<T, Interrupted>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire(target, ctx).await?;
        Ok(operation().await)
    }
}

#[cfg(test)]
mod tests;
