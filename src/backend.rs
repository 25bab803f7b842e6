//! Outbound boundary to the remote control plane.
//!
//! Everything the orchestration core needs from a provider is expressed by
//! [`ControlPlane`]. Every call resolves only once the provider confirms the
//! outcome, so the core never has to reason about fire-and-forget requests.

use std::future::Future;
use std::pin::Pin;

use crate::context::OperationContext;
use crate::target::TargetId;

/// Future returned by control-plane operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Distinguishes failures worth retrying from permanent ones.
///
/// The core never retries on its own; it only carries the classification up
/// to the caller unchanged.
pub trait Transience {
    /// Returns `true` when the same call may succeed if repeated later.
    fn is_transient(&self) -> bool;
}

/// Scope used when listing resources through the read-path index.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ListFilter {
    /// Provider scope such as a zone or resource group.
    pub scope: String,
    /// Restricts the listing to these identities when non-empty.
    pub ids: Vec<TargetId>,
}

impl ListFilter {
    /// Creates a filter for a single scope.
    #[must_use]
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into().trim().to_owned(),
            ids: Vec::new(),
        }
    }

    /// Restricts the listing to one identity.
    #[must_use]
    pub fn with_id(mut self, id: TargetId) -> Self {
        self.ids.push(id);
        self
    }
}

/// Entry returned by [`ControlPlane::list_by_scope`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListedResource {
    /// Identity of the listed resource.
    pub id: TargetId,
    /// Raw status codes reported alongside the entry.
    pub status_codes: Vec<String>,
}

/// Minimal interface implemented by compute control planes.
pub trait ControlPlane: Send + Sync {
    /// Provider specific error type returned by the control plane.
    type Error: std::error::Error + Transience + Send + Sync + 'static;

    /// Returns the raw status codes of the target without side effects.
    fn observe_state<'a>(
        &'a self,
        target: &'a TargetId,
    ) -> BackendFuture<'a, Vec<String>, Self::Error>;

    /// Powers the target on and waits until it runs.
    ///
    /// Waiting for confirmation must not outlive `ctx`.
    fn start<'a>(
        &'a self,
        ctx: &'a OperationContext,
        target: &'a TargetId,
    ) -> BackendFuture<'a, (), Self::Error>;

    /// Powers the target off while keeping its allocation.
    fn stop<'a>(
        &'a self,
        ctx: &'a OperationContext,
        target: &'a TargetId,
        force: bool,
    ) -> BackendFuture<'a, (), Self::Error>;

    /// Releases the target's compute allocation.
    fn deallocate<'a>(
        &'a self,
        ctx: &'a OperationContext,
        target: &'a TargetId,
        hibernate: bool,
    ) -> BackendFuture<'a, (), Self::Error>;

    /// Lists resources visible through the read-path index.
    fn list_by_scope<'a>(
        &'a self,
        filter: &'a ListFilter,
    ) -> BackendFuture<'a, Vec<ListedResource>, Self::Error>;
}
