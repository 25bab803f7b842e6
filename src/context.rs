//! Ambient deadline and cancellation carried by one logical operation.
//!
//! The core never picks its own timeouts. Every awaited backend call is raced
//! against the caller's [`OperationContext`] so that cancellation and deadline
//! expiry surface promptly as [`Interrupted`].

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Reason an operation stopped before its awaited call finished.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum Interrupted {
    /// The caller cancelled the operation.
    #[error("operation was cancelled")]
    Cancelled,
    /// The operation deadline elapsed.
    #[error("operation deadline elapsed")]
    DeadlineExceeded,
}

/// Deadline and cancellation token shared by every step of an operation.
#[derive(Clone, Debug, Default)]
pub struct OperationContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// Creates a context with no deadline that is never cancelled unless
    /// [`OperationContext::cancel`] is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context expiring `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Replaces the cancellation token, for example with a child of a
    /// process-wide shutdown token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns the cancellation token observed by this context.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancels the operation and every clone of this context.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Derives a context that shares the deadline but can be cancelled on its
    /// own. Cancelling the parent still cancels the child.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derives a child context that expires after `limit` at the latest. The
    /// parent's deadline still applies when it comes first.
    #[must_use]
    pub fn bounded(&self, limit: Duration) -> Self {
        let cap = Instant::now() + limit;
        let mut bounded = self.child();
        bounded.deadline = Some(self.deadline.map_or(cap, |deadline| deadline.min(cap)));
        bounded
    }

    /// Fails when the context is already cancelled or past its deadline.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] describing why the operation must stop.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.cancellation.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(Interrupted::DeadlineExceeded);
        }
        Ok(())
    }

    /// Awaits `future` unless the context is cancelled or expires first.
    ///
    /// The future is dropped when the context wins the race.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] when cancellation or the deadline fires before
    /// the future completes.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(Interrupted::Cancelled),
            () = expiry(self.deadline) => Err(Interrupted::DeadlineExceeded),
            output = future => Ok(output),
        }
    }
}

async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
