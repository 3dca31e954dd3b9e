//! Async utilities for cancellation-aware futures.
//!
//! Provides [`CancelScope`], a cancellation token paired with an optional
//! deadline, and the [`OrCancelExt`] trait for racing any future against a
//! scope.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a scope stopped the future it was racing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelErr {
    /// The scope's token (or an ancestor's) was cancelled.
    Cancelled,
    /// The scope's deadline elapsed.
    DeadlineExceeded,
}

impl std::fmt::Display for CancelErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => f.write_str("operation cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

impl std::error::Error for CancelErr {}

/// A cancellation token with an optional deadline.
///
/// Child scopes observe their parent's cancellation and never inherit a
/// later deadline than the parent's.
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelScope {
    /// A scope that only ends when cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A root scope that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().child_with_timeout(timeout)
    }

    /// Derive a child scope that also expires `timeout` from now.
    ///
    /// Cancelling the child does not cancel `self`. A timeout too large to
    /// represent as an instant leaves only the parent's deadline.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(parent), Some(candidate)) => Some(parent.min(candidate)),
            (parent, candidate) => parent.or(candidate),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns the reason the scope has ended, if it has.
    pub fn check(&self) -> Result<(), CancelErr> {
        if self.token.is_cancelled() {
            return Err(CancelErr::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CancelErr::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves once the scope ends. Token cancellation takes precedence
    /// over an elapsed deadline.
    pub async fn cancelled(&self) -> CancelErr {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => CancelErr::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => CancelErr::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CancelErr::Cancelled
            }
        }
    }
}

impl From<CancellationToken> for CancelScope {
    fn from(token: CancellationToken) -> Self {
        Self::with_token(token)
    }
}

/// Extension trait for making futures cancellable.
///
/// Allows any future to race against a [`CancelScope`], returning the
/// scope's [`CancelErr`] if it ends before the future completes.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// Race this future against the scope.
    ///
    /// An already-ended scope wins without polling the future.
    async fn or_cancel(self, scope: &CancelScope) -> Result<Self::Output, CancelErr>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, scope: &CancelScope) -> Result<Self::Output, CancelErr> {
        scope.check()?;
        tokio::select! {
            biased;
            reason = scope.cancelled() => Err(reason),
            res = self => Ok(res),
        }
    }
}
