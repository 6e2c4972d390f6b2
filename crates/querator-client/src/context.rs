//! Per-call cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation context for a single dispatch call.
///
/// A call observes both the token and the deadline at every suspension point
/// (waiting for a pool slot, connecting, sending, reading the body) and
/// returns as soon as either fires.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
}

/// Why a guarded future stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupted {
    Cancelled,
    DeadlineExceeded,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled together with `token`.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            deadline: None,
        }
    }

    /// Add a deadline `timeout` from now. An earlier existing deadline wins.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Add an absolute deadline. An earlier existing deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Run `fut` until it completes or the context fires.
    ///
    /// An already cancelled context never polls `fut`.
    pub(crate) async fn guard<F, T>(&self, fut: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(Interrupted::Cancelled),
            _ = expired => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
