//! Cancellation context carried by every logical request

use crate::DredgeError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline signal for one logical request
///
/// A context is checked before every attempt, raced against every send and
/// every backoff sleep. Cloning shares the same token, so canceling any clone
/// cancels them all; use [`RequestContext::child`] for a scope that can be
/// canceled independently of its parent.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    recovery: bool,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing token, e.g. one shared with a shutdown handler
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
            recovery: false,
        }
    }

    /// Sets a deadline `timeout` from now, keeping any earlier deadline
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets an absolute deadline, keeping any earlier deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Creates a context canceled with this one but cancelable on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            recovery: self.recovery,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns true once canceled or past the deadline
    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }

    /// Fails with the cancellation error if the context is already done
    pub fn check(&self) -> Result<(), DredgeError> {
        if self.token.is_cancelled() {
            return Err(DredgeError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(DredgeError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves when the context is canceled or its deadline passes
    pub async fn done(&self) -> DredgeError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => DredgeError::Canceled,
                _ = tokio::time::sleep_until(deadline) => DredgeError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                DredgeError::Canceled
            }
        }
    }

    /// Runs `fut` to completion unless the context finishes first
    pub async fn run<F, T>(&self, fut: F) -> Result<T, DredgeError>
    where
        F: Future<Output = Result<T, DredgeError>>,
    {
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => out,
        }
    }

    /// Sleeps for `delay` unless the context finishes first
    pub async fn sleep(&self, delay: Duration) -> Result<(), DredgeError> {
        self.run(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }

    /// Marks a context as belonging to an error handler
    ///
    /// Requests issued with it skip the wait for the recovery section, which
    /// the handler itself is holding.
    pub(crate) fn for_recovery(&self) -> Self {
        Self {
            recovery: true,
            ..self.clone()
        }
    }

    pub fn is_recovery(&self) -> bool {
        self.recovery
    }
}
