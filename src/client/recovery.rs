//! Per-client error recovery
//!
//! A client runs at most one error handler at a time. The section is entered
//! with a non-blocking try-acquire: a request that fails while another request
//! is already recovering gets [`DredgeError::HandlerConflict`] instead of
//! queueing behind a handler that may be changing the session under it.
//! Requests that are merely about to start wait until recovery is over.

use crate::client::{Client, RequestContext, ResponseHead};
use crate::{BoxError, DredgeError};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use tokio::sync::{watch, Mutex, MutexGuard};
use url::Url;

/// Caller-supplied recovery routine invoked after a failed attempt
///
/// Returning `Ok` lets the engine continue its retry loop; returning `Err`
/// aborts the logical request with the handler's error joined to the
/// attempt's error.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use dredge::{BoxError, ErrorContext, ErrorHandler};
///
/// struct Relogin;
///
/// #[async_trait]
/// impl ErrorHandler for Relogin {
///     async fn handle(&self, cx: ErrorContext<'_>) -> Result<(), BoxError> {
///         if cx.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
///             cx.client.reset();
///             cx.client
///                 .post_form(&cx.ctx, "https://example.com/login", &[("user", "me")], Default::default())
///                 .await?;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn handle(&self, cx: ErrorContext<'_>) -> Result<(), BoxError>;
}

/// Everything known about a failed attempt
pub struct ErrorContext<'a> {
    /// The client the request was issued through
    pub client: &'a Client,

    /// Context for requests the handler issues itself; they bypass the
    /// recovery wait and are canceled with the failed request
    pub ctx: RequestContext,

    pub method: &'a Method,
    pub url: &'a Url,

    /// Headers as sent, defaults included
    pub request_headers: &'a HeaderMap,

    /// Payload sent with the failed attempt, empty for none
    pub request_body: &'a [u8],

    /// Response head, if the transport produced one
    pub response: Option<&'a ResponseHead>,
    pub response_body: Option<&'a [u8]>,

    pub error: &'a DredgeError,

    /// 1-based attempt number within the logical request
    pub attempt: u32,
}

impl ErrorContext<'_> {
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        self.response.map(|head| head.status)
    }
}

/// Mutual exclusion around error handler execution
#[derive(Debug)]
pub(crate) struct RecoveryGate {
    lock: Mutex<()>,
    active: watch::Sender<bool>,
}

/// Held for the duration of one handler invocation
pub(crate) struct RecoveryGuard<'a> {
    lock: Option<MutexGuard<'a, ()>>,
    active: &'a watch::Sender<bool>,
}

impl RecoveryGate {
    pub fn new() -> Self {
        let (active, _) = watch::channel(false);
        Self {
            lock: Mutex::new(()),
            active,
        }
    }

    /// Enters the section, or returns `None` if it is already held
    pub fn try_enter(&self) -> Option<RecoveryGuard<'_>> {
        let lock = self.lock.try_lock().ok()?;
        self.active.send_replace(true);
        Some(RecoveryGuard {
            lock: Some(lock),
            active: &self.active,
        })
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Waits until no handler is running
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|active| !*active).await;
    }
}

impl Default for RecoveryGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RecoveryGuard<'_> {
    fn drop(&mut self) {
        // Release the lock before waking waiters so they can enter at once
        drop(self.lock.take());
        self.active.send_replace(false);
    }
}
