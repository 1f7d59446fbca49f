//! Resilient request engine
//!
//! Turns one logical request into a supervised sequence of attempts.
//!
//! # Attempt Loop
//!
//! ```text
//! Idle -> Attempting -> Success                  (terminal)
//!                    -> Retrying -> Attempting
//!                    -> Aborted                  (terminal)
//!                    -> Canceled                 (terminal)
//! ```
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Context canceled / deadline passed | Canceled, no further attempts |
//! | Handler running on this client (new attempt) | Wait for it to finish |
//! | Handler running on this client (failed attempt) | Abort with HandlerConflict |
//! | Handler returns an error | Abort with both errors joined |
//! | Attempt budget exhausted | Abort with the last error |
//! | Transport error or status outside 2xx | Retry after `attempt × retry-delay` |

use crate::client::dump::RequestMeta;
use crate::client::request::build_request;
use crate::client::{Client, ErrorContext, Exchange, RequestContext, ResponseHead};
use crate::DredgeError;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::time::Duration;
use url::Url;

/// Classified result of a single attempt
#[derive(Debug)]
enum AttemptOutcome {
    Success {
        head: ResponseHead,
        body: Vec<u8>,
    },
    Failure {
        error: DredgeError,
        head: Option<ResponseHead>,
        body: Option<Vec<u8>>,
    },
    Canceled(DredgeError),
}

/// What the engine does after a failed attempt
#[derive(Debug)]
enum NextStep {
    Retry { delay: Duration },
    Abort(DredgeError),
}

impl Client {
    /// Performs one logical request with retries
    ///
    /// Caller headers take precedence over the client's defaults. The body is
    /// resent unchanged on every attempt.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Cancellation and deadline for the whole logical request
    /// * `method` - HTTP method
    /// * `url` - Absolute target URL
    /// * `headers` - Caller headers
    /// * `body` - Request payload, empty for none
    ///
    /// # Returns
    ///
    /// * `Ok(Exchange)` - A 2xx response and its full body
    /// * `Err(DredgeError)` - The last attempt's error, a cancellation, a
    ///   handler conflict or a handler failure
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<Exchange, DredgeError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            ctx.check()?;
            self.wait_for_recovery(ctx).await?;

            let request_number = self.next_request_number();
            let request = build_request(
                &self.http,
                &self.defaults,
                ctx,
                &method,
                &url,
                &headers,
                &body,
            )?;
            let sent_headers = request.headers().clone();
            let meta = RequestMeta {
                method: &method,
                url: &url,
                headers: &sent_headers,
            };

            match self.send(ctx, request).await {
                AttemptOutcome::Success { head, body: response_body } => {
                    tracing::debug!(
                        "req #{}({}): {} {}; status: {}",
                        request_number,
                        attempt,
                        method,
                        url,
                        head.status
                    );

                    if let Some(dumper) = &self.dumper {
                        dumper
                            .dump(meta, Some(&head), &body, &response_body, request_number, attempt)
                            .await;
                    }

                    return finish(head, response_body);
                }

                AttemptOutcome::Canceled(error) => {
                    tracing::debug!(
                        "req #{}({}): {} {}; {}",
                        request_number,
                        attempt,
                        method,
                        url,
                        error
                    );
                    return Err(error);
                }

                AttemptOutcome::Failure {
                    error,
                    head,
                    body: response_body,
                } => {
                    tracing::error!(
                        "req #{}({}): {} {}; error: {}",
                        request_number,
                        attempt,
                        method,
                        url,
                        error
                    );

                    if let Some(dumper) = &self.dumper {
                        dumper
                            .dump(
                                meta,
                                head.as_ref(),
                                &body,
                                response_body.as_deref().unwrap_or_default(),
                                request_number,
                                attempt,
                            )
                            .await;
                    }

                    let failed = FailedAttempt {
                        method: &method,
                        url: &url,
                        headers: &sent_headers,
                        request_body: &body,
                        head: head.as_ref(),
                        body: response_body.as_deref(),
                        attempt,
                    };

                    match self.after_failure(ctx, failed, error).await {
                        NextStep::Retry { delay } => ctx.sleep(delay).await?,
                        NextStep::Abort(error) => return Err(error),
                    }
                }
            }
        }
    }

    /// Blocks a new attempt while another request's handler is running
    async fn wait_for_recovery(&self, ctx: &RequestContext) -> Result<(), DredgeError> {
        // A handler's own requests must not wait on the section it holds
        if ctx.is_recovery() || !self.recovery.is_active() {
            return Ok(());
        }

        tracing::debug!("Waiting for client {} to finish error recovery", self.config.name);
        ctx.run(async {
            self.recovery.wait_idle().await;
            Ok(())
        })
        .await
    }

    /// Sends one attempt and classifies the result
    async fn send(&self, ctx: &RequestContext, request: reqwest::Request) -> AttemptOutcome {
        let url = request.url().to_string();

        let response = ctx
            .run(async {
                self.http
                    .execute(request)
                    .await
                    .map_err(|source| DredgeError::Transport {
                        url: url.clone(),
                        source,
                    })
            })
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => return self.classify_error(ctx, error, None),
        };

        self.track_url(response.url());
        let head = ResponseHead::from_response(&response);

        let body = ctx
            .run(async {
                response
                    .bytes()
                    .await
                    .map(|bytes| bytes.to_vec())
                    .map_err(|source| DredgeError::Transport {
                        url: url.clone(),
                        source,
                    })
            })
            .await;

        let body = match body {
            Ok(body) => body,
            Err(error) => return self.classify_error(ctx, error, Some(head)),
        };

        if head.status.is_success() {
            AttemptOutcome::Success { head, body }
        } else {
            AttemptOutcome::Failure {
                error: DredgeError::HttpStatus {
                    url,
                    status: head.status,
                    body: body.clone(),
                },
                head: Some(head),
                body: Some(body),
            }
        }
    }

    fn classify_error(
        &self,
        ctx: &RequestContext,
        error: DredgeError,
        head: Option<ResponseHead>,
    ) -> AttemptOutcome {
        if error.is_cancellation() {
            return AttemptOutcome::Canceled(error);
        }

        // A transport timeout caused by the context deadline is a cancellation
        if let Err(done) = ctx.check() {
            return AttemptOutcome::Canceled(done);
        }

        AttemptOutcome::Failure {
            error,
            head,
            body: None,
        }
    }

    /// Runs the error handler, if any, and decides whether to retry
    async fn after_failure(
        &self,
        ctx: &RequestContext,
        failed: FailedAttempt<'_>,
        error: DredgeError,
    ) -> NextStep {
        if error.is_cancellation() {
            return NextStep::Abort(error);
        }

        if let Some(handler) = self.error_handler() {
            let Some(_guard) = self.recovery.try_enter() else {
                tracing::warn!(
                    "{} {}: error is already being handled by another request",
                    failed.method,
                    failed.url
                );
                return NextStep::Abort(DredgeError::HandlerConflict);
            };

            let cx = ErrorContext {
                client: self,
                ctx: ctx.for_recovery(),
                method: failed.method,
                url: failed.url,
                request_headers: failed.headers,
                request_body: failed.request_body,
                response: failed.head,
                response_body: failed.body,
                error: &error,
                attempt: failed.attempt,
            };

            if let Err(source) = handler.handle(cx).await {
                tracing::warn!("Error handler failed for {} {}: {}", failed.method, failed.url, source);
                return NextStep::Abort(DredgeError::Handler {
                    error: Box::new(error),
                    source,
                });
            }
        }

        if failed.attempt >= self.config.max_attempts {
            return NextStep::Abort(error);
        }

        NextStep::Retry {
            delay: backoff_delay(self.config.retry_delay(), failed.attempt),
        }
    }
}

/// Borrowed view of a failed attempt handed to the error handler
struct FailedAttempt<'a> {
    method: &'a Method,
    url: &'a Url,
    headers: &'a HeaderMap,
    request_body: &'a [u8],
    head: Option<&'a ResponseHead>,
    body: Option<&'a [u8]>,
    attempt: u32,
}

/// Linear backoff: the wait after attempt N is N units
fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    unit.saturating_mul(attempt)
}

/// Builds the exchange for a successful attempt
fn finish(head: ResponseHead, body: Vec<u8>) -> Result<Exchange, DredgeError> {
    if head.status.is_client_error() || head.status.is_server_error() {
        return Err(DredgeError::HttpStatus {
            url: head.url.to_string(),
            status: head.status,
            body,
        });
    }

    Ok(Exchange { head, body })
}
