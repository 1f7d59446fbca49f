//! Outbound request construction
//!
//! This module handles building the transport and every request sent through it:
//! - Building the reqwest client with cookie store, proxy and timeouts
//! - Merging default headers under the caller's headers
//! - Attaching a fresh body and the context deadline to each attempt

use crate::client::context::RequestContext;
use crate::client::cookies::SessionCookies;
use crate::config::ClientConfig;
use crate::DredgeError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use reqwest::{Method, Proxy, Request};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEFAULT_ACCEPT: &str = "*/*";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const DEFAULT_CACHE_CONTROL: &str = "max-age=0";

/// Builds the shared HTTP transport
///
/// # Arguments
///
/// * `config` - Client configuration (timeouts and proxy)
/// * `cookies` - Cookie store replayed on every request
///
/// # Returns
///
/// * `Ok(reqwest::Client)` - Successfully built transport
/// * `Err(DredgeError)` - Invalid proxy or TLS backend failure
pub fn build_http_client(
    config: &ClientConfig,
    cookies: Arc<SessionCookies>,
) -> Result<reqwest::Client, DredgeError> {
    let mut builder = reqwest::Client::builder()
        .cookie_provider(cookies)
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(30))
        .gzip(true)
        .brotli(true);

    // Only the configured proxy is used, never the environment's
    builder = match &config.proxy {
        Some(proxy) => builder.proxy(Proxy::all(proxy.as_str()).map_err(DredgeError::ClientBuild)?),
        None => builder.no_proxy(),
    };

    builder.build().map_err(DredgeError::ClientBuild)
}

/// Per-attempt settings applied when the caller leaves them unset
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    user_agent: HeaderValue,
    timeout: Duration,
}

impl RequestDefaults {
    /// # Arguments
    ///
    /// * `user_agent` - Sent when the caller sets no User-Agent
    /// * `timeout` - Upper bound for a single attempt
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, DredgeError> {
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| DredgeError::InvalidRequest(format!("invalid user agent: {}", e)))?;
        Ok(Self {
            user_agent,
            timeout,
        })
    }

    /// Attempt timeout: the configured bound, shortened to the context deadline
    pub fn timeout_for(&self, ctx: &RequestContext) -> Duration {
        match ctx.remaining() {
            Some(remaining) => remaining.min(self.timeout),
            None => self.timeout,
        }
    }

    /// Inserts each default only where the header name is absent
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers
            .entry(USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
        headers
            .entry(ACCEPT)
            .or_insert_with(|| HeaderValue::from_static(DEFAULT_ACCEPT));
        headers
            .entry(ACCEPT_LANGUAGE)
            .or_insert_with(|| HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
        headers
            .entry(CACHE_CONTROL)
            .or_insert_with(|| HeaderValue::from_static(DEFAULT_CACHE_CONTROL));
    }
}

/// Builds one ready-to-send attempt
///
/// The body is copied into a new reqwest body every call so the same payload
/// can be resent on every attempt. The attempt times out after the
/// configured timeout or at the context deadline, whichever comes first.
pub fn build_request(
    http: &reqwest::Client,
    defaults: &RequestDefaults,
    ctx: &RequestContext,
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Request, DredgeError> {
    let mut headers = headers.clone();
    defaults.apply(&mut headers);

    let mut builder = http.request(method.clone(), url.clone()).headers(headers);

    if !body.is_empty() {
        builder = builder.body(body.to_vec());
    }

    builder
        .timeout(defaults.timeout_for(ctx))
        .build()
        .map_err(|e| DredgeError::InvalidRequest(e.to_string()))
}
