//! Client module for supervised HTTP requests
//!
//! This module contains the request machinery, including:
//! - The long-lived [`Client`] shared by every request of a session
//! - Request construction with default headers
//! - The retry engine and its per-client error recovery section
//! - Transaction dumps for offline debugging
//! - Typed GET/POST helpers layered on the engine

mod context;
mod cookies;
mod dump;
mod engine;
mod file;
mod ops;
mod recovery;
mod request;

pub use context::RequestContext;
pub use cookies::SessionCookies;
pub use dump::{render_transaction, Dumper, RequestMeta, EMPTY_BODY};
pub use file::{absolute_path, extension_for_content_type, has_extension, resolve_file_path};
pub use ops::DEFAULT_IP_INFO_URL;
pub use recovery::{ErrorContext, ErrorHandler};
pub use request::{build_http_client, build_request, RequestDefaults};

use crate::config::{validate, ClientConfig};
use crate::DredgeError;
use recovery::RecoveryGate;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use url::Url;

/// Status, headers and final URL of a response
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// Final URL after redirects
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseHead {
    fn from_response(response: &reqwest::Response) -> Self {
        Self {
            url: response.url().clone(),
            status: response.status(),
            headers: response.headers().clone(),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// A completed request: the final response head and its full body
#[derive(Debug, Clone)]
pub struct Exchange {
    pub head: ResponseHead,
    pub body: Vec<u8>,
}

impl Exchange {
    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn url(&self) -> &Url {
        &self.head.url
    }

    pub fn content_type(&self) -> Option<&str> {
        self.head.content_type()
    }
}

/// Long-lived HTTP client for one scraping session
///
/// All requests issued through a client share its transport, cookie store,
/// request counter and error recovery section. Share it between tasks with
/// an `Arc`; callers needing isolated cookie state should use separate
/// clients.
///
/// # Example
///
/// ```no_run
/// use dredge::{Client, ClientConfig, RequestContext};
///
/// # async fn example() -> dredge::Result<()> {
/// let client = Client::new(ClientConfig::default())?;
/// let ctx = RequestContext::new();
/// let body = client.get(&ctx, "https://example.com/", &[], Default::default()).await?;
/// println!("{} bytes", body.len());
/// # Ok(())
/// # }
/// ```
pub struct Client {
    session_id: String,
    config: ClientConfig,
    http: reqwest::Client,
    cookies: Arc<SessionCookies>,
    defaults: RequestDefaults,
    dumper: Option<Dumper>,
    request_number: AtomicU32,
    recovery: RecoveryGate,
    error_handler: RwLock<Option<Arc<dyn ErrorHandler>>>,
    current_url: Mutex<Option<Url>>,
}

impl Client {
    /// Creates a client for a new session
    ///
    /// The session id is the current Unix timestamp. With diagnostics
    /// enabled, the dump directory `<dump-dir>/<session id>` is created here.
    ///
    /// # Returns
    ///
    /// * `Ok(Client)` - Ready to issue requests
    /// * `Err(DredgeError)` - Invalid configuration, proxy, or dump directory
    pub fn new(config: ClientConfig) -> Result<Self, DredgeError> {
        validate(&config)?;

        let session_id = chrono::Utc::now().timestamp().to_string();
        let defaults = RequestDefaults::new(&config.user_agent, config.timeout())?;
        let cookies = Arc::new(SessionCookies::new());
        let http = build_http_client(&config, cookies.clone())?;

        let dumper = if config.diagnostics.enabled {
            Some(Dumper::create(&config.diagnostics.dump_dir, &session_id)?)
        } else {
            None
        };

        tracing::debug!("Client {} started session {}", config.name, session_id);

        Ok(Self {
            session_id,
            config,
            http,
            cookies,
            defaults,
            dumper,
            request_number: AtomicU32::new(0),
            recovery: RecoveryGate::new(),
            error_handler: RwLock::new(None),
            current_url: Mutex::new(None),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session dump directory, when diagnostics are enabled
    pub fn dump_dir(&self) -> Option<&Path> {
        self.dumper.as_ref().map(Dumper::dir)
    }

    /// The underlying transport, for configuration the client does not expose
    ///
    /// Requests sent directly through it share the cookie store but bypass
    /// retries, recovery and dumps.
    pub fn http(&self) -> reqwest::Client {
        self.http.clone()
    }

    /// The cookie store replayed on every request
    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        *self
            .error_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub fn clear_error_handler(&self) {
        *self
            .error_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn error_handler(&self) -> Option<Arc<dyn ErrorHandler>> {
        self.error_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Discards all cookies and the tracked current URL
    ///
    /// Must not race with in-flight requests on this client unless the
    /// caller synchronizes externally; an attempt in flight may still store
    /// cookies into the fresh jar.
    pub fn reset(&self) {
        self.cookies.clear();
        *self
            .current_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        tracing::info!("Client {} reset", self.config.name);
    }

    /// Final URL of the most recent response received by this client
    pub fn current_url(&self) -> Option<Url> {
        self.current_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn track_url(&self, url: &Url) {
        *self
            .current_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(url.clone());
    }

    /// Number of attempts sent over the client's lifetime
    pub fn requests_sent(&self) -> u32 {
        self.request_number.load(Ordering::SeqCst)
    }

    fn next_request_number(&self) -> u32 {
        self.request_number.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns true while an error handler is running for this client
    pub fn is_recovering(&self) -> bool {
        self.recovery.is_active()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session_id", &self.session_id)
            .field("name", &self.config.name)
            .field("requests_sent", &self.requests_sent())
            .field("dump_dir", &self.dump_dir())
            .field("recovering", &self.is_recovering())
            .finish()
    }
}
