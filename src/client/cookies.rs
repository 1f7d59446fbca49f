//! Resettable cookie store shared by the transport

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

/// Cookie store that can be swapped for an empty one at runtime
///
/// reqwest fixes the cookie provider when the client is built, so the
/// provider itself stays put and forwards to an inner [`Jar`] that
/// [`SessionCookies::clear`] replaces.
#[derive(Debug, Default)]
pub struct SessionCookies {
    jar: RwLock<Arc<Jar>>,
}

impl SessionCookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards every cookie accumulated so far
    pub fn clear(&self) {
        let mut jar = self.jar.write().unwrap_or_else(PoisonError::into_inner);
        *jar = Arc::new(Jar::default());
    }

    /// Adds a cookie as if it had been set by `url`
    pub fn add_cookie_str(&self, cookie: &str, url: &Url) {
        self.current().add_cookie_str(cookie, url);
    }

    fn current(&self) -> Arc<Jar> {
        self.jar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.current().set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.current().cookies(url)
    }
}
