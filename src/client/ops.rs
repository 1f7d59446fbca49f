//! Typed convenience operations layered on the engine
//!
//! Each helper builds the target URL, encodes its payload, delegates to
//! [`Client::execute`] and interprets the body. Interpretation failures
//! (decode, parse, file write) happen after a successful exchange and are
//! never retried.

use crate::client::file::{absolute_path, resolve_file_path};
use crate::client::{Client, RequestContext};
use crate::url::with_params;
use crate::DredgeError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use scraper::Html;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use url::form_urlencoded;
use url::Url;

const X_REQUESTED_WITH: &str = "x-requested-with";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// IP echo service queried by [`Client::external_ip_info`]
pub const DEFAULT_IP_INFO_URL: &str = "https://ifconfig.io";

impl Client {
    /// Performs a GET request, merging `params` into the URL query
    pub async fn get(
        &self,
        ctx: &RequestContext,
        url: &str,
        params: &[(&str, &str)],
        headers: HeaderMap,
    ) -> Result<Vec<u8>, DredgeError> {
        let url = with_params(Url::parse(url)?, params);
        let exchange = self
            .execute(ctx, Method::GET, url, headers, Vec::new())
            .await?;
        Ok(exchange.body)
    }

    /// Performs a GET request and parses the body as an HTML document
    ///
    /// A body that is not valid UTF-8 is reported as [`DredgeError::Parse`].
    pub async fn get_document(
        &self,
        ctx: &RequestContext,
        url: &str,
        params: &[(&str, &str)],
        headers: HeaderMap,
    ) -> Result<Html, DredgeError> {
        let body = self.get(ctx, url, params, headers).await?;
        parse_document(url, body)
    }

    /// Performs a GET request and decodes the JSON body
    ///
    /// Sends `X-Requested-With: XMLHttpRequest` unless the caller set it.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        url: &str,
        params: &[(&str, &str)],
        mut headers: HeaderMap,
    ) -> Result<T, DredgeError> {
        headers
            .entry(HeaderName::from_static(X_REQUESTED_WITH))
            .or_insert_with(|| HeaderValue::from_static("XMLHttpRequest"));

        let body = self.get(ctx, url, params, headers).await?;
        decode_json(&body)
    }

    /// Downloads a file to `path`
    ///
    /// A relative `path` is resolved against the current directory. If it
    /// has no extension, one is derived from the response Content-Type
    /// (`image/jpg` becomes `.jpeg`).
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - Absolute path the file was written to
    /// * `Err(UnknownExtension)` - No extension given and none derivable
    pub async fn get_file(
        &self,
        ctx: &RequestContext,
        url: &str,
        params: &[(&str, &str)],
        headers: HeaderMap,
        path: impl AsRef<Path>,
    ) -> Result<PathBuf, DredgeError> {
        let url = with_params(Url::parse(url)?, params);
        let exchange = self
            .execute(ctx, Method::GET, url, headers, Vec::new())
            .await?;

        let path = absolute_path(path.as_ref())?;
        let path = resolve_file_path(&path, exchange.content_type())?;
        tokio::fs::write(&path, &exchange.body).await?;

        tracing::debug!("Saved {} bytes to {}", exchange.body.len(), path.display());

        Ok(path)
    }

    /// Performs a POST request with a raw body
    pub async fn post(
        &self,
        ctx: &RequestContext,
        url: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, DredgeError> {
        let url = Url::parse(url)?;
        let exchange = self.execute(ctx, Method::POST, url, headers, body).await?;
        Ok(exchange.body)
    }

    /// Posts url-encoded form fields
    pub async fn post_form(
        &self,
        ctx: &RequestContext,
        url: &str,
        fields: &[(&str, &str)],
        mut headers: HeaderMap,
    ) -> Result<Vec<u8>, DredgeError> {
        set_content_type(&mut headers, FORM_CONTENT_TYPE);
        self.post(ctx, url, headers, encode_form(fields)).await
    }

    /// Posts `data` serialized as JSON
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        ctx: &RequestContext,
        url: &str,
        headers: HeaderMap,
        data: &B,
    ) -> Result<Vec<u8>, DredgeError> {
        let (headers, body) = json_payload(headers, data)?;
        self.post(ctx, url, headers, body).await
    }

    /// Posts form fields and decodes the JSON response
    pub async fn post_form_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        url: &str,
        fields: &[(&str, &str)],
        headers: HeaderMap,
    ) -> Result<T, DredgeError> {
        let body = self.post_form(ctx, url, fields, headers).await?;
        decode_json(&body)
    }

    /// Posts a JSON body and decodes the JSON response
    pub async fn post_json_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        url: &str,
        data: &B,
        headers: HeaderMap,
    ) -> Result<T, DredgeError> {
        let body = self.post_json(ctx, url, headers, data).await?;
        decode_json(&body)
    }

    /// Describes the client's external address, e.g. `address: 1.2.3.4, region: NL`
    ///
    /// Useful after rotating a proxy. `base` is an ifconfig.io-compatible
    /// service, normally [`DEFAULT_IP_INFO_URL`].
    pub async fn external_ip_info(
        &self,
        ctx: &RequestContext,
        base: &str,
    ) -> Result<String, DredgeError> {
        let base = base.trim_end_matches('/');

        let address = self
            .get(ctx, &format!("{}/ip", base), &[], HeaderMap::new())
            .await?;
        let region = self
            .get(ctx, &format!("{}/country_code", base), &[], HeaderMap::new())
            .await?;

        Ok(format!(
            "address: {}, region: {}",
            String::from_utf8_lossy(&address).trim(),
            String::from_utf8_lossy(&region).trim()
        ))
    }
}

fn set_content_type(headers: &mut HeaderMap, content_type: &'static str) {
    headers
        .entry(CONTENT_TYPE)
        .or_insert_with(|| HeaderValue::from_static(content_type));
}

fn encode_form(fields: &[(&str, &str)]) -> Vec<u8> {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
        .into_bytes()
}

fn json_payload<B: Serialize + ?Sized>(
    mut headers: HeaderMap,
    data: &B,
) -> Result<(HeaderMap, Vec<u8>), DredgeError> {
    let body = serde_json::to_vec(data).map_err(DredgeError::Encode)?;
    set_content_type(&mut headers, JSON_CONTENT_TYPE);
    Ok((headers, body))
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, DredgeError> {
    serde_json::from_slice(body).map_err(DredgeError::Decode)
}

fn parse_document(url: &str, body: Vec<u8>) -> Result<Html, DredgeError> {
    let html = String::from_utf8(body).map_err(|e| DredgeError::Parse {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    Ok(Html::parse_document(&html))
}
