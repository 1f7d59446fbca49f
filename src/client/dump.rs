//! Transaction dumps for offline inspection
//!
//! One plain-text file per attempt, named `{request:04}-{attempt:02}.txt`:
//!
//! ```text
//! METHOD URL
//!
//! request-header: value
//!
//! request body or EMPTY BODY
//!
//! ---
//!
//! response-header: value
//!
//! response body or EMPTY BODY
//! ```

use crate::client::file::absolute_path;
use crate::client::ResponseHead;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::path::{Path, PathBuf};
use url::Url;

/// Marker written in place of a missing or empty body
pub const EMPTY_BODY: &str = "EMPTY BODY";

/// Request half of a dumped transaction
#[derive(Debug, Clone, Copy)]
pub struct RequestMeta<'a> {
    pub method: &'a Method,
    pub url: &'a Url,
    pub headers: &'a HeaderMap,
}

/// Writes transaction traces into one session directory
#[derive(Debug, Clone)]
pub struct Dumper {
    dir: PathBuf,
}

impl Dumper {
    /// Creates `<root>/<session_id>`, resolving `root` to an absolute path
    pub fn create(root: &Path, session_id: &str) -> std::io::Result<Self> {
        let dir = absolute_path(root)?.join(session_id);
        std::fs::create_dir_all(&dir)?;

        tracing::info!("Dump directory: {}", dir.display());

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the trace file for one attempt
    pub fn file_path(&self, request_number: u32, attempt: u32) -> PathBuf {
        self.dir
            .join(format!("{:04}-{:02}.txt", request_number, attempt))
    }

    /// Writes one trace file
    ///
    /// Write failures are logged and swallowed; a dump never changes the
    /// outcome of the request it describes.
    pub async fn dump(
        &self,
        request: RequestMeta<'_>,
        response: Option<&ResponseHead>,
        request_body: &[u8],
        response_body: &[u8],
        request_number: u32,
        attempt: u32,
    ) -> Option<PathBuf> {
        let path = self.file_path(request_number, attempt);
        let content = render_transaction(request, response, request_body, response_body);

        match tokio::fs::write(&path, content).await {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::error!("Error writing http dump file {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Renders a transaction in the trace format
pub fn render_transaction(
    request: RequestMeta<'_>,
    response: Option<&ResponseHead>,
    request_body: &[u8],
    response_body: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();

    out.extend_from_slice(format!("{} {}\n\n", request.method, request.url).as_bytes());
    write_headers(&mut out, request.headers);
    out.push(b'\n');
    write_body(&mut out, request_body);
    out.push(b'\n');

    out.extend_from_slice(b"\n---\n\n");

    if let Some(response) = response {
        write_headers(&mut out, &response.headers);
    }
    out.push(b'\n');
    write_body(&mut out, response_body);

    out
}

fn write_headers(out: &mut Vec<u8>, headers: &HeaderMap) {
    for (name, value) in headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.push(b'\n');
    }
}

fn write_body(out: &mut Vec<u8>, body: &[u8]) {
    if body.is_empty() {
        out.extend_from_slice(EMPTY_BODY.as_bytes());
    } else {
        out.extend_from_slice(body);
    }
}
