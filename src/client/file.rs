//! File extension derivation for downloads

use crate::DredgeError;
use std::path::{Path, PathBuf};

/// Returns true if the file name ends in `.` followed by ASCII alphanumerics
pub fn has_extension(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    match name.rfind('.') {
        Some(pos) => {
            let ext = &name[pos + 1..];
            !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Maps a Content-Type header value to a file extension (without the dot)
///
/// Parameters such as `; charset=utf-8` are ignored and the non-standard
/// `image/jpg` is treated as `image/jpeg`.
///
/// # Examples
///
/// ```
/// use dredge::client::extension_for_content_type;
///
/// assert_eq!(extension_for_content_type("image/jpg").as_deref(), Some("jpeg"));
/// assert_eq!(extension_for_content_type("text/html; charset=utf-8").as_deref(), Some("html"));
/// assert_eq!(extension_for_content_type(""), None);
/// ```
pub fn extension_for_content_type(content_type: &str) -> Option<String> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
        .replace("/jpg", "/jpeg");

    if mime.is_empty() {
        return None;
    }

    let known = match mime.as_str() {
        "image/jpeg" => Some("jpeg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "text/html" => Some("html"),
        "text/plain" => Some("txt"),
        "text/css" => Some("css"),
        "text/csv" => Some("csv"),
        "application/json" => Some("json"),
        "application/pdf" => Some("pdf"),
        "application/xml" | "text/xml" => Some("xml"),
        "application/zip" => Some("zip"),
        "application/gzip" => Some("gz"),
        "text/javascript" | "application/javascript" => Some("js"),
        "video/mp4" => Some("mp4"),
        "audio/mpeg" => Some("mp3"),
        _ => None,
    };
    if let Some(ext) = known {
        return Some(ext.to_string());
    }

    // Prefer the extension named like the subtype, else the first registered one
    let extensions = mime_guess::get_mime_extensions_str(&mime)?;
    let subtype = mime.split('/').nth(1).unwrap_or("");
    extensions
        .iter()
        .find(|ext| **ext == subtype)
        .or_else(|| extensions.first())
        .map(|ext| ext.to_string())
}

/// Resolves a relative path against the current directory
pub fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Resolves where a download is written
///
/// A path that already has an extension is used as is; otherwise one is
/// derived from the response Content-Type.
///
/// # Returns
///
/// * `Ok(PathBuf)` - Destination path
/// * `Err(UnknownExtension)` - No extension given and none derivable
pub fn resolve_file_path(path: &Path, content_type: Option<&str>) -> Result<PathBuf, DredgeError> {
    if has_extension(path) {
        return Ok(path.to_path_buf());
    }

    let content_type = content_type.unwrap_or("");
    let ext = extension_for_content_type(content_type).ok_or_else(|| {
        DredgeError::UnknownExtension {
            content_type: content_type.to_string(),
        }
    })?;

    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    Ok(PathBuf::from(name))
}
