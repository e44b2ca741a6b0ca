//! URL and path manipulation utilities.
//!
//! This module provides functions for turning task URLs into values that are
//! safe to use on disk and for normalizing user-supplied URLs.

use url::Url;

use super::constants::DEFAULT_PROTOCOL_PREFIX;

/// Characters that may not appear in a directory name on any supported platform
const DISALLOWED_PATH_CHARS: &[char] = &['/', '\\', '>', '<', ':', '|', '?', '*'];

/// Build a directory name from a URL's host and path.
///
/// Every character that is not allowed in a file name is replaced with `-`, so
/// `https://example.com/a/b?q` becomes `example.com-a-b`.
pub fn dir_name_from_url(url: &str) -> Result<String, url::ParseError> {
    let parsed = Url::parse(url)?;
    let host = parsed.host_str().unwrap_or_default();
    let raw = format!("{host}{}", parsed.path());

    Ok(raw
        .chars()
        .map(|c| if DISALLOWED_PATH_CHARS.contains(&c) { '-' } else { c })
        .collect())
}

/// Add the default scheme to URLs given without one
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_PROTOCOL_PREFIX}{trimmed}")
    }
}

/// Check if a URL is valid for a site visit
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" => parsed.has_host(),
            "file" => true,
            _ => false,
        },
        Err(_) => false,
    }
}
