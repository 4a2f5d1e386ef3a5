//! Pulling a candidate token out of request headers.

use axum::http::{HeaderMap, HeaderName};
use thiserror::Error;

use super::config::PrefixStrip;

/// A token header was present but not valid visible ASCII.
#[derive(Debug, Error)]
#[error("malformed {0} header")]
pub struct MalformedHeader(pub HeaderName);

/// Return the value of the first header in `names` that is present and
/// non-empty.
pub fn extract_token<'a>(
    headers: &'a HeaderMap,
    names: &[HeaderName],
) -> Result<Option<&'a str>, MalformedHeader> {
    for name in names {
        let Some(value) = headers.get(name) else {
            continue;
        };
        let value = value.to_str().map_err(|_| MalformedHeader(name.clone()))?;
        if !value.is_empty() {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Remove scheme prefixes from a header value.
pub fn strip_prefixes(value: &str, prefixes: &[String], mode: PrefixStrip) -> String {
    match mode {
        PrefixStrip::ReplaceAll => prefixes
            .iter()
            .fold(value.to_string(), |acc, prefix| acc.replace(prefix.as_str(), "")),
        PrefixStrip::Leading => prefixes
            .iter()
            .find_map(|prefix| value.strip_prefix(prefix.as_str()))
            .unwrap_or(value)
            .to_string(),
    }
}
