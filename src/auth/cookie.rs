//! Session cookie parsing.

use axum::http::{HeaderMap, header};

/// Cookie carrying the server-side session id.
pub const SESSION_COOKIE_NAME: &str = "session_id";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_cookie_simple() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session_id=abc123"));

        assert_eq!(get_cookie(&headers, SESSION_COOKIE_NAME), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; session_id=abc123; lang=en"),
        );

        assert_eq!(get_cookie(&headers, SESSION_COOKIE_NAME), Some("abc123"));
        assert_eq!(get_cookie(&headers, "lang"), Some("en"));
    }

    #[test]
    fn test_get_cookie_not_found() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));

        assert_eq!(get_cookie(&headers, SESSION_COOKIE_NAME), None);
    }

    #[test]
    fn test_get_cookie_no_header() {
        assert_eq!(get_cookie(&HeaderMap::new(), SESSION_COOKIE_NAME), None);
    }

    #[test]
    fn test_get_cookie_with_spaces() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("  session_id = abc123  ; foo=bar"),
        );

        assert_eq!(get_cookie(&headers, SESSION_COOKIE_NAME), Some("abc123"));
    }
}
