//! CSRF token round-trip between the browser session and hydra admin calls.
//!
//! Hydra sets `oauth2_authentication_csrf` on the browser when a challenge is
//! minted. The token reaches us either inside a submitted JSON body or as a
//! cookie, and has to be echoed on every admin call for the same challenge so
//! hydra can bind the decision to the originating session.

use axum::http::{header, HeaderMap};

pub const CSRF_COOKIE: &str = "oauth2_authentication_csrf";

/// Read the CSRF token from the request's `Cookie` header.
#[must_use]
pub fn from_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == CSRF_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Body field first, cookie fallback. Never fails; an absent token is a
/// decision for hydra, not for us.
#[must_use]
pub fn extract(body_csrf: Option<&str>, headers: &HeaderMap) -> Option<String> {
    match body_csrf {
        Some(token) if !token.is_empty() => Some(token.to_string()),
        _ => from_cookie(headers),
    }
}

/// Format the `Set-Cookie` value propagated on admin calls and redirects.
#[must_use]
pub fn cookie_header(csrf: &str) -> String {
    format!("{CSRF_COOKIE}={csrf}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_from_cookie() {
        let headers =
            headers_with_cookie("foo=bar; oauth2_authentication_csrf=abc123; baz=qux");
        assert_eq!(from_cookie(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_from_cookie_absent() {
        let headers = headers_with_cookie("foo=bar");
        assert_eq!(from_cookie(&headers), None);
        assert_eq!(from_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn test_body_takes_precedence() {
        let headers = headers_with_cookie("oauth2_authentication_csrf=from-cookie");
        assert_eq!(
            extract(Some("from-body"), &headers).as_deref(),
            Some("from-body")
        );
    }

    #[test]
    fn test_empty_body_token_falls_back_to_cookie() {
        let headers = headers_with_cookie("oauth2_authentication_csrf=from-cookie");
        assert_eq!(extract(Some(""), &headers).as_deref(), Some("from-cookie"));
        assert_eq!(extract(None, &headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_cookie_header_format() {
        assert_eq!(
            cookie_header("abc123"),
            "oauth2_authentication_csrf=abc123"
        );
    }
}
