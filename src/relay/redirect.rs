//! Redirect hops.
//!
//! The pooled client never follows redirects; the engine walks the chain
//! with these helpers so the caller's cap is applied per call.

use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION, PROXY_AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};

use crate::relay::error::{FailureCode, TransportFailure};

/// The request to send after a redirect.
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    pub url: Url,
    pub method: Method,
    /// False when the redirect turns the call into a body-less `GET`.
    pub keep_body: bool,
}

/// `Location` of a followable redirect, if `status` is one.
pub fn location(status: StatusCode, headers: &HeaderMap) -> Option<&str> {
    match status {
        StatusCode::MOVED_PERMANENTLY
        | StatusCode::FOUND
        | StatusCode::SEE_OTHER
        | StatusCode::TEMPORARY_REDIRECT
        | StatusCode::PERMANENT_REDIRECT => headers.get(LOCATION).and_then(|v| v.to_str().ok()),
        _ => None,
    }
}

/// Resolve the next hop from the current URL and a `Location` value.
///
/// 303 always becomes `GET` (except `HEAD`); 301/302 turn a `POST` into
/// `GET`. 307/308 keep method and body.
pub fn next_hop(current: &Url, status: StatusCode, method: &Method, location: &str) -> Result<Hop, TransportFailure> {
    let url = current.join(location).map_err(|e| {
        TransportFailure::new(
            FailureCode::InvalidUrl,
            format!("Invalid redirect location '{}': {}", location, e),
        )
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(TransportFailure::new(
            FailureCode::InvalidUrl,
            format!("Unsupported redirect scheme '{}'", url.scheme()),
        ));
    }

    let rewrite = match status {
        StatusCode::SEE_OTHER => *method != Method::HEAD,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => *method == Method::POST,
        _ => false,
    };

    Ok(if rewrite {
        Hop {
            url,
            method: Method::GET,
            keep_body: false,
        }
    } else {
        Hop {
            url,
            method: method.clone(),
            keep_body: true,
        }
    })
}

/// Adjust outbound headers for `hop`: credentials stay on the original
/// origin, and body headers go with the body.
pub fn prepare_headers(previous: &Url, hop: &Hop, headers: &mut HeaderMap) {
    let same_origin = previous.scheme() == hop.url.scheme()
        && previous.host_str() == hop.url.host_str()
        && previous.port_or_known_default() == hop.url.port_or_known_default();
    if !same_origin {
        headers.remove(AUTHORIZATION);
        headers.remove(COOKIE);
        headers.remove(PROXY_AUTHORIZATION);
    }
    if !hop.keep_body {
        headers.remove(CONTENT_TYPE);
        headers.remove(CONTENT_LENGTH);
    }
}

/// Failure for a chain longer than the caller allowed.
pub fn too_many(max: usize) -> TransportFailure {
    TransportFailure::new(
        FailureCode::TooManyRedirects,
        format!("Maximum number of redirects exceeded ({})", max),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_location_only_for_redirect_statuses() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("/next"));

        assert_eq!(location(StatusCode::FOUND, &headers), Some("/next"));
        assert_eq!(location(StatusCode::PERMANENT_REDIRECT, &headers), Some("/next"));
        assert_eq!(location(StatusCode::OK, &headers), None);
        // 304 carries no new target.
        assert_eq!(location(StatusCode::NOT_MODIFIED, &headers), None);
        assert_eq!(location(StatusCode::FOUND, &HeaderMap::new()), None);
    }

    #[test]
    fn test_relative_location_resolves_against_current() {
        let hop = next_hop(&url("http://a.test/x/y?q=1"), StatusCode::FOUND, &Method::GET, "../z").unwrap();
        assert_eq!(hop.url.as_str(), "http://a.test/z");
        assert_eq!(hop.method, Method::GET);
        assert!(hop.keep_body);
    }

    #[test]
    fn test_method_rewrites() {
        let current = url("http://a.test/");

        let see_other = next_hop(&current, StatusCode::SEE_OTHER, &Method::PUT, "/done").unwrap();
        assert_eq!(see_other.method, Method::GET);
        assert!(!see_other.keep_body);

        let head = next_hop(&current, StatusCode::SEE_OTHER, &Method::HEAD, "/done").unwrap();
        assert_eq!(head.method, Method::HEAD);

        let found = next_hop(&current, StatusCode::FOUND, &Method::POST, "/done").unwrap();
        assert_eq!(found.method, Method::GET);
        assert!(!found.keep_body);

        let temporary = next_hop(&current, StatusCode::TEMPORARY_REDIRECT, &Method::POST, "/done").unwrap();
        assert_eq!(temporary.method, Method::POST);
        assert!(temporary.keep_body);
    }

    #[test]
    fn test_non_http_location_rejected() {
        let err = next_hop(&url("http://a.test/"), StatusCode::FOUND, &Method::GET, "ftp://b.test/").unwrap_err();
        assert_eq!(err.code, FailureCode::InvalidUrl);
    }

    #[test]
    fn test_credentials_dropped_across_origins() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        headers.insert(COOKIE, HeaderValue::from_static("a=1"));
        headers.insert("x-custom", HeaderValue::from_static("kept"));

        let previous = url("http://a.test/");
        let same = next_hop(&previous, StatusCode::FOUND, &Method::GET, "/other").unwrap();
        let mut kept = headers.clone();
        prepare_headers(&previous, &same, &mut kept);
        assert!(kept.contains_key(AUTHORIZATION));

        let other = next_hop(&previous, StatusCode::FOUND, &Method::GET, "http://b.test/").unwrap();
        prepare_headers(&previous, &other, &mut headers);
        assert!(!headers.contains_key(AUTHORIZATION));
        assert!(!headers.contains_key(COOKIE));
        assert_eq!(headers.get("x-custom").unwrap(), "kept");
    }

    #[test]
    fn test_body_headers_follow_the_body() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let previous = url("http://a.test/");
        let hop = next_hop(&previous, StatusCode::SEE_OTHER, &Method::POST, "/done").unwrap();
        prepare_headers(&previous, &hop, &mut headers);
        assert!(!headers.contains_key(CONTENT_TYPE));
    }
}
