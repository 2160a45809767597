// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Request admission: method, origin, content type, and declared size.
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. Method (`OPTIONS` is a preflight, anything but `POST` is rejected)
//! 2. Origin allow-list (absent origin is accepted, unreadable is not)
//! 3. Content-Type must include `application/json`
//! 4. Declared Content-Length must not exceed the body limit

use crate::config::AdmissionConfig;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use std::net::SocketAddr;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Methods advertised in preflight responses.
pub const ALLOWED_METHODS: &str = "POST, OPTIONS";

/// Request headers advertised in preflight responses.
pub const ALLOWED_HEADERS: &str = "Content-Type";

/// Admission failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("Origin not allowed: {0}")]
    OriginNotAllowed(String),

    #[error("Unsupported Content-Type: {0:?}")]
    UnsupportedContentType(Option<String>),

    #[error("Declared body of {declared} bytes exceeds limit of {limit}")]
    PayloadTooLarge { declared: u64, limit: usize },

    #[error("Body exceeds limit of {limit} bytes")]
    BodyLimitExceeded { limit: usize },
}

/// Outcome of admission for an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// CORS preflight; answer 204 without running the pipeline.
    Preflight,
    /// Continue with rate limiting.
    Proceed,
}

/// Origin allow-list with exact and wildcard-suffix entries.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    exact: Vec<String>,
    wildcards: Vec<WildcardOrigin>,
}

/// `scheme://*.suffix` rule, e.g. `https://*.pages.dev`.
#[derive(Debug, Clone)]
struct WildcardOrigin {
    scheme: String,
    suffix: String,
}

impl OriginPolicy {
    pub fn new(entries: &[String]) -> Self {
        let mut exact = Vec::new();
        let mut wildcards = Vec::new();

        for entry in entries {
            let entry = entry.trim().trim_end_matches('/');
            if entry.is_empty() {
                continue;
            }
            match entry.split_once("://*.") {
                Some((scheme, suffix)) if !suffix.is_empty() => wildcards.push(WildcardOrigin {
                    scheme: scheme.to_lowercase(),
                    suffix: suffix.to_lowercase(),
                }),
                _ => exact.push(entry.to_string()),
            }
        }

        Self { exact, wildcards }
    }

    /// Whether `origin` is on the allow-list.
    pub fn allows(&self, origin: &str) -> bool {
        if self.exact.iter().any(|allowed| allowed == origin) {
            return true;
        }
        if self.wildcards.is_empty() {
            return false;
        }

        let Ok(url) = Url::parse(origin) else {
            return false;
        };
        // An origin is scheme://host[:port] and nothing else.
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };

        self.wildcards.iter().any(|rule| {
            url.scheme() == rule.scheme
                && host
                    .strip_suffix(rule.suffix.as_str())
                    .and_then(|label| label.strip_suffix('.'))
                    .is_some_and(|label| !label.is_empty() && !label.ends_with('.'))
        })
    }
}

/// Admission checks plus the CORS header policy.
pub struct AdmissionGuard {
    config: AdmissionConfig,
    origins: OriginPolicy,
}

impl AdmissionGuard {
    pub fn new(config: AdmissionConfig) -> Self {
        let origins = OriginPolicy::new(&config.allowed_origins);
        Self { config, origins }
    }

    /// Maximum body size in bytes.
    pub fn max_body_bytes(&self) -> usize {
        self.config.max_body_bytes
    }

    /// Run the admission checks for one request.
    pub fn admit(&self, method: &Method, headers: &HeaderMap) -> Result<Admission, AdmissionError> {
        if *method != Method::POST && *method != Method::OPTIONS {
            return Err(AdmissionError::MethodNotAllowed(method.clone()));
        }

        if let Some(value) = headers.get(header::ORIGIN) {
            match value.to_str() {
                Ok(origin) => {
                    let origin = origin.trim();
                    if !origin.is_empty() && !self.origins.allows(origin) {
                        return Err(AdmissionError::OriginNotAllowed(origin.to_string()));
                    }
                }
                // Present but not visible ASCII: never on the allow-list.
                Err(_) => {
                    return Err(AdmissionError::OriginNotAllowed(
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    ))
                }
            }
        }

        if *method == Method::OPTIONS {
            return Ok(Admission::Preflight);
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("application/json") => {}
            _ => {
                return Err(AdmissionError::UnsupportedContentType(
                    content_type.map(str::to_string),
                ))
            }
        }

        if let Some(declared) = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            if declared > self.config.max_body_bytes as u64 {
                return Err(AdmissionError::PayloadTooLarge {
                    declared,
                    limit: self.config.max_body_bytes,
                });
            }
        }

        debug!(origin = ?request_origin(headers), "Request admitted");
        Ok(Admission::Proceed)
    }

    /// Value for `Access-Control-Allow-Origin`: the request origin when it is
    /// allowed, otherwise the canonical origin.
    pub fn cors_origin(&self, headers: &HeaderMap) -> String {
        match request_origin(headers) {
            Some(origin) if self.origins.allows(origin) => origin.to_string(),
            _ => self.config.canonical_origin.clone(),
        }
    }

    /// CORS headers carried by every response.
    pub fn cors_headers(&self, headers: &HeaderMap) -> HeaderMap {
        let mut cors = HeaderMap::new();
        if let Ok(origin) = HeaderValue::from_str(&self.cors_origin(headers)) {
            cors.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        cors.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        cors.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        cors.insert(header::VARY, HeaderValue::from_static("Origin"));
        cors
    }
}

fn request_origin(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client key for rate limiting.
///
/// Prefers `CF-Connecting-IP`, then the first `X-Forwarded-For` hop, then the
/// socket peer, then `0.0.0.0`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("cf-connecting-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        });

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "0.0.0.0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> AdmissionGuard {
        AdmissionGuard::new(AdmissionConfig {
            allowed_origins: vec![
                "https://example.com".to_string(),
                "https://*.preview.example.dev".to_string(),
            ],
            canonical_origin: "https://example.com".to_string(),
            max_body_bytes: 1024,
        })
    }

    fn json_headers(origin: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(origin) = origin {
            headers.insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
        }
        headers
    }

    #[test]
    fn test_non_post_methods_rejected() {
        let guard = guard();
        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH, Method::HEAD] {
            assert!(matches!(
                guard.admit(&method, &json_headers(None)),
                Err(AdmissionError::MethodNotAllowed(_))
            ));
        }
    }

    #[test]
    fn test_method_checked_before_origin() {
        let result = guard().admit(&Method::GET, &json_headers(Some("https://evil.test")));
        assert!(matches!(result, Err(AdmissionError::MethodNotAllowed(_))));
    }

    #[test]
    fn test_preflight() {
        let guard = guard();
        assert_eq!(
            guard.admit(&Method::OPTIONS, &HeaderMap::new()),
            Ok(Admission::Preflight)
        );
        assert!(matches!(
            guard.admit(&Method::OPTIONS, &json_headers(Some("https://evil.test"))),
            Err(AdmissionError::OriginNotAllowed(_))
        ));
    }

    #[test]
    fn test_origin_allow_list() {
        let guard = guard();
        assert_eq!(
            guard.admit(&Method::POST, &json_headers(Some("https://example.com"))),
            Ok(Admission::Proceed)
        );
        assert_eq!(guard.admit(&Method::POST, &json_headers(None)), Ok(Admission::Proceed));
        assert!(matches!(
            guard.admit(&Method::POST, &json_headers(Some("https://example.com.evil.test"))),
            Err(AdmissionError::OriginNotAllowed(_))
        ));
    }

    #[test]
    fn test_unreadable_origin_rejected() {
        let guard = guard();
        let mut headers = json_headers(None);
        headers.insert(
            header::ORIGIN,
            HeaderValue::from_bytes(b"https://example.com/\xff").unwrap(),
        );

        assert!(matches!(
            guard.admit(&Method::POST, &headers),
            Err(AdmissionError::OriginNotAllowed(_))
        ));
        assert!(matches!(
            guard.admit(&Method::OPTIONS, &headers),
            Err(AdmissionError::OriginNotAllowed(_))
        ));
        assert_eq!(guard.cors_origin(&headers), "https://example.com");
    }

    #[test]
    fn test_wildcard_suffix_rules() {
        let policy = OriginPolicy::new(&["https://*.pages.dev".to_string()]);

        assert!(policy.allows("https://feature-x.pages.dev"));
        assert!(policy.allows("https://a.b.pages.dev"));
        assert!(!policy.allows("https://pages.dev"));
        assert!(!policy.allows("https://evilpages.dev"));
        assert!(!policy.allows("http://feature-x.pages.dev"));
        assert!(!policy.allows("https://feature-x.pages.dev.evil.test"));
        assert!(!policy.allows("https://feature-x.pages.dev/path"));
        assert!(!policy.allows("not a url"));
    }

    #[test]
    fn test_content_type_required() {
        let guard = guard();
        let mut headers = HeaderMap::new();
        assert!(matches!(
            guard.admit(&Method::POST, &headers),
            Err(AdmissionError::UnsupportedContentType(None))
        ));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(matches!(
            guard.admit(&Method::POST, &headers),
            Err(AdmissionError::UnsupportedContentType(Some(_)))
        ));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert_eq!(guard.admit(&Method::POST, &headers), Ok(Admission::Proceed));
    }

    #[test]
    fn test_declared_length_bound() {
        let guard = guard();
        let mut headers = json_headers(None);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1024"));
        assert_eq!(guard.admit(&Method::POST, &headers), Ok(Admission::Proceed));

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1025"));
        assert!(matches!(
            guard.admit(&Method::POST, &headers),
            Err(AdmissionError::PayloadTooLarge { declared: 1025, limit: 1024 })
        ));
    }

    #[test]
    fn test_cors_origin_echo_and_default() {
        let guard = guard();
        assert_eq!(
            guard.cors_origin(&json_headers(Some("https://x.preview.example.dev"))),
            "https://x.preview.example.dev"
        );
        assert_eq!(guard.cors_origin(&json_headers(None)), "https://example.com");
        assert_eq!(
            guard.cors_origin(&json_headers(Some("https://evil.test"))),
            "https://example.com"
        );

        let cors = guard.cors_headers(&json_headers(None));
        assert_eq!(cors[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(cors[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "192.0.2.9:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, None), "0.0.0.0");
        assert_eq!(client_ip(&headers, Some(peer)), "192.0.2.9");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.5");

        headers.insert("cf-connecting-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(client_ip(&headers, Some(peer)), "198.51.100.7");
    }
}
