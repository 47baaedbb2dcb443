//! Participant identity suffix handling.
//!
//! The issuer appends a short random suffix to the display name to form the
//! participant identity (`name__suffix`). The suffix is handed back in the
//! `random-participant-postfix` cookie so that a browser rejoining within two
//! hours keeps the same identity.
//!
//! # Security
//!
//! - Suffixes are generated with `ring::rand::SystemRandom` (CSPRNG)
//! - Cookie values are only reused when they are short and alphanumeric;
//!   anything else is discarded and replaced
//! - Cookie values are never logged

use crate::errors::IssuerError;
use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use common::types::IDENTITY_COOKIE_NAME;
use ring::rand::{SecureRandom, SystemRandom};

/// Length of a freshly generated suffix.
pub const SUFFIX_LENGTH: usize = 4;

/// Longest cookie value accepted for reuse.
pub const MAX_REUSED_SUFFIX_LENGTH: usize = 32;

/// Cookie lifetime.
pub const COOKIE_LIFETIME_MINUTES: i64 = 120;

const SUFFIX_ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

// Largest multiple of 36 that fits in a byte. Bytes at or above it are
// rejected so every character is equally likely.
const REJECTION_THRESHOLD: u8 = 252;

/// Where the suffix for this request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixSource {
    Cookie,
    Generated,
}

/// Suffix to use for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSuffix {
    pub value: String,
    pub source: SuffixSource,
}

/// Use the suffix from the request cookie when it is safe, otherwise
/// generate a new one.
///
/// # Errors
///
/// Returns `IssuerError::Internal` if the system RNG fails.
pub fn resolve_suffix(headers: &HeaderMap) -> Result<ResolvedSuffix, IssuerError> {
    match cookie_value(headers, IDENTITY_COOKIE_NAME) {
        Some(value) if is_safe_suffix(value) => Ok(ResolvedSuffix {
            value: value.to_string(),
            source: SuffixSource::Cookie,
        }),
        Some(_) => {
            tracing::debug!(target: "issuer.services.identity", "Discarding unusable identity cookie");
            Ok(ResolvedSuffix {
                value: generate_suffix()?,
                source: SuffixSource::Generated,
            })
        }
        None => Ok(ResolvedSuffix {
            value: generate_suffix()?,
            source: SuffixSource::Generated,
        }),
    }
}

/// Find a cookie by name across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
}

/// 1 to 32 ASCII alphanumeric characters.
pub fn is_safe_suffix(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_REUSED_SUFFIX_LENGTH
        && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Generate a 4-character suffix from `[a-z0-9]`.
///
/// # Errors
///
/// Returns `IssuerError::Internal` if the system RNG fails.
pub fn generate_suffix() -> Result<String, IssuerError> {
    let rng = SystemRandom::new();
    let mut suffix = String::with_capacity(SUFFIX_LENGTH);
    let mut buf = [0u8; 16];

    while suffix.len() < SUFFIX_LENGTH {
        rng.fill(&mut buf).map_err(|_| {
            tracing::error!(target: "issuer.services.identity", "Failed to generate random bytes");
            IssuerError::Internal("Failed to generate participant identity".to_string())
        })?;

        for byte in buf {
            if suffix.len() == SUFFIX_LENGTH {
                break;
            }
            if byte < REJECTION_THRESHOLD {
                if let Some(&c) = SUFFIX_ALPHABET.get(usize::from(byte % 36)) {
                    suffix.push(char::from(c));
                }
            }
        }
    }

    Ok(suffix)
}

/// `Set-Cookie` value carrying the suffix, expiring two hours after `now`.
pub fn build_cookie(suffix: &str, now: DateTime<Utc>) -> String {
    let expires = now + Duration::minutes(COOKIE_LIFETIME_MINUTES);
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Secure; Expires={}",
        IDENTITY_COOKIE_NAME,
        suffix,
        expires.format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_generate_suffix_shape() {
        for _ in 0..100 {
            let suffix = generate_suffix().unwrap();
            assert_eq!(suffix.len(), SUFFIX_LENGTH);
            assert!(suffix
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generate_suffix_varies() {
        let suffixes: HashSet<String> = (0..50).map(|_| generate_suffix().unwrap()).collect();
        // 36^4 possibilities; 50 draws colliding down to a handful means a broken RNG
        assert!(suffixes.len() > 40);
    }

    #[test]
    fn test_is_safe_suffix() {
        assert!(is_safe_suffix("abcd"));
        assert!(is_safe_suffix("A1"));
        assert!(is_safe_suffix(&"a".repeat(32)));

        assert!(!is_safe_suffix(""));
        assert!(!is_safe_suffix(&"a".repeat(33)));
        assert!(!is_safe_suffix("ab-cd"));
        assert!(!is_safe_suffix("ab cd"));
        assert!(!is_safe_suffix("<script>"));
        assert!(!is_safe_suffix("abcé"));
    }

    #[test]
    fn test_cookie_value_finds_named_cookie() {
        let headers = headers_with_cookie("theme=dark; random-participant-postfix=abcd; other=1");
        assert_eq!(
            cookie_value(&headers, IDENTITY_COOKIE_NAME),
            Some("abcd")
        );
        assert_eq!(cookie_value(&headers, "theme"), Some("dark"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_value_across_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("random-participant-postfix=zz99"),
        );
        assert_eq!(cookie_value(&headers, IDENTITY_COOKIE_NAME), Some("zz99"));
    }

    #[test]
    fn test_resolve_suffix_reuses_cookie() {
        let headers = headers_with_cookie("random-participant-postfix=abcd");
        let resolved = resolve_suffix(&headers).unwrap();
        assert_eq!(resolved.value, "abcd");
        assert_eq!(resolved.source, SuffixSource::Cookie);
    }

    #[test]
    fn test_resolve_suffix_generates_without_cookie() {
        let resolved = resolve_suffix(&HeaderMap::new()).unwrap();
        assert_eq!(resolved.value.len(), SUFFIX_LENGTH);
        assert_eq!(resolved.source, SuffixSource::Generated);
    }

    #[test]
    fn test_resolve_suffix_replaces_unsafe_cookie() {
        let headers = headers_with_cookie("random-participant-postfix=a%3Bb");
        let resolved = resolve_suffix(&headers).unwrap();
        assert_ne!(resolved.value, "a%3Bb");
        assert_eq!(resolved.source, SuffixSource::Generated);
    }

    #[test]
    fn test_resolve_suffix_replaces_empty_cookie() {
        let headers = headers_with_cookie("random-participant-postfix=");
        let resolved = resolve_suffix(&headers).unwrap();
        assert_eq!(resolved.value.len(), SUFFIX_LENGTH);
        assert_eq!(resolved.source, SuffixSource::Generated);
    }

    #[test]
    fn test_build_cookie_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        let cookie = build_cookie("abcd", now);
        assert_eq!(
            cookie,
            "random-participant-postfix=abcd; Path=/; HttpOnly; SameSite=Strict; Secure; \
             Expires=Tue, 05 Mar 2024 12:00:00 GMT"
        );
    }

    #[test]
    fn test_build_cookie_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 30, 0).unwrap();
        let cookie = build_cookie("x1", now);
        assert!(cookie.ends_with("Expires=Wed, 01 Jan 2025 01:30:00 GMT"));
    }
}
