// crates/core/src/validate.rs
//! Submission validation. Runs before anything is persisted or spawned.

use std::time::Duration;

use clipper_types::{ClipRange, ErrorCode};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("video URL cannot be empty")]
    EmptyUrl,

    #[error("invalid video URL format: {0}")]
    MalformedUrl(String),

    #[error("unsupported URL scheme: {0} (only http and https are allowed)")]
    UnsupportedScheme(String),

    #[error("video URL has no host")]
    MissingHost,

    #[error("start time must be non-negative, got {0}")]
    NegativeStart(i64),

    #[error("end time ({end}) must be greater than start time ({start})")]
    EndNotAfterStart { start: i64, end: i64 },

    #[error("clip duration {requested}s exceeds the maximum of {max}s")]
    ClipTooLong { requested: u64, max: u64 },
}

impl ValidationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationError::EmptyUrl => ErrorCode::UrlRequired,
            ValidationError::MalformedUrl(_)
            | ValidationError::UnsupportedScheme(_)
            | ValidationError::MissingHost => ErrorCode::InvalidUrl,
            ValidationError::NegativeStart(_)
            | ValidationError::EndNotAfterStart { .. }
            | ValidationError::ClipTooLong { .. } => ErrorCode::InvalidTimeRange,
        }
    }
}

/// Trim `raw`, default a missing scheme to `https://`, and accept only
/// `http`/`https` URLs with a non-empty host.
pub fn normalize_url(raw: &str) -> Result<Url, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    let candidate = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|e| match e {
        url::ParseError::EmptyHost => ValidationError::MissingHost,
        other => ValidationError::MalformedUrl(other.to_string()),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ValidationError::MissingHost),
    }
}

/// True when `raw` opens with `scheme://`. A `://` later in the path or
/// query does not count.
fn has_scheme(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Check `[start, end)` against the clip ceiling.
pub fn validate_range(start: i64, end: i64, max: Duration) -> Result<ClipRange, ValidationError> {
    if start < 0 {
        return Err(ValidationError::NegativeStart(start));
    }
    if end <= start {
        return Err(ValidationError::EndNotAfterStart { start, end });
    }

    // Both non-negative from here on.
    let range = ClipRange {
        start_secs: start as u64,
        end_secs: end as u64,
    };
    let max_secs = max.as_secs();
    if range.duration_secs() > max_secs {
        return Err(ValidationError::ClipTooLong {
            requested: range.duration_secs(),
            max: max_secs,
        });
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_url_trimmed_and_kept() {
        let url = normalize_url("  https://example.com/v?id=1 ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/v?id=1");
    }

    #[test]
    fn test_missing_scheme_defaults_to_https() {
        assert_eq!(
            normalize_url("example.com/v").unwrap().as_str(),
            "https://example.com/v"
        );
        assert_eq!(
            normalize_url("example.com:8080/v").unwrap().as_str(),
            "https://example.com:8080/v"
        );
    }

    #[test]
    fn test_embedded_url_in_query_is_not_a_scheme() {
        assert_eq!(
            normalize_url("example.com/watch?next=https://other.example/x")
                .unwrap()
                .as_str(),
            "https://example.com/watch?next=https://other.example/x"
        );
        let url = normalize_url("youtube.com/redirect?q=http://a.b").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("youtube.com"));
    }

    #[test]
    fn test_http_allowed() {
        assert_eq!(normalize_url("http://example.com/v").unwrap().scheme(), "http");
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert_eq!(normalize_url(""), Err(ValidationError::EmptyUrl));
        assert_eq!(normalize_url("   \t"), Err(ValidationError::EmptyUrl));
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert_eq!(
            normalize_url("ftp://example.com/v"),
            Err(ValidationError::UnsupportedScheme("ftp".into()))
        );
        assert_eq!(
            normalize_url("file:///etc/passwd"),
            Err(ValidationError::UnsupportedScheme("file".into()))
        );
    }

    #[test]
    fn test_rejects_missing_host() {
        let err = normalize_url("https://").unwrap_err();
        assert_eq!(err, ValidationError::MissingHost);
        assert_eq!(err.code(), ErrorCode::InvalidUrl);
    }

    #[test]
    fn test_range_ok() {
        let range = validate_range(0, 30, HOUR).unwrap();
        assert_eq!(range, ClipRange { start_secs: 0, end_secs: 30 });
        assert!(validate_range(100, 3700, HOUR).is_ok());
    }

    #[test]
    fn test_range_rejections() {
        assert_eq!(validate_range(-1, 30, HOUR), Err(ValidationError::NegativeStart(-1)));
        assert_eq!(
            validate_range(10, 5, HOUR),
            Err(ValidationError::EndNotAfterStart { start: 10, end: 5 })
        );
        assert_eq!(
            validate_range(10, 10, HOUR),
            Err(ValidationError::EndNotAfterStart { start: 10, end: 10 })
        );
        assert_eq!(
            validate_range(0, 3601, HOUR),
            Err(ValidationError::ClipTooLong { requested: 3601, max: 3600 })
        );
        assert_eq!(
            validate_range(0, 3601, HOUR).unwrap_err().code(),
            ErrorCode::InvalidTimeRange
        );
    }
}
