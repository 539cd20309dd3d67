// crates/types/src/error_code.rs
//! Stable numeric error codes returned to API clients.
//!
//! The first three digits are the HTTP status; the last three disambiguate
//! within it. Codes are part of the public contract and must never be
//! renumbered.

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidRequest,
    UrlRequired,
    JobIdRequired,
    InvalidTimeRange,
    InvalidUrl,
    JobNotFound,
    TooManyRequests,
    LaunchFailed,
    Internal,
}

impl ErrorCode {
    pub fn code(&self) -> u32 {
        match self {
            ErrorCode::InvalidRequest => 400001,
            ErrorCode::UrlRequired => 400002,
            ErrorCode::JobIdRequired => 400003,
            ErrorCode::InvalidTimeRange => 400004,
            ErrorCode::InvalidUrl => 400005,
            ErrorCode::JobNotFound => 404001,
            ErrorCode::TooManyRequests => 429001,
            ErrorCode::LaunchFailed => 500001,
            ErrorCode::Internal => 500004,
        }
    }

    /// HTTP status carried by this code.
    pub fn http_status(&self) -> u16 {
        (self.code() / 1000) as u16
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid request",
            ErrorCode::UrlRequired => "url is required",
            ErrorCode::JobIdRequired => "job id is required",
            ErrorCode::InvalidTimeRange => "invalid time range",
            ErrorCode::InvalidUrl => "invalid url",
            ErrorCode::JobNotFound => "job not found",
            ErrorCode::TooManyRequests => "too many requests, please try again later",
            ErrorCode::LaunchFailed => "failed to start job",
            ErrorCode::Internal => "internal error",
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}
