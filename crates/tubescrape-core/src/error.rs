//! Error types for the stream resolver
//!
//! Provides a single error enum covering transport, page parsing,
//! cipher resolution and query failures, with human-readable messages
//! and string serialization for JSON front-ends.

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::types::Availability;

/// Error type for all resolver operations
///
/// Implements Display for human-readable messages and Serialize
/// so it can be handed back to JSON-speaking callers unchanged.
#[derive(Error, Debug)]
pub enum TubeError {
    /// Connection reset, timeout or interrupted body; the caller may retry
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Rate limited by server (HTTP 429); retryable with backoff
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Non-retryable HTTP status (every 4xx/5xx except 429)
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Page layout changed beyond the recognized patterns
    #[error("Malformed page: {0}")]
    MalformedPage(String),

    /// The watch page reports the video as not playable
    #[error("Video {video_id} is unavailable ({reason}): {message}")]
    VideoUnavailable {
        video_id: String,
        reason: Availability,
        message: String,
    },

    /// The player script no longer matches the known obfuscation shape
    #[error("Unrecognized cipher scheme: {0}")]
    UnrecognizedCipherScheme(String),

    /// Filter or order key that the query engine does not know
    #[error("Unknown filter key: {0}")]
    UnknownFilterKey(String),

    /// Filter key given a value of the wrong kind
    #[error("Invalid value for filter '{key}': expected {expected}")]
    InvalidFilterValue { key: String, expected: &'static str },

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Every format of the video failed to resolve
    #[error("No playable streams for {video_id} ({dropped} formats dropped)")]
    NoPlayableStreams {
        video_id: String,
        dropped: usize,
        #[source]
        cause: Option<Box<TubeError>>,
    },

    /// Positional access past the end of a query view
    #[error("Index {index} out of range for {len} streams")]
    IndexOutOfRange { index: usize, len: usize },

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid video or playlist ID provided
    #[error("Invalid ID: {0}")]
    InvalidId(String),

    /// Client configuration that cannot be turned into a working client
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TubeError {
    /// Whether the operation that produced this error may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, TubeError::TransientNetwork(_) | TubeError::RateLimited)
    }
}

impl From<reqwest::Error> for TubeError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return TubeError::RateLimited;
            }
            return TubeError::HttpStatus {
                status: status.as_u16(),
                url: error.url().map(|u| u.to_string()).unwrap_or_default(),
            };
        }
        if error.is_builder() {
            return TubeError::InvalidUrl(error.to_string());
        }
        TubeError::TransientNetwork(error.to_string())
    }
}

impl Serialize for TubeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for resolver operations
pub type Result<T> = std::result::Result<T, TubeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_malformed_page() {
        let error = TubeError::MalformedPage("no player response".to_string());
        assert_eq!(error.to_string(), "Malformed page: no player response");
    }

    #[test]
    fn test_error_display_http_status() {
        let error = TubeError::HttpStatus {
            status: 404,
            url: "https://www.youtube.com/watch?v=x".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "HTTP 404 for https://www.youtube.com/watch?v=x"
        );
    }

    #[test]
    fn test_error_display_video_unavailable() {
        let error = TubeError::VideoUnavailable {
            video_id: "abcdefghijk".to_string(),
            reason: Availability::Private,
            message: "This video is private".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Video abcdefghijk is unavailable (private): This video is private"
        );
    }

    #[test]
    fn test_error_display_rate_limited() {
        let error = TubeError::RateLimited;
        assert_eq!(error.to_string(), "Rate limited - too many requests");
    }

    #[test]
    fn test_error_display_index_out_of_range() {
        let error = TubeError::IndexOutOfRange { index: 5, len: 2 };
        assert_eq!(error.to_string(), "Index 5 out of range for 2 streams");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TubeError::RateLimited.is_retryable());
        assert!(TubeError::TransientNetwork("reset".to_string()).is_retryable());
        assert!(
            !TubeError::HttpStatus {
                status: 503,
                url: String::new()
            }
            .is_retryable()
        );
        assert!(!TubeError::UnrecognizedCipherScheme("x".to_string()).is_retryable());
        assert!(!TubeError::MalformedPage("x".to_string()).is_retryable());
    }

    #[test]
    fn test_no_playable_streams_keeps_cause() {
        use std::error::Error;

        let error = TubeError::NoPlayableStreams {
            video_id: "abcdefghijk".to_string(),
            dropped: 3,
            cause: Some(Box::new(TubeError::UnrecognizedCipherScheme(
                "no decode function".to_string(),
            ))),
        };
        assert_eq!(
            error.to_string(),
            "No playable streams for abcdefghijk (3 formats dropped)"
        );
        let source = error.source().expect("cause should be exposed as source");
        assert!(source.to_string().contains("no decode function"));
    }

    #[test]
    fn test_error_serialize() {
        let error = TubeError::RateLimited;
        let json = serde_json::to_string(&error).expect("Serialization should succeed");
        assert_eq!(json, "\"Rate limited - too many requests\"");
    }

    #[test]
    fn test_error_serialize_with_message() {
        let error = TubeError::NotFound("itag 999".to_string());
        let json = serde_json::to_string(&error).expect("Serialization should succeed");
        assert_eq!(json, "\"Not found: itag 999\"");
    }
}
