//! Error handling for the job matcher

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed or undersized text, wrong vector dimension.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Embedding or geocoding backend unavailable or rate limited.
    #[error("Provider error: {message}")]
    Provider { message: String, retryable: bool },

    #[error("Provider call timed out after {0} ms")]
    Timeout(u64),

    /// Corrupt structured snapshot. Callers recover these as empty data.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Query-time failure. Carries the stage that could not run.
    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, MatcherError>;

impl MatcherError {
    /// Whether a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MatcherError::Provider { retryable, .. } => *retryable,
            MatcherError::Timeout(_) => true,
            _ => false,
        }
    }

    pub fn provider(message: impl Into<String>, retryable: bool) -> Self {
        MatcherError::Provider {
            message: message.into(),
            retryable,
        }
    }
}

/// Convert anyhow errors to our custom error type
impl From<anyhow::Error> for MatcherError {
    fn from(err: anyhow::Error) -> Self {
        MatcherError::InvalidInput(err.to_string())
    }
}

impl From<reqwest::Error> for MatcherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured duration on the error
            return MatcherError::Timeout(0);
        }
        let retryable = err.is_connect()
            || err.is_request()
            || err
                .status()
                .map(|s| s.is_server_error() || s.as_u16() == 429)
                .unwrap_or(false);
        MatcherError::Provider {
            message: err.to_string(),
            retryable,
        }
    }
}

/// Pipeline stage of the matching engine, used to attribute query failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    Category,
    Geo,
    Vector,
    Requirement,
    Rank,
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchStage::Category => "category",
            MatchStage::Geo => "geo",
            MatchStage::Vector => "vector",
            MatchStage::Requirement => "requirement",
            MatchStage::Rank => "rank",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MatchFailure {
    InsufficientProfile(String),
    IncompleteLocation(String),
    InvalidQuery(String),
}

/// Structured query-time failure naming the stage that could not run.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{stage} stage failed: {failure:?}")]
pub struct MatchError {
    pub stage: MatchStage,
    pub failure: MatchFailure,
}

impl MatchError {
    pub fn insufficient_profile(stage: MatchStage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            failure: MatchFailure::InsufficientProfile(detail.into()),
        }
    }

    pub fn incomplete_location(detail: impl Into<String>) -> Self {
        Self {
            stage: MatchStage::Geo,
            failure: MatchFailure::IncompleteLocation(detail.into()),
        }
    }

    pub fn invalid_query(stage: MatchStage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            failure: MatchFailure::InvalidQuery(detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(MatcherError::provider("503", true).is_retryable());
        assert!(!MatcherError::provider("bad dims", false).is_retryable());
        assert!(MatcherError::Timeout(1000).is_retryable());
        assert!(!MatcherError::Validation("short".into()).is_retryable());
    }

    #[test]
    fn test_match_error_names_stage() {
        let err = MatchError::insufficient_profile(MatchStage::Vector, "candidate has no vector");
        assert_eq!(err.stage, MatchStage::Vector);
        assert!(err.to_string().starts_with("vector stage failed"));

        let converted: MatcherError = err.clone().into();
        assert!(matches!(&converted, MatcherError::Match(inner) if *inner == err));
        assert!(!converted.is_retryable());
    }
}
