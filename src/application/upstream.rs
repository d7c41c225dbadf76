//! Contract for the external picture-of-the-day provider.

use async_trait::async_trait;
use thiserror::Error;
use time::Date;

use crate::domain::apod::RawRecord;

/// Classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchFailureKind {
    Unauthorized,
    RateLimited,
    NetworkError,
    MalformedResponse,
}

impl FetchFailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchFailureKind::Unauthorized => "unauthorized",
            FetchFailureKind::RateLimited => "rate_limited",
            FetchFailureKind::NetworkError => "network_error",
            FetchFailureKind::MalformedResponse => "malformed_response",
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            FetchFailureKind::Unauthorized => "API key invalid or unauthorized",
            FetchFailureKind::RateLimited => "Rate limit exceeded",
            FetchFailureKind::NetworkError => "Network error when contacting NASA APOD",
            FetchFailureKind::MalformedResponse => "Unexpected response format",
        }
    }
}

/// A single failed upstream call. The message is safe to show to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchFailure {
    kind: FetchFailureKind,
    message: String,
}

impl FetchFailure {
    pub fn new(kind: FetchFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::of_kind(FetchFailureKind::Unauthorized)
    }

    pub fn rate_limited() -> Self {
        Self::of_kind(FetchFailureKind::RateLimited)
    }

    pub fn network() -> Self {
        Self::of_kind(FetchFailureKind::NetworkError)
    }

    pub fn malformed() -> Self {
        Self::of_kind(FetchFailureKind::MalformedResponse)
    }

    fn of_kind(kind: FetchFailureKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    pub fn kind(&self) -> FetchFailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Source of raw records. `None` asks for the most recent record.
///
/// Implementations perform exactly one outbound call per invocation and never retry.
#[async_trait]
pub trait ApodSource: Send + Sync {
    async fn fetch(&self, date: Option<Date>) -> Result<RawRecord, FetchFailure>;
}
