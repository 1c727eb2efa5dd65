use std::fmt::{Display, Formatter};

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Unavailable,
    Internal,
    Timeout,
    ResourceExhausted,
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::InvalidArgument,
            StatusCode::UNAUTHORIZED => Self::Unauthenticated,
            StatusCode::FORBIDDEN => Self::PermissionDenied,
            StatusCode::NOT_FOUND | StatusCode::GONE => Self::NotFound,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Self::Timeout,
            StatusCode::TOO_MANY_REQUESTS => Self::ResourceExhausted,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => Self::Unavailable,
            s if s.is_server_error() => Self::Internal,
            _ => Self::Unknown,
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() || err.is_request() {
            Self::Unavailable
        } else if let Some(status) = err.status() {
            Self::from_status(status)
        } else if err.is_decode() || err.is_body() {
            Self::Internal
        } else {
            Self::Unknown
        }
    }

    /// Maps an FCM v1 `errorCode` to a kind.
    pub fn from_fcm_code(code: &str) -> Self {
        match code {
            "UNAVAILABLE" => Self::Unavailable,
            "INTERNAL" => Self::Internal,
            "QUOTA_EXCEEDED" => Self::ResourceExhausted,
            "INVALID_ARGUMENT" => Self::InvalidArgument,
            "UNREGISTERED" => Self::NotFound,
            "SENDER_ID_MISMATCH" => Self::PermissionDenied,
            "THIRD_PARTY_AUTH_ERROR" => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable | Self::Internal | Self::Timeout | Self::ResourceExhausted
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
            Self::Timeout => "timeout",
            Self::ResourceExhausted => "resource_exhausted",
            Self::InvalidArgument => "invalid_argument",
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for ProviderErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Malformed queue record: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Template build failed: {0}")]
    Template(String),

    #[error("{provider} request failed ({kind}): {message}")]
    Provider {
        provider: &'static str,
        kind: ProviderErrorKind,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Retry limit exceeded after {attempts} attempts")]
    RetryLimitExceeded {
        attempts: u32,
        #[source]
        source: Option<Box<WorkerError>>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }

    pub fn provider(
        provider: &'static str,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider,
            kind,
            message: message.into(),
        }
    }

    pub fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        Self::provider(provider, ProviderErrorKind::from_reqwest(&err), err.to_string())
    }

    /// The innermost error, looking through `RetryLimitExceeded`.
    pub fn root(&self) -> &WorkerError {
        match self {
            Self::RetryLimitExceeded {
                source: Some(inner),
                ..
            } => inner.root(),
            other => other,
        }
    }
}

impl From<tokio::time::error::Elapsed> for WorkerError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::DeadlineExceeded
    }
}

/// Decides whether a failed record should be redelivered by the queue.
pub fn is_retryable(err: &WorkerError) -> bool {
    match err.root() {
        WorkerError::Cancelled | WorkerError::DeadlineExceeded => true,
        WorkerError::Provider { kind, .. } => kind.is_transient(),
        WorkerError::Database(_) => true,
        WorkerError::Internal(_) => true,
        WorkerError::MalformedPayload(_)
        | WorkerError::InvalidPayload(_)
        | WorkerError::NotFound(_)
        | WorkerError::Template(_) => false,
        WorkerError::RetryLimitExceeded { .. } => false,
    }
}

/// One record of a batch that failed with a retryable error.
#[derive(Debug)]
pub struct RecordFailure {
    pub index: usize,
    pub error: WorkerError,
}

#[derive(Debug, Error)]
#[error("{} record(s) failed with retryable errors", failures.len())]
pub struct BatchError {
    pub failures: Vec<RecordFailure>,
}

impl BatchError {
    pub fn contains(&self, index: usize) -> bool {
        self.failures.iter().any(|f| f.index == index)
    }
}
