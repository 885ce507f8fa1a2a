//! Error types shared by the classifier, the retry engine, and the coordinator.

use std::fmt;

/// High-level classification of a failed attempt.
///
/// Retryability is decided per error at classification time and carried on
/// [`ClassifiedError`]; a kind alone does not imply whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection refused/reset, DNS failure, and similar transport faults.
    Network,
    /// Connect or read deadline exceeded.
    Timeout,
    /// Structured response could not be decoded.
    Parsing,
    /// The field-extraction service rejected or failed the request.
    ExtractionService,
    /// The page fetch (automation) step failed.
    Automation,
    /// The key's circuit breaker was open; the operation was not invoked.
    CircuitOpen,
    /// The run was cancelled while the operation was in flight.
    Cancelled,
    /// Nothing more specific matched.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Parsing => "parsing",
            ErrorKind::ExtractionService => "extraction_service",
            ErrorKind::Automation => "automation",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure that has been through the classifier.
///
/// One is produced per failed attempt; the last one is what the caller sees
/// when retries are exhausted. Wrapping it in an `anyhow::Error` and handing
/// it back to the classifier returns it unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} error for {key} (attempt {attempt}): {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    /// Root cause text when it differs from `message`.
    pub cause: Option<String>,
    /// 1-based attempt that produced this error.
    pub attempt: u32,
    pub key: String,
    /// Unix milliseconds.
    pub occurred_at: i64,
    pub retryable: bool,
}

impl ClassifiedError {
    /// Error returned without invoking the operation because the key's breaker is open.
    pub fn circuit_open(key: &str, attempt: u32) -> Self {
        Self {
            kind: ErrorKind::CircuitOpen,
            message: format!("circuit breaker open for {key}"),
            cause: None,
            attempt,
            key: key.to_string(),
            occurred_at: unix_millis(),
            retryable: false,
        }
    }

    /// Error returned when a cancellation signal interrupts an attempt or a backoff wait.
    pub fn cancelled(key: &str, attempt: u32) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            message: "operation cancelled".to_string(),
            cause: None,
            attempt,
            key: key.to_string(),
            occurred_at: unix_millis(),
            retryable: false,
        }
    }
}

/// Pipeline stage an operation failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Fetching (rendering) the remote page.
    Fetch,
    /// Calling the field-extraction service.
    Extraction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => f.write_str("fetch"),
            Stage::Extraction => f.write_str("extraction"),
        }
    }
}

/// Failure raised by an operation that knows which stage it was in and,
/// for HTTP failures, the response status.
///
/// Operations return it inside an `anyhow::Error`; the classifier finds it
/// anywhere in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub stage: Stage,
    pub status: Option<u16>,
    pub message: String,
}

impl StageError {
    pub fn status(stage: Stage, status: u16, message: impl Into<String>) -> Self {
        Self {
            stage,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn other(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            status: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "{} failed with HTTP {}: {}", self.stage, code, self.message),
            None => write!(f, "{} failed: {}", self.stage, self.message),
        }
    }
}

impl std::error::Error for StageError {}

pub(crate) fn unix_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
