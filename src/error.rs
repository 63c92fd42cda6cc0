//! Error types for prom2hny
//!
//! This module defines the error types used throughout the application.
//! The grouping engine itself never fails; everything here belongs to the
//! scrape, decode and delivery stages around it.

use thiserror::Error;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Collector error
    #[error("Collector error: {0}")]
    Collector(#[from] CollectorError),

    /// Event delivery error
    #[error("Send error: {0}")]
    Send(#[from] SendError),
}

/// Scrape and decode errors
#[derive(Error, Debug)]
pub enum CollectorError {
    /// HTTP 클라이언트 초기화 실패
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClientInit(#[source] reqwest::Error),

    /// HTTP 요청 실패
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[source] reqwest::Error),

    /// HTTP 응답 읽기 실패
    #[error("Failed to read HTTP response: {0}")]
    HttpResponse(#[source] reqwest::Error),

    /// HTTP 상태 코드 에러
    #[error("HTTP error status: {0}")]
    HttpStatus(u16),

    /// 타임아웃
    /// The value is the configured timeout in milliseconds, if known.
    #[error("Request timed out{}", .0.map(|ms| format!(" after {}ms", ms)).unwrap_or_default())]
    Timeout(Option<u64>),

    /// 연결 실패
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Delimited protobuf body could not be decoded
    #[error("Error reading metric family protobuf: {0}")]
    ProtobufDecode(#[from] prost::DecodeError),

    /// Text exposition body could not be parsed
    #[error("Error reading metric family text response at line {line}: {message}")]
    TextParse { line: usize, message: String },

    /// 최대 재시도 초과
    #[error("Maximum retries exceeded")]
    MaxRetriesExceeded,
}

impl CollectorError {
    /// 재시도 가능한 에러인지 확인
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CollectorError::HttpRequest(_)
                | CollectorError::HttpResponse(_)
                | CollectorError::Timeout(..)
                | CollectorError::ConnectionFailed(_)
                | CollectorError::HttpStatus(500..=599)
        )
    }

    /// HTTP 상태 코드 추출
    pub fn http_status(&self) -> Option<u16> {
        match self {
            CollectorError::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }

    /// Create a Timeout error with known duration
    pub fn timeout_with_duration(ms: u64) -> Self {
        CollectorError::Timeout(Some(ms))
    }

    pub(crate) fn text_parse(line: usize, message: impl Into<String>) -> Self {
        CollectorError::TextParse {
            line,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CollectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest doesn't expose the configured timeout duration here.
            CollectorError::Timeout(None)
        } else if err.is_connect() {
            CollectorError::ConnectionFailed(err.to_string())
        } else if err.is_request() {
            CollectorError::HttpRequest(err)
        } else {
            CollectorError::HttpResponse(err)
        }
    }
}

/// Event delivery errors
#[derive(Error, Debug)]
pub enum SendError {
    /// HTTP client could not be built
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClientInit(#[source] reqwest::Error),

    /// Batch endpoint could not be derived from the API host
    #[error("Invalid API host '{host}': {reason}")]
    InvalidEndpoint { host: String, reason: String },

    /// Transport failure while posting a batch
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[source] reqwest::Error),

    /// Non-success status for the whole batch
    #[error("HTTP error status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Batch response body was not the expected per-event status list
    #[error("Failed to parse batch response: {0}")]
    ResponseParse(String),

    /// Events could not be serialized
    #[error("Failed to serialize events: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing events to a local stream failed
    #[error("Failed to write events: {0}")]
    Io(#[from] std::io::Error),

    /// 최대 재시도 초과
    #[error("Maximum retries exceeded")]
    MaxRetriesExceeded,
}

impl SendError {
    /// Whether the batch may succeed if posted again
    pub fn is_retryable(&self) -> bool {
        match self {
            SendError::HttpRequest(_) => true,
            SendError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;
