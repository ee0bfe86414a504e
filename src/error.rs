//! Error types for uwsgi-exporter
//!
//! This module defines the error types used throughout the application.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// 단일 stats 서버(target) 처리 에러
///
/// 어떤 variant든 해당 target 하나의 처리만 중단시킵니다.
#[derive(Error, Debug)]
pub enum TargetError {
    /// target 문자열을 URL로 해석할 수 없음
    #[error("Could not parse uWSGI stats server url '{target}': {reason}")]
    Parse { target: String, reason: String },

    /// 소켓 연결 실패 (connection refused, 없는 소켓 경로 등)
    #[error("Could not connect to uWSGI stats server '{target}': {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// 연결 타임아웃
    #[error("Timed out waiting for uWSGI stats server '{target}' after {timeout_ms}ms")]
    Timeout { target: String, timeout_ms: u64 },

    /// HTTP 요청 실패
    #[error("HTTP request to uWSGI stats server '{target}' failed: {source}")]
    Http {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP 상태 코드 에러
    #[error("uWSGI stats server '{target}' returned HTTP status {status}")]
    HttpStatus { target: String, status: u16 },
}

impl TargetError {
    /// 에러를 유발한 target 문자열
    pub fn target(&self) -> &str {
        match self {
            TargetError::Parse { target, .. }
            | TargetError::Connect { target, .. }
            | TargetError::Timeout { target, .. }
            | TargetError::Http { target, .. }
            | TargetError::HttpStatus { target, .. } => target,
        }
    }

    /// 연결 단계 에러인지 확인 (파싱 에러가 아닌 경우)
    pub fn is_connection(&self) -> bool {
        !matches!(self, TargetError::Parse { .. })
    }

    pub(crate) fn parse(target: &str, reason: impl Into<String>) -> Self {
        TargetError::Parse {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    /// reqwest 에러를 분류하여 변환
    pub(crate) fn from_reqwest(target: &str, timeout_ms: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TargetError::Timeout {
                target: target.to_string(),
                timeout_ms,
            }
        } else {
            TargetError::Http {
                target: target.to_string(),
                source: err,
            }
        }
    }
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// HTTP client initialization error
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClientInit(#[source] reqwest::Error),

    /// Stats server error
    #[error("Target error: {0}")]
    Target(#[from] TargetError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, public_message, log_message) = match self {
            AppError::Config(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error",
                e.to_string(),
            ),
            AppError::HttpClientInit(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
                e.to_string(),
            ),
            AppError::Target(e) => (StatusCode::BAD_GATEWAY, "Upstream error", e.to_string()),
        };

        tracing::error!(status = %status, error = %log_message, "Request failed");

        (status, public_message).into_response()
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_is_not_connection() {
        let err = TargetError::parse("not a url", "invalid character");
        assert!(!err.is_connection());
        assert_eq!(err.target(), "not a url");
        assert!(err.to_string().contains("'not a url'"));
    }

    #[test]
    fn test_connect_error_names_target_and_cause() {
        let err = TargetError::Connect {
            target: "unix:///tmp/stats.sock".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.is_connection());
        let message = err.to_string();
        assert!(message.contains("/tmp/stats.sock"));
        assert!(message.contains("no such file"));
    }

    #[test]
    fn test_timeout_error_message() {
        let err = TargetError::Timeout {
            target: "tcp://10.0.0.1:1717".to_string(),
            timeout_ms: 5000,
        };
        assert!(err.is_connection());
        assert!(err.to_string().contains("after 5000ms"));
    }

    #[test]
    fn test_app_error_into_response_status() {
        let err = AppError::Target(TargetError::HttpStatus {
            target: "http://localhost:1717".to_string(),
            status: 503,
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
