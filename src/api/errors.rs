use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: status code {status_code}, message: {message}")]
    ServerError {
        status_code: u16,
        message: String,
    },

    #[error("Request timed out")]
    Timeout,

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ApiError {
    pub fn server_error(status_code: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status_code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ServerError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

/// 按 reqwest 的错误类型归类：超时 / 无响应 / 解码失败
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }

        if err.is_decode() {
            return Self::Decode(err.to_string());
        }

        if let Some(status) = err.status() {
            return Self::server_error(status.as_u16(), err.to_string());
        }

        if err.is_builder() {
            return Self::InvalidRequest(err.to_string());
        }

        Self::Network(err.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Error alias
pub type Result<T, E = ApiError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_carries_status() {
        let err = ApiError::server_error(503, "Service Unavailable");
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(
            err.to_string(),
            "Server error: status code 503, message: Service Unavailable"
        );
    }

    #[test]
    fn test_non_server_errors_have_no_status() {
        assert_eq!(ApiError::Timeout.status_code(), None);
        assert_eq!(ApiError::Network("refused".into()).status_code(), None);
    }

    #[test]
    fn test_json_error_maps_to_decode() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(ApiError::from(err), ApiError::Decode(_)));
    }
}
