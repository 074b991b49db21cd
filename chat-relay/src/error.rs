use http::StatusCode;

/// Failures of a relayed chat request. The display text is what callers see.
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("API Key 未配置，请联系管理员")]
    MissingApiKey,

    #[error("messages 不能为空")]
    EmptyMessages,

    #[error("API请求失败: {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("请求超时，请稍后重试")]
    Timeout,

    /// The detail is only logged.
    #[error("网络连接失败")]
    Connection(String),

    #[error("服务器错误: {0}")]
    Other(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::EmptyMessages => StatusCode::BAD_REQUEST,
            RelayError::Upstream { status, .. } => *status,
            RelayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Connection(_) => StatusCode::BAD_GATEWAY,
            RelayError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short tag used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MissingApiKey => "missing_api_key",
            RelayError::EmptyMessages => "empty_messages",
            RelayError::Upstream { .. } => "upstream_status",
            RelayError::Timeout => "timeout",
            RelayError::Connection(_) => "connection",
            RelayError::Other(_) => "other",
        }
    }

    /// Text of the error event sent in place of the rest of a stream.
    pub fn stream_message(&self) -> String {
        match self {
            RelayError::Connection(_) => "网络连接失败，请检查网络".to_string(),
            other => other.to_string(),
        }
    }

    pub(crate) fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            RelayError::Timeout
        } else if error.is_connect() {
            RelayError::Connection(error.to_string())
        } else {
            RelayError::Other(error.to_string())
        }
    }
}
