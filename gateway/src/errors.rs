use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chat_relay::RelayError;
use serde::Serialize;

/// Errors returned to API callers as `{"error": "<message>"}`.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("访问秘钥无效或未提供")]
    Unauthorized,

    #[error("请求格式错误: {0}")]
    BadRequest(String),

    #[error("接口不存在")]
    NotFound,

    #[error("服务器内部错误")]
    Internal,

    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Relay(e) => e.status_code(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (self.status_code(), body).into_response()
    }
}
