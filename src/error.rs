//! 统一的 API 错误类型与转换。

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::provider::ProviderError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
    Unauthorized(HeaderMap),
    MethodNotAllowed,
    BadGateway(String),
    Upstream(StatusCode, String),
}

impl ApiError {
    /// 带 Basic 质询头的 401。
    pub fn challenge(realm: &str) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) =
            HeaderValue::from_str(&format!(r#"Basic realm="{realm}", charset="UTF-8""#))
        {
            headers.insert(header::WWW_AUTHENTICATE, value);
        }
        ApiError::Unauthorized(headers)
    }

    /// 解析链失败：统一按 502 返回上游信息。
    pub fn resolution(error: ProviderError) -> Self {
        ApiError::BadGateway(format!("Failed to resolve link: {error}"))
    }

    /// 删除失败：保留上游状态码，否则 500。
    pub fn delete_failed(error: ProviderError) -> Self {
        match error {
            ProviderError::UpstreamStatus { status, body } => {
                ApiError::Upstream(status, format!("Delete failed: {body}"))
            }
            other => ApiError::Internal(format!("Delete failed: {other}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
            ApiError::Unauthorized(headers) => {
                (StatusCode::UNAUTHORIZED, headers, "unauthorized").into_response()
            }
            ApiError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response()
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            ApiError::Upstream(status, msg) => (status, msg).into_response(),
        }
    }
}
