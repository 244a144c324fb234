//! 统一 HTTP 错误
//!
//! 各层抛出自己的类型化错误（CodecError / QuoteError / PriceError /
//! AdapterError），在 API 边界统一映射为 AppError。对外约定：成功返回 JSON，
//! 失败返回 HTTP 状态码 + 纯文本错误消息。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    chains::AdapterError,
    codec::CodecError,
    domain::request_id::RequestIdError,
    service::{
        price_service::PriceError, quote_engine::QuoteError, status_service::StatusError,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    BadRequest,
    NotFound,
    Internal,

    // 业务错误码
    DecodeFailed,
    QuoteInvalid,
    ChainNotSupported,
    PriceUnavailable,
    UpstreamUnavailable,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
}

impl AppError {
    pub fn new(code: AppErrorCode, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(AppErrorCode::BadRequest, StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(AppErrorCode::NotFound, StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            AppErrorCode::Internal,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
        )
    }

    pub fn chain_not_supported(chain_id: u16) -> Self {
        Self::new(
            AppErrorCode::ChainNotSupported,
            StatusCode::BAD_REQUEST,
            format!("unsupported chain: {}", chain_id),
        )
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(
            AppErrorCode::UpstreamUnavailable,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = ?self.code, message = %self.message, "request failed");
        } else {
            tracing::debug!(code = ?self.code, message = %self.message, "request rejected");
        }
        (self.status, self.message).into_response()
    }
}

impl From<CodecError> for AppError {
    fn from(e: CodecError) -> Self {
        Self::new(
            AppErrorCode::DecodeFailed,
            StatusCode::BAD_REQUEST,
            format!("decode error: {}", e),
        )
    }
}

impl From<QuoteError> for AppError {
    fn from(e: QuoteError) -> Self {
        Self::new(
            AppErrorCode::QuoteInvalid,
            StatusCode::BAD_REQUEST,
            format!("quote error: {}", e),
        )
    }
}

impl From<PriceError> for AppError {
    fn from(e: PriceError) -> Self {
        Self::new(
            AppErrorCode::PriceUnavailable,
            StatusCode::BAD_REQUEST,
            format!("price error: {}", e),
        )
    }
}

impl From<AdapterError> for AppError {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::Transient(m) => Self::upstream(format!("chain rpc error: {}", m)),
            AdapterError::Terminal(m) => Self::bad_request(format!("chain data error: {}", m)),
            AdapterError::Unsupported(m) => Self::bad_request(m),
        }
    }
}

impl From<StatusError> for AppError {
    fn from(e: StatusError) -> Self {
        match e {
            StatusError::RequestId(inner) => inner.into(),
            StatusError::UnknownChain(chain) => Self::chain_not_supported(chain),
            StatusError::NotFound => {
                Self::not_found("no execution request found for this id")
            }
            StatusError::Decode(inner) => inner.into(),
            StatusError::Quote(inner) => inner.into(),
            StatusError::Adapter(inner) => inner.into(),
        }
    }
}

impl From<RequestIdError> for AppError {
    fn from(e: RequestIdError) -> Self {
        Self::new(
            AppErrorCode::DecodeFailed,
            StatusCode::BAD_REQUEST,
            format!("invalid request id: {}", e),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_errors_map_to_400() {
        let err: AppError = CodecError::UnknownPrefix("XXXX".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, AppErrorCode::DecodeFailed);
    }

    #[test]
    fn quote_errors_map_to_400() {
        let err: AppError = QuoteError::BadSignature.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
