use axum::Json;
use axum::{
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::cache::StoreError;
use crate::rate_limit::{RateLimitError, TOO_MANY_REQUESTS};
use crate::utils::error_codes;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TooManyRequests {
        message: String,
        /// 写入 `Retry-After` 响应头（秒）
        retry_after_minutes: Option<u64>,
    },
    StoreNotConfigured(&'static str),
    InternalServerError,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    error_message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            AppError::TooManyRequests {
                retry_after_minutes: Some(minutes),
                ..
            } => Some(minutes.saturating_mul(60)),
            _ => None,
        };

        let (status, code, kind, error_message) = match self {
            AppError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                error_codes::VALIDATION_ERROR,
                None,
                message,
            ),
            AppError::TooManyRequests { message, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                error_codes::RATE_LIMIT,
                Some(TOO_MANY_REQUESTS),
                message,
            ),
            AppError::StoreNotConfigured(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::STORE_NOT_CONFIGURED,
                None,
                message.to_string(),
            ),
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                None,
                "Something went wrong. Please try again.".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            code,
            kind,
            error_message,
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<RateLimitError> for AppError {
    fn from(e: RateLimitError) -> Self {
        match e {
            RateLimitError::Exceeded {
                message,
                retry_after_minutes,
            } => AppError::TooManyRequests {
                message,
                retry_after_minutes,
            },
            RateLimitError::StoreNotConfigured => {
                AppError::StoreNotConfigured("Rate limit store not configured")
            }
            e => {
                tracing::error!(error = %e, "rate limiter failure");
                AppError::InternalServerError
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "store failure");
        AppError::InternalServerError
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        tracing::error!(error = %e, "failed to encode record");
        AppError::InternalServerError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_sets_retry_after_in_seconds() {
        let response = AppError::from(RateLimitError::Exceeded {
            message: "slow down".to_string(),
            retry_after_minutes: Some(3),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "180");
    }

    #[test]
    fn other_errors_have_no_retry_after() {
        let response = AppError::Validation("bad".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(RETRY_AFTER).is_none());
    }
}
