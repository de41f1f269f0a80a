//! Error Handling Module
//!
//! Maps referral engine errors onto HTTP status codes.
//! Uses thiserror for API errors and integrates with tracing for structured logging.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use referral_engine::ReferralError;
use serde::Serialize;
use thiserror::Error;

/// API 에러 타입
///
/// # Design Decision
///
/// 각 에러 variant는 적절한 HTTP 상태 코드에 매핑됨
/// - 클라이언트 에러: 4xx (잘못된 요청, 중복, 없는 리소스)
/// - 서버 에러: 5xx (저장소 오류 등)
///
/// 민감한 내부 정보는 클라이언트에 노출하지 않음
#[derive(Debug, Error)]
pub enum ApiError {
    // ============ 400 Bad Request ============
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    // ============ 404 Not Found ============
    #[error("Resource not found: {0}")]
    NotFound(String),

    // ============ 409 Conflict ============
    #[error("Conflict: {0}")]
    Conflict(String),

    // ============ 500 Internal Server Error ============
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// API 에러 응답 구조
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            // 4xx 클라이언트 에러
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            ApiError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(msg.clone()),
            ),
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", resource),
                None,
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                msg.clone(),
                None,
            ),

            // 5xx 서버 에러
            ApiError::StorageError(_) => {
                // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                tracing::error!("Storage error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "Storage error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// 엔진 에러를 ApiError로 변환
///
/// `CycleDetected`는 완료 엔드포인트에서 경고로 따로 처리하므로
/// 여기까지 오는 경우는 409로 응답
impl From<ReferralError> for ApiError {
    fn from(err: ReferralError) -> Self {
        match err {
            ReferralError::Validation(msg) => ApiError::ValidationError(msg),
            ReferralError::DuplicateReferral { .. } => ApiError::Conflict(err.to_string()),
            ReferralError::NotFound { referrer_id, referee_id } => ApiError::NotFound(format!(
                "Pending referral of {} by {}",
                referee_id, referrer_id
            )),
            ReferralError::CycleDetected { .. } => ApiError::Conflict(err.to_string()),
            ReferralError::InvalidTable(msg) | ReferralError::Storage(msg) => {
                ApiError::StorageError(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_status_codes() {
        let cases = vec![
            (ReferralError::Validation("empty".into()), StatusCode::BAD_REQUEST),
            (
                ReferralError::DuplicateReferral {
                    referrer_id: "r".into(),
                    email: "e".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                ReferralError::NotFound {
                    referrer_id: "r".into(),
                    referee_id: "x".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ReferralError::CycleDetected {
                    path: vec!["A".into(), "B".into(), "A".into()],
                },
                StatusCode::CONFLICT,
            ),
            (
                ReferralError::InvalidTable("no levels".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ReferralError::Storage("lock".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
