//! Referral Code Endpoints
//!
//! 공유용 레퍼럴 코드 발급 및 소유자 조회

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::parse_user_id;
use crate::{error::ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub code: String,
    pub owner: String,
}

/// POST /referrals/:user_id/code
///
/// 새 코드 발급 (`REF-<USER>-<TAG>`), 호출할 때마다 다른 코드
pub async fn generate_code(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<CodeResponse>, ApiError> {
    let user = parse_user_id(&user_id)?;
    let code = state.ledger.generate_referral_code(user.as_str())?;

    Ok(Json(CodeResponse {
        code,
        owner: user.as_str().to_string(),
    }))
}

/// GET /codes/:code
///
/// 코드 소유자 조회 (대소문자 무시)
pub async fn resolve_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<CodeResponse>, ApiError> {
    let owner = state
        .ledger
        .resolve_referral_code(&code)?
        .ok_or_else(|| ApiError::NotFound(format!("Referral code {}", code)))?;

    Ok(Json(CodeResponse {
        code: code.trim().to_ascii_uppercase(),
        owner,
    }))
}
