//! Referral Lifecycle Endpoints
//!
//! 초대 등록 → (실제 계정 연결) → 온보딩 완료 또는 만료
//!
//! # Interview Q&A
//!
//! Q: 완료 요청을 두 번 보내면?
//! A: 멱등 처리 - 두 번째 요청은 `completed: false`로 응답하고
//!    보너스는 다시 지급되지 않음 (온보딩 웹훅 재시도 대비)
//!
//! Q: 업라인 순환(cycle)이 발견되면 왜 에러가 아닌가?
//! A: 레벨 1 완료와 순환 이전까지의 업라인 크레딧은 이미 커밋됨
//!    - 요청 자체는 성공이므로 200 + `warning` 필드로 알림

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use referral_engine::{RecordKind, ReferralRecord, RegistrationMode};
use serde::{Deserialize, Serialize};

use super::parse_user_id;
use crate::{error::ApiError, AppState};

/// 히스토리 페이지 크기 기본값
const DEFAULT_PAGE_SIZE: u32 = 20;
/// 히스토리 페이지 크기 최대값
const MAX_PAGE_SIZE: u32 = 100;

// ============ Request/Response Types ============

/// 레퍼럴 등록 요청
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub referrer_id: String,
    pub email: String,
    pub name: String,
    /// true면 같은 이메일의 기존 레퍼럴이 있을 때 409
    #[serde(default)]
    pub strict: bool,
}

/// 레퍼럴 완료 요청
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub referrer_id: String,
    /// 레코드의 현재 referee id (임시 id 또는 연결된 실제 id)
    pub referee_id: String,
    /// 완료와 동시에 연결할 실제 계정 id
    pub real_referee_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    /// false면 이미 완료된 레퍼럴
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// 실제 계정 연결 요청
#[derive(Debug, Deserialize)]
pub struct BindRequest {
    pub referrer_id: String,
    pub referee_id: String,
    pub real_referee_id: String,
}

/// 만료 요청
#[derive(Debug, Deserialize)]
pub struct ExpireRequest {
    pub referrer_id: String,
    pub referee_id: String,
}

#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    /// false면 이미 만료된 레퍼럴
    pub expired: bool,
}

/// 오래된 대기 레퍼럴 일괄 만료 요청
#[derive(Debug, Deserialize)]
pub struct ExpireStaleRequest {
    pub older_than_days: u32,
}

#[derive(Debug, Serialize)]
pub struct ExpireStaleResponse {
    pub expired: usize,
}

/// 히스토리 쿼리 파라미터
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// 페이지 (0부터 시작)
    pub page: Option<u32>,
    /// 페이지 크기 (기본 20, 최대 100)
    pub limit: Option<u32>,
}

/// 히스토리 응답
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub referrals: Vec<ReferralView>,
    pub pagination: Pagination,
}

/// 레코드 응답 형태 (날짜는 RFC 3339 문자열)
#[derive(Debug, Serialize)]
pub struct ReferralView {
    pub id: String,
    pub referrer_id: String,
    pub referee_id: String,
    pub referee_email: String,
    pub referee_name: String,
    pub referral_date: String,
    pub status: String,
    pub bonus_earned: u64,
    pub level: u8,
    /// 레벨 2/3 크레딧을 만든 직접 추천인
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_referrer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<ReferralRecord> for ReferralView {
    fn from(record: ReferralRecord) -> Self {
        let source_referrer_id = match record.kind {
            RecordKind::Direct => None,
            RecordKind::UplineCredit { source_referrer_id } => Some(source_referrer_id),
        };

        Self {
            id: record.id.to_string(),
            referrer_id: record.referrer_id,
            referee_id: record.referee_id,
            referee_email: record.referee_email,
            referee_name: record.referee_name,
            referral_date: record.referral_date.to_rfc3339(),
            status: record.status.as_str().to_string(),
            bonus_earned: record.bonus_earned,
            level: record.level,
            source_referrer_id,
            completed_at: record.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub has_next: bool,
}

// ============ Handlers ============

/// POST /referrals
///
/// 레퍼럴 등록 (초대 발송)
///
/// # Response
///
/// ```json
/// {
///   "id": "7c9e...",
///   "referrer_id": "prof_001",
///   "referee_id": "pending_1f2e...",
///   "status": "pending",
///   "bonus_earned": 0,
///   "level": 1
/// }
/// ```
pub async fn register_referral(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ReferralView>, ApiError> {
    let referrer = parse_user_id(&req.referrer_id)?;
    let mode = if req.strict {
        RegistrationMode::Strict
    } else {
        RegistrationMode::Idempotent
    };

    let record =
        state
            .ledger
            .register_referral_with(referrer.as_str(), &req.email, &req.name, mode)?;

    Ok(Json(record.into()))
}

/// POST /referrals/bind
///
/// 대기 레퍼럴에 실제 계정 id 연결
pub async fn bind_referee(
    State(state): State<AppState>,
    Json(req): Json<BindRequest>,
) -> Result<Json<ReferralView>, ApiError> {
    let referrer = parse_user_id(&req.referrer_id)?;
    let real_id = parse_user_id(&req.real_referee_id)?;

    let record = state
        .ledger
        .bind_referee(referrer.as_str(), &req.referee_id, real_id.as_str())?;

    Ok(Json(record.into()))
}

/// POST /referrals/complete
///
/// 온보딩 완료 신호 → 레벨 1 보너스 + 업라인 크레딧
pub async fn complete_referral(
    State(state): State<AppState>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let referrer = parse_user_id(&req.referrer_id)?;

    let result = match &req.real_referee_id {
        Some(real_id) => {
            let real_id = parse_user_id(real_id)?;
            state
                .ledger
                .complete_referral_as(referrer.as_str(), &req.referee_id, real_id.as_str())
        }
        None => state.ledger.complete_referral(referrer.as_str(), &req.referee_id),
    };

    match result {
        Ok(completed) => Ok(Json(CompleteResponse {
            completed,
            warning: None,
        })),
        // 완료는 커밋됨, 순환 이후 업라인만 생략
        Err(err) if err.is_warning() => Ok(Json(CompleteResponse {
            completed: true,
            warning: Some(err.to_string()),
        })),
        Err(err) => Err(err.into()),
    }
}

/// POST /referrals/expire
pub async fn expire_referral(
    State(state): State<AppState>,
    Json(req): Json<ExpireRequest>,
) -> Result<Json<ExpireResponse>, ApiError> {
    let referrer = parse_user_id(&req.referrer_id)?;
    let expired = state
        .ledger
        .expire_referral(referrer.as_str(), &req.referee_id)?;

    Ok(Json(ExpireResponse { expired }))
}

/// POST /referrals/expire-stale
///
/// `older_than_days`일 이전에 생성된 대기 레퍼럴 일괄 만료
pub async fn expire_stale(
    State(state): State<AppState>,
    Json(req): Json<ExpireStaleRequest>,
) -> Result<Json<ExpireStaleResponse>, ApiError> {
    let cutoff = Utc::now() - Duration::days(i64::from(req.older_than_days));
    let expired = state.ledger.expire_stale(cutoff)?;

    Ok(Json(ExpireStaleResponse { expired }))
}

/// GET /referrals/:user_id/history
///
/// 레퍼럴 히스토리 조회 (페이지네이션, 업라인 크레딧 포함)
pub async fn get_referral_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user = parse_user_id(&user_id)?;

    let page = query.page.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit == 0 {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }
    let limit = limit.min(MAX_PAGE_SIZE);

    let history = state.ledger.get_referral_history(user.as_str())?;
    let total = history.len();
    let offset = (page as usize).saturating_mul(limit as usize);

    let referrals: Vec<ReferralView> = history
        .into_iter()
        .skip(offset)
        .take(limit as usize)
        .map(ReferralView::from)
        .collect();

    Ok(Json(HistoryResponse {
        user_id: user.as_str().to_string(),
        referrals,
        pagination: Pagination {
            page,
            limit,
            total,
            has_next: offset.saturating_add(limit as usize) < total,
        },
    }))
}
