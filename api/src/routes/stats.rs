//! Dashboard Endpoints
//!
//! 대시보드 통계, 예상 수익, 시스템 지표

use axum::{
    extract::{Path, Query, State},
    Json,
};
use referral_engine::{Amount, Rank, SystemMetrics};
use serde::{Deserialize, Serialize};

use super::parse_user_id;
use crate::{error::ApiError, AppState};

/// 예상 수익 계산 최대 인원
const MAX_PROJECTION_COUNT: u64 = 1_000_000;

// ============ Request/Response Types ============

/// 대시보드 통계 응답
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub user_id: String,
    pub total_referrals: usize,
    pub active_referrals: u32,
    pub pending_referrals: u32,
    pub total_earnings: Amount,
    pub monthly_earnings: Amount,
    pub rank_level: Rank,
    /// 다음 등급까지 필요한 완료 레퍼럴 수 (최고 등급이면 0)
    pub next_rank_requirement: u32,
    /// 현재 등급 보너스 (표시용, 지급되지 않음)
    pub rank_bonus: Amount,
    /// 완료율 (%)
    pub conversion_rate: u32,
}

#[derive(Debug, Deserialize)]
pub struct ProjectionQuery {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct ProjectionResponse {
    pub additional_referrals: u64,
    pub per_referral: Amount,
    pub potential_earnings: Amount,
}

// ============ Handlers ============

/// GET /referrals/:user_id/stats
///
/// # Response
///
/// ```json
/// {
///   "user_id": "prof_001",
///   "total_referrals": 3,
///   "active_referrals": 2,
///   "total_earnings": 500,
///   "rank_level": "Starter",
///   "next_rank_requirement": 3,
///   "conversion_rate": 66
/// }
/// ```
pub async fn get_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<StatsResponse>, ApiError> {
    let user = parse_user_id(&user_id)?;

    let stats = state.ledger.get_stats(user.as_str())?;
    let conversion_rate = state.ledger.conversion_rate(user.as_str())?;

    Ok(Json(StatsResponse {
        user_id: user.as_str().to_string(),
        total_referrals: stats.total_referrals,
        active_referrals: stats.active_referrals,
        pending_referrals: stats.pending_referrals,
        total_earnings: stats.total_earnings,
        monthly_earnings: stats.monthly_earnings,
        rank_level: stats.rank_level,
        next_rank_requirement: stats.next_rank_requirement,
        rank_bonus: stats.rank_bonus,
        conversion_rate,
    }))
}

/// GET /projection?count=n
///
/// n명의 직접 레퍼럴이 추가로 완료될 때 예상 수익
pub async fn get_projection(
    State(state): State<AppState>,
    Query(query): Query<ProjectionQuery>,
) -> Result<Json<ProjectionResponse>, ApiError> {
    if query.count > MAX_PROJECTION_COUNT {
        return Err(ApiError::ValidationError(format!(
            "count must not exceed {}",
            MAX_PROJECTION_COUNT
        )));
    }

    Ok(Json(ProjectionResponse {
        additional_referrals: query.count,
        per_referral: state.ledger.potential_earnings(1),
        potential_earnings: state.ledger.potential_earnings(query.count),
    }))
}

/// GET /metrics
pub async fn get_metrics(State(state): State<AppState>) -> Result<Json<SystemMetrics>, ApiError> {
    Ok(Json(state.ledger.system_metrics()?))
}
