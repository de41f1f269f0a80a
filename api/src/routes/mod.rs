//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/health` - 헬스 체크
//! - `/referrals/*` - 레퍼럴 등록, 연결, 완료, 만료, 히스토리
//! - `/referrals/:user_id/stats` - 대시보드 통계
//! - `/referrals/:user_id/code`, `/codes/*` - 레퍼럴 코드
//! - `/projection`, `/metrics` - 예상 수익, 시스템 지표

pub mod code;
pub mod health;
pub mod referral;
pub mod stats;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{types::UserId, ApiError, AppState};

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET  /health                       - 서버 상태 확인
///
/// POST /referrals                    - 레퍼럴 등록 (초대 발송)
/// POST /referrals/bind               - 실제 계정 id 연결
/// POST /referrals/complete           - 레퍼럴 완료 (온보딩 완료 신호)
/// POST /referrals/expire             - 레퍼럴 만료
/// POST /referrals/expire-stale       - 오래된 대기 레퍼럴 일괄 만료
/// GET  /referrals/:user_id/history   - 레퍼럴 히스토리
/// GET  /referrals/:user_id/stats     - 대시보드 통계
/// POST /referrals/:user_id/code      - 레퍼럴 코드 발급
///
/// GET  /codes/:code                  - 레퍼럴 코드 소유자 조회
/// GET  /projection?count=n           - n명 추가 시 예상 수익
/// GET  /metrics                      - 시스템 지표
/// ```
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))

        // Referral lifecycle
        .route("/referrals", post(referral::register_referral))
        .route("/referrals/bind", post(referral::bind_referee))
        .route("/referrals/complete", post(referral::complete_referral))
        .route("/referrals/expire", post(referral::expire_referral))
        .route("/referrals/expire-stale", post(referral::expire_stale))
        .route("/referrals/:user_id/history", get(referral::get_referral_history))

        // Dashboard
        .route("/referrals/:user_id/stats", get(stats::get_stats))
        .route("/projection", get(stats::get_projection))
        .route("/metrics", get(stats::get_metrics))

        // Referral codes
        .route("/referrals/:user_id/code", post(code::generate_code))
        .route("/codes/:code", get(code::resolve_code))

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}

/// CORS 설정
///
/// 프로덕션에서는 ALLOWED_ORIGINS 도메인만 허용,
/// 개발 환경에서는 localhost 허용
fn cors_layer(state: &AppState) -> CorsLayer {
    if state.config.is_production() {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:5173"), // Vite dev server
                HeaderValue::from_static("http://localhost:3000"), // Alternative
                HeaderValue::from_static("http://127.0.0.1:5173"),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// 경로 파라미터 사용자 ID 검증
pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::new(raw).map_err(ApiError::ValidationError)
}
