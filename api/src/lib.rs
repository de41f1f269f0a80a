//! Referral Commission API Library
//!
//! # Overview
//!
//! 이 라이브러리는 레퍼럴 커미션 엔진(`referral-engine`)을 HTTP로 노출합니다.
//! 대시보드(조회/초대)와 온보딩 시스템(완료 신호)이 이 API를 호출합니다.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐
//! │  Dashboard   │   │ Onboarding hook  │
//! └──────┬───────┘   └────────┬─────────┘
//!        │                    │
//!        ▼                    ▼
//! ┌─────────────────────────────────────┐
//! │               API                   │
//! │  ┌─────────┐  ┌────────┐  ┌───────┐ │
//! │  │ Routes  │  │ Config │  │ Types │ │
//! │  └────┬────┘  └────────┘  └───────┘ │
//! └───────┼─────────────────────────────┘
//!         ▼
//! ┌─────────────────────────────────────┐
//! │   ReferralLedger (referral-engine)  │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 처리
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `types`: 공통 타입 정의
//!
//! ## Usage
//!
//! ```rust,ignore
//! use referral_api::{config::Config, routes, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let state = AppState::from_config(config)?;
//!     let app = routes::create_router(state);
//!
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use referral_engine::ReferralLedger;

pub mod config;
pub mod error;
pub mod routes;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::ApiError;

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<ReferralLedger>,
    pub config: Arc<Config>,
}

impl AppState {
    /// 설정에서 커미션 테이블을 읽어 메모리 저장소 기반 원장 생성
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let table = config.commission_table()?;
        Ok(Self {
            ledger: Arc::new(ReferralLedger::in_memory(table)),
            config: Arc::new(config),
        })
    }
}
