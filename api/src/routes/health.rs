//! Health Check Endpoint
//!
//! # Interview Q&A
//!
//! Q: Health check 엔드포인트는 왜 필요한가?
//! A: 로드밸런서 헬스체크와 Kubernetes liveness/readiness probe
//!
//! Q: 원장 상태까지 체크하는 이유는?
//! A: "깊은 헬스체크"(deep health check) 패턴
//!    - 단순 200 OK: 프로세스 살아있음
//!    - 원장 읽기 성공: 락이 오염(poisoned)되지 않아 실제 서비스 가능

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// Health check 응답
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub ledger: LedgerStatus,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct LedgerStatus {
    pub available: bool,
    pub records: Option<usize>,
}

/// GET /health
///
/// 서버 및 원장 상태 확인
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ledger_status = match state.ledger.record_count() {
        Ok(records) => LedgerStatus {
            available: true,
            records: Some(records),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Ledger unavailable");
            LedgerStatus {
                available: false,
                records: None,
            }
        }
    };

    Json(HealthResponse {
        status: if ledger_status.available { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger: ledger_status,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
