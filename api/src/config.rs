//! Configuration Module
//!
//! # Interview Q&A
//!
//! Q: 커미션 정책(비율, 랭크 기준)은 어디서 관리하는가?
//! A: 엔진의 `CommissionTable` 값으로 관리
//!    - 기본값: 코드에 내장된 기본 테이블 (25% / 10% / 5%)
//!    - `COMMISSION_TABLE_PATH`: JSON 파일로 전체 테이블 교체
//!    - `REFERRAL_BASE_AMOUNT`: 기준 금액만 덮어쓰기
//!    - 정책 변경 시 계산 로직은 건드리지 않음
//!
//! Q: 설정 검증은 어떻게 하는가?
//! A: from_env()와 commission_table()에서 즉시 실패 (fail-fast)
//!    - 잘못된 숫자, 잘못된 테이블 파일은 앱 시작 시점에 에러

use std::env;
use anyhow::{Context, Result};
use referral_engine::{Amount, CommissionTable};

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 서버 포트 (기본값: 3001)
    pub port: u16,

    /// 커미션 테이블 JSON 경로 (옵션, 없으면 기본 테이블)
    pub commission_table_path: Option<String>,

    /// 기준 금액 덮어쓰기 (옵션)
    pub base_amount: Option<Amount>,

    /// 프로덕션 CORS 허용 도메인 (콤마 구분)
    pub allowed_origins: Option<String>,

    /// 환경 (development, staging, production)
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Config {
    /// 환경변수에서 설정 로드
    ///
    /// # Optional Environment Variables
    ///
    /// - `PORT`: 서버 포트 (기본값: 3001)
    /// - `COMMISSION_TABLE_PATH`: 커미션 테이블 JSON 파일
    /// - `REFERRAL_BASE_AMOUNT`: 기준 금액
    /// - `ALLOWED_ORIGINS`: 프로덕션 CORS origin 목록
    /// - `ENVIRONMENT`: development | staging | production
    pub fn from_env() -> Result<Self> {
        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        };

        let base_amount = match env::var("REFERRAL_BASE_AMOUNT") {
            Ok(value) => Some(
                value
                    .parse()
                    .context("REFERRAL_BASE_AMOUNT must be a non-negative integer")?,
            ),
            Err(_) => None,
        };

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("PORT must be a valid number")?,

            commission_table_path: env::var("COMMISSION_TABLE_PATH").ok(),

            base_amount,

            allowed_origins: env::var("ALLOWED_ORIGINS").ok(),

            environment,
        })
    }

    /// 커미션 테이블 구성
    ///
    /// 파일 → 기본 테이블 순으로 결정한 뒤 base amount 덮어쓰기 적용
    pub fn commission_table(&self) -> Result<CommissionTable> {
        let table = match &self.commission_table_path {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read commission table {}", path))?;
                CommissionTable::from_json(&json)
                    .with_context(|| format!("invalid commission table {}", path))?
            }
            None => CommissionTable::default(),
        };

        Ok(match self.base_amount {
            Some(amount) => table.with_base_amount(amount),
            None => table,
        })
    }

    /// 프로덕션 환경인지 확인
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
