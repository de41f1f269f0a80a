//! Common Types Module
//!
//! 라우트 전반에서 사용되는 공통 타입 정의

use serde::{Deserialize, Serialize};

/// 사용자 ID 최대 길이
pub const MAX_USER_ID_LEN: usize = 64;

/// 사용자 ID 타입
///
/// 영문/숫자와 `_`, `-`, `.`만 허용 (경로 파라미터로 쓰이므로)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Result<Self, String> {
        let id = id.trim();
        if id.is_empty() {
            return Err("User id must not be empty".to_string());
        }
        if id.len() > MAX_USER_ID_LEN {
            return Err(format!("User id exceeds {} characters", MAX_USER_ID_LEN));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err("Invalid user id format".to_string());
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
