//! Error types for the referral engine
//!
//! Every operation returns `ReferralResult`. All variants except
//! `CycleDetected` mean no state was changed.

use thiserror::Error;

/// Error types for ledger operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferralError {
    /// Required input was empty or malformed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Strict registration found a live referral for the same email
    #[error("Referral of {email} by {referrer_id} already exists")]
    DuplicateReferral { referrer_id: String, email: String },

    /// No matching record in a state the operation accepts
    #[error("No pending referral of {referee_id} by {referrer_id}")]
    NotFound {
        referrer_id: String,
        referee_id: String,
    },

    /// The upline walk revisited a user.
    ///
    /// The level-1 credit and any upline credits resolved before the
    /// repeat have already been committed.
    #[error("Referral cycle detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// Commission table failed validation
    #[error("Invalid commission table: {0}")]
    InvalidTable(String),

    /// Store rejected a batch or the ledger lock was poisoned
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ReferralError {
    /// True when the operation's writes were committed despite the error
    pub fn is_warning(&self) -> bool {
        matches!(self, ReferralError::CycleDetected { .. })
    }
}

/// Result type for ledger operations
pub type ReferralResult<T> = Result<T, ReferralError>;

/// Input validation utilities
pub mod validation {
    use super::*;
    use crate::table::RankThreshold;
    use crate::types::{BasisPoints, Rank, BPS_DENOMINATOR};

    /// Highest level a commission table may define
    pub const MAX_LEVELS: usize = u8::MAX as usize;

    /// Trim `value` and reject it if nothing is left
    pub fn require_non_empty(field: &str, value: &str) -> ReferralResult<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ReferralError::Validation(format!("{} must not be empty", field)));
        }
        Ok(trimmed.to_string())
    }

    /// Level rates: at least one level, each rate at most 100%
    pub fn validate_level_rates(rates: &[BasisPoints]) -> ReferralResult<()> {
        if rates.is_empty() {
            return Err(ReferralError::InvalidTable(
                "at least one commission level is required".to_string(),
            ));
        }
        if rates.len() > MAX_LEVELS {
            return Err(ReferralError::InvalidTable(format!(
                "{} levels exceeds maximum {}",
                rates.len(),
                MAX_LEVELS
            )));
        }
        for (i, rate) in rates.iter().enumerate() {
            if *rate as u128 > BPS_DENOMINATOR {
                return Err(ReferralError::InvalidTable(format!(
                    "level {} rate {} bps exceeds 10000",
                    i + 1,
                    rate
                )));
            }
        }
        Ok(())
    }

    /// Rank thresholds: strictly ascending by rank and by referral count
    pub fn validate_rank_thresholds(thresholds: &[RankThreshold]) -> ReferralResult<()> {
        if thresholds.iter().any(|t| t.rank == Rank::Starter) {
            return Err(ReferralError::InvalidTable(
                "Starter is implicit and cannot carry a threshold".to_string(),
            ));
        }
        for pair in thresholds.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if upper.rank <= lower.rank {
                return Err(ReferralError::InvalidTable(format!(
                    "{} listed after {}",
                    upper.rank, lower.rank
                )));
            }
            if upper.min_completed <= lower.min_completed {
                return Err(ReferralError::InvalidTable(format!(
                    "{} threshold {} must exceed {} threshold {}",
                    upper.rank, upper.min_completed, lower.rank, lower.min_completed
                )));
            }
        }
        Ok(())
    }
}
