//! Core data types for the referral ledger.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monetary amount in whole currency units
pub type Amount = u64;

/// Commission rate in basis points (10000 = 100%)
pub type BasisPoints = u32;

/// Denominator for basis point arithmetic
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Prefix of referee ids assigned before the real account id is known
pub const PROVISIONAL_PREFIX: &str = "pending_";

/// Referral lifecycle state
///
/// Transitions are one-way: `Pending -> Completed` or `Pending -> Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    Pending,
    Completed,
    Expired,
}

impl ReferralStatus {
    /// Whether a record in this state may move to `next`
    pub fn can_transition_to(self, next: ReferralStatus) -> bool {
        matches!(
            (self, next),
            (ReferralStatus::Pending, ReferralStatus::Completed)
                | (ReferralStatus::Pending, ReferralStatus::Expired)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Completed => "completed",
            ReferralStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordKind {
    /// Created by registering a referral
    Direct,
    /// Level 2/3 credit produced when a downline referral completed
    UplineCredit {
        /// Direct referrer whose completed referral produced this credit
        source_referrer_id: String,
    },
}

/// One referral relationship, or one upline credit derived from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub id: Uuid,

    /// User credited by this record (the beneficiary for upline credits)
    pub referrer_id: String,

    /// Referred user; provisional until the real account id is bound
    pub referee_id: String,

    pub referee_email: String,
    pub referee_name: String,

    /// Creation time (not completion time)
    pub referral_date: DateTime<Utc>,

    pub status: ReferralStatus,

    /// Zero until completion, then fixed
    pub bonus_earned: Amount,

    /// Commission level relative to the completed direct referral (1..=3)
    pub level: u8,

    pub kind: RecordKind,

    pub completed_at: Option<DateTime<Utc>>,
}

impl ReferralRecord {
    /// New pending direct referral with a provisional referee id
    pub fn pending(referrer_id: &str, email: &str, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            referrer_id: referrer_id.to_string(),
            referee_id: provisional_referee_id(),
            referee_email: email.to_string(),
            referee_name: name.to_string(),
            referral_date: now,
            status: ReferralStatus::Pending,
            bonus_earned: 0,
            level: 1,
            kind: RecordKind::Direct,
            completed_at: None,
        }
    }

    /// Completed credit for `beneficiary_id` derived from a direct referral
    pub fn upline_credit(
        beneficiary_id: &str,
        source: &ReferralRecord,
        level: u8,
        bonus: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            referrer_id: beneficiary_id.to_string(),
            referee_id: source.referee_id.clone(),
            referee_email: source.referee_email.clone(),
            referee_name: source.referee_name.clone(),
            referral_date: now,
            status: ReferralStatus::Completed,
            bonus_earned: bonus,
            level,
            kind: RecordKind::UplineCredit {
                source_referrer_id: source.referrer_id.clone(),
            },
            completed_at: Some(now),
        }
    }

    pub fn is_direct(&self) -> bool {
        self.kind == RecordKind::Direct
    }

    pub fn is_completed(&self) -> bool {
        self.status == ReferralStatus::Completed
    }

    pub fn has_provisional_referee(&self) -> bool {
        is_provisional_id(&self.referee_id)
    }

    /// Case-insensitive email match
    pub fn matches_email(&self, email: &str) -> bool {
        self.referee_email.eq_ignore_ascii_case(email)
    }
}

pub fn provisional_referee_id() -> String {
    format!("{}{}", PROVISIONAL_PREFIX, Uuid::new_v4().simple())
}

pub fn is_provisional_id(id: &str) -> bool {
    id.starts_with(PROVISIONAL_PREFIX)
}

/// Rank tiers, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Starter,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Starter => "Starter",
            Rank::Bronze => "Bronze",
            Rank::Silver => "Silver",
            Rank::Gold => "Gold",
            Rank::Platinum => "Platinum",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How registration treats an existing live referral for the same email
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationMode {
    /// Return the existing record
    #[default]
    Idempotent,
    /// Fail with `DuplicateReferral`
    Strict,
}

/// Per-user dashboard projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralStats {
    /// Every record in the user's history, upline credits included
    pub total_referrals: usize,
    /// Completed direct referrals
    pub active_referrals: u32,
    /// Direct referrals still waiting for completion
    pub pending_referrals: u32,
    pub total_earnings: Amount,
    pub monthly_earnings: Amount,
    pub rank_level: Rank,
    pub next_rank_requirement: u32,
    /// Bonus carried by the current tier (0 for Starter)
    pub rank_bonus: Amount,
}

/// Ledger-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub total_referrers: usize,
    pub total_records: usize,
    pub completed_referrals: usize,
    pub pending_referrals: usize,
    pub expired_referrals: usize,
    pub total_distributed: Amount,
    pub average_earnings_per_referrer: Amount,
}
