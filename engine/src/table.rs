//! Commission table: rates per level and rank tiers
//!
//! The table is a plain value handed to the ledger at construction.
//! Deserialization goes through [`CommissionTable::new`], so JSON tables
//! are validated the same way as tables built in code.

use serde::{Deserialize, Serialize};

use crate::error::{validation, ReferralError, ReferralResult};
use crate::types::{Amount, BasisPoints, Rank};

/// Default base amount that level rates are applied to
pub const DEFAULT_BASE_AMOUNT: Amount = 1000;

/// Default level rates: 25%, 10%, 5%
pub const DEFAULT_LEVEL_RATES: [BasisPoints; 3] = [2500, 1000, 500];

/// Minimum completed referrals and one-time bonus for a rank tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankThreshold {
    pub rank: Rank,
    pub min_completed: u32,
    pub bonus: Amount,
}

impl RankThreshold {
    pub fn new(rank: Rank, min_completed: u32, bonus: Amount) -> Self {
        Self {
            rank,
            min_completed,
            bonus,
        }
    }
}

/// Unvalidated table shape used for deserialization
#[derive(Debug, Deserialize)]
struct CommissionTableSpec {
    base_amount: Amount,
    level_rates: Vec<BasisPoints>,
    rank_thresholds: Vec<RankThreshold>,
}

/// Immutable commission configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CommissionTableSpec")]
pub struct CommissionTable {
    base_amount: Amount,
    /// Index 0 holds the level-1 rate
    level_rates: Vec<BasisPoints>,
    rank_thresholds: Vec<RankThreshold>,
}

impl CommissionTable {
    pub fn new(
        base_amount: Amount,
        level_rates: Vec<BasisPoints>,
        rank_thresholds: Vec<RankThreshold>,
    ) -> ReferralResult<Self> {
        validation::validate_level_rates(&level_rates)?;
        validation::validate_rank_thresholds(&rank_thresholds)?;

        Ok(Self {
            base_amount,
            level_rates,
            rank_thresholds,
        })
    }

    /// Parse and validate a JSON table
    ///
    /// ```json
    /// {
    ///   "base_amount": 1000,
    ///   "level_rates": [2500, 1000, 500],
    ///   "rank_thresholds": [{ "rank": "Bronze", "min_completed": 5, "bonus": 100 }]
    /// }
    /// ```
    pub fn from_json(json: &str) -> ReferralResult<Self> {
        serde_json::from_str(json).map_err(|e| ReferralError::InvalidTable(e.to_string()))
    }

    /// Same policy with a different base amount
    pub fn with_base_amount(mut self, base_amount: Amount) -> Self {
        self.base_amount = base_amount;
        self
    }

    pub fn base_amount(&self) -> Amount {
        self.base_amount
    }

    /// Rate for `level`, `None` outside the configured levels
    pub fn rate(&self, level: u8) -> Option<BasisPoints> {
        if level == 0 {
            return None;
        }
        self.level_rates.get(level as usize - 1).copied()
    }

    /// Deepest level that earns commission
    pub fn max_level(&self) -> u8 {
        // bounded by validation::MAX_LEVELS
        self.level_rates.len() as u8
    }

    pub fn level_rates(&self) -> &[BasisPoints] {
        &self.level_rates
    }

    /// Tiers in ascending order
    pub fn rank_thresholds(&self) -> &[RankThreshold] {
        &self.rank_thresholds
    }
}

impl TryFrom<CommissionTableSpec> for CommissionTable {
    type Error = ReferralError;

    fn try_from(spec: CommissionTableSpec) -> Result<Self, Self::Error> {
        CommissionTable::new(spec.base_amount, spec.level_rates, spec.rank_thresholds)
    }
}

impl Default for CommissionTable {
    fn default() -> Self {
        Self {
            base_amount: DEFAULT_BASE_AMOUNT,
            level_rates: DEFAULT_LEVEL_RATES.to_vec(),
            rank_thresholds: vec![
                RankThreshold::new(Rank::Bronze, 5, 100),
                RankThreshold::new(Rank::Silver, 15, 300),
                RankThreshold::new(Rank::Gold, 30, 750),
                RankThreshold::new(Rank::Platinum, 50, 1500),
            ],
        }
    }
}
