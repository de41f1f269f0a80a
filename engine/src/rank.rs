//! Rank tiers derived from completed referral counts

use crate::table::{CommissionTable, RankThreshold};
use crate::types::{Amount, Rank};

/// Tier lookups against a commission table
#[derive(Debug, Clone, Copy)]
pub struct RankEngine<'a> {
    table: &'a CommissionTable,
}

impl<'a> RankEngine<'a> {
    pub fn new(table: &'a CommissionTable) -> Self {
        Self { table }
    }

    /// Highest tier whose threshold is <= `completed`, else `Starter`
    pub fn rank_level(&self, completed: u32) -> Rank {
        self.current_tier(completed)
            .map(|t| t.rank)
            .unwrap_or(Rank::Starter)
    }

    /// Referrals still needed for the next tier, 0 at the top tier
    pub fn next_rank_requirement(&self, completed: u32) -> u32 {
        self.table
            .rank_thresholds()
            .iter()
            .find(|t| t.min_completed > completed)
            .map(|t| t.min_completed - completed)
            .unwrap_or(0)
    }

    /// Bonus carried by `rank`
    pub fn rank_bonus(&self, rank: Rank) -> Amount {
        self.table
            .rank_thresholds()
            .iter()
            .find(|t| t.rank == rank)
            .map(|t| t.bonus)
            .unwrap_or(0)
    }

    fn current_tier(&self, completed: u32) -> Option<&'a RankThreshold> {
        self.table
            .rank_thresholds()
            .iter()
            .rev()
            .find(|t| t.min_completed <= completed)
    }
}
