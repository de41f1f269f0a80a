//! Commission calculation and upline propagation
//!
//! # Upline walk
//!
//! ```text
//!   R ──referred──▶ A ──referred──▶ B ──referred──▶ C
//!   level 3         level 2         level 1
//! ```
//!
//! Completing B's referral of C stamps B's record at level 1, then follows
//! `referrer_of` from B to find A (level 2) and from A to find R (level 3).
//! The walk stops at the table's deepest level, at the first missing
//! upline, or at the first user it has already seen.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::ReferralResult;
use crate::table::CommissionTable;
use crate::types::{Amount, ReferralRecord, BPS_DENOMINATOR};

/// Result of an upline walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Propagation {
    /// Derived records, level 2 first
    pub credits: Vec<ReferralRecord>,
    /// Walk order ending with the repeated user, if a cycle stopped the walk
    pub cycle: Option<Vec<String>>,
}

/// Bonus arithmetic over a commission table
#[derive(Debug, Clone, Copy)]
pub struct CommissionCalculator<'a> {
    table: &'a CommissionTable,
}

impl<'a> CommissionCalculator<'a> {
    pub fn new(table: &'a CommissionTable) -> Self {
        Self { table }
    }

    /// `base_amount * rate(level)`, truncated; 0 for unconfigured levels
    pub fn calculate_bonus(&self, base_amount: Amount, level: u8) -> Amount {
        match self.table.rate(level) {
            // rate <= 10000 bps, so the result never exceeds base_amount
            Some(bps) => (base_amount as u128 * bps as u128 / BPS_DENOMINATOR) as Amount,
            None => 0,
        }
    }

    /// Build level-2.. credits for the upline of `source.referrer_id`.
    ///
    /// `source` is the direct record being completed. `referrer_of` resolves
    /// a user to the user who referred them. Nothing is written here; the
    /// caller commits the returned credits together with the level-1 stamp.
    pub fn propagate_upline<F>(
        &self,
        source: &ReferralRecord,
        base_amount: Amount,
        now: DateTime<Utc>,
        mut referrer_of: F,
    ) -> ReferralResult<Propagation>
    where
        F: FnMut(&str) -> ReferralResult<Option<String>>,
    {
        let mut propagation = Propagation::default();
        let mut path = vec![source.referee_id.clone(), source.referrer_id.clone()];
        let mut visited: HashSet<String> = path.iter().cloned().collect();

        if visited.len() < path.len() {
            // self-referral
            propagation.cycle = Some(path);
            return Ok(propagation);
        }

        let mut current = source.referrer_id.clone();
        for level in 2..=self.table.max_level() {
            let Some(beneficiary) = referrer_of(&current)? else {
                break;
            };

            path.push(beneficiary.clone());
            if !visited.insert(beneficiary.clone()) {
                propagation.cycle = Some(path);
                break;
            }

            let bonus = self.calculate_bonus(base_amount, level);
            debug!(
                beneficiary = %beneficiary,
                credit_level = level,
                bonus,
                source_referrer = %source.referrer_id,
                "Upline credit"
            );
            propagation
                .credits
                .push(ReferralRecord::upline_credit(&beneficiary, source, level, bonus, now));

            current = beneficiary;
        }

        Ok(propagation)
    }
}
