//! Stats Aggregator
//!
//! Read-only projections over the ledger. Every query takes the ledger's
//! read lock once, so it sees whole completion batches only.

use chrono::{DateTime, Datelike, Utc};

use crate::commission::CommissionCalculator;
use crate::error::ReferralResult;
use crate::ledger::ReferralLedger;
use crate::rank::RankEngine;
use crate::store::ReferralStore;
use crate::table::CommissionTable;
use crate::types::{Amount, ReferralRecord, ReferralStatus, ReferralStats, SystemMetrics};

impl<S: ReferralStore> ReferralLedger<S> {
    /// Dashboard stats for `user_id` as of now
    pub fn get_stats(&self, user_id: &str) -> ReferralResult<ReferralStats> {
        self.get_stats_at(user_id, Utc::now())
    }

    /// Dashboard stats with an explicit "now" for the monthly window
    pub fn get_stats_at(&self, user_id: &str, now: DateTime<Utc>) -> ReferralResult<ReferralStats> {
        let history = self.get_referral_history(user_id)?;
        Ok(summarize(&history, self.table(), now))
    }

    /// Earnings if `additional_referrals` more direct referrals complete
    pub fn potential_earnings(&self, additional_referrals: u64) -> Amount {
        potential_earnings(self.table(), additional_referrals)
    }

    /// Completed direct referrals as a percentage of all direct referrals
    pub fn conversion_rate(&self, user_id: &str) -> ReferralResult<u32> {
        let history = self.get_referral_history(user_id)?;
        let (total, completed) = history
            .iter()
            .filter(|r| r.is_direct())
            .fold((0u64, 0u64), |(total, completed), r| {
                (total + 1, completed + r.is_completed() as u64)
            });

        if total == 0 {
            return Ok(0);
        }
        Ok((completed * 100 / total) as u32)
    }

    /// Ledger-wide counters
    pub fn system_metrics(&self) -> ReferralResult<SystemMetrics> {
        let store = self.read_store()?;
        let mut metrics = SystemMetrics::default();

        for referrer_id in store.referrer_ids()? {
            metrics.total_referrers += 1;
            for record in store.records_for(&referrer_id)? {
                metrics.total_records += 1;
                match record.status {
                    ReferralStatus::Completed => {
                        metrics.total_distributed =
                            metrics.total_distributed.saturating_add(record.bonus_earned);
                        if record.is_direct() {
                            metrics.completed_referrals += 1;
                        }
                    }
                    ReferralStatus::Pending => metrics.pending_referrals += 1,
                    ReferralStatus::Expired => metrics.expired_referrals += 1,
                }
            }
        }

        if metrics.total_referrers > 0 {
            metrics.average_earnings_per_referrer =
                metrics.total_distributed / metrics.total_referrers as Amount;
        }
        Ok(metrics)
    }
}

/// Fold a user's history into dashboard stats
pub fn summarize(
    history: &[ReferralRecord],
    table: &CommissionTable,
    now: DateTime<Utc>,
) -> ReferralStats {
    let ranks = RankEngine::new(table);

    let mut active = 0u32;
    let mut pending = 0u32;
    let mut total_earnings: Amount = 0;
    let mut monthly_earnings: Amount = 0;

    for record in history {
        if record.is_direct() {
            match record.status {
                ReferralStatus::Completed => active += 1,
                ReferralStatus::Pending => pending += 1,
                ReferralStatus::Expired => {}
            }
        }

        if record.is_completed() {
            total_earnings = total_earnings.saturating_add(record.bonus_earned);
            if same_month(record.referral_date, now) {
                monthly_earnings = monthly_earnings.saturating_add(record.bonus_earned);
            }
        }
    }

    let rank_level = ranks.rank_level(active);
    ReferralStats {
        total_referrals: history.len(),
        active_referrals: active,
        pending_referrals: pending,
        total_earnings,
        monthly_earnings,
        rank_level,
        next_rank_requirement: ranks.next_rank_requirement(active),
        rank_bonus: ranks.rank_bonus(rank_level),
    }
}

fn same_month(date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    date.year() == now.year() && date.month() == now.month()
}

/// Projection without a ledger, for callers holding only a table
pub fn potential_earnings(table: &CommissionTable, additional_referrals: u64) -> Amount {
    CommissionCalculator::new(table)
        .calculate_bonus(table.base_amount(), 1)
        .saturating_mul(additional_referrals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rank;
    use chrono::TimeZone;

    fn completed(referrer: &str, bonus: Amount, date: DateTime<Utc>) -> ReferralRecord {
        let mut record = ReferralRecord::pending(referrer, "x@example.com", "X", date);
        record.status = ReferralStatus::Completed;
        record.bonus_earned = bonus;
        record
    }

    #[test]
    fn test_summarize_empty_history() {
        let table = CommissionTable::default();
        let stats = summarize(&[], &table, Utc::now());

        assert_eq!(stats.total_referrals, 0);
        assert_eq!(stats.total_earnings, 0);
        assert_eq!(stats.rank_level, Rank::Starter);
        assert_eq!(stats.next_rank_requirement, 5);
        assert_eq!(stats.rank_bonus, 0);
    }

    #[test]
    fn test_monthly_window() {
        let table = CommissionTable::default();
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let this_month = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let last_month = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        let last_year = Utc.with_ymd_and_hms(2023, 3, 10, 0, 0, 0).unwrap();

        let history = vec![
            completed("u", 250, this_month),
            completed("u", 250, last_month),
            completed("u", 250, last_year),
        ];
        let stats = summarize(&history, &table, now);

        assert_eq!(stats.total_earnings, 750);
        assert_eq!(stats.monthly_earnings, 250);
    }

    #[test]
    fn test_upline_credits_earn_but_do_not_rank() {
        let table = CommissionTable::default();
        let now = Utc::now();
        let source = completed("B", 250, now);
        let history: Vec<_> = (0..6)
            .map(|_| ReferralRecord::upline_credit("A", &source, 2, 100, now))
            .collect();

        let stats = summarize(&history, &table, now);
        assert_eq!(stats.total_referrals, 6);
        assert_eq!(stats.active_referrals, 0);
        assert_eq!(stats.total_earnings, 600);
        assert_eq!(stats.rank_level, Rank::Starter);
    }

    #[test]
    fn test_pending_and_expired_earn_nothing() {
        let table = CommissionTable::default();
        let now = Utc::now();
        let pending = ReferralRecord::pending("u", "a@example.com", "A", now);
        let mut expired = ReferralRecord::pending("u", "b@example.com", "B", now);
        expired.status = ReferralStatus::Expired;

        let stats = summarize(&[pending, expired], &table, now);
        assert_eq!(stats.total_referrals, 2);
        assert_eq!(stats.pending_referrals, 1);
        assert_eq!(stats.active_referrals, 0);
        assert_eq!(stats.total_earnings, 0);
    }

    #[test]
    fn test_potential_earnings() {
        let table = CommissionTable::default();

        assert_eq!(potential_earnings(&table, 0), 0);
        assert_eq!(potential_earnings(&table, 4), 1000);
        assert_eq!(potential_earnings(&table, u64::MAX), u64::MAX);
    }
}
