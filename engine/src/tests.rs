//! Ledger Integration Tests
//!
//! End-to-end scenarios across registration, completion, upline credits,
//! cycles, stats and concurrent writers.

#[cfg(test)]
mod integration_tests {
    use crate::error::ReferralError;
    use crate::ledger::ReferralLedger;
    use crate::table::CommissionTable;
    use crate::types::{Rank, RecordKind, ReferralRecord, ReferralStatus};

    fn ledger() -> ReferralLedger {
        ReferralLedger::in_memory(CommissionTable::default())
    }

    /// `referrer` refers `referee` and the referee's real id is bound
    fn refer(ledger: &ReferralLedger, referrer: &str, referee: &str) -> ReferralRecord {
        let record = ledger
            .register_referral(referrer, &format!("{}@example.com", referee), referee)
            .unwrap();
        ledger
            .bind_referee(referrer, &record.referee_id, referee)
            .unwrap()
    }

    fn total_earnings(ledger: &ReferralLedger, user: &str) -> u64 {
        ledger.get_stats(user).unwrap().total_earnings
    }

    // =============================================================
    // Dashboard Scenarios
    // =============================================================

    mod scenario_tests {
        use super::*;

        #[test]
        fn test_register_then_complete() {
            let ledger = ledger();
            let record = ledger
                .register_referral("prof_001", "jane.doe@example.com", "Dr. Jane Doe")
                .unwrap();
            assert_eq!(record.status, ReferralStatus::Pending);
            assert_eq!(record.bonus_earned, 0);

            assert!(ledger
                .complete_referral("prof_001", &record.referee_id)
                .unwrap());

            let history = ledger.get_referral_history("prof_001").unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].status, ReferralStatus::Completed);
            assert_eq!(history[0].bonus_earned, 250);
        }

        #[test]
        fn test_five_completions_reach_bronze() {
            let ledger = ledger();
            for i in 0..5 {
                let referee = format!("member_{}", i);
                refer(&ledger, "prof_001", &referee);
                ledger.complete_referral("prof_001", &referee).unwrap();
            }

            let stats = ledger.get_stats("prof_001").unwrap();
            assert_eq!(stats.active_referrals, 5);
            assert_eq!(stats.rank_level, Rank::Bronze);
            assert_eq!(stats.next_rank_requirement, 10);
            assert_eq!(stats.rank_bonus, 100);
        }

        #[test]
        fn test_two_completions_total_500() {
            let ledger = ledger();
            let a = ledger
                .register_referral("prof_001", "a@example.com", "A")
                .unwrap();
            let b = ledger
                .register_referral("prof_001", "b@example.com", "B")
                .unwrap();
            ledger.complete_referral("prof_001", &a.referee_id).unwrap();
            ledger.complete_referral("prof_001", &b.referee_id).unwrap();

            let stats = ledger.get_stats("prof_001").unwrap();
            assert_eq!(stats.total_earnings, 500);
            assert_eq!(stats.monthly_earnings, 500);
            assert_eq!(stats.total_referrals, 2);
        }

        #[test]
        fn test_second_completion_changes_no_totals() {
            let ledger = ledger();
            refer(&ledger, "R", "A");
            refer(&ledger, "A", "B");

            assert!(ledger.complete_referral("A", "B").unwrap());
            let a_before = ledger.get_stats("A").unwrap();
            let r_before = ledger.get_stats("R").unwrap();

            assert!(!ledger.complete_referral("A", "B").unwrap());
            assert_eq!(ledger.get_stats("A").unwrap(), a_before);
            assert_eq!(ledger.get_stats("R").unwrap(), r_before);
        }

        #[test]
        fn test_monthly_earnings_window_at_month_boundaries() {
            use chrono::{Datelike, Duration, TimeZone, Utc};

            let ledger = ledger();
            refer(&ledger, "R", "A");
            let record = refer(&ledger, "A", "B");
            ledger.complete_referral("A", "B").unwrap();

            let date = record.referral_date;
            let month_start = Utc
                .with_ymd_and_hms(date.year(), date.month(), 1, 0, 0, 0)
                .unwrap();
            let next_month_start = if date.month() == 12 {
                Utc.with_ymd_and_hms(date.year() + 1, 1, 1, 0, 0, 0)
            } else {
                Utc.with_ymd_and_hms(date.year(), date.month() + 1, 1, 0, 0, 0)
            }
            .unwrap();

            let stats = ledger.get_stats_at("A", month_start).unwrap();
            assert_eq!(stats.monthly_earnings, 250);
            let stats = ledger
                .get_stats_at("A", next_month_start - Duration::seconds(1))
                .unwrap();
            assert_eq!(stats.monthly_earnings, 250);

            // a month later only the lifetime total remains
            let stats = ledger.get_stats_at("A", next_month_start).unwrap();
            assert_eq!(stats.monthly_earnings, 0);
            assert_eq!(stats.total_earnings, 250);

            let stats = ledger
                .get_stats_at("A", month_start - Duration::seconds(1))
                .unwrap();
            assert_eq!(stats.monthly_earnings, 0);

            // the upline credit was created this month too
            let stats = ledger.get_stats_at("R", month_start).unwrap();
            assert_eq!(stats.monthly_earnings, 100);
            assert_eq!(ledger.get_stats_at("R", next_month_start).unwrap().monthly_earnings, 0);
        }

        #[test]
        fn test_retried_bind_and_complete_credits_once() {
            let ledger = ledger();
            refer(&ledger, "R", "A");
            let record = ledger
                .register_referral("A", "b@example.com", "B")
                .unwrap();

            for expected in [true, false, false] {
                assert_eq!(
                    ledger.complete_referral_as("A", &record.referee_id, "B"),
                    Ok(expected)
                );
            }

            assert_eq!(total_earnings(&ledger, "A"), 250);
            assert_eq!(total_earnings(&ledger, "R"), 100);
            assert_eq!(ledger.record_count().unwrap(), 3);
        }

        #[test]
        fn test_rebinding_a_real_id_leaves_upline_untouched() {
            let ledger = ledger();
            refer(&ledger, "R", "A");
            refer(&ledger, "A", "B");

            assert!(matches!(
                ledger.bind_referee("A", "B", "C"),
                Err(ReferralError::Validation(_))
            ));
            assert!(matches!(
                ledger.complete_referral_as("A", "B", "C"),
                Err(ReferralError::Validation(_))
            ));
            assert_eq!(ledger.referrer_of("B").unwrap(), Some("A".into()));
            assert_eq!(ledger.referrer_of("C").unwrap(), None);

            assert!(ledger.complete_referral("A", "B").unwrap());
            assert_eq!(total_earnings(&ledger, "R"), 100);
        }

        #[test]
        fn test_potential_earnings_matches_level_one_bonus() {
            let ledger = ledger();
            let per_referral = ledger.calculator().calculate_bonus(1000, 1);

            for n in [0u64, 1, 3, 10, 250] {
                assert_eq!(ledger.potential_earnings(n), n * per_referral);
            }
            // projection never writes
            assert_eq!(ledger.record_count().unwrap(), 0);
        }
    }

    // =============================================================
    // Upline Propagation
    // =============================================================

    mod upline_tests {
        use super::*;

        #[test]
        fn test_chain_credits_three_levels() {
            let ledger = ledger();
            // X -> R -> A -> B -> C
            refer(&ledger, "X", "R");
            refer(&ledger, "R", "A");
            refer(&ledger, "A", "B");
            refer(&ledger, "B", "C");

            assert!(ledger.complete_referral("B", "C").unwrap());

            assert_eq!(total_earnings(&ledger, "B"), 250);
            assert_eq!(total_earnings(&ledger, "A"), 100);
            assert_eq!(total_earnings(&ledger, "R"), 50);
            assert_eq!(total_earnings(&ledger, "X"), 0);
            assert_eq!(total_earnings(&ledger, "C"), 0);

            let a_history = ledger.get_referral_history("A").unwrap();
            let credit = a_history.last().unwrap();
            assert_eq!(credit.level, 2);
            assert_eq!(credit.referee_id, "C");
            assert_eq!(
                credit.kind,
                RecordKind::UplineCredit {
                    source_referrer_id: "B".to_string()
                }
            );

            let r_credit = ledger.get_referral_history("R").unwrap().pop().unwrap();
            assert_eq!(r_credit.level, 3);
            assert_eq!(r_credit.bonus_earned, 50);
        }

        #[test]
        fn test_pending_upline_referrals_still_link() {
            let ledger = ledger();
            refer(&ledger, "A", "B");
            refer(&ledger, "B", "C");

            ledger.complete_referral("B", "C").unwrap();

            // A's referral of B is still pending but A is B's referrer
            let a_stats = ledger.get_stats("A").unwrap();
            assert_eq!(a_stats.total_earnings, 100);
            assert_eq!(a_stats.pending_referrals, 1);
            assert_eq!(a_stats.active_referrals, 0);
        }

        #[test]
        fn test_expired_upline_does_not_earn() {
            let ledger = ledger();
            refer(&ledger, "A", "B");
            refer(&ledger, "B", "C");
            ledger.expire_referral("A", "B").unwrap();

            ledger.complete_referral("B", "C").unwrap();
            assert_eq!(total_earnings(&ledger, "A"), 0);
        }

        #[test]
        fn test_provisional_referee_has_no_upline() {
            let ledger = ledger();
            let record = ledger
                .register_referral("A", "b@example.com", "B")
                .unwrap();

            assert!(ledger.complete_referral("A", &record.referee_id).unwrap());
            assert_eq!(ledger.get_referral_history("A").unwrap().len(), 1);
            assert_eq!(ledger.system_metrics().unwrap().total_records, 1);
        }

        #[test]
        fn test_totals_equal_sum_of_bonuses() {
            let ledger = ledger();
            refer(&ledger, "R", "A");
            refer(&ledger, "A", "B");
            refer(&ledger, "A", "B2");
            refer(&ledger, "B", "C");
            refer(&ledger, "B2", "C2");
            ledger.complete_referral("A", "B").unwrap();
            ledger.complete_referral("B", "C").unwrap();
            ledger.complete_referral("B2", "C2").unwrap();

            for user in ["R", "A", "B", "B2", "C", "C2"] {
                let history = ledger.get_referral_history(user).unwrap();
                let sum: u64 = history
                    .iter()
                    .filter(|r| r.status == ReferralStatus::Completed)
                    .map(|r| r.bonus_earned)
                    .sum();
                assert_eq!(total_earnings(&ledger, user), sum, "user {}", user);
            }

            // A: 250 (B) + 100 (C via B) + 100 (C2 via B2)
            assert_eq!(total_earnings(&ledger, "A"), 450);
            // R: 100 (B via A) + 50 + 50
            assert_eq!(total_earnings(&ledger, "R"), 200);

            let metrics = ledger.system_metrics().unwrap();
            assert_eq!(metrics.total_distributed, 250 * 3 + 100 * 3 + 50 * 2);
            assert_eq!(metrics.completed_referrals, 3);
            assert_eq!(metrics.pending_referrals, 2);
        }
    }

    // =============================================================
    // Cycle Safety
    // =============================================================

    mod cycle_tests {
        use super::*;

        #[test]
        fn test_two_node_cycle_keeps_level_one() {
            let ledger = ledger();
            // A referred B and B referred A
            refer(&ledger, "A", "B");
            refer(&ledger, "B", "A");

            let result = ledger.complete_referral("A", "B");
            match result {
                Err(ReferralError::CycleDetected { path }) => {
                    assert_eq!(path, vec!["B", "A", "B"]);
                }
                other => panic!("expected cycle, got {:?}", other),
            }

            assert_eq!(total_earnings(&ledger, "A"), 250);
            assert_eq!(total_earnings(&ledger, "B"), 0);

            // committed despite the error, so the retry is a no-op
            assert!(!ledger.complete_referral("A", "B").unwrap());
        }

        #[test]
        fn test_three_node_cycle_keeps_resolved_levels() {
            let ledger = ledger();
            // A -> B -> C -> A
            refer(&ledger, "A", "B");
            refer(&ledger, "B", "C");
            refer(&ledger, "C", "A");

            let err = ledger.complete_referral("B", "C").unwrap_err();
            assert!(err.is_warning());

            assert_eq!(total_earnings(&ledger, "B"), 250);
            assert_eq!(total_earnings(&ledger, "A"), 100);
            assert_eq!(total_earnings(&ledger, "C"), 0);
        }

        #[test]
        fn test_cycle_beyond_depth_is_not_reported() {
            let ledger = ledger();
            // A -> B -> C -> D -> A, walk from C only reaches B and A
            refer(&ledger, "A", "B");
            refer(&ledger, "B", "C");
            refer(&ledger, "C", "D");
            refer(&ledger, "D", "A");

            assert!(ledger.complete_referral("C", "D").unwrap());
            assert_eq!(total_earnings(&ledger, "C"), 250);
            assert_eq!(total_earnings(&ledger, "B"), 100);
            assert_eq!(total_earnings(&ledger, "A"), 50);
        }
    }

    // =============================================================
    // Concurrency
    // =============================================================

    mod concurrency_tests {
        use super::*;
        use std::sync::Arc;
        use std::thread;

        #[test]
        fn test_concurrent_completion_credits_once() {
            let ledger = Arc::new(ledger());
            refer(&ledger, "R", "A");
            refer(&ledger, "A", "B");
            refer(&ledger, "B", "C");

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let ledger = Arc::clone(&ledger);
                    thread::spawn(move || ledger.complete_referral("B", "C").unwrap())
                })
                .collect();

            let completed = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|done| *done)
                .count();

            assert_eq!(completed, 1);
            assert_eq!(total_earnings(&ledger, "B"), 250);
            assert_eq!(total_earnings(&ledger, "A"), 100);
            assert_eq!(total_earnings(&ledger, "R"), 50);
        }

        #[test]
        fn test_concurrent_registration_is_idempotent() {
            let ledger = Arc::new(ledger());

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let ledger = Arc::clone(&ledger);
                    thread::spawn(move || {
                        ledger
                            .register_referral("prof_001", "jane@example.com", "Jane")
                            .unwrap()
                            .id
                    })
                })
                .collect();

            let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert!(ids.windows(2).all(|w| w[0] == w[1]));
            assert_eq!(ledger.record_count().unwrap(), 1);
        }

        #[test]
        fn test_readers_never_see_partial_propagation() {
            let ledger = Arc::new(ledger());
            let mut referees = Vec::new();
            refer(&ledger, "R", "A");
            for i in 0..50 {
                let referee = format!("m{}", i);
                refer(&ledger, "A", &referee);
                referees.push(referee);
            }

            let writer = {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for referee in referees {
                        ledger.complete_referral("A", &referee).unwrap();
                    }
                })
            };

            // every completion distributes 250 to A and 100 to R together
            for _ in 0..200 {
                let metrics = ledger.system_metrics().unwrap();
                assert_eq!(
                    metrics.total_distributed,
                    metrics.completed_referrals as u64 * 350
                );
            }
            writer.join().unwrap();

            let a = ledger.get_stats("A").unwrap();
            let r = ledger.get_stats("R").unwrap();
            assert_eq!(a.active_referrals, 50);
            assert_eq!(r.total_earnings, 50 * 100);
        }
    }

    // =============================================================
    // Custom Commission Tables
    // =============================================================

    mod table_tests {
        use super::*;
        use crate::table::RankThreshold;

        #[test]
        fn test_swapped_table_changes_payouts() {
            let table = CommissionTable::new(
                2000,
                vec![5000, 2500],
                vec![RankThreshold::new(Rank::Gold, 1, 999)],
            )
            .unwrap();
            let ledger = ReferralLedger::in_memory(table);
            refer(&ledger, "R", "A");
            refer(&ledger, "A", "B");
            refer(&ledger, "B", "C");

            ledger.complete_referral("B", "C").unwrap();

            assert_eq!(total_earnings(&ledger, "B"), 1000);
            assert_eq!(total_earnings(&ledger, "A"), 500);
            // two-level table stops before R
            assert_eq!(total_earnings(&ledger, "R"), 0);

            let stats = ledger.get_stats("B").unwrap();
            assert_eq!(stats.rank_level, Rank::Gold);
            assert_eq!(stats.next_rank_requirement, 0);
            assert_eq!(ledger.potential_earnings(2), 2000);
        }
    }
}
