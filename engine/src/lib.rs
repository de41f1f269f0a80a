//! Referral Commission Engine
//!
//! Multi-level "refer-and-earn" core: tracks who referred whom, pays
//! commission across three referral levels and derives rank tiers from
//! completed referral counts.
//!
//! # Components
//! - `CommissionTable`: base amount, level rates, rank thresholds
//! - `ReferralLedger`: referral records, upline index, all writes
//! - `CommissionCalculator`: level bonuses and the upline walk
//! - `RankEngine`: tier lookup and distance to the next tier
//! - `stats`: dashboard projections (read-only)
//! - `ReferralStore`: storage backend trait, `MemoryStore` implementation
//!
//! # Example
//! ```
//! use referral_engine::{CommissionTable, ReferralLedger, ReferralStatus};
//!
//! let ledger = ReferralLedger::in_memory(CommissionTable::default());
//! let record = ledger
//!     .register_referral("prof_001", "jane.doe@example.com", "Dr. Jane Doe")
//!     .unwrap();
//! assert_eq!(record.status, ReferralStatus::Pending);
//!
//! assert!(ledger.complete_referral("prof_001", &record.referee_id).unwrap());
//! assert_eq!(ledger.get_stats("prof_001").unwrap().total_earnings, 250);
//! ```

pub mod commission;
pub mod error;
pub mod ledger;
pub mod rank;
pub mod stats;
pub mod store;
pub mod table;
pub mod types;

#[cfg(test)]
mod tests;

pub use commission::{CommissionCalculator, Propagation};
pub use error::{ReferralError, ReferralResult};
pub use ledger::ReferralLedger;
pub use rank::RankEngine;
pub use store::{LedgerWrite, MemoryStore, ReferralStore, WriteBatch};
pub use table::{CommissionTable, RankThreshold};
pub use types::{
    Amount, BasisPoints, Rank, RecordKind, ReferralRecord, ReferralStats, ReferralStatus,
    RegistrationMode, SystemMetrics,
};
