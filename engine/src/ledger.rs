//! Referral Ledger
//!
//! Owns every referral record through an injected [`ReferralStore`] and
//! serializes all writes behind one `RwLock`.
//!
//! # Lifecycle
//!
//! ```text
//! register_referral ──▶ Pending ──complete_referral──▶ Completed (+ upline credits)
//!                          │
//!                          └──────expire_referral───▶ Expired
//! ```
//!
//! # Consistency
//!
//! - Writers hold the write lock from the first read to the commit, so two
//!   completions can never both see a record as pending.
//! - A completion is one [`WriteBatch`]: readers see either none of it or
//!   the level-1 stamp together with every upline credit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use sha3::{Digest, Keccak256};
use tracing::{debug, info, instrument, warn};

use crate::commission::CommissionCalculator;
use crate::error::{validation, ReferralError, ReferralResult};
use crate::rank::RankEngine;
use crate::store::{MemoryStore, ReferralStore, WriteBatch};
use crate::table::CommissionTable;
use crate::types::{ReferralRecord, ReferralStatus, RegistrationMode};

/// Prefix of generated referral codes
pub const CODE_PREFIX: &str = "REF";

/// Hex characters of the Keccak tag in a referral code
const CODE_TAG_LEN: usize = 8;

/// Referral ledger service
pub struct ReferralLedger<S: ReferralStore = MemoryStore> {
    table: CommissionTable,
    store: RwLock<S>,
    code_sequence: AtomicU64,
}

impl ReferralLedger<MemoryStore> {
    /// Ledger backed by a fresh [`MemoryStore`]
    pub fn in_memory(table: CommissionTable) -> Self {
        Self::new(table, MemoryStore::new())
    }
}

impl Default for ReferralLedger<MemoryStore> {
    fn default() -> Self {
        Self::in_memory(CommissionTable::default())
    }
}

impl<S: ReferralStore> ReferralLedger<S> {
    pub fn new(table: CommissionTable, store: S) -> Self {
        Self {
            table,
            store: RwLock::new(store),
            code_sequence: AtomicU64::new(0),
        }
    }

    pub fn table(&self) -> &CommissionTable {
        &self.table
    }

    pub fn calculator(&self) -> CommissionCalculator<'_> {
        CommissionCalculator::new(&self.table)
    }

    pub fn rank_engine(&self) -> RankEngine<'_> {
        RankEngine::new(&self.table)
    }

    pub(crate) fn read_store(&self) -> ReferralResult<RwLockReadGuard<'_, S>> {
        self.store
            .read()
            .map_err(|_| ReferralError::Storage("ledger lock poisoned".to_string()))
    }

    fn write_store(&self) -> ReferralResult<RwLockWriteGuard<'_, S>> {
        self.store
            .write()
            .map_err(|_| ReferralError::Storage("ledger lock poisoned".to_string()))
    }

    // ============ Referral Codes ============

    /// Issue a new public referral code for `user_id`.
    ///
    /// Format: `REF-<USER>-<TAG>`, where `<TAG>` is taken from
    /// `keccak256("<user_id>:<sequence>")`. Codes already issued are skipped.
    #[instrument(skip(self))]
    pub fn generate_referral_code(&self, user_id: &str) -> ReferralResult<String> {
        let user_id = validation::require_non_empty("user id", user_id)?;
        let mut store = self.write_store()?;

        loop {
            let sequence = self.code_sequence.fetch_add(1, Ordering::Relaxed);
            let code = format_referral_code(&user_id, sequence);
            if store.code_owner(&code)?.is_some() {
                continue;
            }

            let mut batch = WriteBatch::new();
            batch.issue_code(code.clone(), user_id.clone());
            store.commit(batch)?;

            debug!(code = %code, "Referral code issued");
            return Ok(code);
        }
    }

    /// Owner of a previously issued code
    pub fn resolve_referral_code(&self, code: &str) -> ReferralResult<Option<String>> {
        let code = code.trim().to_ascii_uppercase();
        self.read_store()?.code_owner(&code)
    }

    // ============ Registration ============

    /// Register a referral; an existing live referral for the same email is
    /// returned as-is.
    pub fn register_referral(
        &self,
        referrer_id: &str,
        email: &str,
        name: &str,
    ) -> ReferralResult<ReferralRecord> {
        self.register_referral_with(referrer_id, email, name, RegistrationMode::Idempotent)
    }

    #[instrument(skip(self, email, name))]
    pub fn register_referral_with(
        &self,
        referrer_id: &str,
        email: &str,
        name: &str,
        mode: RegistrationMode,
    ) -> ReferralResult<ReferralRecord> {
        let referrer_id = validation::require_non_empty("referrer id", referrer_id)?;
        let email = validation::require_non_empty("referee email", email)?;
        let name = validation::require_non_empty("referee name", name)?;

        let mut store = self.write_store()?;

        let existing = store.records_for(&referrer_id)?.into_iter().find(|r| {
            r.is_direct() && r.matches_email(&email) && r.status != ReferralStatus::Expired
        });

        if let Some(existing) = existing {
            return match mode {
                RegistrationMode::Idempotent => {
                    debug!(record = %existing.id, "Referral already registered");
                    Ok(existing)
                }
                RegistrationMode::Strict => Err(ReferralError::DuplicateReferral {
                    referrer_id,
                    email,
                }),
            };
        }

        let record = ReferralRecord::pending(&referrer_id, &email, &name, Utc::now());
        let mut batch = WriteBatch::new();
        batch.insert(record.clone());
        store.commit(batch)?;

        info!(record = %record.id, referee = %record.referee_id, "Referral registered");
        Ok(record)
    }

    /// Replace a pending record's provisional referee id with the referee's
    /// real account id. Binding the id a record already carries is a no-op;
    /// any other rebind of a real id fails with `Validation`.
    #[instrument(skip(self))]
    pub fn bind_referee(
        &self,
        referrer_id: &str,
        current_id: &str,
        real_id: &str,
    ) -> ReferralResult<ReferralRecord> {
        let real_id = validation::require_non_empty("referee id", real_id)?;
        let mut store = self.write_store()?;

        let records = store.records_for(referrer_id)?;
        let mut record = records
            .iter()
            .find(|r| {
                r.is_direct()
                    && r.referee_id == current_id
                    && r.status == ReferralStatus::Pending
            })
            .cloned()
            .ok_or_else(|| not_found(referrer_id, current_id))?;

        if !bind_real_id(&records, &mut record, real_id)? {
            return Ok(record);
        }

        let mut batch = WriteBatch::new();
        batch.update(record.clone());
        store.commit(batch)?;

        debug!(record = %record.id, referee = %record.referee_id, "Referee bound");
        Ok(record)
    }

    // ============ Completion ============

    /// Complete the referral of `referee_id` by `referrer_id`.
    ///
    /// `referee_id` is the record's current referee id: the real id if one
    /// was bound, the provisional id otherwise.
    ///
    /// Returns `Ok(true)` when the referral moved to completed and
    /// `Ok(false)` when it was already completed. A detected upline cycle
    /// returns `Err(CycleDetected)` after the completion was committed.
    pub fn complete_referral(&self, referrer_id: &str, referee_id: &str) -> ReferralResult<bool> {
        self.complete(referrer_id, referee_id, None)
    }

    /// Complete a referral and bind the referee's real id in the same batch.
    ///
    /// Retrying with the same arguments after success returns `Ok(false)`.
    pub fn complete_referral_as(
        &self,
        referrer_id: &str,
        provisional_id: &str,
        real_id: &str,
    ) -> ReferralResult<bool> {
        let real_id = validation::require_non_empty("referee id", real_id)?;
        self.complete(referrer_id, provisional_id, Some(real_id))
    }

    #[instrument(skip(self))]
    fn complete(
        &self,
        referrer_id: &str,
        referee_id: &str,
        real_id: Option<String>,
    ) -> ReferralResult<bool> {
        let mut store = self.write_store()?;
        let records = store.records_for(referrer_id)?;

        let matching: Vec<&ReferralRecord> = records
            .iter()
            .filter(|r| r.is_direct() && r.referee_id == referee_id)
            .collect();

        let Some(pending) = matching
            .iter()
            .find(|r| r.status == ReferralStatus::Pending)
        else {
            // a retried bind-and-complete finds its record under the real id
            let completed_as_real = real_id.as_deref().is_some_and(|real_id| {
                records
                    .iter()
                    .any(|r| r.is_direct() && r.is_completed() && r.referee_id == real_id)
            });
            if completed_as_real || matching.iter().any(|r| r.is_completed()) {
                debug!("Referral already completed");
                return Ok(false);
            }
            return Err(not_found(referrer_id, referee_id));
        };

        let mut record = (*pending).clone();
        if let Some(real_id) = real_id {
            bind_real_id(&records, &mut record, real_id)?;
        }

        let now = Utc::now();
        let base_amount = self.table.base_amount();
        let calculator = self.calculator();

        record.status = ReferralStatus::Completed;
        record.bonus_earned = calculator.calculate_bonus(base_amount, 1);
        record.completed_at = Some(now);

        let propagation = {
            let store_ref: &S = &store;
            calculator.propagate_upline(&record, base_amount, now, |id| store_ref.referrer_of(id))?
        };

        let mut batch = WriteBatch::new();
        batch.update(record.clone());
        for credit in &propagation.credits {
            batch.insert(credit.clone());
        }
        store.commit(batch)?;
        drop(store);

        info!(
            record = %record.id,
            referee = %record.referee_id,
            bonus = record.bonus_earned,
            upline_credits = propagation.credits.len(),
            "Referral completed"
        );

        if let Some(path) = propagation.cycle {
            let err = ReferralError::CycleDetected { path };
            warn!(error = %err, "Upline walk stopped at a cycle");
            return Err(err);
        }

        Ok(true)
    }

    // ============ Expiry ============

    /// Expire a pending referral. `Ok(false)` if it was already expired.
    #[instrument(skip(self))]
    pub fn expire_referral(&self, referrer_id: &str, referee_id: &str) -> ReferralResult<bool> {
        let mut store = self.write_store()?;
        let records = store.records_for(referrer_id)?;

        let matching: Vec<&ReferralRecord> = records
            .iter()
            .filter(|r| r.is_direct() && r.referee_id == referee_id)
            .collect();

        let Some(pending) = matching
            .iter()
            .find(|r| r.status == ReferralStatus::Pending)
        else {
            if !matching.is_empty()
                && matching.iter().all(|r| r.status == ReferralStatus::Expired)
            {
                return Ok(false);
            }
            return Err(not_found(referrer_id, referee_id));
        };

        let mut record = (*pending).clone();
        record.status = ReferralStatus::Expired;

        let mut batch = WriteBatch::new();
        batch.update(record.clone());
        store.commit(batch)?;

        info!(record = %record.id, "Referral expired");
        Ok(true)
    }

    /// Expire every pending referral created before `cutoff`
    #[instrument(skip(self))]
    pub fn expire_stale(&self, cutoff: DateTime<Utc>) -> ReferralResult<usize> {
        let mut store = self.write_store()?;

        let mut batch = WriteBatch::new();
        for referrer_id in store.referrer_ids()? {
            for mut record in store.records_for(&referrer_id)? {
                if record.is_direct()
                    && record.status == ReferralStatus::Pending
                    && record.referral_date < cutoff
                {
                    record.status = ReferralStatus::Expired;
                    batch.update(record);
                }
            }
        }

        if batch.is_empty() {
            return Ok(0);
        }

        let expired = batch.len();
        store.commit(batch)?;
        info!(expired, "Stale referrals expired");
        Ok(expired)
    }

    // ============ Reads ============

    /// Every record credited to `user_id`, upline credits included, in
    /// insertion order
    pub fn get_referral_history(&self, user_id: &str) -> ReferralResult<Vec<ReferralRecord>> {
        self.read_store()?.records_for(user_id)
    }

    /// Who referred `user_id`, according to the upline index
    pub fn referrer_of(&self, user_id: &str) -> ReferralResult<Option<String>> {
        self.read_store()?.referrer_of(user_id)
    }

    pub fn record_count(&self) -> ReferralResult<usize> {
        self.read_store()?.record_count()
    }
}

fn not_found(referrer_id: &str, referee_id: &str) -> ReferralError {
    ReferralError::NotFound {
        referrer_id: referrer_id.to_string(),
        referee_id: referee_id.to_string(),
    }
}

/// `real_id` must not be the referrer and must not already name another
/// live referral of the same referrer
fn check_bindable(
    records: &[ReferralRecord],
    record: &ReferralRecord,
    real_id: &str,
) -> ReferralResult<()> {
    if real_id == record.referrer_id {
        return Err(ReferralError::Validation(
            "a user cannot refer themselves".to_string(),
        ));
    }

    let taken = records.iter().any(|r| {
        r.id != record.id
            && r.is_direct()
            && r.referee_id == real_id
            && r.status != ReferralStatus::Expired
    });
    if taken {
        return Err(ReferralError::Validation(format!(
            "referee {} is already linked to another referral",
            real_id
        )));
    }
    Ok(())
}

/// Move `record` from its provisional referee id to `real_id`.
///
/// Returns `Ok(false)` when `record` already carries `real_id`.
fn bind_real_id(
    records: &[ReferralRecord],
    record: &mut ReferralRecord,
    real_id: String,
) -> ReferralResult<bool> {
    if record.referee_id == real_id {
        return Ok(false);
    }
    if !record.has_provisional_referee() {
        return Err(ReferralError::Validation(format!(
            "referee {} is already bound to a real account",
            record.referee_id
        )));
    }

    check_bindable(records, record, &real_id)?;
    record.referee_id = real_id;
    Ok(true)
}

fn format_referral_code(user_id: &str, sequence: u64) -> String {
    let mut user: String = user_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if user.is_empty() {
        user = "USER".to_string();
    }

    let digest = Keccak256::digest(format!("{}:{}", user_id, sequence).as_bytes());
    let tag = hex::encode_upper(digest);

    format!("{}-{}-{}", CODE_PREFIX, user, &tag[..CODE_TAG_LEN])
}
