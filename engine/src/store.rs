//! Storage backend for the referral ledger
//!
//! # Design
//!
//! The ledger never talks to a database directly. It reads through
//! [`ReferralStore`] and writes through [`ReferralStore::commit`], handing
//! over a [`WriteBatch`] that the store must apply whole or not at all.
//! A completion (level-1 stamp + upline credits) is always one batch.
//!
//! ```text
//! ReferralLedger ──RwLock──▶ impl ReferralStore
//!                               ├── MemoryStore (in-process, tests)
//!                               └── (SQL, KV, ... provided by the host app)
//! ```
//!
//! The store also owns the `referee_id -> referrer_id` index used for
//! upline walks. It is derived from direct records as they are committed,
//! so callers never maintain it by hand.
//!
//! Index rules:
//! - only direct, non-expired records participate
//! - a completed referral replaces a pending one for the same referee
//! - otherwise the first referrer to claim a referee keeps it

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::{ReferralError, ReferralResult};
use crate::types::{ReferralRecord, ReferralStatus};

/// A single ledger mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    /// Add a new record
    Insert(ReferralRecord),
    /// Replace the record with the same id
    Update(ReferralRecord),
    /// Register an issued referral code
    IssueCode { code: String, owner: String },
}

/// Mutations applied atomically by [`ReferralStore::commit`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    writes: Vec<LedgerWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ReferralRecord) -> &mut Self {
        self.writes.push(LedgerWrite::Insert(record));
        self
    }

    pub fn update(&mut self, record: ReferralRecord) -> &mut Self {
        self.writes.push(LedgerWrite::Update(record));
        self
    }

    pub fn issue_code(&mut self, code: String, owner: String) -> &mut Self {
        self.writes.push(LedgerWrite::IssueCode { code, owner });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn writes(&self) -> &[LedgerWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<LedgerWrite> {
        self.writes
    }
}

/// Storage interface injected into the ledger
///
/// Implementations are called with the ledger lock held: reads under the
/// read lock, `commit` under the write lock.
pub trait ReferralStore: Send + Sync {
    /// Records owned by `referrer_id`, in insertion order
    fn records_for(&self, referrer_id: &str) -> ReferralResult<Vec<ReferralRecord>>;

    /// Every user that owns at least one record
    fn referrer_ids(&self) -> ReferralResult<Vec<String>>;

    /// Total number of records
    fn record_count(&self) -> ReferralResult<usize>;

    /// Who referred `referee_id`, from the upline index
    fn referrer_of(&self, referee_id: &str) -> ReferralResult<Option<String>>;

    /// Owner of an issued referral code
    fn code_owner(&self, code: &str) -> ReferralResult<Option<String>>;

    /// Apply every write in `batch`, or none of them
    fn commit(&mut self, batch: WriteBatch) -> ReferralResult<()>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Records per referrer, insertion ordered
    records: HashMap<String, Vec<ReferralRecord>>,
    /// Record id -> (referrer, position)
    locator: HashMap<Uuid, (String, usize)>,
    /// Referee id -> id of the direct record that links it to its referrer
    referee_index: HashMap<String, Uuid>,
    /// Referral code -> owning user
    codes: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, id: &Uuid) -> Option<&ReferralRecord> {
        let (referrer, pos) = self.locator.get(id)?;
        self.records.get(referrer)?.get(*pos)
    }

    /// Reject the batch before anything is applied
    fn validate(&self, batch: &WriteBatch) -> ReferralResult<()> {
        let mut touched: HashSet<Uuid> = HashSet::new();
        let mut new_codes: HashSet<&str> = HashSet::new();

        for write in batch.writes() {
            match write {
                LedgerWrite::Insert(record) => {
                    if self.locator.contains_key(&record.id) || !touched.insert(record.id) {
                        return Err(ReferralError::Storage(format!(
                            "record {} already exists",
                            record.id
                        )));
                    }
                }
                LedgerWrite::Update(record) => {
                    let current = self.get(&record.id).ok_or_else(|| {
                        ReferralError::Storage(format!("record {} does not exist", record.id))
                    })?;
                    if !touched.insert(record.id) {
                        return Err(ReferralError::Storage(format!(
                            "record {} written twice in one batch",
                            record.id
                        )));
                    }
                    if current.referrer_id != record.referrer_id {
                        return Err(ReferralError::Storage(format!(
                            "record {} cannot change owner",
                            record.id
                        )));
                    }
                    if current.status != record.status
                        && !current.status.can_transition_to(record.status)
                    {
                        return Err(ReferralError::Storage(format!(
                            "record {} cannot move from {} to {}",
                            record.id, current.status, record.status
                        )));
                    }
                }
                LedgerWrite::IssueCode { code, .. } => {
                    if self.codes.contains_key(code) || !new_codes.insert(code.as_str()) {
                        return Err(ReferralError::Storage(format!(
                            "referral code {} already issued",
                            code
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn index_record(&mut self, record: &ReferralRecord) {
        if !record.is_direct() {
            return;
        }

        if record.status == ReferralStatus::Expired {
            self.unindex(record);
            return;
        }

        let replace = match self.referee_index.get(&record.referee_id) {
            None => true,
            Some(existing) if *existing == record.id => false,
            Some(existing) => {
                let existing_pending = self
                    .get(existing)
                    .map(|r| r.status != ReferralStatus::Completed)
                    .unwrap_or(true);
                existing_pending && record.is_completed()
            }
        };

        if replace {
            self.referee_index
                .insert(record.referee_id.clone(), record.id);
        }
    }

    fn unindex(&mut self, record: &ReferralRecord) {
        if self.referee_index.get(&record.referee_id) == Some(&record.id) {
            self.referee_index.remove(&record.referee_id);
        }
    }

    fn apply(&mut self, write: LedgerWrite) {
        match write {
            LedgerWrite::Insert(record) => {
                let owned = self.records.entry(record.referrer_id.clone()).or_default();
                self.locator
                    .insert(record.id, (record.referrer_id.clone(), owned.len()));
                owned.push(record.clone());
                self.index_record(&record);
            }
            LedgerWrite::Update(record) => {
                let Some((referrer, pos)) = self.locator.get(&record.id).cloned() else {
                    return;
                };
                let Some(slot) = self.records.get_mut(&referrer).and_then(|v| v.get_mut(pos))
                else {
                    return;
                };
                let previous = std::mem::replace(slot, record.clone());
                if previous.referee_id != record.referee_id {
                    self.unindex(&previous);
                }
                self.index_record(&record);
            }
            LedgerWrite::IssueCode { code, owner } => {
                self.codes.insert(code, owner);
            }
        }
    }
}

impl ReferralStore for MemoryStore {
    fn records_for(&self, referrer_id: &str) -> ReferralResult<Vec<ReferralRecord>> {
        Ok(self.records.get(referrer_id).cloned().unwrap_or_default())
    }

    fn referrer_ids(&self) -> ReferralResult<Vec<String>> {
        Ok(self.records.keys().cloned().collect())
    }

    fn record_count(&self) -> ReferralResult<usize> {
        Ok(self.locator.len())
    }

    fn referrer_of(&self, referee_id: &str) -> ReferralResult<Option<String>> {
        Ok(self
            .referee_index
            .get(referee_id)
            .and_then(|id| self.get(id))
            .map(|r| r.referrer_id.clone()))
    }

    fn code_owner(&self, code: &str) -> ReferralResult<Option<String>> {
        Ok(self.codes.get(code).cloned())
    }

    fn commit(&mut self, batch: WriteBatch) -> ReferralResult<()> {
        self.validate(&batch)?;
        for write in batch.into_writes() {
            self.apply(write);
        }
        Ok(())
    }
}
