pub mod memory;
pub mod redb_store;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::{AuditLogEntry, BudgetCategory, Category, VelocityRecord, WhitelistedVendor};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redb error: {0}")]
    Redb(#[from] redb::Error),
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Velocity version conflict for {address}: expected {expected:?}, found {found:?}")]
    VersionConflict {
        address: String,
        expected: Option<u64>,
        found: Option<u64>,
    },
    #[error("No budget configured for category {0}")]
    MissingBudget(Category),
    #[error("Data integrity error: {0}")]
    Integrity(String),
}

/// Read/write contract between the compliance core and the governance ledger.
///
/// Reads may serve a stale snapshot; the decision pipeline tolerates that.
/// The two mutation paths carry stricter guarantees:
///
/// - `upsert_velocity_window` is an optimistic-concurrency compare-and-swap
///   on `VelocityRecord::version`. `expected_version` of `None` means "no
///   record existed when I read". A mismatch returns
///   `StoreError::VersionConflict` and the caller retries from a fresh read.
/// - `increment_budget_spent` is an atomic read-modify-write inside the
///   store. Concurrent increments must all be reflected in `current_spent`.
///
/// Vendor and budget rows are created and updated by governance
/// administration, outside this trait.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Look up a whitelisted vendor by wallet address (case-insensitive).
    async fn vendor(&self, address: &str) -> Result<Option<WhitelistedVendor>, StoreError>;

    async fn budget(&self, category: Category) -> Result<Option<BudgetCategory>, StoreError>;

    /// Current velocity record for a vendor, expired or not. Window-expiry
    /// policy belongs to the velocity tracker, not the store.
    async fn velocity_window(&self, address: &str) -> Result<Option<VelocityRecord>, StoreError>;

    async fn upsert_velocity_window(
        &self,
        record: &VelocityRecord,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError>;

    async fn increment_budget_spent(
        &self,
        category: Category,
        amount: Decimal,
    ) -> Result<(), StoreError>;

    /// Append one immutable audit entry. Entries are never updated or
    /// deleted.
    async fn append_audit_log(&self, entry: &AuditLogEntry) -> Result<(), StoreError>;

    /// Most recent audit entries, newest first.
    async fn recent_audit_logs(&self, limit: usize) -> Result<Vec<AuditLogEntry>, StoreError>;
}
