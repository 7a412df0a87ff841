use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::model::{AuditLogEntry, BudgetCategory, Category, VelocityRecord, WhitelistedVendor};
use crate::store::{LedgerStore, StoreError};

// Tables
const VENDORS_TABLE: TableDefinition<&str, Vec<u8>> = TableDefinition::new("whitelisted_vendors");
const BUDGETS_TABLE: TableDefinition<&str, Vec<u8>> = TableDefinition::new("budgets");
const VELOCITY_TABLE: TableDefinition<&str, Vec<u8>> =
    TableDefinition::new("transaction_velocity");
const AUDIT_TABLE: TableDefinition<&str, Vec<u8>> = TableDefinition::new("audit_logs");

/// Durable ledger store backed by redb.
///
/// redb serializes write transactions, so every read-modify-write below
/// (velocity CAS, budget increment) runs without interleaving writers.
pub struct RedbLedgerStore {
    db: Arc<Database>,
}

impl RedbLedgerStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        info!("📦 Governance ledger database opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Governance administration: add or replace a whitelisted vendor.
    pub fn upsert_vendor(&self, vendor: &WhitelistedVendor) -> Result<(), StoreError> {
        let key = vendor.wallet_address.to_lowercase();
        let mut row = vendor.clone();
        row.wallet_address = key.clone();

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(VENDORS_TABLE)?;
            table.insert(key.as_str(), serde_json::to_vec(&row)?)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Governance administration: set a category budget row (also used for
    /// period rollover, which is outside the compliance core).
    pub fn set_budget(&self, budget: &BudgetCategory) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(BUDGETS_TABLE)?;
            table.insert(budget.category.as_str(), serde_json::to_vec(budget)?)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn read_row<T: serde::de::DeserializeOwned>(
        &self,
        table: TableDefinition<&str, Vec<u8>>,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(table) {
            Ok(t) => t,
            // First read before any write: the table simply doesn't exist yet
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let row = table
            .get(key)?
            .map(|v| serde_json::from_slice::<T>(&v.value()))
            .transpose()?;
        Ok(row)
    }
}

#[async_trait]
impl LedgerStore for RedbLedgerStore {
    async fn vendor(&self, address: &str) -> Result<Option<WhitelistedVendor>, StoreError> {
        self.read_row(VENDORS_TABLE, &address.to_lowercase())
    }

    async fn budget(&self, category: Category) -> Result<Option<BudgetCategory>, StoreError> {
        self.read_row(BUDGETS_TABLE, category.as_str())
    }

    async fn velocity_window(&self, address: &str) -> Result<Option<VelocityRecord>, StoreError> {
        self.read_row(VELOCITY_TABLE, &address.to_lowercase())
    }

    async fn upsert_velocity_window(
        &self,
        record: &VelocityRecord,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(VELOCITY_TABLE)?;
            let key = record.vendor_address.as_str();

            let found = table
                .get(key)?
                .map(|v| serde_json::from_slice::<VelocityRecord>(&v.value()))
                .transpose()?
                .map(|r| r.version);

            if found != expected_version {
                return Err(StoreError::VersionConflict {
                    address: record.vendor_address.clone(),
                    expected: expected_version,
                    found,
                });
            }

            table.insert(key, serde_json::to_vec(record)?)?;
        }
        txn.commit()?;
        Ok(())
    }

    async fn increment_budget_spent(
        &self,
        category: Category,
        amount: Decimal,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(BUDGETS_TABLE)?;
            let key = category.as_str();

            let mut row = table
                .get(key)?
                .map(|v| serde_json::from_slice::<BudgetCategory>(&v.value()))
                .transpose()?
                .ok_or(StoreError::MissingBudget(category))?;

            row.current_spent += amount;
            table.insert(key, serde_json::to_vec(&row)?)?;
        }
        txn.commit()?;
        Ok(())
    }

    async fn append_audit_log(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(AUDIT_TABLE)?;
            if table.get(entry.id.as_str())?.is_some() {
                return Err(StoreError::Integrity(format!(
                    "audit log entry {} already exists; entries are immutable",
                    entry.id
                )));
            }
            table.insert(entry.id.as_str(), serde_json::to_vec(entry)?)?;
        }
        txn.commit()?;
        Ok(())
    }

    async fn recent_audit_logs(&self, limit: usize) -> Result<Vec<AuditLogEntry>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(AUDIT_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::new();
        for res in table.range::<&str>(..)? {
            let (_, v) = res?;
            let item: AuditLogEntry = serde_json::from_slice(&v.value())?;
            items.push(item);
        }

        // Newest first
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if items.len() > limit {
            items.truncate(limit);
        }

        Ok(items)
    }
}
