use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::model::{AuditLogEntry, BudgetCategory, Category, VelocityRecord, WhitelistedVendor};
use crate::store::{LedgerStore, StoreError};

/// In-memory ledger store. Mutations run while holding the relevant shard
/// entry lock, so concurrent velocity/budget updates cannot lose writes.
#[derive(Default)]
pub struct MemoryLedgerStore {
    vendors: DashMap<String, WhitelistedVendor>,
    budgets: DashMap<Category, BudgetCategory>,
    velocity: DashMap<String, VelocityRecord>,
    audit_logs: Mutex<Vec<AuditLogEntry>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Governance administration: add or replace a whitelisted vendor.
    pub fn upsert_vendor(&self, mut vendor: WhitelistedVendor) {
        vendor.wallet_address = vendor.wallet_address.to_lowercase();
        self.vendors.insert(vendor.wallet_address.clone(), vendor);
    }

    /// Governance administration: set a category budget row. Also how period
    /// rollover is performed - the core itself never resets `current_spent`.
    pub fn set_budget(&self, budget: BudgetCategory) {
        self.budgets.insert(budget.category, budget);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn vendor(&self, address: &str) -> Result<Option<WhitelistedVendor>, StoreError> {
        Ok(self
            .vendors
            .get(&address.to_lowercase())
            .map(|v| v.value().clone()))
    }

    async fn budget(&self, category: Category) -> Result<Option<BudgetCategory>, StoreError> {
        Ok(self.budgets.get(&category).map(|b| b.value().clone()))
    }

    async fn velocity_window(&self, address: &str) -> Result<Option<VelocityRecord>, StoreError> {
        Ok(self
            .velocity
            .get(&address.to_lowercase())
            .map(|r| r.value().clone()))
    }

    async fn upsert_velocity_window(
        &self,
        record: &VelocityRecord,
        expected_version: Option<u64>,
    ) -> Result<(), StoreError> {
        // The entry guard holds the shard write lock across the version
        // check and the write.
        match self.velocity.entry(record.vendor_address.clone()) {
            Entry::Occupied(mut occupied) => {
                let found = occupied.get().version;
                if expected_version == Some(found) {
                    occupied.insert(record.clone());
                    Ok(())
                } else {
                    Err(StoreError::VersionConflict {
                        address: record.vendor_address.clone(),
                        expected: expected_version,
                        found: Some(found),
                    })
                }
            }
            Entry::Vacant(vacant) => {
                if expected_version.is_none() {
                    vacant.insert(record.clone());
                    Ok(())
                } else {
                    Err(StoreError::VersionConflict {
                        address: record.vendor_address.clone(),
                        expected: expected_version,
                        found: None,
                    })
                }
            }
        }
    }

    async fn increment_budget_spent(
        &self,
        category: Category,
        amount: Decimal,
    ) -> Result<(), StoreError> {
        let mut row = self
            .budgets
            .get_mut(&category)
            .ok_or(StoreError::MissingBudget(category))?;
        row.current_spent += amount;
        Ok(())
    }

    async fn append_audit_log(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        self.audit_logs.lock().push(entry.clone());
        Ok(())
    }

    async fn recent_audit_logs(&self, limit: usize) -> Result<Vec<AuditLogEntry>, StoreError> {
        let logs = self.audit_logs.lock();
        Ok(logs.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::dec;

    fn vendor(address: &str) -> WhitelistedVendor {
        WhitelistedVendor {
            wallet_address: address.to_string(),
            vendor_name: "PT Test Vendor".to_string(),
            category: Category::Software,
            max_transaction_limit: dec!(100),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_vendor_lookup_is_case_insensitive() {
        let store = MemoryLedgerStore::new();
        store.upsert_vendor(vendor("0xAbCd35Cc6634C0532925a3b844Bc9e7595f0bEbc"));

        let hit = store
            .vendor("0xABCD35CC6634C0532925A3B844BC9E7595F0BEBC")
            .await
            .unwrap();
        assert!(hit.is_some());
        assert_eq!(
            hit.unwrap().wallet_address,
            "0xabcd35cc6634c0532925a3b844bc9e7595f0bebc"
        );
    }

    #[tokio::test]
    async fn test_velocity_cas_detects_conflict() {
        let store = MemoryLedgerStore::new();
        let now = Utc::now();
        let rec = VelocityRecord::open("0xaaa", dec!(10), now);

        store.upsert_velocity_window(&rec, None).await.unwrap();

        // A second insert that believes no record exists must fail
        let racer = VelocityRecord::open("0xaaa", dec!(20), now);
        let err = store.upsert_velocity_window(&racer, None).await;
        assert!(matches!(err, Err(StoreError::VersionConflict { .. })));

        // An increment carrying the observed version succeeds
        let next = rec.incremented(dec!(5));
        store
            .upsert_velocity_window(&next, Some(rec.version))
            .await
            .unwrap();

        let stored = store.velocity_window("0xaaa").await.unwrap().unwrap();
        assert_eq!(stored.transaction_count, 2);
        assert_eq!(stored.total_amount, dec!(15));
    }

    #[tokio::test]
    async fn test_budget_increment_requires_row() {
        let store = MemoryLedgerStore::new();
        let err = store.increment_budget_spent(Category::Legal, dec!(5)).await;
        assert!(matches!(err, Err(StoreError::MissingBudget(_))));

        store.set_budget(BudgetCategory::new(Category::Legal, dec!(100)));
        store
            .increment_budget_spent(Category::Legal, dec!(12.5))
            .await
            .unwrap();
        store
            .increment_budget_spent(Category::Legal, dec!(0.5))
            .await
            .unwrap();

        let row = store.budget(Category::Legal).await.unwrap().unwrap();
        assert_eq!(row.current_spent, dec!(13.0));
    }

    #[tokio::test]
    async fn test_recent_audit_logs_newest_first() {
        let store = MemoryLedgerStore::new();
        for i in 0..5 {
            let entry = AuditLogEntry {
                id: format!("id-{}", i),
                proposal_text: String::new(),
                vendor_name: "v".to_string(),
                vendor_address: "0xaaa".to_string(),
                amount: dec!(1),
                category: Category::Fx,
                decision: crate::model::Verdict::Rejected,
                reasoning: String::new(),
                ai_confidence: dec!(0.9),
                transaction_hash: None,
                created_at: Utc::now(),
            };
            store.append_audit_log(&entry).await.unwrap();
        }

        let recent = store.recent_audit_logs(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].id, "id-4");
        assert_eq!(recent[2].id, "id-2");
    }
}
