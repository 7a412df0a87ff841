use chrono::Duration;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::warn;

use crate::clock::Clock;
use crate::config::GovernanceConfig;
use crate::model::VelocityRecord;
use crate::store::{LedgerStore, StoreError};

/// CAS retries before `record` gives up instead of spinning.
const MAX_CAS_RETRIES: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityVerdict {
    Safe,
    /// The vendor's active window already holds `count` transactions against
    /// a limit of `limit`.
    Exceeded { count: u32, limit: u32 },
}

impl VelocityVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, VelocityVerdict::Safe)
    }
}

impl std::fmt::Display for VelocityVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VelocityVerdict::Safe => write!(f, "Velocity check passed"),
            VelocityVerdict::Exceeded { count, limit } => write!(
                f,
                "Exceeded max transactions ({}/day): vendor already at {} in the current window",
                limit, count
            ),
        }
    }
}

/// Sliding-window transaction counter per vendor address.
///
/// Window expiry is evaluated at call time against the injected clock; stale
/// windows are superseded on the next write, never swept in the background.
pub struct VelocityTracker {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
    max_transactions: u32,
}

impl VelocityTracker {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: &GovernanceConfig) -> Self {
        Self {
            store,
            clock,
            window: config.velocity_window(),
            max_transactions: config.max_transactions_per_vendor_per_day,
        }
    }

    /// Read-only check: is another transaction safe for this vendor right
    /// now? Repeated calls never change tracker state.
    ///
    /// `_amount` is accepted for the documented amount-based throttling
    /// extension point; no amount threshold is applied today.
    pub async fn is_safe(
        &self,
        address: &str,
        _amount: Decimal,
    ) -> Result<VelocityVerdict, StoreError> {
        let now = self.clock.now();
        let record = self.store.velocity_window(&address.to_lowercase()).await?;

        match record {
            Some(rec)
                if rec.is_active(now, self.window)
                    && rec.transaction_count >= self.max_transactions =>
            {
                Ok(VelocityVerdict::Exceeded {
                    count: rec.transaction_count,
                    limit: self.max_transactions,
                })
            }
            _ => Ok(VelocityVerdict::Safe),
        }
    }

    /// Register one executed transaction. Increments the active window, or
    /// opens a fresh one when none exists or the last has expired.
    ///
    /// Runs as an optimistic-concurrency loop: a version conflict means a
    /// concurrent writer won, so the state is re-read and re-applied. Two
    /// concurrent calls for one vendor are both reflected in the count.
    pub async fn record(
        &self,
        address: &str,
        amount: Decimal,
    ) -> Result<VelocityRecord, StoreError> {
        let address = address.to_lowercase();

        for attempt in 0..MAX_CAS_RETRIES {
            let now = self.clock.now();
            let existing = self.store.velocity_window(&address).await?;

            let (next, expected) = match existing {
                Some(rec) if rec.is_active(now, self.window) => {
                    let version = rec.version;
                    (rec.incremented(amount), Some(version))
                }
                Some(rec) => {
                    let version = rec.version;
                    (rec.reopened(amount, now), Some(version))
                }
                None => (VelocityRecord::open(&address, amount, now), None),
            };

            match self.store.upsert_velocity_window(&next, expected).await {
                Ok(()) => return Ok(next),
                Err(StoreError::VersionConflict { .. }) => {
                    warn!(
                        address = %address,
                        attempt,
                        "Velocity record contended, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::Integrity(format!(
            "velocity record for {} still contended after {} attempts",
            address, MAX_CAS_RETRIES
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::memory::MemoryLedgerStore;
    use chrono::Utc;
    use rust_decimal::dec;

    fn tracker_with_clock() -> (VelocityTracker, Arc<ManualClock>, Arc<MemoryLedgerStore>) {
        let store = Arc::new(MemoryLedgerStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tracker = VelocityTracker::new(
            store.clone(),
            clock.clone(),
            &GovernanceConfig::default(),
        );
        (tracker, clock, store)
    }

    #[tokio::test]
    async fn test_is_safe_is_idempotent() {
        let (tracker, _clock, _store) = tracker_with_clock();

        for _ in 0..5 {
            let verdict = tracker.is_safe("0xaaa", dec!(10)).await.unwrap();
            assert!(verdict.is_safe());
        }
        // No record was created by the checks
        assert!(_store.velocity_window("0xaaa").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_limit_blocks_at_max() {
        let (tracker, _clock, _store) = tracker_with_clock();

        for _ in 0..10 {
            assert!(tracker.is_safe("0xaaa", dec!(1)).await.unwrap().is_safe());
            tracker.record("0xaaa", dec!(1)).await.unwrap();
        }

        let verdict = tracker.is_safe("0xaaa", dec!(1)).await.unwrap();
        assert_eq!(
            verdict,
            VelocityVerdict::Exceeded {
                count: 10,
                limit: 10
            }
        );
        assert!(verdict.to_string().contains("10/day"));
    }

    #[tokio::test]
    async fn test_window_rollover_resets_count() {
        let (tracker, clock, _store) = tracker_with_clock();

        for _ in 0..10 {
            tracker.record("0xaaa", dec!(1)).await.unwrap();
        }
        assert!(!tracker.is_safe("0xaaa", dec!(1)).await.unwrap().is_safe());

        // Past the 24h boundary the stale window no longer counts
        clock.advance(Duration::hours(25));
        assert!(tracker.is_safe("0xaaa", dec!(1)).await.unwrap().is_safe());

        let fresh = tracker.record("0xaaa", dec!(1)).await.unwrap();
        assert_eq!(fresh.transaction_count, 1);
        assert_eq!(fresh.total_amount, dec!(1));
    }

    #[tokio::test]
    async fn test_record_accumulates_amounts_exactly() {
        let (tracker, _clock, _store) = tracker_with_clock();

        tracker.record("0xaaa", dec!(123.456789)).await.unwrap();
        let rec = tracker.record("0xaaa", dec!(0.000001)).await.unwrap();
        assert_eq!(rec.total_amount, dec!(123.456790));
        assert_eq!(rec.transaction_count, 2);
    }

    #[tokio::test]
    async fn test_concurrent_records_all_counted() {
        let (tracker, _clock, _store) = tracker_with_clock();
        let tracker = Arc::new(tracker);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let t = tracker.clone();
            handles.push(tokio::spawn(
                async move { t.record("0xaaa", dec!(2)).await },
            ));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let rec = _store.velocity_window("0xaaa").await.unwrap().unwrap();
        assert_eq!(rec.transaction_count, 8);
        assert_eq!(rec.total_amount, dec!(16));
    }
}
