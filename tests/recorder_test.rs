//! Decision Recorder Tests
//!
//! Verifies that budget spend accumulates exactly under concurrent executed
//! approvals (no lost updates), and that the full evaluate -> execute ->
//! record flow leaves a coherent audit trail.

use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;

use sentinel_compliance_rs::clock::ManualClock;
use sentinel_compliance_rs::compliance::CompliancePipeline;
use sentinel_compliance_rs::config::GovernanceConfig;
use sentinel_compliance_rs::model::{
    BudgetCategory, Category, ParsedProposal, Verdict, WhitelistedVendor,
};
use sentinel_compliance_rs::rail::{PaymentRail, SimulatedRail};
use sentinel_compliance_rs::recorder::DecisionRecorder;
use sentinel_compliance_rs::store::memory::MemoryLedgerStore;
use sentinel_compliance_rs::store::LedgerStore;
use sentinel_compliance_rs::velocity::VelocityTracker;

const VENDOR_ADDR: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb1";

fn seeded_store() -> Arc<MemoryLedgerStore> {
    let store = Arc::new(MemoryLedgerStore::new());
    store.upsert_vendor(WhitelistedVendor {
        wallet_address: VENDOR_ADDR.to_string(),
        vendor_name: "PT Nusantara FX Services".to_string(),
        category: Category::Fx,
        max_transaction_limit: dec!(100),
        is_active: true,
    });
    store.set_budget(BudgetCategory::new(Category::Fx, dec!(1000)));
    store
}

fn proposal(amount: rust_decimal::Decimal) -> ParsedProposal {
    ParsedProposal::new(
        "PT Nusantara FX Services",
        VENDOR_ADDR,
        amount,
        Category::Fx,
        dec!(0.9),
    )
}

/// Monotonic budget spend: N concurrent executed approvals for one category
/// all land in `current_spent`, and the velocity window counts every one.
#[tokio::test]
async fn test_concurrent_executed_approvals_accumulate_exactly() {
    let store = seeded_store();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let config = GovernanceConfig::default();
    let velocity = Arc::new(VelocityTracker::new(store.clone(), clock.clone(), &config));
    let pipeline = Arc::new(CompliancePipeline::new(
        store.clone(),
        velocity.clone(),
        config,
    ));
    let recorder = Arc::new(DecisionRecorder::new(store.clone(), velocity, clock));

    // Evaluate up front (reads may be optimistic), then record all
    // executions concurrently - the mutation phase must not lose updates.
    let mut decisions = Vec::new();
    for _ in 0..8 {
        let p = proposal(dec!(12.5));
        let d = pipeline.evaluate(&p).await;
        assert_eq!(d.verdict, Verdict::Approved);
        decisions.push((p, d));
    }

    let mut handles = Vec::new();
    for (p, d) in decisions {
        let recorder = recorder.clone();
        handles.push(tokio::spawn(async move {
            let result = sentinel_compliance_rs::rail::TxResult::confirmed("0xsim00c0ffee");
            recorder
                .record("concurrent spend", &p, &d, Some(&result))
                .await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let budget = store.budget(Category::Fx).await.unwrap().unwrap();
    assert_eq!(budget.current_spent, dec!(100.0));

    let window = store.velocity_window(VENDOR_ADDR).await.unwrap().unwrap();
    assert_eq!(window.transaction_count, 8);
    assert_eq!(window.total_amount, dec!(100.0));
}

/// Full flow against the simulated rail: approve, execute, record, and read
/// the audit trail back newest-first.
#[tokio::test]
async fn test_full_flow_leaves_audit_trail() {
    let store = seeded_store();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let config = GovernanceConfig::default();
    let velocity = Arc::new(VelocityTracker::new(store.clone(), clock.clone(), &config));
    let pipeline = CompliancePipeline::new(store.clone(), velocity.clone(), config);
    let recorder = DecisionRecorder::new(store.clone(), velocity, clock);
    let rail = SimulatedRail::new();

    // One rejection (over the vendor limit)
    let over = proposal(dec!(250));
    let rejected = pipeline.evaluate(&over).await;
    assert_eq!(rejected.verdict, Verdict::Rejected);
    recorder
        .record("Pay 250 MNEE to PT Nusantara FX Services", &over, &rejected, None)
        .await
        .unwrap();

    // One executed approval
    let ok = proposal(dec!(40));
    let approved = pipeline.evaluate(&ok).await;
    assert_eq!(approved.verdict, Verdict::Approved);
    let tx = rail.execute(&ok.vendor_address, ok.amount).await.unwrap();
    assert!(tx.success);
    let entry = recorder
        .record("Pay 40 MNEE to PT Nusantara FX Services", &ok, &approved, Some(&tx))
        .await
        .unwrap();
    assert!(entry.transaction_hash.as_deref().unwrap().starts_with("0xsim"));

    // Newest first; both decisions on record
    let logs = store.recent_audit_logs(10).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].decision, Verdict::Approved);
    assert_eq!(logs[1].decision, Verdict::Rejected);
    // Each entry carries enough context to reproduce the decision
    assert!(logs[1].reasoning.contains("vendor transaction limit"));
    assert_eq!(logs[1].ai_confidence, dec!(0.9));

    let budget = store.budget(Category::Fx).await.unwrap().unwrap();
    assert_eq!(budget.current_spent, dec!(40));
}
