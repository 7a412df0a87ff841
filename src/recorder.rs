use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::compliance::AuditDecision;
use crate::metrics;
use crate::model::{AuditLogEntry, Category, ParsedProposal};
use crate::rail::TxResult;
use crate::store::{LedgerStore, StoreError};
use crate::velocity::VelocityTracker;

#[derive(Error, Debug)]
pub enum RecorderError {
    /// The decision stands but could not be durably recorded - the caller
    /// must not treat the proposal as audited.
    #[error("decision made but not durably recorded: {source}")]
    AuditNotDurable {
        #[source]
        source: StoreError,
    },
    #[error("audit entry written but budget increment failed for {category}: {source}")]
    BudgetUpdateFailed {
        category: Category,
        #[source]
        source: StoreError,
    },
    #[error("audit entry written but velocity update failed for {address}: {source}")]
    VelocityUpdateFailed {
        address: String,
        #[source]
        source: StoreError,
    },
}

/// Builds and commits the immutable audit record for every decision, and
/// applies the budget/velocity mutations for approvals that were actually
/// executed.
///
/// This is the only component that mutates governance state. The split
/// matters: approval alone never spends budget - only an execution result
/// with `success == true` does.
pub struct DecisionRecorder {
    store: Arc<dyn LedgerStore>,
    velocity: Arc<VelocityTracker>,
    clock: Arc<dyn Clock>,
}

impl DecisionRecorder {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        velocity: Arc<VelocityTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            velocity,
            clock,
        }
    }

    /// Persist exactly one audit entry for `decision`; on an executed
    /// approval, also increment the category spend and the vendor's velocity
    /// window.
    pub async fn record(
        &self,
        proposal_text: &str,
        proposal: &ParsedProposal,
        decision: &AuditDecision,
        execution: Option<&TxResult>,
    ) -> Result<AuditLogEntry, RecorderError> {
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            proposal_text: proposal_text.to_string(),
            vendor_name: proposal.vendor_name.clone(),
            vendor_address: proposal.vendor_address.clone(),
            amount: proposal.amount,
            category: proposal.category,
            decision: decision.verdict,
            reasoning: decision.reasoning.clone(),
            ai_confidence: decision.confidence,
            transaction_hash: execution.and_then(|r| r.tx_hash.clone()),
            created_at: self.clock.now(),
        };

        // The audit trail is the compliance record of record: one retry,
        // then surface the failure loudly.
        if let Err(first) = self.store.append_audit_log(&entry).await {
            warn!(id = %entry.id, "Audit log write failed, retrying: {}", first);
            if let Err(second) = self.store.append_audit_log(&entry).await {
                error!(id = %entry.id, "Audit log write failed twice: {}", second);
                return Err(RecorderError::AuditNotDurable { source: second });
            }
        }
        metrics::inc_audit_entries();
        info!(id = %entry.id, decision = %entry.decision, "📝 Audit log created");

        let executed = decision.is_approved() && execution.map(|r| r.success).unwrap_or(false);
        if executed {
            // Spend hits the bucket the pipeline actually checked: the
            // vendor's registered category.
            let category = decision
                .details
                .vendor
                .as_ref()
                .map(|v| v.category)
                .unwrap_or(proposal.category);

            self.store
                .increment_budget_spent(category, proposal.amount)
                .await
                .map_err(|e| RecorderError::BudgetUpdateFailed {
                    category,
                    source: e,
                })?;

            self.velocity
                .record(&proposal.vendor_address, proposal.amount)
                .await
                .map_err(|e| RecorderError::VelocityUpdateFailed {
                    address: proposal.vendor_address.clone(),
                    source: e,
                })?;

            info!(
                category = %category,
                amount = %proposal.amount,
                "✅ Budget and velocity updated after execution"
            );
        }

        Ok(entry)
    }
}
