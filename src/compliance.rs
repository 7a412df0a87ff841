use rust_decimal::Decimal;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::GovernanceConfig;
use crate::metrics;
use crate::model::{BudgetStatus, Category, ParsedProposal, Verdict, WhitelistedVendor};
use crate::store::{LedgerStore, StoreError};
use crate::validate::{is_positive_amount, is_valid_address};
use crate::velocity::{VelocityTracker, VelocityVerdict};

#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    InsufficientConfidence {
        confidence: Decimal,
        threshold: Decimal,
    },
    InvalidAddress {
        address: String,
    },
    InvalidAmount {
        amount: Decimal,
    },
    VendorNotWhitelisted {
        vendor_name: String,
        address: String,
    },
    VendorLimitExceeded {
        requested: Decimal,
        limit: Decimal,
        overage: Decimal,
    },
    InsufficientBudget {
        category: Category,
        requested: Decimal,
        remaining: Decimal,
        total: Decimal,
        shortfall: Decimal,
    },
    VelocityLimit {
        reason: String,
    },
    /// Ledger store unreachable or timed out mid-check. Conservative reject:
    /// blocking a legitimate payment beats approving an unverified one.
    StoreUnavailable {
        check: &'static str,
        detail: String,
    },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::InsufficientConfidence {
                confidence,
                threshold,
            } => write!(
                f,
                "Insufficient parsing confidence: {} < required {}",
                confidence, threshold
            ),
            RejectionReason::InvalidAddress { address } => write!(
                f,
                "Invalid address format: '{}' (expected 0x followed by 40 hex characters)",
                address
            ),
            RejectionReason::InvalidAmount { amount } => write!(
                f,
                "Invalid amount: {} (must be positive and representable at 6 decimal places)",
                amount
            ),
            RejectionReason::VendorNotWhitelisted {
                vendor_name,
                address,
            } => write!(
                f,
                "Vendor not whitelisted: {} ({}) is not authorized to receive treasury funds",
                vendor_name, address
            ),
            RejectionReason::VendorLimitExceeded {
                requested,
                limit,
                overage,
            } => write!(
                f,
                "Exceeds vendor transaction limit: requested {} MNEE, limit {} MNEE, overage {} MNEE",
                requested, limit, overage
            ),
            RejectionReason::InsufficientBudget {
                category,
                requested,
                remaining,
                total,
                shortfall,
            } => write!(
                f,
                "Insufficient budget in {} category: required {} MNEE, remaining {} MNEE of {} MNEE total, shortfall {} MNEE",
                category, requested, remaining, total, shortfall
            ),
            RejectionReason::VelocityLimit { reason } => {
                write!(f, "Transaction velocity alert: {}", reason)
            }
            RejectionReason::StoreUnavailable { check, detail } => write!(
                f,
                "Ledger store unavailable during {} check: {}",
                check, detail
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "PASSED")]
    Passed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "SKIPPED")]
    Skipped,
}

/// Per-check outcome map recorded with every decision, so the decision can
/// be reproduced from the audit trail alone.
#[derive(Debug, Clone, Serialize)]
pub struct CheckDetails {
    pub parsing_failed: bool,
    pub address_check: CheckStatus,
    pub amount_check: CheckStatus,
    pub whitelist_check: CheckStatus,
    pub vendor_limit_check: CheckStatus,
    pub budget_check: CheckStatus,
    pub velocity_check: CheckStatus,
    /// Vendor bound during the whitelist check, when reached.
    pub vendor: Option<WhitelistedVendor>,
    /// Budget snapshot observed during the budget check, when reached.
    pub budget: Option<BudgetStatus>,
}

impl Default for CheckDetails {
    fn default() -> Self {
        Self {
            parsing_failed: false,
            address_check: CheckStatus::Skipped,
            amount_check: CheckStatus::Skipped,
            whitelist_check: CheckStatus::Skipped,
            vendor_limit_check: CheckStatus::Skipped,
            budget_check: CheckStatus::Skipped,
            velocity_check: CheckStatus::Skipped,
            vendor: None,
            budget: None,
        }
    }
}

/// Outcome of one pipeline evaluation. Always produced - rejection is data,
/// never an error.
#[derive(Debug, Clone)]
pub struct AuditDecision {
    pub verdict: Verdict,
    pub reasoning: String,
    /// Confidence of the parse, recorded verbatim.
    pub confidence: Decimal,
    pub rejection: Option<RejectionReason>,
    pub details: CheckDetails,
}

impl AuditDecision {
    pub fn is_approved(&self) -> bool {
        self.verdict.is_approved()
    }
}

/// Ordered, short-circuiting rule evaluator:
/// confidence gate -> address validity -> amount sanity -> vendor whitelist
/// -> vendor transaction limit -> category budget -> velocity.
///
/// First failure wins. Evaluation is read-only: state mutations happen only
/// in the decision recorder, never here, so an abandoned evaluation leaves
/// nothing behind. Reads may observe a stale snapshot; the recorder's atomic
/// mutations are what keep spend and velocity counters exact.
pub struct CompliancePipeline {
    store: Arc<dyn LedgerStore>,
    velocity: Arc<VelocityTracker>,
    config: GovernanceConfig,
}

impl CompliancePipeline {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        velocity: Arc<VelocityTracker>,
        config: GovernanceConfig,
    ) -> Self {
        info!(
            confidence_threshold = %config.confidence_threshold,
            max_tx_per_day = config.max_transactions_per_vendor_per_day,
            "🛡️ Compliance pipeline initialized"
        );
        Self {
            store,
            velocity,
            config,
        }
    }

    /// Evaluate one proposal against all governance rules.
    pub async fn evaluate(&self, proposal: &ParsedProposal) -> AuditDecision {
        let mut details = CheckDetails::default();

        // 1. Confidence gate - nothing else runs on a weak parse
        if proposal.confidence < self.config.confidence_threshold {
            details.parsing_failed = true;
            return self.reject(
                proposal,
                RejectionReason::InsufficientConfidence {
                    confidence: proposal.confidence,
                    threshold: self.config.confidence_threshold,
                },
                details,
            );
        }

        // 2. Address shape
        if !is_valid_address(&proposal.vendor_address) {
            details.address_check = CheckStatus::Failed;
            return self.reject(
                proposal,
                RejectionReason::InvalidAddress {
                    address: proposal.vendor_address.clone(),
                },
                details,
            );
        }
        details.address_check = CheckStatus::Passed;

        // 3. Amount sanity
        if !is_positive_amount(proposal.amount) {
            details.amount_check = CheckStatus::Failed;
            return self.reject(
                proposal,
                RejectionReason::InvalidAmount {
                    amount: proposal.amount,
                },
                details,
            );
        }
        details.amount_check = CheckStatus::Passed;

        // 4. Vendor whitelist
        let vendor = match self
            .bounded("whitelist", self.store.vendor(&proposal.vendor_address))
            .await
        {
            Ok(Some(v)) if v.is_active => v,
            Ok(_) => {
                // Absent and inactive are indistinguishable to callers
                details.whitelist_check = CheckStatus::Failed;
                return self.reject(
                    proposal,
                    RejectionReason::VendorNotWhitelisted {
                        vendor_name: proposal.vendor_name.clone(),
                        address: proposal.vendor_address.clone(),
                    },
                    details,
                );
            }
            Err(reason) => {
                details.whitelist_check = CheckStatus::Failed;
                return self.reject(proposal, reason, details);
            }
        };
        details.whitelist_check = CheckStatus::Passed;
        details.vendor = Some(vendor.clone());

        // 5. Vendor transaction limit
        if proposal.amount > vendor.max_transaction_limit {
            details.vendor_limit_check = CheckStatus::Failed;
            return self.reject(
                proposal,
                RejectionReason::VendorLimitExceeded {
                    requested: proposal.amount,
                    limit: vendor.max_transaction_limit,
                    overage: proposal.amount - vendor.max_transaction_limit,
                },
                details,
            );
        }
        details.vendor_limit_check = CheckStatus::Passed;

        // 6. Category budget, keyed by the vendor's registered category
        let budget = match self
            .bounded("budget", self.store.budget(vendor.category))
            .await
        {
            // No budget row means no spending room
            Ok(row) => row.map(|r| r.status()).unwrap_or(BudgetStatus {
                remaining: Decimal::ZERO,
                total: Decimal::ZERO,
            }),
            Err(reason) => {
                details.budget_check = CheckStatus::Failed;
                return self.reject(proposal, reason, details);
            }
        };
        if proposal.amount > budget.remaining {
            details.budget_check = CheckStatus::Failed;
            details.budget = Some(budget);
            return self.reject(
                proposal,
                RejectionReason::InsufficientBudget {
                    category: vendor.category,
                    requested: proposal.amount,
                    remaining: budget.remaining,
                    total: budget.total,
                    shortfall: proposal.amount - budget.remaining,
                },
                details,
            );
        }
        details.budget_check = CheckStatus::Passed;
        details.budget = Some(budget);

        // 7. Velocity
        match self
            .bounded(
                "velocity",
                self.velocity.is_safe(&proposal.vendor_address, proposal.amount),
            )
            .await
        {
            Ok(VelocityVerdict::Safe) => {
                details.velocity_check = CheckStatus::Passed;
            }
            Ok(verdict) => {
                details.velocity_check = CheckStatus::Failed;
                metrics::inc_velocity_rejections();
                return self.reject(
                    proposal,
                    RejectionReason::VelocityLimit {
                        reason: verdict.to_string(),
                    },
                    details,
                );
            }
            Err(reason) => {
                details.velocity_check = CheckStatus::Failed;
                return self.reject(proposal, reason, details);
            }
        }

        // All checks passed
        let reasoning = format!(
            "All compliance checks passed: vendor '{}' ({}) within limit {} MNEE, \
             budget remaining {} MNEE of {} MNEE, velocity check passed",
            vendor.vendor_name,
            vendor.category,
            vendor.max_transaction_limit,
            budget.remaining,
            budget.total
        );
        info!(
            vendor = %vendor.vendor_name,
            amount = %proposal.amount,
            category = %vendor.category,
            "✅ Proposal approved"
        );
        metrics::inc_approved();

        AuditDecision {
            verdict: Verdict::Approved,
            reasoning,
            confidence: proposal.confidence,
            rejection: None,
            details,
        }
    }

    /// Run one store lookup under the configured timeout. Elapsed or failed
    /// lookups become a conservative rejection naming the check.
    async fn bounded<T>(
        &self,
        check: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, RejectionReason> {
        match tokio::time::timeout(self.config.store_timeout(), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RejectionReason::StoreUnavailable {
                check,
                detail: e.to_string(),
            }),
            Err(_) => {
                metrics::inc_store_timeouts();
                Err(RejectionReason::StoreUnavailable {
                    check,
                    detail: format!("timed out after {}ms", self.config.store_timeout_ms),
                })
            }
        }
    }

    fn reject(
        &self,
        proposal: &ParsedProposal,
        reason: RejectionReason,
        details: CheckDetails,
    ) -> AuditDecision {
        warn!(
            vendor = %proposal.vendor_name,
            amount = %proposal.amount,
            "❌ Proposal rejected: {}",
            reason
        );
        metrics::inc_rejected();

        AuditDecision {
            verdict: Verdict::Rejected,
            reasoning: reason.to_string(),
            confidence: proposal.confidence,
            rejection: Some(reason),
            details,
        }
    }
}
