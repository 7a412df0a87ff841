use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The fixed set of treasury budget categories.
/// Every whitelisted vendor and budget row is keyed by exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "FX")]
    Fx,
    Remittance,
    Settlement,
    Software,
    Consulting,
    Travel,
    Office,
    Data,
    Cybersecurity,
    Legal,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Fx,
        Category::Remittance,
        Category::Settlement,
        Category::Software,
        Category::Consulting,
        Category::Travel,
        Category::Office,
        Category::Data,
        Category::Cybersecurity,
        Category::Legal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fx => "FX",
            Category::Remittance => "Remittance",
            Category::Settlement => "Settlement",
            Category::Software => "Software",
            Category::Consulting => "Consulting",
            Category::Travel => "Travel",
            Category::Office => "Office",
            Category::Data => "Data",
            Category::Cybersecurity => "Cybersecurity",
            Category::Legal => "Legal",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown budget category: {}", s))
    }
}

/// Structured payment proposal produced by an extractor.
/// Immutable once built; its fields are copied into the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedProposal {
    pub vendor_name: String,
    /// Wallet address, lower-cased at construction. Shape is validated by the
    /// pipeline, not here - a malformed address must yield a REJECT decision,
    /// never a construction error.
    pub vendor_address: String,
    pub amount: Decimal,
    pub category: Category,
    /// Parser confidence in [0, 1]. The pipeline records this value verbatim;
    /// it never recomputes or downgrades it.
    pub confidence: Decimal,
}

impl ParsedProposal {
    pub fn new(
        vendor_name: impl Into<String>,
        vendor_address: &str,
        amount: Decimal,
        category: Category,
        confidence: Decimal,
    ) -> Self {
        Self {
            vendor_name: vendor_name.into(),
            vendor_address: vendor_address.to_lowercase(),
            amount,
            category,
            confidence,
        }
    }
}

/// A vendor authorized to receive treasury disbursements.
/// Rows are written by governance administration; the pipeline only reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistedVendor {
    /// Unique key, stored lower-cased.
    pub wallet_address: String,
    pub vendor_name: String,
    pub category: Category,
    pub max_transaction_limit: Decimal,
    /// An inactive vendor is treated identically to an unknown one.
    pub is_active: bool,
}

/// Monthly spending bucket for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetCategory {
    pub category: Category,
    pub monthly_limit: Decimal,
    /// Monotonically non-decreasing within a period. Incremented only by the
    /// decision recorder after an executed approval; reset at period rollover
    /// is an external administrative operation.
    pub current_spent: Decimal,
}

impl BudgetCategory {
    pub fn new(category: Category, monthly_limit: Decimal) -> Self {
        Self {
            category,
            monthly_limit,
            current_spent: Decimal::ZERO,
        }
    }

    pub fn status(&self) -> BudgetStatus {
        BudgetStatus {
            remaining: self.monthly_limit - self.current_spent,
            total: self.monthly_limit,
        }
    }
}

/// Point-in-time budget snapshot bound into audit details.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub remaining: Decimal,
    pub total: Decimal,
}

/// Rolling per-vendor transaction window for the velocity check.
/// One active window per vendor; stale windows are superseded on next write,
/// never swept in the background. `version` backs the optimistic-concurrency
/// upsert in the ledger store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityRecord {
    pub vendor_address: String,
    pub window_start: DateTime<Utc>,
    pub transaction_count: u32,
    pub total_amount: Decimal,
    #[serde(default)]
    pub version: u64,
}

impl VelocityRecord {
    /// Open the first window for a vendor.
    pub fn open(vendor_address: &str, amount: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            vendor_address: vendor_address.to_lowercase(),
            window_start: now,
            transaction_count: 1,
            total_amount: amount,
            version: 1,
        }
    }

    /// True if `window_start` still lies within the configured window length.
    pub fn is_active(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(self.window_start) < window
    }

    /// Next state after one more transaction inside the active window.
    pub fn incremented(&self, amount: Decimal) -> Self {
        Self {
            vendor_address: self.vendor_address.clone(),
            window_start: self.window_start,
            transaction_count: self.transaction_count + 1,
            total_amount: self.total_amount + amount,
            version: self.version + 1,
        }
    }

    /// Supersede an expired window with a fresh one starting now.
    pub fn reopened(&self, amount: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            vendor_address: self.vendor_address.clone(),
            window_start: now,
            transaction_count: 1,
            total_amount: amount,
            version: self.version + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "APPROVED")]
    Approved,
    #[serde(rename = "REJECTED")]
    Rejected,
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approved => write!(f, "APPROVED"),
            Verdict::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Immutable compliance record. Append-only; the sole source of truth for
/// compliance history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub proposal_text: String,
    pub vendor_name: String,
    pub vendor_address: String,
    pub amount: Decimal,
    pub category: Category,
    pub decision: Verdict,
    pub reasoning: String,
    pub ai_confidence: Decimal,
    pub transaction_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}
