use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{dec, Decimal};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::model::{Category, ParsedProposal};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("no payment fields recognized in proposal text")]
    NoFields,
    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Turns free text (or text derived from a scanned document) into a
/// structured proposal with a confidence score in [0, 1].
///
/// The compliance pipeline depends only on this interface; AI-backed,
/// regex-backed and document-backed implementations are interchangeable at
/// construction time.
pub trait ProposalExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<ParsedProposal, ExtractError>;

    /// Implementation name, e.g. "regex-fallback".
    fn name(&self) -> &str;
}

static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*MNEE").expect("amount regex"));
static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0x[a-fA-F0-9]{40}").expect("address regex"));
static VENDOR_PT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(PT\s+[A-Z][a-zA-Z\s&]+?)(?:\s+|,|for|at)").expect("vendor regex"));
static VENDOR_TO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"to\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)").expect("vendor-to regex"));

/// Keyword hints per category, checked in declaration order.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Fx, &["forex", "fx", "hedging", "currency"]),
    (
        Category::Remittance,
        &["remittance", "transfer", "money transfer"],
    ),
    (Category::Settlement, &["settlement", "bank", "clearing"]),
    (Category::Software, &["software", "cloud", "saas", "tools"]),
    (Category::Consulting, &["consulting", "advisory", "audit"]),
    (Category::Travel, &["travel", "trip", "flight"]),
    (Category::Office, &["office", "supplies", "stationery"]),
    (Category::Data, &["data", "feed", "analytics"]),
    (
        Category::Cybersecurity,
        &["security", "cybersecurity", "protection"],
    ),
    (Category::Legal, &["legal", "law", "compliance"]),
];

/// Confidence assigned to every regex-derived parse. Deliberately below the
/// default 0.70 gate so a regex-only parse never auto-approves.
const FALLBACK_CONFIDENCE: Decimal = dec!(0.45);

/// Regex-driven extractor. Serves as the deterministic fallback behind an
/// AI-backed primary; missing fields come back empty/zero and are rejected
/// downstream by the pipeline rather than raised here.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexExtractor;

impl RegexExtractor {
    pub fn new() -> Self {
        Self
    }

    fn guess_category(text: &str) -> Category {
        let lower = text.to_lowercase();
        for (category, keywords) in CATEGORY_KEYWORDS {
            if keywords.iter().any(|kw| lower.contains(kw)) {
                return *category;
            }
        }
        Category::Office
    }
}

impl ProposalExtractor for RegexExtractor {
    fn extract(&self, text: &str) -> Result<ParsedProposal, ExtractError> {
        let amount = AMOUNT_RE
            .captures(text)
            .and_then(|c| Decimal::from_str(&c[1]).ok());
        let address = ADDRESS_RE.find(text).map(|m| m.as_str().to_string());

        if amount.is_none() && address.is_none() {
            return Err(ExtractError::NoFields);
        }

        let vendor = VENDOR_PT_RE
            .captures(text)
            .or_else(|| VENDOR_TO_RE.captures(text))
            .map(|c| c[1].trim().to_string())
            .unwrap_or_else(|| "Unknown Vendor".to_string());

        Ok(ParsedProposal::new(
            vendor,
            address.as_deref().unwrap_or(""),
            amount.unwrap_or(Decimal::ZERO),
            Self::guess_category(text),
            FALLBACK_CONFIDENCE,
        ))
    }

    fn name(&self) -> &str {
        "regex-fallback"
    }
}

/// Two-stage extraction: try the primary, inspect its result, and only on an
/// explicit failure run the fallback. No error-driven control flow - a
/// low-confidence primary parse is still a parse and is returned as-is for
/// the pipeline's confidence gate to judge.
pub struct ExtractorChain {
    primary: Arc<dyn ProposalExtractor>,
    fallback: Arc<dyn ProposalExtractor>,
}

impl ExtractorChain {
    pub fn new(primary: Arc<dyn ProposalExtractor>, fallback: Arc<dyn ProposalExtractor>) -> Self {
        Self { primary, fallback }
    }
}

impl ProposalExtractor for ExtractorChain {
    fn extract(&self, text: &str) -> Result<ParsedProposal, ExtractError> {
        match self.primary.extract(text) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "⚠️ Primary extraction failed ({}), using fallback",
                    e
                );
                self.fallback.extract(text)
            }
        }
    }

    fn name(&self) -> &str {
        "chained"
    }
}
