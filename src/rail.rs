use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RailError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Outcome of a payment-rail execution attempt.
#[derive(Debug, Clone)]
pub struct TxResult {
    pub success: bool,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

impl TxResult {
    pub fn confirmed(tx_hash: impl Into<String>) -> Self {
        Self {
            success: true,
            tx_hash: Some(tx_hash.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tx_hash: None,
            error: Some(error.into()),
        }
    }
}

/// Boundary to the external transfer mechanism. Invoked only after an
/// APPROVED decision; it plays no part in the decision itself, and may be
/// slow - "approved" means authorized to execute, not executed.
#[async_trait]
pub trait PaymentRail: Send + Sync {
    async fn execute(&self, address: &str, amount: Decimal) -> Result<TxResult, RailError>;

    /// Rail name, e.g. "simulation".
    fn name(&self) -> &str;
}

/// Demo rail: no chain interaction, immediate success with a recognizable
/// `0xsim...` hash so downstream tooling can tell simulated transfers apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedRail;

impl SimulatedRail {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentRail for SimulatedRail {
    async fn execute(&self, address: &str, amount: Decimal) -> Result<TxResult, RailError> {
        let mut hasher = DefaultHasher::new();
        address.hash(&mut hasher);
        let ts = chrono::Utc::now().timestamp_millis();
        let tx_hash = format!("0xsim{:x}{:06x}", ts, hasher.finish() % 1_000_000);

        info!(
            recipient = %address,
            amount = %amount,
            tx_hash = %tx_hash,
            "🎭 Simulated transfer complete (no funds moved)"
        );

        Ok(TxResult::confirmed(tx_hash))
    }

    fn name(&self) -> &str {
        "simulation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[tokio::test]
    async fn test_simulated_rail_returns_sim_hash() {
        let rail = SimulatedRail::new();
        let result = rail
            .execute("0x742d35cc6634c0532925a3b844bc9e7595f0beb1", dec!(100))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.tx_hash.unwrap().starts_with("0xsim"));
        assert!(result.error.is_none());
    }
}
