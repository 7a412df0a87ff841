use config::{Config, ConfigError, Environment, File};
use rust_decimal::{dec, Decimal};
use serde::Deserialize;
use std::env;

/// Governance thresholds the compliance core depends on.
///
/// Passed explicitly into constructors - there is no ambient global
/// configuration state.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GovernanceConfig {
    /// Minimum parser confidence for a proposal to be evaluated at all.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: Decimal,

    /// Length of the rolling velocity window.
    #[serde(default = "default_velocity_window_hours")]
    pub velocity_window_hours: i64,

    /// Maximum transactions per vendor within one velocity window.
    #[serde(default = "default_max_transactions_per_day")]
    pub max_transactions_per_vendor_per_day: u32,

    /// Upper bound on any single ledger-store lookup. A lookup that exceeds
    /// this is treated as a failed check, never as a hang.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

fn default_confidence_threshold() -> Decimal {
    dec!(0.70)
}

fn default_velocity_window_hours() -> i64 {
    24
}

fn default_max_transactions_per_day() -> u32 {
    10
}

fn default_store_timeout_ms() -> u64 {
    3000
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            velocity_window_hours: default_velocity_window_hours(),
            max_transactions_per_vendor_per_day: default_max_transactions_per_day(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl GovernanceConfig {
    pub fn velocity_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.velocity_window_hours)
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Path of the redb ledger database, when the durable store is used.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub governance: Option<GovernanceConfig>,
    pub store: Option<StoreConfig>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let home = env::var("HOME").unwrap_or_else(|_| ".".into());

        let s = Config::builder()
            // 1. Global config from ~/.sentinel/config.json
            .add_source(File::with_name(&format!("{}/.sentinel/config", home)).required(false))
            // 2. Project config from config/config.json
            .add_source(File::with_name("config/config").required(false))
            // 3. Local overrides from config/local.json (not checked in)
            .add_source(File::with_name("config/local").required(false))
            // 4. Environment overrides, e.g. SENTINEL_GOVERNANCE__CONFIDENCE_THRESHOLD
            .add_source(Environment::with_prefix("SENTINEL").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Governance thresholds, falling back to defaults when unconfigured.
    pub fn governance(&self) -> GovernanceConfig {
        self.governance.clone().unwrap_or_default()
    }
}
