// =============================================================================
// Engine Configuration — hot-reloadable settings with atomic save
// =============================================================================
//
// Every tunable lives here so the engine can be reconfigured without a
// restart. Persistence uses an atomic tmp + rename pattern to prevent
// corruption on crash. All fields carry `#[serde(default = "...")]` so that
// adding new fields never breaks loading an older config file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_timezone() -> String {
    "Asia/Makassar".to_string()
}

fn default_currency() -> String {
    "IDR".to_string()
}

fn default_max_transaction_amount() -> String {
    "500000000".to_string()
}

fn default_description_max_len() -> usize {
    100
}

fn default_duplicate_window_secs() -> i64 {
    60
}

fn default_expense_spike_threshold_pct() -> f64 {
    30.0
}

fn default_revenue_decline_threshold_pct() -> f64 {
    15.0
}

fn default_cashflow_lookback_days() -> u32 {
    7
}

fn default_cashflow_run_threshold() -> u32 {
    3
}

fn default_target_variance_threshold_pct() -> f64 {
    20.0
}

fn default_detector_prior() -> u8 {
    5
}

fn default_min_confidence_score() -> u8 {
    80
}

fn default_critical_priority_required() -> bool {
    true
}

fn default_deduplication_window_minutes() -> i64 {
    60
}

fn default_rate_limit_capacity() -> u32 {
    15
}

fn default_rate_limit_refill_per_minute() -> u32 {
    15
}

fn default_retention_days() -> i64 {
    90
}

fn default_cycle_deadline_secs() -> u64 {
    30
}

fn default_notifier_timeout_secs() -> u64 {
    10
}

/// Gating thresholds applied between detection and persistence (spec §4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GatingPolicy {
    #[serde(default = "default_min_confidence_score")]
    pub min_confidence_score: u8,
    #[serde(default = "default_critical_priority_required")]
    pub critical_priority_required: bool,
    #[serde(default = "default_deduplication_window_minutes")]
    pub deduplication_window_minutes: i64,
}

impl GatingPolicy {
    /// Default operational policy.
    pub fn critical_only() -> Self {
        Self {
            min_confidence_score: 80,
            critical_priority_required: true,
            deduplication_window_minutes: 60,
        }
    }

    pub fn relaxed() -> Self {
        Self {
            min_confidence_score: 60,
            critical_priority_required: false,
            deduplication_window_minutes: 120,
        }
    }

    pub fn no_gating() -> Self {
        Self {
            min_confidence_score: 0,
            critical_priority_required: false,
            deduplication_window_minutes: 0,
        }
    }
}

impl Default for GatingPolicy {
    fn default() -> Self {
        Self::critical_only()
    }
}

/// Tunable detector thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectorThresholds {
    #[serde(default = "default_expense_spike_threshold_pct")]
    pub expense_spike_threshold_pct: f64,
    #[serde(default = "default_revenue_decline_threshold_pct")]
    pub revenue_decline_threshold_pct: f64,
    #[serde(default = "default_cashflow_lookback_days")]
    pub cashflow_lookback_days: u32,
    #[serde(default = "default_cashflow_run_threshold")]
    pub cashflow_run_threshold: u32,
    #[serde(default = "default_target_variance_threshold_pct")]
    pub target_variance_threshold_pct: f64,
    /// Uniform detector-specific prior (spec §9 open question: source did not
    /// document per-detector values, so a configurable constant default of 5
    /// was adopted).
    #[serde(default = "default_detector_prior")]
    pub detector_prior: u8,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            expense_spike_threshold_pct: default_expense_spike_threshold_pct(),
            revenue_decline_threshold_pct: default_revenue_decline_threshold_pct(),
            cashflow_lookback_days: default_cashflow_lookback_days(),
            cashflow_run_threshold: default_cashflow_run_threshold(),
            target_variance_threshold_pct: default_target_variance_threshold_pct(),
            detector_prior: default_detector_prior(),
        }
    }
}

/// Top-level runtime configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// IANA timezone the Clock is pinned to.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_currency")]
    pub currency_code: String,

    /// Decimal string; parsed into a `Money` at validation time.
    #[serde(default = "default_max_transaction_amount")]
    pub max_transaction_amount: String,

    #[serde(default = "default_description_max_len")]
    pub description_max_len: usize,

    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: i64,

    #[serde(default)]
    pub detector_thresholds: DetectorThresholds,

    #[serde(default)]
    pub gating_policy: GatingPolicy,

    #[serde(default = "default_rate_limit_capacity")]
    pub notifier_rate_limit_capacity: u32,

    #[serde(default = "default_rate_limit_refill_per_minute")]
    pub notifier_rate_limit_refill_per_minute: u32,

    #[serde(default = "default_retention_days")]
    pub recommendation_retention_days: i64,

    #[serde(default = "default_cycle_deadline_secs")]
    pub cycle_deadline_secs: u64,

    #[serde(default = "default_notifier_timeout_secs")]
    pub notifier_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            currency_code: default_currency(),
            max_transaction_amount: default_max_transaction_amount(),
            description_max_len: default_description_max_len(),
            duplicate_window_secs: default_duplicate_window_secs(),
            detector_thresholds: DetectorThresholds::default(),
            gating_policy: GatingPolicy::default(),
            notifier_rate_limit_capacity: default_rate_limit_capacity(),
            notifier_rate_limit_refill_per_minute: default_rate_limit_refill_per_minute(),
            recommendation_retention_days: default_retention_days(),
            cycle_deadline_secs: default_cycle_deadline_secs(),
            notifier_timeout_secs: default_notifier_timeout_secs(),
        }
    }
}

impl EngineConfig {
    pub fn zone(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::Asia::Makassar)
    }

    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;
        info!(path = %path.display(), timezone = %config.timezone, "engine config loaded");
        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename) to prevent corruption on crash.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.timezone, "Asia/Makassar");
        assert_eq!(cfg.gating_policy.min_confidence_score, 80);
        assert!(cfg.gating_policy.critical_priority_required);
        assert_eq!(cfg.notifier_rate_limit_capacity, 15);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.timezone, "Asia/Makassar");
        assert_eq!(cfg.detector_thresholds.detector_prior, 5);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "timezone": "UTC", "gating_policy": { "min_confidence_score": 50, "critical_priority_required": false, "deduplication_window_minutes": 10 } }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.timezone, "UTC");
        assert_eq!(cfg.gating_policy.min_confidence_score, 50);
        assert_eq!(cfg.notifier_rate_limit_capacity, 15);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.timezone, cfg2.timezone);
        assert_eq!(cfg.gating_policy, cfg2.gating_policy);
    }

    #[test]
    fn gating_presets_match_spec_defaults() {
        let relaxed = GatingPolicy::relaxed();
        assert_eq!(relaxed.min_confidence_score, 60);
        assert_eq!(relaxed.deduplication_window_minutes, 120);
        let none = GatingPolicy::no_gating();
        assert_eq!(none.min_confidence_score, 0);
        assert_eq!(none.deduplication_window_minutes, 0);
    }
}
