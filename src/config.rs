//! Configuration module
//!
//! TOML-backed tuning knobs for matching, availability, payment and
//! subscription retry. Every section has sensible defaults so the crate
//! works without a config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Matcher scoring weights and search radius
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Distance at which the proximity score decays to zero, in km
    pub max_radius_km: f64,
    /// Maximum points awarded for proximity (linear decay from here)
    pub location_weight: f64,
    /// Fixed bonus for verified providers
    pub verified_bonus: f64,
    /// Multiplier on ln(1 + completed bookings)
    pub completed_weight: f64,
    /// Points per rating star (rating capped at 5)
    pub rating_weight: f64,
    /// Points per open slot, capped at `slot_score_cap`
    pub slot_weight: f64,
    pub slot_score_cap: f64,
    /// Ranked list is truncated to this many candidates
    pub max_results: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_radius_km: 30.0,
            location_weight: 40.0,
            verified_bonus: 15.0,
            completed_weight: 5.0,
            rating_weight: 4.0,
            slot_weight: 1.0,
            slot_score_cap: 10.0,
            max_results: 20,
        }
    }
}

/// Availability builder thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    /// Emit a low-capacity warning when remaining/capacity drops below this
    pub low_capacity_ratio: f64,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            low_capacity_ratio: 0.3,
        }
    }
}

/// Payment capture bounds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Hard timeout for a synchronous capture attempt, in milliseconds
    pub capture_timeout_ms: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            capture_timeout_ms: 10_000,
        }
    }
}

impl PaymentConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

/// Per-attempt retry policy for subscription series instances
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Attempts per dated instance (including the first)
    pub max_attempts: u32,
    /// Fixed delay between attempts, in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 250,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub matcher: MatcherConfig,
    pub availability: AvailabilityConfig,
    pub payment: PaymentConfig,
    pub subscription: SubscriptionConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let cfg = toml::from_str(&raw)?;
        Ok(cfg)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Default config location: `~/.config/slotbook/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slotbook")
        .join("config.toml")
}
