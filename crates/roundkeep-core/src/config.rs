//! Engine configuration.
//!
//! Defaults suit a 0–100 score scale. [`EngineConfig::from_env`] and
//! [`EngineConfig::overlay_env`] apply `ROUNDKEEP_*` environment variables;
//! unparsable values keep the previous value and log a warning.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, RoundError};

pub const ENV_SCORE_SCALE: &str = "ROUNDKEEP_SCORE_SCALE";
pub const ENV_SUM_TOLERANCE: &str = "ROUNDKEEP_SUM_TOLERANCE";
pub const ENV_WARN_ON_INTEGRITY: &str = "ROUNDKEEP_WARN_ON_INTEGRITY";

/// Tunables for scoring and integrity checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ceiling of the normalized score.
    pub score_scale: f64,
    /// Allowed gap between `raw_total_score` and the criteria sum.
    pub sum_tolerance: f64,
    /// Log each integrity warning at `warn` level.
    pub warn_on_integrity: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            score_scale: 100.0,
            sum_tolerance: 1e-6,
            warn_on_integrity: true,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::default().overlay_env()
    }

    /// `self` overlaid with the process environment.
    pub fn overlay_env(self) -> Self {
        self.overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup (the environment, a test map).
    pub fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_SCORE_SCALE) {
            match raw.trim().parse::<f64>() {
                Ok(v) => self.score_scale = v,
                Err(_) => warn!(key = ENV_SCORE_SCALE, value = %raw, "ignoring unparsable value"),
            }
        }
        if let Some(raw) = lookup(ENV_SUM_TOLERANCE) {
            match raw.trim().parse::<f64>() {
                Ok(v) => self.sum_tolerance = v,
                Err(_) => warn!(key = ENV_SUM_TOLERANCE, value = %raw, "ignoring unparsable value"),
            }
        }
        if let Some(raw) = lookup(ENV_WARN_ON_INTEGRITY) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.warn_on_integrity = true,
                "0" | "false" | "no" | "off" => self.warn_on_integrity = false,
                _ => warn!(key = ENV_WARN_ON_INTEGRITY, value = %raw, "ignoring unparsable value"),
            }
        }
        self
    }

    pub fn with_score_scale(mut self, scale: f64) -> Self {
        self.score_scale = scale;
        self
    }

    pub fn with_sum_tolerance(mut self, tolerance: f64) -> Self {
        self.sum_tolerance = tolerance;
        self
    }

    pub fn with_warn_on_integrity(mut self, enabled: bool) -> Self {
        self.warn_on_integrity = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.score_scale.is_finite() || self.score_scale <= 0.0 {
            return Err(RoundError::InvalidConfig(format!(
                "score_scale must be positive, got {}",
                self.score_scale
            )));
        }
        if !self.sum_tolerance.is_finite() || self.sum_tolerance < 0.0 {
            return Err(RoundError::InvalidConfig(format!(
                "sum_tolerance must be non-negative, got {}",
                self.sum_tolerance
            )));
        }
        Ok(())
    }
}
