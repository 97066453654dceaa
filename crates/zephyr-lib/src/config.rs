use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Longest accepted breathing Welch window (one hour).
pub const MAX_WELCH_WINDOW_S: usize = 3600;

/// How much history each series keeps.
///
/// `Unbounded` keeps every sample for the whole session, so memory grows
/// linearly with recording time (roughly 18 breathing and 250 ECG samples per
/// second). `Bounded(n)` keeps the newest `n` entries of every history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    #[default]
    Unbounded,
    Bounded(usize),
}

impl Retention {
    pub fn capacity(&self) -> Option<usize> {
        match self {
            Retention::Unbounded => None,
            Retention::Bounded(n) => Some((*n).max(1)),
        }
    }
}

/// Engine parameters, loadable from TOML. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retention: Retention,
    /// Trailing window (seconds) for beat-interval SDNN and periodogram.
    pub rr_window_s: f64,
    /// Trailing window (seconds) refreshed after each breathing packet.
    pub breathing_window_s: f64,
    /// Trailing window (seconds) refreshed after each ECG packet.
    pub ecg_window_s: f64,
    /// Span of the breathing Welch estimate.
    pub welch_window_s: usize,
    pub detrend_sdnn: bool,
    pub detrend_periodogram: bool,
    pub detrend_lambda: f64,
    /// Residual bound handed to the breathing smoothing spline.
    pub spline_smoothing: f64,
    pub tracker_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention: Retention::Unbounded,
            rr_window_s: 60.0,
            breathing_window_s: 60.0,
            ecg_window_s: 6.0,
            welch_window_s: 60,
            detrend_sdnn: true,
            detrend_periodogram: false,
            detrend_lambda: 50.0,
            spline_smoothing: 20.0,
            tracker_interval_ms: 300,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: EngineConfig = toml::from_str(text).context("parsing engine config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("rr_window_s", self.rr_window_s),
            ("breathing_window_s", self.breathing_window_s),
            ("ecg_window_s", self.ecg_window_s),
        ] {
            if value.is_nan() || value <= 0.0 {
                anyhow::bail!("{name} must be positive, got {value}");
            }
        }
        if self.welch_window_s == 0 || self.welch_window_s > MAX_WELCH_WINDOW_S {
            anyhow::bail!(
                "welch_window_s must be between 1 and {MAX_WELCH_WINDOW_S}, got {}",
                self.welch_window_s
            );
        }
        if self.detrend_lambda < 0.0 || self.spline_smoothing < 0.0 {
            anyhow::bail!("detrend_lambda and spline_smoothing must not be negative");
        }
        if self.tracker_interval_ms == 0 {
            anyhow::bail!("tracker_interval_ms must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.retention.capacity(), None);
    }

    #[test]
    fn bounded_retention_parses() {
        let cfg = EngineConfig::from_toml_str(
            "retention = { bounded = 500 }\nrr_window_s = 30.0\ndetrend_periodogram = true\n",
        )
        .unwrap();
        assert_eq!(cfg.retention, Retention::Bounded(500));
        assert_eq!(cfg.retention.capacity(), Some(500));
        assert_eq!(cfg.rr_window_s, 30.0);
        assert!(cfg.detrend_periodogram);
        assert_eq!(cfg.tracker_interval_ms, 300);
    }

    #[test]
    fn rejects_non_positive_window() {
        let err = EngineConfig::from_toml_str("ecg_window_s = 0.0").unwrap_err();
        assert!(format!("{err:#}").contains("ecg_window_s"));
    }

    #[test]
    fn rejects_oversized_welch_window() {
        let err = EngineConfig::from_toml_str("welch_window_s = 1024819115206086201").unwrap_err();
        assert!(format!("{err:#}").contains("welch_window_s"));
        assert!(EngineConfig::from_toml_str("welch_window_s = 3600").is_ok());
        assert!(EngineConfig::from_toml_str("welch_window_s = 3601").is_err());
    }
}
