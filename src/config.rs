//! Board configuration.
//!
//! Handles parsing of TOML board settings: viewport geometry, the bucket
//! anchor, the cell conflict policy, save retries, and the longest span a
//! single placement may cover.
//!
//! ```toml
//! viewport_width = 1800.0
//! epoch_anchor_ms = 1578268800000
//! conflict_policy = "overwrite"
//! max_save_retries = 5
//! max_span_days = 730
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BoardError, Result};

/// What happens when a placement targets cells owned by another task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Fail with `CellConflict` and leave the grid untouched.
    #[default]
    Reject,
    /// Last write wins; the previous occupant's cells are overwritten.
    Overwrite,
}

/// Board configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Width (px) the view columns are sized to fill.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: f64,

    /// Origin of the week and 30-day bucket walks (ms).
    #[serde(default = "default_epoch_anchor")]
    pub epoch_anchor_ms: i64,

    /// Cell conflict handling.
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Read-modify-write attempts after a version conflict.
    #[serde(default = "default_max_save_retries")]
    pub max_save_retries: u32,

    /// Upper bound on the day-cells one placement may occupy.
    #[serde(default = "default_max_span_days")]
    pub max_span_days: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            viewport_width: default_viewport_width(),
            epoch_anchor_ms: default_epoch_anchor(),
            conflict_policy: ConflictPolicy::default(),
            max_save_retries: default_max_save_retries(),
            max_span_days: default_max_span_days(),
        }
    }
}

fn default_viewport_width() -> f64 {
    1500.0
}

/// Monday 2020-01-06 00:00 UTC.
fn default_epoch_anchor() -> i64 {
    1_578_268_800_000
}

fn default_max_save_retries() -> u32 {
    3
}

/// Ten years of day-cells.
fn default_max_span_days() -> u32 {
    3660
}

impl BoardConfig {
    /// Sets the conflict policy.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Sets the viewport width.
    pub fn with_viewport_width(mut self, width: f64) -> Self {
        self.viewport_width = width;
        self
    }

    /// Sets the bucket anchor.
    pub fn with_epoch_anchor(mut self, anchor_ms: i64) -> Self {
        self.epoch_anchor_ms = anchor_ms;
        self
    }

    /// Sets the retry budget.
    pub fn with_max_save_retries(mut self, retries: u32) -> Self {
        self.max_save_retries = retries;
        self
    }

    /// Sets the span cap.
    pub fn with_max_span_days(mut self, days: u32) -> Self {
        self.max_span_days = days;
        self
    }

    /// Span cap as a cell count.
    pub fn max_span(&self) -> usize {
        self.max_span_days as usize
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BoardConfig =
            toml::from_str(content).map_err(|e| BoardError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BoardError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Loads configuration from a file, or returns defaults when it is missing.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Writes configuration to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| BoardError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| BoardError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Ok(())
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.viewport_width.is_finite() || self.viewport_width <= 0.0 {
            return Err(BoardError::Config(format!(
                "viewport_width must be positive, got {}",
                self.viewport_width
            )));
        }
        if self.max_span_days == 0 {
            return Err(BoardError::Config("max_span_days must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = BoardConfig::default();
        assert!((cfg.viewport_width - 1500.0).abs() < 1e-10);
        assert_eq!(cfg.epoch_anchor_ms, 1_578_268_800_000);
        assert_eq!(cfg.conflict_policy, ConflictPolicy::Reject);
        assert_eq!(cfg.max_save_retries, 3);
        assert_eq!(cfg.max_span_days, 3660);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_overrides() {
        let cfg = BoardConfig::from_toml_str(
            r#"
viewport_width = 1800.0
conflict_policy = "overwrite"
max_save_retries = 5
"#,
        )
        .unwrap();
        assert!((cfg.viewport_width - 1800.0).abs() < 1e-10);
        assert_eq!(cfg.conflict_policy, ConflictPolicy::Overwrite);
        assert_eq!(cfg.max_save_retries, 5);
        assert_eq!(cfg.epoch_anchor_ms, 1_578_268_800_000); // default kept
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(BoardConfig::from_toml_str("").unwrap(), BoardConfig::default());
    }

    #[test]
    fn test_rejects_bad_width() {
        let err = BoardConfig::from_toml_str("viewport_width = 0.0").unwrap_err();
        assert!(matches!(err, BoardError::Config(_)));
    }

    #[test]
    fn test_span_cap() {
        let cfg = BoardConfig::from_toml_str("max_span_days = 730").unwrap();
        assert_eq!(cfg.max_span(), 730);

        let err = BoardConfig::from_toml_str("max_span_days = 0").unwrap_err();
        assert!(matches!(err, BoardError::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(BoardConfig::from_toml_str(r#"conflict_policy = "merge""#).is_err());
    }

    #[test]
    fn test_save_load_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("board.toml");
        let cfg = BoardConfig::default()
            .with_viewport_width(900.0)
            .with_conflict_policy(ConflictPolicy::Overwrite);
        cfg.save(&path).unwrap();

        let loaded = BoardConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_load_or_default_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = BoardConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, BoardConfig::default());
    }
}
