//! Shared primitives for the vigil visual regression toolkit
//!
//! Domain types exchanged between the pixel comparator, the vision
//! classifier, the result cache and the pipeline. Everything here is
//! serde-serializable so results can be cached and persisted as JSON.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Axis-aligned bounding box in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Covered area in pixels
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Regression severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Layout breaks, unreadable text
    Critical,
    /// Misalignment, overflow, spacing issues
    Major,
    /// 1px shifts, slight color variations
    Minor,
}

/// Whether a detected change was anticipated.
///
/// Three-valued on purpose: a change that has not been evaluated yet
/// is distinct from a change known to be unintended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Intended,
    Unintended,
    #[default]
    Unknown,
}

impl Intent {
    /// True once a verdict (intended or unintended) has been assigned
    pub fn is_decided(&self) -> bool {
        !matches!(self, Intent::Unknown)
    }
}

/// A change the caller expects to see between baseline and current
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedChange {
    /// Natural language description of the change
    pub description: String,

    /// Bounding box [x, y, width, height] if known
    #[serde(default)]
    pub bbox: Option<BoundingBox>,

    /// UI element identifier (e.g. "card", "submit button")
    #[serde(default)]
    pub element: Option<String>,
}

impl ExpectedChange {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            bbox: None,
            element: None,
        }
    }
}

/// Detected change region with classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRegion {
    /// Bounding box if the detector localized the change
    #[serde(default)]
    pub bbox: Option<BoundingBox>,

    /// Natural language description of the change
    pub description: String,

    /// Detector confidence in [0, 1]
    pub confidence: f64,

    /// Intended / unintended / not yet evaluated
    #[serde(default)]
    pub intent: Intent,

    /// Severity, normally set for unintended changes only
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// Deterministic pixel-level diff statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelDiffResult {
    /// Threshold used, in 0-255 channel units
    pub threshold: u8,

    /// Pixels whose difference intensity exceeded the threshold
    pub changed_pixels: u64,

    /// Total pixels in the (normalized) image pair
    pub total_pixels: u64,

    /// changed_pixels / total_pixels * 100
    pub changed_percentage: f64,

    /// Candidate change regions after the minimum-size filter
    pub regions: Vec<BoundingBox>,
}

impl PixelDiffResult {
    /// True when not a single pixel crossed the threshold
    pub fn is_identical(&self) -> bool {
        self.changed_pixels == 0
    }
}

/// Full outcome of one before/after comparison.
///
/// Identity is determined by (before content, after content,
/// threshold); everything except `timestamp` is reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub before_path: PathBuf,
    pub after_path: PathBuf,
    pub threshold: u8,

    // Pixel-level statistics
    pub changed_pixels: u64,
    pub total_pixels: u64,
    pub changed_percentage: f64,

    // Classification
    pub intended_changes: Vec<ChangeRegion>,
    pub unintended_changes: Vec<ChangeRegion>,

    // Pass/fail determination
    pub passed: bool,
    pub failure_reason: Option<String>,

    /// Vision analyzer summary text, when the vision step ran
    #[serde(default)]
    pub analysis_summary: Option<String>,

    // Artifacts (best-effort, may be unset)
    pub heatmap_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,

    pub timestamp: DateTime<Utc>,
}

/// Comparison tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Pixel threshold for change detection (1-3)
    pub pixel_threshold: u8,

    /// Maximum number of changed regions for a pass
    pub max_changed_regions: usize,

    /// Maximum percentage of changed pixels for a pass (0-100)
    pub max_changed_percentage: f64,

    /// Gaussian blur preprocessing to suppress anti-aliasing noise
    pub enable_anti_aliasing_filter: bool,

    /// Blur kernel size (1-5); even values are bumped to the next odd
    pub anti_aliasing_kernel_size: u32,

    /// Run the external vision analyzer when credentials are present
    pub enable_vision_classification: bool,

    /// Escalate through resolution tiers instead of a single call
    pub progressive_resolution: bool,

    /// Confidence at which tier escalation stops (0-1)
    pub min_confidence_threshold: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            pixel_threshold: 2,
            max_changed_regions: 10,
            max_changed_percentage: 0.5,
            enable_anti_aliasing_filter: true,
            anti_aliasing_kernel_size: 2,
            enable_vision_classification: true,
            progressive_resolution: true,
            min_confidence_threshold: 0.8,
        }
    }
}

impl ComparisonConfig {
    /// Kernel size with the odd-value requirement applied
    pub fn effective_kernel_size(&self) -> u32 {
        if self.anti_aliasing_kernel_size % 2 == 0 {
            self.anti_aliasing_kernel_size + 1
        } else {
            self.anti_aliasing_kernel_size
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=3).contains(&self.pixel_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "pixel_threshold",
                allowed: "1..=3",
            });
        }
        if !(0.0..=100.0).contains(&self.max_changed_percentage) {
            return Err(ConfigError::OutOfRange {
                field: "max_changed_percentage",
                allowed: "0..=100",
            });
        }
        if !(1..=5).contains(&self.anti_aliasing_kernel_size) {
            return Err(ConfigError::OutOfRange {
                field: "anti_aliasing_kernel_size",
                allowed: "1..=5",
            });
        }
        if !(0.0..=1.0).contains(&self.min_confidence_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "min_confidence_threshold",
                allowed: "0..=1",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("{field} out of range (allowed {allowed})")]
    OutOfRange {
        field: &'static str,
        allowed: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_size_forced_odd() {
        let mut config = ComparisonConfig::default();
        config.anti_aliasing_kernel_size = 2;
        assert_eq!(config.effective_kernel_size(), 3);
        config.anti_aliasing_kernel_size = 3;
        assert_eq!(config.effective_kernel_size(), 3);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(ComparisonConfig::default().validate().is_ok());
    }

    #[test]
    fn threshold_range_enforced() {
        let mut config = ComparisonConfig::default();
        config.pixel_threshold = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn intent_default_is_unknown() {
        assert_eq!(Intent::default(), Intent::Unknown);
        assert!(!Intent::Unknown.is_decided());
        assert!(Intent::Unintended.is_decided());
    }
}
