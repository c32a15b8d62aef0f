//! Viewport tuning constants.

use kurbo::Vec2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tuning constants for camera movement and gesture recognition.
///
/// Every field has a default, so a config file only needs to name the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Multiplier applied to every zoom amount.
    pub scroll_speed: f64,
    /// Smallest allowed camera scale.
    pub min_scale: f64,
    /// Largest allowed camera scale.
    pub max_scale: f64,
    /// Screen-space distance (pixels) separating a click from a drag.
    pub click_distance_threshold: f64,
    /// Half-extent of the highlighted map area. Does not bound the canvas.
    pub map_size: f64,
    /// Scale used when nothing has been persisted yet.
    pub default_scale: f64,
    /// Keyboard pan distance per key press, in screen pixels.
    pub key_move_speed: f64,
    /// Zoom amount per keyboard zoom command.
    pub key_zoom_speed: f64,
    /// Wheel `delta_y` is divided by this to get a zoom amount.
    pub wheel_divisor: f64,
    /// Pinch amounts (percent) are divided by this to get a zoom amount.
    pub pinch_divisor: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            scroll_speed: 1.0,
            min_scale: 0.02,
            max_scale: 100.0,
            click_distance_threshold: 8.0,
            map_size: 10000.0,
            default_scale: 1.0,
            key_move_speed: 40.0,
            key_zoom_speed: 0.3,
            wheel_divisor: 750.0,
            pinch_divisor: 100.0,
        }
    }
}

impl ViewportConfig {
    /// Parse a config from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Offset used when nothing has been persisted yet.
    pub fn default_offset(&self) -> Vec2 {
        Vec2::new(-self.map_size, -self.map_size)
    }

    /// Clamp a scale into the configured bounds.
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }

    /// Check the invariants the camera and gesture code rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_positive(self.min_scale) {
            return Err(ConfigError::Invalid(format!(
                "min_scale must be positive, got {}",
                self.min_scale
            )));
        }
        if self.min_scale > self.max_scale {
            return Err(ConfigError::Invalid(format!(
                "min_scale {} exceeds max_scale {}",
                self.min_scale, self.max_scale
            )));
        }
        if self.default_scale < self.min_scale || self.default_scale > self.max_scale {
            return Err(ConfigError::Invalid(format!(
                "default_scale {} outside [{}, {}]",
                self.default_scale, self.min_scale, self.max_scale
            )));
        }
        if !is_positive(self.click_distance_threshold) {
            return Err(ConfigError::Invalid(
                "click_distance_threshold must be positive".to_string(),
            ));
        }
        if !is_positive(self.wheel_divisor) || !is_positive(self.pinch_divisor) {
            return Err(ConfigError::Invalid(
                "wheel_divisor and pinch_divisor must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Strictly positive and not NaN.
fn is_positive(value: f64) -> bool {
    value.partial_cmp(&0.0) == Some(std::cmp::Ordering::Greater)
}
