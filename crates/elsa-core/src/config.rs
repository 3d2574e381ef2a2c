//! Engine configuration.
//!
//! Every field has a default so partial JSON documents are accepted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shapes::SerializableColor;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level configuration for the canvas engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ink: InkConfig,
    pub connectors: ConnectorConfig,
    pub view: ViewConfig,
}

/// Freehand ink settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InkConfig {
    /// Size of the moving-average sample buffer.
    pub smoothing_buffer: usize,
    /// Eraser radius in logical units (the pixel-erase square is twice this).
    pub eraser_radius: f64,
    /// Delay before quadrant snapshots are recaptured after a change.
    pub recapture_debounce_ms: u64,
    /// Default stroke width for the pen.
    pub pen_width: f64,
    /// Default stroke color.
    pub pen_color: SerializableColor,
    /// Alpha used by the highlighter pen.
    pub highlighter_alpha: f64,
    /// Width multiplier used by the highlighter pen.
    pub highlighter_width_factor: f64,
    /// Cut strokes at the eraser rectangle instead of deleting them whole.
    pub split_on_erase: bool,
}

impl Default for InkConfig {
    fn default() -> Self {
        Self {
            smoothing_buffer: 4,
            eraser_radius: 10.0,
            recapture_debounce_ms: 5,
            pen_width: 2.0,
            pen_color: SerializableColor::black(),
            highlighter_alpha: 0.4,
            highlighter_width_factor: 4.0,
            split_on_erase: false,
        }
    }
}

/// Connector (manipulation handle) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Handle hit tolerance in screen pixels.
    pub hit_tolerance: f64,
    /// Distance from the top edge to the rotate handle, in logical units.
    pub rotate_offset: f64,
    /// Snap rotation to 15° steps.
    pub snap_rotation: bool,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            hit_tolerance: 8.0,
            rotate_offset: 25.0,
            snap_rotation: false,
        }
    }
}

/// View (pan/zoom/scrollbar) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Multiplicative zoom factor per wheel notch.
    pub zoom_step: f64,
    /// Scrollbar thickness in screen pixels.
    pub scrollbar_thickness: f64,
    /// Edge length of the square cursor overlay canvas.
    pub cursor_size: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 10.0,
            zoom_step: 1.1,
            scrollbar_thickness: 8.0,
            cursor_size: 32,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ink.smoothing_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "ink.smoothing_buffer",
                reason: "must be at least 1".into(),
            });
        }
        if self.ink.eraser_radius <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "ink.eraser_radius",
                reason: format!("must be positive, got {}", self.ink.eraser_radius),
            });
        }
        if self.ink.pen_width <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "ink.pen_width",
                reason: format!("must be positive, got {}", self.ink.pen_width),
            });
        }
        if self.view.min_zoom <= 0.0 || self.view.min_zoom > self.view.max_zoom {
            return Err(ConfigError::Invalid {
                field: "view.min_zoom",
                reason: format!(
                    "zoom bounds must satisfy 0 < min <= max, got {}..{}",
                    self.view.min_zoom, self.view.max_zoom
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.ink.smoothing_buffer, 4);
        assert_eq!(config.ink.recapture_debounce_ms, 5);
        assert!(!config.ink.split_on_erase);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{"ink": {"eraser_radius": 20.0}}"#).unwrap();
        assert!((config.ink.eraser_radius - 20.0).abs() < f64::EPSILON);
        assert_eq!(config.ink.smoothing_buffer, 4);
        assert!((config.view.max_zoom - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_zero_buffer() {
        let err = EngineConfig::from_json(r#"{"ink": {"smoothing_buffer": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "ink.smoothing_buffer", .. }));
    }

    #[test]
    fn test_rejects_inverted_zoom() {
        let err = EngineConfig::from_json(r#"{"view": {"min_zoom": 5.0, "max_zoom": 1.0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(EngineConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_roundtrip() {
        let config = EngineConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }
}
