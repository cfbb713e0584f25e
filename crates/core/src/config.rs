//! Editor configuration
//!
//! Settings for zoom, hit tolerances, handle size, snapping, and placement defaults.
//! Configuration can be loaded from a JSON file, environment variables,
//! or created programmatically.

use crate::hit_test::HitThresholds;
use crate::manipulation::EditOptions;
use crate::snapping::SnapConfig;
use crate::transform::{DEFAULT_SCALE, MAX_SCALE, MIN_SCALE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

pub const ENV_SCALE: &str = "PDF_ANNOTATOR_SCALE";
pub const ENV_AUTHOR: &str = "PDF_ANNOTATOR_AUTHOR";
pub const ENV_SNAP_STEP: &str = "PDF_ANNOTATOR_SNAP_STEP";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),
    /// Invalid value for a configuration key
    #[error("Invalid value for configuration key: {0}")]
    InvalidValue(String),
}

/// Configuration for the annotation editor.
///
/// Every field is optional in the JSON form; missing fields take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Zoom scale for newly opened documents
    pub default_scale: f32,
    pub hit: HitThresholds,
    /// Edge length of manipulation handles in user space
    pub handle_size: f32,
    pub snap: SnapConfig,
    /// Offset applied per paste, in points
    pub paste_offset: f32,
    pub default_author: String,
    pub comment_size: f32,
    pub callout_width: f32,
    pub callout_height: f32,
    /// Keep image aspect ratio while resizing
    pub lock_image_aspect: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_scale: DEFAULT_SCALE,
            hit: HitThresholds::default(),
            handle_size: 8.0,
            snap: SnapConfig::default(),
            paste_offset: 10.0,
            default_author: "Unknown".to_string(),
            comment_size: crate::annotation::DEFAULT_COMMENT_SIZE,
            callout_width: 150.0,
            callout_height: 60.0,
            lock_image_aspect: true,
        }
    }
}

impl EditorConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or holds an invalid value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Loads configuration from environment variables on top of the defaults.
    ///
    /// Environment variables:
    /// - `PDF_ANNOTATOR_SCALE`: initial zoom scale (default: 1.5)
    /// - `PDF_ANNOTATOR_AUTHOR`: author for new annotations (default: "Unknown")
    /// - `PDF_ANNOTATOR_SNAP_STEP`: line angle snap step in degrees (default: 15)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup(ENV_SCALE) {
            self.default_scale = val
                .trim()
                .parse::<f32>()
                .map_err(|_| ConfigError::InvalidValue(ENV_SCALE.to_string()))?;
        }

        if let Some(val) = lookup(ENV_AUTHOR) {
            self.default_author = val;
        }

        if let Some(val) = lookup(ENV_SNAP_STEP) {
            self.snap.line_angle_step = val
                .trim()
                .parse::<f32>()
                .map_err(|_| ConfigError::InvalidValue(ENV_SNAP_STEP.to_string()))?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check ranges that the editor relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |value: f32| value.is_finite() && value > 0.0;
        let non_negative = |value: f32| value.is_finite() && value >= 0.0;

        if !(MIN_SCALE..=MAX_SCALE).contains(&self.default_scale) {
            return Err(ConfigError::InvalidValue("default_scale".to_string()));
        }
        let checks = [
            ("hit.outline", non_negative(self.hit.outline)),
            ("hit.line", non_negative(self.hit.line)),
            ("handle_size", positive(self.handle_size)),
            ("snap.line_angle_step", non_negative(self.snap.line_angle_step)),
            ("snap.rotation_step", non_negative(self.snap.rotation_step)),
            ("paste_offset", self.paste_offset.is_finite()),
            ("comment_size", positive(self.comment_size)),
            ("callout_width", positive(self.callout_width)),
            ("callout_height", positive(self.callout_height)),
        ];
        match checks.into_iter().find(|(_, ok)| !ok) {
            Some((key, _)) => Err(ConfigError::InvalidValue(key.to_string())),
            None => Ok(()),
        }
    }

    pub fn edit_options(&self) -> EditOptions {
        EditOptions { snap: self.snap, lock_image_aspect: self.lock_image_aspect }
    }
}
