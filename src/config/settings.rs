//! Live pipeline settings that the operator can change while running
//!
//! [`PipelineSettings`] is the value bag read once per frame by the render
//! loop. Writes arrive either as a single field ([`SettingField`] +
//! [`SettingValue`]) or as a batch ([`SettingsUpdate`]); both are checked
//! with [`PipelineSettings::validate`] before they can reach the shared
//! store, so the pipeline never sees a snapshot that breaks these rules:
//!
//! - `min_depth > 0`, `max_depth > 0` and `min_depth < max_depth`
//! - `contour_step >= 1`
//! - noise thresholds are finite, non-negative and ascending
//!   (`errors <= medium <= big`)

use crate::error::{Result, SandboxError};
use crate::raster::Colormap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Depth lower bound used when calibration does not provide one (mm)
pub const STANDARD_MIN_DEPTH: f32 = 500.0;

/// Depth upper bound used when calibration does not provide one (mm)
pub const STANDARD_MAX_DEPTH: f32 = 3000.0;

/// Default depth units per iso-band
pub const DEFAULT_CONTOUR_STEP: u32 = 10;

/// Default change below which a sample is treated as jitter (mm)
pub const DEFAULT_ERRORS_THRESHOLD: f32 = 5.0;

/// Default upper bound of the medium noise tier (mm)
pub const DEFAULT_MEDIUM_NOISE_THRESHOLD: f32 = 15.0;

/// Default upper bound of the big noise tier (mm)
pub const DEFAULT_BIG_NOISE_THRESHOLD: f32 = 30.0;

/// Tunable values the render loop reads every frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Nearest depth considered part of the sandbox (mm)
    pub min_depth: f32,

    /// Farthest depth considered part of the sandbox (mm)
    pub max_depth: f32,

    /// Width of each iso-depth band, in 8-bit display units
    pub contour_step: u32,

    /// Changes smaller than this keep the previous value (mm)
    pub errors_threshold: f32,

    /// Upper bound of the 90/10 blend tier (mm)
    pub medium_noise_threshold: f32,

    /// Upper bound of the 50/50 blend tier (mm)
    pub big_noise_threshold: f32,

    /// Colormap applied to the display raster
    pub colormap: Colormap,

    /// One-shot request to drop the temporal history
    pub reset_image: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_depth: STANDARD_MIN_DEPTH,
            max_depth: STANDARD_MAX_DEPTH,
            contour_step: DEFAULT_CONTOUR_STEP,
            errors_threshold: DEFAULT_ERRORS_THRESHOLD,
            medium_noise_threshold: DEFAULT_MEDIUM_NOISE_THRESHOLD,
            big_noise_threshold: DEFAULT_BIG_NOISE_THRESHOLD,
            colormap: Colormap::default(),
            reset_image: false,
        }
    }
}

impl PipelineSettings {
    /// Defaults with depth bounds taken from calibration
    pub fn with_depth_bounds(min_depth: f32, max_depth: f32) -> Self {
        Self {
            min_depth,
            max_depth,
            ..Default::default()
        }
    }

    /// Check every cross-field rule, reporting the first violation
    pub fn validate(&self) -> Result<()> {
        if !(self.min_depth.is_finite() && self.min_depth > 0.0) {
            return Err(invalid(format!(
                "min_depth must be > 0 (got {})",
                self.min_depth
            )));
        }
        if !(self.max_depth.is_finite() && self.max_depth > 0.0) {
            return Err(invalid(format!(
                "max_depth must be > 0 (got {})",
                self.max_depth
            )));
        }
        if self.min_depth >= self.max_depth {
            return Err(invalid(format!(
                "min_depth ({}) must be < max_depth ({})",
                self.min_depth, self.max_depth
            )));
        }
        if self.contour_step == 0 {
            return Err(invalid("contour_step must be >= 1".to_string()));
        }
        for (name, value) in [
            ("errors_threshold", self.errors_threshold),
            ("medium_noise_threshold", self.medium_noise_threshold),
            ("big_noise_threshold", self.big_noise_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{} must be >= 0 (got {})", name, value)));
            }
        }
        if self.errors_threshold > self.medium_noise_threshold {
            return Err(invalid(format!(
                "errors_threshold ({}) must be <= medium_noise_threshold ({})",
                self.errors_threshold, self.medium_noise_threshold
            )));
        }
        if self.medium_noise_threshold > self.big_noise_threshold {
            return Err(invalid(format!(
                "medium_noise_threshold ({}) must be <= big_noise_threshold ({})",
                self.medium_noise_threshold, self.big_noise_threshold
            )));
        }
        Ok(())
    }

    /// Read one field
    pub fn get(&self, field: SettingField) -> SettingValue {
        match field {
            SettingField::MinDepth => SettingValue::Number(self.min_depth),
            SettingField::MaxDepth => SettingValue::Number(self.max_depth),
            SettingField::ContourStep => SettingValue::Number(self.contour_step as f32),
            SettingField::ErrorsThreshold => SettingValue::Number(self.errors_threshold),
            SettingField::MediumNoiseThreshold => SettingValue::Number(self.medium_noise_threshold),
            SettingField::BigNoiseThreshold => SettingValue::Number(self.big_noise_threshold),
            SettingField::Colormap => SettingValue::Colormap(self.colormap),
            SettingField::ResetImage => SettingValue::Flag(self.reset_image),
        }
    }

    /// Write one field without cross-field validation
    ///
    /// Fails only when the value has the wrong kind for the field.
    pub fn set(&mut self, field: SettingField, value: SettingValue) -> Result<()> {
        match (field, value) {
            (SettingField::MinDepth, SettingValue::Number(v)) => self.min_depth = v,
            (SettingField::MaxDepth, SettingValue::Number(v)) => self.max_depth = v,
            (SettingField::ContourStep, SettingValue::Number(v)) => {
                if !v.is_finite() || v < 0.0 || v.fract() != 0.0 {
                    return Err(invalid(format!(
                        "contour_step must be a whole number (got {})",
                        v
                    )));
                }
                self.contour_step = v as u32;
            }
            (SettingField::ErrorsThreshold, SettingValue::Number(v)) => self.errors_threshold = v,
            (SettingField::MediumNoiseThreshold, SettingValue::Number(v)) => {
                self.medium_noise_threshold = v
            }
            (SettingField::BigNoiseThreshold, SettingValue::Number(v)) => {
                self.big_noise_threshold = v
            }
            (SettingField::Colormap, SettingValue::Colormap(c)) => self.colormap = c,
            (SettingField::ResetImage, SettingValue::Flag(b)) => self.reset_image = b,
            (field, value) => {
                return Err(invalid(format!(
                    "{} cannot be set to {:?}",
                    field.key(),
                    value
                )))
            }
        }
        Ok(())
    }

    /// Copy of `self` with every `Some` field of `update` applied
    pub fn merged(&self, update: &SettingsUpdate) -> Self {
        Self {
            min_depth: update.min_depth.unwrap_or(self.min_depth),
            max_depth: update.max_depth.unwrap_or(self.max_depth),
            contour_step: update.contour_step.unwrap_or(self.contour_step),
            errors_threshold: update.errors_threshold.unwrap_or(self.errors_threshold),
            medium_noise_threshold: update
                .medium_noise_threshold
                .unwrap_or(self.medium_noise_threshold),
            big_noise_threshold: update
                .big_noise_threshold
                .unwrap_or(self.big_noise_threshold),
            colormap: update.colormap.unwrap_or(self.colormap),
            reset_image: update.reset_image.unwrap_or(self.reset_image),
        }
    }
}

fn invalid(message: String) -> SandboxError {
    SandboxError::InvalidConfig(message)
}

/// Addressable fields of [`PipelineSettings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingField {
    MinDepth,
    MaxDepth,
    ContourStep,
    ErrorsThreshold,
    MediumNoiseThreshold,
    BigNoiseThreshold,
    Colormap,
    ResetImage,
}

impl SettingField {
    pub const ALL: [SettingField; 8] = [
        SettingField::MinDepth,
        SettingField::MaxDepth,
        SettingField::ContourStep,
        SettingField::ErrorsThreshold,
        SettingField::MediumNoiseThreshold,
        SettingField::BigNoiseThreshold,
        SettingField::Colormap,
        SettingField::ResetImage,
    ];

    /// Snake-case key used in config files and logs
    pub fn key(self) -> &'static str {
        match self {
            SettingField::MinDepth => "min_depth",
            SettingField::MaxDepth => "max_depth",
            SettingField::ContourStep => "contour_step",
            SettingField::ErrorsThreshold => "errors_threshold",
            SettingField::MediumNoiseThreshold => "medium_noise_threshold",
            SettingField::BigNoiseThreshold => "big_noise_threshold",
            SettingField::Colormap => "colormap",
            SettingField::ResetImage => "reset_image",
        }
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A value read from or written to a single [`SettingField`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Number(f32),
    Colormap(Colormap),
    Flag(bool),
}

impl SettingValue {
    pub fn as_number(self) -> Option<f32> {
        match self {
            SettingValue::Number(v) => Some(v),
            _ => None,
        }
    }
}

/// A batch of field writes applied atomically
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    pub min_depth: Option<f32>,
    pub max_depth: Option<f32>,
    pub contour_step: Option<u32>,
    pub errors_threshold: Option<f32>,
    pub medium_noise_threshold: Option<f32>,
    pub big_noise_threshold: Option<f32>,
    pub colormap: Option<Colormap>,
    pub reset_image: Option<bool>,
}

impl SettingsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// An update that writes every field of `settings`
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            min_depth: Some(settings.min_depth),
            max_depth: Some(settings.max_depth),
            contour_step: Some(settings.contour_step),
            errors_threshold: Some(settings.errors_threshold),
            medium_noise_threshold: Some(settings.medium_noise_threshold),
            big_noise_threshold: Some(settings.big_noise_threshold),
            colormap: Some(settings.colormap),
            reset_image: Some(settings.reset_image),
        }
    }

    pub fn depth_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_depth = Some(min);
        self.max_depth = Some(max);
        self
    }

    pub fn noise_thresholds(mut self, errors: f32, medium: f32, big: f32) -> Self {
        self.errors_threshold = Some(errors);
        self.medium_noise_threshold = Some(medium);
        self.big_noise_threshold = Some(big);
        self
    }

    pub fn contour_step(mut self, step: u32) -> Self {
        self.contour_step = Some(step);
        self
    }

    pub fn colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = Some(colormap);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
