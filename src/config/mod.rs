//! Configuration module for the AR sandbox
//!
//! This module handles:
//! - Application configuration (`config.toml`): sensor, stabilizer, render,
//!   default settings, display and calibration file locations
//! - Calibration records produced by the calibration wizards (JSON)
//! - The live [`PipelineSettings`] shared with the render loop
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.hxyulin.arsandbox-rs/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.arsandbox-rs/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.arsandbox-rs\`
//!
//! # Files
//!
//! - `config.toml` - Application configuration
//! - `calibration/sensor.json` - Per-stream sensor calibration
//! - `calibration/projector.json` - Projector alignment
//! - `logs/` - Rolling log files (when file logging is enabled)
//!
//! Missing or unreadable files never stop startup: loaders log a warning and
//! fall back to defaults (identity warps, standard depth bounds).

pub mod settings;

pub use settings::*;

use crate::backend::StreamKind;
use crate::error::{Result, SandboxError};
use crate::raster::{CameraIntrinsics, Colormap, Homography};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.arsandbox-rs";

/// Config filename inside the app data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Sensor calibration record, relative to the app data directory
pub const SENSOR_CALIBRATION_FILE: &str = "calibration/sensor.json";

/// Projector calibration record, relative to the app data directory
pub const PROJECTOR_CALIBRATION_FILE: &str = "calibration/projector.json";

/// Connection attempts before the sensor is declared unreachable
pub const DEFAULT_CONNECT_RETRIES: u32 = 5;

/// Pause between connection attempts in milliseconds
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 3000;

/// Synthetic/recorded frame period in milliseconds (~30 fps)
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

/// Kinect v2 depth resolution
pub const DEFAULT_SENSOR_WIDTH: usize = 512;
pub const DEFAULT_SENSOR_HEIGHT: usize = 424;

/// Calibration record format version
pub const CALIBRATION_VERSION: u32 = 1;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        SandboxError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            SandboxError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Default location of `config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

/// Directory for rolling log files
pub fn log_dir() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join("logs"))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SandboxError::Config(format!("Failed to create directory {:?}: {}", parent, e))
            })?;
        }
    }
    Ok(())
}

// ==================== App Config ====================

/// Application configuration loaded at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Depth sensor selection and connection behaviour
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Stabilization constants
    #[serde(default)]
    pub stabilizer: StabilizerConfig,

    /// Contour/render constants
    #[serde(default)]
    pub render: RenderConfig,

    /// Initial operator-tunable settings
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Projector and preview behaviour
    #[serde(default)]
    pub display: DisplayConfig,

    /// Calibration record locations
    #[serde(default)]
    pub calibration: CalibrationPaths,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SandboxError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            SandboxError::Config(format!("Failed to parse config {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, returning defaults on any error
    ///
    /// With no explicit path the default location is used; a missing file
    /// there is not worth a warning.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return Self::default(),
            },
        };

        if !explicit && !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;

        let content = toml::to_string_pretty(self)
            .map_err(|e| SandboxError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            SandboxError::Config(format!("Failed to write config {:?}: {}", path, e))
        })
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.render.blur_kernel % 2 == 0 {
            return Err(SandboxError::Config(format!(
                "render.blur_kernel must be odd (got {})",
                self.render.blur_kernel
            )));
        }
        if self.sensor.width == 0 || self.sensor.height == 0 {
            return Err(SandboxError::Config(
                "sensor.width and sensor.height must be non-zero".to_string(),
            ));
        }
        if self.render.epsilon_factor.is_nan() || self.render.epsilon_factor < 0.0 {
            return Err(SandboxError::Config(
                "render.epsilon_factor must be >= 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Sensor calibration path: explicit setting or the app data default
    pub fn sensor_calibration_path(&self) -> Option<PathBuf> {
        self.calibration
            .sensor_file
            .clone()
            .or_else(|| app_data_dir().map(|d| d.join(SENSOR_CALIBRATION_FILE)))
    }

    /// Projector calibration path: explicit setting or the app data default
    pub fn projector_calibration_path(&self) -> Option<PathBuf> {
        self.calibration
            .projector_file
            .clone()
            .or_else(|| app_data_dir().map(|d| d.join(PROJECTOR_CALIBRATION_FILE)))
    }
}

/// Which depth source to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Procedural sand terrain (no hardware)
    #[default]
    Synthetic,
    /// PNG16 depth recording on disk
    Recorded,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Synthetic => write!(f, "synthetic"),
            SensorKind::Recorded => write!(f, "recorded"),
        }
    }
}

/// Terrain shape produced by the synthetic sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainPattern {
    Flat,
    Slope,
    #[default]
    Hills,
    Ripple,
}

/// Depth sensor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub kind: SensorKind,

    /// Directory of PNG16 frames for [`SensorKind::Recorded`]
    pub recording_dir: Option<PathBuf>,

    /// Restart the recording after the last frame
    pub loop_recording: bool,

    pub connect_retries: u32,
    pub retry_backoff_ms: u64,

    /// Minimum time between frames from simulated sources
    pub frame_interval_ms: u64,

    /// Synthetic raster size
    pub width: usize,
    pub height: usize,

    pub pattern: TerrainPattern,

    /// Move an out-of-range blob across the synthetic terrain
    pub simulate_hand: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::Synthetic,
            recording_dir: None,
            loop_recording: true,
            connect_retries: DEFAULT_CONNECT_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            width: DEFAULT_SENSOR_WIDTH,
            height: DEFAULT_SENSOR_HEIGHT,
            pattern: TerrainPattern::default(),
            simulate_hand: true,
        }
    }
}

/// Stabilization constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Window half-width for sentinel inpainting
    pub inpaint_radius: usize,

    /// Structuring element half-width for the reject halo
    pub dilation_radius: usize,

    /// Dilation repetitions for the reject halo
    pub dilation_iterations: usize,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            inpaint_radius: 5,
            dilation_radius: 1,
            dilation_iterations: 30,
        }
    }
}

/// Contour/render constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Gaussian kernel size for the contour-extraction copy (odd)
    pub blur_kernel: usize,

    /// Contours enclosing less area than this are dropped (pixels²)
    pub min_contour_area: f64,

    /// Polygon simplification tolerance as a fraction of perimeter
    pub epsilon_factor: f64,

    /// Contour stroke width in pixels
    pub contour_thickness: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            min_contour_area: 10.0,
            epsilon_factor: 0.001,
            contour_thickness: 1,
        }
    }
}

/// Initial values for the operator-tunable settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub contour_step: u32,
    pub errors_threshold: f32,
    pub medium_noise_threshold: f32,
    pub big_noise_threshold: f32,
    pub colormap: Colormap,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            contour_step: DEFAULT_CONTOUR_STEP,
            errors_threshold: DEFAULT_ERRORS_THRESHOLD,
            medium_noise_threshold: DEFAULT_MEDIUM_NOISE_THRESHOLD,
            big_noise_threshold: DEFAULT_BIG_NOISE_THRESHOLD,
            colormap: Colormap::Jet,
        }
    }
}

impl DefaultsConfig {
    /// Startup settings combining these defaults with calibrated depth bounds
    pub fn to_settings(&self, min_depth: f32, max_depth: f32) -> PipelineSettings {
        PipelineSettings {
            min_depth,
            max_depth,
            contour_step: self.contour_step,
            errors_threshold: self.errors_threshold,
            medium_noise_threshold: self.medium_noise_threshold,
            big_noise_threshold: self.big_noise_threshold,
            colormap: self.colormap,
            reset_image: false,
        }
    }
}

/// Projector output and preview behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Open the projector viewport fullscreen
    pub fullscreen: bool,

    /// Title of the projector viewport
    pub projector_title: String,

    /// Preview refresh period of the control panel
    pub preview_refresh_ms: u64,

    /// Sleep when no frame is ready, to avoid a hot spin
    pub idle_sleep_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fullscreen: true,
            projector_title: "AR Sandbox".to_string(),
            preview_refresh_ms: 100,
            idle_sleep_ms: 1,
        }
    }
}

/// Calibration record locations (defaults under the app data directory)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationPaths {
    pub sensor_file: Option<PathBuf>,
    pub projector_file: Option<PathBuf>,
}

// ==================== Calibration Records ====================

/// Calibration of one sensor stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamCalibration {
    /// 3x3 pinhole camera matrix
    pub camera_matrix: Option<[[f64; 3]; 3]>,

    /// Distortion coefficients `k1, k2, p1, p2[, k3]`
    pub distortion: Option<Vec<f64>>,

    /// Focus warp: maps the sandbox quad onto the output frame
    pub homography: Option<Homography>,
    pub inverse_homography: Option<Homography>,

    /// Sandbox corners in sensor pixels
    pub source_corners: Option<[[f64; 2]; 4]>,

    /// Where the sandbox corners land in the output frame
    pub target_corners: Option<[[f64; 2]; 4]>,

    /// Output frame size of the focus warp; the input size when absent
    pub output_size: Option<[usize; 2]>,

    /// Depth bounds in millimeters (depth stream only)
    pub min_depth: Option<f32>,
    pub max_depth: Option<f32>,
}

impl StreamCalibration {
    /// Lens model, present only when both matrix and coefficients are known
    pub fn intrinsics(&self) -> Option<CameraIntrinsics> {
        Some(CameraIntrinsics {
            camera_matrix: self.camera_matrix?,
            distortion: self.distortion.clone()?,
        })
    }

    /// Fill in the homography from corners and the inverse from the
    /// homography where they are missing
    ///
    /// A degenerate quad or singular matrix disables the warp with a warning.
    pub fn resolve(&mut self) {
        if self.homography.is_none() {
            if let (Some(src), Some(dst)) = (self.source_corners, self.target_corners) {
                match Homography::from_quad(&order_corners(src), &order_corners(dst)) {
                    Ok(h) => self.homography = Some(h),
                    Err(e) => {
                        tracing::warn!("Cannot calculate focus homography from corners: {}", e)
                    }
                }
            }
        }

        if self.inverse_homography.is_none() {
            if let Some(h) = self.homography {
                match h.inverse() {
                    Ok(inv) => self.inverse_homography = Some(inv),
                    Err(e) => {
                        tracing::warn!("Focus homography is not invertible, disabling warp: {}", e);
                        self.homography = None;
                    }
                }
            }
        }
    }

    /// `(min_depth, max_depth)`, falling back to the standard bounds
    pub fn depth_bounds(&self) -> (f32, f32) {
        let min = self.min_depth.unwrap_or_else(|| {
            tracing::warn!(
                "No min depth calibrated, using standard min depth {}",
                STANDARD_MIN_DEPTH
            );
            STANDARD_MIN_DEPTH
        });
        let max = self.max_depth.unwrap_or_else(|| {
            tracing::warn!(
                "No max depth calibrated, using standard max depth {}",
                STANDARD_MAX_DEPTH
            );
            STANDARD_MAX_DEPTH
        });
        (min, max)
    }
}

/// Order four corners as top-left, top-right, bottom-right, bottom-left
pub fn order_corners(corners: [[f64; 2]; 4]) -> [[f64; 2]; 4] {
    let pick = |key: fn(&[f64; 2]) -> f64, largest: bool| {
        let mut best = corners[0];
        for c in &corners[1..] {
            let better = if largest {
                key(c) > key(&best)
            } else {
                key(c) < key(&best)
            };
            if better {
                best = *c;
            }
        }
        best
    };
    let sum = |p: &[f64; 2]| p[0] + p[1];
    let diff = |p: &[f64; 2]| p[1] - p[0];
    [
        pick(sum, false),
        pick(diff, false),
        pick(sum, true),
        pick(diff, true),
    ]
}

/// Per-stream sensor calibration, as written by the calibration wizards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    #[serde(default = "default_calibration_version")]
    pub version: u32,

    #[serde(default)]
    pub depth: Option<StreamCalibration>,

    #[serde(default)]
    pub color: Option<StreamCalibration>,

    #[serde(default)]
    pub infrared: Option<StreamCalibration>,
}

fn default_calibration_version() -> u32 {
    CALIBRATION_VERSION
}

impl Default for CalibrationFile {
    fn default() -> Self {
        Self {
            version: CALIBRATION_VERSION,
            depth: None,
            color: None,
            infrared: None,
        }
    }
}

impl CalibrationFile {
    /// Load a calibration record and resolve derived matrices
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SandboxError::Calibration(format!("Failed to read calibration {:?}: {}", path, e))
        })?;

        let mut file: Self = serde_json::from_str(&content).map_err(|e| {
            SandboxError::Calibration(format!("Failed to parse calibration {:?}: {}", path, e))
        })?;
        for stream in [&mut file.depth, &mut file.color, &mut file.infrared]
            .into_iter()
            .flatten()
        {
            stream.resolve();
        }
        Ok(file)
    }

    /// Load a calibration record, returning an empty one on any error
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::warn!("No calibration file location, using identity warps");
            return Self::default();
        };
        if !path.exists() {
            tracing::warn!(
                "Calibration file {:?} not found, please calibrate the sensor",
                path
            );
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load calibration, using identity warps: {}", e);
            Self::default()
        })
    }

    /// Save the record as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;

        let content = serde_json::to_string_pretty(self).map_err(|e| {
            SandboxError::Serialization(format!("Failed to serialize calibration: {}", e))
        })?;

        std::fs::write(path, content).map_err(|e| {
            SandboxError::Calibration(format!("Failed to write calibration {:?}: {}", path, e))
        })
    }

    pub fn stream(&self, kind: StreamKind) -> Option<&StreamCalibration> {
        match kind {
            StreamKind::Depth => self.depth.as_ref(),
            StreamKind::Color => self.color.as_ref(),
            StreamKind::Infrared => self.infrared.as_ref(),
        }
    }

    /// Depth bounds from the depth stream, or the standard bounds
    pub fn depth_bounds(&self) -> (f32, f32) {
        match &self.depth {
            Some(depth) => depth.depth_bounds(),
            None => StreamCalibration::default().depth_bounds(),
        }
    }
}

/// Alignment of the rendered composite to the projector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorCalibration {
    /// Warp applied to the stabilized raster before rendering
    pub homography: Option<Homography>,

    /// Projector resolution; the sensor resolution when absent
    pub output_width: Option<usize>,
    pub output_height: Option<usize>,
}

impl ProjectorCalibration {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SandboxError::Calibration(format!(
                "Failed to read projector calibration {:?}: {}",
                path, e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            SandboxError::Calibration(format!(
                "Failed to parse projector calibration {:?}: {}",
                path, e
            ))
        })
    }

    /// Load, or fall back to an identity warp
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(path) if path.exists() => Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load projector calibration, using identity: {}", e);
                Self::default()
            }),
            _ => {
                tracing::info!("No projector calibration, display warp is identity");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            SandboxError::Serialization(format!(
                "Failed to serialize projector calibration: {}",
                e
            ))
        })?;
        std::fs::write(path, content).map_err(|e| {
            SandboxError::Calibration(format!(
                "Failed to write projector calibration {:?}: {}",
                path, e
            ))
        })
    }

    /// Output size for an input of `width x height`
    pub fn output_size(&self, width: usize, height: usize) -> (usize, usize) {
        (
            self.output_width.unwrap_or(width),
            self.output_height.unwrap_or(height),
        )
    }
}

// ==================== Tests ====================
