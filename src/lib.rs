//! # ARSandbox-RS: Augmented-Reality Sandbox
//!
//! A depth camera looks down at a box of sand and a projector paints a
//! colorized elevation map with contour lines back onto it. This crate holds
//! the depth stabilization and rendering pipeline, the sensor backends, and
//! the operator UI.
//!
//! ## Architecture
//!
//! - **Backend**: The render loop polls the sensor, stabilizes each depth
//!   frame and renders a composite, all on its own thread
//! - **Pipeline**: Stabilizer, contour renderer, and the shared settings store
//! - **Raster**: Pure image operations the pipeline is built from
//! - **Frontend**: Operator controls and the projector viewport using eframe/egui
//!
//! ## Configuration
//!
//! Configuration and calibration files live in the platform data directory
//! under `dev.hxyulin.arsandbox-rs`:
//!
//! - **Linux**: `~/.local/share/dev.hxyulin.arsandbox-rs/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.arsandbox-rs/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.arsandbox-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use arsandbox_rs::{
//!     backend::{open_sensor, RenderLoop, SensorAdapter},
//!     config::{AppConfig, CalibrationFile},
//!     pipeline::{ContourRenderer, SharedStore, Stabilizer},
//!     presentation::PngSequenceSurface,
//! };
//!
//! let config = AppConfig::load_or_default(None);
//! let calibration = CalibrationFile::load_or_default(config.sensor_calibration_path().as_deref());
//! let (min, max) = calibration.depth_bounds();
//! let store = Arc::new(SharedStore::new(config.defaults.to_settings(min, max)));
//!
//! let mut adapter = SensorAdapter::new(open_sensor(&config.sensor)?, calibration);
//! adapter.connect_with_retry(5, Duration::from_secs(3))?;
//!
//! let mut render_loop = RenderLoop::new(
//!     adapter,
//!     Stabilizer::new(config.stabilizer.clone()),
//!     ContourRenderer::new(config.render.clone()),
//!     Box::new(PngSequenceSurface::new("out", Some(100))?),
//!     store,
//!     Arc::new(AtomicBool::new(true)),
//! );
//! render_loop.run();
//! ```

pub mod backend;
pub mod config;
pub mod control;
pub mod error;
pub mod frontend;
pub mod pipeline;
pub mod presentation;
pub mod raster;

// Re-export commonly used types
pub use backend::{DepthSensor, FrameStats, RenderLoop, SensorAdapter};
pub use config::{AppConfig, CalibrationFile, PipelineSettings, ProjectorCalibration};
pub use control::ControlSurface;
pub use error::{Result, SandboxError};
pub use frontend::SandboxApp;
pub use pipeline::{ContourRenderer, PipelineState, SharedStore, Stabilizer};
pub use presentation::{PngSequenceSurface, PresentationSurface, ProjectorWindow};
