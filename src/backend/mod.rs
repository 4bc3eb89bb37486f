//! Backend module: depth sensors and the render loop
//!
//! Everything that runs off the UI thread lives here. The render loop owns
//! the sensor, the pipeline state and the presentation surface, and talks to
//! the operator UI only through the [`SharedStore`](crate::pipeline::SharedStore).
//!
//! # Components
//!
//! - [`DepthSensor`] - unified sensor interface
//! - [`SensorAdapter`] - applies calibration to every frame
//! - [`SyntheticSensor`] - procedural sandbox terrain (feature-gated)
//! - [`RecordedSensor`] - replays PNG16 depth recordings
//! - [`RenderLoop`] - polls, stabilizes, renders and publishes frames
//!
//! # Example
//!
//! ```ignore
//! use arsandbox_rs::backend::{open_sensor, RenderLoop, SensorAdapter};
//!
//! let mut adapter = SensorAdapter::new(open_sensor(&config.sensor)?, calibration);
//! adapter.connect_with_retry(5, Duration::from_secs(3))?;
//!
//! let mut render_loop = RenderLoop::new(adapter, stabilizer, renderer, surface, store, running);
//! std::thread::spawn(move || render_loop.run());
//! ```

pub mod adapter;
#[cfg(feature = "mock-sensor")]
pub mod mock_sensor;
pub mod recorded;
pub mod sensor_trait;
pub mod worker;

pub use adapter::SensorAdapter;
#[cfg(feature = "mock-sensor")]
pub use mock_sensor::SyntheticSensor;
pub use recorded::{load_depth_png, save_depth_png, RecordedSensor};
pub use sensor_trait::{DepthSensor, Frame, SensorStats, StreamKind};
pub use worker::{FrameStats, RenderLoop, TickOutcome};

use crate::config::{SensorConfig, SensorKind};
use crate::error::{Result, SandboxError};
use std::time::Duration;

/// Build the sensor selected by `config` (not yet connected)
pub fn open_sensor(config: &SensorConfig) -> Result<Box<dyn DepthSensor>> {
    match config.kind {
        SensorKind::Synthetic => {
            #[cfg(feature = "mock-sensor")]
            {
                Ok(Box::new(SyntheticSensor::from_config(config)))
            }
            #[cfg(not(feature = "mock-sensor"))]
            {
                Err(SandboxError::InvalidConfig(
                    "Synthetic sensor requires the mock-sensor feature".to_string(),
                ))
            }
        }
        SensorKind::Recorded => {
            let dir = config.recording_dir.as_ref().ok_or_else(|| {
                SandboxError::InvalidConfig(
                    "sensor.recording_dir is required for a recorded sensor".to_string(),
                )
            })?;
            Ok(Box::new(
                RecordedSensor::new(dir)
                    .with_looping(config.loop_recording)
                    .with_frame_interval(Duration::from_millis(config.frame_interval_ms)),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_sensor_needs_directory() {
        let config = SensorConfig {
            kind: SensorKind::Recorded,
            recording_dir: None,
            ..Default::default()
        };
        assert!(matches!(
            open_sensor(&config),
            Err(SandboxError::InvalidConfig(_))
        ));
    }

    #[cfg(feature = "mock-sensor")]
    #[test]
    fn test_open_synthetic_sensor() {
        let sensor = open_sensor(&SensorConfig::default()).unwrap();
        assert!(!sensor.is_connected());
    }
}
