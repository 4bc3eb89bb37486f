//! Mock construction helpers

use std::path::Path;
use std::sync::{Arc, Mutex};

use arsandbox_rs::backend::{save_depth_png, DepthSensor, SensorAdapter};
use arsandbox_rs::config::CalibrationFile;
use arsandbox_rs::presentation::PresentationSurface;
use arsandbox_rs::raster::{ColorRaster, DepthRaster};
use arsandbox_rs::Result;

#[cfg(feature = "mock-sensor")]
use arsandbox_rs::{backend::SyntheticSensor, config::TerrainPattern};

/// Surface that keeps every frame it is given, going inactive after `budget`
pub struct CollectingSurface {
    frames: Arc<Mutex<Vec<ColorRaster>>>,
    budget: usize,
}

impl CollectingSurface {
    /// Returns the surface and a handle to the frames it receives
    pub fn new(budget: usize) -> (Self, Arc<Mutex<Vec<ColorRaster>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                frames: Arc::clone(&frames),
                budget,
            },
            frames,
        )
    }
}

impl PresentationSurface for CollectingSurface {
    fn is_active(&self) -> bool {
        self.frames.lock().map(|f| f.len() < self.budget).unwrap_or(false)
    }

    fn update_image(&mut self, image: &ColorRaster) -> Result<()> {
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(image.clone());
        }
        Ok(())
    }
}

/// Write `frames` as a recording directory readable by `RecordedSensor`
pub fn write_recording(dir: &Path, frames: &[DepthRaster]) {
    for (i, frame) in frames.iter().enumerate() {
        save_depth_png(dir.join(format!("frame_{:06}.png", i)), frame)
            .expect("Failed to write recording frame");
    }
}

/// Adapter over `sensor` with identity calibration, already connected
pub fn connected_adapter(sensor: Box<dyn DepthSensor>) -> SensorAdapter {
    let mut adapter = SensorAdapter::new(sensor, CalibrationFile::default());
    adapter
        .connect_with_retry(1, std::time::Duration::ZERO)
        .expect("Sensor should connect");
    adapter
}

/// Deterministic synthetic sensor that has a frame ready on every poll
#[cfg(feature = "mock-sensor")]
pub fn create_test_sensor(width: usize, height: usize) -> SyntheticSensor {
    SyntheticSensor::new(width, height)
        .with_pattern(TerrainPattern::Hills)
        .with_noise(1.0)
        .with_dropout_rate(0.02)
        .with_frame_interval(std::time::Duration::ZERO)
        .with_seed(7)
}
