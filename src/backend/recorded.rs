//! Replay of recorded depth frames
//!
//! A recording is a directory of 16-bit grayscale PNG files, one per frame,
//! each sample holding a depth in millimeters (`0` = dropout). Frames are
//! replayed in file-name order, so zero-padded names (`frame_000001.png`)
//! keep their capture order. [`save_depth_png`] writes frames in this format.

use crate::error::{Result, SandboxError};
use crate::raster::{DepthRaster, Raster, Sample};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::sensor_trait::{DepthSensor, Frame, StreamKind};

/// Depth source reading PNG16 frames from a directory
pub struct RecordedSensor {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
    frame_interval: Duration,
    last_fetch: Option<Instant>,
    connected: bool,
}

impl RecordedSensor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            cursor: 0,
            looping: false,
            frame_interval: Duration::from_millis(33),
            last_fetch: None,
            connected: false,
        }
    }

    /// Restart from the first frame after the last one
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Number of frames found at connect time
    pub fn frame_total(&self) -> usize {
        self.files.len()
    }

    /// Whether every frame has been delivered and looping is off
    pub fn is_exhausted(&self) -> bool {
        !self.looping && self.cursor >= self.files.len()
    }

    fn scan(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            SandboxError::Sensor(format!("Cannot open recording {:?}: {}", self.dir, e))
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl DepthSensor for RecordedSensor {
    fn connect(&mut self) -> Result<()> {
        let files = self.scan()?;
        if files.is_empty() {
            return Err(SandboxError::Sensor(format!(
                "Recording {:?} contains no PNG frames",
                self.dir
            )));
        }
        tracing::info!("Opened recording {:?} ({} frames)", self.dir, files.len());
        self.files = files;
        self.cursor = 0;
        self.last_fetch = None;
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn has_new_frame(&mut self, stream: StreamKind) -> bool {
        if !self.connected || stream != StreamKind::Depth || self.is_exhausted() {
            return false;
        }
        self.last_fetch
            .map_or(true, |at| at.elapsed() >= self.frame_interval)
    }

    fn get_frame(&mut self, stream: StreamKind) -> Result<Frame> {
        if !self.connected {
            return Err(SandboxError::Sensor("Recording not opened".to_string()));
        }
        if stream != StreamKind::Depth {
            return Err(SandboxError::Sensor(format!(
                "Recording has no {} stream",
                stream
            )));
        }
        if self.cursor >= self.files.len() {
            if !self.looping {
                return Err(SandboxError::Sensor("Recording exhausted".to_string()));
            }
            self.cursor = 0;
        }

        let path = &self.files[self.cursor];
        self.cursor += 1;
        self.last_fetch = Some(Instant::now());
        load_depth_png(path).map(Frame::Depth)
    }

    fn description(&self) -> String {
        format!("Recording {}", self.dir.display())
    }
}

/// Read a PNG16 depth frame
pub fn load_depth_png(path: impl AsRef<Path>) -> Result<DepthRaster> {
    let path = path.as_ref();
    let image = image::open(path)
        .map_err(|e| SandboxError::Image(format!("Failed to read {:?}: {}", path, e)))?
        .into_luma16();
    let (width, height) = image.dimensions();
    let data = image.into_raw().into_iter().map(Sample::to_f32).collect();
    Ok(Raster::from_vec(width as usize, height as usize, data)?)
}

/// Write a depth raster as PNG16 (millimeters, saturated to `u16`)
pub fn save_depth_png(path: impl AsRef<Path>, depth: &DepthRaster) -> Result<()> {
    let path = path.as_ref();
    let data: Vec<u16> = depth.data().iter().map(|&v| u16::from_f32(v)).collect();
    let buffer = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(
        depth.width() as u32,
        depth.height() as u32,
        data,
    )
    .ok_or_else(|| SandboxError::Image("Depth buffer does not match dimensions".to_string()))?;
    buffer.save(path)?;
    Ok(())
}
