//! Sensor Adapter: calibrated frames from any [`DepthSensor`]
//!
//! Wraps a sensor together with its [`CalibrationFile`]. Every frame handed
//! out has had lens undistortion and the per-stream focus warp applied, so
//! downstream stages work in the sandbox's coordinate frame. Streams without
//! calibration pass through untouched.

use crate::config::{CalibrationFile, StreamCalibration};
use crate::error::{Result, ResultExt, SandboxError};
use crate::raster::{undistort, warp_with_inverse};
use std::time::{Duration, Instant};

use super::sensor_trait::{DepthSensor, Frame, SensorStats, StreamKind};

/// Calibrating front for a depth sensor
pub struct SensorAdapter {
    sensor: Box<dyn DepthSensor>,
    calibration: CalibrationFile,
    stats: SensorStats,
}

impl SensorAdapter {
    pub fn new(sensor: Box<dyn DepthSensor>, calibration: CalibrationFile) -> Self {
        Self {
            sensor,
            calibration,
            stats: SensorStats::default(),
        }
    }

    /// Connect, retrying up to `attempts` times with `backoff` between tries
    ///
    /// Fails with [`SandboxError::SensorUnavailable`] once every attempt has
    /// failed.
    pub fn connect_with_retry(&mut self, attempts: u32, backoff: Duration) -> Result<()> {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            match self.sensor.connect() {
                Ok(()) => {
                    tracing::info!(
                        "Connected to {} (attempt {}/{})",
                        self.sensor.description(),
                        attempt,
                        attempts
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        "Sensor connection attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        e
                    );
                    if attempt < attempts {
                        std::thread::sleep(backoff);
                    }
                }
            }
        }
        tracing::error!("Sensor unreachable after {} attempts", attempts);
        Err(SandboxError::SensorUnavailable { attempts })
    }

    pub fn disconnect(&mut self) {
        self.sensor.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.sensor.is_connected()
    }

    /// Non-blocking check for a new frame on `stream`
    pub fn has_new_frame(&mut self, stream: StreamKind) -> bool {
        self.sensor.is_connected() && self.sensor.has_new_frame(stream)
    }

    /// Fetch and calibrate the next frame, or `None` when nothing new is ready
    pub fn get_calibrated_frame(&mut self, stream: StreamKind) -> Result<Option<Frame>> {
        if !self.has_new_frame(stream) {
            if stream == StreamKind::Depth {
                self.stats.record_skip();
            }
            return Ok(None);
        }

        let start = Instant::now();
        let frame = match self
            .sensor
            .get_frame(stream)
            .with_context(|| format!("Fetching {} frame", stream))
        {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.record_failure();
                return Err(e);
            }
        };
        if frame.kind() != stream {
            self.stats.record_failure();
            return Err(SandboxError::Sensor(format!(
                "Requested {} frame but sensor returned {}",
                stream,
                frame.kind()
            )));
        }

        let frame = self.undistort_frame(stream, frame);
        let frame = self.apply_focus_warp(stream, frame)?;
        self.stats
            .record_delivery(start.elapsed().as_micros() as u64);
        Ok(Some(frame))
    }

    /// Apply the stream's lens correction, if calibrated
    pub fn undistort_frame(&self, stream: StreamKind, frame: Frame) -> Frame {
        let Some(intrinsics) = self
            .calibration
            .stream(stream)
            .and_then(StreamCalibration::intrinsics)
        else {
            return frame;
        };
        match frame {
            Frame::Depth(r) => Frame::Depth(undistort(&r, &intrinsics)),
            Frame::Color(r) => Frame::Color(undistort(&r, &intrinsics)),
            Frame::Infrared(r) => Frame::Infrared(undistort(&r, &intrinsics)),
        }
    }

    /// Apply the stream's focus homography, if calibrated
    ///
    /// Resampling maps output pixels back through the inverse homography. A
    /// stored `inverse_homography` is used as-is; otherwise it is derived.
    pub fn apply_focus_warp(&self, stream: StreamKind, frame: Frame) -> Result<Frame> {
        let Some(calibration) = self.calibration.stream(stream) else {
            return Ok(frame);
        };
        let inverse = match (calibration.inverse_homography, calibration.homography) {
            (Some(inverse), _) => inverse,
            (None, Some(homography)) => homography
                .inverse()
                .context("Inverting focus homography")?,
            (None, None) => return Ok(frame),
        };

        let (width, height) = match calibration.output_size {
            Some([w, h]) => (w, h),
            None => frame.dimensions(),
        };
        Ok(match frame {
            Frame::Depth(r) => Frame::Depth(warp_with_inverse(&r, &inverse, width, height)),
            Frame::Color(r) => Frame::Color(warp_with_inverse(&r, &inverse, width, height)),
            Frame::Infrared(r) => {
                Frame::Infrared(warp_with_inverse(&r, &inverse, width, height))
            }
        })
    }

    pub fn calibration(&self) -> &CalibrationFile {
        &self.calibration
    }

    pub fn stats(&self) -> &SensorStats {
        &self.stats
    }

    pub fn description(&self) -> String {
        self.sensor.description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sensor_trait::MockDepthSensor;
    use crate::raster::{Homography, Raster};

    fn depth_frame() -> Frame {
        Frame::Depth(Raster::from_fn(4, 4, |x, y| 1000.0 + (x + 4 * y) as f32))
    }

    #[test]
    fn test_connect_with_retry_gives_up() {
        let mut sensor = MockDepthSensor::new();
        sensor
            .expect_connect()
            .times(3)
            .returning(|| Err(SandboxError::Sensor("no device".to_string())));
        sensor
            .expect_description()
            .returning(|| "mock".to_string());

        let mut adapter = SensorAdapter::new(Box::new(sensor), CalibrationFile::default());
        let err = adapter
            .connect_with_retry(3, Duration::from_millis(1))
            .unwrap_err();
        assert!(matches!(err, SandboxError::SensorUnavailable { attempts: 3 }));
    }

    #[test]
    fn test_connect_with_retry_succeeds_late() {
        let mut sensor = MockDepthSensor::new();
        let mut calls = 0;
        sensor.expect_connect().times(2).returning(move || {
            calls += 1;
            if calls < 2 {
                Err(SandboxError::Sensor("busy".to_string()))
            } else {
                Ok(())
            }
        });
        sensor
            .expect_description()
            .returning(|| "mock".to_string());

        let mut adapter = SensorAdapter::new(Box::new(sensor), CalibrationFile::default());
        assert!(adapter.connect_with_retry(5, Duration::from_millis(1)).is_ok());
    }

    #[test]
    fn test_no_new_frame_is_skip() {
        let mut sensor = MockDepthSensor::new();
        sensor.expect_is_connected().return_const(true);
        sensor.expect_has_new_frame().return_const(false);
        sensor.expect_get_frame().never();

        let mut adapter = SensorAdapter::new(Box::new(sensor), CalibrationFile::default());
        assert!(adapter
            .get_calibrated_frame(StreamKind::Depth)
            .unwrap()
            .is_none());
        assert_eq!(adapter.stats().frames_skipped, 1);
    }

    #[test]
    fn test_uncalibrated_frame_passes_through() {
        let mut sensor = MockDepthSensor::new();
        sensor.expect_is_connected().return_const(true);
        sensor.expect_has_new_frame().return_const(true);
        sensor.expect_get_frame().returning(|_| Ok(depth_frame()));

        let mut adapter = SensorAdapter::new(Box::new(sensor), CalibrationFile::default());
        let frame = adapter.get_calibrated_frame(StreamKind::Depth).unwrap();
        assert_eq!(frame, Some(depth_frame()));
        assert_eq!(adapter.stats().frames_delivered, 1);
    }

    #[test]
    fn test_focus_warp_applied() {
        let mut calibration = CalibrationFile::default();
        calibration.depth = Some(StreamCalibration {
            homography: Some(Homography::from_rows([
                [1.0, 0.0, 1.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ])),
            ..Default::default()
        });
        let adapter = SensorAdapter::new(Box::new(MockDepthSensor::new()), calibration);

        let warped = adapter
            .apply_focus_warp(StreamKind::Depth, depth_frame())
            .unwrap()
            .into_depth()
            .unwrap();
        assert_eq!(warped.get(0, 0), 0.0);
        assert_eq!(warped.get(1, 0), 1000.0);
    }

    #[test]
    fn test_focus_warp_uses_calibrated_inverse() {
        // The stored inverse shifts by two pixels while the forward matrix
        // would only shift by one, so the output shows which one was used.
        let mut calibration = CalibrationFile::default();
        calibration.depth = Some(StreamCalibration {
            homography: Some(Homography::from_rows([
                [1.0, 0.0, 1.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ])),
            inverse_homography: Some(Homography::from_rows([
                [1.0, 0.0, -2.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ])),
            ..Default::default()
        });
        let adapter = SensorAdapter::new(Box::new(MockDepthSensor::new()), calibration);

        let warped = adapter
            .apply_focus_warp(StreamKind::Depth, depth_frame())
            .unwrap()
            .into_depth()
            .unwrap();
        assert_eq!(warped.get(1, 0), 0.0);
        assert_eq!(warped.get(2, 0), 1000.0);
    }

    #[test]
    fn test_singular_focus_homography_is_error() {
        let mut calibration = CalibrationFile::default();
        calibration.depth = Some(StreamCalibration {
            homography: Some(Homography::from_rows([
                [1.0, 2.0, 0.0],
                [2.0, 4.0, 0.0],
                [0.0, 0.0, 1.0],
            ])),
            ..Default::default()
        });
        let adapter = SensorAdapter::new(Box::new(MockDepthSensor::new()), calibration);
        assert!(adapter
            .apply_focus_warp(StreamKind::Depth, depth_frame())
            .is_err());
    }

    #[test]
    fn test_wrong_frame_kind_is_error() {
        let mut sensor = MockDepthSensor::new();
        sensor.expect_is_connected().return_const(true);
        sensor.expect_has_new_frame().return_const(true);
        sensor
            .expect_get_frame()
            .returning(|_| Ok(Frame::Color(Raster::filled(2, 2, [0, 0, 0]))));

        let mut adapter = SensorAdapter::new(Box::new(sensor), CalibrationFile::default());
        assert!(adapter.get_calibrated_frame(StreamKind::Depth).is_err());
        assert_eq!(adapter.stats().failed_fetches, 1);
    }
}
