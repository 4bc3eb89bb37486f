//! Synthetic Depth Sensor for Running Without Hardware
//!
//! Generates a procedural sand surface as seen by a downward-facing depth
//! camera, with the defects a real sensor shows:
//!
//! - **Measurement noise**: uniform jitter of a few millimeters per sample
//! - **Dropouts**: a fraction of samples reported as `0`
//! - **Hand**: an optional blob much closer than the sand that sweeps across
//!   the frame, out of the calibrated depth range
//!
//! # Terrain Patterns
//!
//! - [`TerrainPattern::Flat`] - Level sand at the base depth
//! - [`TerrainPattern::Slope`] - Sand rising linearly from left to right
//! - [`TerrainPattern::Hills`] - Rolling hills with a central mound
//! - [`TerrainPattern::Ripple`] - Concentric ripples around the centre
//!
//! # Enabling
//!
//! The synthetic sensor is only available with the `mock-sensor` feature,
//! which is on by default:
//!
//! ```bash
//! cargo run --no-default-features   # hardware-only build
//! ```

use crate::config::{SensorConfig, TerrainPattern};
use crate::error::{Result, SandboxError};
use crate::raster::{ColorRaster, DepthRaster, Raster};
use std::f32::consts::PI;
use std::time::{Duration, Instant};

use super::sensor_trait::{DepthSensor, Frame, StreamKind};

/// Distance from the sensor to the sandbox floor (mm)
pub const DEFAULT_BASE_DEPTH: f32 = 1500.0;

/// Depth of the simulated hand (mm), nearer than any sensible `min_depth`
pub const HAND_DEPTH: f32 = 350.0;

/// Procedural depth source
pub struct SyntheticSensor {
    width: usize,
    height: usize,
    pattern: TerrainPattern,
    base_depth: f32,
    noise_amplitude: f32,
    dropout_rate: f32,
    hand: bool,
    frame_interval: Duration,
    connected: bool,
    start_time: Instant,
    last_fetch: [Option<Instant>; 3],
    frame_count: u64,
    seed: u64,
}

impl SyntheticSensor {
    /// Create a sensor producing `width x height` frames
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pattern: TerrainPattern::default(),
            base_depth: DEFAULT_BASE_DEPTH,
            noise_amplitude: 2.0,
            dropout_rate: 0.01,
            hand: false,
            frame_interval: Duration::from_millis(33),
            connected: false,
            start_time: Instant::now(),
            last_fetch: [None; 3],
            frame_count: 0,
            seed: 12345,
        }
    }

    /// Create a sensor from the `[sensor]` config section
    pub fn from_config(config: &SensorConfig) -> Self {
        Self::new(config.width, config.height)
            .with_pattern(config.pattern)
            .with_hand(config.simulate_hand)
            .with_frame_interval(Duration::from_millis(config.frame_interval_ms))
    }

    pub fn with_pattern(mut self, pattern: TerrainPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_base_depth(mut self, depth: f32) -> Self {
        self.base_depth = depth;
        self
    }

    /// Uniform noise in `[-amplitude, amplitude]` mm
    pub fn with_noise(mut self, amplitude: f32) -> Self {
        self.noise_amplitude = amplitude.max(0.0);
        self
    }

    /// Fraction of samples reported as dropouts
    pub fn with_dropout_rate(mut self, rate: f32) -> Self {
        self.dropout_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_hand(mut self, enabled: bool) -> Self {
        self.hand = enabled;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Seed for the noise generator, for repeatable frames
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed.max(1);
        self
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn stream_slot(stream: StreamKind) -> usize {
        match stream {
            StreamKind::Depth => 0,
            StreamKind::Color => 1,
            StreamKind::Infrared => 2,
        }
    }

    /// xorshift64, returns a value in `[0, 1)`
    fn next_random(&mut self) -> f32 {
        let mut s = self.seed;
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        self.seed = s;
        (s >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Noise-free sand surface depth at `(x, y)`
    pub fn terrain_depth(&self, x: usize, y: usize) -> f32 {
        let u = x as f32 / self.width.max(1) as f32;
        let v = y as f32 / self.height.max(1) as f32;
        let relief = match self.pattern {
            TerrainPattern::Flat => 0.0,
            TerrainPattern::Slope => 200.0 * u,
            TerrainPattern::Hills => {
                let waves = 60.0 * ((3.0 * PI * u).sin() * (2.0 * PI * v).cos() + 1.0);
                let dx = u - 0.5;
                let dy = v - 0.5;
                let mound = 120.0 * (-(dx * dx + dy * dy) / 0.02).exp();
                waves + mound
            }
            TerrainPattern::Ripple => {
                let dx = (u - 0.5) * self.width as f32;
                let dy = (v - 0.5) * self.height as f32;
                40.0 * ((dx * dx + dy * dy).sqrt() / 12.0).sin() + 40.0
            }
        };
        self.base_depth - relief
    }

    /// Centre and radius of the hand after `elapsed` seconds
    fn hand_position(&self, elapsed: f32) -> (f32, f32, f32) {
        let w = self.width as f32;
        let h = self.height as f32;
        let cx = w * (0.5 + 0.35 * (elapsed * 0.4).cos());
        let cy = h * (0.5 + 0.30 * (elapsed * 0.7).sin());
        (cx, cy, w.min(h) / 8.0)
    }

    fn generate_depth(&mut self) -> DepthRaster {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let hand = self.hand.then(|| self.hand_position(elapsed));
        let mut depth = Raster::filled(self.width, self.height, 0.0f32);

        for y in 0..self.height {
            for x in 0..self.width {
                if let Some((cx, cy, r)) = hand {
                    let dx = x as f32 - cx;
                    let dy = y as f32 - cy;
                    if dx * dx + dy * dy <= r * r {
                        depth.set(x, y, HAND_DEPTH);
                        continue;
                    }
                }
                if self.dropout_rate > 0.0 && self.next_random() < self.dropout_rate {
                    continue;
                }
                let noise = (self.next_random() - 0.5) * 2.0 * self.noise_amplitude;
                depth.set(x, y, (self.terrain_depth(x, y) + noise).round());
            }
        }
        depth
    }

    fn generate_color(&self) -> ColorRaster {
        Raster::from_fn(self.width, self.height, |x, y| {
            let shade = ((self.base_depth - self.terrain_depth(x, y)) * 0.3).clamp(0.0, 60.0) as u8;
            [194 + shade / 2, 178 + shade / 3, 128 + shade]
        })
    }

    fn generate_infrared(&self) -> Raster<u16> {
        Raster::from_fn(self.width, self.height, |x, y| {
            (self.terrain_depth(x, y) * 8.0).clamp(0.0, 65535.0) as u16
        })
    }
}

impl DepthSensor for SyntheticSensor {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        self.start_time = Instant::now();
        self.last_fetch = [None; 3];
        tracing::info!(
            "Synthetic sensor connected ({}x{}, {:?})",
            self.width,
            self.height,
            self.pattern
        );
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            tracing::info!("Synthetic sensor disconnected");
        }
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn has_new_frame(&mut self, stream: StreamKind) -> bool {
        if !self.connected {
            return false;
        }
        match self.last_fetch[Self::stream_slot(stream)] {
            None => true,
            Some(at) => at.elapsed() >= self.frame_interval,
        }
    }

    fn get_frame(&mut self, stream: StreamKind) -> Result<Frame> {
        if !self.connected {
            return Err(SandboxError::Sensor(
                "Synthetic sensor not connected".to_string(),
            ));
        }
        self.last_fetch[Self::stream_slot(stream)] = Some(Instant::now());
        let frame = match stream {
            StreamKind::Depth => {
                self.frame_count += 1;
                Frame::Depth(self.generate_depth())
            }
            StreamKind::Color => Frame::Color(self.generate_color()),
            StreamKind::Infrared => Frame::Infrared(self.generate_infrared()),
        };
        Ok(frame)
    }

    fn description(&self) -> String {
        format!(
            "Synthetic {:?} terrain {}x{}",
            self.pattern, self.width, self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_disconnect() {
        let mut sensor = SyntheticSensor::new(8, 6);
        assert!(!sensor.is_connected());
        assert!(!sensor.has_new_frame(StreamKind::Depth));
        assert!(sensor.get_frame(StreamKind::Depth).is_err());

        sensor.connect().unwrap();
        assert!(sensor.is_connected());
        assert!(sensor.has_new_frame(StreamKind::Depth));

        sensor.disconnect();
        assert!(!sensor.is_connected());
    }

    #[test]
    fn test_frame_interval_gates_new_frames() {
        let mut sensor = SyntheticSensor::new(4, 4).with_frame_interval(Duration::from_secs(60));
        sensor.connect().unwrap();
        assert!(sensor.has_new_frame(StreamKind::Depth));
        sensor.get_frame(StreamKind::Depth).unwrap();
        assert!(!sensor.has_new_frame(StreamKind::Depth));
        // Streams are tracked independently
        assert!(sensor.has_new_frame(StreamKind::Color));
    }

    #[test]
    fn test_flat_noise_free_frame() {
        let mut sensor = SyntheticSensor::new(16, 12)
            .with_pattern(TerrainPattern::Flat)
            .with_noise(0.0)
            .with_dropout_rate(0.0);
        sensor.connect().unwrap();
        let depth = sensor
            .get_frame(StreamKind::Depth)
            .unwrap()
            .into_depth()
            .unwrap();
        assert_eq!(depth.dimensions(), (16, 12));
        assert!(depth.data().iter().all(|&v| v == DEFAULT_BASE_DEPTH));
        assert_eq!(sensor.frame_count(), 1);
    }

    #[test]
    fn test_dropouts_and_noise_bounds() {
        let mut sensor = SyntheticSensor::new(64, 64)
            .with_pattern(TerrainPattern::Flat)
            .with_noise(3.0)
            .with_dropout_rate(0.2)
            .with_seed(99);
        sensor.connect().unwrap();
        let depth = sensor
            .get_frame(StreamKind::Depth)
            .unwrap()
            .into_depth()
            .unwrap();
        let zeros = depth.data().iter().filter(|&&v| v == 0.0).count();
        assert!(zeros > 0);
        assert!(depth
            .data()
            .iter()
            .filter(|&&v| v != 0.0)
            .all(|&v| (v - DEFAULT_BASE_DEPTH).abs() <= 3.0));
    }

    #[test]
    fn test_hand_is_out_of_range() {
        let mut sensor = SyntheticSensor::new(64, 48).with_hand(true).with_dropout_rate(0.0);
        sensor.connect().unwrap();
        let depth = sensor
            .get_frame(StreamKind::Depth)
            .unwrap()
            .into_depth()
            .unwrap();
        assert!(depth.data().iter().any(|&v| v == HAND_DEPTH));
    }

    #[test]
    fn test_slope_rises_left_to_right() {
        let sensor = SyntheticSensor::new(100, 10).with_pattern(TerrainPattern::Slope);
        assert!(sensor.terrain_depth(90, 5) < sensor.terrain_depth(10, 5));
    }

    #[test]
    fn test_side_streams() {
        let mut sensor = SyntheticSensor::new(8, 8);
        sensor.connect().unwrap();
        assert_eq!(
            sensor.get_frame(StreamKind::Color).unwrap().kind(),
            StreamKind::Color
        );
        assert_eq!(
            sensor.get_frame(StreamKind::Infrared).unwrap().kind(),
            StreamKind::Infrared
        );
    }
}
