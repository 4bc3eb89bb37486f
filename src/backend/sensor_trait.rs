//! DepthSensor trait for a unified sensor interface
//!
//! This module provides a common trait for every depth source, so the
//! render loop can run against real hardware, a synthetic terrain or a
//! recording on disk. Implementations must be `Send` to be moved onto the
//! render thread.

use crate::error::Result;
use crate::raster::{ColorRaster, DepthRaster, Raster};
use std::collections::VecDeque;
use std::fmt;

/// Size of the rolling window for recent fetch times
const RECENT_WINDOW_SIZE: usize = 100;

/// Streams a sensor can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Depth,
    Color,
    Infrared,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [StreamKind::Depth, StreamKind::Color, StreamKind::Infrared];
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Depth => write!(f, "depth"),
            StreamKind::Color => write!(f, "color"),
            StreamKind::Infrared => write!(f, "infrared"),
        }
    }
}

/// One frame from one stream
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Depth in millimeters, `0` where the sensor saw nothing
    Depth(DepthRaster),
    /// RGB camera image
    Color(ColorRaster),
    /// Raw 16-bit infrared intensity
    Infrared(Raster<u16>),
}

impl Frame {
    pub fn kind(&self) -> StreamKind {
        match self {
            Frame::Depth(_) => StreamKind::Depth,
            Frame::Color(_) => StreamKind::Color,
            Frame::Infrared(_) => StreamKind::Infrared,
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            Frame::Depth(r) => r.dimensions(),
            Frame::Color(r) => r.dimensions(),
            Frame::Infrared(r) => r.dimensions(),
        }
    }

    pub fn into_depth(self) -> Option<DepthRaster> {
        match self {
            Frame::Depth(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_color(self) -> Option<ColorRaster> {
        match self {
            Frame::Color(r) => Some(r),
            _ => None,
        }
    }
}

/// Statistics for frame acquisition
#[derive(Debug, Clone)]
pub struct SensorStats {
    /// Frames handed to the caller
    pub frames_delivered: u64,
    /// Polls that found no new frame
    pub frames_skipped: u64,
    /// Fetches that failed
    pub failed_fetches: u64,
    /// Last fetch (including calibration) in microseconds
    pub last_fetch_time_us: u64,
    /// Total fetch time in microseconds
    pub total_fetch_time_us: u64,
    /// Rolling window of recent fetch times
    pub recent_fetch_times: VecDeque<u64>,
}

impl Default for SensorStats {
    fn default() -> Self {
        Self {
            frames_delivered: 0,
            frames_skipped: 0,
            failed_fetches: 0,
            last_fetch_time_us: 0,
            total_fetch_time_us: 0,
            recent_fetch_times: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }
}

impl SensorStats {
    /// Calculate average fetch time in microseconds
    pub fn avg_fetch_time_us(&self) -> f64 {
        if self.frames_delivered == 0 {
            0.0
        } else {
            self.total_fetch_time_us as f64 / self.frames_delivered as f64
        }
    }

    /// Record a delivered frame
    pub fn record_delivery(&mut self, time_us: u64) {
        self.frames_delivered += 1;
        self.last_fetch_time_us = time_us;
        self.total_fetch_time_us += time_us;

        self.recent_fetch_times.push_back(time_us);
        if self.recent_fetch_times.len() > RECENT_WINDOW_SIZE {
            self.recent_fetch_times.pop_front();
        }
    }

    pub fn record_skip(&mut self) {
        self.frames_skipped += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed_fetches += 1;
    }

    /// Calculate jitter (max - min) over the recent window in microseconds
    pub fn jitter_us(&self) -> u64 {
        let min = self.recent_fetch_times.iter().min().copied().unwrap_or(0);
        let max = self.recent_fetch_times.iter().max().copied().unwrap_or(0);
        max.saturating_sub(min)
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Unified interface for depth sensors
///
/// `has_new_frame` must be cheap and non-blocking; the render loop calls it
/// on every tick and only fetches when it returns `true`.
#[cfg_attr(test, mockall::automock)]
pub trait DepthSensor: Send {
    /// Open the device
    fn connect(&mut self) -> Result<()>;

    /// Close the device
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Whether a frame newer than the last fetched one is waiting
    fn has_new_frame(&mut self, stream: StreamKind) -> bool;

    /// Take the latest frame of `stream`
    fn get_frame(&mut self, stream: StreamKind) -> Result<Frame>;

    /// Human-readable name for logs and the status line
    fn description(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_average_and_jitter() {
        let mut stats = SensorStats::default();
        stats.record_delivery(100);
        stats.record_delivery(300);
        stats.record_skip();
        assert_eq!(stats.avg_fetch_time_us(), 200.0);
        assert_eq!(stats.jitter_us(), 200);
        assert_eq!(stats.frames_skipped, 1);

        stats.reset();
        assert_eq!(stats.frames_delivered, 0);
    }

    #[test]
    fn test_stats_window_is_bounded() {
        let mut stats = SensorStats::default();
        for i in 0..(RECENT_WINDOW_SIZE as u64 + 20) {
            stats.record_delivery(i);
        }
        assert_eq!(stats.recent_fetch_times.len(), RECENT_WINDOW_SIZE);
    }

    #[test]
    fn test_frame_accessors() {
        let frame = Frame::Depth(Raster::filled(3, 2, 1000.0));
        assert_eq!(frame.kind(), StreamKind::Depth);
        assert_eq!(frame.dimensions(), (3, 2));
        assert!(frame.clone().into_color().is_none());
        assert!(frame.into_depth().is_some());
    }
}
