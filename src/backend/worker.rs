//! Render Loop Implementation
//!
//! This module contains the loop that runs on its own thread, polls the
//! sensor, stabilizes and renders each depth frame, and publishes the result
//! to the presentation surface and the shared store.
//!
//! # Responsibilities
//!
//! - **Polling**: Non-blocking check for a new depth frame every tick
//! - **Snapshot**: One consistent read of the live settings per frame
//! - **Reset handling**: Drops the temporal history and acknowledges the flag
//! - **Failure policy**: A failing frame is logged and dropped; the loop goes on
//! - **Statistics**: Frame counters published with every composite
//!
//! # Shutdown
//!
//! The loop exits when the presentation surface goes inactive or the shared
//! `running` flag is cleared, and clears the flag itself on exit so the UI
//! side can wind down too.

use crate::backend::adapter::SensorAdapter;
use crate::backend::sensor_trait::{Frame, StreamKind};
use crate::error::{Result, SandboxError};
use crate::pipeline::{ContourRenderer, PipelineState, RenderedFrame, SharedStore, Stabilizer};
use crate::config::PipelineSettings;
use crate::presentation::PresentationSurface;
use crate::raster::DepthRaster;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Interval between throughput summaries in the log
const SUMMARY_INTERVAL: Duration = Duration::from_secs(1);

/// Counters kept by the render loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Frames stabilized, rendered and presented
    pub frames_rendered: u64,
    /// Frames abandoned because of an error
    pub frames_dropped: u64,
    /// Polls that found no new frame
    pub polls_skipped: u64,
    /// Resets of the temporal history
    pub resets: u64,
    /// Processing time of the last rendered frame in microseconds
    pub last_frame_time_us: u64,
    /// Total processing time in microseconds
    pub total_frame_time_us: u64,
    /// Contours drawn in the last rendered frame
    pub last_contour_count: usize,
}

impl FrameStats {
    /// Calculate average frame time in microseconds
    pub fn avg_frame_time_us(&self) -> f64 {
        if self.frames_rendered == 0 {
            0.0
        } else {
            self.total_frame_time_us as f64 / self.frames_rendered as f64
        }
    }

    pub fn record_frame(&mut self, time_us: u64, contours: usize) {
        self.frames_rendered += 1;
        self.last_frame_time_us = time_us;
        self.total_frame_time_us += time_us;
        self.last_contour_count = contours;
    }
}

/// What a single [`RenderLoop::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No new frame was ready
    Skipped,
    /// A composite was produced and presented
    Rendered,
    /// The frame failed and was discarded
    Dropped,
}

/// The acquisition/stabilization/render loop
pub struct RenderLoop {
    adapter: SensorAdapter,
    stabilizer: Stabilizer,
    renderer: ContourRenderer,
    state: PipelineState,
    surface: Box<dyn PresentationSurface>,
    store: Arc<SharedStore>,
    running: Arc<AtomicBool>,
    stats: FrameStats,
    idle_sleep: Duration,
    color_preview: bool,
    last_summary: Instant,
    rendered_at_last_summary: u64,
}

impl RenderLoop {
    pub fn new(
        adapter: SensorAdapter,
        stabilizer: Stabilizer,
        renderer: ContourRenderer,
        surface: Box<dyn PresentationSurface>,
        store: Arc<SharedStore>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            adapter,
            stabilizer,
            renderer,
            state: PipelineState::new(),
            surface,
            store,
            running,
            stats: FrameStats::default(),
            idle_sleep: Duration::ZERO,
            color_preview: false,
            last_summary: Instant::now(),
            rendered_at_last_summary: 0,
        }
    }

    /// Sleep this long after a poll that found nothing (zero busy-polls)
    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    /// Also publish color frames for the operator preview
    pub fn with_color_preview(mut self, enabled: bool) -> Self {
        self.color_preview = enabled;
        self
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Run until the surface closes or `running` is cleared
    pub fn run(&mut self) {
        tracing::info!("Render loop started ({})", self.adapter.description());

        while self.running.load(Ordering::SeqCst) {
            if !self.surface.is_active() {
                tracing::info!("Presentation surface inactive, stopping render loop");
                break;
            }

            if self.tick() == TickOutcome::Skipped && !self.idle_sleep.is_zero() {
                std::thread::sleep(self.idle_sleep);
            }

            if self.last_summary.elapsed() >= SUMMARY_INTERVAL {
                self.log_summary();
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.adapter.disconnect();
        tracing::info!(
            "Render loop stopped: {} rendered, {} dropped, {} resets",
            self.stats.frames_rendered,
            self.stats.frames_dropped,
            self.stats.resets
        );
    }

    /// Poll once and process the frame if one was ready
    pub fn tick(&mut self) -> TickOutcome {
        if self.color_preview {
            self.poll_color();
        }

        let raw = match self.adapter.get_calibrated_frame(StreamKind::Depth) {
            Ok(Some(Frame::Depth(raw))) => raw,
            Ok(Some(other)) => {
                return self.drop_frame(SandboxError::Sensor(format!(
                    "Expected depth frame, got {}",
                    other.kind()
                )))
            }
            Ok(None) => {
                self.stats.polls_skipped += 1;
                return TickOutcome::Skipped;
            }
            Err(e) => return self.drop_frame(e),
        };

        let snapshot = self.store.snapshot();
        let settings = snapshot.settings;
        let start = Instant::now();
        let result = self.process(&raw, &settings);

        if settings.reset_image {
            self.stats.resets += 1;
        }

        let outcome = match result {
            Ok(frame) => {
                self.stats
                    .record_frame(start.elapsed().as_micros() as u64, frame.contour_count);
                if let Err(e) = self.surface.update_image(&frame.composite) {
                    tracing::warn!("Presentation update failed: {}", e);
                }
                self.store
                    .publish_display(frame.composite, self.stats.clone());
                TickOutcome::Rendered
            }
            Err(e) => self.drop_frame(e),
        };

        if settings.reset_image && !self.store.clear_reset_if(snapshot.reset_generation) {
            tracing::debug!("Reset requested during frame, keeping it for the next one");
        }
        outcome
    }

    fn process(&mut self, raw: &DepthRaster, settings: &PipelineSettings) -> Result<RenderedFrame> {
        let stable = self.stabilizer.stabilize(&mut self.state, raw, settings)?;
        self.renderer.render(&stable, settings)
    }

    fn drop_frame(&mut self, error: SandboxError) -> TickOutcome {
        self.stats.frames_dropped += 1;
        tracing::warn!(
            "Dropped frame ({} so far): {}",
            self.stats.frames_dropped,
            error
        );
        self.store.publish_stats(self.stats.clone());
        TickOutcome::Dropped
    }

    fn poll_color(&mut self) {
        match self.adapter.get_calibrated_frame(StreamKind::Color) {
            Ok(Some(Frame::Color(color))) => self.store.publish_color(color),
            Ok(_) => {}
            Err(e) => tracing::debug!("Color preview frame skipped: {}", e),
        }
    }

    fn log_summary(&mut self) {
        let elapsed = self.last_summary.elapsed().as_secs_f64();
        let rendered = self.stats.frames_rendered - self.rendered_at_last_summary;
        tracing::debug!(
            "{:.1} fps, avg {:.1} ms/frame, {} contours, {} dropped, {} skipped polls",
            rendered as f64 / elapsed.max(f64::EPSILON),
            self.stats.avg_frame_time_us() / 1000.0,
            self.stats.last_contour_count,
            self.stats.frames_dropped,
            self.stats.polls_skipped
        );
        self.rendered_at_last_summary = self.stats.frames_rendered;
        self.last_summary = Instant::now();
    }
}
