//! Shared configuration store
//!
//! One mutex guards both the live [`PipelineSettings`] and the latest display
//! rasters. Every critical section is a field copy; no image processing
//! happens while the lock is held. A poisoned lock is recovered, since the
//! guarded data is plain values that cannot be left half-written.

use crate::backend::FrameStats;
use crate::config::{PipelineSettings, SettingField, SettingValue, SettingsUpdate};
use crate::error::Result;
use crate::raster::ColorRaster;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Latest rendered output, as seen by the control surface
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    /// Most recent composite
    pub composite: Option<Arc<ColorRaster>>,
    /// Most recent color camera frame
    pub color: Option<Arc<ColorRaster>>,
    /// Render loop counters at the time `composite` was published
    pub stats: FrameStats,
    /// Bumped on every composite publish, so readers can skip unchanged frames
    pub generation: u64,
    /// Bumped on every color publish
    pub color_generation: u64,
}

/// Settings as read by one render pass, tagged with the reset request count
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsSnapshot {
    pub settings: PipelineSettings,
    pub reset_generation: u64,
}

#[derive(Debug, Default)]
struct Inner {
    settings: PipelineSettings,
    display: DisplayState,
    /// Bumped on every reset request
    reset_generation: u64,
}

impl Inner {
    /// Store `candidate`, counting a reset request if it asks for one
    fn commit(&mut self, candidate: PipelineSettings, writes_reset: bool) {
        if candidate.reset_image && (writes_reset || !self.settings.reset_image) {
            self.reset_generation += 1;
        }
        self.settings = candidate;
    }
}

/// Settings and display bag shared by the render loop and the control surface
#[derive(Debug, Default)]
pub struct SharedStore {
    inner: Mutex<Inner>,
}

impl SharedStore {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            inner: Mutex::new(Inner {
                settings,
                display: DisplayState::default(),
                reset_generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consistent copy of every setting
    pub fn get_all(&self) -> PipelineSettings {
        self.lock().settings
    }

    /// Copy of every setting plus the reset generation it was read at
    pub fn snapshot(&self) -> SettingsSnapshot {
        let inner = self.lock();
        SettingsSnapshot {
            settings: inner.settings,
            reset_generation: inner.reset_generation,
        }
    }

    pub fn get(&self, field: SettingField) -> SettingValue {
        self.lock().settings.get(field)
    }

    /// Unchecked single-field write
    pub fn set(&self, field: SettingField, value: SettingValue) -> Result<()> {
        let mut inner = self.lock();
        let mut candidate = inner.settings;
        candidate.set(field, value)?;
        inner.commit(candidate, field == SettingField::ResetImage);
        Ok(())
    }

    /// Unchecked batch write, applied under one lock
    pub fn update(&self, update: &SettingsUpdate) {
        let mut inner = self.lock();
        let candidate = inner.settings.merged(update);
        inner.commit(candidate, update.reset_image == Some(true));
    }

    /// Single-field write that is dropped if the result would be invalid
    pub fn try_set(&self, field: SettingField, value: SettingValue) -> Result<PipelineSettings> {
        let mut inner = self.lock();
        let mut candidate = inner.settings;
        candidate.set(field, value)?;
        candidate.validate()?;
        inner.commit(candidate, field == SettingField::ResetImage);
        Ok(candidate)
    }

    /// Batch write that is dropped as a whole if the result would be invalid
    pub fn try_update(&self, update: &SettingsUpdate) -> Result<PipelineSettings> {
        let mut inner = self.lock();
        let candidate = inner.settings.merged(update);
        candidate.validate()?;
        inner.commit(candidate, update.reset_image == Some(true));
        Ok(candidate)
    }

    pub fn request_reset(&self) {
        let mut inner = self.lock();
        inner.settings.reset_image = true;
        inner.reset_generation += 1;
    }

    /// Acknowledge the reset seen at `generation`
    ///
    /// Called by the render loop once the history is gone. Leaves the flag
    /// set and returns `false` if another reset was requested since the
    /// snapshot, so that request is served by the next frame.
    pub fn clear_reset_if(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.reset_generation != generation {
            return false;
        }
        inner.settings.reset_image = false;
        true
    }

    /// Publish a new composite with the loop counters
    pub fn publish_display(&self, composite: ColorRaster, stats: FrameStats) {
        let composite = Arc::new(composite);
        let mut inner = self.lock();
        inner.display.composite = Some(composite);
        inner.display.stats = stats;
        inner.display.generation += 1;
    }

    /// Publish counters without a new composite (dropped or skipped frames)
    pub fn publish_stats(&self, stats: FrameStats) {
        self.lock().display.stats = stats;
    }

    pub fn publish_color(&self, color: ColorRaster) {
        let color = Arc::new(color);
        let mut inner = self.lock();
        inner.display.color = Some(color);
        inner.display.color_generation += 1;
    }

    /// Copy of the display state for a preview
    pub fn display(&self) -> DisplayState {
        self.lock().display.clone()
    }

    pub fn stats(&self) -> FrameStats {
        self.lock().display.stats.clone()
    }
}
