//! Operator control surface
//!
//! Validated entry point for everything the operator can change. Writes that
//! would break a settings invariant are rejected here and never reach the
//! render loop; the store keeps its previous values.

use crate::backend::FrameStats;
use crate::config::{PipelineSettings, SettingField, SettingValue, SettingsUpdate};
use crate::error::Result;
use crate::pipeline::{DisplayState, SharedStore};
use std::sync::Arc;

/// Cheap, cloneable handle over the shared store
#[derive(Debug, Clone)]
pub struct ControlSurface {
    store: Arc<SharedStore>,
}

impl ControlSurface {
    pub fn new(store: Arc<SharedStore>) -> Self {
        Self { store }
    }

    /// Current settings
    pub fn snapshot(&self) -> PipelineSettings {
        self.store.get_all()
    }

    /// Validated write of one field
    pub fn set_field(&self, field: SettingField, value: SettingValue) -> Result<()> {
        match self.store.try_set(field, value) {
            Ok(_) => {
                tracing::info!("Set {} = {:?}", field, value);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Rejected {} = {:?}: {}", field, value, e);
                Err(e)
            }
        }
    }

    /// Validated atomic batch write
    pub fn apply(&self, update: &SettingsUpdate) -> Result<PipelineSettings> {
        if update.is_empty() {
            return Ok(self.snapshot());
        }
        match self.store.try_update(update) {
            Ok(settings) => {
                tracing::info!("Applied settings: {:?}", settings);
                Ok(settings)
            }
            Err(e) => {
                tracing::warn!("Rejected settings update: {}", e);
                Err(e)
            }
        }
    }

    /// Ask the render loop to drop its temporal history
    pub fn request_reset(&self) {
        tracing::info!("Image reset requested");
        self.store.request_reset();
    }

    pub fn reset_pending(&self) -> bool {
        self.store.get_all().reset_image
    }

    /// Latest composite and color frame
    pub fn display(&self) -> DisplayState {
        self.store.display()
    }

    pub fn stats(&self) -> FrameStats {
        self.store.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Colormap;

    fn control() -> ControlSurface {
        ControlSurface::new(Arc::new(SharedStore::new(
            PipelineSettings::with_depth_bounds(1000.0, 1400.0),
        )))
    }

    #[test]
    fn test_rejected_bounds_keep_previous_values() {
        let control = control();
        let result = control.apply(&SettingsUpdate::new().depth_bounds(2000.0, 1000.0));
        assert!(result.is_err());
        let settings = control.snapshot();
        assert_eq!((settings.min_depth, settings.max_depth), (1000.0, 1400.0));
    }

    #[test]
    fn test_degenerate_range_rejected() {
        let control = control();
        assert!(control
            .set_field(SettingField::MaxDepth, SettingValue::Number(1000.0))
            .is_err());
        assert_eq!(control.snapshot().max_depth, 1400.0);
    }

    #[test]
    fn test_valid_field_applied() {
        let control = control();
        control
            .set_field(SettingField::Colormap, SettingValue::Colormap(Colormap::Hot))
            .unwrap();
        assert_eq!(control.snapshot().colormap, Colormap::Hot);
    }

    #[test]
    fn test_empty_update_is_noop() {
        let control = control();
        let before = control.snapshot();
        assert_eq!(control.apply(&SettingsUpdate::new()).unwrap(), before);
    }

    #[test]
    fn test_reset_request_visible() {
        let control = control();
        assert!(!control.reset_pending());
        control.request_reset();
        assert!(control.reset_pending());
    }
}
