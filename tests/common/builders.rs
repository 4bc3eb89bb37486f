//! Test data builders for depth rasters and pipeline settings

use arsandbox_rs::config::PipelineSettings;
use arsandbox_rs::raster::{DepthRaster, Raster};

/// Builder for creating test depth rasters
pub struct DepthRasterBuilder {
    width: usize,
    height: usize,
    fill: f32,
    cells: Vec<(usize, usize, f32)>,
}

impl DepthRasterBuilder {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            fill: 1000.0,
            cells: Vec::new(),
        }
    }

    /// Value of every cell not set explicitly
    pub fn fill(mut self, depth: f32) -> Self {
        self.fill = depth;
        self
    }

    pub fn cell(mut self, x: usize, y: usize, depth: f32) -> Self {
        self.cells.push((x, y, depth));
        self
    }

    /// Mark a cell as a sensor dropout
    pub fn dropout(self, x: usize, y: usize) -> Self {
        self.cell(x, y, 0.0)
    }

    /// Fill a rectangle `[x0, x1) x [y0, y1)` with `depth`
    pub fn block(mut self, x0: usize, y0: usize, x1: usize, y1: usize, depth: f32) -> Self {
        for y in y0..y1 {
            for x in x0..x1 {
                self.cells.push((x, y, depth));
            }
        }
        self
    }

    pub fn build(self) -> DepthRaster {
        let mut raster = Raster::filled(self.width, self.height, self.fill);
        for (x, y, depth) in self.cells {
            raster.set(x, y, depth);
        }
        raster
    }
}

/// Linear ramp from `near` at the left edge to `far` at the right edge
pub fn depth_ramp(width: usize, height: usize, near: f32, far: f32) -> DepthRaster {
    let span = (width.max(2) - 1) as f32;
    Raster::from_fn(width, height, |x, _| near + (far - near) * x as f32 / span)
}

/// Builder for creating test pipeline settings
pub struct SettingsBuilder {
    settings: PipelineSettings,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: PipelineSettings::default(),
        }
    }

    pub fn depth_bounds(mut self, min: f32, max: f32) -> Self {
        self.settings.min_depth = min;
        self.settings.max_depth = max;
        self
    }

    pub fn thresholds(mut self, errors: f32, medium: f32, big: f32) -> Self {
        self.settings.errors_threshold = errors;
        self.settings.medium_noise_threshold = medium;
        self.settings.big_noise_threshold = big;
        self
    }

    pub fn contour_step(mut self, step: u32) -> Self {
        self.settings.contour_step = step;
        self
    }

    pub fn reset(mut self) -> Self {
        self.settings.reset_image = true;
        self
    }

    pub fn build(self) -> PipelineSettings {
        self.settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_raster_builder() {
        let raster = DepthRasterBuilder::new(4, 3)
            .fill(1200.0)
            .dropout(1, 1)
            .cell(3, 2, 900.0)
            .build();

        assert_eq!(raster.dimensions(), (4, 3));
        assert_eq!(raster.get(0, 0), 1200.0);
        assert_eq!(raster.get(1, 1), 0.0);
        assert_eq!(raster.get(3, 2), 900.0);
    }

    #[test]
    fn test_settings_builder_is_valid() {
        let settings = SettingsBuilder::new()
            .depth_bounds(600.0, 2000.0)
            .thresholds(2.0, 8.0, 20.0)
            .build();
        assert!(settings.validate().is_ok());
        assert!(!settings.reset_image);
    }
}
