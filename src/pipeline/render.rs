//! Display transform and contour rendering
//!
//! The stable depth raster is warped into projector space, normalized into
//! 8 bits, inverted and colormapped. Iso-depth contours are traced on a
//! blurred copy of the 8-bit raster and drawn in black on top.

use crate::config::{PipelineSettings, ProjectorCalibration, RenderConfig};
use crate::error::{Result, ResultExt};
use crate::raster::{
    apply_colormap, contour_area, draw_contours, gaussian_blur, invert_8bit, narrow_to_u8,
    normalize_to_range, simplify_polygon, threshold_bands, trace_contours, warp_with_inverse,
    ColorRaster, Contour, DepthRaster, Gray8, Homography, Rgb,
};

/// Contour stroke color
pub const CONTOUR_COLOR: Rgb = [0, 0, 0];

/// 8-bit rasters derived from one stable frame
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRaster {
    /// Normalized depth, `0` at `min_depth` and `255` at `max_depth`
    pub gray: Gray8,
    /// Blurred copy used only for contour extraction
    pub blurred: Gray8,
}

/// Output of one render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub composite: ColorRaster,
    pub contour_count: usize,
}

/// Contour/render stage
#[derive(Debug, Clone)]
pub struct ContourRenderer {
    config: RenderConfig,
    /// Inverse of the projector homography, output pixel to depth pixel
    projector_inverse: Option<Homography>,
    output_size: Option<(usize, usize)>,
}

impl ContourRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            projector_inverse: None,
            output_size: None,
        }
    }

    /// Use the projector calibration as the display focus warp
    pub fn with_projector(mut self, calibration: &ProjectorCalibration) -> Self {
        self.projector_inverse = calibration
            .homography
            .filter(|h| !h.is_identity())
            .and_then(|h| match h.inverse() {
                Ok(inverse) => Some(inverse),
                Err(e) => {
                    tracing::warn!("Ignoring projector homography: {}", e);
                    None
                }
            });
        self.output_size = match (calibration.output_width, calibration.output_height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        };
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Warp, normalize, narrow and blur a stable raster
    ///
    /// Works on copies; `stable` is never modified.
    pub fn display_transform(
        &self,
        stable: &DepthRaster,
        settings: &PipelineSettings,
    ) -> Result<DisplayRaster> {
        let (width, height) = self.output_size.unwrap_or(stable.dimensions());
        let warped = self
            .projector_inverse
            .as_ref()
            .map(|inverse| warp_with_inverse(stable, inverse, width, height));
        let source = warped.as_ref().unwrap_or(stable);

        let normalized =
            normalize_to_range(source, settings.min_depth, settings.max_depth, 0.0, 255.0)
                .context("Normalizing depth for display")?;
        let gray = narrow_to_u8(&normalized);
        let blurred =
            gaussian_blur(&gray, self.config.blur_kernel, None).context("Blurring display raster")?;
        Ok(DisplayRaster { gray, blurred })
    }

    /// Trace, filter and simplify iso-band contours, lowest band first
    pub fn extract_contours(&self, blurred: &Gray8, contour_step: u32) -> Result<Vec<Contour>> {
        let bands =
            threshold_bands(blurred, contour_step as f32).context("Splitting iso-depth bands")?;
        let mut contours = Vec::new();
        for band in &bands {
            contours.extend(
                trace_contours(band)
                    .into_iter()
                    .filter(|c| contour_area(&c.points) >= self.config.min_contour_area)
                    .map(|c| simplify_polygon(&c, self.config.epsilon_factor)),
            );
        }
        Ok(contours)
    }

    /// Invert, colormap and draw `contours` over `gray`
    pub fn compose(&self, gray: &Gray8, contours: &[Contour], settings: &PipelineSettings) -> ColorRaster {
        let mut composite = apply_colormap(&invert_8bit(gray), settings.colormap);
        draw_contours(
            &mut composite,
            contours,
            CONTOUR_COLOR,
            self.config.contour_thickness,
        );
        composite
    }

    /// Full display path for one stable raster
    pub fn render(&self, stable: &DepthRaster, settings: &PipelineSettings) -> Result<RenderedFrame> {
        let display = self.display_transform(stable, settings)?;
        let contours = self.extract_contours(&display.blurred, settings.contour_step)?;
        let composite = self.compose(&display.gray, &contours, settings);
        Ok(RenderedFrame {
            composite,
            contour_count: contours.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Colormap, Raster};

    fn renderer() -> ContourRenderer {
        ContourRenderer::new(RenderConfig {
            blur_kernel: 1,
            min_contour_area: 4.0,
            epsilon_factor: 0.001,
            contour_thickness: 1,
        })
    }

    fn settings() -> PipelineSettings {
        let mut s = PipelineSettings::with_depth_bounds(1000.0, 2000.0);
        s.contour_step = 64;
        s
    }

    /// Left half near (1000 mm), right half far (2000 mm)
    fn step_raster() -> DepthRaster {
        Raster::from_fn(16, 16, |x, _| if x < 8 { 1000.0 } else { 2000.0 })
    }

    #[test]
    fn test_display_transform_normalizes() {
        let display = renderer()
            .display_transform(&step_raster(), &settings())
            .unwrap();
        assert_eq!(display.gray.get(0, 0), 0);
        assert_eq!(display.gray.get(15, 15), 255);
    }

    #[test]
    fn test_blur_does_not_touch_stable_raster() {
        let stable = step_raster();
        let copy = stable.clone();
        let mut r = renderer();
        r.config.blur_kernel = 5;
        r.render(&stable, &settings()).unwrap();
        assert_eq!(stable, copy);
    }

    #[test]
    fn test_flat_raster_has_no_contours() {
        let flat = Raster::filled(10, 10, 1500.0);
        let frame = renderer().render(&flat, &settings()).unwrap();
        assert_eq!(frame.contour_count, 0);
        let expected = Colormap::Jet.sample((255 - 128) as f32 / 255.0);
        assert_eq!(frame.composite.get(5, 5), expected);
    }

    #[test]
    fn test_contours_are_drawn_black() {
        let frame = renderer().render(&step_raster(), &settings()).unwrap();
        assert!(frame.contour_count >= 1);
        assert!(frame.composite.data().contains(&CONTOUR_COLOR));
    }

    #[test]
    fn test_small_contours_filtered() {
        let mut stable = Raster::filled(12, 12, 2000.0);
        stable.set(6, 6, 1000.0);
        let display = renderer().display_transform(&stable, &settings()).unwrap();
        let contours = renderer().extract_contours(&display.blurred, 64).unwrap();
        // The single near pixel and the far plane with a one-pixel hole.
        assert!(contours.iter().all(|c| contour_area(&c.points) >= 4.0));
    }

    #[test]
    fn test_projector_warp_sets_output_size() {
        let calibration = ProjectorCalibration {
            homography: Some(Homography::from_rows([
                [2.0, 0.0, 0.0],
                [0.0, 2.0, 0.0],
                [0.0, 0.0, 1.0],
            ])),
            output_width: Some(32),
            output_height: Some(32),
        };
        let r = renderer().with_projector(&calibration);
        let frame = r.render(&step_raster(), &settings()).unwrap();
        assert_eq!(frame.composite.dimensions(), (32, 32));
    }

    #[test]
    fn test_singular_projector_homography_is_skipped() {
        let calibration = ProjectorCalibration {
            homography: Some(Homography::from_rows([
                [1.0, 2.0, 0.0],
                [2.0, 4.0, 0.0],
                [0.0, 0.0, 1.0],
            ])),
            output_width: None,
            output_height: None,
        };
        let stable = step_raster();
        let r = renderer().with_projector(&calibration);
        let warped = r.display_transform(&stable, &settings()).unwrap();
        let plain = renderer().display_transform(&stable, &settings()).unwrap();
        assert_eq!(warped, plain);
    }
}
