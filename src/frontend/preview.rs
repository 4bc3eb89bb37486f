//! Texture-backed previews of color rasters.
//!
//! Uploads only when the source generation changes, so a preview refreshed
//! at 10 Hz costs nothing while the render loop is idle.

use egui::{Color32, ColorImage, TextureHandle, TextureOptions, Ui, Vec2};

use crate::raster::ColorRaster;

/// Convert a raster into an egui image
pub fn to_color_image(raster: &ColorRaster) -> ColorImage {
    ColorImage::from_rgb([raster.width(), raster.height()], &raster.to_rgb_bytes())
}

/// A lazily uploaded texture tracking one image source
pub struct PreviewTexture {
    name: &'static str,
    texture: Option<TextureHandle>,
    generation: Option<u64>,
}

impl PreviewTexture {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            texture: None,
            generation: None,
        }
    }

    /// Upload `image` if `generation` differs from the one shown
    pub fn update(&mut self, ctx: &egui::Context, image: Option<&ColorRaster>, generation: u64) {
        let Some(image) = image else {
            return;
        };
        if self.generation == Some(generation) {
            return;
        }
        let color_image = to_color_image(image);
        match &mut self.texture {
            Some(texture) => texture.set(color_image, TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture(self.name, color_image, TextureOptions::LINEAR))
            }
        }
        self.generation = Some(generation);
    }

    pub fn has_image(&self) -> bool {
        self.texture.is_some()
    }

    /// Draw the texture scaled into `size`, or a gray placeholder
    pub fn show(&self, ui: &mut Ui, size: Vec2, placeholder: Color32) {
        match &self.texture {
            Some(texture) => {
                ui.add(egui::Image::new(texture).fit_to_exact_size(size));
            }
            None => {
                let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
                ui.painter().rect_filled(rect, 0.0, placeholder);
            }
        }
    }
}
