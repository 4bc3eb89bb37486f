//! Frontend module for the operator UI using egui
//!
//! This module implements the control window and the projector output using
//! the eframe/egui framework. It runs on the main thread and never touches
//! the render loop directly: every read and write goes through the
//! [`ControlSurface`].
//!
//! # Layout
//!
//! - **Side panel**: settings sliders, colormap picker, Apply / Reset / Save
//! - **Central panel**: composite and color camera previews
//! - **Bottom bar**: frame statistics and the last message
//! - **Projector viewport**: a second (usually fullscreen) window showing the
//!   latest composite. Closing it stops the render loop.

pub mod controls;
pub mod preview;
pub mod status_bar;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use egui::{Color32, Vec2};

use crate::config::{DisplayConfig, PipelineSettings, SettingsUpdate};
use crate::control::ControlSurface;
use crate::error::{Result, SandboxError};
use crate::presentation::{save_color_png, PresentationSurface, ProjectorWindow};

pub use controls::{render_controls, AppAction, SliderSpec, SLIDERS};
pub use preview::{to_color_image, PreviewTexture};
pub use status_bar::{render_status_bar, StatusBarContext};

/// Size of each preview image in the control window
const PREVIEW_SIZE: Vec2 = Vec2::new(320.0, 240.0);

/// Main application state
pub struct SandboxApp {
    control: ControlSurface,
    projector: ProjectorWindow,
    running: Arc<AtomicBool>,
    sensor_description: String,

    /// Settings being edited, committed on Apply
    draft: PipelineSettings,

    composite_preview: PreviewTexture,
    color_preview: PreviewTexture,
    projector_texture: PreviewTexture,
    preview_refresh: Duration,
    last_preview: Option<Instant>,

    last_message: Option<(String, bool)>,
}

impl SandboxApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        control: ControlSurface,
        projector: ProjectorWindow,
        running: Arc<AtomicBool>,
        sensor_description: String,
        display: &DisplayConfig,
    ) -> Self {
        let draft = control.snapshot();
        Self {
            control,
            projector,
            running,
            sensor_description,
            draft,
            composite_preview: PreviewTexture::new("composite_preview"),
            color_preview: PreviewTexture::new("color_preview"),
            projector_texture: PreviewTexture::new("projector_output"),
            preview_refresh: Duration::from_millis(display.preview_refresh_ms),
            last_preview: None,
            last_message: None,
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            AppAction::Apply => {
                let mut update = SettingsUpdate::from_settings(&self.draft);
                // Leave a pending reset request alone.
                update.reset_image = None;
                match self.control.apply(&update) {
                    Ok(applied) => {
                        self.draft = applied;
                        self.set_message("Settings applied", false);
                    }
                    Err(e) => self.set_message(format!("Rejected: {}", e), true),
                }
            }
            AppAction::Revert => {
                self.draft = self.control.snapshot();
                self.set_message("Reverted to live settings", false);
            }
            AppAction::ResetImage => {
                self.control.request_reset();
                self.set_message("Image reset requested", false);
            }
            AppAction::SaveSnapshot(path) => match self.save_snapshot(&path) {
                Ok(()) => self.set_message(format!("Saved {}", path.display()), false),
                Err(e) => {
                    tracing::warn!("Snapshot failed: {}", e);
                    self.set_message(format!("Snapshot failed: {}", e), true);
                }
            },
        }
    }

    fn save_snapshot(&self, path: &Path) -> Result<()> {
        let display = self.control.display();
        let composite = display
            .composite
            .ok_or_else(|| SandboxError::Presentation("No frame rendered yet".to_string()))?;
        save_color_png(path, &composite)
    }

    fn set_message(&mut self, message: impl Into<String>, is_error: bool) {
        self.last_message = Some((message.into(), is_error));
    }

    fn refresh_previews(&mut self, ctx: &egui::Context) {
        if self
            .last_preview
            .is_some_and(|at| at.elapsed() < self.preview_refresh)
        {
            return;
        }
        let display = self.control.display();
        self.composite_preview
            .update(ctx, display.composite.as_deref(), display.generation);
        self.color_preview
            .update(ctx, display.color.as_deref(), display.color_generation);
        self.last_preview = Some(Instant::now());
    }

    fn show_projector(&mut self, ctx: &egui::Context) {
        let (image, generation) = self.projector.latest();
        self.projector_texture.update(ctx, Some(&image), generation);

        let builder = egui::ViewportBuilder::default()
            .with_title(self.projector.name())
            .with_inner_size([image.width() as f32, image.height() as f32])
            .with_fullscreen(self.projector.is_fullscreen());

        let texture = &self.projector_texture;
        let projector = &self.projector;
        let running = &self.running;
        ctx.show_viewport_immediate(
            egui::ViewportId::from_hash_of("projector_viewport"),
            builder,
            |ctx, _class| {
                egui::CentralPanel::default()
                    .frame(egui::Frame::NONE.fill(Color32::BLACK))
                    .show(ctx, |ui| {
                        let size = ui.available_size();
                        texture.show(ui, size, Color32::BLACK);
                    });

                if ctx.input(|i| i.viewport().close_requested()) {
                    projector.close();
                    running.store(false, Ordering::SeqCst);
                }
            },
        );
    }
}

impl eframe::App for SandboxApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let running = self.running.load(Ordering::SeqCst);

        self.refresh_previews(ctx);
        if running && self.projector.is_active() {
            self.show_projector(ctx);
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(self.preview_refresh);
        }

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            let stats = self.control.stats();
            render_status_bar(
                ui,
                &StatusBarContext {
                    sensor: &self.sensor_description,
                    stats: &stats,
                    running,
                    reset_pending: self.control.reset_pending(),
                    message: self
                        .last_message
                        .as_ref()
                        .map(|(m, is_error)| (m.as_str(), *is_error)),
                },
            );
        });

        let mut actions = Vec::new();
        egui::SidePanel::left("controls_panel")
            .resizable(false)
            .min_width(280.0)
            .show(ctx, |ui| {
                render_controls(ui, &mut self.draft, &mut actions);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                ui.vertical(|ui| {
                    ui.label("Projector output");
                    self.composite_preview
                        .show(ui, PREVIEW_SIZE, Color32::from_gray(80));
                });
                ui.vertical(|ui| {
                    ui.label("Color camera");
                    self.color_preview
                        .show(ui, PREVIEW_SIZE, Color32::from_gray(120));
                });
            });
        });

        for action in actions {
            self.handle_action(action);
        }
    }
}
