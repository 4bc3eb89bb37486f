//! Status bar panel - bottom bar showing sensor, frame stats, and messages.

use egui::{Color32, RichText, Ui};

use crate::backend::FrameStats;

/// Context needed to render the status bar.
pub struct StatusBarContext<'a> {
    pub sensor: &'a str,
    pub stats: &'a FrameStats,
    pub running: bool,
    pub reset_pending: bool,
    /// Last operator-facing message and whether it is an error
    pub message: Option<(&'a str, bool)>,
}

/// Render the status bar.
pub fn render_status_bar(ui: &mut Ui, ctx: &StatusBarContext<'_>) {
    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        let (status_color, status_text) = if ctx.running {
            (Color32::GREEN, "Running")
        } else {
            (Color32::GRAY, "Stopped")
        };
        ui.colored_label(status_color, "●");
        ui.label(RichText::new(format!("{}: {}", status_text, ctx.sensor)).small());

        ui.separator();

        let stats = ctx.stats;
        ui.label(RichText::new(format!("Frames: {}", stats.frames_rendered)).small());

        ui.separator();

        let dropped_color = if stats.frames_dropped > 0 {
            Color32::LIGHT_RED
        } else {
            Color32::GRAY
        };
        ui.colored_label(
            dropped_color,
            RichText::new(format!("Dropped: {}", stats.frames_dropped)).small(),
        );

        ui.separator();

        ui.label(
            RichText::new(format!("Avg: {:.1} ms", stats.avg_frame_time_us() / 1000.0)).small(),
        );

        ui.separator();

        ui.label(RichText::new(format!("Contours: {}", stats.last_contour_count)).small());

        if ctx.reset_pending {
            ui.separator();
            ui.colored_label(Color32::YELLOW, RichText::new("Reset pending").small());
        }

        if let Some((message, is_error)) = ctx.message {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let color = if is_error { Color32::RED } else { Color32::GRAY };
                ui.colored_label(color, RichText::new(message).small());
            });
        }
    });
}
