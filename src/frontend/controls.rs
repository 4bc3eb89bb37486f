//! Control panel - sliders, colormap picker and action buttons.
//!
//! Edits go into a draft copy of the settings; nothing reaches the render
//! loop until the operator presses Apply.

use std::ops::RangeInclusive;
use std::path::PathBuf;

use egui::{Color32, RichText, Ui};

use crate::config::{PipelineSettings, SettingField, SettingValue};
use crate::raster::Colormap;

/// Actions requested from the control panel
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    /// Commit the draft settings
    Apply,
    /// Discard the draft and reload the live settings
    Revert,
    /// Drop the temporal history
    ResetImage,
    /// Save the latest composite to a PNG file
    SaveSnapshot(PathBuf),
}

/// Slider metadata for one numeric setting
pub struct SliderSpec {
    pub field: SettingField,
    pub label: &'static str,
    pub range: RangeInclusive<f32>,
    pub step: f64,
    pub suffix: &'static str,
}

/// Numeric settings in panel order
pub const SLIDERS: [SliderSpec; 6] = [
    SliderSpec {
        field: SettingField::MinDepth,
        label: "Min depth",
        range: 100.0..=4500.0,
        step: 1.0,
        suffix: " mm",
    },
    SliderSpec {
        field: SettingField::MaxDepth,
        label: "Max depth",
        range: 100.0..=4500.0,
        step: 1.0,
        suffix: " mm",
    },
    SliderSpec {
        field: SettingField::ContourStep,
        label: "Contour step",
        range: 1.0..=64.0,
        step: 1.0,
        suffix: "",
    },
    SliderSpec {
        field: SettingField::ErrorsThreshold,
        label: "Error threshold",
        range: 0.0..=100.0,
        step: 1.0,
        suffix: " mm",
    },
    SliderSpec {
        field: SettingField::MediumNoiseThreshold,
        label: "Medium noise",
        range: 0.0..=200.0,
        step: 1.0,
        suffix: " mm",
    },
    SliderSpec {
        field: SettingField::BigNoiseThreshold,
        label: "Big noise",
        range: 0.0..=500.0,
        step: 1.0,
        suffix: " mm",
    },
];

/// Render the control panel into `ui`, editing `draft`
pub fn render_controls(ui: &mut Ui, draft: &mut PipelineSettings, actions: &mut Vec<AppAction>) {
    ui.heading("Settings");
    ui.add_space(4.0);

    egui::Grid::new("settings_grid")
        .num_columns(2)
        .spacing([8.0, 6.0])
        .show(ui, |ui| {
            for spec in &SLIDERS {
                ui.label(spec.label);
                let mut value = draft.get(spec.field).as_number().unwrap_or(0.0);
                let slider = egui::Slider::new(&mut value, spec.range.clone())
                    .step_by(spec.step)
                    .suffix(spec.suffix);
                if ui.add(slider).changed() {
                    // Slider steps are whole numbers, so this only fails on a kind mismatch.
                    if let Err(e) = draft.set(spec.field, SettingValue::Number(value.round())) {
                        tracing::warn!("Slider write failed: {}", e);
                    }
                }
                ui.end_row();
            }

            ui.label("Colormap");
            egui::ComboBox::from_id_salt("settings_colormap")
                .selected_text(draft.colormap.name())
                .show_ui(ui, |ui| {
                    for colormap in Colormap::ALL {
                        ui.selectable_value(&mut draft.colormap, colormap, colormap.name());
                    }
                });
            ui.end_row();
        });

    if let Err(e) = draft.validate() {
        ui.add_space(4.0);
        ui.colored_label(Color32::LIGHT_RED, RichText::new(e.to_string()).small());
    }

    ui.add_space(8.0);
    ui.horizontal(|ui| {
        if ui
            .button("Apply")
            .on_hover_text("Send these settings to the render loop")
            .clicked()
        {
            actions.push(AppAction::Apply);
        }
        if ui
            .button("Revert")
            .on_hover_text("Discard edits and reload the live settings")
            .clicked()
        {
            actions.push(AppAction::Revert);
        }
    });

    ui.separator();

    if ui
        .button("Reset image")
        .on_hover_text("Forget the temporal history and rebuild from the next frame")
        .clicked()
    {
        actions.push(AppAction::ResetImage);
    }

    if ui
        .button("Save snapshot...")
        .on_hover_text("Save the current projector image as PNG")
        .clicked()
    {
        if let Some(path) = rfd::FileDialog::new()
            .set_title("Save Snapshot")
            .add_filter("PNG image", &["png"])
            .set_file_name(format!(
                "sandbox_{}.png",
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            ))
            .save_file()
        {
            actions.push(AppAction::SaveSnapshot(path));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slider_table_covers_numeric_fields() {
        let settings = PipelineSettings::default();
        for spec in &SLIDERS {
            assert!(settings.get(spec.field).as_number().is_some());
            assert!(spec.range.contains(&settings.get(spec.field).as_number().unwrap_or(-1.0)));
        }
    }

    #[test]
    fn test_slider_fields_unique() {
        for (i, a) in SLIDERS.iter().enumerate() {
            for b in &SLIDERS[i + 1..] {
                assert_ne!(a.field, b.field);
            }
        }
    }
}
