//! Colormap lookup tables
//!
//! Every colormap is an analytic function of `t` in `[0, 1]`, sampled into a
//! 256-entry table once per [`apply_colormap`] call.

use super::{ColorRaster, Gray8, Rgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selectable colormaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Colormap {
    Autumn,
    Bone,
    Cool,
    Gray,
    Hot,
    Hsv,
    #[default]
    Jet,
    Spring,
    Summer,
    Turbo,
    Winter,
}

impl Colormap {
    pub const ALL: [Colormap; 11] = [
        Colormap::Autumn,
        Colormap::Bone,
        Colormap::Cool,
        Colormap::Gray,
        Colormap::Hot,
        Colormap::Hsv,
        Colormap::Jet,
        Colormap::Spring,
        Colormap::Summer,
        Colormap::Turbo,
        Colormap::Winter,
    ];

    /// Upper-case identifier, as stored in config files
    pub fn name(self) -> &'static str {
        match self {
            Colormap::Autumn => "AUTUMN",
            Colormap::Bone => "BONE",
            Colormap::Cool => "COOL",
            Colormap::Gray => "GRAY",
            Colormap::Hot => "HOT",
            Colormap::Hsv => "HSV",
            Colormap::Jet => "JET",
            Colormap::Spring => "SPRING",
            Colormap::Summer => "SUMMER",
            Colormap::Turbo => "TURBO",
            Colormap::Winter => "WINTER",
        }
    }

    /// Color for `t` in `[0, 1]`
    pub fn sample(self, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let [r, g, b] = match self {
            Colormap::Autumn => [1.0, t, 0.0],
            Colormap::Bone => {
                let [hr, hg, hb] = hot(t);
                [(7.0 * t + hb) / 8.0, (7.0 * t + hg) / 8.0, (7.0 * t + hr) / 8.0]
            }
            Colormap::Cool => [t, 1.0 - t, 1.0],
            Colormap::Gray => [t, t, t],
            Colormap::Hot => hot(t),
            Colormap::Hsv => hsv(t),
            Colormap::Jet => [
                unit(1.5 - (4.0 * t - 3.0).abs()),
                unit(1.5 - (4.0 * t - 2.0).abs()),
                unit(1.5 - (4.0 * t - 1.0).abs()),
            ],
            Colormap::Spring => [1.0, t, 1.0 - t],
            Colormap::Summer => [t, 0.5 + 0.5 * t, 0.4],
            Colormap::Turbo => turbo(t),
            Colormap::Winter => [0.0, t, 1.0 - 0.5 * t],
        };
        [to_byte(r), to_byte(g), to_byte(b)]
    }

    /// 256-entry lookup table indexed by 8-bit intensity
    pub fn lut(self) -> [Rgb; 256] {
        let mut table = [[0u8; 3]; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = self.sample(i as f32 / 255.0);
        }
        table
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Colormap {
    type Err = String;

    /// Accepts `jet`, `JET` and `COLORMAP_JET`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("COLORMAP_").unwrap_or(&upper);
        Colormap::ALL
            .iter()
            .copied()
            .find(|c| c.name() == name)
            .ok_or_else(|| format!("unknown colormap '{}'", s))
    }
}

#[inline]
fn unit(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

#[inline]
fn to_byte(v: f32) -> u8 {
    (unit(v) * 255.0).round() as u8
}

fn hot(t: f32) -> [f32; 3] {
    [unit(3.0 * t), unit(3.0 * t - 1.0), unit(3.0 * t - 2.0)]
}

fn hsv(t: f32) -> [f32; 3] {
    let h = t * 6.0;
    let f = h - h.floor();
    match h.floor() as u32 % 6 {
        0 => [1.0, f, 0.0],
        1 => [1.0 - f, 1.0, 0.0],
        2 => [0.0, 1.0, f],
        3 => [0.0, 1.0 - f, 1.0],
        4 => [f, 0.0, 1.0],
        _ => [1.0, 0.0, 1.0 - f],
    }
}

/// Polynomial fit of the Turbo rainbow map
fn turbo(t: f32) -> [f32; 3] {
    let r = 0.13572138
        + t * (4.6153926 + t * (-42.66032 + t * (132.13108 + t * (-152.54825 + t * 59.28144))));
    let g = 0.09140261
        + t * (2.19418 + t * (4.84296 + t * (-14.18503 + t * (4.27805 + t * 2.53377))));
    let b = 0.1066733
        + t * (12.64194 + t * (-60.58204 + t * (109.99648 + t * (-82.52904 + t * 20.43388))));
    [r, g, b]
}

/// Map an 8-bit raster through a colormap
pub fn apply_colormap(raster: &Gray8, colormap: Colormap) -> ColorRaster {
    let table = colormap.lut();
    raster.map(|v| table[v as usize])
}
