//! Depth stabilization and rendering pipeline.
//!
//! Each frame flows through two stages, with settings read from the shared
//! store once at the start of the frame:
//!
//! ```text
//! raw depth ──► [Stabilizer] ──► stable depth ──► [ContourRenderer] ──► composite
//!                    ▲  │                                                  │
//!                    └──┘ PipelineState                                    ▼
//!                                                        [SharedStore] ◄── display
//! ```
//!
//! # Design
//!
//! - **Owned history**: the previous stable raster lives in `PipelineState`,
//!   owned by the render loop and never shared.
//! - **Copy-out display**: only finished composites cross into the store.
//! - **One lock**: settings and display share a single mutex so a snapshot
//!   is never torn.

pub mod render;
pub mod stabilizer;
pub mod store;

pub use render::{ContourRenderer, DisplayRaster, RenderedFrame, CONTOUR_COLOR};
pub use stabilizer::{
    classify_noise, NoiseTiers, PipelineState, Stabilizer, BIG_NOISE_WEIGHT, MEDIUM_NOISE_WEIGHT,
};
pub use store::{DisplayState, SettingsSnapshot, SharedStore};
