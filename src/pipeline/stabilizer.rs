//! Temporal depth stabilization
//!
//! Turns each raw depth frame into a stable one by repairing dropouts,
//! holding the previous value around out-of-range regions and damping
//! frame-to-frame changes in three tiers:
//!
//! | change `d = |new - prev|`        | result                   |
//! |----------------------------------|--------------------------|
//! | `d < errors`                     | previous value           |
//! | `errors <= d <= medium`          | 90% previous, 10% new    |
//! | `medium <= d <= big`             | 50% previous, 50% new    |
//! | `d > big`                        | new value                |
//!
//! All three tier masks are computed from the same two rasters and each
//! excludes the cells claimed by the earlier tiers.

use crate::config::{PipelineSettings, StabilizerConfig};
use crate::error::{Result, ResultExt};
use crate::raster::{
    blend, clip, dilate, range_mask, remove_invalid, select, DepthRaster, Mask, Operand, Raster,
    RasterResult,
};

/// Weight of the new sample in the medium-noise tier
pub const MEDIUM_NOISE_WEIGHT: f32 = 0.1;

/// Weight of the new sample in the big-noise tier
pub const BIG_NOISE_WEIGHT: f32 = 0.5;

/// State carried from one frame to the next
#[derive(Debug, Default)]
pub struct PipelineState {
    previous: Option<DepthRaster>,
    frames_since_reset: u64,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last committed stable raster
    pub fn previous(&self) -> Option<&DepthRaster> {
        self.previous.as_ref()
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    pub fn frames_since_reset(&self) -> u64 {
        self.frames_since_reset
    }

    /// Forget the temporal history
    pub fn reset(&mut self) {
        self.previous = None;
        self.frames_since_reset = 0;
    }

    fn commit(&mut self, stable: DepthRaster) {
        self.previous = Some(stable);
        self.frames_since_reset += 1;
    }
}

/// Cells claimed by each smoothing tier
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseTiers {
    pub errors: Mask,
    pub medium: Mask,
    pub big: Mask,
}

/// Classify every cell outside `reject` by how far `current` moved from
/// `previous`
pub fn classify_noise(
    current: &DepthRaster,
    previous: &DepthRaster,
    reject: &Mask,
    settings: &PipelineSettings,
) -> RasterResult<NoiseTiers> {
    current.ensure_same_shape(previous)?;
    current.ensure_same_shape(reject)?;

    let (width, height) = current.dimensions();
    let mut errors = Raster::filled(width, height, false);
    let mut medium = Raster::filled(width, height, false);
    let mut big = Raster::filled(width, height, false);

    let e = settings.errors_threshold;
    let m = settings.medium_noise_threshold;
    let b = settings.big_noise_threshold;

    for (i, ((&new, &prev), &rejected)) in current
        .data()
        .iter()
        .zip(previous.data())
        .zip(reject.data())
        .enumerate()
    {
        if rejected {
            continue;
        }
        let d = (new - prev).abs();
        if d < e {
            errors.data_mut()[i] = true;
        } else if d <= m {
            medium.data_mut()[i] = true;
        } else if d <= b {
            big.data_mut()[i] = true;
        }
    }

    Ok(NoiseTiers { errors, medium, big })
}

/// Per-frame stabilization stage
#[derive(Debug, Clone)]
pub struct Stabilizer {
    config: StabilizerConfig,
}

impl Stabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Region whose samples are not trusted this frame
    pub fn reject_mask(&self, repaired: &DepthRaster, settings: &PipelineSettings) -> Mask {
        let out_of_range = range_mask(repaired, settings.min_depth, settings.max_depth);
        dilate(
            &out_of_range,
            self.config.dilation_radius,
            self.config.dilation_iterations,
        )
    }

    /// Produce the next stable raster from `raw` and commit it to `state`
    ///
    /// `state` is left untouched when an error is returned, unless
    /// `settings.reset_image` asked for the history to be dropped.
    pub fn stabilize(
        &self,
        state: &mut PipelineState,
        raw: &DepthRaster,
        settings: &PipelineSettings,
    ) -> Result<DepthRaster> {
        if settings.reset_image {
            tracing::info!(
                "Resetting stabilization baseline after {} frames",
                state.frames_since_reset()
            );
            state.reset();
        }

        let repaired =
            remove_invalid(raw, self.config.inpaint_radius).context("Repairing depth dropouts")?;
        let reject = self.reject_mask(&repaired, settings);

        let previous = match state.previous() {
            Some(prev) if prev.dimensions() == repaired.dimensions() => Some(prev),
            Some(prev) => {
                tracing::warn!(
                    "Frame size changed from {:?} to {:?}, dropping history",
                    prev.dimensions(),
                    repaired.dimensions()
                );
                None
            }
            None => None,
        };

        let stable = match previous {
            Some(prev) => smooth(&repaired, prev, &reject, settings),
            None => {
                let clamped = clip(&repaired, settings.min_depth, settings.max_depth)?;
                select(&reject, Operand::Raster(&clamped), Operand::Raster(&repaired))
            }
        }
        .context("Stabilizing depth frame")?;

        state.commit(stable.clone());
        Ok(stable)
    }
}

fn smooth(
    current: &DepthRaster,
    previous: &DepthRaster,
    reject: &Mask,
    settings: &PipelineSettings,
) -> RasterResult<DepthRaster> {
    let tiers = classify_noise(current, previous, reject, settings)?;
    let held = select(reject, Operand::Raster(previous), Operand::Raster(current))?;
    let medium = blend(current, previous, MEDIUM_NOISE_WEIGHT)?;
    let big = blend(current, previous, BIG_NOISE_WEIGHT)?;

    let out = select(&tiers.errors, Operand::Raster(previous), Operand::Raster(&held))?;
    let out = select(&tiers.medium, Operand::Raster(&medium), Operand::Raster(&out))?;
    select(&tiers.big, Operand::Raster(&big), Operand::Raster(&out))
}
