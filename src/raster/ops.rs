//! Elementwise raster operations
//!
//! Range masks, blending, conditional selection, clipping, normalization,
//! narrowing to 8 bits, inversion and iso-band extraction.

use super::{Gray8, Mask, Raster, RasterError, RasterResult, Sample};
use rayon::prelude::*;

/// Either side of a [`select`]: a constant or a per-sample raster
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a, T> {
    Scalar(T),
    Raster(&'a Raster<T>),
}

impl<T: Copy> Operand<'_, T> {
    #[inline]
    fn at(&self, index: usize) -> T {
        match self {
            Operand::Scalar(v) => *v,
            Operand::Raster(r) => r.data()[index],
        }
    }

    fn check_shape<U: Copy>(&self, mask: &Raster<U>) -> RasterResult<()> {
        match self {
            Operand::Scalar(_) => Ok(()),
            Operand::Raster(r) => mask.ensure_same_shape(r),
        }
    }
}

/// `true` where the sample lies strictly outside `[min, max]`
///
/// Non-finite samples are always reported as out of range.
pub fn range_mask<T: Sample>(raster: &Raster<T>, min: f32, max: f32) -> Mask {
    raster.map(|v| {
        let v = v.to_f32();
        !v.is_finite() || v < min || v > max
    })
}

/// Elementwise `a * weight_a + b * (1 - weight_a)`
///
/// Evaluated as `b + (a - b) * weight_a`, so equal inputs come back unchanged
/// bit for bit whatever the weight.
pub fn blend(a: &Raster<f32>, b: &Raster<f32>, weight_a: f32) -> RasterResult<Raster<f32>> {
    a.ensure_same_shape(b)?;
    let data: Vec<f32> = a
        .data()
        .par_iter()
        .zip(b.data().par_iter())
        .map(|(&a, &b)| b + (a - b) * weight_a)
        .collect();
    Raster::from_vec(a.width(), a.height(), data)
}

/// Elementwise choice between two operands driven by `condition`
pub fn select<T: Copy + Send + Sync>(
    condition: &Mask,
    if_true: Operand<'_, T>,
    if_false: Operand<'_, T>,
) -> RasterResult<Raster<T>> {
    if_true.check_shape(condition)?;
    if_false.check_shape(condition)?;
    let data: Vec<T> = condition
        .data()
        .par_iter()
        .enumerate()
        .map(|(i, &c)| if c { if_true.at(i) } else { if_false.at(i) })
        .collect();
    Raster::from_vec(condition.width(), condition.height(), data)
}

/// Clamp every sample into `[low, high]`
pub fn clip(raster: &Raster<f32>, low: f32, high: f32) -> RasterResult<Raster<f32>> {
    if low > high || low.is_nan() || high.is_nan() {
        return Err(RasterError::InvalidArgument(format!(
            "clip bounds out of order: [{}, {}]",
            low, high
        )));
    }
    Ok(raster.map(|v| v.clamp(low, high)))
}

/// Affine remap of `[low, high]` onto `[out_low, out_high]`
///
/// Samples outside the input range map outside the output range; pair with
/// [`narrow_to_u8`] to saturate. A zero-width input range is rejected.
pub fn normalize_to_range<T: Sample>(
    raster: &Raster<T>,
    low: f32,
    high: f32,
    out_low: f32,
    out_high: f32,
) -> RasterResult<Raster<f32>> {
    if low == high || !low.is_finite() || !high.is_finite() {
        return Err(RasterError::DegenerateRange { low, high });
    }
    let span = high - low;
    let out_span = out_high - out_low;
    let data: Vec<f32> = raster
        .data()
        .par_iter()
        .map(|&v| (v.to_f32() - low) / span * out_span + out_low)
        .collect();
    Raster::from_vec(raster.width(), raster.height(), data)
}

/// Round and saturate to 8 bits
pub fn narrow_to_u8<T: Sample>(raster: &Raster<T>) -> Gray8 {
    raster.map(|v| u8::from_f32(v.to_f32()))
}

/// `255 - x` after coercing each sample to 8 bits
pub fn invert_8bit<T: Sample>(raster: &Raster<T>) -> Gray8 {
    raster.map(|v| 255 - u8::from_f32(v.to_f32()))
}

/// Split `[min, max)` of the raster into contiguous bands of width `step`
///
/// Band `i` covers `[min + i*step, min + (i+1)*step)`. Produces
/// `ceil((max - min) / step)` masks in ascending order, or none for a flat
/// raster.
pub fn threshold_bands<T: Sample>(raster: &Raster<T>, step: f32) -> RasterResult<Vec<Mask>> {
    if step <= 0.0 || !step.is_finite() {
        return Err(RasterError::InvalidArgument(format!(
            "band step must be positive, got {}",
            step
        )));
    }
    let Some((lo, hi)) = raster.min_max() else {
        return Ok(Vec::new());
    };
    let (lo, hi) = (lo.to_f32(), hi.to_f32());
    if hi <= lo {
        return Ok(Vec::new());
    }

    let count = ((hi - lo) / step).ceil() as usize;
    let bands = (0..count)
        .map(|i| {
            let band_lo = lo + i as f32 * step;
            let band_hi = lo + (i + 1) as f32 * step;
            raster.map(|v| {
                let v = v.to_f32();
                v >= band_lo && v < band_hi
            })
        })
        .collect();
    Ok(bands)
}
