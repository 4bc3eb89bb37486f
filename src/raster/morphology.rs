//! Mask dilation
//!
//! Repeated dilation by a `(2r+1)²` square equals a single dilation by a
//! square of half-width `r * iterations`, and a square element separates
//! into a horizontal and a vertical pass. Each pass is a sliding window
//! answered from prefix counts, so cost does not grow with the radius.

use super::Mask;
use rayon::prelude::*;

/// Grow the `true` region of `mask` by `iterations` applications of a
/// `(2 * kernel_radius + 1)²` square structuring element
pub fn dilate(mask: &Mask, kernel_radius: usize, iterations: usize) -> Mask {
    let reach = kernel_radius.saturating_mul(iterations);
    if reach == 0 || mask.is_empty() {
        return mask.clone();
    }
    let (width, height) = mask.dimensions();

    let mut rows = mask.clone();
    rows.data_mut()
        .par_chunks_mut(width)
        .zip(mask.data().par_chunks(width))
        .for_each(|(out, src)| sliding_any(src, out, reach));

    let mut out = rows.clone();
    let mut column = vec![false; height];
    let mut column_out = vec![false; height];
    for x in 0..width {
        for y in 0..height {
            column[y] = rows.get(x, y);
        }
        sliding_any(&column, &mut column_out, reach);
        for y in 0..height {
            out.set(x, y, column_out[y]);
        }
    }
    out
}

/// `out[i] = any(src[i - reach ..= i + reach])`, clamped to the slice
fn sliding_any(src: &[bool], out: &mut [bool], reach: usize) {
    let len = src.len();
    let mut prefix = Vec::with_capacity(len + 1);
    prefix.push(0usize);
    for &v in src {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v as usize);
    }
    for (i, slot) in out.iter_mut().enumerate() {
        let lo = i.saturating_sub(reach);
        let hi = (i + reach + 1).min(len);
        *slot = prefix[hi] > prefix[lo];
    }
}
