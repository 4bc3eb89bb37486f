//! Sentinel repair by fast-marching inpainting
//!
//! Missing samples are filled in order of their distance from the valid
//! region, each one from a distance-weighted average of already-known
//! samples inside a small window. Filled samples immediately become known
//! and seed their own neighbours, so holes close from the outside in.

use super::{is_invalid_depth, DepthRaster, Raster, RasterError, RasterResult};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Known,
    Band,
    Inside,
}

/// Heap entry ordered so the smallest arrival time pops first
#[derive(Debug, Clone, Copy)]
struct Arrival {
    time: f32,
    index: usize,
}

impl PartialEq for Arrival {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Arrival {}

impl PartialOrd for Arrival {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Arrival {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.index.cmp(&self.index))
    }
}

const NEIGHBOURS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Replace every sentinel sample with an inpainted estimate
///
/// `radius` is the half-width of the window averaged for each repaired
/// sample (clamped to at least 1). The raster must contain at least one
/// valid sample, otherwise [`RasterError::NoValidSamples`] is returned.
pub fn remove_invalid(raster: &DepthRaster, radius: usize) -> RasterResult<DepthRaster> {
    let (width, height) = raster.dimensions();
    let invalid = raster.data().iter().filter(|&&v| is_invalid_depth(v)).count();
    if invalid == 0 {
        return Ok(raster.clone());
    }
    if invalid == raster.len() {
        return Err(RasterError::NoValidSamples);
    }

    let radius = radius.max(1) as isize;
    let mut values = raster.data().to_vec();
    let mut flags: Vec<Flag> = values
        .iter()
        .map(|&v| if is_invalid_depth(v) { Flag::Inside } else { Flag::Known })
        .collect();
    let mut times = vec![f32::INFINITY; values.len()];
    let mut heap = BinaryHeap::new();

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            if flags[i] != Flag::Known {
                continue;
            }
            times[i] = 0.0;
            let borders_hole = NEIGHBOURS.iter().any(|&(dx, dy)| {
                neighbour_index(width, height, x, y, dx, dy).is_some_and(|n| flags[n] == Flag::Inside)
            });
            if borders_hole {
                heap.push(Arrival { time: 0.0, index: i });
            }
        }
    }

    while let Some(Arrival { index, .. }) = heap.pop() {
        flags[index] = Flag::Known;
        let (x, y) = (index % width, index / width);

        for &(dx, dy) in &NEIGHBOURS {
            let Some(n) = neighbour_index(width, height, x, y, dx, dy) else {
                continue;
            };
            if flags[n] == Flag::Known {
                continue;
            }
            let (nx, ny) = (n % width, n / width);
            let time = solve_eikonal(&times, &flags, width, height, nx, ny);

            if flags[n] == Flag::Inside {
                times[n] = time;
                values[n] = weighted_estimate(&values, &times, &flags, width, height, nx, ny, radius);
                flags[n] = Flag::Band;
                heap.push(Arrival { time, index: n });
            } else if time < times[n] {
                times[n] = time;
                heap.push(Arrival { time, index: n });
            }
        }
    }

    Raster::from_vec(width, height, values)
}

#[inline]
fn neighbour_index(
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    dx: isize,
    dy: isize,
) -> Option<usize> {
    let nx = x as isize + dx;
    let ny = y as isize + dy;
    if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
        None
    } else {
        Some(ny as usize * width + nx as usize)
    }
}

/// First-order upwind solution of `|grad T| = 1` from known neighbours
fn solve_eikonal(
    times: &[f32],
    flags: &[Flag],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
) -> f32 {
    let known_time = |dx: isize, dy: isize| {
        neighbour_index(width, height, x, y, dx, dy)
            .filter(|&n| flags[n] == Flag::Known)
            .map_or(f32::INFINITY, |n| times[n])
    };
    let a = known_time(-1, 0).min(known_time(1, 0));
    let b = known_time(0, -1).min(known_time(0, 1));

    if !a.is_finite() || !b.is_finite() || (a - b).abs() >= 1.0 {
        return a.min(b) + 1.0;
    }
    let diff = a - b;
    (a + b + (2.0 - diff * diff).sqrt()) * 0.5
}

#[allow(clippy::too_many_arguments)]
fn weighted_estimate(
    values: &[f32],
    times: &[f32],
    flags: &[Flag],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    radius: isize,
) -> f32 {
    let origin = y * width + x;
    let radius_sq = (radius * radius) as f32;
    let mut sum = 0.0f64;
    let mut weight_sum = 0.0f64;

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx == 0 && dy == 0 {
                continue;
            }
            let dist_sq = (dx * dx + dy * dy) as f32;
            if dist_sq > radius_sq {
                continue;
            }
            let Some(n) = neighbour_index(width, height, x, y, dx, dy) else {
                continue;
            };
            if flags[n] != Flag::Known {
                continue;
            }
            let level = 1.0 / (1.0 + (times[n] - times[origin]).abs());
            let weight = (level / dist_sq) as f64;
            sum += values[n] as f64 * weight;
            weight_sum += weight;
        }
    }

    if weight_sum > 0.0 {
        (sum / weight_sum) as f32
    } else {
        values[origin]
    }
}
