//! Raster Transform Library
//!
//! Pure, stateless operations over 2D rasters. Every operation takes its
//! inputs by reference and returns a freshly allocated raster, so a raster
//! still held as "previous frame" state can never be mutated by a later
//! stage. The only in-place operations are the drawing helpers in [`draw`],
//! which work on a composite the caller owns outright.
//!
//! # Main Types
//!
//! - [`Raster`] - Row-major 2D grid generic over its sample type
//! - [`DepthRaster`] - Depth samples in millimeters (`0` = sensor dropout)
//! - [`Gray8`] - 8-bit display raster
//! - [`Mask`] - Boolean raster produced by threshold/range tests
//! - [`ColorRaster`] - 3-channel 8-bit raster (RGB order)
//!
//! # Modules
//!
//! - [`ops`] - Elementwise operations (masks, blending, normalization, bands)
//! - [`inpaint`] - Sentinel repair via fast-marching inpainting
//! - [`morphology`] - Mask dilation
//! - [`filter`] - Gaussian blur
//! - [`colormap`] - Colormap lookup tables
//! - [`contour`] - Border following, area, polygon simplification
//! - [`draw`] - Polyline rasterization
//! - [`geometry`] - Homography warps and lens undistortion

pub mod colormap;
pub mod contour;
pub mod draw;
pub mod filter;
pub mod geometry;
pub mod inpaint;
pub mod morphology;
pub mod ops;

pub use colormap::{apply_colormap, Colormap};
pub use contour::{
    arc_length, contour_area, simplify_polygon, trace_contours, Contour, ContourKind, Point,
};
pub use draw::{draw_contours, draw_polyline};
pub use filter::gaussian_blur;
pub use geometry::{undistort, warp_perspective, warp_with_inverse, CameraIntrinsics, Homography};
pub use inpaint::remove_invalid;
pub use morphology::dilate;
pub use ops::{
    blend, clip, invert_8bit, narrow_to_u8, normalize_to_range, range_mask, select,
    threshold_bands, Operand,
};

use thiserror::Error;

/// Depth value used by sensors to flag a dropout
pub const INVALID_DEPTH: f32 = 0.0;

/// Errors produced by raster operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterError {
    /// Two rasters that must share dimensions do not
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Normalization requested over an empty interval
    #[error("degenerate range: low ({low}) equals high ({high})")]
    DegenerateRange { low: f32, high: f32 },

    /// Inpainting was asked to repair a raster without any valid sample
    #[error("raster contains no valid samples to inpaint from")]
    NoValidSamples,

    /// Buffer length does not match the requested dimensions
    #[error("buffer of {len} samples cannot form a {width}x{height} raster")]
    BufferSize {
        width: usize,
        height: usize,
        len: usize,
    },

    /// A parameter outside its accepted domain
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A 3x3 matrix that cannot be inverted
    #[error("matrix is singular")]
    SingularMatrix,
}

/// Result alias for raster operations
pub type RasterResult<T> = std::result::Result<T, RasterError>;

/// RGB triple, 8 bits per channel
pub type Rgb = [u8; 3];

/// Depth samples in millimeters
pub type DepthRaster = Raster<f32>;
/// 8-bit display raster
pub type Gray8 = Raster<u8>;
/// Boolean mask raster
pub type Mask = Raster<bool>;
/// 3-channel color raster
pub type ColorRaster = Raster<Rgb>;

/// Numeric sample types that can be converted through `f32`
///
/// Conversions from `f32` saturate to the type's range and round to the
/// nearest representable value.
pub trait Sample: Copy + Default + PartialOrd + Send + Sync + 'static {
    /// Widen this sample to `f32`
    fn to_f32(self) -> f32;

    /// Narrow an `f32` into this sample type
    fn from_f32(v: f32) -> Self;
}

impl Sample for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        if v.is_nan() {
            return 0;
        }
        v.clamp(0.0, 255.0).round() as u8
    }
}

impl Sample for u16 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        if v.is_nan() {
            return 0;
        }
        v.clamp(0.0, 65535.0).round() as u16
    }
}

impl Sample for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}

/// A 2D raster with runtime dimensions, stored row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: Copy> Raster<T> {
    /// Create a raster with every sample set to `value`
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wrap an existing row-major buffer
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> RasterResult<Self> {
        if data.len() != width * height {
            return Err(RasterError::BufferSize {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a raster by evaluating `f(x, y)` for every sample
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample at `(x, y)`. Panics when out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[y * self.width + x]
    }

    /// Sample at `(x, y)` or `None` when out of bounds
    #[inline]
    pub fn try_get(&self, x: isize, y: isize) -> Option<T> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            None
        } else {
            Some(self.data[y as usize * self.width + x as usize])
        }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.data[y * self.width + x] = value;
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// One row as a slice
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Apply `f` to every sample, producing a new raster
    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Raster<U> {
        Raster {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Iterate `(x, y, sample)` in row-major order
    pub fn iter_coords(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let width = self.width.max(1);
        self.data
            .iter()
            .enumerate()
            .map(move |(i, &v)| (i % width, i / width, v))
    }

    /// Fail with [`RasterError::ShapeMismatch`] unless `other` has the same dimensions
    pub fn ensure_same_shape<U>(&self, other: &Raster<U>) -> RasterResult<()> {
        if self.width != other.width || self.height != other.height {
            return Err(RasterError::ShapeMismatch {
                expected: (self.width, self.height),
                actual: (other.width, other.height),
            });
        }
        Ok(())
    }
}

impl<T: Sample> Raster<T> {
    /// Smallest and largest sample, ignoring NaN. `None` for an empty raster.
    pub fn min_max(&self) -> Option<(T, T)> {
        let mut iter = self.data.iter().copied().filter(|v| v.to_f32().is_finite());
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| {
            (if v < lo { v } else { lo }, if v > hi { v } else { hi })
        }))
    }

    /// Convert every sample to `f32`
    pub fn to_f32(&self) -> Raster<f32> {
        self.map(Sample::to_f32)
    }
}

impl Mask {
    /// Number of `true` samples
    pub fn count_true(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Elementwise OR of two masks
    pub fn or(&self, other: &Mask) -> RasterResult<Mask> {
        self.ensure_same_shape(other)?;
        Ok(Raster {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| a || b)
                .collect(),
        })
    }
}

impl ColorRaster {
    /// Flatten into interleaved RGB bytes
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|px| px.iter().copied()).collect()
    }

    /// Build from interleaved RGB bytes
    pub fn from_rgb_bytes(width: usize, height: usize, bytes: &[u8]) -> RasterResult<Self> {
        if bytes.len() != width * height * 3 {
            return Err(RasterError::BufferSize {
                width,
                height,
                len: bytes.len() / 3,
            });
        }
        let data = bytes.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        Ok(Raster {
            width,
            height,
            data,
        })
    }
}

/// Whether a depth sample is the dropout sentinel (or not a number)
#[inline]
pub fn is_invalid_depth(v: f32) -> bool {
    v == INVALID_DEPTH || !v.is_finite()
}
