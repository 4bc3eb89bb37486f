//! Perspective warps and lens undistortion
//!
//! Both operations resample by inverse mapping: for every output pixel the
//! source location is computed and the nearest source sample is copied.
//! Nearest-neighbour sampling never mixes a dropout sentinel into a valid
//! depth value. Output pixels that map outside the source get
//! `T::default()`.

use super::{Raster, RasterError, RasterResult};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Magnitude below which a projective weight or determinant counts as zero
const EPS: f64 = 1e-12;

/// 3x3 projective transform acting on `(x, y, 1)` column vectors
///
/// Serialized row-major as a nested `[[f64; 3]; 3]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct Homography(pub Matrix3<f64>);

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[[f64; 3]; 3]> for Homography {
    fn from(rows: [[f64; 3]; 3]) -> Self {
        Self::from_rows(rows)
    }
}

impl From<Homography> for [[f64; 3]; 3] {
    fn from(h: Homography) -> Self {
        h.to_rows()
    }
}

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        let m = &self.0;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    pub fn is_identity(&self) -> bool {
        self.0 == Matrix3::identity()
    }

    /// Solve the transform taking each `src[i]` onto `dst[i]`
    ///
    /// Fixes `h33 = 1` and solves the remaining eight unknowns from the four
    /// point pairs.
    pub fn from_quad(src: &[[f64; 2]; 4], dst: &[[f64; 2]; 4]) -> RasterResult<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for i in 0..4 {
            let [x, y] = src[i];
            let [u, v] = dst[i];
            a.set_row(
                2 * i,
                &SMatrix::<f64, 1, 8>::from_row_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]),
            );
            a.set_row(
                2 * i + 1,
                &SMatrix::<f64, 1, 8>::from_row_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]),
            );
            b[2 * i] = u;
            b[2 * i + 1] = v;
        }

        let lu = a.lu();
        // Collinear corners leave a pivot that is zero up to rounding.
        let pivots = lu.u().diagonal().map(f64::abs);
        let largest = pivots.max();
        if !(largest.is_finite() && largest > 0.0) || pivots.min() <= largest * EPS {
            return Err(RasterError::SingularMatrix);
        }
        let h = lu.solve(&b).ok_or(RasterError::SingularMatrix)?;
        if h.iter().any(|v| !v.is_finite()) {
            return Err(RasterError::SingularMatrix);
        }

        Ok(Self(Matrix3::new(
            h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0,
        )))
    }

    pub fn inverse(&self) -> RasterResult<Self> {
        let det = self.0.determinant();
        if !det.is_finite() || det.abs() < EPS {
            return Err(RasterError::SingularMatrix);
        }
        self.0
            .try_inverse()
            .map(Self)
            .ok_or(RasterError::SingularMatrix)
    }

    /// Map a point; `None` when it lands on the line at infinity
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let v = self.0 * Vector3::new(x, y, 1.0);
        let w = v.z;
        if !w.is_finite() || w.abs() < EPS {
            return None;
        }
        Some((v.x / w, v.y / w))
    }
}

#[inline]
fn nearest<T: Copy>(src: &Raster<T>, x: f64, y: f64) -> Option<T> {
    let (xi, yi) = (x.round(), y.round());
    if !xi.is_finite() || !yi.is_finite() {
        return None;
    }
    src.try_get(xi as isize, yi as isize)
}

/// Warp `raster` by `homography` into a `width x height` output
pub fn warp_perspective<T: Copy + Default + Send + Sync>(
    raster: &Raster<T>,
    homography: &Homography,
    width: usize,
    height: usize,
) -> RasterResult<Raster<T>> {
    let inverse = homography.inverse()?;
    Ok(warp_with_inverse(raster, &inverse, width, height))
}

/// Warp by a transform given as its inverse (output pixel to source pixel)
pub fn warp_with_inverse<T: Copy + Default + Send + Sync>(
    raster: &Raster<T>,
    inverse: &Homography,
    width: usize,
    height: usize,
) -> Raster<T> {
    let mut data = vec![T::default(); width * height];
    if width > 0 {
        data.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, slot) in row.iter_mut().enumerate() {
                if let Some(v) = inverse
                    .apply(x as f64, y as f64)
                    .and_then(|(sx, sy)| nearest(raster, sx, sy))
                {
                    *slot = v;
                }
            }
        });
    }
    Raster {
        width,
        height,
        data,
    }
}

/// Pinhole intrinsics plus Brown-Conrady distortion `(k1, k2, p1, p2, k3)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub camera_matrix: [[f64; 3]; 3],
    #[serde(default)]
    pub distortion: Vec<f64>,
}

impl CameraIntrinsics {
    fn coefficient(&self, i: usize) -> f64 {
        self.distortion.get(i).copied().unwrap_or(0.0)
    }

    /// No distortion terms, or all of them zero
    pub fn is_distortion_free(&self) -> bool {
        self.distortion.iter().all(|&k| k == 0.0)
    }

    /// Where an ideal pixel `(u, v)` is found in the distorted image
    pub fn distort_pixel(&self, u: f64, v: f64) -> Option<(f64, f64)> {
        let m = &self.camera_matrix;
        let (fx, fy, cx, cy) = (m[0][0], m[1][1], m[0][2], m[1][2]);
        if fx == 0.0 || fy == 0.0 {
            return None;
        }
        let (k1, k2, p1, p2, k3) = (
            self.coefficient(0),
            self.coefficient(1),
            self.coefficient(2),
            self.coefficient(3),
            self.coefficient(4),
        );
        let x = (u - cx) / fx;
        let y = (v - cy) / fy;
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
        let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        Some((fx * xd + cx, fy * yd + cy))
    }
}

/// Remove lens distortion, keeping the same camera matrix for the output
pub fn undistort<T: Copy + Default + Send + Sync>(
    raster: &Raster<T>,
    intrinsics: &CameraIntrinsics,
) -> Raster<T> {
    if intrinsics.is_distortion_free() {
        return raster.clone();
    }
    let (width, height) = raster.dimensions();
    let mut data = vec![T::default(); width * height];
    if width > 0 {
        data.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, slot) in row.iter_mut().enumerate() {
                if let Some(v) = intrinsics
                    .distort_pixel(x as f64, y as f64)
                    .and_then(|(sx, sy)| nearest(raster, sx, sy))
                {
                    *slot = v;
                }
            }
        });
    }
    Raster { width, height, data }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-6 && (a.1 - b.1).abs() < 1e-6
    }

    #[test]
    fn test_from_quad_maps_corners() {
        let src = [[0.0, 0.0], [100.0, 0.0], [100.0, 80.0], [0.0, 80.0]];
        let dst = [[10.0, 5.0], [90.0, 12.0], [95.0, 70.0], [3.0, 60.0]];
        let h = Homography::from_quad(&src, &dst).unwrap();
        for i in 0..4 {
            let p = h.apply(src[i][0], src[i][1]).unwrap();
            assert!(approx(p, (dst[i][0], dst[i][1])));
        }
    }

    #[test]
    fn test_from_quad_degenerate() {
        let src = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let dst = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        assert_eq!(
            Homography::from_quad(&src, &dst),
            Err(RasterError::SingularMatrix)
        );
    }

    #[test]
    fn test_inverse_round_trip() {
        let h = Homography::from_rows([[1.2, 0.1, 5.0], [-0.05, 0.9, 3.0], [0.0001, 0.0002, 1.0]]);
        let inv = h.inverse().unwrap();
        let (x, y) = h.apply(40.0, 25.0).unwrap();
        assert!(approx(inv.apply(x, y).unwrap(), (40.0, 25.0)));
    }

    #[test]
    fn test_singular_inverse() {
        let h = Homography::from_rows([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]);
        assert_eq!(h.inverse(), Err(RasterError::SingularMatrix));
    }

    #[test]
    fn test_warp_identity() {
        let r = Raster::from_fn(4, 3, |x, y| (x + y * 4) as u16);
        let out = warp_perspective(&r, &Homography::identity(), 4, 3).unwrap();
        assert_eq!(out, r);
    }

    #[test]
    fn test_warp_translation_fills_default() {
        let r = Raster::filled(4, 4, 9u8);
        let shift = Homography::from_rows([[1.0, 0.0, 2.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let out = warp_perspective(&r, &shift, 4, 4).unwrap();
        assert_eq!(out.get(0, 0), 0);
        assert_eq!(out.get(1, 0), 0);
        assert_eq!(out.get(2, 0), 9);
    }

    #[test]
    fn test_warp_with_inverse_matches_warp_perspective() {
        let r = Raster::from_fn(6, 5, |x, y| (x * 10 + y) as u16);
        let h = Homography::from_rows([[1.0, 0.0, 1.0], [0.0, 1.0, 2.0], [0.0, 0.0, 1.0]]);
        let inverse = h.inverse().unwrap();
        assert_eq!(
            warp_with_inverse(&r, &inverse, 6, 5),
            warp_perspective(&r, &h, 6, 5).unwrap()
        );
    }

    #[test]
    fn test_json_is_row_major_nested_array() {
        let h = Homography::from_rows([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [0.0, 0.0, 1.0]]);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, "[[1.0,2.0,3.0],[4.0,5.0,6.0],[0.0,0.0,1.0]]");
        let back: Homography = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
        assert_eq!(back.0[(0, 2)], 3.0);
    }

    #[test]
    fn test_apply_rejects_point_at_infinity() {
        let h = Homography::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]);
        assert!(h.apply(0.0, 5.0).is_none());
        assert!(h.apply(2.0, 4.0).is_some());
    }

    #[test]
    fn test_undistort_without_coefficients_is_identity() {
        let r = Raster::from_fn(5, 5, |x, y| (x * y) as f32);
        let intrinsics = CameraIntrinsics {
            camera_matrix: [[100.0, 0.0, 2.0], [0.0, 100.0, 2.0], [0.0, 0.0, 1.0]],
            distortion: vec![0.0; 5],
        };
        assert_eq!(undistort(&r, &intrinsics), r);
    }

    #[test]
    fn test_distort_pixel_centre_is_fixed() {
        let intrinsics = CameraIntrinsics {
            camera_matrix: [[365.0, 0.0, 256.0], [0.0, 365.0, 212.0], [0.0, 0.0, 1.0]],
            distortion: vec![0.09, -0.27, 0.0, 0.0, 0.09],
        };
        assert!(approx(
            intrinsics.distort_pixel(256.0, 212.0).unwrap(),
            (256.0, 212.0)
        ));
        let (u, _) = intrinsics.distort_pixel(500.0, 212.0).unwrap();
        assert!(u != 500.0);
    }
}
