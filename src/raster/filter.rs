//! Separable Gaussian blur

use super::{Raster, RasterError, RasterResult, Sample};
use rayon::prelude::*;

/// Sigma derived from the kernel size when none is given
pub fn default_sigma(ksize: usize) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gaussian_kernel(ksize: usize, sigma: f32) -> Vec<f32> {
    let half = (ksize / 2) as isize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

/// Mirror an index into `[0, len)` without repeating the edge sample
#[inline]
fn reflect101(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut i = i.rem_euclid(period);
    if i >= len as isize {
        i = period - i;
    }
    i as usize
}

/// Blur with a `ksize x ksize` Gaussian kernel
///
/// `ksize` must be odd. When `sigma` is `None` it is derived from the kernel
/// size. Results are rounded back into the input sample type.
pub fn gaussian_blur<T: Sample>(
    raster: &Raster<T>,
    ksize: usize,
    sigma: Option<f32>,
) -> RasterResult<Raster<T>> {
    if ksize == 0 || ksize % 2 == 0 {
        return Err(RasterError::InvalidArgument(format!(
            "blur kernel size must be odd, got {}",
            ksize
        )));
    }
    let sigma = sigma.filter(|s| *s > 0.0).unwrap_or_else(|| default_sigma(ksize));
    if ksize == 1 || raster.is_empty() {
        return Ok(raster.clone());
    }

    let (width, height) = raster.dimensions();
    let kernel = gaussian_kernel(ksize, sigma);
    let half = (ksize / 2) as isize;
    let src = raster.to_f32();

    let mut horizontal = vec![0.0f32; width * height];
    horizontal
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out)| {
            let row = src.row(y);
            for (x, slot) in out.iter_mut().enumerate() {
                *slot = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * row[reflect101(x as isize + k as isize - half, width)])
                    .sum();
            }
        });

    let mut out = vec![T::default(); width * height];
    out.par_chunks_mut(width).enumerate().for_each(|(y, out)| {
        for (x, slot) in out.iter_mut().enumerate() {
            let v: f32 = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let sy = reflect101(y as isize + k as isize - half, height);
                    w * horizontal[sy * width + x]
                })
                .sum();
            *slot = T::from_f32(v);
        }
    });

    Raster::from_vec(width, height, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sigma_for_5() {
        assert!((default_sigma(5) - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_kernel_normalized() {
        let k = gaussian_kernel(5, 1.1);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(k[2] > k[1] && k[1] > k[0]);
        assert_eq!(k[0], k[4]);
    }

    #[test]
    fn test_reflect101() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(3, 5), 3);
    }

    #[test]
    fn test_constant_raster_unchanged() {
        let r = Raster::filled(8, 6, 120u8);
        assert_eq!(gaussian_blur(&r, 5, None).unwrap(), r);
    }

    #[test]
    fn test_impulse_spreads() {
        let mut r = Raster::filled(9, 9, 0.0f32);
        r.set(4, 4, 100.0);
        let out = gaussian_blur(&r, 5, None).unwrap();
        assert!(out.get(4, 4) < 100.0);
        assert!(out.get(5, 4) > 0.0);
        assert_eq!(out.get(0, 0), 0.0);
        let total: f32 = out.data().iter().sum();
        assert!((total - 100.0).abs() < 1e-2);
    }

    #[test]
    fn test_even_kernel_rejected() {
        let r = Raster::filled(3, 3, 0u8);
        assert!(gaussian_blur(&r, 4, None).is_err());
    }
}
