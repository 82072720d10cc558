// Gaussian kernel generator and point sampler.
// The mask is radially symmetric, so only one quadrant is stored and
// indexed with |i|, |j| at sampling time.

use std::f32::consts::PI;

use crate::error::{Error, Result};

/// Anything that exposes a grid of scalar pixels.
pub trait PixelSource {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// Caller guarantees `x < width()` and `y < height()`.
    fn pixel(&self, x: usize, y: usize) -> f32;
}

#[derive(Clone, Debug)]
pub struct GaussianFilter {
    sigma: f32,
    mask_size: usize,
    stored_mask_size: usize,
    bound: usize,
    mask: Vec<f32>, // stored_mask_size * stored_mask_size, row-major over (i, j)
}

impl GaussianFilter {
    pub fn new(sigma: f32) -> Result<Self> {
        let mut f = GaussianFilter {
            sigma: 0.0,
            mask_size: 0,
            stored_mask_size: 0,
            bound: 0,
            mask: Vec::new(),
        };
        f.set_sigma(sigma)?;
        Ok(f)
    }

    /// Smallest odd width covering about 4 sigma each side.
    pub fn compute_mask_size(sigma: f32) -> usize {
        let mut size = (4.0 * sigma).max(0.0).floor() as usize + 1;
        if size % 2 == 0 {
            size += 1;
        }
        size
    }

    /// Rebuilds the stored quadrant for a new sigma.
    pub fn set_sigma(&mut self, sigma: f32) -> Result<()> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(Error::InvalidSigma(sigma));
        }
        self.sigma = sigma;
        self.mask_size = Self::compute_mask_size(sigma);
        self.stored_mask_size = (self.mask_size + 1) / 2;
        self.bound = self.stored_mask_size - 1;

        let n = self.stored_mask_size;
        let s2 = 2.0 * sigma * sigma; // denominator in the exponent
        let norm = 1.0 / (PI * s2); // 1 / (2 pi sigma^2)
        self.mask.clear();
        self.mask.reserve(n * n);
        for i in 0..n {
            for j in 0..n {
                let r2 = (i * i + j * j) as f32;
                self.mask.push((-r2 / s2).exp() * norm);
            }
        }
        Ok(())
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn mask_size(&self) -> usize {
        self.mask_size
    }

    pub fn stored_mask_size(&self) -> usize {
        self.stored_mask_size
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Weight for offset (i, j) from the center.
    #[inline]
    pub fn weight(&self, i: isize, j: isize) -> f32 {
        let (i, j) = (i.unsigned_abs(), j.unsigned_abs());
        self.mask[i * self.stored_mask_size + j]
    }

    /// Convolves `source` at (x, y). Samples falling outside the source are
    /// skipped without renormalising, so results dim toward the borders.
    pub fn smoothed_pixel<S: PixelSource + ?Sized>(&self, source: &S, x: isize, y: isize) -> f32 {
        let w = source.width() as isize;
        let h = source.height() as isize;
        let b = self.bound as isize;
        let mut sum = 0.0;
        for i in -b..=b {
            let sy = y + i;
            if sy < 0 || sy >= h {
                continue;
            }
            for j in -b..=b {
                let sx = x + j;
                if sx < 0 || sx >= w {
                    continue;
                }
                sum += self.weight(i, j) * source.pixel(sx as usize, sy as usize);
            }
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    struct Constant {
        w: usize,
        h: usize,
        v: f32,
    }

    impl PixelSource for Constant {
        fn width(&self) -> usize {
            self.w
        }
        fn height(&self) -> usize {
            self.h
        }
        fn pixel(&self, _x: usize, _y: usize) -> f32 {
            self.v
        }
    }

    #[test]
    fn mask_size_is_always_odd() {
        for k in 1..200 {
            let sigma = k as f32 * 0.05;
            let m = GaussianFilter::compute_mask_size(sigma);
            assert!(m >= 1);
            assert_eq!(m % 2, 1, "sigma {sigma} gave even mask {m}");
        }
        assert_eq!(GaussianFilter::compute_mask_size(1.0), 5);
        assert_eq!(GaussianFilter::compute_mask_size(0.5), 3);
        assert_eq!(GaussianFilter::compute_mask_size(2.0), 9);
    }

    #[test]
    fn stored_quadrant_matches_mask_size() {
        let f = GaussianFilter::new(1.5).unwrap();
        assert_eq!(f.mask_size(), 7);
        assert_eq!(f.stored_mask_size(), 4);
        assert_eq!(f.bound(), 3);
        assert_eq!(f.mask.len(), 16);
        assert_eq!(f.weight(-2, 1), f.weight(2, -1));
    }

    #[test]
    fn rejects_degenerate_sigma() {
        assert!(matches!(GaussianFilter::new(0.0), Err(Error::InvalidSigma(_))));
        assert!(matches!(GaussianFilter::new(-1.0), Err(Error::InvalidSigma(_))));
        assert!(GaussianFilter::new(f32::NAN).is_err());

        let mut f = GaussianFilter::new(1.0).unwrap();
        assert!(f.set_sigma(0.0).is_err());
        // A failed update leaves the previous mask intact.
        assert_eq!(f.sigma(), 1.0);
        assert_eq!(f.mask_size(), 5);
    }

    #[test]
    fn constant_source_interior_is_preserved() {
        let src = Constant { w: 64, h: 64, v: 0.7 };
        for sigma in [0.6f32, 1.0, 2.0, 3.0] {
            let f = GaussianFilter::new(sigma).unwrap();
            let v = f.smoothed_pixel(&src, 32, 32);
            // The kernel stops at 2 sigma, so a few percent of mass is lost.
            assert!(v <= 0.7 + 1e-4, "sigma {sigma}: {v}");
            assert!((v - 0.7).abs() < 0.7 * 0.07, "sigma {sigma}: {v}");
        }
    }

    #[test]
    fn constant_source_dims_at_border() {
        let src = Constant { w: 16, h: 16, v: 1.0 };
        let f = GaussianFilter::new(2.0).unwrap();
        let interior = f.smoothed_pixel(&src, 8, 8);
        let corner = f.smoothed_pixel(&src, 0, 0);
        assert!(corner > 0.0 && corner < interior);
        assert!(corner < 0.5);
        for y in 0..16 {
            for x in 0..16 {
                let v = f.smoothed_pixel(&src, x, y);
                assert!((0.0..=1.0 + 1e-4).contains(&v));
            }
        }
    }

    #[test]
    fn clone_is_deep() {
        let f = GaussianFilter::new(1.0).unwrap();
        let mut g = f.clone();
        g.set_sigma(3.0).unwrap();
        assert_eq!(f.mask.len(), 9);
        assert_eq!(g.mask.len(), 49);
    }
}
