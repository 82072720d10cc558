// Multi-level blurred image storage.
// Level 0 is the smoothed source; each further level halves both sides and
// samples the previous level through the same Gaussian filter.

use log::debug;

use crate::error::{Error, Result};
use crate::gaussian::{GaussianFilter, PixelSource};
use crate::gray_image::GrayImage;

#[derive(Clone, Debug)]
pub struct ImagePyramid {
    levels: Vec<GrayImage>,
    sigma: f32,
}

impl ImagePyramid {
    /// Build `nb_levels` reduced levels on top of level 0. With `nb_levels == 0`
    /// reduction continues until one side reaches a single pixel.
    pub fn gaussian(source: &GrayImage, nb_levels: usize, sigma: f32) -> Result<Self> {
        let filter = GaussianFilter::new(sigma)?;

        let level0 = GrayImage::from_fn(source.width(), source.height(), |x, y| {
            filter.smoothed_pixel(source, x as isize, y as isize)
        });
        let mut levels = vec![level0];

        loop {
            let prev = &levels[levels.len() - 1];
            let (w, h) = (prev.width() >> 1, prev.height() >> 1);
            let done = if nb_levels == 0 { w == 0 || h == 0 } else { levels.len() > nb_levels };
            if done || w == 0 || h == 0 {
                break;
            }
            let next = GrayImage::from_fn(w, h, |x, y| {
                filter.smoothed_pixel(prev, 2 * x as isize, 2 * y as isize)
            });
            levels.push(next);
        }

        debug!(
            "built pyramid {}x{} with {} levels (sigma {sigma})",
            source.width(),
            source.height(),
            levels.len()
        );
        Ok(Self { levels, sigma })
    }

    /// Wrap already-built levels (finest first).
    pub fn from_levels(levels: Vec<GrayImage>, sigma: f32) -> Self {
        Self { levels, sigma }
    }

    pub fn nb_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Level-0 width.
    pub fn width(&self) -> usize {
        self.levels.first().map_or(0, |l| l.width())
    }

    /// Level-0 height.
    pub fn height(&self) -> usize {
        self.levels.first().map_or(0, |l| l.height())
    }

    pub fn level(&self, level: usize) -> Result<&GrayImage> {
        self.levels
            .get(level)
            .ok_or(Error::LevelOutOfRange { level, levels: self.levels.len() })
    }

    /// Value at level-0 coordinates (x, y) read from `level`. Coarse levels are
    /// reconstructed bilinearly; coordinates past the last sample clamp to it.
    pub fn pixel(&self, x: usize, y: usize, level: usize) -> Result<f32> {
        let img = self.level(level)?;
        if level == 0 {
            return Ok(img.pixel(x.min(img.width() - 1), y.min(img.height() - 1)));
        }
        let scale = (1usize << level) as f32;
        let (fx, fy) = (x as f32 / scale, y as f32 / scale);
        let (w, h) = (img.width(), img.height());

        let sx = (fx.floor() as usize).min(w - 1);
        let sy = (fy.floor() as usize).min(h - 1);
        let tx = (fx - sx as f32).clamp(0.0, 1.0);
        let ty = (fy - sy as f32).clamp(0.0, 1.0);
        let (sx1, sy1) = ((sx + 1).min(w - 1), (sy + 1).min(h - 1));

        let top = img.pixel(sx, sy) * (1.0 - tx) + img.pixel(sx1, sy) * tx;
        let bottom = img.pixel(sx, sy1) * (1.0 - tx) + img.pixel(sx1, sy1) * tx;
        Ok(top * (1.0 - ty) + bottom * ty)
    }
}
