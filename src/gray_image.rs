// Float grayscale image: the pixel store behind pyramids and brush textures.
// Values live in [0,1]; row 0 is the top row of the decoded file.

use std::path::Path;

use log::{debug, error};

use crate::error::{Error, Result};
use crate::gaussian::PixelSource;

#[derive(Clone, Debug, PartialEq)]
pub struct GrayImage {
    width: usize,
    height: usize,
    pixels: Vec<f32>, // length = width * height
}

impl GrayImage {
    /// Black image of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0.0; width * height] }
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self { width, height, pixels }
    }

    /// Decode an 8-bit grayscale file. Deeper or colored files are refused:
    /// maps encode one density channel and nothing else.
    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path).map_err(|e| Error::ImageLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let bits = img.color().bits_per_pixel();
        if bits > 8 {
            error!("{path:?}: {bits} bits per pixel, grayscale maps must be 8-bit");
            return Err(Error::UnsupportedDepth { path: path.to_path_buf(), bits, expected: 8 });
        }
        let luma = img.to_luma8();
        let (w, h) = luma.dimensions();
        debug!("loaded {w}x{h} grayscale image from {path:?}");
        Ok(Self::from_luma8(&luma))
    }

    pub fn from_luma8(img: &image::GrayImage) -> Self {
        let (w, h) = img.dimensions();
        let pixels = img.pixels().map(|p| p[0] as f32 / 255.0).collect();
        Self { width: w as usize, height: h as usize, pixels }
    }

    pub fn to_luma8(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let v = self.pixel(x as usize, y as usize);
            image::Luma([(v.clamp(0.0, 1.0) * 255.0).round() as u8])
        })
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.to_luma8().save(path)?;
        Ok(())
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, v: f32) {
        self.pixels[y * self.width + x] = v;
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }
}

impl PixelSource for GrayImage {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> f32 {
        self.pixels[y * self.width + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn luma_round_trip_keeps_levels() {
        let img = GrayImage::from_fn(4, 2, |x, y| if (x + y) % 2 == 0 { 1.0 } else { 0.0 });
        let back = GrayImage::from_luma8(&img.to_luma8());
        assert_eq!(img, back);
    }

    #[test]
    fn load_rejects_rgb_files() {
        let path = std::env::temp_dir().join("freestyle_gray_image_rgb.png");
        image::RgbImage::new(4, 4).save(&path).unwrap();
        let err = GrayImage::load(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDepth { bits: 24, .. }), "{err}");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_missing_file_is_image_load_error() {
        let err = GrayImage::load(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, Error::ImageLoad { .. }));
    }
}
