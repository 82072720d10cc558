// Steerable view map: one density pyramid per edge orientation plus one
// "complete" pyramid counting every edge regardless of direction.
//
// The view-map extraction stage writes it (bases + edge directions); style
// modules only read it through the canvas context.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::path::Path;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::gray_image::GrayImage;
use crate::pyramid::ImagePyramid;
use crate::types::Vec2;

/// Oriented maps plus the complete one.
pub const NB_STEERABLE_VIEWMAP: usize = 5;

/// Densities are stored as line counts on 8 bits: one line crossing a pixel
/// along its own orientation writes this value.
const LINE_ENCODING: f32 = 32.0;

/// Identifier of an edge of the view map.
pub type EdgeId = u32;

#[derive(Debug)]
pub struct SteerableViewMap {
    nb_orientations: usize,
    bound: f32,
    directions: Vec<Vec2>,
    mapping: HashMap<EdgeId, Vec<f32>>,
    pyramids: Vec<Option<ImagePyramid>>, // nb_orientations oriented + 1 complete
}

impl Default for SteerableViewMap {
    fn default() -> Self {
        Self::new(NB_STEERABLE_VIEWMAP - 1)
    }
}

impl SteerableViewMap {
    pub fn new(nb_orientations: usize) -> Self {
        let n = nb_orientations.max(1);
        let directions = (0..n)
            .map(|i| {
                let a = i as f32 * PI / n as f32;
                Vec2::new(a.cos(), a.sin())
            })
            .collect();
        Self {
            nb_orientations: n,
            bound: (PI / n as f32).cos(),
            directions,
            mapping: HashMap::new(),
            pyramids: vec![None; n + 1],
        }
    }

    pub fn nb_orientations(&self) -> usize {
        self.nb_orientations
    }

    /// Index of the complete (orientation-less) map.
    pub fn complete_index(&self) -> usize {
        self.nb_orientations
    }

    /// Contribution of a direction to orientation `i`: 1 when aligned, falling
    /// to 0 at the angular half-width of the bucket.
    pub fn compute_weight(&self, dir: Vec2, i: usize) -> f32 {
        let dotp = dir.normalized().dot(self.directions[i]).abs();
        if dotp < self.bound {
            return 0.0;
        }
        let dotp = dotp.min(1.0);
        (self.nb_orientations as f32 / 2.0 * dotp.acos()).cos()
    }

    fn weights(&self, dir: Vec2) -> Vec<f32> {
        let mut res: Vec<f32> = (0..self.nb_orientations).map(|i| self.compute_weight(dir, i)).collect();
        res.push(1.0); // every edge counts in the complete map
        res
    }

    /// Register an edge with its 2D direction.
    pub fn add_edge(&mut self, id: EdgeId, dir: Vec2) -> &[f32] {
        let w = self.weights(dir);
        self.mapping.insert(id, w);
        &self.mapping[&id]
    }

    /// Orientation bucket of a registered edge.
    pub fn svm_number(&self, id: EdgeId) -> Option<usize> {
        self.mapping.get(&id).map(|w| argmax(&w[..self.nb_orientations]))
    }

    /// Orientation bucket of an arbitrary direction.
    pub fn svm_number_for_direction(&self, dir: Vec2) -> usize {
        let w = self.weights(dir);
        argmax(&w[..self.nb_orientations])
    }

    /// Build one pyramid per base image; bases are ordered like orientations,
    /// the complete map last.
    pub fn build_images_pyramids(&mut self, bases: &[GrayImage], nb_levels: usize, sigma: f32) -> Result<()> {
        if bases.len() != self.nb_orientations + 1 {
            return Err(Error::IndexOutOfRange { index: bases.len(), len: self.nb_orientations + 1 });
        }
        for (slot, base) in self.pyramids.iter_mut().zip(bases) {
            *slot = Some(ImagePyramid::gaussian(base, nb_levels, sigma)?);
        }
        info!("steerable view map: built {} pyramids", bases.len());
        Ok(())
    }

    pub fn pyramid(&self, orientation: usize) -> Result<Option<&ImagePyramid>> {
        self.pyramids
            .get(orientation)
            .map(Option::as_ref)
            .ok_or(Error::OrientationOutOfRange { orientation, count: self.pyramids.len() })
    }

    /// Line density around canvas point (x, y) (y up) for one orientation.
    /// Points outside the map and maps never built read 0.
    pub fn read_steerable_view_map_pixel(&self, orientation: usize, level: usize, x: i32, y: i32) -> Result<f32> {
        let Some(pyramid) = self.pyramid(orientation)? else {
            warn!("steerable view map {orientation} was never built");
            return Ok(0.0);
        };
        let (w, h) = (pyramid.width() as i32, pyramid.height() as i32);
        if x < 0 || x >= w || y < 0 || y >= h {
            return Ok(0.0);
        }
        let v = pyramid.pixel(x as usize, (h - 1 - y) as usize, level)?;
        Ok(v * 255.0 / LINE_ENCODING)
    }

    pub fn read_complete_view_map_pixel(&self, level: usize, x: i32, y: i32) -> Result<f32> {
        self.read_steerable_view_map_pixel(self.complete_index(), level, x, y)
    }

    /// Dump every level of every built pyramid as `<dir>/svm_<orientation>_<level>.png`.
    pub fn save_levels(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        for (o, pyramid) in self.pyramids.iter().enumerate() {
            let Some(pyramid) = pyramid else { continue };
            for level in 0..pyramid.nb_levels() {
                let path = dir.join(format!("svm_{o}_{level}.png"));
                pyramid.level(level)?.save_png(&path)?;
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.mapping.clear();
        self.pyramids.iter_mut().for_each(|p| *p = None);
    }
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn default_has_four_orientations_and_complete_map() {
        let svm = SteerableViewMap::default();
        assert_eq!(svm.nb_orientations(), 4);
        assert_eq!(svm.complete_index(), 4);
    }

    #[test]
    fn axis_directions_land_in_their_bucket() {
        let svm = SteerableViewMap::default();
        assert_eq!(svm.svm_number_for_direction(Vec2::new(1.0, 0.0)), 0);
        assert_eq!(svm.svm_number_for_direction(Vec2::new(-3.0, 0.0)), 0);
        assert_eq!(svm.svm_number_for_direction(Vec2::new(1.0, 1.0)), 1);
        assert_eq!(svm.svm_number_for_direction(Vec2::new(0.0, 2.0)), 2);
        assert_eq!(svm.svm_number_for_direction(Vec2::new(-1.0, 1.0)), 3);
    }

    #[test]
    fn weights_peak_on_alignment_and_vanish_past_bound() {
        let svm = SteerableViewMap::default();
        assert!((svm.compute_weight(Vec2::new(1.0, 0.0), 0) - 1.0).abs() < 1e-6);
        assert_eq!(svm.compute_weight(Vec2::new(0.0, 1.0), 0), 0.0);
        let half = svm.compute_weight(Vec2::new(1.0, 0.2), 0);
        assert!(half > 0.0 && half < 1.0);
    }

    #[test]
    fn registered_edges_resolve_to_orientation() {
        let mut svm = SteerableViewMap::default();
        let w = svm.add_edge(7, Vec2::new(0.0, -1.0)).to_vec();
        assert_eq!(w.len(), NB_STEERABLE_VIEWMAP);
        assert_eq!(w[4], 1.0);
        assert_eq!(svm.svm_number(7), Some(2));
        assert_eq!(svm.svm_number(8), None);
        svm.reset();
        assert_eq!(svm.svm_number(7), None);
    }

    #[test]
    fn reads_decode_line_counts_with_y_up() {
        let mut svm = SteerableViewMap::default();
        let line = LINE_ENCODING / 255.0;
        let mut bases: Vec<GrayImage> = (0..5).map(|_| GrayImage::new(32, 32)).collect();
        // Horizontal band near the bottom of the canvas (top rows are image rows).
        bases[0] = GrayImage::from_fn(32, 32, |_, y| if y >= 24 { line } else { 0.0 });
        svm.build_images_pyramids(&bases, 2, 1.0).unwrap();

        let low = svm.read_steerable_view_map_pixel(0, 0, 16, 3).unwrap();
        let high = svm.read_steerable_view_map_pixel(0, 0, 16, 28).unwrap();
        assert!(low > 0.9 && low <= 1.0, "{low}");
        assert!(high.abs() < 1e-6, "{high}");
        assert_eq!(svm.read_steerable_view_map_pixel(0, 0, -1, 3).unwrap(), 0.0);
        assert_eq!(svm.read_complete_view_map_pixel(0, 16, 3).unwrap(), 0.0);
        assert!(matches!(
            svm.read_steerable_view_map_pixel(9, 0, 1, 1),
            Err(Error::OrientationOutOfRange { .. })
        ));
    }

    #[test]
    fn unbuilt_maps_read_zero() {
        let svm = SteerableViewMap::default();
        assert_eq!(svm.read_complete_view_map_pixel(0, 1, 1).unwrap(), 0.0);
    }

    #[test]
    fn wrong_number_of_bases_is_rejected() {
        let mut svm = SteerableViewMap::default();
        let bases = vec![GrayImage::new(4, 4); 3];
        assert!(svm.build_images_pyramids(&bases, 1, 1.0).is_err());
    }
}
