//! Canvas queries available to style modules.
//!
//! Style modules receive a [`CanvasContext`] while they run and are expected to
//! go through these functions rather than inspect canvas state themselves.

use std::path::Path;

use crate::canvas::CanvasContext;
use crate::error::{Error, Result};
use crate::steerable::{EdgeId, SteerableViewMap};
use crate::types::BBox;

/// Number of style modules run so far.
pub fn get_time_stamp(cx: &CanvasContext) -> u32 {
    cx.time_stamp()
}

pub fn get_canvas_width(cx: &CanvasContext) -> usize {
    cx.width()
}

pub fn get_canvas_height(cx: &CanvasContext) -> usize {
    cx.height()
}

pub fn get_border(cx: &CanvasContext) -> BBox {
    cx.border()
}

/// Load a grayscale density map and bind it to `name`.
pub fn load_map(cx: &mut CanvasContext, file: &Path, name: &str, nb_levels: usize, sigma: f32) -> Result<()> {
    cx.load_map(file, name, nb_levels, sigma)
}

pub fn read_map_pixel(cx: &CanvasContext, name: &str, level: usize, x: i32, y: i32) -> Result<f32> {
    cx.read_map_pixel(name, level, x, y)
}

/// Density of all edges, whatever their orientation.
pub fn read_complete_view_map_pixel(cx: &CanvasContext, level: usize, x: i32, y: i32) -> Result<f32> {
    steerable(cx)?.read_complete_view_map_pixel(level, x, y)
}

/// Density of edges close to `orientation`.
pub fn read_directional_view_map_pixel(
    cx: &CanvasContext,
    orientation: usize,
    level: usize,
    x: i32,
    y: i32,
) -> Result<f32> {
    steerable(cx)?.read_steerable_view_map_pixel(orientation, level, x, y)
}

/// Edge under the cursor, if any.
pub fn get_selected_fedge(cx: &CanvasContext) -> Option<EdgeId> {
    cx.selected_edge()
}

fn steerable(cx: &CanvasContext) -> Result<&SteerableViewMap> {
    cx.steerable_view_map().ok_or(Error::NoSteerableViewMap)
}
