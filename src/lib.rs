//! Stroke rendering and density queries for line drawings.
//!
//! Style modules ([`canvas::StyleModule`]) build [`layer::StrokeLayer`]s of
//! annotated strokes, querying density maps through [`context_functions`] and
//! [`density`]. The [`canvas::Canvas`] runs them and hands every stroke, as
//! strip geometry, to a [`render::StrokeRenderer`].

pub mod canvas;
pub mod config;
pub mod context_functions;
pub mod density;
pub mod error;
pub mod gaussian;
pub mod gray_image;
pub mod layer;
#[cfg(feature = "preview")]
pub mod preview;
pub mod pyramid;
pub mod render;
pub mod steerable;
pub mod stroke;
pub mod stroke_rep;
pub mod types;

pub use canvas::{Canvas, CanvasContext, StyleModule};
pub use error::{Error, Result};
