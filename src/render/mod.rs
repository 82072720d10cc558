//! Stroke renderers.
//!
//! Every backend consumes [`StrokeRep`]s strip by strip, vertex by vertex. Two
//! entry points exist: the full-quality path, which simulates painterly media
//! with per-medium blend equations, and the basic path for targets without a
//! generalized blend equation. Backends that need to prepare or finish a target
//! do so in [`StrokeRenderer::begin_pass`] / [`StrokeRenderer::end_pass`], which
//! the canvas calls around every render pass.

pub mod postscript;
pub mod raster;
pub mod text;
pub mod texture;

use std::io::Write;

use log::warn;

use crate::error::{Error, Result};
use crate::stroke_rep::StrokeRep;

pub use postscript::PsStrokeRenderer;
pub use raster::{BlendingFunction, Framebuffer, LinearBlendingFactor, RasterStrokeRenderer};
pub use text::TextStrokeRenderer;
pub use texture::{TextureId, TextureManager};

/// Which of the two render paths a pass uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Quality,
    Basic,
}

pub trait StrokeRenderer {
    /// Full-quality path: colors are complemented and blended per medium.
    fn render_stroke_rep(&mut self, rep: &StrokeRep<'_>) -> Result<()>;

    /// Fallback path: raw colors, plain alpha blending.
    fn render_stroke_rep_basic(&mut self, rep: &StrokeRep<'_>) -> Result<()>;

    fn begin_pass(&mut self, _mode: RenderMode) -> Result<()> {
        Ok(())
    }

    fn end_pass(&mut self, _mode: RenderMode) -> Result<()> {
        Ok(())
    }

    /// Release the output. Calling it more than once is harmless.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// `max(0, 1 - c)`: stroke colors are authored as densities and turned into
/// light-subtracted colors by the quality path.
#[inline]
pub fn complement(c: f32) -> f32 {
    (1.0 - c).max(0.0)
}

/// Write side shared by the file-dump renderers; closes exactly once.
pub(crate) struct DumpOutput<W: Write> {
    out: Option<W>,
}

impl<W: Write> DumpOutput<W> {
    pub(crate) fn new(out: W) -> Self {
        Self { out: Some(out) }
    }

    pub(crate) fn writer(&mut self) -> Result<&mut W> {
        self.out.as_mut().ok_or(Error::RendererClosed)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.out.is_some()
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        if let Some(mut w) = self.out.take() {
            w.flush()?;
        }
        Ok(())
    }

    pub(crate) fn take(&mut self) -> Result<W> {
        let mut w = self.out.take().ok_or(Error::RendererClosed)?;
        w.flush()?;
        Ok(w)
    }

    pub(crate) fn close_on_drop(&mut self, what: &str) {
        if let Err(e) = self.close() {
            warn!("{what}: failed to close output: {e}");
        }
    }
}
