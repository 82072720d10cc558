// Encapsulated PostScript dump of strip geometry.
// Each strip triangle becomes one flat-filled path colored by its leading vertex.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::error::Result;
use crate::render::{DumpOutput, StrokeRenderer};
use crate::stroke_rep::StrokeRep;

pub struct PsStrokeRenderer<W: Write> {
    out: DumpOutput<W>,
}

impl PsStrokeRenderer<BufWriter<File>> {
    pub fn create(path: &Path, width: usize, height: usize) -> Result<Self> {
        info!("writing PostScript strokes to {path:?}");
        Self::new(BufWriter::new(File::create(path)?), width, height)
    }
}

impl<W: Write> PsStrokeRenderer<W> {
    /// Writes the EPS header immediately; the bounding box is the canvas.
    pub fn new(mut out: W, width: usize, height: usize) -> Result<Self> {
        writeln!(out, "%!PS-Adobe-2.0 EPSF-2.0")?;
        writeln!(out, "%%Creator: freestyle-strokes")?;
        writeln!(out, "%%BoundingBox: 0 0 {width} {height}")?;
        writeln!(out, "%%EndComments")?;
        Ok(Self { out: DumpOutput::new(out) })
    }

    /// Close and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.out.take()
    }
}

impl<W: Write> StrokeRenderer for PsStrokeRenderer<W> {
    fn render_stroke_rep(&mut self, rep: &StrokeRep<'_>) -> Result<()> {
        self.render_stroke_rep_basic(rep)
    }

    fn render_stroke_rep_basic(&mut self, rep: &StrokeRep<'_>) -> Result<()> {
        let out = self.out.writer()?;
        for strip in rep.strips() {
            for [a, b, c] in strip.triangles() {
                let [r, g, bl] = a.color;
                writeln!(out, "newpath")?;
                writeln!(out, "{r} {g} {bl} setrgbcolor")?;
                writeln!(out, "{} {} moveto", a.point2d.x, a.point2d.y)?;
                writeln!(out, "{} {} lineto", b.point2d.x, b.point2d.y)?;
                writeln!(out, "{} {} lineto", c.point2d.x, c.point2d.y)?;
                writeln!(out, "closepath")?;
                writeln!(out, "fill")?;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.out.close()
    }
}

impl<W: Write> Drop for PsStrokeRenderer<W> {
    fn drop(&mut self) {
        self.out.close_on_drop("PostScript renderer");
    }
}
