// Plain-text dump: one line per stroke, every vertex as
// `u x y z thickness_left thickness_right r g b`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::error::Result;
use crate::render::{DumpOutput, StrokeRenderer};
use crate::stroke_rep::StrokeRep;

pub struct TextStrokeRenderer<W: Write> {
    out: DumpOutput<W>,
}

impl TextStrokeRenderer<BufWriter<File>> {
    pub fn create(path: &Path, width: usize, height: usize) -> Result<Self> {
        info!("writing stroke dump to {path:?}");
        Self::new(BufWriter::new(File::create(path)?), width, height)
    }
}

impl<W: Write> TextStrokeRenderer<W> {
    pub fn new(mut out: W, width: usize, height: usize) -> Result<Self> {
        writeln!(out, "%!FREESTYLE")?;
        writeln!(out, "%Creator: freestyle-strokes")?;
        writeln!(out, "%BoundingBox: 0 0 {width} {height}")?;
        writeln!(out, "%u x y z tleft tright r g b ...")?;
        Ok(Self { out: DumpOutput::new(out) })
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.take()
    }
}

impl<W: Write> StrokeRenderer for TextStrokeRenderer<W> {
    fn render_stroke_rep(&mut self, rep: &StrokeRep<'_>) -> Result<()> {
        self.render_stroke_rep_basic(rep)
    }

    fn render_stroke_rep_basic(&mut self, rep: &StrokeRep<'_>) -> Result<()> {
        let out = self.out.writer()?;
        let fields: Vec<String> = rep
            .stroke()
            .vertices()
            .iter()
            .map(|v| {
                let a = &v.attribute;
                format!(
                    "{} {} {} {} {} {} {} {} {}",
                    v.u(),
                    v.point.x,
                    v.point.y,
                    v.z,
                    a.thickness_l(),
                    a.thickness_r(),
                    a.color[0],
                    a.color[1],
                    a.color[2]
                )
            })
            .collect();
        writeln!(out, "{}", fields.join(" "))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.out.close()
    }
}

impl<W: Write> Drop for TextStrokeRenderer<W> {
    fn drop(&mut self) {
        self.out.close_on_drop("text renderer");
    }
}
