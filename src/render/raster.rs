// Software rasterizer for strip geometry.
// Visual outcomes:
// - Quality passes paint in inverted ("light-subtracted") space: the canvas is
//   cleared to the complement of the paper, strokes add or max their complemented
//   color, and the end of the pass inverts everything back. Humid strokes darken
//   like glazes, dry strokes keep the darkest deposit, opaque strokes cover.
// - Basic passes alpha-blend raw colors onto the paper.

use std::path::Path;

use log::{debug, trace};

use crate::config::CanvasConfig;
use crate::error::Result;
use crate::render::texture::{TextureId, TextureManager, sample_brush};
use crate::render::{RenderMode, StrokeRenderer, complement};
use crate::stroke::MediumType;
use crate::stroke_rep::{StrokeRep, StrokeVertexRep};
use crate::types::{FrameBuffer, Vec2};

/// Factor applied to one side of an additive blend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinearBlendingFactor {
    Zero,
    One,
    SourceAlpha,
    OneMinusSourceAlpha,
}

impl LinearBlendingFactor {
    #[inline]
    fn value(self, src_alpha: f32) -> f32 {
        match self {
            LinearBlendingFactor::Zero => 0.0,
            LinearBlendingFactor::One => 1.0,
            LinearBlendingFactor::SourceAlpha => src_alpha,
            LinearBlendingFactor::OneMinusSourceAlpha => 1.0 - src_alpha,
        }
    }
}

/// Blend equation between an incoming fragment and the framebuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendingFunction {
    /// Component-wise maximum; factors are ignored.
    Max,
    /// `source * source_factor + destination * destination_factor`, saturated.
    Addition {
        source: LinearBlendingFactor,
        destination: LinearBlendingFactor,
    },
}

impl BlendingFunction {
    pub const ALPHA_OVER: BlendingFunction = BlendingFunction::Addition {
        source: LinearBlendingFactor::SourceAlpha,
        destination: LinearBlendingFactor::OneMinusSourceAlpha,
    };

    pub const GLAZE: BlendingFunction = BlendingFunction::Addition {
        source: LinearBlendingFactor::SourceAlpha,
        destination: LinearBlendingFactor::One,
    };

    /// Equation used for a medium on a given path.
    pub fn for_medium(medium: MediumType, mode: RenderMode) -> Self {
        match (mode, medium) {
            (RenderMode::Basic, _) => Self::ALPHA_OVER,
            (RenderMode::Quality, MediumType::DryMedium) => Self::Max,
            (RenderMode::Quality, MediumType::OpaqueMedium) => Self::ALPHA_OVER,
            (RenderMode::Quality, _) => Self::GLAZE,
        }
    }

    #[inline]
    pub fn apply(self, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
        match self {
            BlendingFunction::Max => [
                src[0].max(dst[0]),
                src[1].max(dst[1]),
                src[2].max(dst[2]),
                src[3].max(dst[3]),
            ],
            BlendingFunction::Addition { source, destination } => {
                let sf = source.value(src[3]);
                let df = destination.value(src[3]);
                let mut out = [0.0; 4];
                for c in 0..4 {
                    out[c] = (src[c] * sf + dst[c] * df).clamp(0.0, 1.0);
                }
                out
            }
        }
    }
}

/// Color a vertex sends to the rasterizer on each path.
#[inline]
pub fn shaded_color(v: &StrokeVertexRep, mode: RenderMode) -> [f32; 4] {
    match mode {
        RenderMode::Quality => [complement(v.color[0]), complement(v.color[1]), complement(v.color[2]), v.alpha],
        RenderMode::Basic => [v.color[0], v.color[1], v.color[2], v.alpha],
    }
}

/// RGBA float target; row 0 is the bottom of the canvas (y up).
#[derive(Clone, Debug, PartialEq)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    pixels: Vec<[f32; 4]>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![[0.0, 0.0, 0.0, 1.0]; width * height] }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn clear(&mut self, color: [f32; 4]) {
        self.pixels.iter_mut().for_each(|p| *p = color);
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [f32; 4] {
        self.pixels[y * self.width + x]
    }

    #[inline]
    fn blend(&mut self, x: usize, y: usize, src: [f32; 4], f: BlendingFunction) {
        let idx = y * self.width + x;
        self.pixels[idx] = f.apply(src, self.pixels[idx]);
    }

    /// Complement the color channels in place.
    pub fn invert(&mut self) {
        for p in &mut self.pixels {
            p[0] = complement(p[0]);
            p[1] = complement(p[1]);
            p[2] = complement(p[2]);
        }
    }

    /// Packed 0x00RRGGBB rows, top row first.
    pub fn to_frame_buffer(&self) -> FrameBuffer {
        let mut pixels = Vec::with_capacity(self.width * self.height);
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                let p = self.pixel(x, y);
                let to8 = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
                pixels.push((to8(p[0]) << 16) | (to8(p[1]) << 8) | to8(p[2]));
            }
        }
        FrameBuffer { width: self.width, height: self.height, pixels }
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.to_frame_buffer().to_rgb_image().save(path)?;
        Ok(())
    }
}

/// The "GL" backend: triangle strips rasterized with smooth shading, brush
/// texturing and per-medium blend equations.
pub struct RasterStrokeRenderer {
    framebuffer: Framebuffer,
    textures: TextureManager,
    paper_color: [f32; 3],
    paper: TextureId,
}

impl RasterStrokeRenderer {
    pub fn new(width: usize, height: usize, textures: TextureManager) -> Self {
        Self {
            framebuffer: Framebuffer::new(width, height),
            textures,
            paper_color: [1.0, 1.0, 1.0],
            paper: TextureId::NONE,
        }
    }

    pub fn from_config(config: &CanvasConfig, textures: TextureManager) -> Self {
        let mut r = Self::new(config.width, config.height, textures);
        r.paper_color = config.paper_color;
        if let Some(name) = &config.paper_texture {
            r.paper = r.textures.paper_texture(name);
        }
        r
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn textures_mut(&mut self) -> &mut TextureManager {
        &mut self.textures
    }

    pub fn set_paper_color(&mut self, color: [f32; 3]) {
        self.paper_color = color;
    }

    pub fn set_paper(&mut self, paper: TextureId) {
        self.paper = paper;
    }

    /// Lay the paper (tiled texture or flat color) over the whole canvas.
    fn lay_paper(&mut self, inverted: bool) {
        let fb = &mut self.framebuffer;
        let paper = self.textures.paper(self.paper);
        for y in 0..fb.height {
            for x in 0..fb.width {
                let mut c = match paper {
                    Some(img) => {
                        let px = img.get_pixel(x as u32 % img.width(), y as u32 % img.height());
                        [px[0] as f32 / 255.0, px[1] as f32 / 255.0, px[2] as f32 / 255.0]
                    }
                    None => self.paper_color,
                };
                if inverted {
                    c = c.map(complement);
                }
                fb.pixels[y * fb.width + x] = [c[0], c[1], c[2], 1.0];
            }
        }
    }

    fn draw(&mut self, rep: &StrokeRep<'_>, mode: RenderMode) {
        let texture = if rep.texture_id().is_none() {
            self.textures.default_brush(rep.medium_type())
        } else {
            rep.texture_id()
        };
        let blend = BlendingFunction::for_medium(rep.medium_type(), mode);
        trace!("stroke {}: {:?} with {blend:?}", rep.stroke().id(), rep.medium_type());

        let brush = self.textures.brush(texture);
        for strip in rep.strips() {
            for tri in strip.triangles() {
                rasterize(&mut self.framebuffer, tri, mode, blend, brush);
            }
        }
    }
}

impl StrokeRenderer for RasterStrokeRenderer {
    fn render_stroke_rep(&mut self, rep: &StrokeRep<'_>) -> Result<()> {
        self.draw(rep, RenderMode::Quality);
        Ok(())
    }

    fn render_stroke_rep_basic(&mut self, rep: &StrokeRep<'_>) -> Result<()> {
        self.draw(rep, RenderMode::Basic);
        Ok(())
    }

    fn begin_pass(&mut self, mode: RenderMode) -> Result<()> {
        debug!("raster pass start ({mode:?})");
        self.lay_paper(mode == RenderMode::Quality);
        Ok(())
    }

    fn end_pass(&mut self, mode: RenderMode) -> Result<()> {
        if mode == RenderMode::Quality {
            self.framebuffer.invert();
        }
        debug!("raster pass end ({mode:?})");
        Ok(())
    }
}

#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Shared edges of a strip must be filled exactly once, otherwise additive
/// media would double up along the diagonals.
#[inline]
fn owns_edge(a: Vec2, b: Vec2) -> bool {
    (a.y == b.y && b.x < a.x) || b.y < a.y
}

fn rasterize(
    fb: &mut Framebuffer,
    tri: [&StrokeVertexRep; 3],
    mode: RenderMode,
    blend: BlendingFunction,
    brush: Option<&crate::gray_image::GrayImage>,
) {
    let [mut v0, mut v1, v2] = tri;
    let mut area = edge(v0.point2d, v1.point2d, v2.point2d);
    if area.abs() <= f32::EPSILON {
        return;
    }
    if area < 0.0 {
        std::mem::swap(&mut v0, &mut v1);
        area = -area;
    }
    let (p0, p1, p2) = (v0.point2d, v1.point2d, v2.point2d);
    let (c0, c1, c2) = (shaded_color(v0, mode), shaded_color(v1, mode), shaded_color(v2, mode));

    let min_x = p0.x.min(p1.x).min(p2.x).floor().max(0.0) as usize;
    let min_y = p0.y.min(p1.y).min(p2.y).floor().max(0.0) as usize;
    let max_x = (p0.x.max(p1.x).max(p2.x).ceil().max(0.0) as usize).min(fb.width);
    let max_y = (p0.y.max(p1.y).max(p2.y).ceil().max(0.0) as usize).min(fb.height);

    let own = [owns_edge(p1, p2), owns_edge(p2, p0), owns_edge(p0, p1)];
    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w = [edge(p1, p2, p), edge(p2, p0, p), edge(p0, p1, p)];
            let inside = w.iter().zip(own).all(|(&e, o)| e > 0.0 || (e == 0.0 && o));
            if !inside {
                continue;
            }
            let (b0, b1, b2) = (w[0] / area, w[1] / area, w[2] / area);
            let mut src = [0.0; 4];
            for c in 0..4 {
                src[c] = b0 * c0[c] + b1 * c1[c] + b2 * c2[c];
            }
            if let Some(brush) = brush {
                let uv = v0.tex_coord * b0 + v1.tex_coord * b1 + v2.tex_coord * b2;
                let t = sample_brush(brush, uv.x, uv.y);
                src = [src[0] * t, src[1] * t, src[2] * t, src[3] * t];
            }
            fb.blend(x, y, src, blend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextureConfig;
    use crate::stroke::{Stroke, StrokeAttribute, StrokeVertex};
    use test_log::test;

    fn renderer(w: usize, h: usize) -> RasterStrokeRenderer {
        let config = TextureConfig { brushes_dir: "/nonexistent".into(), ..TextureConfig::default() };
        RasterStrokeRenderer::new(w, h, TextureManager::new(config))
    }

    fn horizontal(y: f32, color: [f32; 3], alpha: f32, medium: MediumType) -> Stroke {
        let attr = StrokeAttribute { color, alpha, thickness: [3.0, 3.0], visible: true };
        Stroke::new(vec![
            StrokeVertex::new(Vec2::new(2.0, y), attr),
            StrokeVertex::new(Vec2::new(30.0, y), attr),
        ])
        .with_medium(medium)
    }

    fn pass(r: &mut RasterStrokeRenderer, strokes: &[Stroke], mode: RenderMode) {
        r.begin_pass(mode).unwrap();
        for s in strokes {
            match mode {
                RenderMode::Quality => s.render(r).unwrap(),
                RenderMode::Basic => s.render_basic(r).unwrap(),
            }
        }
        r.end_pass(mode).unwrap();
    }

    #[test]
    fn blend_equations_per_medium() {
        use BlendingFunction as B;
        assert_eq!(B::for_medium(MediumType::DryMedium, RenderMode::Quality), B::Max);
        assert_eq!(B::for_medium(MediumType::OpaqueMedium, RenderMode::Quality), B::ALPHA_OVER);
        assert_eq!(B::for_medium(MediumType::HumidMedium, RenderMode::Quality), B::GLAZE);
        assert_eq!(B::for_medium(MediumType::Textured, RenderMode::Quality), B::GLAZE);
        assert_eq!(B::for_medium(MediumType::DryMedium, RenderMode::Basic), B::ALPHA_OVER);

        let src = [0.5, 0.9, 0.4, 0.2];
        let dst = [0.9, 0.1, 0.4, 0.3];
        assert_eq!(B::Max.apply(src, dst), [0.9, 0.9, 0.4, 0.3]);
        let glazed = B::GLAZE.apply([1.0, 1.0, 1.0, 0.5], [0.8, 0.0, 0.2, 1.0]);
        assert_eq!(glazed, [1.0, 0.5, 0.7, 1.0]);
    }

    #[test]
    fn quality_path_complements_basic_path_does_not() {
        let v = StrokeVertexRep {
            point2d: Vec2::ZERO,
            color: [0.2, 0.7, 1.3],
            alpha: 0.4,
            tex_coord: Vec2::ZERO,
        };
        let basic = shaded_color(&v, RenderMode::Basic);
        let quality = shaded_color(&v, RenderMode::Quality);
        assert_eq!(basic, [0.2, 0.7, 1.3, 0.4]);
        assert_eq!(quality, [0.8, 1.0 - 0.7, 0.0, 0.4]);
        for c in 0..3 {
            assert_eq!(complement(basic[c]), quality[c]);
        }
    }

    #[test]
    fn opaque_stroke_reads_back_its_color_on_both_paths() {
        let s = horizontal(16.0, [0.3, 0.6, 0.9], 1.0, MediumType::OpaqueMedium);
        for mode in [RenderMode::Quality, RenderMode::Basic] {
            let mut r = renderer(32, 32);
            pass(&mut r, std::slice::from_ref(&s), mode);
            let p = r.framebuffer().pixel(16, 16);
            for (got, want) in p.iter().zip([0.3, 0.6, 0.9]) {
                assert!((got - want).abs() < 1e-5, "{mode:?}: {p:?}");
            }
            assert_eq!(r.framebuffer().pixel(16, 2), [1.0, 1.0, 1.0, 1.0]);
        }
    }

    #[test]
    fn humid_strokes_darken_where_they_overlap() {
        let a = horizontal(16.0, [0.5, 0.5, 0.5], 0.5, MediumType::HumidMedium);
        let b = horizontal(17.0, [0.5, 0.5, 0.5], 0.5, MediumType::HumidMedium);
        let mut r = renderer(32, 32);
        pass(&mut r, &[a, b], RenderMode::Quality);
        let single = r.framebuffer().pixel(16, 13)[0];
        let double = r.framebuffer().pixel(16, 16)[0];
        assert!((single - 0.75).abs() < 1e-5, "{single}");
        assert!((double - 0.5).abs() < 1e-5, "{double}");
    }

    #[test]
    fn dry_strokes_keep_darkest_deposit() {
        let light = horizontal(16.0, [0.8, 0.8, 0.8], 1.0, MediumType::DryMedium);
        let dark = horizontal(16.0, [0.2, 0.2, 0.2], 1.0, MediumType::DryMedium);
        let mut r = renderer(32, 32);
        pass(&mut r, &[dark.clone(), light.clone()], RenderMode::Quality);
        let first = r.framebuffer().pixel(16, 16);
        pass(&mut r, &[light, dark], RenderMode::Quality);
        assert_eq!(first, r.framebuffer().pixel(16, 16));
        assert!((first[0] - 0.2).abs() < 1e-5);
    }

    #[test]
    fn shared_strip_edges_are_filled_once() {
        // A glaze at alpha 1 would saturate to black on a double hit.
        let s = horizontal(16.0, [0.5, 0.5, 0.5], 0.5, MediumType::HumidMedium);
        let mut r = renderer(32, 32);
        pass(&mut r, &[s], RenderMode::Quality);
        for x in 3..29 {
            for y in 14..18 {
                let v = r.framebuffer().pixel(x, y)[0];
                assert!((v - 0.75).abs() < 1e-5, "({x},{y}) = {v}");
            }
        }
    }

    #[test]
    fn brush_texture_modulates_coverage() {
        let mut r = renderer(32, 32);
        let id = r.textures_mut().insert_brush("blank", crate::gray_image::GrayImage::new(4, 4));
        let mut s = horizontal(16.0, [0.0, 0.0, 0.0], 1.0, MediumType::OpaqueMedium);
        s.set_texture_id(id);
        pass(&mut r, &[s], RenderMode::Basic);
        assert_eq!(r.framebuffer().pixel(16, 16), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn frame_buffer_export_is_top_down() {
        let mut fb = Framebuffer::new(2, 2);
        fb.clear([0.0, 0.0, 0.0, 1.0]);
        fb.pixels[0] = [1.0, 0.0, 0.0, 1.0]; // bottom-left
        let packed = fb.to_frame_buffer();
        assert_eq!(packed.pixels[2], 0x00FF_0000);
        assert_eq!(packed.pixels[0], 0);
    }
}
