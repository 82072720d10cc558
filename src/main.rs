// What you GET from one run:
// • strokes.png        the full-quality pass (media blending, brush textures, paper).
// • strokes_basic.png  the basic pass (plain alpha blending, raw colors).
// • strokes.eps        the same strips as flat-filled PostScript triangles.
// • strokes.txt        one line of vertex attributes per stroke.
// • svm/               every level of the steerable view map used for the densities.
// With `--features preview` the quality pass is also shown in a window (ESC quits).
//
// Usage: freestyle [CONFIG.json] [OUT_DIR]

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use log::{info, warn};

use freestyle_strokes::config::Config;
use freestyle_strokes::density::{
    DensityF1D, IntegrationType, Interface1D, Polyline, ReadMapPixelF0D, SteerableViewMapDensityF1D, UnaryFunction0D,
    UnaryFunction1D, ViewMapQuery,
};
use freestyle_strokes::gaussian::PixelSource;
use freestyle_strokes::gray_image::GrayImage;
use freestyle_strokes::layer::StrokeLayer;
use freestyle_strokes::render::{
    PsStrokeRenderer, RasterStrokeRenderer, StrokeRenderer, TextStrokeRenderer, TextureManager,
};
use freestyle_strokes::steerable::SteerableViewMap;
use freestyle_strokes::stroke::{MediumType, Stroke, StrokeAttribute, StrokeVertex};
use freestyle_strokes::types::Vec2;
use freestyle_strokes::{Canvas, CanvasContext, StyleModule};

/// Name the demo density map is bound to on the canvas.
const SHADE_MAP: &str = "shade";

/// Hatching: evenly spaced lines across the canvas. Thickness follows the
/// shade map (darker map, thicker line), opacity drops where the drawing
/// already has many parallel edges.
struct Hatching {
    name: String,
    spacing: f32,
    vertical: bool,
    medium: MediumType,
    color: [f32; 3],
}

impl Hatching {
    fn lines(&self, w: f32, h: f32) -> Vec<Polyline> {
        let (across, along) = if self.vertical { (w, h) } else { (h, w) };
        let mut out = Vec::new();
        let mut t = self.spacing;
        while t < across {
            let pts: Vec<(f32, f32)> = (0..=16)
                .map(|k| {
                    let s = along * k as f32 / 16.0;
                    if self.vertical { (t, s) } else { (s, t) }
                })
                .collect();
            out.push(Polyline::from_xy(&pts));
            t += self.spacing;
        }
        out
    }
}

impl StyleModule for Hatching {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, cx: &mut CanvasContext) -> freestyle_strokes::Result<StrokeLayer> {
        let shade = ReadMapPixelF0D::new(SHADE_MAP, 1);
        let crowding = SteerableViewMapDensityF1D(ViewMapQuery { level: 1, ..ViewMapQuery::default() });
        let mean_shade = DensityF1D::new(shade.clone(), IntegrationType::Mean, 4.0);

        let mut layer = StrokeLayer::new();
        for (i, line) in self.lines(cx.width() as f32, cx.height() as f32).into_iter().enumerate() {
            // Skip lines that run through almost white areas.
            if mean_shade.evaluate(cx, &line)? > 0.9 {
                continue;
            }
            let alpha = (1.0 - 0.5 * crowding.evaluate(cx, &line)?).clamp(0.2, 1.0);
            let mut vertices = Vec::new();
            for p in line.vertices() {
                let density = shade.evaluate(cx, &p)?;
                let half_width = 0.5 + 2.5 * (1.0 - density);
                let attribute = StrokeAttribute { color: self.color, alpha, thickness: [half_width; 2], visible: true };
                vertices.push(StrokeVertex::new(p.point2d(), attribute));
            }
            layer.add_stroke(Stroke::new(vertices).with_id(i as u32).with_medium(self.medium));
        }
        info!("{}: {} strokes", self.name, layer.len());
        Ok(layer)
    }
}

/// Radial shade: dark in the middle, white at the rim.
fn shade_image(w: usize, h: usize) -> GrayImage {
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let r = cx.min(cy);
    GrayImage::from_fn(w, h, |x, y| {
        let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt() / r;
        d.clamp(0.0, 1.0)
    })
}

/// A grid of horizontal and vertical lines, split by orientation.
fn grid_view_map(w: usize, h: usize, spacing: usize, config: &Config) -> anyhow::Result<SteerableViewMap> {
    let mut svm = SteerableViewMap::default();
    let line = 32.0 / 255.0;
    let horizontal = GrayImage::from_fn(w, h, |_, y| if y % spacing == 0 { line } else { 0.0 });
    let vertical = GrayImage::from_fn(w, h, |x, _| if x % spacing == 0 { line } else { 0.0 });
    let complete = GrayImage::from_fn(w, h, |x, y| horizontal.pixel(x, y) + vertical.pixel(x, y));
    let empty = GrayImage::new(w, h);
    let bases = [horizontal, empty.clone(), vertical, empty, complete];
    svm.build_images_pyramids(&bases, config.steerable.nb_levels, config.steerable.sigma)
        .context("building steerable view map")?;
    svm.add_edge(1, Vec2::new(1.0, 0.0));
    svm.add_edge(2, Vec2::new(0.0, 1.0));
    Ok(svm)
}

fn render_outputs(canvas: &Canvas, config: &Config, out_dir: &Path) -> anyhow::Result<RasterStrokeRenderer> {
    let (w, h) = (canvas.width(), canvas.height());

    let mut raster = RasterStrokeRenderer::from_config(&config.canvas, TextureManager::new(config.textures.clone()));
    canvas.render_basic(&mut raster)?;
    raster.framebuffer().save_png(&out_dir.join("strokes_basic.png"))?;
    canvas.render(&mut raster)?;
    raster.framebuffer().save_png(&out_dir.join("strokes.png"))?;

    let mut ps = PsStrokeRenderer::create(&out_dir.join("strokes.eps"), w, h)?;
    canvas.render(&mut ps)?;
    ps.close()?;

    let mut text = TextStrokeRenderer::create(&out_dir.join("strokes.txt"), w, h)?;
    canvas.render(&mut text)?;
    text.close()?;

    Ok(raster)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => Config::load(Path::new(&path)).with_context(|| format!("reading config {path}"))?,
        None => Config::load_or_default(Path::new("freestyle.json")),
    };
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "out".into()));
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut canvas = Canvas::from_config(&config);
    let (w, h) = (canvas.width(), canvas.height());
    info!("canvas {w}x{h}, writing to {}", out_dir.display());

    /* --- Density inputs ---
       Visual: strokes get thicker where the shade map is dark. */
    let shade_path = out_dir.join("shade.png");
    shade_image(w, h).save_png(&shade_path)?;
    canvas
        .context_mut()
        .load_map_with_defaults(&shade_path, SHADE_MAP)
        .context("loading shade map")?;

    let svm = grid_view_map(w, h, 24, &config)?;
    if let Err(e) = svm.save_levels(&out_dir.join("svm")) {
        warn!("could not dump steerable view map: {e}");
    }
    canvas.load_steerable_view_map(Rc::new(svm));

    /* --- Style modules ---
       Visual: a dry horizontal hatch under a humid vertical one. */
    canvas.push_back_style_module(Box::new(Hatching {
        name: "horizontal hatching".into(),
        spacing: 9.0,
        vertical: false,
        medium: MediumType::DryMedium,
        color: [0.15, 0.1, 0.05],
    }));
    canvas.push_back_style_module(Box::new(Hatching {
        name: "vertical hatching".into(),
        spacing: 13.0,
        vertical: true,
        medium: MediumType::HumidMedium,
        color: [0.1, 0.2, 0.45],
    }));
    canvas.set_causal(1, true)?;
    canvas.draw().context("running style modules")?;
    info!("{} strokes on the canvas", canvas.stroke_count());

    let raster = render_outputs(&canvas, &config, &out_dir)?;

    #[cfg(feature = "preview")]
    {
        use freestyle_strokes::preview::Preview;
        Preview::new("Freestyle strokes", w, h)?.show(&raster.framebuffer().to_frame_buffer())?;
    }
    #[cfg(not(feature = "preview"))]
    drop(raster);

    Ok(())
}
