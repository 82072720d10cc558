// Canvas: the style-module stack, the layers it produced, and the query
// state (density maps, steerable view map, size, time stamp) that style
// modules read through `CanvasContext`.
//
// Layers are kept in render order. Each module entry records the slot of the
// layer it owns; layers added by hand or left behind by `clear` own no module
// and are only ever touched by `erase`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, error, info, warn};

use crate::config::{Config, MapConfig};
use crate::error::{Error, Result};
use crate::gray_image::GrayImage;
use crate::layer::StrokeLayer;
use crate::pyramid::ImagePyramid;
use crate::render::{RenderMode, StrokeRenderer};
use crate::steerable::{EdgeId, SteerableViewMap};
use crate::types::{BBox, Vec2};

/// A stage of the stroke pipeline: reads the context, returns strokes.
pub trait StyleModule {
    fn name(&self) -> &str;

    fn execute(&mut self, cx: &mut CanvasContext) -> Result<StrokeLayer>;
}

struct StyleModuleEntry {
    module: Box<dyn StyleModule>,
    layer: usize,
    modified: bool,
    causal: bool,
    displayed: bool,
}

impl StyleModuleEntry {
    fn new(module: Box<dyn StyleModule>, layer: usize) -> Self {
        Self { module, layer, modified: true, causal: false, displayed: true }
    }
}

struct LoadedMap {
    file: PathBuf,
    sigma: f32,
    requested_levels: usize,
    pyramid: ImagePyramid,
}

/// Everything a style module may query while it runs.
pub struct CanvasContext {
    maps: HashMap<String, LoadedMap>,
    steerable: Option<Rc<SteerableViewMap>>,
    width: usize,
    height: usize,
    border: BBox,
    time_stamp: u32,
    selected_edge: Option<EdgeId>,
    map_defaults: MapConfig,
}

impl CanvasContext {
    fn new(width: usize, height: usize, map_defaults: MapConfig) -> Self {
        Self {
            maps: HashMap::new(),
            steerable: None,
            width,
            height,
            border: full_border(width, height),
            time_stamp: 0,
            selected_edge: None,
            map_defaults,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn border(&self) -> BBox {
        self.border
    }

    pub fn time_stamp(&self) -> u32 {
        self.time_stamp
    }

    pub fn selected_edge(&self) -> Option<EdgeId> {
        self.selected_edge
    }

    pub fn map_defaults(&self) -> &MapConfig {
        &self.map_defaults
    }

    /// Decode `file` as an 8-bit grayscale map and bind its Gaussian pyramid to
    /// `name`. Reloading the same file with the same parameters is a no-op.
    pub fn load_map(&mut self, file: &Path, name: &str, nb_levels: usize, sigma: f32) -> Result<()> {
        if let Some(m) = self.maps.get(name) {
            if m.file == file && m.requested_levels == nb_levels && m.sigma == sigma {
                debug!("map '{name}' already loaded from {file:?}");
                return Ok(());
            }
        }
        // A failed load must not leave a stale map readable under this name.
        self.maps.remove(name);

        let source = GrayImage::load(file).inspect_err(|e| error!("cannot load map '{name}': {e}"))?;
        let pyramid = ImagePyramid::gaussian(&source, nb_levels, sigma)?;
        info!("map '{name}': {}x{}, {} levels", pyramid.width(), pyramid.height(), pyramid.nb_levels());
        self.maps.insert(
            name.to_owned(),
            LoadedMap { file: file.to_path_buf(), sigma, requested_levels: nb_levels, pyramid },
        );
        Ok(())
    }

    /// [`CanvasContext::load_map`] with the configured level count and sigma.
    pub fn load_map_with_defaults(&mut self, file: &Path, name: &str) -> Result<()> {
        let MapConfig { default_levels, default_sigma } = self.map_defaults;
        self.load_map(file, name, default_levels, default_sigma)
    }

    pub fn map(&self, name: &str) -> Result<&ImagePyramid> {
        self.maps
            .get(name)
            .map(|m| &m.pyramid)
            .ok_or_else(|| Error::MapNotFound(name.to_owned()))
    }

    /// Value of map `name` at canvas point (x, y), y pointing up. Points off the
    /// image read 0.
    pub fn read_map_pixel(&self, name: &str, level: usize, x: i32, y: i32) -> Result<f32> {
        let pyramid = self.map(name)?;
        // Validate the level even when the point is off the image.
        pyramid.level(level)?;
        let (w, h) = (pyramid.width() as i32, pyramid.height() as i32);
        if x < 0 || x >= w || y < 0 || y >= h {
            return Ok(0.0);
        }
        pyramid.pixel(x as usize, (h - 1 - y) as usize, level)
    }

    pub fn steerable_view_map(&self) -> Option<&SteerableViewMap> {
        self.steerable.as_deref()
    }
}

fn full_border(width: usize, height: usize) -> BBox {
    BBox::new(Vec2::ZERO, Vec2::new(width as f32, height as f32))
}

pub struct Canvas {
    context: CanvasContext,
    modules: Vec<StyleModuleEntry>,
    layers: Vec<StrokeLayer>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            context: CanvasContext::new(width, height, MapConfig::default()),
            modules: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            context: CanvasContext::new(config.canvas.width, config.canvas.height, config.maps.clone()),
            modules: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn context(&self) -> &CanvasContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut CanvasContext {
        &mut self.context
    }

    // --- maps ---

    pub fn load_map(&mut self, file: impl AsRef<Path>, name: &str, nb_levels: usize, sigma: f32) -> Result<()> {
        self.context.load_map(file.as_ref(), name, nb_levels, sigma)
    }

    pub fn read_map_pixel(&self, name: &str, level: usize, x: i32, y: i32) -> Result<f32> {
        self.context.read_map_pixel(name, level, x, y)
    }

    pub fn steerable_view_map(&self) -> Option<&Rc<SteerableViewMap>> {
        self.context.steerable.as_ref()
    }

    /// Share a steerable view map with the canvas; it replaces any previous one.
    pub fn load_steerable_view_map(&mut self, svm: Rc<SteerableViewMap>) {
        self.context.steerable = Some(svm);
    }

    // --- geometry and selection ---

    pub fn width(&self) -> usize {
        self.context.width
    }

    pub fn height(&self) -> usize {
        self.context.height
    }

    /// Resizing also resets the border to the full canvas.
    pub fn set_size(&mut self, width: usize, height: usize) {
        self.context.width = width;
        self.context.height = height;
        self.context.border = full_border(width, height);
    }

    pub fn set_border(&mut self, border: BBox) {
        self.context.border = border;
    }

    pub fn select_edge(&mut self, edge: Option<EdgeId>) {
        self.context.selected_edge = edge;
    }

    // --- style-module stack ---

    pub fn style_modules_size(&self) -> usize {
        self.modules.len()
    }

    pub fn layers(&self) -> &[StrokeLayer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Result<&StrokeLayer> {
        let len = self.layers.len();
        self.layers.get(index).ok_or(Error::IndexOutOfRange { index, len })
    }

    pub fn layer_mut(&mut self, index: usize) -> Result<&mut StrokeLayer> {
        let len = self.layers.len();
        self.layers.get_mut(index).ok_or(Error::IndexOutOfRange { index, len })
    }

    /// Append a layer no module owns; it is rendered but never redrawn.
    pub fn add_layer(&mut self, layer: StrokeLayer) {
        self.layers.push(layer);
    }

    /// Slot of the layer owned by module `index`.
    pub fn module_layer(&self, index: usize) -> Result<usize> {
        self.check_index(index)?;
        Ok(self.modules[index].layer)
    }

    pub fn push_back_style_module(&mut self, module: Box<dyn StyleModule>) {
        debug!("push style module '{}'", module.name());
        self.layers.push(StrokeLayer::new());
        self.modules.push(StyleModuleEntry::new(module, self.layers.len() - 1));
    }

    /// Insert before `index`; `index == len` appends. The new layer goes right
    /// before the layer of the module currently at `index`.
    pub fn insert_style_module(&mut self, index: usize, module: Box<dyn StyleModule>) -> Result<()> {
        let len = self.modules.len();
        if index > len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        debug!("insert style module '{}' at {index}", module.name());
        let slot = self.modules.get(index).map_or(self.layers.len(), |m| m.layer);
        self.layers.insert(slot, StrokeLayer::new());
        for m in &mut self.modules {
            if m.layer >= slot {
                m.layer += 1;
            }
        }
        self.modules.insert(index, StyleModuleEntry::new(module, slot));
        Ok(())
    }

    /// Remove the module and the layer it owns.
    pub fn remove_style_module(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let entry = self.modules.remove(index);
        debug!("removed style module '{}'", entry.module.name());
        self.layers.remove(entry.layer);
        for m in &mut self.modules {
            if m.layer > entry.layer {
                m.layer -= 1;
            }
        }
        Ok(())
    }

    /// Swap two modules together with their layers' render positions.
    pub fn swap_style_modules(&mut self, i1: usize, i2: usize) -> Result<()> {
        self.check_index(i1)?;
        self.check_index(i2)?;
        let (l1, l2) = (self.modules[i1].layer, self.modules[i2].layer);
        self.modules.swap(i1, i2);
        self.layers.swap(l1, l2);
        self.modules[i1].layer = l1;
        self.modules[i2].layer = l2;
        Ok(())
    }

    /// The layer keeps the old module's strokes until the new one runs.
    pub fn replace_style_module(&mut self, index: usize, module: Box<dyn StyleModule>) -> Result<()> {
        self.check_index(index)?;
        let entry = &mut self.modules[index];
        debug!("replace style module '{}' with '{}'", entry.module.name(), module.name());
        entry.module = module;
        entry.modified = true;
        Ok(())
    }

    pub fn set_visible(&mut self, index: usize, visible: bool) -> Result<()> {
        self.check_index(index)?;
        self.modules[index].displayed = visible;
        Ok(())
    }

    pub fn is_visible(&self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        Ok(self.modules[index].displayed)
    }

    pub fn set_causal(&mut self, index: usize, causal: bool) -> Result<()> {
        self.check_index(index)?;
        self.modules[index].causal = causal;
        Ok(())
    }

    pub fn is_modified(&self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        Ok(self.modules[index].modified)
    }

    /// Modules that must re-run after the module at `index` changes: itself and
    /// every later module flagged causal.
    pub fn causal_style_modules(&self, index: usize) -> Result<Vec<usize>> {
        self.check_index(index)?;
        let mut out = vec![index];
        for (i, m) in self.modules.iter().enumerate().skip(index + 1) {
            if m.causal {
                out.push(i);
            }
        }
        Ok(out)
    }

    pub fn set_modified(&mut self, index: usize, modified: bool) -> Result<()> {
        for i in self.causal_style_modules(index)? {
            self.modules[i].modified = modified;
        }
        Ok(())
    }

    pub fn reset_modified(&mut self, modified: bool) {
        for m in &mut self.modules {
            m.modified = modified;
        }
    }

    /// Drop every style module. Strokes already computed stay in their layers,
    /// which no module owns anymore.
    pub fn clear(&mut self) {
        info!("clearing {} style modules", self.modules.len());
        self.modules.clear();
    }

    /// Drop every stroke, keeping modules and layer slots, owned or not.
    pub fn erase(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
    }

    pub fn stroke_count(&self) -> usize {
        self.layers.iter().map(StrokeLayer::len).sum()
    }

    // --- execution ---

    /// Run every style module in stack order, replacing its layer.
    pub fn draw(&mut self) -> Result<()> {
        if self.modules.is_empty() {
            return Ok(());
        }
        for i in 0..self.modules.len() {
            self.run_module(i)?;
        }
        self.reset_modified(false);
        info!("drew {} strokes from {} style modules", self.stroke_count(), self.modules.len());
        Ok(())
    }

    /// Re-run only the modules flagged modified, then clear the flags.
    pub fn update(&mut self) -> Result<()> {
        let mut ran = 0;
        for i in 0..self.modules.len() {
            if self.modules[i].modified {
                self.run_module(i)?;
                ran += 1;
            }
        }
        self.reset_modified(false);
        debug!("update re-ran {ran} style modules");
        Ok(())
    }

    fn run_module(&mut self, index: usize) -> Result<()> {
        let entry = &mut self.modules[index];
        let layer = entry.module.execute(&mut self.context).inspect_err(|e| {
            error!("style module '{}' failed: {e}", entry.module.name());
        })?;
        debug!("style module '{}' produced {} strokes", entry.module.name(), layer.len());
        self.layers[entry.layer] = layer;
        self.context.time_stamp += 1;
        Ok(())
    }

    /// Full-quality pass over every displayed layer.
    pub fn render(&self, renderer: &mut dyn StrokeRenderer) -> Result<()> {
        self.render_pass(renderer, RenderMode::Quality)
    }

    /// Basic pass over every displayed layer.
    pub fn render_basic(&self, renderer: &mut dyn StrokeRenderer) -> Result<()> {
        self.render_pass(renderer, RenderMode::Basic)
    }

    fn render_pass(&self, renderer: &mut dyn StrokeRenderer, mode: RenderMode) -> Result<()> {
        self.pre_draw(renderer, mode)?;
        let mut hidden = vec![false; self.layers.len()];
        for m in self.modules.iter().filter(|m| !m.displayed) {
            hidden[m.layer] = true;
        }
        for (layer, _) in self.layers.iter().zip(&hidden).filter(|(_, h)| !**h) {
            match mode {
                RenderMode::Quality => layer.render(renderer)?,
                RenderMode::Basic => layer.render_basic(renderer)?,
            }
        }
        self.post_draw(renderer, mode)
    }

    fn pre_draw(&self, renderer: &mut dyn StrokeRenderer, mode: RenderMode) -> Result<()> {
        if self.layers.is_empty() {
            warn!("rendering a canvas without layers");
        }
        renderer.begin_pass(mode)
    }

    fn post_draw(&self, renderer: &mut dyn StrokeRenderer, mode: RenderMode) -> Result<()> {
        renderer.end_pass(mode)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.modules.len();
        if index < len { Ok(()) } else { Err(Error::IndexOutOfRange { index, len }) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::TextStrokeRenderer;
    use crate::stroke::{Stroke, StrokeAttribute, StrokeVertex};
    use std::cell::Cell;
    use test_log::test;

    /// Emits one horizontal stroke at height `y` and counts its runs.
    struct Line {
        name: String,
        y: f32,
        runs: Rc<Cell<usize>>,
    }

    impl StyleModule for Line {
        fn name(&self) -> &str {
            &self.name
        }

        fn execute(&mut self, _cx: &mut CanvasContext) -> Result<StrokeLayer> {
            self.runs.set(self.runs.get() + 1);
            let attr = StrokeAttribute::default();
            let stroke = Stroke::new(vec![
                StrokeVertex::new(Vec2::new(0.0, self.y), attr),
                StrokeVertex::new(Vec2::new(10.0, self.y), attr),
            ]);
            Ok([stroke].into_iter().collect())
        }
    }

    fn line(name: &str, y: f32) -> (Box<dyn StyleModule>, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        (Box::new(Line { name: name.into(), y, runs: runs.clone() }), runs)
    }

    fn canvas_abc() -> (Canvas, [Rc<Cell<usize>>; 3]) {
        let mut c = Canvas::new(20, 20);
        let (a, ra) = line("A", 1.0);
        let (b, rb) = line("B", 2.0);
        let (m, rc) = line("C", 3.0);
        c.push_back_style_module(a);
        c.push_back_style_module(b);
        c.push_back_style_module(m);
        (c, [ra, rb, rc])
    }

    fn dumped_ys(c: &Canvas) -> Vec<String> {
        let mut r = TextStrokeRenderer::new(Vec::new(), 20, 20).unwrap();
        c.render(&mut r).unwrap();
        let text = String::from_utf8(r.finish().unwrap()).unwrap();
        text.lines().skip(4).map(|l| l.split(' ').nth(2).unwrap_or_default().to_owned()).collect()
    }

    #[test]
    fn causal_downstream_modules_are_included() {
        let (mut c, _) = canvas_abc();
        c.set_causal(0, false).unwrap();
        c.set_causal(2, true).unwrap();
        assert_eq!(c.causal_style_modules(1).unwrap(), vec![1, 2]);

        c.reset_modified(false);
        c.set_modified(1, true).unwrap();
        assert!(!c.is_modified(0).unwrap());
        assert!(c.is_modified(1).unwrap());
        assert!(c.is_modified(2).unwrap());
    }

    #[test]
    fn update_reruns_only_modified_modules() {
        let (mut c, runs) = canvas_abc();
        c.draw().unwrap();
        assert_eq!(runs.each_ref().map(|r| r.get()), [1, 1, 1]);
        assert_eq!(c.context().time_stamp(), 3);

        c.set_causal(2, true).unwrap();
        c.set_modified(1, true).unwrap();
        c.update().unwrap();
        assert_eq!(runs.each_ref().map(|r| r.get()), [1, 2, 2]);
        assert!(!c.is_modified(2).unwrap());
        assert_eq!(c.stroke_count(), 3);
    }

    #[test]
    fn stack_operations_are_bounds_checked() {
        let (mut c, _) = canvas_abc();
        let (d, _) = line("D", 4.0);
        assert!(matches!(
            c.insert_style_module(4, d),
            Err(Error::IndexOutOfRange { index: 4, len: 3 })
        ));
        assert!(matches!(c.remove_style_module(3), Err(Error::IndexOutOfRange { .. })));
        assert!(matches!(c.swap_style_modules(0, 7), Err(Error::IndexOutOfRange { .. })));
        assert!(matches!(c.set_visible(5, false), Err(Error::IndexOutOfRange { .. })));
        assert!(matches!(c.causal_style_modules(3), Err(Error::IndexOutOfRange { .. })));
        let (e, _) = line("E", 5.0);
        assert!(matches!(c.replace_style_module(3, e), Err(Error::IndexOutOfRange { .. })));
        assert_eq!(c.style_modules_size(), 3);
    }

    #[test]
    fn layers_follow_module_reordering() {
        let (mut c, _) = canvas_abc();
        c.draw().unwrap();
        assert_eq!(dumped_ys(&c), vec!["1", "2", "3"]);

        c.swap_style_modules(0, 2).unwrap();
        assert_eq!(dumped_ys(&c), vec!["3", "2", "1"]);

        c.remove_style_module(1).unwrap();
        assert_eq!(dumped_ys(&c), vec!["3", "1"]);

        let (d, _) = line("D", 4.0);
        c.insert_style_module(1, d).unwrap();
        c.draw().unwrap();
        assert_eq!(dumped_ys(&c), vec!["3", "4", "1"]);
    }

    #[test]
    fn hidden_modules_are_not_rendered() {
        let (mut c, _) = canvas_abc();
        c.draw().unwrap();
        c.set_visible(1, false).unwrap();
        assert!(!c.is_visible(1).unwrap());
        assert_eq!(dumped_ys(&c), vec!["1", "3"]);
    }

    #[test]
    fn clear_drops_modules_erase_drops_strokes() {
        let (mut c, runs) = canvas_abc();
        c.draw().unwrap();

        c.clear();
        assert_eq!(c.style_modules_size(), 0);
        assert_eq!(c.stroke_count(), 3);
        c.draw().unwrap();
        assert_eq!(runs[0].get(), 1);

        c.erase();
        assert_eq!(c.stroke_count(), 0);
        assert_eq!(c.layers().len(), 3);
    }

    #[test]
    fn reloading_after_clear_keeps_old_strokes() {
        let mut c = Canvas::new(20, 20);
        let (a, _) = line("A", 1.0);
        let (b, _) = line("B", 2.0);
        c.push_back_style_module(a);
        c.push_back_style_module(b);
        c.draw().unwrap();

        c.clear();
        let (d, runs_d) = line("D", 7.0);
        c.push_back_style_module(d);
        assert_eq!(c.module_layer(0).unwrap(), 2);
        c.draw().unwrap();
        assert_eq!(runs_d.get(), 1);
        assert_eq!(c.stroke_count(), 3);
        assert_eq!(c.layers().len(), 3);
        assert_eq!(dumped_ys(&c), vec!["1", "2", "7"]);

        c.set_visible(0, false).unwrap();
        assert_eq!(dumped_ys(&c), vec!["1", "2"]);
    }

    #[test]
    fn hand_added_layer_survives_draw() {
        let mut c = Canvas::new(20, 20);
        let attr = StrokeAttribute::default();
        let stroke = Stroke::new(vec![
            StrokeVertex::new(Vec2::new(0.0, 9.0), attr),
            StrokeVertex::new(Vec2::new(10.0, 9.0), attr),
        ]);
        c.add_layer([stroke].into_iter().collect());
        let (x, _) = line("X", 3.0);
        c.push_back_style_module(x);
        c.draw().unwrap();
        assert_eq!(c.stroke_count(), 2);
        assert_eq!(dumped_ys(&c), vec!["9", "3"]);

        // Stack edits move module layers only.
        let (y, _) = line("Y", 4.0);
        c.insert_style_module(0, y).unwrap();
        c.draw().unwrap();
        assert_eq!(dumped_ys(&c), vec!["9", "4", "3"]);
        c.swap_style_modules(0, 1).unwrap();
        assert_eq!(dumped_ys(&c), vec!["9", "3", "4"]);
        c.remove_style_module(1).unwrap();
        assert_eq!(dumped_ys(&c), vec!["9", "3"]);
        assert_eq!(c.module_layer(0).unwrap(), 1);
    }

    #[test]
    fn replaced_module_runs_on_next_update() {
        let (mut c, _) = canvas_abc();
        c.draw().unwrap();
        let (d, runs_d) = line("D", 9.0);
        c.replace_style_module(0, d).unwrap();
        assert!(c.is_modified(0).unwrap());
        assert_eq!(dumped_ys(&c)[0], "1");
        c.update().unwrap();
        assert_eq!(runs_d.get(), 1);
        assert_eq!(dumped_ys(&c)[0], "9");
    }

    #[test]
    fn unknown_map_is_reported() {
        let c = Canvas::new(10, 10);
        assert!(matches!(c.read_map_pixel("nope", 0, 1, 1), Err(Error::MapNotFound(n)) if n == "nope"));
    }

    #[test]
    fn failed_load_leaves_name_unbound() {
        let mut c = Canvas::new(10, 10);
        assert!(c.load_map("/nonexistent/map.png", "m", 4, 1.0).is_err());
        assert!(matches!(c.read_map_pixel("m", 0, 0, 0), Err(Error::MapNotFound(_))));
    }

    #[test]
    fn resizing_resets_border() {
        let mut c = Canvas::new(10, 10);
        c.set_border(BBox::new(Vec2::new(1.0, 1.0), Vec2::new(5.0, 5.0)));
        assert_eq!(c.context().border().width(), 4.0);
        c.set_size(30, 40);
        assert_eq!(c.context().border(), BBox::new(Vec2::ZERO, Vec2::new(30.0, 40.0)));
        assert_eq!((c.width(), c.height()), (30, 40));
    }
}
