// Brush and paper textures, loaded from disk on demand and cached by name.
// A texture that cannot be loaded is reported once and maps to `TextureId::NONE`,
// which renderers treat as "untextured".

use std::collections::HashMap;
use std::path::Path;

use log::{debug, error, info};

use crate::config::TextureConfig;
use crate::gaussian::PixelSource;
use crate::gray_image::GrayImage;
use crate::stroke::MediumType;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

impl TextureId {
    pub const NONE: TextureId = TextureId(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Kind {
    Brush,
    Paper,
}

enum Texture {
    /// Luminance that modulates both color and alpha.
    Brush(GrayImage),
    Paper(image::RgbaImage),
}

pub struct TextureManager {
    config: TextureConfig,
    textures: Vec<Texture>, // id n lives at index n - 1
    by_name: HashMap<(Kind, String), TextureId>,
}

impl TextureManager {
    pub fn new(config: TextureConfig) -> Self {
        Self { config, textures: Vec::new(), by_name: HashMap::new() }
    }

    /// Brush file name configured for a medium.
    pub fn default_brush_name(&self, medium: MediumType) -> &str {
        let b = &self.config.default_brushes;
        match medium {
            MediumType::DryMedium => &b.dry,
            MediumType::HumidMedium => &b.humid,
            MediumType::OpaqueMedium => &b.opaque,
            MediumType::Textured => &b.textured,
        }
    }

    pub fn default_brush(&mut self, medium: MediumType) -> TextureId {
        let name = self.default_brush_name(medium).to_owned();
        self.brush_texture(&name)
    }

    /// 8-bit grayscale brush from the brushes directory.
    pub fn brush_texture(&mut self, name: &str) -> TextureId {
        let path = self.config.brushes_dir.join(name);
        self.get_or_load(Kind::Brush, name, &path, |p| {
            GrayImage::load(p).map(Texture::Brush).map_err(|e| e.to_string())
        })
    }

    /// 32-bit RGBA paper from the papers directory.
    pub fn paper_texture(&mut self, name: &str) -> TextureId {
        let path = self.config.papers_dir.join(name);
        self.get_or_load(Kind::Paper, name, &path, load_paper)
    }

    /// Register an in-memory brush. A brush already bound to `name` is replaced
    /// in place and keeps its id.
    pub fn insert_brush(&mut self, name: &str, brush: GrayImage) -> TextureId {
        let key = (Kind::Brush, name.to_owned());
        if let Some(&id) = self.by_name.get(&key) {
            if let Some(slot) = (id.0 as usize).checked_sub(1).and_then(|i| self.textures.get_mut(i)) {
                debug!("replacing brush '{name}' ({})", id.0);
                *slot = Texture::Brush(brush);
                return id;
            }
        }
        self.textures.push(Texture::Brush(brush));
        let id = TextureId(self.textures.len() as u32);
        self.by_name.insert(key, id);
        id
    }

    pub fn brush(&self, id: TextureId) -> Option<&GrayImage> {
        match self.get(id)? {
            Texture::Brush(img) => Some(img),
            Texture::Paper(_) => None,
        }
    }

    pub fn paper(&self, id: TextureId) -> Option<&image::RgbaImage> {
        match self.get(id)? {
            Texture::Paper(img) => Some(img),
            Texture::Brush(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    fn get(&self, id: TextureId) -> Option<&Texture> {
        (id.0 as usize).checked_sub(1).and_then(|i| self.textures.get(i))
    }

    fn get_or_load(
        &mut self,
        kind: Kind,
        name: &str,
        path: &Path,
        load: impl FnOnce(&Path) -> Result<Texture, String>,
    ) -> TextureId {
        let key = (kind, name.to_owned());
        if let Some(id) = self.by_name.get(&key) {
            return *id;
        }
        let id = match load(path) {
            Ok(t) => {
                self.textures.push(t);
                let id = TextureId(self.textures.len() as u32);
                info!("loaded {kind:?} texture '{name}' as {}", id.0);
                id
            }
            Err(reason) => {
                error!("cannot load {kind:?} texture {path:?}: {reason}");
                TextureId::NONE
            }
        };
        // Failures are cached too so a missing file is reported once.
        self.by_name.insert(key, id);
        id
    }
}

fn load_paper(path: &Path) -> Result<Texture, String> {
    let img = image::open(path).map_err(|e| e.to_string())?;
    let bits = img.color().bits_per_pixel();
    if img.color() != image::ColorType::Rgba8 {
        return Err(format!("{bits} bits per pixel, paper textures must be 32-bit RGBA"));
    }
    debug!("paper {path:?}: {}x{}", img.width(), img.height());
    Ok(Texture::Paper(img.into_rgba8()))
}

/// Nearest sample of a brush: repeats along the stroke (u), clamps across (v).
pub fn sample_brush(brush: &GrayImage, u: f32, v: f32) -> f32 {
    let (w, h) = (brush.width(), brush.height());
    if w == 0 || h == 0 {
        return 1.0;
    }
    let x = ((u.rem_euclid(1.0) * w as f32) as usize).min(w - 1);
    let y = ((v.clamp(0.0, 1.0) * (h - 1) as f32).round() as usize).min(h - 1);
    brush.pixel(x, y)
}
