// Pipeline configuration, read from a JSON file.
// Every section and field falls back to its default when missing, so a config
// file only needs to mention what it changes.

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasConfig,
    /// Defaults used by `load_map` when the caller passes none.
    pub maps: MapConfig,
    pub steerable: SteerableConfig,
    pub textures: TextureConfig,
}

/// Output surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: usize,
    pub height: usize,
    /// Flat paper color used when no paper texture is set (or it fails to load).
    pub paper_color: [f32; 3],
    /// File name under `textures.papers_dir`.
    pub paper_texture: Option<String>,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self { width: 640, height: 480, paper_color: [1.0, 1.0, 1.0], paper_texture: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub default_levels: usize,
    pub default_sigma: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self { default_levels: 4, default_sigma: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteerableConfig {
    /// 0 means "reduce until a single pixel".
    pub nb_levels: usize,
    pub sigma: f32,
}

impl Default for SteerableConfig {
    fn default() -> Self {
        Self { nb_levels: 0, sigma: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    pub brushes_dir: PathBuf,
    pub papers_dir: PathBuf,
    pub default_brushes: DefaultBrushes,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            brushes_dir: PathBuf::from("textures/brushes"),
            papers_dir: PathBuf::from("textures/papers"),
            default_brushes: DefaultBrushes::default(),
        }
    }
}

/// Brush file name per medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultBrushes {
    pub dry: String,
    pub humid: String,
    pub opaque: String,
    pub textured: String,
}

impl Default for DefaultBrushes {
    fn default() -> Self {
        Self {
            dry: "charcoalAlpha.png".into(),
            humid: "washbrushAlpha.png".into(),
            opaque: "opaqueBrushAlpha.png".into(),
            textured: "oil.png".into(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Like [`Config::load`], but a missing or broken file means defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("ignoring config: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
