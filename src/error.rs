// Error type for the whole library.
// Every variant states *where* things went wrong, so a log line is enough to act on.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A map was read before `load_map` bound anything under that name.
    #[error("map '{0}' has not been loaded")]
    MapNotFound(String),

    /// Style-module / layer stack addressed past its end.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Pyramid level past the coarsest one.
    #[error("pyramid level {level} out of range ({levels} levels)")]
    LevelOutOfRange { level: usize, levels: usize },

    #[error("steerable orientation {orientation} out of range ({count} maps)")]
    OrientationOutOfRange { orientation: usize, count: usize },

    /// Gaussian filters need a strictly positive, finite sigma.
    #[error("invalid gaussian sigma {0}")]
    InvalidSigma(f32),

    #[error("failed to load image {path:?}: {reason}")]
    ImageLoad { path: PathBuf, reason: String },

    #[error("image {path:?} has {bits} bits per pixel, expected {expected}")]
    UnsupportedDepth {
        path: PathBuf,
        bits: u16,
        expected: u16,
    },

    #[error("no steerable view map loaded on the canvas")]
    NoSteerableViewMap,

    /// A dump renderer was used after `close()`.
    #[error("renderer output already closed")]
    RendererClosed,

    /// Preview window could not be opened or updated.
    #[error("window error: {0}")]
    Window(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}
