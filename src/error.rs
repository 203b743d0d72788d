//! Error types
//!
//! Render faults are recorded on the surface that hit them and never cross the
//! worker boundary as panics. Configuration errors are raised while settings
//! are validated, before anything is rendered.

use std::path::PathBuf;

/// Why a page surface ended up without a base rendering
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderFault {
    #[error("content for spread {index} is unavailable")]
    ContentUnavailable { index: usize },

    #[error("rendering spread {index} produced no bitmap")]
    RenderFailure { index: usize },

    #[error("degenerate geometry {width}x{height}")]
    GeometryDegenerate { width: i32, height: i32 },
}

/// Rejected viewer configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("fling {which} threshold must be positive, got {value}")]
    InvalidFlingThreshold { which: &'static str, value: f32 },

    #[error("page gap must not be negative, got {0}")]
    InvalidPageGap(i32),

    #[error("invalid color {0:?}, expected #RRGGBB")]
    InvalidColor(String),

    #[error("settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings parse: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{detail}")]
    Generic { detail: String },
}

impl ConfigError {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Errors from the image directory page provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decoding page image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("no page images found in {0}")]
    EmptyDirectory(PathBuf),

    #[error("{detail}")]
    Generic { detail: String },
}

impl ProviderError {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}
