use std::path::PathBuf;

use laguna_scene::GeometryError;
use thiserror::Error;

/// Errors raised while loading models or resolving assets.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error("invalid model {path}: {source}")]
    InvalidModel {
        path: PathBuf,
        #[source]
        source: GeometryError,
    },

    /// Every candidate path failed for this `(type, variant)`.
    #[error("no candidate resolved for {entity_type}/{variant} after {attempts} attempts")]
    NoCandidate {
        entity_type: String,
        variant: String,
        attempts: usize,
    },
}
