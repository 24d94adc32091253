//! Error types for fixture resolution and serving.

use std::io;
use std::path::PathBuf;

use crate::document::PayloadFormat;

/// Failures while resolving or reading a named resource.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Malformed resource reference: {0}")]
    Malformed(String),
    #[error("Failed to read resource {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to open entry {entry} in archive {}: {source}", .archive.display())]
    Archive {
        archive: PathBuf,
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Errors surfaced to callers of [`GhostService::serve`](crate::GhostService::serve).
#[derive(Debug, thiserror::Error)]
pub enum GhostError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("Failed to parse {format} payload: {message}")]
    Parse {
        format: PayloadFormat,
        message: String,
    },
    #[error("Failed to serialize {format} payload: {message}")]
    Serialize {
        format: PayloadFormat,
        message: String,
    },
    #[error("Fixture loader task failed: {0}")]
    LoaderPanicked(String),
}

pub type GhostResult<T> = Result<T, GhostError>;
