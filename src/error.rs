use std::collections::TryReserveError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("grid {width}x{height} is empty or has more cells than fit in memory")]
    InvalidGrid { width: usize, height: usize },
    #[error("cell size must be finite and positive (got {0})")]
    InvalidCellSize(f32),
    #[error("failed to allocate field storage for {cells} cells: {source}")]
    Allocation {
        cells: usize,
        #[source]
        source: TryReserveError,
    },
    #[error("failed to read config {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
