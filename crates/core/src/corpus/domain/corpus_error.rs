use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid corpus dump {path}: {reason}")]
    Format { path: PathBuf, reason: String },
    #[error("corpus dump {path} has no dataset '{name}'")]
    MissingDataset { path: PathBuf, name: String },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("dataset '{name}' in {path} is not aligned for f32 access")]
    Misaligned { path: PathBuf, name: String },
}
