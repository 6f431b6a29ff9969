use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model artifact not found: {0}")]
    MissingArtifact(PathBuf),
    #[error("invalid model artifact {path}: {reason}")]
    Format { path: PathBuf, reason: String },
    #[error("model expects input shape {expected:?}, data has {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,
}

impl ModelError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::MissingArtifact(path)
        } else {
            Self::Io { path, source }
        }
    }

    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
