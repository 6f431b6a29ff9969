use std::path::PathBuf;

use thiserror::Error;

/// Failures that media and subtitle collaborators report for a single input.
///
/// Both variants are recognized by the extraction coordinator: the sample is
/// excluded from the corpus and the batch continues.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("unsupported format for {path}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },
    #[error("cannot process {path}: {reason}")]
    Terminal { path: PathBuf, reason: String },
}

impl MediaError {
    pub fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn terminal(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Terminal {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_path() {
        let err = MediaError::unsupported("/data/clip.xyz", "no audio stream");
        let msg = err.to_string();
        assert!(msg.contains("/data/clip.xyz"));
        assert!(msg.contains("no audio stream"));
    }

    #[test]
    fn test_terminal_downcasts_from_boxed_error() {
        let boxed: Box<dyn std::error::Error + Send + Sync> =
            Box::new(MediaError::terminal("a.srt", "missing"));
        assert!(matches!(
            boxed.downcast_ref::<MediaError>(),
            Some(MediaError::Terminal { .. })
        ));
    }
}
