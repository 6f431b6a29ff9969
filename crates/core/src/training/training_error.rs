use std::path::PathBuf;

use thiserror::Error;

use crate::corpus::domain::corpus_error::CorpusError;
use crate::model::domain::model_error::ModelError;

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error(
        "media and subtitle lists must both be empty or have equal length (got {media} and {subtitles})"
    )]
    MismatchedInputs { media: usize, subtitles: usize },
    #[error("no training data: {0}")]
    EmptyCorpus(String),
    #[error("invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
