use std::path::{Path, PathBuf};

use crate::model::domain::hyperparameters::Hyperparameters;
use crate::shared::constants::{
    COMBINED_FILENAME, DEFAULT_TRAINING_LOG, MODEL_FILENAME, TRAINING_DUMP_FILENAME,
    WEIGHTS_FILENAME,
};

/// Inputs and output locations of one training run.
///
/// Both path lists empty means "train from the existing dump".
#[derive(Clone, Debug)]
pub struct TrainRequest {
    pub av_paths: Vec<PathBuf>,
    pub subtitle_paths: Vec<PathBuf>,
    pub model_dir: PathBuf,
    pub weights_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub dump_dir: PathBuf,
    /// File name of the epoch log inside `logs_dir`.
    pub training_log: String,
    /// Continue from the saved model and weights (dump runs only).
    pub resume: bool,
    pub hyperparameters: Hyperparameters,
}

impl TrainRequest {
    /// Standard layout under `output_dir`: `model/`, `weights/`, `logs/`,
    /// with the dump at the root.
    pub fn new(output_dir: &Path) -> Self {
        Self {
            av_paths: Vec::new(),
            subtitle_paths: Vec::new(),
            model_dir: output_dir.join("model"),
            weights_dir: output_dir.join("weights"),
            logs_dir: output_dir.join("logs"),
            dump_dir: output_dir.to_path_buf(),
            training_log: DEFAULT_TRAINING_LOG.to_string(),
            resume: false,
            hyperparameters: Hyperparameters::default(),
        }
    }

    pub fn with_inputs(mut self, av_paths: Vec<PathBuf>, subtitle_paths: Vec<PathBuf>) -> Self {
        self.av_paths = av_paths;
        self.subtitle_paths = subtitle_paths;
        self
    }

    pub fn dump_path(&self) -> PathBuf {
        self.dump_dir.join(TRAINING_DUMP_FILENAME)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(MODEL_FILENAME)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.weights_dir.join(WEIGHTS_FILENAME)
    }

    pub fn combined_path(&self) -> PathBuf {
        self.model_dir.join(COMBINED_FILENAME)
    }
}
