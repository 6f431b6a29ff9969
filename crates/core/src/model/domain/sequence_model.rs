use std::path::{Path, PathBuf};

use super::fit_history::FitHistory;
use super::hyperparameters::Hyperparameters;
use super::model_error::ModelError;
use crate::corpus::domain::training_set::TrainingSet;

/// Where and how a fit call runs.
#[derive(Clone, Debug)]
pub struct FitOptions {
    pub epochs: usize,
    pub hyperparameters: Hyperparameters,
    /// Checkpoint targets refreshed whenever validation loss improves.
    pub model_path: PathBuf,
    pub weights_path: PathBuf,
    pub logs_dir: PathBuf,
    /// File name of the per-epoch CSV log inside `logs_dir`.
    pub training_log: String,
    /// Continue an earlier run: the epoch log is appended, not truncated.
    pub resume: bool,
}

impl FitOptions {
    pub fn training_log_path(&self) -> PathBuf {
        self.logs_dir.join(&self.training_log)
    }
}

/// A trainable model whose architecture is opaque to the pipeline.
pub trait SequenceModel: Send {
    /// Shape `(a, b)` of one input row.
    fn input_shape(&self) -> (usize, usize);

    fn fit(&mut self, data: &dyn TrainingSet, options: &FitOptions)
        -> Result<FitHistory, ModelError>;

    /// Persist the definition and weights separately and as one combined file.
    fn save_model_and_weights(
        &self,
        model_path: &Path,
        weights_path: &Path,
        combined_path: &Path,
    ) -> Result<(), ModelError>;
}

/// Builds fresh models or restores persisted ones.
pub trait ModelFactory: Send + Sync {
    fn create(
        &self,
        input_shape: (usize, usize),
        hyperparameters: &Hyperparameters,
    ) -> Result<Box<dyn SequenceModel>, ModelError>;

    fn load_model_and_weights(
        &self,
        model_path: &Path,
        weights_path: &Path,
    ) -> Result<Box<dyn SequenceModel>, ModelError>;

    fn load_combined(&self, combined_path: &Path) -> Result<Box<dyn SequenceModel>, ModelError>;
}
