use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::model_error::ModelError;
use crate::shared::constants::DEFAULT_EPOCHS;

/// Training knobs that are not part of the model definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    pub batch_size: usize,
    /// Trailing fraction of rows held out for validation.
    pub validation_split: f32,
    pub learning_rate: f32,
    /// Epochs without validation-loss improvement before stopping.
    pub patience: usize,
    pub epochs: usize,
    /// Seeds shuffling and initialization; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            batch_size: 32,
            validation_split: 0.25,
            learning_rate: 0.01,
            patience: 1_000_000,
            epochs: DEFAULT_EPOCHS,
            seed: None,
        }
    }
}

impl Hyperparameters {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let text = fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
        let params: Self =
            serde_json::from_str(&text).map_err(|e| ModelError::format(path, e.to_string()))?;
        params.validate().map_err(|e| ModelError::format(path, e))?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be positive".into());
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(format!(
                "validation_split must be in [0.0, 1.0), got {}",
                self.validation_split
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        if self.epochs == 0 {
            return Err("epochs must be at least 1".into());
        }
        if self.patience == 0 {
            return Err("patience must be at least 1".into());
        }
        Ok(())
    }
}
