use std::path::Path;

use ndarray::{Array1, Array2, Array3, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::artifact_io::{read_artifact, write_artifact, Artifact, NamedTensor};
use super::csv_epoch_log::CsvEpochLog;
use crate::corpus::domain::training_set::TrainingSet;
use crate::model::domain::fit_history::{EpochMetrics, FitHistory};
use crate::model::domain::hyperparameters::Hyperparameters;
use crate::model::domain::model_error::ModelError;
use crate::model::domain::sequence_model::{FitOptions, ModelFactory, SequenceModel};

const ARCHITECTURE: &str = "logistic";
const KERNEL: &str = "dense/kernel";
const BIAS: &str = "dense/bias";
const EPSILON: f32 = 1e-7;

#[derive(Debug, Serialize, Deserialize)]
struct ModelDefinition {
    architecture: String,
    input_shape: (usize, usize),
}

/// Single dense unit with a sigmoid output over the flattened input row.
///
/// Trained with binary cross-entropy and plain mini-batch SGD.
#[derive(Debug, Clone)]
pub struct LogisticNetwork {
    input_shape: (usize, usize),
    kernel: Array1<f32>,
    bias: f32,
}

impl LogisticNetwork {
    /// Glorot-uniform kernel, zero bias.
    pub fn new<R: Rng + ?Sized>(input_shape: (usize, usize), rng: &mut R) -> Self {
        let fan_in = input_shape.0 * input_shape.1;
        let limit = (6.0 / (fan_in + 1) as f32).sqrt();
        let kernel = Array1::from_shape_fn(fan_in, |_| rng.gen_range(-limit..=limit));
        Self {
            input_shape,
            kernel,
            bias: 0.0,
        }
    }

    pub fn kernel(&self) -> ArrayView1<'_, f32> {
        self.kernel.view()
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// Sigmoid outputs for a batch of rows.
    pub fn predict(&self, rows: &Array3<f32>) -> Result<Array1<f32>, ModelError> {
        let (_, a, b) = rows.dim();
        if (a, b) != self.input_shape {
            return Err(ModelError::ShapeMismatch {
                expected: self.input_shape,
                found: (a, b),
            });
        }
        let logits = flatten(rows).dot(&self.kernel) + self.bias;
        Ok(logits.mapv(sigmoid))
    }

    fn step(&mut self, rows: &Array3<f32>, labels: &Array1<f32>, lr: f32) -> Result<(), ModelError> {
        let n = labels.len();
        if n == 0 {
            return Ok(());
        }
        let predictions = self.predict(rows)?;
        let error = &predictions - labels;
        let kernel_grad = flatten(rows).t().dot(&error) / n as f32;
        let bias_grad = error.sum() / n as f32;
        self.kernel.scaled_add(-lr, &kernel_grad);
        self.bias -= lr * bias_grad;
        Ok(())
    }

    /// Mean binary cross-entropy and accuracy over `indices`.
    fn evaluate(
        &self,
        data: &dyn TrainingSet,
        indices: &[usize],
        batch_size: usize,
    ) -> Result<(f32, f32), ModelError> {
        if indices.is_empty() {
            return Ok((f32::NAN, f32::NAN));
        }
        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        for chunk in indices.chunks(batch_size) {
            let (rows, labels) = data.batch(chunk);
            let predictions = self.predict(&rows)?;
            for (&p, &y) in predictions.iter().zip(labels.iter()) {
                let p = p.clamp(EPSILON, 1.0 - EPSILON);
                loss_sum -= (y * p.ln() + (1.0 - y) * (1.0 - p).ln()) as f64;
                if (p >= 0.5) == (y >= 0.5) {
                    correct += 1;
                }
            }
        }
        let n = indices.len() as f64;
        Ok(((loss_sum / n) as f32, (correct as f64 / n) as f32))
    }

    fn definition_json(&self, path: &Path) -> Result<String, ModelError> {
        let definition = ModelDefinition {
            architecture: ARCHITECTURE.to_string(),
            input_shape: self.input_shape,
        };
        serde_json::to_string(&definition).map_err(|e| ModelError::format(path, e.to_string()))
    }

    fn weight_tensors(&self, path: &Path) -> Result<[NamedTensor<'_>; 2], ModelError> {
        let kernel = self
            .kernel
            .as_slice()
            .ok_or_else(|| ModelError::format(path, "kernel is not contiguous"))?;
        Ok([
            NamedTensor {
                name: KERNEL,
                shape: vec![kernel.len()],
                data: kernel,
            },
            NamedTensor {
                name: BIAS,
                shape: vec![1],
                data: std::slice::from_ref(&self.bias),
            },
        ])
    }

    fn save_checkpoint(&self, model_path: &Path, weights_path: &Path) -> Result<(), ModelError> {
        write_artifact(model_path, Some(&self.definition_json(model_path)?), &[])?;
        write_artifact(weights_path, None, &self.weight_tensors(weights_path)?)
    }

    fn from_artifacts(
        definition: &Artifact,
        definition_path: &Path,
        weights: &Artifact,
        weights_path: &Path,
    ) -> Result<Self, ModelError> {
        let text = definition
            .definition
            .as_deref()
            .ok_or_else(|| ModelError::format(definition_path, "missing model definition"))?;
        let definition: ModelDefinition = serde_json::from_str(text)
            .map_err(|e| ModelError::format(definition_path, e.to_string()))?;
        if definition.architecture != ARCHITECTURE {
            return Err(ModelError::format(
                definition_path,
                format!("unknown architecture '{}'", definition.architecture),
            ));
        }

        let fan_in = definition.input_shape.0 * definition.input_shape.1;
        let (kernel_shape, kernel) = weights.tensor(weights_path, KERNEL)?;
        if kernel_shape.as_slice() != [fan_in] {
            return Err(ModelError::format(
                weights_path,
                format!("kernel shape {kernel_shape:?} does not match input size {fan_in}"),
            ));
        }
        let (bias_shape, bias) = weights.tensor(weights_path, BIAS)?;
        if bias_shape.as_slice() != [1] || bias.len() != 1 {
            return Err(ModelError::format(
                weights_path,
                format!("bias shape {bias_shape:?}, expected [1]"),
            ));
        }

        Ok(Self {
            input_shape: definition.input_shape,
            kernel: Array1::from_vec(kernel.clone()),
            bias: bias[0],
        })
    }
}

impl SequenceModel for LogisticNetwork {
    fn input_shape(&self) -> (usize, usize) {
        self.input_shape
    }

    fn fit(&mut self, data: &dyn TrainingSet, options: &FitOptions) -> Result<FitHistory, ModelError> {
        if data.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if data.input_shape() != self.input_shape {
            return Err(ModelError::ShapeMismatch {
                expected: self.input_shape,
                found: data.input_shape(),
            });
        }

        let hp = &options.hyperparameters;
        let n = data.len();
        let n_val = validation_count(n, hp.validation_split);
        let mut train_indices: Vec<usize> = (0..n - n_val).collect();
        let val_indices: Vec<usize> = (n - n_val..n).collect();
        log::info!(
            "Training on {} rows, validating on {} rows",
            train_indices.len(),
            val_indices.len()
        );

        let mut rng = match hp.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut epoch_log = CsvEpochLog::open(&options.training_log_path(), options.resume)?;
        let mut history = FitHistory::default();
        let mut best_val_loss = f32::INFINITY;
        let mut stale_epochs = 0usize;

        for epoch in 0..options.epochs {
            train_indices.shuffle(&mut rng);
            for chunk in train_indices.chunks(hp.batch_size) {
                let (rows, labels) = data.batch(chunk);
                self.step(&rows, &labels, hp.learning_rate)?;
            }

            let (loss, acc) = self.evaluate(data, &train_indices, hp.batch_size)?;
            let (val_loss, val_acc) = if val_indices.is_empty() {
                (loss, acc)
            } else {
                self.evaluate(data, &val_indices, hp.batch_size)?
            };
            let metrics = EpochMetrics {
                loss,
                acc,
                val_loss,
                val_acc,
            };
            epoch_log.append(epoch, &metrics)?;
            history.push(metrics);
            log::debug!(
                "Epoch {epoch}: loss={loss:.4} acc={acc:.4} val_loss={val_loss:.4} val_acc={val_acc:.4}"
            );

            if val_loss < best_val_loss {
                best_val_loss = val_loss;
                stale_epochs = 0;
                self.save_checkpoint(&options.model_path, &options.weights_path)?;
            } else {
                stale_epochs += 1;
                if stale_epochs >= hp.patience {
                    log::info!("Early stopping at epoch {epoch}: no improvement in {stale_epochs} epochs");
                    break;
                }
            }
        }

        Ok(history)
    }

    fn save_model_and_weights(
        &self,
        model_path: &Path,
        weights_path: &Path,
        combined_path: &Path,
    ) -> Result<(), ModelError> {
        self.save_checkpoint(model_path, weights_path)?;
        write_artifact(
            combined_path,
            Some(&self.definition_json(combined_path)?),
            &self.weight_tensors(combined_path)?,
        )?;
        log::info!("Saved model to {}", combined_path.display());
        Ok(())
    }
}

/// One flattened input row per batch row.
fn flatten(rows: &Array3<f32>) -> Array2<f32> {
    let (n, a, b) = rows.dim();
    Array2::from_shape_fn((n, a * b), |(r, k)| rows[[r, k / b, k % b]])
}

/// Trailing rows held out for validation; at least one row stays for training.
fn validation_count(rows: usize, split: f32) -> usize {
    if rows < 2 || split <= 0.0 {
        return 0;
    }
    let count = ((rows as f32) * split).floor() as usize;
    count.clamp(1, rows - 1)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Builds and restores [`LogisticNetwork`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogisticNetworkFactory;

impl ModelFactory for LogisticNetworkFactory {
    fn create(
        &self,
        input_shape: (usize, usize),
        hyperparameters: &Hyperparameters,
    ) -> Result<Box<dyn SequenceModel>, ModelError> {
        let mut rng = match hyperparameters.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Box::new(LogisticNetwork::new(input_shape, &mut rng)))
    }

    fn load_model_and_weights(
        &self,
        model_path: &Path,
        weights_path: &Path,
    ) -> Result<Box<dyn SequenceModel>, ModelError> {
        let definition = read_artifact(model_path)?;
        let weights = read_artifact(weights_path)?;
        let network =
            LogisticNetwork::from_artifacts(&definition, model_path, &weights, weights_path)?;
        log::info!(
            "Loaded model from {} and weights from {}",
            model_path.display(),
            weights_path.display()
        );
        Ok(Box::new(network))
    }

    fn load_combined(&self, combined_path: &Path) -> Result<Box<dyn SequenceModel>, ModelError> {
        let artifact = read_artifact(combined_path)?;
        let network =
            LogisticNetwork::from_artifacts(&artifact, combined_path, &artifact, combined_path)?;
        Ok(Box::new(network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::domain::training_set::InMemoryTrainingSet;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::fs;
    use std::path::PathBuf;

    fn separable_set(rows: usize) -> InMemoryTrainingSet {
        let features = Array3::from_shape_fn((rows, 2, 1), |(n, i, _)| {
            let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
            sign * (1.0 + i as f32)
        });
        let labels = Array1::from_shape_fn(rows, |n| if n % 2 == 0 { 1.0 } else { 0.0 });
        InMemoryTrainingSet::new(features, labels)
    }

    fn options(dir: &Path, epochs: usize) -> FitOptions {
        FitOptions {
            epochs,
            hyperparameters: Hyperparameters {
                batch_size: 4,
                learning_rate: 0.5,
                seed: Some(7),
                ..Default::default()
            },
            model_path: dir.join("model").join("model.hdf5"),
            weights_path: dir.join("weights").join("weights.hdf5"),
            logs_dir: dir.join("logs"),
            training_log: "training.log".into(),
            resume: false,
        }
    }

    fn network(input_shape: (usize, usize)) -> LogisticNetwork {
        LogisticNetwork::new(input_shape, &mut StdRng::seed_from_u64(1))
    }

    #[rstest]
    #[case::tiny(1, 0.25, 0)]
    #[case::no_split(10, 0.0, 0)]
    #[case::quarter(8, 0.25, 2)]
    #[case::rounds_up_to_one(3, 0.25, 1)]
    #[case::keeps_one_for_training(2, 0.9, 1)]
    fn test_validation_count(#[case] rows: usize, #[case] split: f32, #[case] expected: usize) {
        assert_eq!(validation_count(rows, split), expected);
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_fit_learns_separable_data() {
        let dir = tempfile::tempdir().unwrap();
        let data = separable_set(16);
        let mut model = network((2, 1));

        let history = model.fit(&data, &options(dir.path(), 30)).unwrap();

        assert_eq!(history.epochs(), 30);
        assert_relative_eq!(*history.acc.last().unwrap(), 1.0);
        assert!(history.loss.last().unwrap() < &history.loss[0]);
        assert!(history.best_val_loss().unwrap() < 0.3);
    }

    #[test]
    fn test_fit_writes_log_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), 3);
        let mut model = network((2, 1));
        model.fit(&separable_set(8), &opts).unwrap();

        let text = fs::read_to_string(opts.training_log_path()).unwrap();
        assert_eq!(text.lines().next().unwrap(), "epoch,acc,loss,val_acc,val_loss");
        assert_eq!(text.lines().count(), 4);
        assert!(opts.model_path.exists());
        assert!(opts.weights_path.exists());
    }

    #[test]
    fn test_resume_appends_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path(), 2);
        let mut model = network((2, 1));
        model.fit(&separable_set(8), &opts).unwrap();
        opts.resume = true;
        model.fit(&separable_set(8), &opts).unwrap();

        let text = fs::read_to_string(opts.training_log_path()).unwrap();
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_early_stopping_halts_on_plateau() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path(), 50);
        opts.hyperparameters.patience = 2;
        opts.hyperparameters.learning_rate = 1e-12;
        // Constant labels with zero inputs: loss cannot move.
        let data = InMemoryTrainingSet::new(Array3::zeros((8, 2, 1)), Array1::ones(8));
        let mut model = network((2, 1));

        let history = model.fit(&data, &opts).unwrap();
        assert_eq!(history.epochs(), 3);
    }

    #[test]
    fn test_fit_rejects_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = network((3, 1));
        let err = model
            .fit(&separable_set(8), &options(dir.path(), 1))
            .unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_fit_rejects_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let data = InMemoryTrainingSet::new(Array3::zeros((0, 2, 1)), Array1::zeros(0));
        let err = network((2, 1))
            .fit(&data, &options(dir.path(), 1))
            .unwrap_err();
        assert!(matches!(err, ModelError::EmptyTrainingSet));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let model = network((2, 1));
        let model_path = dir.path().join("model.hdf5");
        let weights_path = dir.path().join("weights.hdf5");
        let combined_path = dir.path().join("combined.hdf5");
        model
            .save_model_and_weights(&model_path, &weights_path, &combined_path)
            .unwrap();

        let factory = LogisticNetworkFactory;
        let separate = factory
            .load_model_and_weights(&model_path, &weights_path)
            .unwrap();
        let combined = factory.load_combined(&combined_path).unwrap();
        assert_eq!(separate.input_shape(), (2, 1));
        assert_eq!(combined.input_shape(), (2, 1));

        let artifact = read_artifact(&combined_path).unwrap();
        let restored =
            LogisticNetwork::from_artifacts(&artifact, &combined_path, &artifact, &combined_path)
                .unwrap();
        let rows = Array3::from_shape_fn((3, 2, 1), |(n, i, _)| n as f32 - i as f32);
        let expected = model.predict(&rows).unwrap();
        let actual = restored.predict(&rows).unwrap();
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *e);
        }
        assert_relative_eq!(restored.bias(), model.bias());
    }

    #[test]
    fn test_load_missing_weights_is_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.hdf5");
        write_artifact(&model_path, Some(&network((2, 1)).definition_json(&model_path).unwrap()), &[]).unwrap();

        let err = LogisticNetworkFactory
            .load_model_and_weights(&model_path, &PathBuf::from("/nonexistent/weights.hdf5"))
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::MissingArtifact(_)));
    }

    #[test]
    fn test_load_rejects_kernel_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.hdf5");
        let weights_path = dir.path().join("weights.hdf5");
        network((2, 1))
            .save_checkpoint(&model_path, &weights_path)
            .unwrap();
        // Overwrite the definition with a larger input shape.
        write_artifact(&model_path, Some(&network((4, 1)).definition_json(&model_path).unwrap()), &[]).unwrap();

        let err = LogisticNetworkFactory
            .load_model_and_weights(&model_path, &weights_path)
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::Format { .. }));
    }

    #[test]
    fn test_factory_seed_is_deterministic() {
        let hp = Hyperparameters {
            seed: Some(11),
            ..Default::default()
        };
        let a = LogisticNetwork::new((3, 2), &mut StdRng::seed_from_u64(11));
        let b = LogisticNetwork::new((3, 2), &mut StdRng::seed_from_u64(11));
        assert_eq!(a.kernel(), b.kernel());
        assert_eq!(a.bias(), 0.0);
        assert_eq!(
            LogisticNetworkFactory.create((3, 2), &hp).unwrap().input_shape(),
            (3, 2)
        );
    }
}
