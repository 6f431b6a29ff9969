use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::train_request::TrainRequest;
use super::training_error::TrainingError;
use super::training_logger::TrainingLogger;
use crate::corpus::domain::normalization::normalize;
use crate::corpus::domain::training_set::{InMemoryTrainingSet, TrainingSet};
use crate::corpus::infrastructure::corpus_dump::{CorpusDump, DumpTrainingSet};
use crate::extraction::extraction_coordinator::ExtractionCoordinator;
use crate::extraction::extraction_report::ExtractionReport;
use crate::model::domain::fit_history::FitHistory;
use crate::model::domain::sequence_model::{FitOptions, ModelFactory, SequenceModel};

/// Where the training rows of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusOrigin {
    FreshExtraction,
    TrainingDump,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub origin: CorpusOrigin,
    /// Shape `(a, b)` of one model input row.
    pub input_shape: (usize, usize),
    pub history: FitHistory,
    /// Present only for fresh extraction.
    pub report: Option<ExtractionReport>,
    pub combined_path: PathBuf,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy)]
enum TrainingState {
    Start,
    DecideSource,
    Extracting,
    LoadingDump,
    CorpusReady,
    Fitting,
    ArtifactSaved,
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "START",
            Self::DecideSource => "DECIDE_SOURCE",
            Self::Extracting => "EXTRACTING",
            Self::LoadingDump => "LOADING_DUMP",
            Self::CorpusReady => "CORPUS_READY",
            Self::Fitting => "FITTING",
            Self::ArtifactSaved => "ARTIFACT_SAVED",
        };
        f.write_str(name)
    }
}

fn enter(state: TrainingState) {
    log::debug!("Training state: {state}");
}

/// Orchestrates one training run: picks the corpus source, prepares the
/// rows, fits the model and persists the artifact.
///
/// Built once; `train` never mutates the trainer.
pub struct Trainer {
    coordinator: ExtractionCoordinator,
    factory: Box<dyn ModelFactory>,
}

impl Trainer {
    pub fn new(coordinator: ExtractionCoordinator, factory: Box<dyn ModelFactory>) -> Self {
        Self {
            coordinator,
            factory,
        }
    }

    pub fn train(
        &self,
        request: &TrainRequest,
        logger: &mut dyn TrainingLogger,
    ) -> Result<TrainingOutcome, TrainingError> {
        let started = Instant::now();
        enter(TrainingState::Start);
        request
            .hyperparameters
            .validate()
            .map_err(TrainingError::InvalidHyperparameters)?;

        enter(TrainingState::DecideSource);
        let media = request.av_paths.len();
        let subtitles = request.subtitle_paths.len();
        match (media, subtitles) {
            (0, 0) => self.train_from_dump(request, logger, started),
            (m, s) if m == s => self.train_fresh(request, logger, started),
            _ => Err(TrainingError::MismatchedInputs { media, subtitles }),
        }
    }

    fn train_from_dump(
        &self,
        request: &TrainRequest,
        logger: &mut dyn TrainingLogger,
        started: Instant,
    ) -> Result<TrainingOutcome, TrainingError> {
        enter(TrainingState::LoadingDump);
        let dump_path = request.dump_path();
        logger.info(&format!("Training from dump {}", dump_path.display()));

        let dump = CorpusDump::open(&dump_path)?;
        if dump.is_empty() {
            return Err(TrainingError::EmptyCorpus(format!(
                "training dump {} has no rows",
                dump_path.display()
            )));
        }
        let data = DumpTrainingSet::new(&dump)?;
        enter(TrainingState::CorpusReady);
        let input_shape = data.input_shape();
        log::info!("Input shape: {input_shape:?} ({} rows)", data.len());

        let model = if request.resume {
            logger.info("Resuming from saved model and weights");
            self.factory
                .load_model_and_weights(&request.model_path(), &request.weights_path())?
        } else {
            self.factory.create(input_shape, &request.hyperparameters)?
        };

        self.fit_and_persist(model, &data, request, logger, started)
            .map(|(history, elapsed)| TrainingOutcome {
                origin: CorpusOrigin::TrainingDump,
                input_shape,
                history,
                report: None,
                combined_path: request.combined_path(),
                elapsed,
            })
    }

    fn train_fresh(
        &self,
        request: &TrainRequest,
        logger: &mut dyn TrainingLogger,
        started: Instant,
    ) -> Result<TrainingOutcome, TrainingError> {
        if request.resume {
            log::warn!("Resume is only honored when training from a dump; starting from scratch");
        }

        enter(TrainingState::Extracting);
        let (corpus, report) =
            self.coordinator
                .extract(&request.av_paths, &request.subtitle_paths, logger)?;
        if corpus.is_empty() {
            return Err(TrainingError::EmptyCorpus(format!(
                "none of {} samples produced training rows",
                report.total()
            )));
        }
        CorpusDump::write(&request.dump_path(), &corpus)?;

        let mut rng = seeded_rng(request.hyperparameters.seed);
        let (features, labels) = corpus.permute_jointly(&mut rng).into_parts();
        drop(corpus);
        let (features, _) = normalize(features.view()).ok_or_else(|| {
            TrainingError::EmptyCorpus("extracted corpus has no rows".to_string())
        })?;
        let data = InMemoryTrainingSet::new(features, labels);
        enter(TrainingState::CorpusReady);
        let input_shape = data.input_shape();
        log::info!("Input shape: {input_shape:?} ({} rows)", data.len());

        let model = self.factory.create(input_shape, &request.hyperparameters)?;

        self.fit_and_persist(model, &data, request, logger, started)
            .map(|(history, elapsed)| TrainingOutcome {
                origin: CorpusOrigin::FreshExtraction,
                input_shape,
                history,
                report: Some(report),
                combined_path: request.combined_path(),
                elapsed,
            })
    }

    /// Shared tail of both branches.
    fn fit_and_persist(
        &self,
        mut model: Box<dyn SequenceModel>,
        data: &dyn TrainingSet,
        request: &TrainRequest,
        logger: &mut dyn TrainingLogger,
        started: Instant,
    ) -> Result<(FitHistory, Duration), TrainingError> {
        for dir in [&request.model_dir, &request.weights_dir, &request.logs_dir] {
            create_dir(dir)?;
        }

        enter(TrainingState::Fitting);
        let options = FitOptions {
            epochs: request.hyperparameters.epochs,
            hyperparameters: request.hyperparameters.clone(),
            model_path: request.model_path(),
            weights_path: request.weights_path(),
            logs_dir: request.logs_dir.clone(),
            training_log: request.training_log.clone(),
            resume: request.resume && request.av_paths.is_empty(),
        };
        let fit_started = Instant::now();
        let history = model.fit(data, &options)?;
        logger.timing("fit", fit_started.elapsed().as_secs_f64() * 1000.0);

        if let Some(loss) = history.best_val_loss() {
            log::info!("Best validation loss: {loss:.4}");
            logger.metric("best_val_loss", loss as f64);
        }
        if let Some(acc) = history.best_val_acc() {
            log::info!("Best validation accuracy: {acc:.4}");
            logger.metric("best_val_acc", acc as f64);
        }

        model.save_model_and_weights(
            &request.model_path(),
            &request.weights_path(),
            &request.combined_path(),
        )?;
        enter(TrainingState::ArtifactSaved);

        let elapsed = started.elapsed();
        log::info!("Training finished in {:.1}s", elapsed.as_secs_f64());
        Ok((history, elapsed))
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn create_dir(dir: &Path) -> Result<(), TrainingError> {
    fs::create_dir_all(dir).map_err(|source| TrainingError::Io {
        path: dir.to_path_buf(),
        source,
    })
}
