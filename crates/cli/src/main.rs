use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use subalign_core::extraction::extraction_coordinator::ExtractionCoordinator;
use subalign_core::features::infrastructure::mfcc_feature_embedder::MfccFeatureEmbedder;
use subalign_core::media::infrastructure::ffmpeg_audio_extractor::FfmpegAudioExtractor;
use subalign_core::media::infrastructure::ffmpeg_audio_reader::FfmpegAudioReader;
use subalign_core::model::domain::hyperparameters::Hyperparameters;
use subalign_core::model::infrastructure::logistic_network::LogisticNetworkFactory;
use subalign_core::shared::constants::{DEFAULT_TRAINING_LOG, SUBTITLE_FILE_EXTENSIONS};
use subalign_core::training::train_request::TrainRequest;
use subalign_core::training::trainer::Trainer;
use subalign_core::training::training_logger::{StdoutTrainingLogger, TrainingLogger};

/// Train a subtitle alignment model from media files and their subtitles.
#[derive(Parser)]
#[command(name = "subalign-train")]
struct Cli {
    /// Directory of video or audio files.
    #[arg(long)]
    video_dir: Option<PathBuf>,

    /// Directory of subtitle files, matched to media by file stem.
    #[arg(long)]
    subtitle_dir: Option<PathBuf>,

    /// Directory for the model, weights, logs and training dump.
    #[arg(long)]
    output_dir: PathBuf,

    /// Train from the existing training dump instead of extracting.
    #[arg(long)]
    use_training_dump: bool,

    /// Continue from the saved model and weights (requires --use-training-dump).
    #[arg(long)]
    resume: bool,

    /// Maximum number of epochs.
    #[arg(long)]
    epochs: Option<usize>,

    /// Mini-batch size.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Fraction of rows held out for validation (0.0-1.0, exclusive).
    #[arg(long)]
    validation_split: Option<f32>,

    /// SGD learning rate.
    #[arg(long)]
    learning_rate: Option<f32>,

    /// Epochs without validation improvement before stopping early.
    #[arg(long)]
    patience: Option<usize>,

    /// Seed for shuffling and weight initialization.
    #[arg(long)]
    seed: Option<u64>,

    /// Extraction worker threads (defaults to MAX_WORKERS or half the CPUs).
    #[arg(long)]
    max_workers: Option<usize>,

    /// JSON file of hyperparameters; flags override its values.
    #[arg(long)]
    hyperparameters: Option<PathBuf>,

    /// File name of the per-epoch log written under <output-dir>/logs.
    #[arg(long, default_value = DEFAULT_TRAINING_LOG)]
    training_log: String,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let hyperparameters = resolve_hyperparameters(&cli)?;
    let mut request = TrainRequest::new(&cli.output_dir);
    request.hyperparameters = hyperparameters;
    request.training_log = cli.training_log.clone();
    request.resume = cli.resume;

    if let (Some(video_dir), Some(subtitle_dir)) = (&cli.video_dir, &cli.subtitle_dir) {
        let (media, subtitles) = pair_by_stem(video_dir, subtitle_dir)?;
        if media.is_empty() {
            return Err(format!(
                "No media in {} has a matching subtitle in {}",
                video_dir.display(),
                subtitle_dir.display()
            )
            .into());
        }
        log::info!("Found {} media/subtitle pairs", media.len());
        request = request.with_inputs(media, subtitles);
    }

    let reader = Box::new(FfmpegAudioReader);
    let coordinator = ExtractionCoordinator::new(
        Arc::new(MfccFeatureEmbedder::new(reader)),
        Arc::new(FfmpegAudioExtractor),
    )
    .with_max_workers(cli.max_workers);
    let trainer = Trainer::new(coordinator, Box::new(LogisticNetworkFactory));

    let mut logger = StdoutTrainingLogger::default();
    let outcome = trainer.train(&request, &mut logger)?;
    logger.summary();

    if let Some(report) = &outcome.report {
        eprintln!(
            "Extracted {} of {} samples ({:.1}s)",
            report.succeeded(),
            report.total(),
            report.elapsed().as_secs_f64()
        );
        for failure in report.failures() {
            eprintln!(
                "Skipped {} ({}): {}",
                failure.av_path.display(),
                failure.subtitle_path.display(),
                failure.failure
            );
        }
    }
    eprintln!(
        "Model saved to {} after {} epochs ({:.1}s)",
        outcome.combined_path.display(),
        outcome.history.epochs(),
        outcome.elapsed.as_secs_f64()
    );

    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.use_training_dump {
        if cli.video_dir.is_some() || cli.subtitle_dir.is_some() {
            return Err(
                "--use-training-dump cannot be combined with --video-dir or --subtitle-dir".into(),
            );
        }
    } else {
        for (flag, dir) in [
            ("--video-dir", &cli.video_dir),
            ("--subtitle-dir", &cli.subtitle_dir),
        ] {
            match dir {
                None => {
                    return Err(
                        format!("{flag} is required unless --use-training-dump is set").into(),
                    )
                }
                Some(dir) if !dir.is_dir() => {
                    return Err(format!("Directory not found: {}", dir.display()).into())
                }
                Some(_) => {}
            }
        }
        if cli.resume {
            return Err("--resume requires --use-training-dump".into());
        }
    }
    if cli.epochs == Some(0) {
        return Err("Epochs must be at least 1".into());
    }
    if cli.batch_size == Some(0) {
        return Err("Batch size must be at least 1".into());
    }
    if cli.patience == Some(0) {
        return Err("Patience must be at least 1".into());
    }
    if cli.max_workers == Some(0) {
        return Err("Max workers must be at least 1".into());
    }
    if let Some(split) = cli.validation_split {
        if !(0.0..1.0).contains(&split) {
            return Err(format!("Validation split must be in [0.0, 1.0), got {split}").into());
        }
    }
    if let Some(lr) = cli.learning_rate {
        if !(lr > 0.0 && lr.is_finite()) {
            return Err(format!("Learning rate must be positive, got {lr}").into());
        }
    }
    if cli.training_log.is_empty() || cli.training_log.contains(['/', '\\']) {
        return Err(format!(
            "Training log must be a plain file name, got '{}'",
            cli.training_log
        )
        .into());
    }
    Ok(())
}

/// Defaults, then the JSON file, then individual flags.
fn resolve_hyperparameters(cli: &Cli) -> Result<Hyperparameters, Box<dyn std::error::Error>> {
    let mut params = match &cli.hyperparameters {
        Some(path) => Hyperparameters::from_file(path)?,
        None => Hyperparameters::default(),
    };
    if let Some(epochs) = cli.epochs {
        params.epochs = epochs;
    }
    if let Some(batch_size) = cli.batch_size {
        params.batch_size = batch_size;
    }
    if let Some(split) = cli.validation_split {
        params.validation_split = split;
    }
    if let Some(lr) = cli.learning_rate {
        params.learning_rate = lr;
    }
    if let Some(patience) = cli.patience {
        params.patience = patience;
    }
    if cli.seed.is_some() {
        params.seed = cli.seed;
    }
    params.validate()?;
    Ok(params)
}

/// Pair media files with subtitles sharing their file stem.
///
/// Media without a subtitle and subtitles without media are skipped with a
/// warning. Pairs are ordered by media path.
fn pair_by_stem(
    video_dir: &Path,
    subtitle_dir: &Path,
) -> Result<(Vec<PathBuf>, Vec<PathBuf>), Box<dyn std::error::Error>> {
    let mut subtitles: HashMap<String, PathBuf> = HashMap::new();
    for path in list_files(subtitle_dir)? {
        if !is_subtitle(&path) {
            continue;
        }
        if let Some(stem) = stem_of(&path) {
            if let Some(previous) = subtitles.insert(stem, path.clone()) {
                log::warn!(
                    "Multiple subtitles for one stem, using {} over {}",
                    path.display(),
                    previous.display()
                );
            }
        }
    }

    let mut media = Vec::new();
    let mut paired = Vec::new();
    for path in list_files(video_dir)? {
        if is_subtitle(&path) {
            continue;
        }
        let Some(stem) = stem_of(&path) else {
            continue;
        };
        match subtitles.remove(&stem) {
            Some(subtitle) => {
                media.push(path);
                paired.push(subtitle);
            }
            None => log::warn!("No subtitle for {}, skipping", path.display()),
        }
    }
    for orphan in subtitles.values() {
        log::warn!("No media for {}, skipping", orphan.display());
    }

    Ok((media, paired))
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if path.is_file() && !hidden {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn stem_of(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

fn is_subtitle(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUBTITLE_FILE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
