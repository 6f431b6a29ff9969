use std::error::Error;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::unbounded;

use super::extraction_report::{
    install_panic_backtrace_hook, ExtractionFailure, ExtractionReport, SampleFailure,
};
use super::worker_count::resolve_worker_count;
use crate::corpus::domain::corpus_error::CorpusError;
use crate::corpus::domain::extracted_corpus::ExtractedCorpus;
use crate::features::domain::extracted_sample::ExtractedSample;
use crate::features::domain::feature_embedder::FeatureEmbedder;
use crate::media::domain::audio_extractor::{is_audio_file, AudioExtractor};
use crate::shared::constants::EXTRACTION_SAMPLE_RATE;
use crate::training::training_logger::TrainingLogger;

type Slot = Option<Result<ExtractedSample, SampleFailure>>;

/// Fans per-sample feature extraction out over a bounded worker pool.
///
/// Each sample index owns one result slot. Workers pull `(index, &mut slot)`
/// jobs from a shared queue, so every slot has exactly one writer and no
/// lock is taken. The scope join is the only barrier; slots are read after it.
pub struct ExtractionCoordinator {
    embedder: Arc<dyn FeatureEmbedder>,
    extractor: Arc<dyn AudioExtractor>,
    max_workers: Option<usize>,
    temp_dir: Option<PathBuf>,
}

impl ExtractionCoordinator {
    pub fn new(embedder: Arc<dyn FeatureEmbedder>, extractor: Arc<dyn AudioExtractor>) -> Self {
        Self {
            embedder,
            extractor,
            max_workers: None,
            temp_dir: None,
        }
    }

    /// Fix the worker count instead of consulting `MAX_WORKERS`.
    pub fn with_max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Place extracted audio under `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Extract every `(av_paths[i], subtitle_paths[i])` pair.
    ///
    /// Failed samples are excluded and recorded in the report; survivors are
    /// concatenated in index order. Pairs beyond the shorter list are ignored.
    pub fn extract(
        &self,
        av_paths: &[PathBuf],
        subtitle_paths: &[PathBuf],
        logger: &mut dyn TrainingLogger,
    ) -> Result<(ExtractedCorpus, ExtractionReport), CorpusError> {
        let total = av_paths.len().min(subtitle_paths.len());
        let workers = resolve_worker_count(self.max_workers).min(total.max(1));
        let started = Instant::now();
        log::info!("Extracting {total} samples with {workers} workers");
        install_panic_backtrace_hook();

        let mut slots: Vec<Slot> = (0..total).map(|_| None).collect();
        let panicked_workers = self.run_pool(&mut slots, av_paths, subtitle_paths, workers, logger);
        if panicked_workers > 0 {
            log::error!("{panicked_workers} extraction worker(s) panicked");
        }

        let mut report = ExtractionReport::new(total);
        let mut samples = Vec::with_capacity(total);
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(sample)) => samples.push(sample),
                Some(Err(failure)) => report.record(failure),
                None => {
                    log::error!(
                        "Sample {index} not completed ({}, {})",
                        av_paths[index].display(),
                        subtitle_paths[index].display()
                    );
                    report.record(SampleFailure {
                        index,
                        av_path: av_paths[index].clone(),
                        subtitle_path: subtitle_paths[index].clone(),
                        audio_path: None,
                        failure: ExtractionFailure::NotCompleted,
                    });
                }
            }
        }

        let corpus = if samples.is_empty() {
            ExtractedCorpus::empty()
        } else {
            ExtractedCorpus::concatenate(&samples)?
        };

        let elapsed = started.elapsed();
        report.set_elapsed(elapsed);
        logger.timing("extraction", elapsed.as_secs_f64() * 1000.0);
        log::info!(
            "Extraction finished in {:.1}s: {} of {total} samples usable, {} rows",
            elapsed.as_secs_f64(),
            report.succeeded(),
            corpus.len()
        );

        Ok((corpus, report))
    }

    /// Run the pool until every job is taken; returns the number of workers
    /// that panicked outside a task.
    fn run_pool(
        &self,
        slots: &mut [Slot],
        av_paths: &[PathBuf],
        subtitle_paths: &[PathBuf],
        workers: usize,
        logger: &mut dyn TrainingLogger,
    ) -> usize {
        let total = slots.len();
        let (job_tx, job_rx) = unbounded::<(usize, &mut Slot)>();
        for job in slots.iter_mut().enumerate() {
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);
        let (done_tx, done_rx) = unbounded::<usize>();

        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let job_rx = job_rx.clone();
                    let done_tx = done_tx.clone();
                    scope.spawn(move || {
                        for (index, slot) in job_rx.iter() {
                            *slot = Some(self.run_task(
                                index,
                                &av_paths[index],
                                &subtitle_paths[index],
                            ));
                            if done_tx.send(index).is_err() {
                                break;
                            }
                        }
                    })
                })
                .collect();
            drop(job_rx);
            drop(done_tx);

            let mut completed = 0;
            for _ in done_rx.iter() {
                completed += 1;
                logger.progress(completed, total);
            }

            handles
                .into_iter()
                .map(|handle| handle.join())
                .filter(Result::is_err)
                .count()
        })
    }

    fn run_task(
        &self,
        index: usize,
        av_path: &Path,
        subtitle_path: &Path,
    ) -> Result<ExtractedSample, SampleFailure> {
        let mut audio_path: Option<PathBuf> = None;
        let mut temp_audio: Option<PathBuf> = None;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let path = if is_audio_file(av_path) {
                av_path.to_path_buf()
            } else {
                let wav = self.reserve_temp_audio()?;
                temp_audio = Some(wav.clone());
                self.extractor
                    .extract_audio(av_path, EXTRACTION_SAMPLE_RATE, &wav)?;
                wav
            };
            audio_path = Some(path.clone());
            self.embedder
                .extract_data_and_label_from_audio(&path, subtitle_path, true)
        }));

        if let Some(temp) = temp_audio {
            if let Err(e) = fs::remove_file(&temp) {
                log::warn!("Failed to remove temporary audio {}: {e}", temp.display());
            }
        }

        let failure = match outcome {
            Ok(Ok(sample)) => return Ok(sample),
            Ok(Err(err)) => ExtractionFailure::from_error(err.as_ref()),
            Err(payload) => ExtractionFailure::from_panic(payload.as_ref()),
        };

        match &failure {
            ExtractionFailure::UnknownFault { message, backtrace } => log::error!(
                "Unexpected fault extracting sample {index} (media: {}, subtitles: {}): {message}\n{backtrace}",
                av_path.display(),
                subtitle_path.display()
            ),
            recognized => log::error!(
                "Failed to extract sample {index} (media: {}, subtitles: {}): {recognized}",
                av_path.display(),
                subtitle_path.display()
            ),
        }

        Err(SampleFailure {
            index,
            av_path: av_path.to_path_buf(),
            subtitle_path: subtitle_path.to_path_buf(),
            audio_path,
            failure,
        })
    }

    /// Create an empty WAV path up front so it is removed even if the
    /// extractor unwinds after writing to it.
    fn reserve_temp_audio(&self) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("subalign-").suffix(".wav");
        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file.into_temp_path().keep()?)
    }
}
