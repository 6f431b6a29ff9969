use std::collections::HashMap;
use std::time::Instant;

/// Observer for training-run events.
///
/// Lets the CLI report extraction progress, stage timings and fit metrics
/// without the orchestration code knowing where the output goes.
pub trait TrainingLogger: Send {
    /// Report extraction progress in samples.
    fn progress(&mut self, completed: usize, total: usize);

    /// Record how long a named stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. best validation loss).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullTrainingLogger;

impl TrainingLogger for NullTrainingLogger {
    fn progress(&mut self, _completed: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI logger with throttled progress and a summary at the end of the run.
///
/// Progress is printed every `throttle_samples` completed samples and on the
/// last one.
pub struct StdoutTrainingLogger {
    throttle_samples: usize,
    timings: HashMap<String, f64>,
    metrics: HashMap<String, f64>,
    start_time: Instant,
    total_samples: usize,
}

impl StdoutTrainingLogger {
    pub fn new(throttle_samples: usize) -> Self {
        Self {
            throttle_samples: throttle_samples.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            total_samples: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Training summary ({} samples, {elapsed:.1}s total):",
            self.total_samples
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, ms) in stages {
            lines.push(format!("  {stage:12}: {:8.1}s", ms / 1000.0));
        }

        let mut metrics: Vec<_> = self.metrics.iter().collect();
        metrics.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in metrics {
            lines.push(format!("  {name}: {value:.4}"));
        }

        Some(lines.join("\n"))
    }

    /// Accumulated milliseconds spent in a stage.
    pub fn timing_for(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).copied()
    }

    /// Most recent value of a metric.
    pub fn metric_for(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

impl Default for StdoutTrainingLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl TrainingLogger for StdoutTrainingLogger {
    fn progress(&mut self, completed: usize, total: usize) {
        self.total_samples = total;
        if total > 0 && (completed % self.throttle_samples == 0 || completed == total) {
            let pct = completed as f64 / total as f64 * 100.0;
            log::info!("Extracting: {completed}/{total} samples ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        *self.timings.entry(stage.to_string()).or_default() += duration_ms;
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullTrainingLogger;
        logger.progress(1, 10);
        logger.timing("extraction", 5.0);
        logger.metric("best_val_loss", 0.3);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_accumulates_per_stage() {
        let mut logger = StdoutTrainingLogger::new(10);
        logger.timing("fit", 20.0);
        logger.timing("fit", 30.0);
        logger.timing("extraction", 5.0);

        assert_relative_eq!(logger.timing_for("fit").unwrap(), 50.0);
        assert_relative_eq!(logger.timing_for("extraction").unwrap(), 5.0);
        assert!(logger.timing_for("missing").is_none());
    }

    #[test]
    fn test_metric_keeps_latest_value() {
        let mut logger = StdoutTrainingLogger::new(10);
        logger.metric("best_val_acc", 0.5);
        logger.metric("best_val_acc", 0.75);
        assert_relative_eq!(logger.metric_for("best_val_acc").unwrap(), 0.75);
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let mut logger = StdoutTrainingLogger::new(10);
        logger.progress(4, 4);
        logger.timing("extraction", 1500.0);
        logger.metric("best_val_loss", 0.25);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Training summary (4 samples"));
        assert!(summary.contains("extraction"));
        assert!(summary.contains("best_val_loss: 0.2500"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutTrainingLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_default_throttle() {
        let mut logger = StdoutTrainingLogger::default();
        logger.info("resuming from dump");
        assert_eq!(logger.throttle_samples, 10);
        assert!(logger.summary_string().is_none());
    }
}
