use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::error::Error;
use std::panic;
use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;

use thiserror::Error;

use crate::media::domain::media_error::MediaError;

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chain a panic hook that records the panicking thread's backtrace before
/// unwinding starts. The previous hook still runs. Idempotent.
pub fn install_panic_backtrace_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture().to_string();
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            previous(info);
        }));
    });
}

fn take_panic_backtrace() -> Option<String> {
    PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

/// Why a sample was left out of the corpus.
#[derive(Error, Debug)]
pub enum ExtractionFailure {
    /// The input format is not supported.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),
    /// A recognized, sample-local extraction failure.
    #[error("extraction failed: {0}")]
    ExtractionFault(String),
    /// Anything else, panics included.
    #[error("unexpected fault: {message}")]
    UnknownFault { message: String, backtrace: String },
    /// The slot was never filled by a worker.
    #[error("extraction did not complete")]
    NotCompleted,
}

impl ExtractionFailure {
    /// Classify an error returned by a collaborator.
    pub fn from_error(err: &(dyn Error + Send + Sync + 'static)) -> Self {
        match err.downcast_ref::<MediaError>() {
            Some(MediaError::UnsupportedFormat { .. }) => Self::UnsupportedInput(err.to_string()),
            Some(MediaError::Terminal { .. }) => Self::ExtractionFault(err.to_string()),
            None => Self::UnknownFault {
                message: err.to_string(),
                backtrace: Backtrace::force_capture().to_string(),
            },
        }
    }

    /// Classify a panic payload caught from a task on this thread.
    ///
    /// The backtrace is the one recorded at the panic site when
    /// [`install_panic_backtrace_hook`] ran first; otherwise it is taken here.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        Self::UnknownFault {
            message: format!("panic: {message}"),
            backtrace: take_panic_backtrace()
                .unwrap_or_else(|| Backtrace::force_capture().to_string()),
        }
    }
}

/// One excluded sample.
#[derive(Debug)]
pub struct SampleFailure {
    pub index: usize,
    pub av_path: PathBuf,
    pub subtitle_path: PathBuf,
    /// Audio actually handed to the embedder, if extraction got that far.
    pub audio_path: Option<PathBuf>,
    pub failure: ExtractionFailure,
}

/// Outcome of one extraction call: which samples were excluded and why.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    total: usize,
    failures: Vec<SampleFailure>,
    elapsed: Duration,
}

impl ExtractionReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, failure: SampleFailure) {
        self.failures.push(failure);
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn succeeded(&self) -> usize {
        self.total - self.failures.len()
    }

    pub fn failures(&self) -> &[SampleFailure] {
        &self.failures
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Error, Debug)]
    #[error("decoder exploded")]
    struct OtherError;

    fn boxed(err: impl Error + Send + Sync + 'static) -> Box<dyn Error + Send + Sync> {
        Box::new(err)
    }

    #[test]
    fn test_unsupported_format_is_unsupported_input() {
        let err = boxed(MediaError::unsupported("a.xyz", "no audio stream"));
        let failure = ExtractionFailure::from_error(err.as_ref());
        assert!(matches!(failure, ExtractionFailure::UnsupportedInput(ref m) if m.contains("a.xyz")));
    }

    #[test]
    fn test_terminal_is_extraction_fault() {
        let err = boxed(MediaError::terminal("a.srt", "missing"));
        let failure = ExtractionFailure::from_error(err.as_ref());
        assert!(matches!(failure, ExtractionFailure::ExtractionFault(_)));
    }

    #[test]
    fn test_foreign_error_is_unknown_with_backtrace() {
        let failure = ExtractionFailure::from_error(boxed(OtherError).as_ref());
        match failure {
            ExtractionFailure::UnknownFault { message, backtrace } => {
                assert_eq!(message, "decoder exploded");
                assert!(!backtrace.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_panic_payloads_are_unknown_faults() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        let failure = ExtractionFailure::from_panic(payload.as_ref());
        assert!(matches!(failure, ExtractionFailure::UnknownFault { ref message, .. } if message == "panic: boom 7"));
    }

    #[inline(never)]
    fn failing_decoder_step() {
        panic!("decoder state corrupted");
    }

    #[test]
    fn test_panic_backtrace_is_recorded_at_panic_site() {
        install_panic_backtrace_hook();
        install_panic_backtrace_hook();

        let payload = panic::catch_unwind(failing_decoder_step).unwrap_err();
        let recorded = PANIC_BACKTRACE.with(|slot| slot.borrow().clone());
        assert!(recorded.is_some());

        let failure = ExtractionFailure::from_panic(payload.as_ref());
        match failure {
            ExtractionFailure::UnknownFault { backtrace, .. } => {
                assert_eq!(Some(backtrace), recorded);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(take_panic_backtrace().is_none());
    }

    #[test]
    fn test_report_counts() {
        let mut report = ExtractionReport::new(3);
        report.record(SampleFailure {
            index: 1,
            av_path: "b.wav".into(),
            subtitle_path: "b.srt".into(),
            audio_path: None,
            failure: ExtractionFailure::NotCompleted,
        });
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failures()[0].index, 1);
    }
}
