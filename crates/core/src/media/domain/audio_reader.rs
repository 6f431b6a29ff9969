use std::path::Path;

use super::audio_segment::AudioSegment;

/// Domain interface for decoding the audio track of a media file.
pub trait AudioReader: Send + Sync {
    /// Decode to mono PCM at `target_sample_rate`.
    ///
    /// A file without an audio track is a `MediaError::UnsupportedFormat`.
    fn read_audio(
        &self,
        path: &Path,
        target_sample_rate: u32,
    ) -> Result<AudioSegment, Box<dyn std::error::Error + Send + Sync>>;
}
