use std::path::Path;

use super::extracted_sample::ExtractedSample;

/// Derives frame-aligned feature rows and labels from audio plus subtitles.
///
/// Recognized failures are reported as `MediaError`; anything else is
/// treated as an unexpected fault by the caller.
pub trait FeatureEmbedder: Send + Sync {
    fn extract_data_and_label_from_audio(
        &self,
        audio_path: &Path,
        subtitle_path: &Path,
        ignore_sound_effects: bool,
    ) -> Result<ExtractedSample, Box<dyn std::error::Error + Send + Sync>>;
}
