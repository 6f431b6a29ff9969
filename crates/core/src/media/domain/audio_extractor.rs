use std::path::Path;

use crate::shared::constants::AUDIO_FILE_EXTENSIONS;

/// Domain interface for pulling a standalone audio file out of any media.
pub trait AudioExtractor: Send + Sync {
    /// Write the audio of `media_path`, resampled to `sample_rate` mono, as a
    /// WAV at `output_path`. The caller owns `output_path` and removes it,
    /// whether or not this returns.
    fn extract_audio(
        &self,
        media_path: &Path,
        sample_rate: u32,
        output_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// True when the extension marks a pure-audio format that needs no extraction.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_FILE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
