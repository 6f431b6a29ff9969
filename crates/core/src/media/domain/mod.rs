pub mod audio_extractor;
pub mod audio_reader;
pub mod audio_segment;
pub mod media_error;
