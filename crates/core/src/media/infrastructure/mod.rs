pub mod ffmpeg_audio_extractor;
pub mod ffmpeg_audio_reader;
