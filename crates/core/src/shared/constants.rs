/// Sample rate audio is resampled to before feature extraction.
pub const EXTRACTION_SAMPLE_RATE: u32 = 16000;

/// Extensions treated as pure audio; anything else goes through audio extraction.
pub const AUDIO_FILE_EXTENSIONS: &[&str] = &[
    "wav", "mp3", "flac", "aac", "ac3", "ogg", "m4a", "opus", "wma", "aiff", "aif", "amr",
];

pub const SUBTITLE_FILE_EXTENSIONS: &[&str] = &["srt", "vtt"];

/// Environment variable overriding the extraction worker count.
pub const MAX_WORKERS_ENV: &str = "MAX_WORKERS";

pub const TRAINING_DUMP_FILENAME: &str = "training_dump.hdf5";
pub const MODEL_FILENAME: &str = "model.hdf5";
pub const WEIGHTS_FILENAME: &str = "weights.hdf5";
pub const COMBINED_FILENAME: &str = "combined.hdf5";

pub const TRAIN_DATA_DATASET: &str = "train_data";
pub const LABELS_DATASET: &str = "labels";

pub const DEFAULT_EPOCHS: usize = 1000;
pub const DEFAULT_TRAINING_LOG: &str = "training.log";
