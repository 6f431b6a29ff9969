pub mod subtitle_cue;
