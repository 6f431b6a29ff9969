use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array2, Axis};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::mel::{dct_ii, hann_window, mel_filterbank};
use crate::features::domain::extracted_sample::ExtractedSample;
use crate::features::domain::feature_embedder::FeatureEmbedder;
use crate::media::domain::audio_reader::AudioReader;
use crate::media::domain::audio_segment::AudioSegment;
use crate::media::domain::media_error::MediaError;
use crate::shared::constants::EXTRACTION_SAMPLE_RATE;
use crate::subtitles::domain::subtitle_cue::SubtitleCue;
use crate::subtitles::infrastructure::subtitle_parser::parse_subtitle_file;

pub const DEFAULT_N_MFCC: usize = 13;
pub const DEFAULT_FRAME_LEN: usize = 512;
pub const DEFAULT_HOP_LEN: usize = 512;
const N_MELS: usize = 40;
const LOG_FLOOR: f64 = 1e-10;

/// Embeds audio as MFCC frames labelled by subtitle coverage.
///
/// Each row has shape `(n_mfcc, 1)`. A row's label is 1.0 when the frame
/// midpoint lies inside a subtitle cue, 0.0 otherwise.
pub struct MfccFeatureEmbedder {
    reader: Box<dyn AudioReader>,
    n_mfcc: usize,
    frame_len: usize,
    hop_len: usize,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    filterbank: Vec<Vec<f64>>,
}

impl MfccFeatureEmbedder {
    pub fn new(reader: Box<dyn AudioReader>) -> Self {
        Self::with_params(reader, DEFAULT_N_MFCC, DEFAULT_FRAME_LEN, DEFAULT_HOP_LEN)
    }

    pub fn with_params(
        reader: Box<dyn AudioReader>,
        n_mfcc: usize,
        frame_len: usize,
        hop_len: usize,
    ) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            reader,
            n_mfcc: n_mfcc.min(N_MELS),
            frame_len,
            hop_len: hop_len.max(1),
            fft: planner.plan_fft_forward(frame_len),
            window: hann_window(frame_len),
            filterbank: mel_filterbank(EXTRACTION_SAMPLE_RATE, frame_len, N_MELS),
        }
    }

    /// MFCC matrix of shape `(frames, n_mfcc)`.
    pub fn mfcc(&self, audio: &AudioSegment) -> Array2<f32> {
        let frames = audio.frame_count(self.frame_len, self.hop_len);
        let mut out = Array2::<f32>::zeros((frames, self.n_mfcc));
        let n_bins = self.frame_len / 2 + 1;
        let mut buf = vec![Complex::new(0.0, 0.0); self.frame_len];

        for (idx, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
            let frame = audio.frame(idx, self.frame_len, self.hop_len);
            for (slot, (s, w)) in buf.iter_mut().zip(frame.iter().zip(&self.window)) {
                *slot = Complex::new(*s as f64 * w, 0.0);
            }
            self.fft.process(&mut buf);

            let power: Vec<f64> = buf[..n_bins].iter().map(|c| c.norm_sqr()).collect();
            let log_mel: Vec<f64> = self
                .filterbank
                .iter()
                .map(|filter| {
                    let energy: f64 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                    energy.max(LOG_FLOOR).ln()
                })
                .collect();

            for (dst, c) in row.iter_mut().zip(dct_ii(&log_mel, self.n_mfcc)) {
                *dst = c as f32;
            }
        }
        out
    }

    /// One label per frame from the cues that should count as speech.
    pub fn label_frames(&self, audio: &AudioSegment, cues: &[SubtitleCue]) -> Array1<f32> {
        let frames = audio.frame_count(self.frame_len, self.hop_len);
        Array1::from_iter((0..frames).map(|idx| {
            let t = audio.frame_midpoint(idx, self.frame_len, self.hop_len);
            if cues.iter().any(|c| c.contains(t)) {
                1.0
            } else {
                0.0
            }
        }))
    }
}

impl FeatureEmbedder for MfccFeatureEmbedder {
    fn extract_data_and_label_from_audio(
        &self,
        audio_path: &Path,
        subtitle_path: &Path,
        ignore_sound_effects: bool,
    ) -> Result<ExtractedSample, Box<dyn std::error::Error + Send + Sync>> {
        let mut cues = parse_subtitle_file(subtitle_path)?;
        if ignore_sound_effects {
            cues.retain(|c| !c.is_sound_effect());
        }

        let audio = self.reader.read_audio(audio_path, EXTRACTION_SAMPLE_RATE)?;
        if audio.frame_count(self.frame_len, self.hop_len) == 0 {
            return Err(MediaError::terminal(audio_path, "audio shorter than one frame").into());
        }

        let features = self.mfcc(&audio).insert_axis(Axis(2));
        let labels = self.label_frames(&audio, &cues);
        log::debug!(
            "Embedded {} frames ({} labelled) from {}",
            labels.len(),
            labels.iter().filter(|l| **l > 0.5).count(),
            audio_path.display()
        );
        Ok(ExtractedSample::new(features, labels)?)
    }
}
