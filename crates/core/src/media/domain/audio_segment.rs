/// Decoded mono PCM audio normalized to [-1.0, 1.0].
#[derive(Clone, Debug)]
pub struct AudioSegment {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Number of whole frames of `frame_len` samples taken every `hop` samples.
    pub fn frame_count(&self, frame_len: usize, hop: usize) -> usize {
        if self.samples.len() < frame_len || hop == 0 {
            return 0;
        }
        (self.samples.len() - frame_len) / hop + 1
    }

    /// Samples of frame `index`; callers stay below `frame_count`.
    pub fn frame(&self, index: usize, frame_len: usize, hop: usize) -> &[f32] {
        let start = index * hop;
        &self.samples[start..start + frame_len]
    }

    /// Time in seconds at the middle of frame `index`.
    pub fn frame_midpoint(&self, index: usize, frame_len: usize, hop: usize) -> f64 {
        (index * hop) as f64 / self.sample_rate as f64
            + frame_len as f64 / (2.0 * self.sample_rate as f64)
    }
}
