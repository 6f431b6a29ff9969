use ndarray::{Array1, Array3, Axis};

/// Feature rows and their per-row labels for one media/subtitle pair.
///
/// `features` has shape `(rows, a, b)`; `labels` has one entry per row.
#[derive(Clone, Debug)]
pub struct ExtractedSample {
    features: Array3<f32>,
    labels: Array1<f32>,
}

impl ExtractedSample {
    /// Fails when the row counts of `features` and `labels` differ.
    pub fn new(features: Array3<f32>, labels: Array1<f32>) -> Result<Self, String> {
        let rows = features.len_of(Axis(0));
        if rows != labels.len() {
            return Err(format!(
                "feature rows ({rows}) do not match label count ({})",
                labels.len()
            ));
        }
        Ok(Self { features, labels })
    }

    pub fn features(&self) -> &Array3<f32> {
        &self.features
    }

    pub fn labels(&self) -> &Array1<f32> {
        &self.labels
    }

    pub fn rows(&self) -> usize {
        self.labels.len()
    }

    pub fn into_parts(self) -> (Array3<f32>, Array1<f32>) {
        (self.features, self.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_aligned_rows() {
        let sample = ExtractedSample::new(Array3::zeros((4, 13, 1)), Array1::zeros(4)).unwrap();
        assert_eq!(sample.rows(), 4);
        assert_eq!(sample.features().dim(), (4, 13, 1));
    }

    #[test]
    fn test_new_rejects_misaligned_rows() {
        let err = ExtractedSample::new(Array3::zeros((4, 13, 1)), Array1::zeros(3)).unwrap_err();
        assert!(err.contains("do not match"));
    }
}
