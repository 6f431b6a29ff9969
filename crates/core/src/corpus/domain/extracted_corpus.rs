use ndarray::{Array1, Array3, ArrayView3, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

use super::corpus_error::CorpusError;
use crate::features::domain::extracted_sample::ExtractedSample;

/// All surviving samples concatenated along the row axis.
#[derive(Clone, Debug)]
pub struct ExtractedCorpus {
    features: Array3<f32>,
    labels: Array1<f32>,
}

impl ExtractedCorpus {
    pub fn new(features: Array3<f32>, labels: Array1<f32>) -> Result<Self, CorpusError> {
        if features.len_of(Axis(0)) != labels.len() {
            return Err(CorpusError::ShapeMismatch(format!(
                "{} feature rows vs {} labels",
                features.len_of(Axis(0)),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }

    /// Corpus with no rows and unknown row shape.
    pub fn empty() -> Self {
        Self {
            features: Array3::zeros((0, 0, 0)),
            labels: Array1::zeros(0),
        }
    }

    /// Concatenate samples in the given order. Zero samples yield [`Self::empty`].
    pub fn concatenate(samples: &[ExtractedSample]) -> Result<Self, CorpusError> {
        let Some(first) = samples.first() else {
            return Ok(Self::empty());
        };

        let (_, a, b) = first.features().dim();
        if let Some(bad) = samples.iter().find(|s| {
            let (_, sa, sb) = s.features().dim();
            (sa, sb) != (a, b)
        }) {
            let (_, sa, sb) = bad.features().dim();
            return Err(CorpusError::ShapeMismatch(format!(
                "sample rows of shape ({sa}, {sb}) cannot join rows of shape ({a}, {b})"
            )));
        }

        let feature_views: Vec<ArrayView3<f32>> = samples.iter().map(|s| s.features().view()).collect();
        let label_views: Vec<_> = samples.iter().map(|s| s.labels().view()).collect();

        let features = ndarray::concatenate(Axis(0), &feature_views)
            .map_err(|e| CorpusError::ShapeMismatch(e.to_string()))?;
        let labels = ndarray::concatenate(Axis(0), &label_views)
            .map_err(|e| CorpusError::ShapeMismatch(e.to_string()))?;

        Self::new(features, labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Shape `(a, b)` of one feature row.
    pub fn row_shape(&self) -> (usize, usize) {
        let (_, a, b) = self.features.dim();
        (a, b)
    }

    pub fn features(&self) -> &Array3<f32> {
        &self.features
    }

    pub fn labels(&self) -> &Array1<f32> {
        &self.labels
    }

    pub fn into_parts(self) -> (Array3<f32>, Array1<f32>) {
        (self.features, self.labels)
    }

    /// Reorder rows by one random permutation shared by features and labels.
    pub fn permute_jointly<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        Self {
            features: self.features.select(Axis(0), &order),
            labels: self.labels.select(Axis(0), &order),
        }
    }
}
