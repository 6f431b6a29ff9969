use ndarray::{Array1, Array3, Axis};

/// Row-addressable training data, already in the model's input layout.
///
/// Implementations either hold normalized rows in memory or normalize rows
/// on demand from a mapped dump; the model only ever sees `batch`.
pub trait TrainingSet {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape `(a, b)` of one model input row.
    fn input_shape(&self) -> (usize, usize);

    /// Rows and labels at `indices`, in that order.
    fn batch(&self, indices: &[usize]) -> (Array3<f32>, Array1<f32>);
}

/// Normalized rows held in memory.
pub struct InMemoryTrainingSet {
    features: Array3<f32>,
    labels: Array1<f32>,
}

impl InMemoryTrainingSet {
    pub fn new(features: Array3<f32>, labels: Array1<f32>) -> Self {
        Self { features, labels }
    }
}

impl TrainingSet for InMemoryTrainingSet {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn input_shape(&self) -> (usize, usize) {
        let (_, a, b) = self.features.dim();
        (a, b)
    }

    fn batch(&self, indices: &[usize]) -> (Array3<f32>, Array1<f32>) {
        (
            self.features.select(Axis(0), indices),
            self.labels.select(Axis(0), indices),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_selects_rows_in_order() {
        let features = Array3::from_shape_fn((4, 1, 2), |(n, _, j)| (n * 10 + j) as f32);
        let labels = Array1::from_vec(vec![0.0, 1.0, 0.0, 1.0]);
        let set = InMemoryTrainingSet::new(features, labels);

        let (x, y) = set.batch(&[3, 0]);
        assert_eq!(x.dim(), (2, 1, 2));
        assert_eq!(x[[0, 0, 1]], 31.0);
        assert_eq!(y.to_vec(), vec![1.0, 0.0]);
        assert_eq!(set.input_shape(), (1, 2));
        assert_eq!(set.len(), 4);
        assert!(!set.is_empty());
    }
}
