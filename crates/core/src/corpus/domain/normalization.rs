use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

/// Rotate every `(a, b)` row by 90° counter-clockwise into `(b, a)`.
///
/// Matches `rot90(k=1)` on the row's first two axes:
/// `out[n][i][j] = in[n][j][b - 1 - i]`.
pub fn reorient(features: ArrayView3<f32>) -> Array3<f32> {
    let mut rotated = features.permuted_axes([0, 2, 1]);
    rotated.invert_axis(Axis(1));
    rotated.as_standard_layout().into_owned()
}

/// Same rotation applied to a single `(a, b)` matrix.
pub fn reorient_row(row: ArrayView2<f32>) -> Array2<f32> {
    let mut rotated = row.reversed_axes();
    rotated.invert_axis(Axis(0));
    rotated.as_standard_layout().into_owned()
}

/// Per-position mean across all rows, or `None` for an empty corpus.
pub fn feature_mean(features: ArrayView3<f32>) -> Option<Array2<f32>> {
    features.mean_axis(Axis(0))
}

/// Subtract `mean` from every row.
pub fn zero_center(features: &mut Array3<f32>, mean: &Array2<f32>) {
    *features -= mean;
}

/// Reorient then zero-center; returns the normalized rows and the mean used.
pub fn normalize(features: ArrayView3<f32>) -> Option<(Array3<f32>, Array2<f32>)> {
    let mut rotated = reorient(features);
    let mean = feature_mean(rotated.view())?;
    zero_center(&mut rotated, &mean);
    Some((rotated, mean))
}
