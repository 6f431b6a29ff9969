use std::f64::consts::PI;

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filters over the `n_fft / 2 + 1` power-spectrum bins.
pub(super) fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f64>> {
    let n_bins = n_fft / 2 + 1;
    let max_mel = hz_to_mel(sample_rate as f64 / 2.0);
    let points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(max_mel * i as f64 / (n_mels + 1) as f64))
        .map(|hz| hz * n_fft as f64 / sample_rate as f64)
        .collect();

    (0..n_mels)
        .map(|m| {
            let (left, center, right) = (points[m], points[m + 1], points[m + 2]);
            (0..n_bins)
                .map(|bin| {
                    let b = bin as f64;
                    if b <= left || b >= right {
                        0.0
                    } else if b <= center {
                        (b - left) / (center - left).max(f64::EPSILON)
                    } else {
                        (right - b) / (right - center).max(f64::EPSILON)
                    }
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II keeping the first `n_out` coefficients.
pub(super) fn dct_ii(input: &[f64], n_out: usize) -> Vec<f64> {
    let n = input.len() as f64;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, x)| x * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .sum();
            scale * sum
        })
        .collect()
}

pub(super) fn hann_window(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos())
        .collect()
}
