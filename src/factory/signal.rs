//! Microphone liveness metric.
//!
//! A dead or shorted input records a flat line (or pure DC offset), a live
//! microphone records room noise.  Population variance of the raw samples
//! separates the two well enough for a pass/fail check.

/// Population variance of `samples`; 0 for an empty slice.
pub fn variance(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
    samples
        .iter()
        .map(|&s| {
            let d = f64::from(s) - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

/// A channel passes when its variance is strictly above `threshold`.
pub fn signal_present(samples: &[i16], threshold: f64) -> bool {
    variance(samples) > threshold
}
