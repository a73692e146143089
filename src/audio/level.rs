//! Input level metering for the recording visualizer.

/// RMS energy of a PCM block.
pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}

/// RMS scaled to 0.0..=1.0 against full-scale i16.
pub fn normalized_level(samples: &[i16]) -> f32 {
    (rms(samples) / i16::MAX as f64).clamp(0.0, 1.0) as f32
}
