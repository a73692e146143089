//! Frame format conversion applied before frames reach the recorder.

use super::backend::AudioFrame;

/// Bring a frame to the target rate and channel layout.
pub fn conform_frame(frame: AudioFrame, target_sample_rate: u32, target_channels: u16) -> AudioFrame {
    let mut out = frame;

    if out.channels != target_channels && target_channels == 1 {
        out = downmix_to_mono(out);
    }

    if out.sample_rate != target_sample_rate {
        out = decimate(out, target_sample_rate);
    }

    out
}

/// Downsample by integer decimation. Upsampling and non-integer ratios pass through.
pub fn decimate(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if target_rate == 0 || frame.sample_rate <= target_rate {
        return frame;
    }

    let ratio = (frame.sample_rate / target_rate) as usize;
    if ratio <= 1 {
        return frame;
    }

    let channels = frame.channels.max(1) as usize;
    let samples: Vec<i16> = frame
        .samples
        .chunks_exact(channels)
        .step_by(ratio)
        .flatten()
        .copied()
        .collect();

    AudioFrame {
        samples,
        sample_rate: frame.sample_rate / ratio as u32,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Average interleaved channels into one.
pub fn downmix_to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels <= 1 {
        return frame;
    }

    let channels = frame.channels as usize;
    let samples = frame
        .samples
        .chunks_exact(channels)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect();

    AudioFrame {
        samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}
