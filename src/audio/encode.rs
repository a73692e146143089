use anyhow::{Context, Result};
use std::io::Cursor;

/// Encode interleaved 16-bit PCM as an in-memory WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer =
            hound::WavWriter::new(&mut buffer, spec).context("Failed to create WAV writer")?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV data")?;
    }

    Ok(buffer.into_inner())
}

/// Playback length of `sample_count` interleaved samples.
pub fn pcm_duration(sample_count: usize, sample_rate: u32, channels: u16) -> std::time::Duration {
    if sample_rate == 0 || channels == 0 {
        return std::time::Duration::ZERO;
    }
    let frames = sample_count as f64 / channels as f64;
    std::time::Duration::from_secs_f64(frames / sample_rate as f64)
}
