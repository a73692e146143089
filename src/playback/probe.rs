//! Container/codec probing of fetched clips with symphonia.

use anyhow::{Context, Result};
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Stream parameters of a decodable clip
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub duration: Option<Duration>,
}

/// Probe an in-memory clip. `extension` is a format hint such as "mp3".
pub fn probe_clip(bytes: Vec<u8>, extension: Option<&str>) -> Result<ClipInfo> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Unrecognized audio format")?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found")?;

    let params = &track.codec_params;
    let duration = match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => {
            Some(Duration::from_secs_f64(frames as f64 / rate as f64))
        }
        _ => None,
    };

    Ok(ClipInfo {
        sample_rate: params.sample_rate,
        channels: params.channels.map(|c| c.count() as u16),
        duration,
    })
}

/// File extension of a URL path, used as a probe hint
pub fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}
