use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// One visualizer reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeSample {
    pub sequence: u64,
    /// Normalized RMS level, 0.0..=1.0
    pub level: f32,
    pub elapsed: Duration,
}

/// Fixed-rate level readings for one capture. Ends when the capture stops.
pub type VolumeStream = BoxStream<'static, VolumeSample>;

/// Latest input level, written by the capture task and read by the sampler
#[derive(Debug, Clone, Default)]
pub(crate) struct LevelMeter(Arc<AtomicU32>);

impl LevelMeter {
    pub(crate) fn set(&self, level: f32) {
        self.0.store(level.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Sample `meter` every `interval` until `cancel` fires.
pub(crate) fn volume_stream(
    meter: LevelMeter,
    cancel: CancellationToken,
    interval: Duration,
) -> VolumeStream {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    futures::stream::unfold((ticker, 0u64), move |(mut ticker, sequence)| {
        let meter = meter.clone();
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                _ = ticker.tick() => {
                    let sample = VolumeSample {
                        sequence,
                        level: meter.get(),
                        elapsed: started.elapsed(),
                    };
                    Some((sample, (ticker, sequence + 1)))
                }
            }
        }
    })
    .fuse()
    .boxed()
}
