//! # Host Clock
//!
//! Stands in for the audio device: pulls one quantum from a [`PlaybackOutput`] per tick at the
//! rate a real callback would fire, and hands every block to a [`BlockSink`].
//!
//! ## Rust Concepts:
//! - **tokio::time::interval**: periodic ticks without drift accumulation
//! - **MissedTickBehavior::Skip**: a late tick is dropped instead of bursting to catch up, the
//!   same thing a real device does when a callback overruns
//! - **watch channel**: one-to-many shutdown flag, the receiver wakes on every change
//! - **Generic sink**: `run_host_clock` hands the sink back when it stops, so captured audio can
//!   be inspected or written out

use crate::audio::pcm::float_to_pcm16;
use crate::audio::shared::PlaybackOutput;
use crate::error::AppResult;
use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Destination for rendered quanta.
pub trait BlockSink: Send {
    fn consume(&mut self, block: &[f32]);
}

/// Keeps everything that was rendered.
#[derive(Debug, Default)]
pub struct CaptureSink {
    samples: Vec<f32>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

impl BlockSink for CaptureSink {
    fn consume(&mut self, block: &[f32]) {
        self.samples.extend_from_slice(block);
    }
}

/// Counts blocks and throws them away.
#[derive(Debug, Default)]
pub struct DiscardSink {
    pub blocks: u64,
}

impl BlockSink for DiscardSink {
    fn consume(&mut self, _block: &[f32]) {
        self.blocks += 1;
    }
}

/// Drive `output` until `shutdown` turns true (or its sender is dropped), then return the sink.
///
/// The block is allocated once up front; each tick is a single `process_into` plus a sink call.
pub async fn run_host_clock<S: BlockSink>(
    mut output: PlaybackOutput,
    quantum_size: usize,
    period: Duration,
    mut sink: S,
    mut shutdown: watch::Receiver<bool>,
) -> S {
    let mut block = vec![0.0f32; quantum_size];
    let mut ticker = tokio::time::interval(period.max(Duration::from_micros(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        quantum_size,
        period_us = period.as_micros() as u64,
        "Host clock started"
    );

    let mut ticks: u64 = 0;
    if !*shutdown.borrow() {
        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    output.process_into(&mut block);
                    sink.consume(&block);
                    ticks += 1;
                }
            }
        }
    }

    info!(ticks, "Host clock stopped");
    sink
}

/// Write mono float samples as a 16-bit PCM WAV file.
#[allow(deprecated)]
pub fn write_wav(path: &Path, sample_rate: u32, samples: &[f32]) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let header = wav::Header::new(wav::header::WAV_FORMAT_PCM, 1, sample_rate, 16);
    let data = wav::BitDepth::Sixteen(float_to_pcm16(samples));

    let mut file = File::create(path)?;
    wav::write(header, &data, &mut file)?;

    debug!(path = %path.display(), samples = samples.len(), "Wrote WAV output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::shared::playback_channel;
    use crate::audio::signal::SignalHandler;
    use crate::audio::store::SampleStore;
    use crate::stats::PlaybackStats;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_clock_renders_buffered_audio_then_silence() {
        let (mut control, output) = playback_channel(
            SampleStore::with_capacity(16, 0),
            Arc::new(PlaybackStats::new()),
        );
        control.on_chunk_received(&[0.5; 8]);

        let (tx, rx) = watch::channel(false);
        let clock = tokio::spawn(run_host_clock(
            output,
            4,
            Duration::from_millis(1),
            CaptureSink::new(),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        let samples = clock.await.unwrap().into_samples();

        assert!(samples.len() >= 12);
        assert_eq!(samples.len() % 4, 0);
        assert_eq!(&samples[..8], &[0.5; 8]);
        assert!(samples[8..].iter().all(|s| *s == 0.0));
        assert!(control.stats().snapshot().quanta_processed >= 3);
    }

    #[tokio::test]
    async fn test_clock_stops_when_sender_dropped() {
        let (_control, output) = playback_channel(
            SampleStore::with_capacity(4, 0),
            Arc::new(PlaybackStats::new()),
        );

        let (tx, rx) = watch::channel(false);
        let clock = tokio::spawn(run_host_clock(
            output,
            2,
            Duration::from_millis(1),
            DiscardSink::default(),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(tx);
        let sink = clock.await.unwrap();
        assert!(sink.blocks > 0);
    }

    #[tokio::test]
    async fn test_clock_already_shut_down() {
        let (_control, output) = playback_channel(
            SampleStore::with_capacity(4, 0),
            Arc::new(PlaybackStats::new()),
        );
        let (_tx, rx) = watch::channel(true);

        let sink = run_host_clock(output, 2, Duration::from_millis(1), DiscardSink::default(), rx).await;
        assert_eq!(sink.blocks, 0);
    }

    #[test]
    #[allow(deprecated)]
    fn test_write_wav() {
        let path = std::env::temp_dir().join(format!("playback-{}.wav", uuid::Uuid::new_v4()));
        write_wav(&path, 24000, &[0.0, 0.5, -0.5, 1.0]).unwrap();

        let mut file = File::open(&path).unwrap();
        let (header, data) = wav::read(&mut file).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(header.sampling_rate, 24000);
        assert_eq!(header.channel_count, 1);
        assert_eq!(header.bits_per_sample, 16);
        match data {
            wav::BitDepth::Sixteen(samples) => {
                assert_eq!(samples.len(), 4);
                assert_eq!(samples[0], 0);
                assert_eq!(samples[3], i16::MAX);
            }
            other => panic!("Unexpected bit depth: {:?}", other),
        }
    }
}
