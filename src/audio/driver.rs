//! # Playback Driver
//!
//! The periodic side of playback for hosts that run the audio callback and the chunk-arrival
//! handler on the same thread (a browser audio worklet, a single-threaded test harness, an
//! offline renderer). Ordering between the two contexts is already serialized there, so the
//! driver owns its [`SampleStore`] outright.
//!
//! For hosts with a separate audio thread, see [`crate::audio::shared`].
//!
//! ## State Machine:
//! ```text
//!   PreRolling ──(write reaches cushion)──▶ Playing
//!       ▲                                      │
//!       └──────(drained to empty / interrupt)──┘
//! ```
//! The store's pre-roll flag is authoritative; the driver holds no state of its own.

use crate::audio::signal::SignalHandler;
use crate::audio::store::{ReadOutcome, SampleStore, WriteOutcome, WritePlan};
use crate::stats::PlaybackStats;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Observable playback state, derived from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Withholding output until the cushion fills
    PreRolling,
    /// Delivering buffered samples
    Playing,
}

impl PlaybackState {
    pub fn of(store: &SampleStore) -> Self {
        if store.is_pre_rolling() {
            PlaybackState::PreRolling
        } else {
            PlaybackState::Playing
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PlaybackState::PreRolling => "pre_rolling",
            PlaybackState::Playing => "playing",
        }
    }
}

/// Same-thread playback driver.
pub struct PlaybackDriver {
    store: SampleStore,
    stats: Arc<PlaybackStats>,
}

impl PlaybackDriver {
    pub fn new(store: SampleStore) -> Self {
        Self::with_stats(store, Arc::new(PlaybackStats::new()))
    }

    pub fn with_stats(store: SampleStore, stats: Arc<PlaybackStats>) -> Self {
        Self { store, stats }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState::of(&self.store)
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn stats(&self) -> &Arc<PlaybackStats> {
        &self.stats
    }

    /// Pull one quantum. Always returns exactly `quantum_size` samples.
    pub fn process(&mut self, quantum_size: usize) -> Vec<f32> {
        let mut block = vec![0.0; quantum_size];
        self.process_into(&mut block);
        block
    }

    /// Pull one quantum into a preallocated block. Doesn't allocate, lock or log.
    pub fn process_into(&mut self, block: &mut [f32]) -> ReadOutcome {
        let outcome = self.store.read_into(block);
        self.stats.record_quantum(
            block.len(),
            &outcome,
            self.store.underflow_count(),
            self.store.occupied(),
        );
        outcome
    }
}

impl SignalHandler for PlaybackDriver {
    fn on_chunk_received(&mut self, chunk: &[f32]) {
        let outcome = self.store.write(chunk);
        self.stats.record_write(
            chunk.len(),
            &outcome,
            self.store.occupied(),
            self.store.capacity(),
        );
        log_write(
            chunk.len(),
            &outcome,
            self.store.occupied(),
            self.store.pre_roll_threshold(),
        );
    }

    fn on_cushion_override(&mut self, samples: usize) {
        self.store.set_pre_roll_threshold(samples);
        self.stats.record_cushion_override();
        debug!(samples, "Pre-roll cushion overridden");
    }

    fn on_interrupt(&mut self) {
        let discarded = self.store.occupied();
        self.store.clear();
        self.stats.record_interrupt(self.store.capacity());
        info!(discarded, "Playback interrupted, buffer cleared");
    }
}

/// Control-side logging shared by both driver flavours. Takes plain values so callers can log
/// after releasing the store.
pub(crate) fn log_write(len: usize, outcome: &WriteOutcome, occupied: usize, threshold: usize) {
    match outcome.plan {
        WritePlan::Append => {
            trace!(len, occupied, "Chunk appended");
        }
        WritePlan::Compact => {
            debug!(len, occupied, "Compacted buffer before append");
        }
        WritePlan::Grow { capacity } => {
            debug!(len, capacity, occupied, "Grew playback buffer");
        }
    }

    if outcome.released_pre_roll {
        debug!(occupied, threshold, "Pre-roll complete");
    }
}
