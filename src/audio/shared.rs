//! # Shared Playback Handles
//!
//! For hosts where the audio callback runs on its own thread. One [`SampleStore`] is split into
//! two handles:
//! - [`PlaybackControl`]: the chunk-arrival side (writes, cushion overrides, interrupts)
//! - [`PlaybackOutput`]: the real-time side (pulls one quantum per callback)
//!
//! ## Locking Rules:
//! - The store lives behind a `Mutex` that is only ever held for a copy
//! - The control side allocates growth space *before* taking the lock and drops the retired
//!   backing *after* releasing it, so nothing inside the critical section allocates or frees
//! - The output side never waits: it uses `try_lock`, and if the control side is mid-copy the
//!   quantum is rendered as silence and counted as contended
//! - Logging happens on the control side only, after the lock is released
//!
//! ## Rust Concepts:
//! - **Arc<Mutex<T>>**: shared ownership plus exclusive access across threads
//! - **PoisonError::into_inner**: a panic on the other side doesn't make the samples invalid,
//!   so a poisoned lock is recovered instead of propagated

use crate::audio::driver::{log_write, PlaybackState};
use crate::audio::signal::SignalHandler;
use crate::audio::store::{ReadOutcome, SampleStore, WritePlan};
use crate::stats::PlaybackStats;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::{debug, info};

struct Shared {
    store: Mutex<SampleStore>,
    stats: Arc<PlaybackStats>,
}

/// Split a store into its control and output handles.
pub fn playback_channel(
    store: SampleStore,
    stats: Arc<PlaybackStats>,
) -> (PlaybackControl, PlaybackOutput) {
    let shared = Arc::new(Shared {
        store: Mutex::new(store),
        stats,
    });

    let control = PlaybackControl {
        shared: Arc::clone(&shared),
        spare: Vec::new(),
    };
    let output = PlaybackOutput { shared };

    (control, output)
}

fn lock_store(store: &Mutex<SampleStore>) -> MutexGuard<'_, SampleStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer handle. Only one exists per store.
pub struct PlaybackControl {
    shared: Arc<Shared>,
    /// Growth target, allocated outside the lock
    spare: Vec<f32>,
}

impl PlaybackControl {
    pub fn state(&self) -> PlaybackState {
        PlaybackState::of(&lock_store(&self.shared.store))
    }

    pub fn occupied(&self) -> usize {
        lock_store(&self.shared.store).occupied()
    }

    pub fn capacity(&self) -> usize {
        lock_store(&self.shared.store).capacity()
    }

    pub fn stats(&self) -> &Arc<PlaybackStats> {
        &self.shared.stats
    }

    /// Make sure `spare` can absorb a growth for a chunk of `len` samples.
    ///
    /// The plan is taken under the lock, the allocation happens after it is released. Only the
    /// output side can run in between, and reading only shrinks the occupied region, so the
    /// capacity the write will actually need is never larger than the one planned here.
    fn reserve_for(&mut self, len: usize) {
        let plan = lock_store(&self.shared.store).plan_write(len);

        if let WritePlan::Grow { capacity } = plan {
            if self.spare.len() < capacity {
                self.spare = vec![0.0; capacity];
            }
        }
    }
}

impl SignalHandler for PlaybackControl {
    fn on_chunk_received(&mut self, chunk: &[f32]) {
        self.reserve_for(chunk.len());

        let (outcome, occupied, capacity, threshold) = {
            let mut store = lock_store(&self.shared.store);
            let outcome = store.write_reusing(chunk, &mut self.spare);
            (outcome, store.occupied(), store.capacity(), store.pre_roll_threshold())
        };

        if let WritePlan::Grow { .. } = outcome.plan {
            // retired backing, freed here rather than under the lock
            self.spare = Vec::new();
        }

        self.shared
            .stats
            .record_write(chunk.len(), &outcome, occupied, capacity);
        log_write(chunk.len(), &outcome, occupied, threshold);
    }

    fn on_cushion_override(&mut self, samples: usize) {
        lock_store(&self.shared.store).set_pre_roll_threshold(samples);
        self.shared.stats.record_cushion_override();
        debug!(samples, "Pre-roll cushion overridden");
    }

    fn on_interrupt(&mut self) {
        let (discarded, capacity) = {
            let mut store = lock_store(&self.shared.store);
            let discarded = store.occupied();
            store.clear();
            (discarded, store.capacity())
        };

        self.shared.stats.record_interrupt(capacity);
        info!(discarded, "Playback interrupted, buffer cleared");
    }
}

/// Real-time handle, moved onto the audio thread.
pub struct PlaybackOutput {
    shared: Arc<Shared>,
}

impl PlaybackOutput {
    /// Pull one quantum. Always returns exactly `quantum_size` samples.
    pub fn process(&mut self, quantum_size: usize) -> Vec<f32> {
        let mut block = vec![0.0; quantum_size];
        self.process_into(&mut block);
        block
    }

    /// Pull one quantum into a preallocated block without waiting on the control side.
    ///
    /// A contended quantum is reported as gated: nothing was consumed and the block is silence.
    pub fn process_into(&mut self, block: &mut [f32]) -> ReadOutcome {
        let mut store = match self.shared.store.try_lock() {
            Ok(store) => store,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                block.fill(0.0);
                self.shared.stats.record_contended_quantum();
                return ReadOutcome {
                    copied: 0,
                    gated: true,
                    rearmed: false,
                };
            }
        };

        let outcome = store.read_into(block);
        let underflow_count = store.underflow_count();
        let occupied = store.occupied();
        drop(store);

        self.shared
            .stats
            .record_quantum(block.len(), &outcome, underflow_count, occupied);
        outcome
    }

    /// Current state. Takes the lock, so not for use inside the audio callback.
    pub fn state(&self) -> PlaybackState {
        PlaybackState::of(&lock_store(&self.shared.store))
    }

    pub fn stats(&self) -> &Arc<PlaybackStats> {
        &self.shared.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::signal::InboundSignal;
    use std::thread;

    fn channel(capacity: usize, threshold: usize) -> (PlaybackControl, PlaybackOutput) {
        playback_channel(
            SampleStore::with_capacity(capacity, threshold),
            Arc::new(PlaybackStats::new()),
        )
    }

    #[test]
    fn test_write_then_process() {
        let (mut control, mut output) = channel(8, 2);
        assert_eq!(output.process(2), vec![0.0, 0.0]);

        control.on_chunk_received(&[0.1, 0.2, 0.3]);
        assert_eq!(control.state(), PlaybackState::Playing);
        assert_eq!(output.process(2), vec![0.1, 0.2]);
        assert_eq!(output.process(2), vec![0.3, 0.0]);
        assert_eq!(control.occupied(), 0);
    }

    #[test]
    fn test_growth_through_spare() {
        let (mut control, mut output) = channel(4, 0);
        control.on_chunk_received(&[1.0; 3]);
        control.on_chunk_received(&[2.0; 3]);

        assert_eq!(control.capacity(), 12);
        assert!(control.spare.is_empty());
        assert_eq!(output.process(6), vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(control.stats().snapshot().growths, 1);
    }

    #[test]
    fn test_interrupt_and_cushion() {
        let (mut control, mut output) = channel(16, 100);
        control.handle(&InboundSignal::SetCushion { samples: 4 });
        control.handle(&InboundSignal::AudioChunk { samples: vec![0.5; 6] });
        assert_eq!(output.process(2), vec![0.5, 0.5]);

        control.handle(&InboundSignal::Interrupt);
        assert_eq!(output.state(), PlaybackState::PreRolling);
        assert_eq!(output.process(2), vec![0.0, 0.0]);
        assert_eq!(control.capacity(), 16);
    }

    #[test]
    fn test_contended_quantum_is_silent() {
        let (control, mut output) = channel(8, 0);
        let guard = lock_store(&control.shared.store);

        assert_eq!(output.process(4), vec![0.0; 4]);
        drop(guard);

        let snapshot = output.stats().snapshot();
        assert_eq!(snapshot.contended_quanta, 1);
        assert_eq!(snapshot.quanta_processed, 1);
    }

    #[test]
    fn test_poisoned_store_keeps_playing() {
        let (mut control, mut output) = channel(8, 0);
        control.on_chunk_received(&[0.25; 4]);

        let shared = Arc::clone(&control.shared);
        let _ = thread::spawn(move || {
            let _guard = shared.store.lock().unwrap();
            panic!("control thread died");
        })
        .join();

        assert_eq!(output.process(4), vec![0.25; 4]);
    }

    #[test]
    fn test_cross_thread_order_preserved() {
        const TOTAL: usize = 10_000;
        let (mut control, mut output) = channel(64, 0);

        let writer = thread::spawn(move || {
            let samples: Vec<f32> = (1..=TOTAL).map(|v| v as f32).collect();
            for chunk in samples.chunks(37) {
                control.on_chunk_received(chunk);
                thread::yield_now();
            }
            control
        });

        let mut received = Vec::with_capacity(TOTAL);
        let mut block = [0.0f32; 128];
        let mut iterations = 0;
        while received.len() < TOTAL && iterations < 5_000_000 {
            output.process_into(&mut block);
            received.extend(block.iter().copied().filter(|s| *s != 0.0));
            iterations += 1;
            if iterations % 64 == 0 {
                thread::yield_now();
            }
        }

        let control = writer.join().unwrap();
        let expected: Vec<f32> = (1..=TOTAL).map(|v| v as f32).collect();
        assert_eq!(received, expected);
        assert_eq!(control.stats().snapshot().samples_written, TOTAL as u64);
    }
}
