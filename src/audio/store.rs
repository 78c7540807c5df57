//! # Sample Store
//!
//! Growable playback buffer that sits between the chunk stream coming from the voice model and
//! the fixed-size audio callback. Writes arrive in bursts of any length, reads are always exactly
//! one quantum long.
//!
//! ## Key Features:
//! - **Linear occupied region**: samples live in `[read_index, write_index)` and never wrap
//! - **Lazy growth**: space is reclaimed by compaction first, the backing only grows when
//!   compaction can't make room
//! - **Pre-roll gating**: reads stay silent until a cushion of samples has accumulated
//! - **Silence on starvation**: a short read is padded with zeros and counted, never an error
//!
//! ## Write decision table:
//! | Condition                                | Plan      |
//! |------------------------------------------|-----------|
//! | `write_index + len <= capacity`          | `Append`  |
//! | `len <= read_index`                      | `Compact` |
//! | otherwise                                | `Grow`    |

use std::mem;

/// Configuration for a sample store.
///
/// ## Rust Concepts:
/// - **#[derive(Debug, Clone, Copy)]**: Small plain-data struct, cheap to pass by value
/// - **usize**: Sample counts and indices are memory sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleStoreConfig {
    /// Capacity of the backing allocation at creation (in samples)
    pub initial_capacity: usize,

    /// Occupied length required before playback starts or resumes (in samples)
    pub pre_roll_threshold: usize,
}

impl SampleStoreConfig {
    /// Derive sample counts from durations at the given sample rate.
    ///
    /// ## Example:
    /// 1000ms of capacity at 24kHz: 1000 * 24000 / 1000 = 24,000 samples
    pub fn from_durations(sample_rate: u32, initial_capacity_ms: u32, pre_roll_ms: u32) -> Self {
        Self {
            initial_capacity: ms_to_samples(sample_rate, initial_capacity_ms),
            pre_roll_threshold: ms_to_samples(sample_rate, pre_roll_ms),
        }
    }
}

impl Default for SampleStoreConfig {
    fn default() -> Self {
        Self::from_durations(24000, 1000, 200)
    }
}

/// Convert a duration in milliseconds into a sample count.
pub fn ms_to_samples(sample_rate: u32, ms: u32) -> usize {
    (ms as usize * sample_rate as usize) / 1000
}

/// How a write will make room for its chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePlan {
    /// The chunk fits after `write_index` as-is
    Append,
    /// The consumed prefix is large enough; shift the occupied region to offset 0
    Compact,
    /// Neither fits; move into a new backing of `capacity` samples
    Grow { capacity: usize },
}

/// What a single write did, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub plan: WritePlan,
    /// True when this write ended the pre-roll phase
    pub released_pre_roll: bool,
}

/// What a single read did, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Real samples copied into the destination
    pub copied: usize,
    /// True when the block was withheld because the store was pre-rolling
    pub gated: bool,
    /// True when this read drained the store and re-armed pre-roll
    pub rearmed: bool,
}

impl ReadOutcome {
    /// Silence samples synthesized for a destination of `requested` samples.
    pub fn silence(&self, requested: usize) -> usize {
        requested - self.copied
    }
}

/// Expandable single-producer/single-consumer sample buffer.
///
/// ## Ownership:
/// The store itself is plain data with `&mut self` methods. Sharing it between the chunk-arrival
/// context and the audio callback is the job of [`crate::audio::shared`]; a host that runs both
/// contexts on one thread can own it directly through [`crate::audio::driver::PlaybackDriver`].
#[derive(Debug, Clone)]
pub struct SampleStore {
    backing: Vec<f32>,
    read_index: usize,
    write_index: usize,
    pre_rolling: bool,
    pre_roll_threshold: usize,
    underflow_count: usize,
}

impl SampleStore {
    /// Create an empty store in the pre-rolling state.
    pub fn new(config: SampleStoreConfig) -> Self {
        Self {
            backing: vec![0.0; config.initial_capacity],
            read_index: 0,
            write_index: 0,
            pre_rolling: true,
            pre_roll_threshold: config.pre_roll_threshold,
            underflow_count: 0,
        }
    }

    /// Shorthand used by hosts that think in raw sample counts.
    pub fn with_capacity(capacity: usize, pre_roll_threshold: usize) -> Self {
        Self::new(SampleStoreConfig {
            initial_capacity: capacity,
            pre_roll_threshold,
        })
    }

    pub fn capacity(&self) -> usize {
        self.backing.len()
    }

    /// Samples written but not yet read.
    pub fn occupied(&self) -> usize {
        self.write_index - self.read_index
    }

    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    pub fn is_pre_rolling(&self) -> bool {
        self.pre_rolling
    }

    pub fn pre_roll_threshold(&self) -> usize {
        self.pre_roll_threshold
    }

    /// Silence samples synthesized since real samples were last delivered.
    pub fn underflow_count(&self) -> usize {
        self.underflow_count
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Decide how a chunk of `len` samples will be made to fit.
    pub fn plan_write(&self, len: usize) -> WritePlan {
        if self.write_index + len <= self.capacity() {
            WritePlan::Append
        } else if len <= self.read_index {
            WritePlan::Compact
        } else {
            WritePlan::Grow {
                capacity: 2 * (len + self.occupied()),
            }
        }
    }

    /// Append a chunk, compacting or growing the backing when needed.
    ///
    /// Never fails and never blocks. Growth doubles the space needed for the occupied region plus
    /// the chunk, so reallocations happen O(log n) times over a session.
    pub fn write(&mut self, chunk: &[f32]) -> WriteOutcome {
        let mut spare = Vec::new();
        self.write_reusing(chunk, &mut spare)
    }

    /// Same as [`write`](Self::write), but growth moves into `spare` when it is already large
    /// enough instead of allocating.
    ///
    /// ## Why a spare buffer:
    /// The shared handle allocates the spare while the store is unlocked. After a growth, `spare`
    /// holds the retired backing so the caller can drop it outside the lock too.
    pub fn write_reusing(&mut self, chunk: &[f32], spare: &mut Vec<f32>) -> WriteOutcome {
        let plan = self.plan_write(chunk.len());

        match plan {
            WritePlan::Append => {}
            WritePlan::Compact => {
                self.backing.copy_within(self.read_index..self.write_index, 0);
                self.rebase();
            }
            WritePlan::Grow { capacity } => {
                if spare.len() < capacity {
                    *spare = vec![0.0; capacity];
                }
                let occupied = self.occupied();
                spare[..occupied].copy_from_slice(&self.backing[self.read_index..self.write_index]);
                mem::swap(&mut self.backing, spare);
                self.rebase();
            }
        }

        let end = self.write_index + chunk.len();
        self.backing[self.write_index..end].copy_from_slice(chunk);
        self.write_index = end;

        let released_pre_roll = self.pre_rolling && self.occupied() >= self.pre_roll_threshold;
        if released_pre_roll {
            self.pre_rolling = false;
        }

        WriteOutcome {
            plan,
            released_pre_roll,
        }
    }

    /// Move the indices so the occupied region starts at 0.
    fn rebase(&mut self) {
        self.write_index -= self.read_index;
        self.read_index = 0;
    }

    /// Read exactly `len` samples, padding with silence.
    pub fn read(&mut self, len: usize) -> Vec<f32> {
        let mut block = vec![0.0; len];
        self.read_into(&mut block);
        block
    }

    /// Fill `dest` completely: real samples first, silence for the rest.
    ///
    /// ## Rules:
    /// - While pre-rolling the whole block is silence and nothing is consumed
    /// - Delivering any real sample resets `underflow_count`
    /// - Every sample padded while playing is added to `underflow_count`; pre-roll silence is
    ///   withheld output, not starvation, and is never counted
    /// - Draining to empty re-arms pre-roll
    pub fn read_into(&mut self, dest: &mut [f32]) -> ReadOutcome {
        let requested = dest.len();

        if self.pre_rolling {
            // gated: underflow_count is left alone
            dest.fill(0.0);
            return ReadOutcome {
                copied: 0,
                gated: true,
                rearmed: false,
            };
        }

        let copied = requested.min(self.occupied());
        let end = self.read_index + copied;
        dest[..copied].copy_from_slice(&self.backing[self.read_index..end]);
        dest[copied..].fill(0.0);
        self.read_index = end;

        if copied > 0 && self.underflow_count > 0 {
            self.underflow_count = 0;
        }
        if copied < requested {
            self.underflow_count += requested - copied;
        }

        let rearmed = copied == 0 && requested > 0;
        if rearmed {
            self.pre_rolling = true;
        }

        ReadOutcome {
            copied,
            gated: false,
            rearmed,
        }
    }

    /// Override the cushion. Takes effect at the next write or read, no re-check here.
    pub fn set_pre_roll_threshold(&mut self, samples: usize) {
        self.pre_roll_threshold = samples;
    }

    /// Drop everything buffered and re-arm pre-roll. The allocation is kept for reuse.
    pub fn clear(&mut self) {
        self.read_index = 0;
        self.write_index = 0;
        self.pre_rolling = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(from: u32, to: u32) -> Vec<f32> {
        (from..=to).map(|v| v as f32).collect()
    }

    #[test]
    fn test_refill_after_partial_read_grows_in_order() {
        let mut store = SampleStore::with_capacity(10, 10);
        store.write(&ramp(1, 10));
        assert!(!store.is_pre_rolling());

        assert_eq!(store.read(5), ramp(1, 5));

        let outcome = store.write(&ramp(11, 16));
        assert_eq!(outcome.plan, WritePlan::Grow { capacity: 22 });
        assert_eq!(store.occupied(), 11);

        let mut played = store.read(6);
        played.extend(store.read(5));
        assert_eq!(played, ramp(6, 16));
    }

    #[test]
    fn test_compaction_path_without_growth() {
        let mut store = SampleStore::with_capacity(10, 1);
        store.write(&ramp(1, 10));
        store.read(6);

        let outcome = store.write(&ramp(11, 15));
        assert_eq!(outcome.plan, WritePlan::Compact);
        assert_eq!(store.capacity(), 10);
        assert_eq!(store.read_index(), 0);
        assert_eq!(store.write_index(), 9);

        let mut played = store.read(4);
        played.extend(store.read(5));
        assert_eq!(played, ramp(7, 15));
    }

    #[test]
    fn test_growth_preserves_unread_samples() {
        let mut store = SampleStore::with_capacity(4, 1);
        store.write(&ramp(1, 4));
        assert_eq!(store.read(1), vec![1.0]);

        let outcome = store.write(&ramp(5, 9));
        assert_eq!(outcome.plan, WritePlan::Grow { capacity: 16 });
        assert_eq!(store.capacity(), 16);
        assert_eq!(store.read(8), ramp(2, 9));
    }

    #[test]
    fn test_occupied_tracks_writes_minus_reads() {
        let mut store = SampleStore::with_capacity(8, 0);
        let mut written = 0;
        let mut read = 0;

        for (i, len) in [3usize, 7, 1, 12, 0, 5].iter().enumerate() {
            store.write(&vec![i as f32; *len]);
            written += len;
            assert_eq!(store.occupied(), written - read);

            let block = store.read(4);
            assert_eq!(block.len(), 4);
            read += 4.min(written - read);
            assert_eq!(store.occupied(), written - read);
        }
    }

    #[test]
    fn test_pre_roll_silence_before_first_write() {
        let mut store = SampleStore::with_capacity(16, 3);
        let outcome = store.read_into(&mut [1.0; 4]);
        assert!(outcome.gated);

        assert_eq!(store.read(4), vec![0.0; 4]);
        assert!(store.is_pre_rolling());
        assert_eq!(store.underflow_count(), 0);
    }

    #[test]
    fn test_pre_roll_holds_until_threshold() {
        let mut store = SampleStore::with_capacity(16, 3);
        let outcome = store.write(&[0.5, 0.5]);
        assert!(!outcome.released_pre_roll);
        assert_eq!(store.read(2), vec![0.0; 2]);
        assert_eq!(store.occupied(), 2);

        let outcome = store.write(&[0.5]);
        assert!(outcome.released_pre_roll);
        assert_eq!(store.read(2), vec![0.5; 2]);
    }

    #[test]
    fn test_gated_reads_after_clear_leave_underflow_untouched() {
        let mut store = SampleStore::with_capacity(16, 4);
        store.write(&[0.5; 4]);
        assert_eq!(store.read(6), vec![0.5, 0.5, 0.5, 0.5, 0.0, 0.0]);
        assert_eq!(store.underflow_count(), 2);

        store.clear();
        for _ in 0..5 {
            let outcome = store.read_into(&mut [0.0; 8]);
            assert!(outcome.gated);
            assert_eq!(outcome.copied, 0);
        }
        assert_eq!(store.underflow_count(), 2);
    }

    #[test]
    fn test_underflow_counting_and_recovery() {
        let mut store = SampleStore::with_capacity(16, 3);
        store.write(&[0.1, 0.2, 0.3]);

        assert_eq!(store.read(2), vec![0.1, 0.2]);
        assert_eq!(store.read(2), vec![0.3, 0.0]);
        assert_eq!(store.underflow_count(), 1);

        // fully drained: silence, more underflow, pre-roll re-armed
        let mut block = [9.0; 2];
        let outcome = store.read_into(&mut block);
        assert_eq!(block, [0.0, 0.0]);
        assert!(outcome.rearmed);
        assert!(store.is_pre_rolling());
        assert_eq!(store.underflow_count(), 3);

        // gated reads don't count as starvation
        store.read(2);
        assert_eq!(store.underflow_count(), 3);

        store.write(&[0.4, 0.5, 0.6]);
        assert_eq!(store.read(2), vec![0.4, 0.5]);
        assert_eq!(store.underflow_count(), 0);
    }

    #[test]
    fn test_partial_read_after_starvation_restarts_count() {
        let mut store = SampleStore::with_capacity(16, 1);
        store.write(&[1.0]);
        store.read(1);
        store.read(3);
        assert_eq!(store.underflow_count(), 3);

        store.write(&[2.0]);
        assert_eq!(store.read(4), vec![2.0, 0.0, 0.0, 0.0]);
        assert_eq!(store.underflow_count(), 3);
    }

    #[test]
    fn test_clear_mid_playback_silences_next_read() {
        let mut store = SampleStore::with_capacity(16, 2);
        store.write(&ramp(1, 8));
        store.read(3);

        store.clear();
        assert_eq!(store.read(4), vec![0.0; 4]);
        assert_eq!(store.occupied(), 0);
        assert_eq!(store.capacity(), 16);

        store.write(&[7.0]);
        assert_eq!(store.read(1), vec![0.0]);
        store.write(&[8.0]);
        assert_eq!(store.read(2), vec![7.0, 8.0]);
    }

    #[test]
    fn test_clear_keeps_grown_capacity() {
        let mut store = SampleStore::with_capacity(2, 1);
        store.write(&ramp(1, 6));
        let grown = store.capacity();
        assert!(grown >= 6);

        store.clear();
        assert_eq!(store.capacity(), grown);
    }

    #[test]
    fn test_threshold_override_applies_on_next_write() {
        let mut store = SampleStore::with_capacity(16, 8);
        store.write(&[1.0; 4]);
        store.set_pre_roll_threshold(2);
        assert!(store.is_pre_rolling());

        store.write(&[1.0]);
        assert!(!store.is_pre_rolling());
    }

    #[test]
    fn test_read_returns_requested_length() {
        let mut store = SampleStore::with_capacity(4, 0);
        store.write(&[1.0, 2.0]);
        for len in [0usize, 1, 3, 128] {
            assert_eq!(store.read(len).len(), len);
        }
    }

    #[test]
    fn test_zero_length_read_does_not_rearm() {
        let mut store = SampleStore::with_capacity(4, 0);
        store.write(&[1.0]);
        store.read(1);
        let outcome = store.read_into(&mut [0.0f32; 0]);
        assert!(!outcome.rearmed);
        assert!(!store.is_pre_rolling());
    }

    #[test]
    fn test_write_reusing_hands_back_retired_backing() {
        let mut store = SampleStore::with_capacity(4, 0);
        let mut spare = vec![0.0; 32];
        let outcome = store.write_reusing(&ramp(1, 6), &mut spare);

        assert_eq!(outcome.plan, WritePlan::Grow { capacity: 12 });
        assert_eq!(store.capacity(), 32);
        assert_eq!(spare.len(), 4);
        assert_eq!(store.read(6), ramp(1, 6));
    }

    #[test]
    fn test_config_from_durations() {
        let config = SampleStoreConfig::from_durations(16000, 2000, 250);
        assert_eq!(config.initial_capacity, 32000);
        assert_eq!(config.pre_roll_threshold, 4000);
    }
}
