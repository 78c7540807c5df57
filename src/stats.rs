//! # Playback Statistics
//!
//! Counters shared between the chunk-arrival context and the audio callback.
//!
//! ## Why atomics instead of Arc<RwLock<T>>:
//! The audio callback must never wait for a lock, and it must never log. It bumps these
//! counters with relaxed atomic adds, and a monitor task on the control side reads a
//! [`StatsSnapshot`] and does the logging.
//!
//! ## Memory Ordering:
//! Every counter uses `Ordering::Relaxed`. They are diagnostics only; a snapshot may mix values
//! from adjacent quanta and that's fine.

use crate::audio::store::{ReadOutcome, WriteOutcome, WritePlan};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Live counters for one playback session.
#[derive(Debug)]
pub struct PlaybackStats {
    // control side
    chunks_received: AtomicU64,
    samples_written: AtomicU64,
    growths: AtomicU64,
    compactions: AtomicU64,
    interrupts: AtomicU64,
    cushion_overrides: AtomicU64,
    ignored_signals: AtomicU64,

    // real-time side
    quanta_processed: AtomicU64,
    gated_quanta: AtomicU64,
    starved_quanta: AtomicU64,
    contended_quanta: AtomicU64,
    samples_played: AtomicU64,
    underflow_samples_total: AtomicU64,
    rearm_events: AtomicU64,

    // gauges, last value written by either side
    underflow_count: AtomicU64,
    occupied: AtomicU64,
    capacity: AtomicU64,

    start_time: Instant,
}

/// Point-in-time copy of [`PlaybackStats`], safe to log or serialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub chunks_received: u64,
    pub samples_written: u64,
    pub growths: u64,
    pub compactions: u64,
    pub interrupts: u64,
    pub cushion_overrides: u64,
    pub ignored_signals: u64,
    pub quanta_processed: u64,
    pub gated_quanta: u64,
    pub starved_quanta: u64,
    pub contended_quanta: u64,
    pub samples_played: u64,
    pub underflow_samples_total: u64,
    pub rearm_events: u64,
    pub underflow_count: u64,
    pub occupied: u64,
    pub capacity: u64,
    pub uptime_seconds: u64,
}

impl Default for PlaybackStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackStats {
    pub fn new() -> Self {
        Self {
            chunks_received: AtomicU64::new(0),
            samples_written: AtomicU64::new(0),
            growths: AtomicU64::new(0),
            compactions: AtomicU64::new(0),
            interrupts: AtomicU64::new(0),
            cushion_overrides: AtomicU64::new(0),
            ignored_signals: AtomicU64::new(0),
            quanta_processed: AtomicU64::new(0),
            gated_quanta: AtomicU64::new(0),
            starved_quanta: AtomicU64::new(0),
            contended_quanta: AtomicU64::new(0),
            samples_played: AtomicU64::new(0),
            underflow_samples_total: AtomicU64::new(0),
            rearm_events: AtomicU64::new(0),
            underflow_count: AtomicU64::new(0),
            occupied: AtomicU64::new(0),
            capacity: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one chunk write and the buffer level after it.
    pub fn record_write(&self, len: usize, outcome: &WriteOutcome, occupied: usize, capacity: usize) {
        self.chunks_received.fetch_add(1, Ordering::Relaxed);
        self.samples_written.fetch_add(len as u64, Ordering::Relaxed);

        match outcome.plan {
            WritePlan::Append => {}
            WritePlan::Compact => {
                self.compactions.fetch_add(1, Ordering::Relaxed);
            }
            WritePlan::Grow { .. } => {
                self.growths.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.set_levels(occupied, capacity);
    }

    pub fn record_interrupt(&self, capacity: usize) {
        self.interrupts.fetch_add(1, Ordering::Relaxed);
        self.set_levels(0, capacity);
    }

    pub fn record_cushion_override(&self) {
        self.cushion_overrides.fetch_add(1, Ordering::Relaxed);
    }

    /// Inbound frames that were dropped as unrecognized or malformed.
    pub fn record_ignored_signal(&self) {
        self.ignored_signals.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one pulled quantum. Called from the audio callback: atomics only.
    pub fn record_quantum(
        &self,
        requested: usize,
        outcome: &ReadOutcome,
        underflow_count: usize,
        occupied: usize,
    ) {
        self.quanta_processed.fetch_add(1, Ordering::Relaxed);
        self.samples_played.fetch_add(outcome.copied as u64, Ordering::Relaxed);

        if outcome.gated {
            self.gated_quanta.fetch_add(1, Ordering::Relaxed);
        } else if outcome.copied < requested {
            self.starved_quanta.fetch_add(1, Ordering::Relaxed);
            self.underflow_samples_total
                .fetch_add(outcome.silence(requested) as u64, Ordering::Relaxed);
        }

        if outcome.rearmed {
            self.rearm_events.fetch_add(1, Ordering::Relaxed);
        }

        self.underflow_count.store(underflow_count as u64, Ordering::Relaxed);
        self.occupied.store(occupied as u64, Ordering::Relaxed);
    }

    /// A quantum rendered as silence because the control side held the store.
    pub fn record_contended_quantum(&self) {
        self.quanta_processed.fetch_add(1, Ordering::Relaxed);
        self.contended_quanta.fetch_add(1, Ordering::Relaxed);
    }

    fn set_levels(&self, occupied: usize, capacity: usize) {
        self.occupied.store(occupied as u64, Ordering::Relaxed);
        self.capacity.store(capacity as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            growths: self.growths.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            interrupts: self.interrupts.load(Ordering::Relaxed),
            cushion_overrides: self.cushion_overrides.load(Ordering::Relaxed),
            ignored_signals: self.ignored_signals.load(Ordering::Relaxed),
            quanta_processed: self.quanta_processed.load(Ordering::Relaxed),
            gated_quanta: self.gated_quanta.load(Ordering::Relaxed),
            starved_quanta: self.starved_quanta.load(Ordering::Relaxed),
            contended_quanta: self.contended_quanta.load(Ordering::Relaxed),
            samples_played: self.samples_played.load(Ordering::Relaxed),
            underflow_samples_total: self.underflow_samples_total.load(Ordering::Relaxed),
            rearm_events: self.rearm_events.load(Ordering::Relaxed),
            underflow_count: self.underflow_count.load(Ordering::Relaxed),
            occupied: self.occupied.load(Ordering::Relaxed),
            capacity: self.capacity.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl StatsSnapshot {
    /// Share of quanta that carried real audio (0.0 to 1.0).
    pub fn playing_ratio(&self) -> f64 {
        if self.quanta_processed > 0 {
            let silent = self.gated_quanta + self.contended_quanta;
            (self.quanta_processed - silent.min(self.quanta_processed)) as f64
                / self.quanta_processed as f64
        } else {
            0.0
        }
    }

    /// Starvation silence relative to everything that was actually played (0.0 = clean).
    pub fn underflow_ratio(&self) -> f64 {
        let total = self.samples_played + self.underflow_samples_total;
        if total > 0 {
            self.underflow_samples_total as f64 / total as f64
        } else {
            0.0
        }
    }
}
