//! # Voice Playback
//!
//! Real-time playback buffer for streamed assistant speech. Chunks of samples arrive from a voice
//! model at irregular intervals; an audio callback pulls fixed-size quanta at a steady rate. The
//! buffer in between absorbs the jitter, waits for a pre-roll cushion before starting, pads with
//! silence on starvation and drops everything on barge-in.
//!
//! ## Module Layout:
//! - **audio**: the sample store, the playback drivers, the signal protocol and sessions
//! - **host**: a tokio-driven stand-in for the audio device, plus WAV output
//! - **stats**: lock-free counters shared by both sides
//! - **config**: layered configuration (defaults, config.toml, APP_ environment variables)
//! - **error**: application error type

pub mod audio;
pub mod config;
pub mod error;
pub mod host;
pub mod stats;
