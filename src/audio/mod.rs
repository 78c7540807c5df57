//! # Audio Playback Module
//!
//! Turns a stream of variable-length audio chunks from a voice model into the fixed-size blocks
//! an audio callback pulls, without ever blocking or failing on the real-time side.
//!
//! ## Key Components:
//! - **Sample Store**: Growable linear buffer with pre-roll gating and underflow tracking
//! - **Playback Driver**: Same-thread quantum pull for hosts that serialize both contexts
//! - **Shared Handles**: Control/output split for hosts with a dedicated audio thread
//! - **Signal Protocol**: Inbound audio chunks, cushion overrides and interrupts
//! - **PCM**: Sample format conversion for binary chunk frames and WAV output
//! - **Session Manager**: Tracks playback sessions and their lifecycle
//!
//! ## Audio Format:
//! - **Channels**: Mono
//! - **Samples**: 32-bit float in [-1.0, 1.0]
//! - **Sample Rate**: Whatever the host clock runs at (24kHz by default)

pub mod driver;     // Same-thread playback driver
pub mod pcm;        // Sample format conversion
pub mod session;    // Session state management
pub mod shared;     // Cross-thread control/output handles
pub mod signal;     // Inbound signal decoding and dispatch
pub mod store;      // Growable sample store
