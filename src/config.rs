//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_PLAYBACK__SAMPLE_RATE, APP_SESSION__MAX_CONCURRENT_SESSIONS, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use crate::audio::pcm::SampleFormat;
use crate::audio::store::SampleStoreConfig;
use crate::error::AppError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (playback, signal, session, output)
/// keeps each section small and maps directly onto `[section]` tables in config.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub playback: PlaybackConfig,
    pub signal: SignalConfig,
    pub session: SessionConfig,
    pub output: OutputConfig,
}

/// Audio clock and buffer sizing.
///
/// ## Fields:
/// - `sample_rate`: Rate of the host audio context in Hz (24000 is typical for voice models)
/// - `quantum_size`: Samples the audio callback pulls per invocation (128 for a browser worklet)
/// - `initial_capacity_ms`: Size of the first backing allocation; the store grows past it
/// - `pre_roll_ms`: Cushion that must be buffered before playback starts or resumes
///
/// ## Tuning guidelines:
/// - Larger pre-roll: fewer underruns on jittery delivery, but more latency before speech starts
/// - Smaller quantum: lower output latency, but more callbacks per second
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    pub sample_rate: u32,
    pub quantum_size: usize,
    pub initial_capacity_ms: u32,
    pub pre_roll_ms: u32,
}

/// Inbound signal decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// How stdin is read ("json_lines" or "framed")
    pub input: InputMode,
    /// Encoding of binary audio chunk frames ("pcm16le" or "f32le")
    pub sample_format: SampleFormat,
}

/// Wire shape of the signal stream on stdin.
///
/// ## Modes:
/// - **json_lines**: one JSON signal per line, audio samples inline as floats
/// - **framed**: `[kind: u8][len: u32 LE][payload]` frames, so audio can arrive as raw
///   binary in `sample_format`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    JsonLines,
    Framed,
}

/// Session limits and diagnostics cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub max_concurrent_sessions: usize,
    /// How often the monitor logs playback stats (0 disables it)
    pub stats_interval_secs: u64,
}

/// Where the rendered output goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// WAV file written when the session ends (empty = don't write one)
    pub wav_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig {
                sample_rate: 24000,       // Realtime voice models stream 24kHz mono
                quantum_size: 128,        // Web Audio render quantum
                initial_capacity_ms: 1000,
                pre_roll_ms: 200,
            },
            signal: SignalConfig {
                input: InputMode::JsonLines,
                sample_format: SampleFormat::Pcm16Le,
            },
            session: SessionConfig {
                max_concurrent_sessions: 4,
                stats_interval_secs: 5,
            },
            output: OutputConfig {
                wav_path: String::new(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    ///
    /// ## Environment Variable Examples:
    /// - `APP_PLAYBACK__SAMPLE_RATE=48000`: Override the host sample rate
    /// - `APP_PLAYBACK__PRE_ROLL_MS=300`: Longer cushion for flaky networks
    /// - `APP_SIGNAL__SAMPLE_FORMAT=f32le`: Binary chunks are float samples
    /// - `APP_SIGNAL__INPUT=framed`: Read length-prefixed frames from stdin instead of JSON lines
    ///
    /// Nested keys use a double underscore because the field names contain single ones.
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Same as [`load`](Self::load) with an explicit config file name (extension optional).
    pub fn load_from(file_name: &str) -> Result<Self> {
        let settings = config::Config::builder()
            // 1. Start with defaults - converts our Default impl to config format
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. Config file - required(false) means "don't error if missing"
            .add_source(config::File::with_name(file_name).required(false))
            // 3. Environment variables with APP_ prefix
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Sample rate and quantum size are non-zero
    /// - One quantum is at most one second of audio
    /// - At least one session is allowed
    ///
    /// A pre-roll longer than the initial capacity is fine; the store grows to hold it.
    pub fn validate(&self) -> Result<()> {
        if self.playback.sample_rate == 0 {
            return Err(invalid("Sample rate cannot be 0".to_string()));
        }

        if self.playback.quantum_size == 0 {
            return Err(invalid("Quantum size must be greater than 0".to_string()));
        }

        if self.playback.quantum_size > self.playback.sample_rate as usize {
            return Err(invalid(format!(
                "Quantum size {} is longer than one second at {} Hz",
                self.playback.quantum_size, self.playback.sample_rate
            )));
        }

        if self.session.max_concurrent_sessions == 0 {
            return Err(invalid("Max concurrent sessions must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Sample store sizing derived from the playback durations.
    pub fn store_config(&self) -> SampleStoreConfig {
        SampleStoreConfig::from_durations(
            self.playback.sample_rate,
            self.playback.initial_capacity_ms,
            self.playback.pre_roll_ms,
        )
    }

    /// Wall-clock length of one audio quantum.
    ///
    /// ## Example:
    /// 128 samples at 24kHz = 5.333ms between callbacks
    pub fn quantum_duration(&self) -> Duration {
        Duration::from_secs_f64(self.playback.quantum_size as f64 / self.playback.sample_rate as f64)
    }

    /// WAV output path, if one is configured.
    pub fn wav_path(&self) -> Option<&Path> {
        let path = self.output.wav_path.trim();
        if path.is_empty() {
            None
        } else {
            Some(Path::new(path))
        }
    }

    /// Render the effective configuration as TOML (logged at startup).
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Validation failures stay typed as [`AppError::ValidationError`] inside the `anyhow::Error`.
fn invalid(message: String) -> anyhow::Error {
    AppError::ValidationError(message).into()
}
