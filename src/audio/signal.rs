//! # Playback Signal Protocol
//!
//! Inbound signals share one message channel: audio chunks and control events arrive in the
//! order upstream sent them and are forwarded into the playback buffer synchronously.
//!
//! ## Message Format:
//! - **Text frames**: JSON objects tagged by `type`
//!   - `{"type": "audio_chunk", "samples": [0.0, 0.1, ...]}`
//!   - `{"type": "set_cushion", "samples": 4800}`
//!   - `{"type": "interrupt"}`
//! - **Binary frames**: a raw audio chunk in the configured [`SampleFormat`]
//!
//! ## Framed Input:
//! Byte-stream transports (stdin, a pipe) carry both frame types as
//! `[kind: u8][len: u32 LE][payload]`, with kind [`FRAME_TEXT`] or [`FRAME_BINARY`].
//!
//! ## Robustness:
//! Anything that can't be understood is dropped with a log line. Upstream protocol drift must
//! never reach the real-time path as an error.

use crate::audio::pcm::SampleFormat;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

/// Frame kind: UTF-8 JSON signal
pub const FRAME_TEXT: u8 = 1;
/// Frame kind: raw audio chunk
pub const FRAME_BINARY: u8 = 2;
/// Largest payload a framed reader accepts (16 MiB)
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Every signal the playback buffer understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundSignal {
    /// Audio to append to the buffer
    #[serde(rename = "audio_chunk", alias = "write")]
    AudioChunk {
        /// Mono samples in [-1.0, 1.0]
        samples: Vec<f32>,
    },

    /// Override the pre-roll cushion
    #[serde(rename = "set_cushion", alias = "set_pre_roll")]
    SetCushion {
        /// Cushion length in samples
        samples: usize,
    },

    /// Barge-in: discard everything buffered
    #[serde(rename = "interrupt", alias = "clear")]
    Interrupt,
}

impl InboundSignal {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundSignal::AudioChunk { .. } => "audio_chunk",
            InboundSignal::SetCushion { .. } => "set_cushion",
            InboundSignal::Interrupt => "interrupt",
        }
    }
}

/// Parse a text frame, reporting why it was rejected.
pub fn parse_text(text: &str) -> AppResult<InboundSignal> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    let kind = value
        .get("type")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::SignalError("Signal has no type field".to_string()))?;

    match kind.as_str() {
        "audio_chunk" | "write" | "set_cushion" | "set_pre_roll" | "interrupt" | "clear" => {
            serde_json::from_value(value).map_err(|e| {
                AppError::SignalError(format!("Malformed {} payload: {}", kind, e))
            })
        }
        other => Err(AppError::SignalError(format!("Unrecognized signal type '{}'", other))),
    }
}

/// Decode a text frame. Unrecognized or malformed frames are logged and ignored.
pub fn decode_text(text: &str) -> Option<InboundSignal> {
    match parse_text(text) {
        Ok(signal) => Some(signal),
        Err(AppError::SignalError(reason)) => {
            debug!(reason = %reason, "Ignoring inbound signal");
            None
        }
        Err(err) => {
            warn!(code = err.code(), error = %err, "Ignoring unparseable inbound frame");
            None
        }
    }
}

/// Decode a binary frame as an audio chunk. Frames too short to hold one sample are ignored.
pub fn decode_binary(data: &[u8], format: SampleFormat) -> Option<InboundSignal> {
    if data.len() < format.sample_width() {
        debug!(bytes = data.len(), format = format.as_str(), "Ignoring short binary frame");
        return None;
    }

    if data.len() % format.sample_width() != 0 {
        warn!(
            bytes = data.len(),
            format = format.as_str(),
            "Binary frame has a partial trailing sample, dropping it"
        );
    }

    Some(InboundSignal::AudioChunk {
        samples: format.decode(data),
    })
}

/// One length-prefixed frame read from a byte stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub kind: u8,
    pub payload: Vec<u8>,
}

impl RawFrame {
    /// Decode by kind. Binary payloads use `format`; unknown kinds are ignored.
    pub fn decode(&self, format: SampleFormat) -> Option<InboundSignal> {
        match self.kind {
            FRAME_TEXT => match std::str::from_utf8(&self.payload) {
                Ok(text) => decode_text(text),
                Err(e) => {
                    warn!(error = %e, "Ignoring text frame that isn't UTF-8");
                    None
                }
            },
            FRAME_BINARY => decode_binary(&self.payload, format),
            other => {
                debug!(kind = other, bytes = self.payload.len(), "Ignoring frame of unknown kind");
                None
            }
        }
    }
}

/// Read the next frame. `Ok(None)` means the stream ended cleanly on a frame boundary.
///
/// ## Errors:
/// - `UnexpectedEof` when the stream ends inside a frame
/// - `InvalidData` when the declared length exceeds [`MAX_FRAME_LEN`]
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<RawFrame>> {
    let kind = match reader.read_u8().await {
        Ok(kind) => kind,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };

    let len = reader.read_u32_le().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Frame of {} bytes exceeds the {} byte limit", len, MAX_FRAME_LEN),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(RawFrame { kind, payload }))
}

/// Receiver side of the signal table.
///
/// ## Rust Concepts:
/// - **Trait with a provided method**: implementors write the three forwarding methods,
///   `handle` is shared dispatch logic they get for free
pub trait SignalHandler {
    /// audio-chunk → write
    fn on_chunk_received(&mut self, chunk: &[f32]);

    /// set-cushion → set pre-roll threshold
    fn on_cushion_override(&mut self, samples: usize);

    /// interrupt → clear
    fn on_interrupt(&mut self);

    /// Route a decoded signal to the matching callback.
    fn handle(&mut self, signal: &InboundSignal) {
        match signal {
            InboundSignal::AudioChunk { samples } => self.on_chunk_received(samples),
            InboundSignal::SetCushion { samples } => self.on_cushion_override(*samples),
            InboundSignal::Interrupt => self.on_interrupt(),
        }
    }
}
