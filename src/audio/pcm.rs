//! # PCM Sample Conversion
//!
//! Turns raw chunk payloads into the `f32` samples the store works with, and back into 16-bit
//! PCM for file output.
//!
//! ## Supported payload formats:
//! - **f32le**: 32-bit IEEE float, little-endian, already in [-1.0, 1.0]
//! - **pcm16le**: 16-bit signed integers, little-endian (what most realtime voice models stream)

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Encoding of binary audio chunk payloads.
///
/// ## Rust Concepts:
/// - **#[serde(rename_all = "lowercase")]**: `SampleFormat::Pcm16Le` is written as `"pcm16le"`
///   in config.toml and environment variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    F32Le,
    #[default]
    Pcm16Le,
}

impl SampleFormat {
    /// Bytes per encoded sample.
    pub fn sample_width(&self) -> usize {
        match self {
            SampleFormat::F32Le => 4,
            SampleFormat::Pcm16Le => 2,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SampleFormat::F32Le => "f32le",
            SampleFormat::Pcm16Le => "pcm16le",
        }
    }

    /// Decode a payload in this format. Trailing bytes that don't form a whole sample are dropped.
    pub fn decode(&self, data: &[u8]) -> Vec<f32> {
        match self {
            SampleFormat::F32Le => decode_f32_le(data),
            SampleFormat::Pcm16Le => decode_pcm16_le(data),
        }
    }
}

impl std::str::FromStr for SampleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "f32le" | "f32" | "float" => Ok(SampleFormat::F32Le),
            "pcm16le" | "pcm16" | "s16le" => Ok(SampleFormat::Pcm16Le),
            _ => Err(format!("Unknown sample format: {}", s)),
        }
    }
}

/// Decode little-endian 32-bit float samples.
pub fn decode_f32_le(data: &[u8]) -> Vec<f32> {
    let mut cursor = Cursor::new(data);
    let mut samples = Vec::with_capacity(data.len() / 4);

    while let Ok(sample) = cursor.read_f32::<LittleEndian>() {
        samples.push(sample);
    }

    samples
}

/// Decode little-endian 16-bit PCM and scale to [-1.0, 1.0].
pub fn decode_pcm16_le(data: &[u8]) -> Vec<f32> {
    let mut cursor = Cursor::new(data);
    let mut samples = Vec::with_capacity(data.len() / 2);

    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(pcm16_sample_to_float(sample));
    }

    samples
}

fn pcm16_sample_to_float(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Convert 16-bit PCM samples to floats.
///
/// ## Conversion:
/// Scales from [-32768, 32767] to [-1.0, 1.0).
pub fn pcm16_to_float(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| pcm16_sample_to_float(s)).collect()
}

/// Convert float samples to 16-bit PCM, clamping anything outside [-1.0, 1.0].
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| {
            let scaled = sample * 32768.0;
            scaled.clamp(-32768.0, 32767.0) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_conversion() {
        let pcm_samples = vec![0i16, 16384, -16384, 32767, -32768];
        let float_samples = pcm16_to_float(&pcm_samples);
        assert_eq!(float_samples[1], 0.5);
        assert_eq!(float_samples[4], -1.0);

        let converted_back = float_to_pcm16(&float_samples);
        for (original, converted) in pcm_samples.iter().zip(converted_back.iter()) {
            let diff = (*original as i32 - *converted as i32).abs();
            assert!(diff <= 1, "Conversion error too large: {} vs {}", original, converted);
        }
    }

    #[test]
    fn test_float_to_pcm_clamps() {
        assert_eq!(float_to_pcm16(&[2.0, -2.0]), vec![32767, -32768]);
    }

    #[test]
    fn test_decode_pcm16_drops_partial_sample() {
        let mut data = Vec::new();
        data.extend_from_slice(&16384i16.to_le_bytes());
        data.extend_from_slice(&(-16384i16).to_le_bytes());
        data.push(0x7f);

        assert_eq!(decode_pcm16_le(&data), vec![0.5, -0.5]);
    }

    #[test]
    fn test_decode_f32() {
        let mut data = Vec::new();
        for sample in [0.25f32, -0.75] {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        assert_eq!(SampleFormat::F32Le.decode(&data), vec![0.25, -0.75]);
    }

    #[test]
    fn test_sample_format_parsing() {
        assert_eq!("PCM16".parse::<SampleFormat>().unwrap(), SampleFormat::Pcm16Le);
        assert_eq!("f32le".parse::<SampleFormat>().unwrap(), SampleFormat::F32Le);
        assert!("mp3".parse::<SampleFormat>().is_err());
        assert_eq!(SampleFormat::F32Le.sample_width(), 4);
    }
}
