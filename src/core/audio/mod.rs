//! Audio transport codec utilities.
//!
//! The live protocol carries raw microphone and speaker audio as base64 text
//! frames over a text-oriented channel. This module provides the pure
//! conversions between normalized f32 samples and that transport encoding.
//!
//! # Audio Format
//!
//! PCM 16-bit signed little-endian, mono. Capture runs at 16kHz, playback at
//! 24kHz. Both rates are fixed protocol constants and are never negotiated.

use base64::prelude::*;
use thiserror::Error;

/// Sample rate for microphone capture (Hz).
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Sample rate for model audio playback (Hz).
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Number of audio channels (mono).
pub const CHANNELS: u16 = 1;

/// Fixed capture block size in samples. Callers feed the encoder exactly one
/// capture buffer's worth of samples at a time; no resampling happens here.
pub const CAPTURE_BLOCK_SIZE: usize = 4096;

/// MIME type tag attached to outbound realtime audio chunks.
pub const INPUT_AUDIO_MIME: &str = "audio/pcm;rate=16000";

/// Errors from decoding transport-encoded audio.
///
/// These indicate a protocol mismatch with the remote side, not a transient
/// condition. Callers should treat them as defects and fail loudly.
#[derive(Debug, Error)]
pub enum AudioCodecError {
    /// The payload was not valid base64
    #[error("invalid base64 audio payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The decoded byte count is not a whole number of 16-bit samples
    #[error("malformed PCM payload: odd byte count {0}")]
    OddByteCount(usize),
}

/// Result type for codec operations.
pub type AudioCodecResult<T> = Result<T, AudioCodecError>;

/// Encode one block of normalized samples for transport.
///
/// Each sample in `[-1.0, 1.0]` is quantized to a signed 16-bit integer by
/// multiplying by 32768 and truncating, packed little-endian, and the byte
/// sequence base64-encoded. Deterministic; allocates only the output buffers.
pub fn encode_for_transport(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let quantized = (sample * 32768.0) as i16;
        bytes.extend_from_slice(&quantized.to_le_bytes());
    }
    BASE64_STANDARD.encode(&bytes)
}

/// Decode transport-encoded audio back to normalized samples.
///
/// Inverse of [`encode_for_transport`]: base64-decode, reinterpret as 16-bit
/// signed little-endian PCM, divide by 32768 to normalize. Tolerates exactly
/// the layout the encoder produces; anything else fails with
/// [`AudioCodecError`] rather than silently truncating.
pub fn decode_from_transport(data: &str) -> AudioCodecResult<Vec<f32>> {
    let bytes = BASE64_STANDARD.decode(data)?;
    if bytes.len() % 2 != 0 {
        return Err(AudioCodecError::OddByteCount(bytes.len()));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();
    Ok(samples)
}

/// Duration in seconds of a decoded playback buffer at the playback rate.
pub fn playback_duration_secs(sample_count: usize) -> f64 {
    sample_count as f64 / PLAYBACK_SAMPLE_RATE as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_within_quantization_error() {
        let samples: Vec<f32> = (0..CAPTURE_BLOCK_SIZE)
            .map(|i| ((i as f32) * 0.013).sin() * 0.8)
            .collect();

        let encoded = encode_for_transport(&samples);
        let decoded = decode_from_transport(&encoded).unwrap();

        assert_eq!(decoded.len(), samples.len());
        for (original, reconstructed) in samples.iter().zip(decoded.iter()) {
            assert!(
                (original - reconstructed).abs() <= 1.0 / 32768.0,
                "sample drifted beyond quantization error: {} vs {}",
                original,
                reconstructed
            );
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let samples = vec![0.0, 0.5, -0.5, 0.25];
        assert_eq!(encode_for_transport(&samples), encode_for_transport(&samples));
    }

    #[test]
    fn test_encode_empty_block() {
        let encoded = encode_for_transport(&[]);
        assert!(encoded.is_empty());
        assert!(decode_from_transport(&encoded).unwrap().is_empty());
    }

    #[test]
    fn test_known_sample_layout() {
        // 0.5 * 32768 = 16384 = 0x4000, little-endian [0x00, 0x40]
        let encoded = encode_for_transport(&[0.5]);
        let bytes = BASE64_STANDARD.decode(&encoded).unwrap();
        assert_eq!(bytes, vec![0x00, 0x40]);
    }

    #[test]
    fn test_decode_rejects_odd_byte_count() {
        let encoded = BASE64_STANDARD.encode([0u8, 1, 2]);
        match decode_from_transport(&encoded) {
            Err(AudioCodecError::OddByteCount(3)) => {}
            other => panic!("expected OddByteCount, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        match decode_from_transport("not!!valid@@base64") {
            Err(AudioCodecError::InvalidBase64(_)) => {}
            other => panic!("expected InvalidBase64, got {:?}", other),
        }
    }

    #[test]
    fn test_playback_duration() {
        // 24000 samples at 24kHz is exactly one second
        assert!((playback_duration_secs(24_000) - 1.0).abs() < f64::EPSILON);
        assert!((playback_duration_secs(12_000) - 0.5).abs() < f64::EPSILON);
    }
}
