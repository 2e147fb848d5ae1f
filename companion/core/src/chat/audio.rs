//! Audio payloads and playback

use std::time::Duration;

use async_trait::async_trait;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use bytes::Bytes;
use tracing::trace;

/// Byte rate assumed when estimating clip length (32 kHz, 16-bit mono)
pub const ASSUMED_BYTES_PER_SECOND: u64 = 64_000;

/// Minimum reveal time per displayed character
pub const MIN_MS_PER_CHAR: u64 = 120;

/// Standard alphabet, padding optional
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A text fragment and the audio that voices it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextAudioPair {
    /// Fragment shown while the clip plays (may be empty)
    pub text: String,
    /// Encoded audio clip
    pub audio: Bytes,
}

/// Decode a base64 audio field
///
/// Whitespace is ignored, padding is optional and URL-safe characters are
/// accepted.
///
/// # Errors
///
/// Returns the decoder error if the payload is not base64.
pub fn decode_audio(encoded: &str) -> Result<Bytes, base64::DecodeError> {
    let cleaned: String = encoded
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    LENIENT.decode(cleaned).map(Bytes::from)
}

/// Estimated play time of a clip of `audio_len` bytes
#[must_use]
pub fn estimate_audio_duration(audio_len: usize) -> Duration {
    let bytes = u64::try_from(audio_len).unwrap_or(u64::MAX);
    Duration::from_millis(bytes.saturating_mul(1000) / ASSUMED_BYTES_PER_SECOND)
}

/// How long to spend revealing `text` alongside a clip of `audio_len` bytes
///
/// Uses the clip estimate, but never less than [`MIN_MS_PER_CHAR`] per character.
#[must_use]
pub fn reveal_duration(audio_len: usize, text: &str) -> Duration {
    let chars = u64::try_from(text.chars().count()).unwrap_or(u64::MAX);
    let floor = Duration::from_millis(chars.saturating_mul(MIN_MS_PER_CHAR));
    estimate_audio_duration(audio_len).max(floor)
}

/// Plays encoded audio clips
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play `audio` at `volume` (0.0-1.0), resolving when playback ends
    ///
    /// # Errors
    ///
    /// Returns an error if the clip cannot be decoded or played.
    async fn play(&self, audio: Bytes, volume: f32) -> anyhow::Result<()>;
}

/// Sink without an audio device: waits for the clip's estimated duration
#[derive(Clone, Copy, Debug, Default)]
pub struct PacedAudioSink;

#[async_trait]
impl AudioSink for PacedAudioSink {
    async fn play(&self, audio: Bytes, volume: f32) -> anyhow::Result<()> {
        let duration = estimate_audio_duration(audio.len());
        trace!(bytes = audio.len(), volume, ?duration, "pacing silent clip");
        tokio::time::sleep(duration).await;
        Ok(())
    }
}
