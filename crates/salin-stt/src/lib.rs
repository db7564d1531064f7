//! Speech-to-text abstraction layer for Salin
//!
//! This crate provides the core abstractions for streaming speech
//! recognition: transcription events, configuration, and the
//! `StreamingRecognizer` trait that engine-specific crates implement.

pub mod types;

pub use types::{RecognizerError, TranscriptionConfig, TranscriptionEvent};

/// Streaming transcription interface
///
/// Implementations maintain acoustic state across calls and decide on
/// their own when an utterance boundary has been reached, so every
/// accepted frame yields exactly one event: a `Partial` while speech is
/// in progress (or silence continues) and a `Final` once a segment
/// completes. Callers must drive a recognizer from a single thread to
/// preserve event ordering.
pub trait StreamingRecognizer {
    /// Feed one block of mono S16LE PCM samples at the rate the
    /// recognizer was constructed with.
    fn accept_frame(&mut self, pcm: &[i16]) -> Result<TranscriptionEvent, RecognizerError>;
}
