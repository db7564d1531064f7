//! Vosk speech recognition implementation for Salin STT
//!
//! This crate provides the Vosk-specific implementation of the Salin STT
//! traits. The implementation is feature-gated behind the "vosk" feature
//! because it links against the native libvosk library.

#[cfg(feature = "vosk")]
pub mod vosk_recognizer;

#[cfg(feature = "vosk")]
pub use vosk_recognizer::VoskRecognizer;

// Re-export common types
pub use salin_stt::{
    RecognizerError, StreamingRecognizer, TranscriptionConfig, TranscriptionEvent,
};
