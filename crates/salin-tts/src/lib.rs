//! Speech output for Salin
//!
//! Turns finalized translations into audible speech. A synthesis backend
//! fetches audio from Microsoft Edge's neural TTS service, the speaker
//! schedules attempts (one retry for transient failures, observing
//! shutdown at every wait point), and a playback sink drives the default
//! output device. Utterances are synthesized independently of each
//! other; overlapping playback is accepted rather than serialized.

pub mod decode;
pub mod edge;
pub mod error;
pub mod speaker;

pub use edge::EdgeBackend;
pub use error::{TtsError, TtsResult};
pub use speaker::{PlaybackSink, Speaker, SynthesisBackend};

/// Fire-and-forget speech interface used by the utterance pipeline.
pub trait SpeechOutput: Send + Sync {
    /// Queue `text` for synthesis and playback; returns immediately.
    /// Empty text and calls after shutdown are ignored.
    fn speak_in_background(&self, text: String);
}
