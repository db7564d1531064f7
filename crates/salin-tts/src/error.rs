//! Error types for speech output

use thiserror::Error;

/// Speech synthesis and playback error types
#[derive(Error, Debug)]
pub enum TtsError {
    /// The synthesis service completed without producing audio data
    #[error("synthesis returned no audio")]
    NoAudio,

    /// Connectivity problem reaching or streaming from the synthesis service
    #[error("synthesis connection failed: {0}")]
    Connect(String),

    /// The service answered, but refused the request
    #[error("synthesis request rejected: {0}")]
    Rejected(String),

    /// Local playback error
    #[error("audio playback failed: {0}")]
    Playback(#[from] salin_foundation::AudioError),

    /// Shutdown fired while the operation was in flight
    #[error("cancelled during synthesis")]
    Cancelled,
}

impl TtsError {
    /// Transient failures get a single retry; everything else aborts the
    /// utterance immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, TtsError::NoAudio | TtsError::Connect(_))
    }
}

/// Result type for speech output operations
pub type TtsResult<T> = Result<T, TtsError>;
