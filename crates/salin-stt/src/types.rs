//! Core types for speech-to-text functionality

/// Transcription event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionEvent {
    /// Provisional transcription of ongoing speech. Each partial replaces
    /// the previous one for the same utterance; text may be empty during
    /// silence.
    Partial { text: String },
    /// Committed transcription of a completed utterance. Empty text means
    /// the segment contained no recognizable speech.
    Final { text: String },
}

impl TranscriptionEvent {
    pub fn text(&self) -> &str {
        match self {
            TranscriptionEvent::Partial { text } | TranscriptionEvent::Final { text } => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, TranscriptionEvent::Final { .. })
    }
}

/// Transcription configuration
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Path to the model directory
    pub model_path: String,
    /// Emit partial recognition results while an utterance is in progress
    pub partial_results: bool,
    /// Maximum alternatives in results
    pub max_alternatives: u32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        // Try to get model path from environment, falling back to default
        let model_path = std::env::var("VOSK_MODEL_PATH")
            .unwrap_or_else(|_| "vosk-model-tl-ph-generic-0.6".to_string());

        Self {
            model_path,
            partial_results: true,
            max_alternatives: 1,
        }
    }
}

/// Errors surfaced by a recognition backend.
///
/// Recognition has no fallback path: callers should treat any of these as
/// fatal to the audio pipeline rather than retrying.
#[derive(Debug, thiserror::Error)]
pub enum RecognizerError {
    #[error("recognition model not found at '{path}'")]
    ModelNotFound { path: String },
    #[error("failed to load recognition model from '{path}'")]
    ModelLoad { path: String },
    #[error("failed to create recognizer for {sample_rate} Hz audio")]
    RecognizerInit { sample_rate: u32 },
    #[error("recognizer rejected audio frame: {0}")]
    Decode(String),
}
