//! Context-aware machine translation gateway for Salin
//!
//! The pipeline hands every finalized utterance to a [`Translator`]
//! together with a snapshot of recent conversation history. Remote
//! backends fail closed: the caller always gets text back, never an
//! error it has to handle mid-loop.

pub mod gemini;
pub mod history;

pub use gemini::{GeminiConfig, GeminiTranslator};
pub use history::{ConversationWindow, DEFAULT_CONTEXT_DEPTH};

/// Translation interface used by the utterance pipeline.
pub trait Translator {
    /// Translate `text` into the configured target language, using
    /// `history` (oldest first) as conversational context.
    ///
    /// Never fails: empty or whitespace-only input short-circuits to an
    /// empty string without a remote call, and any remote error degrades
    /// to a clearly marked fallback string embedding the original text.
    /// An empty return for non-empty input means the backend judged the
    /// input untranslatable filler.
    fn translate(&self, text: &str, history: &[String]) -> String;
}
