use std::sync::Arc;
use std::time::{Duration, Instant};

use salin_telemetry::PipelineMetrics;
use tracing::{debug, warn};

use crate::Translator;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Remote calls that take longer than this have long since stopped being
/// useful to a live conversation.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub source_language: String,
    pub target_language: String,
}

#[derive(Debug, thiserror::Error)]
enum RequestError {
    #[error("translation request failed: {0}")]
    Http(#[from] ureq::Error),
    #[error("translation response had no text content")]
    MalformedResponse,
}

/// Translation gateway backed by the Gemini generateContent API.
///
/// Holds no per-utterance state; conversation context arrives as an
/// explicit history snapshot on every call.
pub struct GeminiTranslator {
    agent: ureq::Agent,
    config: GeminiConfig,
    metrics: Arc<PipelineMetrics>,
}

impl GeminiTranslator {
    pub fn new(config: GeminiConfig, metrics: Arc<PipelineMetrics>) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        Self {
            agent: agent_config.into(),
            config,
            metrics,
        }
    }

    fn request(&self, prompt: &str) -> Result<String, RequestError> {
        let url = format!(
            "{}/{}:generateContent",
            GEMINI_API_BASE, self.config.model
        );
        let payload = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }]
        });

        let resp = self
            .agent
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .send_json(payload)?;

        let body: serde_json::Value = resp.into_body().read_json()?;
        let text = extract_text(&body).ok_or(RequestError::MalformedResponse)?;
        Ok(text.trim().to_string())
    }
}

impl Translator for GeminiTranslator {
    fn translate(&self, text: &str, history: &[String]) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        let prompt = build_prompt(
            &self.config.source_language,
            &self.config.target_language,
            text,
            history,
        );

        let started = Instant::now();
        match self.request(&prompt) {
            Ok(translated) => {
                self.metrics.record_translation(false, started.elapsed());
                debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    chars = translated.len(),
                    "Translation completed"
                );
                translated
            }
            Err(e) => {
                self.metrics.record_translation(true, started.elapsed());
                warn!(error = %e, "Translation failed; surfacing original text instead");
                format!("[translation error] {}", text)
            }
        }
    }
}

fn build_prompt(source: &str, target: &str, text: &str, history: &[String]) -> String {
    let formatted_history = history
        .iter()
        .map(|s| format!("- {}", s))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert, low-latency translation engine. Your task is to translate {source} to {target}.\n\n\
         **Core Directives:**\n\
         1.  **Translate Accurately:** Convey the full context, nuance, and intent, not just the literal words.\n\
         2.  **Use Context:** Leverage the 'Conversation History' to inform the translation of the 'New Text to Translate'.\n\
         3.  **Preserve Tone:** Match the formality and tone (e.g., casual, formal, slang) of the original {source} text.\n\n\
         **Rules for Handling Input:**\n\
         -   **Mixed-language input:** If the input contains English words, integrate them naturally into the {target} translation as a native speaker would.\n\
         -   **Non-{source}/Nonsense:** If the 'New Text to Translate' is not {source}, is unintelligible, or is just a filler sound (e.g., 'uhm', 'ehem'), return an empty string. Do not attempt to translate it.\n\n\
         **Strict Output Format:**\n\
         -   You MUST return ONLY the final {target} translation.\n\
         -   DO NOT add any extra words, explanations, labels, or quotation marks. The output must be clean text, ready for a text-to-speech engine.\n\n\
         --- CONTEXT & TASK ---\n\
         Conversation History ({source}):\n{formatted_history}\n\n\
         New Text to Translate ({source}):\n'{text}'\n\n\
         {target} Translation:"
    )
}

fn extract_text(body: &serde_json::Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;

    // Filter out thought parts and collect only content
    let text: String = parts
        .iter()
        .filter(|p| !p.get("thought").and_then(|t| t.as_bool()).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() && parts.is_empty() {
        return None;
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GeminiConfig {
        GeminiConfig {
            api_key: "test-key".to_string(),
            model: "gemini-1.5-flash-latest".to_string(),
            source_language: "Tagalog".to_string(),
            target_language: "Cebuano".to_string(),
        }
    }

    #[test]
    fn prompt_carries_languages_history_and_text() {
        let history = vec!["Magandang umaga".to_string(), "Salamat po".to_string()];
        let prompt = build_prompt("Tagalog", "Cebuano", "Kumusta ka?", &history);

        assert!(prompt.contains("translate Tagalog to Cebuano"));
        assert!(prompt.contains("- Magandang umaga\n- Salamat po"));
        assert!(prompt.contains("'Kumusta ka?'"));
        assert!(prompt.ends_with("Cebuano Translation:"));
    }

    #[test]
    fn prompt_tolerates_empty_history() {
        let prompt = build_prompt("Tagalog", "Cebuano", "Kumusta", &[]);
        assert!(prompt.contains("Conversation History (Tagalog):\n\n"));
        assert!(prompt.contains("'Kumusta'"));
    }

    #[test]
    fn extract_text_reads_first_candidate() {
        let body = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Maayong buntag" }] }
            }]
        });
        assert_eq!(extract_text(&body).as_deref(), Some("Maayong buntag"));
    }

    #[test]
    fn extract_text_skips_thought_parts() {
        let body = serde_json::json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "internal reasoning", "thought": true },
                    { "text": "Maayo" }
                ] }
            }]
        });
        assert_eq!(extract_text(&body).as_deref(), Some("Maayo"));
    }

    #[test]
    fn extract_text_rejects_bodies_without_candidates() {
        let body = serde_json::json!({ "error": { "code": 400 } });
        assert_eq!(extract_text(&body), None);
    }

    #[test]
    fn whitespace_input_short_circuits_without_remote_call() {
        let translator = GeminiTranslator::new(
            test_config(),
            Arc::new(PipelineMetrics::default()),
        );
        assert_eq!(translator.translate("   ", &[]), "");
        assert_eq!(
            translator
                .metrics
                .translations_ok
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
    }
}
