use clap::Parser;
use salin_stt::TranscriptionConfig;
use salin_translate::GeminiConfig;

/// Live speech interpreter: recognizes microphone speech, translates it,
/// and speaks the translation aloud.
#[derive(Parser, Debug, Clone)]
#[command(name = "salin", version, about)]
pub struct AppConfig {
    /// Input device name. Defaults to the system default input device.
    #[arg(short = 'D', long)]
    pub device: Option<String>,

    /// List available input devices and exit.
    #[arg(long)]
    pub list_devices: bool,

    /// Path to the Vosk model directory.
    #[arg(
        long,
        env = "VOSK_MODEL_PATH",
        default_value = "vosk-model-tl-ph-generic-0.6"
    )]
    pub model_path: String,

    /// Language spoken into the microphone.
    #[arg(long, default_value = "Tagalog")]
    pub source_language: String,

    /// Language the translation is rendered and spoken in.
    #[arg(long, default_value = "Cebuano")]
    pub target_language: String,

    /// Gemini model used for translation.
    #[arg(long, default_value = "gemini-1.5-flash-latest")]
    pub gemini_model: String,

    /// Gemini API key. Without one every translation falls back to the
    /// marked source text.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    /// Edge TTS voice used for spoken output.
    #[arg(long, default_value = "fil-PH-BlessicaNeural")]
    pub voice: String,

    /// Run without the terminal UI, logging status lines instead.
    #[arg(long)]
    pub headless: bool,

    /// Log level filter (overrides RUST_LOG).
    #[arg(long, default_value = "")]
    pub log_level: String,
}

impl AppConfig {
    pub fn transcription_config(&self) -> TranscriptionConfig {
        TranscriptionConfig {
            model_path: self.model_path.clone(),
            ..Default::default()
        }
    }

    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.api_key.clone(),
            model: self.gemini_model.clone(),
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
        }
    }

    pub fn device_label(&self) -> String {
        self.device.clone().unwrap_or_else(|| "default".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_the_original_deployment() {
        let config = AppConfig::parse_from(["salin"]);
        assert_eq!(config.source_language, "Tagalog");
        assert_eq!(config.target_language, "Cebuano");
        assert_eq!(config.voice, "fil-PH-BlessicaNeural");
        assert_eq!(config.gemini_model, "gemini-1.5-flash-latest");
        assert!(!config.headless);
        assert!(!config.list_devices);
    }

    #[test]
    fn language_pair_is_overridable() {
        let config = AppConfig::parse_from([
            "salin",
            "--source-language",
            "Cebuano",
            "--target-language",
            "English",
            "--voice",
            "en-US-AriaNeural",
        ]);
        assert_eq!(config.gemini_config().source_language, "Cebuano");
        assert_eq!(config.gemini_config().target_language, "English");
        assert_eq!(config.voice, "en-US-AriaNeural");
    }
}
