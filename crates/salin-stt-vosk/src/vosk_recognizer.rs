use salin_stt::{RecognizerError, StreamingRecognizer, TranscriptionConfig, TranscriptionEvent};
use tracing::{info, warn};
use vosk::{CompleteResult, DecodingState, Model, Recognizer};

/// Streaming recognizer backed by a local Vosk model.
///
/// Holds recognizer state across frames; Vosk performs its own
/// endpointing and reports a finalized segment through the decoding
/// state, at which point the accumulated utterance text is drained.
pub struct VoskRecognizer {
    recognizer: Recognizer,
    config: TranscriptionConfig,
}

impl VoskRecognizer {
    /// Create a new VoskRecognizer with the given configuration.
    ///
    /// `sample_rate` must match the rate of the PCM frames that will be
    /// fed to `accept_frame`.
    pub fn new(config: TranscriptionConfig, sample_rate: u32) -> Result<Self, RecognizerError> {
        // Vosk models are trained on 16 kHz audio; other rates work but
        // may degrade recognition quality.
        if sample_rate != 16_000 {
            warn!(
                sample_rate,
                "Sample rate differs from the 16000 Hz most Vosk models are trained on; \
                 transcription quality may suffer"
            );
        }

        let model_path = config.model_path.clone();
        if !std::path::Path::new(&model_path).exists() {
            return Err(RecognizerError::ModelNotFound { path: model_path });
        }

        let model = Model::new(&model_path).ok_or_else(|| RecognizerError::ModelLoad {
            path: model_path.clone(),
        })?;

        let mut recognizer = Recognizer::new(&model, sample_rate as f32)
            .ok_or(RecognizerError::RecognizerInit { sample_rate })?;
        recognizer.set_max_alternatives(config.max_alternatives as u16);

        info!(model = %model_path, sample_rate, "Vosk recognizer ready");

        Ok(Self { recognizer, config })
    }

    fn drain_final_text(&mut self) -> String {
        match self.recognizer.result() {
            CompleteResult::Single(single) => single.text.trim().to_string(),
            CompleteResult::Multiple(multiple) => multiple
                .alternatives
                .first()
                .map(|alt| alt.text.trim().to_string())
                .unwrap_or_default(),
        }
    }
}

impl StreamingRecognizer for VoskRecognizer {
    fn accept_frame(&mut self, pcm: &[i16]) -> Result<TranscriptionEvent, RecognizerError> {
        // Pass the i16 samples directly - vosk expects i16
        let state = self
            .recognizer
            .accept_waveform(pcm)
            .map_err(|e| RecognizerError::Decode(format!("waveform acceptance failed: {:?}", e)))?;

        match state {
            DecodingState::Finalized => Ok(TranscriptionEvent::Final {
                text: self.drain_final_text(),
            }),
            DecodingState::Running => {
                let text = if self.config.partial_results {
                    self.recognizer.partial_result().partial.trim().to_string()
                } else {
                    String::new()
                };
                Ok(TranscriptionEvent::Partial { text })
            }
            DecodingState::Failed => Err(RecognizerError::Decode(
                "recognition failed for current chunk".to_string(),
            )),
        }
    }
}
