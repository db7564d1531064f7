//! Recognizer construction. The Vosk backend links against the native
//! libvosk library, so it stays behind an opt-in feature; default builds
//! fail with a clear message instead of a link error.

use salin_foundation::AppError;
use salin_stt::{StreamingRecognizer, TranscriptionConfig};

#[cfg(feature = "vosk")]
pub fn build_recognizer(
    config: TranscriptionConfig,
    sample_rate: u32,
) -> Result<Box<dyn StreamingRecognizer + Send>, AppError> {
    use salin_stt::RecognizerError;
    use salin_stt_vosk::VoskRecognizer;

    let recognizer = VoskRecognizer::new(config, sample_rate).map_err(|e| match e {
        RecognizerError::ModelNotFound { .. } => AppError::Config(e.to_string()),
        other => AppError::Fatal(other.to_string()),
    })?;
    Ok(Box::new(recognizer))
}

#[cfg(not(feature = "vosk"))]
pub fn build_recognizer(
    _config: TranscriptionConfig,
    _sample_rate: u32,
) -> Result<Box<dyn StreamingRecognizer + Send>, AppError> {
    Err(AppError::Config(
        "this build has no speech recognition backend; rebuild with --features vosk".to_string(),
    ))
}
