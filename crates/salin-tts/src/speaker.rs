//! Per-utterance synthesis scheduling: retry policy, cancellation
//! checkpoints, and the fire-and-forget thread each utterance runs on.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use salin_audio::{PcmAudio, PlaybackDevice};
use salin_foundation::ShutdownToken;
use salin_telemetry::PipelineMetrics;
use tracing::{error, warn};

use crate::error::{TtsError, TtsResult};
use crate::SpeechOutput;

/// Two attempts total: the original call plus one retry.
const MAX_ATTEMPTS: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Fetches synthesized audio for one utterance.
pub trait SynthesisBackend: Send + Sync {
    /// Synthesize `text` to PCM. Implementations check `token` between
    /// network chunks and return `TtsError::Cancelled` when shutdown
    /// fires mid-fetch.
    fn synthesize(&self, text: &str, token: &ShutdownToken) -> TtsResult<PcmAudio>;
}

/// Plays decoded audio on an output device.
pub trait PlaybackSink: Send + Sync {
    /// Play `audio` to completion. The token is consulted before playback
    /// starts; audio that has started is not preempted.
    fn play(&self, audio: &PcmAudio, token: &ShutdownToken) -> TtsResult<()>;
}

impl PlaybackSink for PlaybackDevice {
    fn play(&self, audio: &PcmAudio, token: &ShutdownToken) -> TtsResult<()> {
        PlaybackDevice::play(self, audio, token).map_err(TtsError::from)
    }
}

/// Turns text into audible speech without blocking the caller.
///
/// Every utterance gets its own short-lived thread; utterances are
/// independent of each other, so a slow synthesis call never delays the
/// next one (overlapping playback is the accepted trade-off).
pub struct Speaker {
    backend: Arc<dyn SynthesisBackend>,
    sink: Arc<dyn PlaybackSink>,
    token: ShutdownToken,
    metrics: Arc<PipelineMetrics>,
}

impl Speaker {
    pub fn new(
        backend: Arc<dyn SynthesisBackend>,
        sink: Arc<dyn PlaybackSink>,
        token: ShutdownToken,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            backend,
            sink,
            token,
            metrics,
        }
    }
}

impl SpeechOutput for Speaker {
    fn speak_in_background(&self, text: String) {
        if text.trim().is_empty() || self.token.is_cancelled() {
            return;
        }

        let backend = Arc::clone(&self.backend);
        let sink = Arc::clone(&self.sink);
        let token = self.token.clone();
        let metrics = Arc::clone(&self.metrics);

        let spawned = thread::Builder::new().name("tts-speak".into()).spawn(move || {
            run_attempts(
                backend.as_ref(),
                sink.as_ref(),
                &token,
                &metrics,
                &text,
                RETRY_DELAY,
            );
        });
        if let Err(e) = spawned {
            error!(error = %e, "Failed to spawn speech output thread");
        }
    }
}

fn run_attempts(
    backend: &dyn SynthesisBackend,
    sink: &dyn PlaybackSink,
    token: &ShutdownToken,
    metrics: &PipelineMetrics,
    text: &str,
    retry_delay: Duration,
) {
    metrics.increment_synth_started();

    for attempt in 1..=MAX_ATTEMPTS {
        if token.is_cancelled() {
            return;
        }

        match backend.synthesize(text, token) {
            Ok(audio) => {
                if token.is_cancelled() {
                    return;
                }
                match sink.play(&audio, token) {
                    Ok(()) => metrics.increment_synth_played(),
                    Err(e) => {
                        metrics.increment_synth_failures();
                        error!(error = %e, "Speech playback failed");
                    }
                }
                return;
            }
            Err(TtsError::Cancelled) => return,
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                metrics.increment_synth_retries();
                warn!(error = %e, attempt, "Transient synthesis failure; retrying once");
                // The delay itself must stay responsive to shutdown.
                if token.wait_timeout(retry_delay) {
                    return;
                }
            }
            Err(e) => {
                metrics.increment_synth_failures();
                if e.is_transient() {
                    warn!(error = %e, "Synthesis failed after retry; giving up on this utterance");
                } else {
                    error!(error = %e, "Synthesis failed; not retrying");
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedBackend {
        responses: Mutex<VecDeque<TtsResult<PcmAudio>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<TtsResult<PcmAudio>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SynthesisBackend for ScriptedBackend {
        fn synthesize(&self, _text: &str, _token: &ShutdownToken) -> TtsResult<PcmAudio> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TtsError::NoAudio))
        }
    }

    /// Backend that flips the shutdown token while "fetching".
    struct CancellingBackend {
        token: ShutdownToken,
    }

    impl SynthesisBackend for CancellingBackend {
        fn synthesize(&self, _text: &str, _token: &ShutdownToken) -> TtsResult<PcmAudio> {
            self.token.cancel();
            Ok(sample_audio())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        plays: AtomicUsize,
    }

    impl PlaybackSink for RecordingSink {
        fn play(&self, _audio: &PcmAudio, _token: &ShutdownToken) -> TtsResult<()> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_audio() -> PcmAudio {
        PcmAudio {
            samples: vec![0; 240],
            sample_rate: 24_000,
        }
    }

    const FAST_RETRY: Duration = Duration::from_millis(5);

    #[test]
    fn no_audio_retries_exactly_once_then_gives_up() {
        let backend =
            ScriptedBackend::new(vec![Err(TtsError::NoAudio), Err(TtsError::NoAudio)]);
        let sink = RecordingSink::default();
        let token = ShutdownToken::new();
        let metrics = PipelineMetrics::default();

        run_attempts(&backend, &sink, &token, &metrics, "kumusta", FAST_RETRY);

        assert_eq!(backend.calls(), 2);
        assert_eq!(sink.plays.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.synth_retries.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.synth_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn second_attempt_success_still_plays() {
        let backend = ScriptedBackend::new(vec![
            Err(TtsError::Connect("connection reset".to_string())),
            Ok(sample_audio()),
        ]);
        let sink = RecordingSink::default();
        let token = ShutdownToken::new();
        let metrics = PipelineMetrics::default();

        run_attempts(&backend, &sink, &token, &metrics, "kumusta", FAST_RETRY);

        assert_eq!(backend.calls(), 2);
        assert_eq!(sink.plays.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.synth_played.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn rejected_request_aborts_without_retry() {
        let backend = ScriptedBackend::new(vec![Err(TtsError::Rejected(
            "handshake returned HTTP 403".to_string(),
        ))]);
        let sink = RecordingSink::default();
        let token = ShutdownToken::new();
        let metrics = PipelineMetrics::default();

        run_attempts(&backend, &sink, &token, &metrics, "kumusta", FAST_RETRY);

        assert_eq!(backend.calls(), 1);
        assert_eq!(sink.plays.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.synth_retries.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn cancellation_during_retry_delay_stops_the_attempt() {
        let backend =
            ScriptedBackend::new(vec![Err(TtsError::NoAudio), Ok(sample_audio())]);
        let sink = RecordingSink::default();
        let token = ShutdownToken::new();
        let metrics = PipelineMetrics::default();

        let canceller = {
            let token = token.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                token.cancel();
            })
        };

        run_attempts(
            &backend,
            &sink,
            &token,
            &metrics,
            "kumusta",
            Duration::from_secs(10),
        );
        canceller.join().unwrap();

        assert_eq!(backend.calls(), 1);
        assert_eq!(sink.plays.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pre_cancelled_token_skips_synthesis_entirely() {
        let backend = ScriptedBackend::new(vec![Ok(sample_audio())]);
        let sink = RecordingSink::default();
        let token = ShutdownToken::new();
        token.cancel();
        let metrics = PipelineMetrics::default();

        run_attempts(&backend, &sink, &token, &metrics, "kumusta", FAST_RETRY);

        assert_eq!(backend.calls(), 0);
        assert_eq!(sink.plays.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancellation_after_fetch_skips_playback() {
        let token = ShutdownToken::new();
        let backend = CancellingBackend {
            token: token.clone(),
        };
        let sink = RecordingSink::default();
        let metrics = PipelineMetrics::default();

        run_attempts(&backend, &sink, &token, &metrics, "kumusta", FAST_RETRY);

        assert_eq!(sink.plays.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn speaker_ignores_empty_text() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(sample_audio())]));
        let speaker = Speaker::new(
            backend.clone(),
            Arc::new(RecordingSink::default()),
            ShutdownToken::new(),
            Arc::new(PipelineMetrics::default()),
        );

        speaker.speak_in_background("   ".to_string());

        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn speaker_plays_in_the_background() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(sample_audio())]));
        let sink = Arc::new(RecordingSink::default());
        let speaker = Speaker::new(
            backend,
            sink.clone(),
            ShutdownToken::new(),
            Arc::new(PipelineMetrics::default()),
        );

        speaker.speak_in_background("kumusta".to_string());

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while sink.plays.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(sink.plays.load(Ordering::SeqCst), 1);
    }
}
