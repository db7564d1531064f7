//! The recognition loop: pulls captured audio frames, feeds the
//! recognizer, and routes partial and final transcripts into captions,
//! translation, and speech output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use salin_audio::{AudioFrame, FrameReader};
use salin_foundation::{AppError, HealthCheck, SharedClock, ShutdownToken};
use salin_stt::{RecognizerError, StreamingRecognizer, TranscriptionEvent};
use salin_telemetry::PipelineMetrics;
use salin_translate::{ConversationWindow, Translator, DEFAULT_CONTEXT_DEPTH};
use salin_tts::SpeechOutput;

use crate::display::DisplayState;

/// Capture granularity: one recognizer call per block of this many samples.
pub const BLOCK_SAMPLES: usize = 8000;

/// How long a finished translation stays on screen when nothing newer
/// arrives.
pub const TRANSLATION_HOLD: Duration = Duration::from_millis(2500);

/// Poll granularity of the recognition loop. Cancellation latency during
/// silence is bounded by this interval.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Drives recognition events through captions, translation, and speech.
///
/// Owns the conversation history and is the only writer to the shared
/// display state. The translation call runs synchronously inside the
/// loop: at most one utterance is ever in flight, at the cost of
/// recognition stalling for the call's duration.
pub struct Coordinator {
    recognizer: Box<dyn StreamingRecognizer + Send>,
    translator: Arc<dyn Translator + Send + Sync>,
    speech: Arc<dyn SpeechOutput>,
    display: Arc<DisplayState>,
    history: ConversationWindow,
    clock: SharedClock,
    token: ShutdownToken,
    metrics: Arc<PipelineMetrics>,
}

impl Coordinator {
    pub fn new(
        recognizer: Box<dyn StreamingRecognizer + Send>,
        translator: Arc<dyn Translator + Send + Sync>,
        speech: Arc<dyn SpeechOutput>,
        display: Arc<DisplayState>,
        clock: SharedClock,
        token: ShutdownToken,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            recognizer,
            translator,
            speech,
            display,
            history: ConversationWindow::new(DEFAULT_CONTEXT_DEPTH),
            clock,
            token,
            metrics,
        }
    }

    /// Runs until the shutdown token fires or recognition fails.
    ///
    /// Frames are drained as fast as they arrive; when the ring is empty
    /// the loop parks on a bounded wait, so cancellation is observed
    /// within one poll interval even during silence.
    pub fn run(&mut self, frames: &mut FrameReader) -> Result<(), RecognizerError> {
        tracing::info!("Recognition loop started");
        loop {
            if self.token.is_cancelled() {
                break;
            }
            match frames.read_frame() {
                Some(frame) => self.process_frame(&frame)?,
                None => {
                    if self.token.wait_timeout(POLL_INTERVAL) {
                        break;
                    }
                }
            }
        }
        tracing::info!("Recognition loop stopped");
        Ok(())
    }

    fn process_frame(&mut self, frame: &AudioFrame) -> Result<(), RecognizerError> {
        let event = self.recognizer.accept_frame(&frame.samples)?;
        self.handle_event(event);
        Ok(())
    }

    fn handle_event(&mut self, event: TranscriptionEvent) {
        match event {
            TranscriptionEvent::Partial { text } => self.handle_partial(text),
            TranscriptionEvent::Final { text } => self.handle_final(text),
        }
    }

    fn handle_partial(&mut self, text: String) {
        self.metrics.increment_partial_events();
        self.display.set_source(text);
        if self.display.hold_expired(self.clock.now()) {
            self.display.clear_translation();
        }
    }

    fn handle_final(&mut self, text: String) {
        self.metrics.increment_final_events();

        let text = text.trim();
        if text.is_empty() {
            // A quiet cycle. Captions linger until the hold runs out.
            if self.display.hold_expired(self.clock.now()) {
                self.display.clear_captions();
            }
            return;
        }

        tracing::debug!(text, "Final utterance");
        self.display.set_source(text.to_string());

        // History is appended first so the snapshot handed to the
        // translator carries this utterance as its newest entry.
        self.history.push(text.to_string());
        let translated = self.translator.translate(text, &self.history.snapshot());

        if self.token.is_cancelled() {
            // Shutdown fired during the remote call; drop the result.
            return;
        }

        let hold_until = self.clock.now() + TRANSLATION_HOLD;
        self.display.set_translation(translated.clone(), hold_until);

        // Untranslatable filler comes back empty; nothing to say.
        if !translated.is_empty() {
            self.speech.speak_in_background(translated);
        }
    }
}

/// Liveness flags shared with health monitoring and the outer process.
#[derive(Clone)]
pub struct PipelineLiveness {
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
}

impl PipelineLiveness {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

impl HealthCheck for PipelineLiveness {
    fn check(&self) -> Result<(), String> {
        if self.has_failed() {
            Err("recognition loop died".to_string())
        } else if !self.is_running() {
            Err("recognition loop stopped".to_string())
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &str {
        "recognition-loop"
    }
}

/// Handle to the thread running the recognition loop.
pub struct PipelineThread {
    handle: JoinHandle<()>,
    liveness: PipelineLiveness,
}

impl PipelineThread {
    /// Spawns the coordinator on a dedicated thread. Recognition errors
    /// are fatal to the loop; the liveness flags report the death so the
    /// outer process can react.
    pub fn spawn(coordinator: Coordinator, frames: FrameReader) -> Result<Self, AppError> {
        let liveness = PipelineLiveness {
            running: Arc::new(AtomicBool::new(true)),
            failed: Arc::new(AtomicBool::new(false)),
        };
        let thread_liveness = liveness.clone();

        let handle = thread::Builder::new()
            .name("recognition-loop".to_string())
            .spawn(move || {
                let mut coordinator = coordinator;
                let mut frames = frames;
                if let Err(e) = coordinator.run(&mut frames) {
                    tracing::error!(error = %e, "Recognition loop died");
                    thread_liveness.failed.store(true, Ordering::SeqCst);
                }
                thread_liveness.running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| AppError::Fatal(format!("Failed to spawn recognition thread: {}", e)))?;

        Ok(Self { handle, liveness })
    }

    pub fn liveness(&self) -> PipelineLiveness {
        self.liveness.clone()
    }

    /// Waits for the loop to exit, bounded by `grace`. Returns false if
    /// the thread is still busy when the grace period ends.
    pub fn join_timeout(self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!("Recognition loop still busy after grace period; detaching");
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        let _ = self.handle.join();
        true
    }
}
