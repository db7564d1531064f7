//! End-to-end checks for the recognition thread: frames written into the
//! capture ring come out as captions and speech, cancellation stops the
//! loop promptly, and a dead recognizer is visible through liveness.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use salin_app::display::DisplayState;
use salin_app::pipeline::{Coordinator, PipelineThread, POLL_INTERVAL};
use salin_audio::{AudioProducer, AudioRingBuffer, FrameReader};
use salin_foundation::{real_clock, ShutdownToken};
use salin_stt::{RecognizerError, StreamingRecognizer, TranscriptionEvent};
use salin_telemetry::PipelineMetrics;
use salin_translate::Translator;
use salin_tts::SpeechOutput;

const TEST_BLOCK: usize = 8;

/// Replays a fixed list of events, then reports empty partials forever.
struct ScriptedRecognizer {
    events: Vec<TranscriptionEvent>,
    next: usize,
}

impl ScriptedRecognizer {
    fn new(events: Vec<TranscriptionEvent>) -> Self {
        Self { events, next: 0 }
    }
}

impl StreamingRecognizer for ScriptedRecognizer {
    fn accept_frame(&mut self, _samples: &[i16]) -> Result<TranscriptionEvent, RecognizerError> {
        let event = self
            .events
            .get(self.next)
            .cloned()
            .unwrap_or(TranscriptionEvent::Partial { text: String::new() });
        self.next += 1;
        Ok(event)
    }
}

struct FailingRecognizer;

impl StreamingRecognizer for FailingRecognizer {
    fn accept_frame(&mut self, _samples: &[i16]) -> Result<TranscriptionEvent, RecognizerError> {
        Err(RecognizerError::Decode("decoder poisoned".to_string()))
    }
}

struct FixedTranslator {
    reply: String,
}

impl Translator for FixedTranslator {
    fn translate(&self, _text: &str, _history: &[String]) -> String {
        self.reply.clone()
    }
}

#[derive(Default)]
struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
}

impl SpeechOutput for RecordingSpeech {
    fn speak_in_background(&self, text: String) {
        self.spoken.lock().push(text);
    }
}

fn start(
    recognizer: Box<dyn StreamingRecognizer + Send>,
    reply: &str,
    token: &ShutdownToken,
) -> (
    PipelineThread,
    AudioProducer,
    Arc<DisplayState>,
    Arc<RecordingSpeech>,
) {
    let (producer, consumer) = AudioRingBuffer::new(256).split();
    let frames = FrameReader::new(consumer, 16_000, 1, TEST_BLOCK);

    let display = Arc::new(DisplayState::new());
    let speech = Arc::new(RecordingSpeech::default());
    let coordinator = Coordinator::new(
        recognizer,
        Arc::new(FixedTranslator {
            reply: reply.to_string(),
        }),
        speech.clone(),
        display.clone(),
        real_clock(),
        token.clone(),
        Arc::new(PipelineMetrics::default()),
    );
    let pipeline = PipelineThread::spawn(coordinator, frames).expect("pipeline thread");
    (pipeline, producer, display, speech)
}

#[test]
fn cancellation_stops_the_loop_within_one_poll_interval() {
    let token = ShutdownToken::new();
    let (pipeline, _producer, _display, _speech) =
        start(Box::new(ScriptedRecognizer::new(Vec::new())), "", &token);

    // Give the thread time to settle into its idle poll.
    std::thread::sleep(Duration::from_millis(50));
    let cancelled_at = Instant::now();
    token.cancel();

    assert!(pipeline.join_timeout(POLL_INTERVAL + Duration::from_millis(900)));
    assert!(cancelled_at.elapsed() < POLL_INTERVAL + Duration::from_millis(900));
}

#[test]
fn finalized_utterance_reaches_display_and_speech() {
    let token = ShutdownToken::new();
    let recognizer = ScriptedRecognizer::new(vec![TranscriptionEvent::Final {
        text: "Kumusta ka?".to_string(),
    }]);
    let (pipeline, mut producer, display, speech) =
        start(Box::new(recognizer), "Maayong adlaw", &token);

    assert_eq!(producer.write(&[0i16; TEST_BLOCK]), TEST_BLOCK);

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let snap = display.snapshot();
        if snap.translated == "Maayong adlaw" {
            assert_eq!(snap.source, "Kumusta ka?");
            break;
        }
        assert!(
            Instant::now() < deadline,
            "translation never reached the display"
        );
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(*speech.spoken.lock(), vec!["Maayong adlaw"]);

    token.cancel();
    assert!(pipeline.join_timeout(Duration::from_secs(2)));
}

#[test]
fn recognizer_failure_is_reported_through_liveness() {
    let token = ShutdownToken::new();
    let (pipeline, mut producer, _display, _speech) =
        start(Box::new(FailingRecognizer), "", &token);
    let liveness = pipeline.liveness();
    assert!(liveness.is_running());

    producer.write(&[0i16; TEST_BLOCK]);

    let deadline = Instant::now() + Duration::from_secs(2);
    while liveness.is_running() {
        assert!(
            Instant::now() < deadline,
            "loop did not stop on recognizer failure"
        );
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(liveness.has_failed());
    assert!(pipeline.join_timeout(Duration::from_secs(1)));
}
