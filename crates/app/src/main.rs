use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use salin_app::config::AppConfig;
use salin_app::display::DisplayState;
use salin_app::pipeline::{Coordinator, PipelineThread, BLOCK_SAMPLES};
use salin_app::stt::build_recognizer;
use salin_app::tui::{run_tui, TuiContext};
use salin_audio::{AudioRingBuffer, CaptureThread, DeviceManager, FrameReader, PlaybackDevice};
use salin_foundation::{
    real_clock, AppState, HealthMonitor, ShutdownHandler, ShutdownToken, StateManager,
};
use salin_telemetry::PipelineMetrics;
use salin_translate::GeminiTranslator;
use salin_tts::{EdgeBackend, Speaker};

/// Bounded hand-off between the device callback and the recognition
/// loop. When a translation call stalls the loop, overflow is dropped
/// and counted rather than blocking the callback.
const RING_CAPACITY: usize = BLOCK_SAMPLES * 16;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn init_logging(cli_level: &str, headless: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "salin.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let effective_level = if !cli_level.is_empty() {
        cli_level.to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    };
    let env_filter =
        EnvFilter::try_new(&effective_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if headless {
        tracing_subscriber::fmt()
            .with_writer(std::io::stdout.and(non_blocking_file))
            .with_env_filter(env_filter)
            .init();
    } else {
        // File only; stdout writes would corrupt the TUI.
        tracing_subscriber::fmt()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .with_env_filter(env_filter)
            .init();
    }
    std::mem::forget(guard);
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    let manager = DeviceManager::new()?;
    let devices = manager.enumerate_devices()?;
    if devices.is_empty() {
        println!("No input devices found");
        return Ok(());
    }
    for device in devices {
        let marker = if device.is_default { "* " } else { "  " };
        match device.default_config {
            Some((rate, channels)) => {
                println!("{}{} ({} Hz, {} ch)", marker, device.name, rate, channels)
            }
            None => println!("{}{}", marker, device.name),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();

    if config.list_devices {
        return list_devices();
    }

    init_logging(&config.log_level, config.headless)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting salin");

    let state_manager = StateManager::new();
    let token = ShutdownHandler::new().install().await;
    let metrics = Arc::new(PipelineMetrics::default());

    if config.api_key.is_empty() {
        tracing::warn!(
            "GEMINI_API_KEY is not set; every translation will fall back to marked source text"
        );
    }

    // --- 1. Audio capture ---
    let ring_buffer = AudioRingBuffer::new(RING_CAPACITY);
    let (audio_producer, audio_consumer) = ring_buffer.split();
    let (capture, device_config) = CaptureThread::spawn(
        audio_producer,
        config.device.clone(),
        token.clone(),
        Arc::clone(&metrics),
    )?;

    // --- 2. Speech recognition ---
    let recognizer =
        match build_recognizer(config.transcription_config(), device_config.sample_rate) {
            Ok(r) => r,
            Err(e) => {
                capture.stop();
                return Err(e.into());
            }
        };

    // --- 3. Translation ---
    let translator = Arc::new(GeminiTranslator::new(
        config.gemini_config(),
        Arc::clone(&metrics),
    ));

    // --- 4. Speech output ---
    let speaker = Arc::new(Speaker::new(
        Arc::new(EdgeBackend::new(config.voice.clone())),
        Arc::new(PlaybackDevice::new()),
        token.clone(),
        Arc::clone(&metrics),
    ));

    // --- 5. Recognition loop ---
    let display = Arc::new(DisplayState::new());
    let frames = FrameReader::new(
        audio_consumer,
        device_config.sample_rate,
        device_config.channels,
        BLOCK_SAMPLES,
    );
    let coordinator = Coordinator::new(
        recognizer,
        translator,
        speaker,
        Arc::clone(&display),
        real_clock(),
        token.clone(),
        Arc::clone(&metrics),
    );
    let pipeline = match PipelineThread::spawn(coordinator, frames) {
        Ok(p) => p,
        Err(e) => {
            capture.stop();
            return Err(e.into());
        }
    };
    let liveness = pipeline.liveness();

    // --- 6. Health monitoring ---
    let health = HealthMonitor::new(Duration::from_secs(10));
    health.register(Box::new(liveness.clone()));
    let mut health = health.start();

    state_manager.transition(AppState::Running)?;

    // A dead recognition loop must take the process down with it, not
    // leave a frozen UI behind.
    let watcher = tokio::spawn({
        let liveness = liveness.clone();
        let token = token.clone();
        async move {
            let mut poll = tokio::time::interval(Duration::from_millis(500));
            loop {
                poll.tick().await;
                if token.is_cancelled() {
                    break;
                }
                if !liveness.is_running() {
                    tracing::error!("Recognition loop is no longer running; shutting down");
                    token.cancel();
                    break;
                }
            }
        }
    });

    let ui_result = if config.headless {
        run_headless(&token, &metrics).await;
        Ok(())
    } else {
        run_tui(TuiContext {
            display: Arc::clone(&display),
            metrics: Arc::clone(&metrics),
            token: token.clone(),
            device_label: config.device_label(),
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            voice: config.voice.clone(),
            started: Instant::now(),
        })
        .await
    };

    // --- Graceful shutdown ---
    tracing::info!("Beginning graceful shutdown");
    state_manager.transition(AppState::Stopping)?;
    token.cancel();
    watcher.abort();

    // 1. Stop the audio source; nothing new enters the ring.
    capture.stop();

    // 2. The recognition loop exits at its next poll point.
    pipeline.join_timeout(SHUTDOWN_GRACE);

    // 3. Speech threads unwind at their next checkpoint; they are not
    //    joined.
    health.stop();

    state_manager.transition(AppState::Stopped)?;
    tracing::info!("Shutdown complete");

    ui_result?;
    if liveness.has_failed() {
        anyhow::bail!("recognition loop died; see logs for the failure");
    }
    Ok(())
}

async fn run_headless(token: &ShutdownToken, metrics: &PipelineMetrics) {
    let mut stats_interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = token.wait() => break,
            _ = stats_interval.tick() => {
                tracing::info!(
                    callbacks = metrics.capture_frames.load(Ordering::Relaxed),
                    dropped_samples = metrics.capture_dropped_samples.load(Ordering::Relaxed),
                    partials = metrics.partial_events.load(Ordering::Relaxed),
                    finals = metrics.final_events.load(Ordering::Relaxed),
                    translations_ok = metrics.translations_ok.load(Ordering::Relaxed),
                    translations_failed = metrics.translations_failed.load(Ordering::Relaxed),
                    spoken = metrics.synth_played.load(Ordering::Relaxed),
                    "Pipeline running"
                );
            }
        }
    }
}
