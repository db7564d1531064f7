use std::sync::atomic::{AtomicI16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared metrics for cross-thread pipeline monitoring
#[derive(Clone)]
pub struct PipelineMetrics {
    // Audio level monitoring
    pub current_peak: Arc<AtomicI16>, // Peak sample value in current window
    pub current_rms: Arc<AtomicU64>,  // RMS * 1000 for precision
    pub audio_level_db: Arc<AtomicI16>, // Current level in dB * 10

    // Capture
    pub capture_fps: Arc<AtomicU64>, // Frames per second * 10
    pub capture_frames: Arc<AtomicU64>,
    pub capture_dropped_samples: Arc<AtomicU64>,

    // Recognition events
    pub partial_events: Arc<AtomicU64>,
    pub final_events: Arc<AtomicU64>,

    // Translation
    pub translations_ok: Arc<AtomicU64>,
    pub translations_failed: Arc<AtomicU64>,
    pub translation_last_ms: Arc<AtomicU64>,

    // Speech synthesis
    pub synth_started: Arc<AtomicU64>,
    pub synth_retries: Arc<AtomicU64>,
    pub synth_failures: Arc<AtomicU64>,
    pub synth_played: Arc<AtomicU64>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            current_peak: Arc::new(AtomicI16::new(0)),
            current_rms: Arc::new(AtomicU64::new(0)),
            audio_level_db: Arc::new(AtomicI16::new(-900)),

            capture_fps: Arc::new(AtomicU64::new(0)),
            capture_frames: Arc::new(AtomicU64::new(0)),
            capture_dropped_samples: Arc::new(AtomicU64::new(0)),

            partial_events: Arc::new(AtomicU64::new(0)),
            final_events: Arc::new(AtomicU64::new(0)),

            translations_ok: Arc::new(AtomicU64::new(0)),
            translations_failed: Arc::new(AtomicU64::new(0)),
            translation_last_ms: Arc::new(AtomicU64::new(0)),

            synth_started: Arc::new(AtomicU64::new(0)),
            synth_retries: Arc::new(AtomicU64::new(0)),
            synth_failures: Arc::new(AtomicU64::new(0)),
            synth_played: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl PipelineMetrics {
    pub fn update_audio_level(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }

        let peak = samples.iter().map(|&s| s.abs()).max().unwrap_or(0);
        self.current_peak.store(peak, Ordering::Relaxed);

        let sum: i64 = samples.iter().map(|&s| s as i64 * s as i64).sum();
        let rms = ((sum as f64 / samples.len() as f64).sqrt() * 1000.0) as u64;
        self.current_rms.store(rms, Ordering::Relaxed);

        let db = if peak > 0 {
            (20.0 * (peak as f64 / 32768.0).log10() * 10.0) as i16
        } else {
            -900
        };
        self.audio_level_db.store(db, Ordering::Relaxed);
    }

    pub fn update_capture_fps(&self, fps: f64) {
        self.capture_fps.store((fps * 10.0) as u64, Ordering::Relaxed);
    }

    pub fn increment_capture_frames(&self) {
        self.capture_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_dropped_samples(&self, count: u64) {
        self.capture_dropped_samples
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_partial_events(&self) {
        self.partial_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_final_events(&self) {
        self.final_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_translation(&self, fallback_used: bool, elapsed: Duration) {
        if fallback_used {
            self.translations_failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.translations_ok.fetch_add(1, Ordering::Relaxed);
        }
        self.translation_last_ms
            .store(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn increment_synth_started(&self) {
        self.synth_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_synth_retries(&self) {
        self.synth_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_synth_failures(&self) {
        self.synth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_synth_played(&self) {
        self.synth_played.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct FpsTracker {
    last_update: Instant,
    frame_count: u64,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frame_count: 0,
        }
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.frame_count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed >= Duration::from_secs(1) {
            let fps = self.frame_count as f64 / elapsed.as_secs_f64();
            self.last_update = Instant::now();
            self.frame_count = 0;
            Some(fps)
        } else {
            None
        }
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_level_reflects_peak_and_silence() {
        let metrics = PipelineMetrics::default();
        metrics.update_audio_level(&[0, 100, -200, 50]);
        assert_eq!(metrics.current_peak.load(Ordering::Relaxed), 200);

        metrics.update_audio_level(&[0, 0, 0]);
        assert_eq!(metrics.audio_level_db.load(Ordering::Relaxed), -900);
    }

    #[test]
    fn translation_counters_split_by_outcome() {
        let metrics = PipelineMetrics::default();
        metrics.record_translation(false, Duration::from_millis(120));
        metrics.record_translation(true, Duration::from_millis(80));
        assert_eq!(metrics.translations_ok.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.translations_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.translation_last_ms.load(Ordering::Relaxed), 80);
    }
}
