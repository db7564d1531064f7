use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::device::DeviceManager;
use crate::ring_buffer::AudioProducer;
use crate::watchdog::WatchdogTimer;
use salin_foundation::{AudioError, ShutdownToken};
use salin_telemetry::{FpsTracker, PipelineMetrics};

/// One fixed-size block of mono PCM handed to the recognizer.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub timestamp: Instant,
    pub sample_rate: u32,
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Handle to the dedicated capture thread.
///
/// Spawning opens the device and reports its configuration before
/// returning, so a missing or broken device surfaces as a startup error
/// rather than a silent dead stream.
pub struct CaptureThread {
    handle: JoinHandle<()>,
    token: ShutdownToken,
}

impl CaptureThread {
    pub fn spawn(
        audio_producer: AudioProducer,
        device_name: Option<String>,
        token: ShutdownToken,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<(Self, DeviceConfig), AudioError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<DeviceConfig, AudioError>>(1);
        let thread_token = token.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let mut capture =
                    match AudioCapture::new(audio_producer, thread_token.clone(), metrics) {
                        Ok(c) => c,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                let initial = match capture.start(device_name.as_deref()) {
                    Ok(cfg) => cfg,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                tracing::info!(
                    sample_rate = initial.sample_rate,
                    channels = initial.channels,
                    "Audio stream started"
                );
                let _ = ready_tx.send(Ok(initial.clone()));

                // Monitor for watchdog or error-triggered restarts
                while !thread_token.wait_timeout(Duration::from_millis(100)) {
                    if capture.watchdog.is_triggered()
                        || capture.restart_needed.load(Ordering::SeqCst)
                    {
                        tracing::warn!("Capture restart triggered (watchdog or stream error)");
                        capture.stop_stream();
                        capture.restart_needed.store(false, Ordering::SeqCst);

                        match capture.start(device_name.as_deref()) {
                            Ok(cfg) => {
                                if cfg.sample_rate != initial.sample_rate {
                                    tracing::warn!(
                                        old = initial.sample_rate,
                                        new = cfg.sample_rate,
                                        "Device sample rate changed across restart; recognition quality may degrade"
                                    );
                                }
                                tracing::info!("Capture restarted");
                            }
                            Err(e) => {
                                tracing::error!("Failed to restart capture: {}", e);
                                // Back off, then let the loop try again
                                if thread_token.wait_timeout(Duration::from_secs(1)) {
                                    break;
                                }
                                capture.restart_needed.store(true, Ordering::SeqCst);
                            }
                        }
                    }
                }

                tracing::info!("Audio capture thread shutting down");
                capture.stop_stream();
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn audio thread: {}", e)))?;

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(cfg)) => Ok((Self { handle, token }, cfg)),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(AudioError::Fatal(
                "Capture thread did not report device configuration within timeout".to_string(),
            )),
        }
    }

    /// Cancels the shared token (idempotent) and joins the thread.
    pub fn stop(self) {
        self.token.cancel();
        let _ = self.handle.join();
    }
}

struct AudioCapture {
    device_manager: DeviceManager,
    stream: Option<Stream>,
    audio_producer: Arc<Mutex<AudioProducer>>,
    watchdog: WatchdogTimer,
    token: ShutdownToken,
    metrics: Arc<PipelineMetrics>,
    restart_needed: Arc<AtomicBool>,
}

impl AudioCapture {
    fn new(
        audio_producer: AudioProducer,
        token: ShutdownToken,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<Self, AudioError> {
        Ok(Self {
            device_manager: DeviceManager::new()?,
            stream: None,
            audio_producer: Arc::new(Mutex::new(audio_producer)),
            watchdog: WatchdogTimer::new(Duration::from_secs(5)),
            token,
            metrics,
            restart_needed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn start(&mut self, device_name: Option<&str>) -> Result<DeviceConfig, AudioError> {
        let device = self.device_manager.open_device(device_name)?;
        if let Ok(n) = device.name() {
            tracing::info!(
                "Selected input device: {} (host: {:?})",
                n,
                self.device_manager.host_id()
            );
        }
        let (config, sample_format) = self.negotiate_config(&device)?;

        let device_config = DeviceConfig {
            sample_rate: config.sample_rate,
            channels: config.channels,
        };

        let stream = self.build_stream(device, config, sample_format)?;
        stream.play()?;

        self.stream = Some(stream);
        self.watchdog.start(self.token.clone());
        Ok(device_config)
    }

    fn build_stream(
        &mut self,
        device: cpal::Device,
        config: StreamConfig,
        sample_format: SampleFormat,
    ) -> Result<Stream, AudioError> {
        let audio_producer = Arc::clone(&self.audio_producer);
        let metrics = Arc::clone(&self.metrics);
        let watchdog = self.watchdog.clone();
        let token = self.token.clone();
        let restart_needed = Arc::clone(&self.restart_needed);
        let mut fps_tracker = FpsTracker::new();

        let err_fn = move |err: cpal::StreamError| {
            tracing::error!("Audio stream error: {}", err);
            restart_needed.store(true, Ordering::SeqCst);
        };

        // Common handler after converting to i16. Enqueue attempts after
        // cancellation are dropped so the callback never stalls the driver.
        let mut handle_i16 = move |i16_data: &[i16]| {
            if token.is_cancelled() {
                return;
            }
            watchdog.feed();
            metrics.update_audio_level(i16_data);

            let written = audio_producer.lock().write(i16_data);
            if written < i16_data.len() {
                metrics.add_dropped_samples((i16_data.len() - written) as u64);
            }
            metrics.increment_capture_frames();
            if let Some(fps) = fps_tracker.tick() {
                metrics.update_capture_fps(fps);
            }
        };

        // Build the CPAL input stream with proper conversion to i16.
        // Thread-local buffer avoids allocations in the audio callback.
        thread_local! {
            static CONVERT_BUFFER: std::cell::RefCell<Vec<i16>> = const { std::cell::RefCell::new(Vec::new()) };
        }

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &_| {
                    handle_i16(data);
                },
                err_fn,
                None,
            )?,
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &_| {
                    CONVERT_BUFFER.with(|buf| {
                        let mut converted = buf.borrow_mut();
                        converted.clear();
                        converted.reserve(data.len());
                        // Clamp [-1.0, 1.0] and scale to i16
                        for &s in data {
                            let clamped = s.clamp(-1.0, 1.0);
                            converted.push((clamped * 32767.0).round() as i16);
                        }
                        handle_i16(&converted);
                    });
                },
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _: &_| {
                    CONVERT_BUFFER.with(|buf| {
                        let mut converted = buf.borrow_mut();
                        converted.clear();
                        converted.reserve(data.len());
                        // Convert unsigned [0,65535] to signed [-32768,32767]
                        for &s in data {
                            converted.push((s as i32 - 32768) as i16);
                        }
                        handle_i16(&converted);
                    });
                },
                err_fn,
                None,
            )?,
            SampleFormat::U32 => device.build_input_stream(
                &config,
                move |data: &[u32], _: &_| {
                    CONVERT_BUFFER.with(|buf| {
                        let mut converted = buf.borrow_mut();
                        converted.clear();
                        converted.reserve(data.len());
                        // Map 0..=u32::MAX to i16 range via center-offset and shift
                        for &s in data {
                            let centered = s as i64 - 2_147_483_648i64;
                            converted.push((centered >> 16) as i16);
                        }
                        handle_i16(&converted);
                    });
                },
                err_fn,
                None,
            )?,
            SampleFormat::F64 => device.build_input_stream(
                &config,
                move |data: &[f64], _: &_| {
                    CONVERT_BUFFER.with(|buf| {
                        let mut converted = buf.borrow_mut();
                        converted.clear();
                        converted.reserve(data.len());
                        for &s in data {
                            let clamped = s.clamp(-1.0, 1.0);
                            converted.push((clamped * 32767.0).round() as i16);
                        }
                        handle_i16(&converted);
                    });
                },
                err_fn,
                None,
            )?,
            other => {
                return Err(AudioError::FormatNotSupported {
                    format: format!("{:?}", other),
                });
            }
        };

        Ok(stream)
    }

    fn negotiate_config(
        &self,
        device: &cpal::Device,
    ) -> Result<(StreamConfig, SampleFormat), AudioError> {
        // Prefer the device default; the recognizer runs at whatever rate
        // the device reports.
        if let Ok(default_config) = device.default_input_config() {
            return Ok((
                StreamConfig {
                    channels: default_config.channels(),
                    sample_rate: default_config.sample_rate(),
                    buffer_size: cpal::BufferSize::Default,
                },
                default_config.sample_format(),
            ));
        }

        // Fallback to first available config
        if let Ok(configs) = device.supported_input_configs() {
            if let Some(config) = configs.into_iter().next() {
                return Ok((config.with_max_sample_rate().into(), config.sample_format()));
            }
        }

        Err(AudioError::FormatNotSupported {
            format: "No supported audio formats".to_string(),
        })
    }

    fn stop_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
        self.watchdog.stop();
    }
}

#[cfg(test)]
mod convert_tests {
    // unit tests for sample format conversions

    #[test]
    fn f32_to_i16_basic() {
        let src = [-1.0f32, -0.5, 0.0, 0.5, 1.0];
        let expected = [-32767i16, -16384, 0, 16384, 32767];
        let out: Vec<i16> = src
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
            .collect();
        assert_eq!(&out[..], &expected);
    }

    #[test]
    fn u16_to_i16_centering() {
        let src = [0u16, 32768, 65535];
        let expected = [-32768i16, 0, 32767];
        let out: Vec<i16> = src.iter().map(|&s| (s as i32 - 32768) as i16).collect();
        assert_eq!(&out[..], &expected);
    }

    #[test]
    fn u32_to_i16_scaling() {
        let src = [0u32, 2_147_483_648u32, 4_294_967_295u32];
        let out: Vec<i16> = src
            .iter()
            .map(|&s| ((s as i64 - 2_147_483_648i64) >> 16) as i16)
            .collect();
        assert_eq!(out[1], 0);
        assert!(out[0] < 0 && out[2] > 0);
    }
}
