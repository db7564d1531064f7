use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use salin_foundation::{AudioError, ShutdownToken};

/// Decoded mono PCM ready for the output device.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl PcmAudio {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Blocking playback on the default output device.
///
/// Each call opens the device fresh, so an unplugged headset only costs
/// the one utterance it interrupted. Once the stream starts, playback
/// runs to completion; the token is only consulted before starting.
pub struct PlaybackDevice;

impl Default for PlaybackDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackDevice {
    pub fn new() -> Self {
        Self
    }

    pub fn play(&self, audio: &PcmAudio, token: &ShutdownToken) -> Result<(), AudioError> {
        if audio.samples.is_empty() || token.is_cancelled() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let default_config = device.default_output_config()?;
        let channels = default_config.channels().max(1);
        let device_rate = default_config.sample_rate();
        let sample_format = default_config.sample_format();

        let resampled = resample_linear(&audio.samples, audio.sample_rate, device_rate);
        let expected = Duration::from_secs_f64(resampled.len() as f64 / device_rate as f64);

        let queue: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(resampled.into()));
        let done = Arc::new((Mutex::new(false), Condvar::new()));

        let config = cpal::StreamConfig {
            channels,
            sample_rate: device_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err: cpal::StreamError| {
            tracing::warn!("Playback stream error: {}", err);
        };

        let stream = match sample_format {
            SampleFormat::F32 => {
                let queue = Arc::clone(&queue);
                let done = Arc::clone(&done);
                device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut buf = queue.lock();
                        for frame in data.chunks_mut(channels as usize) {
                            let sample = buf.pop_front().unwrap_or(0) as f32 / 32768.0;
                            for out in frame.iter_mut() {
                                *out = sample;
                            }
                        }
                        if buf.is_empty() {
                            signal_done(&done);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::I16 => {
                let queue = Arc::clone(&queue);
                let done = Arc::clone(&done);
                device.build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        let mut buf = queue.lock();
                        for frame in data.chunks_mut(channels as usize) {
                            let sample = buf.pop_front().unwrap_or(0);
                            for out in frame.iter_mut() {
                                *out = sample;
                            }
                        }
                        if buf.is_empty() {
                            signal_done(&done);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            other => {
                return Err(AudioError::FormatNotSupported {
                    format: format!("{:?}", other),
                });
            }
        };

        stream.play()?;

        // Wait until the callback has drained the queue. Capped well past
        // the audio duration so a wedged device cannot hang the thread.
        let timeout_at = std::time::Instant::now() + expected + Duration::from_secs(2);
        let (lock, cvar) = &*done;
        {
            let mut finished = lock.lock();
            while !*finished {
                let now = std::time::Instant::now();
                if now >= timeout_at {
                    tracing::warn!("Playback did not drain before timeout; dropping stream");
                    break;
                }
                cvar.wait_for(&mut finished, timeout_at - now);
            }
        }
        // Let the device flush its final buffer before dropping the stream.
        std::thread::sleep(Duration::from_millis(200));
        drop(stream);
        Ok(())
    }
}

fn signal_done(done: &(Mutex<bool>, Condvar)) {
    let (lock, cvar) = done;
    let mut finished = lock.lock();
    if !*finished {
        *finished = true;
        cvar.notify_all();
    }
}

/// Linear interpolation resampler for the playback path. Synthesis output
/// is speech-band audio; linear quality is fine for it.
pub fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f64;

        let s1 = samples.get(src_idx).copied().unwrap_or(0);
        let s2 = samples.get(src_idx + 1).copied().unwrap_or(s1);

        let interpolated = s1 as f64 * (1.0 - frac) + s2 as f64 * frac;
        output.push(interpolated as i16);
    }

    output
}
