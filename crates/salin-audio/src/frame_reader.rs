use std::time::{Duration, Instant};

use crate::capture::AudioFrame;
use crate::ring_buffer::AudioConsumer;

/// Assembles fixed-size mono frames from the capture ring.
///
/// The device callback writes interleaved samples at whatever channel
/// count the device reports; this reader waits until a full block is
/// available, downmixes to mono, and reconstructs a timestamp from the
/// running sample count.
pub struct FrameReader {
    consumer: AudioConsumer,
    sample_rate: u32,
    channels: u16,
    block_samples: usize,
    scratch: Vec<i16>,
    samples_read: u64,
    start_time: Instant,
}

impl FrameReader {
    pub fn new(
        consumer: AudioConsumer,
        sample_rate: u32,
        channels: u16,
        block_samples: usize,
    ) -> Self {
        let channels = channels.max(1);
        Self {
            consumer,
            sample_rate,
            channels,
            block_samples,
            scratch: vec![0i16; block_samples * channels as usize],
            samples_read: 0,
            start_time: Instant::now(),
        }
    }

    /// Returns the next full block, or None until enough samples arrive.
    pub fn read_frame(&mut self) -> Option<AudioFrame> {
        let needed = self.block_samples * self.channels as usize;
        if self.consumer.slots() < needed {
            return None;
        }

        // Only the consumer removes samples, so a full block is still there.
        let _read = self.consumer.read(&mut self.scratch[..needed]);
        debug_assert_eq!(_read, needed);

        let samples = if self.channels == 1 {
            self.scratch[..needed].to_vec()
        } else {
            downmix_interleaved(&self.scratch[..needed], self.channels)
        };

        let elapsed_ms = (self.samples_read * 1000) / self.sample_rate as u64;
        let timestamp = self.start_time + Duration::from_millis(elapsed_ms);
        self.samples_read += self.block_samples as u64;

        Some(AudioFrame {
            samples,
            timestamp,
            sample_rate: self.sample_rate,
        })
    }
}

fn downmix_interleaved(interleaved: &[i16], channels: u16) -> Vec<i16> {
    let n = channels as usize;
    interleaved
        .chunks_exact(n)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / n as i32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring_buffer::AudioRingBuffer;

    #[test]
    fn returns_none_until_full_block_available() {
        let rb = AudioRingBuffer::new(64);
        let (mut producer, consumer) = rb.split();
        let mut reader = FrameReader::new(consumer, 16000, 1, 8);

        assert_eq!(producer.write(&[1i16; 5]), 5);
        assert!(reader.read_frame().is_none());

        assert_eq!(producer.write(&[1i16; 3]), 3);
        let frame = reader.read_frame().expect("full block available");
        assert_eq!(frame.samples.len(), 8);
        assert_eq!(frame.sample_rate, 16000);
    }

    #[test]
    fn downmixes_stereo_to_mono() {
        let rb = AudioRingBuffer::new(64);
        let (mut producer, consumer) = rb.split();
        let mut reader = FrameReader::new(consumer, 48000, 2, 4);

        // L/R interleaved; each pair averages
        let interleaved = [100i16, 300, -200, -400, 0, 0, 32000, 32000];
        assert_eq!(producer.write(&interleaved), 8);

        let frame = reader.read_frame().expect("block available");
        assert_eq!(frame.samples, vec![200, -300, 0, 32000]);
    }

    #[test]
    fn timestamps_advance_by_block_duration() {
        let rb = AudioRingBuffer::new(128);
        let (mut producer, consumer) = rb.split();
        let mut reader = FrameReader::new(consumer, 8000, 1, 16);

        assert_eq!(producer.write(&[0i16; 48]), 48);
        let t0 = reader.read_frame().unwrap().timestamp;
        let t1 = reader.read_frame().unwrap().timestamp;
        let t2 = reader.read_frame().unwrap().timestamp;
        assert_eq!(t1 - t0, Duration::from_millis(2));
        assert_eq!(t2 - t1, Duration::from_millis(2));
    }
}
