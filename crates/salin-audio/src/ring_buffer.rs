use rtrb::{Consumer, Producer, RingBuffer};

/// Audio ring buffer using rtrb (real-time safe)
pub struct AudioRingBuffer {
    producer: Producer<i16>,
    consumer: Consumer<i16>,
}

impl AudioRingBuffer {
    /// Create a new ring buffer with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self { producer, consumer }
    }

    /// Split into producer and consumer for separate threads
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
            },
            AudioConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Producer half of the ring buffer (for the audio callback thread)
pub struct AudioProducer {
    producer: Producer<i16>,
}

impl AudioProducer {
    /// Write samples from the audio callback (non-blocking). When the ring
    /// is too full for the whole block, writes what fits and returns the
    /// number of samples written; the caller accounts for the rest as
    /// dropped. Never blocks the device driver.
    pub fn write(&mut self, samples: &[i16]) -> usize {
        let writable = samples.len().min(self.producer.slots());
        if writable == 0 {
            return 0;
        }

        let mut chunk = match self.producer.write_chunk(writable) {
            Ok(chunk) => chunk,
            Err(_) => return 0,
        };

        // Write may wrap; fill both slices
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        if split > 0 {
            first.copy_from_slice(&samples[..split]);
        }
        if !second.is_empty() {
            second.copy_from_slice(&samples[split..split + second.len()]);
        }
        chunk.commit_all();
        writable
    }

    /// Check available space
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Consumer half of the ring buffer (for the recognition thread)
pub struct AudioConsumer {
    consumer: Consumer<i16>,
}

impl AudioConsumer {
    /// Read up to `buffer.len()` samples (non-blocking)
    pub fn read(&mut self, buffer: &mut [i16]) -> usize {
        let chunk = match self.consumer.read_chunk(buffer.len()) {
            Ok(chunk) => chunk,
            Err(rtrb::chunks::ChunkError::TooFewSlots(available)) => {
                if available == 0 {
                    return 0;
                }
                match self.consumer.read_chunk(available) {
                    Ok(chunk) => chunk,
                    Err(_) => return 0,
                }
            }
        };

        let len = chunk.len();
        let (first, second) = chunk.as_slices();
        let split = first.len();
        if split > 0 {
            buffer[..split].copy_from_slice(first);
        }
        if !second.is_empty() {
            buffer[split..split + second.len()].copy_from_slice(second);
        }
        chunk.commit_all();
        len
    }

    /// Check available samples to read
    pub fn slots(&self) -> usize {
        self.consumer.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_write_read() {
        let rb = AudioRingBuffer::new(1024);
        let (mut producer, mut consumer) = rb.split();

        let samples = vec![1, 2, 3, 4, 5];
        assert_eq!(producer.write(&samples), 5);

        let mut buffer = vec![0i16; 10];
        let read = consumer.read(&mut buffer);

        assert_eq!(read, 5);
        assert_eq!(&buffer[..5], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_partial_write_when_nearly_full() {
        let rb = AudioRingBuffer::new(16);
        let (mut producer, mut consumer) = rb.split();

        assert_eq!(producer.write(&[1i16; 12]), 12);
        // Only 4 slots left; the rest of the block is dropped
        assert_eq!(producer.write(&[2i16; 8]), 4);
        assert_eq!(producer.write(&[3i16; 4]), 0);

        let mut buffer = vec![0i16; 16];
        assert_eq!(consumer.read(&mut buffer), 16);
        assert_eq!(&buffer[12..], &[2, 2, 2, 2]);
    }

    #[test]
    fn test_read_wraps_around() {
        let rb = AudioRingBuffer::new(8);
        let (mut producer, mut consumer) = rb.split();

        assert_eq!(producer.write(&[1i16; 6]), 6);
        let mut buffer = vec![0i16; 6];
        assert_eq!(consumer.read(&mut buffer), 6);

        // Second write wraps past the end of the ring
        assert_eq!(producer.write(&[7i16; 6]), 6);
        assert_eq!(consumer.read(&mut buffer), 6);
        assert_eq!(&buffer[..], &[7, 7, 7, 7, 7, 7]);
    }
}
