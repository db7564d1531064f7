pub mod capture;
pub mod device;
pub mod frame_reader;
pub mod playback;
pub mod ring_buffer;
pub mod watchdog;

// Public API
pub use capture::{AudioFrame, CaptureThread, DeviceConfig};
pub use device::{DeviceInfo, DeviceManager};
pub use frame_reader::FrameReader;
pub use playback::{PcmAudio, PlaybackDevice};
pub use ring_buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};
pub use watchdog::WatchdogTimer;
