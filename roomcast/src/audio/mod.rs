/// Byte ring buffer between the real-time and application domains
pub mod buffer;

/// Capture callback and input stream
pub mod capture;

/// Audio host and device enumeration, probing and selection
pub mod device;

/// Driver transaction traits and interleaved adapters
pub mod driver;

/// Audio-related error types
pub mod error;

/// Sample formats, stream configuration and channel layouts
pub mod format;

/// Stream configuration negotiation
pub mod negotiate;

/// Playback callback and output stream
pub mod playback;

// Re-export commonly used types
pub use buffer::{RingBuffer, RingConsumer, RingProducer};
pub use capture::{CaptureCallback, CaptureOutcome, CaptureStream, OverflowHook};
pub use device::{AudioDevice, Direction};
pub use driver::{FrameView, FrameViewMut, InputDriver, InputRegion, OutputDriver};
pub use error::{AudioError, AudioResult};
pub use format::{ChannelArea, ChannelLayout, SampleFormat, StreamConfig};
pub use negotiate::{DeviceCapabilities, DeviceNegotiator, SampleRateRange};
pub use playback::{
    PlaybackCallback, PlaybackOutcome, PlaybackStream, SilenceCushion, UnderflowSignal,
};
