//! Sample formats, stream configuration and channel layouts
//!
//! The types here describe *what* flows through the pipeline: which sample
//! encoding the device speaks, how many bytes make up a frame, and where
//! each channel's samples live inside a driver-provided buffer.

use std::fmt;
use std::ops::Range;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Byte order of a multi-byte sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the machine we are running on
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::Little
        } else {
            Self::Big
        }
    }
}

/// Sample encodings a device may advertise
///
/// Variants are declared in order of byte width, with little-endian before
/// big-endian for every multi-byte width. 24-bit samples occupy a 32-bit
/// container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    S8,
    U8,
    S16Le,
    S16Be,
    U16Le,
    U16Be,
    S24Le,
    S24Be,
    U24Le,
    U24Be,
    S32Le,
    S32Be,
    U32Le,
    U32Be,
    Float32Le,
    Float32Be,
    Float64Le,
    Float64Be,
}

use SampleFormat::*;

/// Format preference on little-endian hosts
///
/// Floating point first, then signed integers from widest to narrowest,
/// then unsigned integers. Native byte order precedes foreign byte order.
#[cfg(target_endian = "little")]
pub const DEFAULT_FORMAT_PRIORITY: &[SampleFormat] = &[
    Float32Le, Float32Be, Float64Le, Float64Be, S32Le, S32Be, S24Le, S24Be, S16Le, S16Be, S8,
    U32Le, U32Be, U24Le, U24Be, U16Le, U16Be, U8,
];

/// Format preference on big-endian hosts
#[cfg(target_endian = "big")]
pub const DEFAULT_FORMAT_PRIORITY: &[SampleFormat] = &[
    Float32Be, Float32Le, Float64Be, Float64Le, S32Be, S32Le, S24Be, S24Le, S16Be, S16Le, S8,
    U32Be, U32Le, U24Be, U24Le, U16Be, U16Le, U8,
];

impl SampleFormat {
    /// Number of bytes one sample occupies
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            S8 | U8 => 1,
            S16Le | S16Be | U16Le | U16Be => 2,
            S24Le | S24Be | U24Le | U24Be => 4,
            S32Le | S32Be | U32Le | U32Be | Float32Le | Float32Be => 4,
            Float64Le | Float64Be => 8,
        }
    }

    /// Byte order, `None` for single-byte formats
    pub const fn endianness(self) -> Option<Endianness> {
        match self {
            S8 | U8 => None,
            S16Le | U16Le | S24Le | U24Le | S32Le | U32Le | Float32Le | Float64Le => {
                Some(Endianness::Little)
            }
            S16Be | U16Be | S24Be | U24Be | S32Be | U32Be | Float32Be | Float64Be => {
                Some(Endianness::Big)
            }
        }
    }

    /// Whether samples can be handed to the CPU without byte swapping
    pub fn is_native_endian(self) -> bool {
        self.endianness()
            .is_none_or(|endian| endian == Endianness::native())
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Float32Le | Float32Be | Float64Le | Float64Be)
    }

    pub const fn is_signed(self) -> bool {
        !matches!(self, U8 | U16Le | U16Be | U24Le | U24Be | U32Le | U32Be)
    }

    /// Short lowercase name, e.g. `float32le`
    pub const fn name(self) -> &'static str {
        match self {
            S8 => "s8",
            U8 => "u8",
            S16Le => "s16le",
            S16Be => "s16be",
            U16Le => "u16le",
            U16Be => "u16be",
            S24Le => "s24le",
            S24Be => "s24be",
            U24Le => "u24le",
            U24Be => "u24be",
            S32Le => "s32le",
            S32Be => "s32be",
            U32Le => "u32le",
            U32Be => "u32be",
            Float32Le => "float32le",
            Float32Be => "float32be",
            Float64Le => "float64le",
            Float64Be => "float64be",
        }
    }

    /// Map a cpal sample format onto the native-endian variant
    ///
    /// cpal always delivers samples in host byte order. 64-bit integer
    /// formats have no counterpart and yield `None`.
    pub fn from_cpal(format: cpal::SampleFormat) -> Option<Self> {
        let little = Endianness::native() == Endianness::Little;
        let pick = |le: SampleFormat, be: SampleFormat| if little { le } else { be };

        match format {
            cpal::SampleFormat::I8 => Some(S8),
            cpal::SampleFormat::U8 => Some(U8),
            cpal::SampleFormat::I16 => Some(pick(S16Le, S16Be)),
            cpal::SampleFormat::U16 => Some(pick(U16Le, U16Be)),
            cpal::SampleFormat::I32 => Some(pick(S32Le, S32Be)),
            cpal::SampleFormat::U32 => Some(pick(U32Le, U32Be)),
            cpal::SampleFormat::F32 => Some(pick(Float32Le, Float32Be)),
            cpal::SampleFormat::F64 => Some(pick(Float64Le, Float64Be)),
            _ => None,
        }
    }

    /// The cpal format a stream must be opened with, if any
    ///
    /// Foreign-endian and 24-bit formats cannot be opened through cpal.
    pub fn to_cpal(self) -> Option<cpal::SampleFormat> {
        if !self.is_native_endian() {
            return None;
        }

        match self {
            S8 => Some(cpal::SampleFormat::I8),
            U8 => Some(cpal::SampleFormat::U8),
            S16Le | S16Be => Some(cpal::SampleFormat::I16),
            U16Le | U16Be => Some(cpal::SampleFormat::U16),
            S32Le | S32Be => Some(cpal::SampleFormat::I32),
            U32Le | U32Be => Some(cpal::SampleFormat::U32),
            Float32Le | Float32Be => Some(cpal::SampleFormat::F32),
            Float64Le | Float64Be => Some(cpal::SampleFormat::F64),
            S24Le | S24Be | U24Le | U24Be => None,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Negotiated configuration of one open stream
///
/// Built once by the negotiator and never changed while the stream lives,
/// so the fields are only reachable through accessors.
///
/// # Example
/// ```
/// use roomcast_lib::audio::{SampleFormat, StreamConfig};
///
/// let config = StreamConfig::new(SampleFormat::S16Le, 48000, 2);
/// assert_eq!(config.bytes_per_frame(), 4);
/// assert_eq!(config.bytes_per_second(), 192000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamConfig {
    sample_format: SampleFormat,
    sample_rate: u32,
    channel_count: u16,
    bytes_per_sample: usize,
    bytes_per_frame: usize,
}

impl StreamConfig {
    /// Create a configuration, deriving the per-sample and per-frame sizes
    pub fn new(sample_format: SampleFormat, sample_rate: u32, channel_count: u16) -> Self {
        let bytes_per_sample = sample_format.bytes_per_sample();
        Self {
            sample_format,
            sample_rate,
            channel_count,
            bytes_per_sample,
            bytes_per_frame: bytes_per_sample * channel_count as usize,
        }
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bytes_per_sample
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_frame
    }

    /// Bytes of audio produced per second of wall-clock time
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.bytes_per_frame
    }

    pub fn frames_to_bytes(&self, frames: usize) -> usize {
        frames * self.bytes_per_frame
    }

    /// Whole frames contained in `bytes`; a trailing partial frame is ignored
    pub fn bytes_to_frames(&self, bytes: usize) -> usize {
        if self.bytes_per_frame == 0 {
            0
        } else {
            bytes / self.bytes_per_frame
        }
    }

    /// Frame-aligned byte count covering `duration` of audio
    pub fn duration_to_bytes(&self, duration: Duration) -> usize {
        let frames = (self.sample_rate as f64 * duration.as_secs_f64()).round() as usize;
        self.frames_to_bytes(frames)
    }

    /// Layout of this stream's frames inside the ring buffer
    pub fn interleaved_layout(&self) -> ChannelLayout {
        ChannelLayout::interleaved(self.channel_count, self.bytes_per_sample)
    }
}

impl fmt::Display for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ch {}Hz {} interleaved",
            self.channel_count, self.sample_rate, self.sample_format
        )
    }
}

/// Where one channel's samples live in a buffer
///
/// The sample for frame `n` starts at `offset + n * step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelArea {
    pub offset: usize,
    pub step: usize,
}

/// Per-channel layout descriptor for a block of frames
///
/// Replaces raw pointer stepping: copy routines ask the layout for the
/// byte range of `(frame, channel)` and index the buffer with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    areas: Vec<ChannelArea>,
    bytes_per_sample: usize,
}

impl ChannelLayout {
    /// Build a layout from explicit channel areas
    pub fn new(areas: Vec<ChannelArea>, bytes_per_sample: usize) -> Self {
        Self {
            areas,
            bytes_per_sample,
        }
    }

    /// Samples of all channels for one frame sit next to each other
    pub fn interleaved(channel_count: u16, bytes_per_sample: usize) -> Self {
        let step = channel_count as usize * bytes_per_sample;
        let areas = (0..channel_count as usize)
            .map(|channel| ChannelArea {
                offset: channel * bytes_per_sample,
                step,
            })
            .collect();
        Self::new(areas, bytes_per_sample)
    }

    /// Each channel occupies its own contiguous block of `frames` samples
    pub fn planar(channel_count: u16, bytes_per_sample: usize, frames: usize) -> Self {
        let areas = (0..channel_count as usize)
            .map(|channel| ChannelArea {
                offset: channel * frames * bytes_per_sample,
                step: bytes_per_sample,
            })
            .collect();
        Self::new(areas, bytes_per_sample)
    }

    pub fn channel_count(&self) -> usize {
        self.areas.len()
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bytes_per_sample
    }

    pub fn areas(&self) -> &[ChannelArea] {
        &self.areas
    }

    /// Byte range of the sample for `frame` on `channel`
    pub fn sample_range(&self, frame: usize, channel: usize) -> Range<usize> {
        let area = self.areas[channel];
        let start = area.offset + frame * area.step;
        start..start + self.bytes_per_sample
    }

    /// Minimum buffer length able to hold `frames` frames in this layout
    pub fn span_bytes(&self, frames: usize) -> usize {
        if frames == 0 {
            return 0;
        }
        self.areas
            .iter()
            .map(|area| area.offset + (frames - 1) * area.step + self.bytes_per_sample)
            .max()
            .unwrap_or(0)
    }
}
