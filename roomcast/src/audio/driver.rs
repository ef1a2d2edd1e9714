//! Begin/end transactions between the callbacks and a device driver
//!
//! A callback asks the driver for a region of frames, copies samples in or
//! out through the region's [`ChannelLayout`], then ends the transaction.
//! A region is never retained past its `end_*` call; the borrow checker
//! enforces this because regions borrow the driver mutably.
//!
//! The interleaved adapters wrap the flat byte buffers cpal hands to its
//! data callbacks. Fake drivers in tests implement the same traits.

use crate::audio::error::AudioResult;
use crate::audio::format::ChannelLayout;

/// Frames handed to the capture callback for one read transaction
pub enum InputRegion<'a> {
    /// Real sample data
    Frames(FrameView<'a>),
    /// A span the driver has no data for; written as silence
    Hole { frames: usize },
}

impl InputRegion<'_> {
    pub fn frame_count(&self) -> usize {
        match self {
            Self::Frames(view) => view.frames(),
            Self::Hole { frames } => *frames,
        }
    }

    pub fn is_hole(&self) -> bool {
        matches!(self, Self::Hole { .. })
    }
}

/// Read-only frame region
pub struct FrameView<'a> {
    data: &'a [u8],
    layout: &'a ChannelLayout,
    frames: usize,
}

impl<'a> FrameView<'a> {
    pub fn new(data: &'a [u8], layout: &'a ChannelLayout, frames: usize) -> Self {
        debug_assert!(layout.span_bytes(frames) <= data.len());
        Self {
            data,
            layout,
            frames,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channel_count(&self) -> usize {
        self.layout.channel_count()
    }

    /// Bytes of one sample
    pub fn sample(&self, frame: usize, channel: usize) -> &[u8] {
        &self.data[self.layout.sample_range(frame, channel)]
    }
}

/// Writable frame region for the playback callback
pub struct FrameViewMut<'a> {
    data: &'a mut [u8],
    layout: &'a ChannelLayout,
    frames: usize,
}

impl<'a> FrameViewMut<'a> {
    pub fn new(data: &'a mut [u8], layout: &'a ChannelLayout, frames: usize) -> Self {
        debug_assert!(layout.span_bytes(frames) <= data.len());
        Self {
            data,
            layout,
            frames,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channel_count(&self) -> usize {
        self.layout.channel_count()
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.layout.bytes_per_sample()
    }

    pub fn sample_mut(&mut self, frame: usize, channel: usize) -> &mut [u8] {
        let range = self.layout.sample_range(frame, channel);
        &mut self.data[range]
    }

    /// Zero every sample of every channel in the region
    pub fn fill_silence(&mut self) {
        for frame in 0..self.frames {
            for channel in 0..self.channel_count() {
                self.sample_mut(frame, channel).fill(0);
            }
        }
    }
}

/// Source side of a capture stream
pub trait InputDriver {
    /// Start reading up to `frame_count` frames
    ///
    /// The driver may return fewer frames than asked; a zero-length region
    /// means it has nothing more for this invocation.
    fn begin_read(&mut self, frame_count: usize) -> AudioResult<InputRegion<'_>>;

    /// Release the region returned by the last `begin_read`
    fn end_read(&mut self) -> AudioResult<()>;
}

/// Sink side of a playback stream
pub trait OutputDriver {
    /// Start writing up to `frame_count` frames
    fn begin_write(&mut self, frame_count: usize) -> AudioResult<FrameViewMut<'_>>;

    /// Submit the region returned by the last `begin_write`
    fn end_write(&mut self) -> AudioResult<()>;
}

/// Input driver over one interleaved cpal buffer
pub struct InterleavedInput<'a> {
    data: &'a [u8],
    layout: &'a ChannelLayout,
    bytes_per_frame: usize,
    cursor: usize,
    pending: usize,
}

impl<'a> InterleavedInput<'a> {
    pub fn new(data: &'a [u8], layout: &'a ChannelLayout) -> Self {
        let bytes_per_frame = layout.span_bytes(1);
        Self {
            data,
            layout,
            bytes_per_frame,
            cursor: 0,
            pending: 0,
        }
    }

    /// Whole frames in the underlying buffer
    pub fn frame_count(&self) -> usize {
        if self.bytes_per_frame == 0 {
            0
        } else {
            self.data.len() / self.bytes_per_frame
        }
    }
}

impl InputDriver for InterleavedInput<'_> {
    fn begin_read(&mut self, frame_count: usize) -> AudioResult<InputRegion<'_>> {
        let frames = frame_count.min(self.frame_count() - self.cursor);
        let start = self.cursor * self.bytes_per_frame;
        let end = start + frames * self.bytes_per_frame;
        self.pending = frames;

        Ok(InputRegion::Frames(FrameView::new(
            &self.data[start..end],
            self.layout,
            frames,
        )))
    }

    fn end_read(&mut self) -> AudioResult<()> {
        self.cursor += self.pending;
        self.pending = 0;
        Ok(())
    }
}

/// Output driver over one interleaved cpal buffer
pub struct InterleavedOutput<'a> {
    data: &'a mut [u8],
    layout: &'a ChannelLayout,
    bytes_per_frame: usize,
    cursor: usize,
    pending: usize,
}

impl<'a> InterleavedOutput<'a> {
    pub fn new(data: &'a mut [u8], layout: &'a ChannelLayout) -> Self {
        let bytes_per_frame = layout.span_bytes(1);
        Self {
            data,
            layout,
            bytes_per_frame,
            cursor: 0,
            pending: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        if self.bytes_per_frame == 0 {
            0
        } else {
            self.data.len() / self.bytes_per_frame
        }
    }

    /// Frames submitted so far
    pub fn frames_written(&self) -> usize {
        self.cursor
    }

    /// Zero whatever the callback left unwritten
    pub fn silence_remaining(&mut self) {
        let start = self.cursor * self.bytes_per_frame;
        self.data[start..].fill(0);
        self.cursor = self.frame_count();
    }
}

impl OutputDriver for InterleavedOutput<'_> {
    fn begin_write(&mut self, frame_count: usize) -> AudioResult<FrameViewMut<'_>> {
        let frames = frame_count.min(self.frame_count() - self.cursor);
        let start = self.cursor * self.bytes_per_frame;
        let end = start + frames * self.bytes_per_frame;
        self.pending = frames;

        Ok(FrameViewMut::new(
            &mut self.data[start..end],
            self.layout,
            frames,
        ))
    }

    fn end_write(&mut self) -> AudioResult<()> {
        self.cursor += self.pending;
        self.pending = 0;
        Ok(())
    }
}
