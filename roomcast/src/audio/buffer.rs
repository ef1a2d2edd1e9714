//! Byte ring buffer shared between the real-time and application domains
//!
//! A thin wrapper around `ringbuf`'s lock-free SPSC ring, specialised to
//! raw audio bytes.
//!
//! # Features
//!
//! - The producer half owns the write index, the consumer half owns the
//!   read index; each half only reads the other's index
//! - Writes go through a [`WriteGrant`] that fills free space in place and
//!   publishes it with a single index advance
//! - Reads borrow the occupied region as two slices and release it with
//!   [`RingConsumer::advance_read`]
//! - Storage is allocated once, at creation
//!
//! # Example
//!
//! ```
//! use roomcast_lib::audio::buffer::RingBuffer;
//!
//! let (mut producer, mut consumer) = RingBuffer::new(16);
//!
//! producer.push_slice(&[1, 2, 3, 4]).unwrap();
//! assert_eq!(consumer.fill_count(), 4);
//!
//! let (head, _tail) = consumer.read_slices();
//! assert_eq!(head, &[1, 2, 3, 4]);
//! consumer.advance_read(4);
//! assert_eq!(consumer.fill_count(), 0);
//! ```

use std::time::Duration;

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};

use crate::audio::error::{AudioError, AudioResult};
use crate::audio::format::StreamConfig;

/// Byte ring buffer factory
///
/// Creating a ring buffer immediately splits it into its two halves, so no
/// single owner can ever both read and write it.
pub struct RingBuffer;

impl RingBuffer {
    /// Create a ring buffer holding `capacity` bytes
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> (RingProducer, RingConsumer) {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");

        let rb = HeapRb::<u8>::new(capacity);
        let (producer, consumer) = rb.split();

        (RingProducer { inner: producer }, RingConsumer { inner: consumer })
    }

    /// Create a ring buffer holding `duration` of audio for `config`
    ///
    /// The capacity is always a whole number of frames.
    ///
    /// ```
    /// use std::time::Duration;
    /// use roomcast_lib::audio::{buffer::RingBuffer, SampleFormat, StreamConfig};
    ///
    /// let config = StreamConfig::new(SampleFormat::S16Le, 48000, 2);
    /// let (producer, _consumer) = RingBuffer::for_stream(&config, Duration::from_secs(2));
    /// assert_eq!(producer.capacity(), 384000);
    /// ```
    pub fn for_stream(config: &StreamConfig, duration: Duration) -> (RingProducer, RingConsumer) {
        let capacity = config
            .duration_to_bytes(duration)
            .max(config.bytes_per_frame());
        Self::new(capacity)
    }
}

/// Producer half: owned by exactly one writer role
pub struct RingProducer {
    inner: HeapProd<u8>,
}

impl RingProducer {
    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }

    /// Bytes that can be written right now
    pub fn free_count(&self) -> usize {
        self.inner.vacant_len()
    }

    /// Bytes currently waiting for the consumer
    pub fn fill_count(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Reserve the current free space for in-place writing
    ///
    /// Nothing becomes visible to the consumer until [`WriteGrant::commit`].
    pub fn write_grant(&mut self) -> WriteGrant<'_> {
        let limit = self.free_count();
        WriteGrant {
            producer: self,
            limit,
            written: 0,
        }
    }

    /// Write all of `bytes` or nothing
    ///
    /// # Errors
    /// Returns `AudioError::RingFull` if `bytes` does not fit.
    pub fn push_slice(&mut self, bytes: &[u8]) -> AudioResult<()> {
        let mut grant = self.write_grant();
        grant.put(bytes)?;
        grant.commit();
        Ok(())
    }

    /// Write `len` zero bytes or nothing
    pub fn push_silence(&mut self, len: usize) -> AudioResult<()> {
        let mut grant = self.write_grant();
        grant.put_silence(len)?;
        grant.commit();
        Ok(())
    }
}

/// In-progress write into a producer's free space
///
/// The grant tracks how many bytes were placed; `commit` advances the write
/// index by exactly that amount. Dropping a grant without committing
/// discards the bytes.
pub struct WriteGrant<'a> {
    producer: &'a mut RingProducer,
    limit: usize,
    written: usize,
}

impl WriteGrant<'_> {
    /// Bytes placed so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Bytes still available in this grant
    pub fn remaining(&self) -> usize {
        self.limit - self.written
    }

    /// Append `bytes` after what was already written
    pub fn put(&mut self, bytes: &[u8]) -> AudioResult<()> {
        self.fill_with(bytes.len(), |index| bytes[index])
    }

    /// Append `len` zero bytes
    pub fn put_silence(&mut self, len: usize) -> AudioResult<()> {
        self.fill_with(len, |_| 0)
    }

    fn fill_with(&mut self, len: usize, mut byte_at: impl FnMut(usize) -> u8) -> AudioResult<()> {
        if len > self.remaining() {
            return Err(AudioError::RingFull {
                requested: len,
                free: self.remaining(),
            });
        }

        // The vacant region always starts at our own write index, so the
        // offset of `written` inside it is stable across calls.
        let (head, tail) = self.producer.inner.vacant_slices_mut();
        let mut skip = self.written;
        let mut index = 0;

        for region in [head, tail] {
            if skip >= region.len() {
                skip -= region.len();
                continue;
            }
            for slot in &mut region[skip..] {
                if index == len {
                    break;
                }
                slot.write(byte_at(index));
                index += 1;
            }
            skip = 0;
            if index == len {
                break;
            }
        }

        self.written += len;
        Ok(())
    }

    /// Publish the written bytes to the consumer
    ///
    /// Returns the number of bytes the write index advanced by.
    pub fn commit(self) -> usize {
        let written = self.written;
        // SAFETY: `fill_with` initialised exactly `written` bytes starting at
        // the write index, and `written` never exceeds the vacant length
        // observed when the grant was created.
        unsafe { self.producer.inner.advance_write_index(written) };
        written
    }
}

/// Consumer half: owned by exactly one reader role
pub struct RingConsumer {
    inner: HeapCons<u8>,
}

impl RingConsumer {
    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }

    /// Bytes available to read
    pub fn fill_count(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Bytes the producer can still write
    pub fn free_count(&self) -> usize {
        self.inner.vacant_len()
    }

    /// Occupied region in FIFO order, split at the storage wrap point
    pub fn read_slices(&self) -> (&[u8], &[u8]) {
        self.inner.as_slices()
    }

    /// Release `len` bytes back to the producer
    ///
    /// `len` must not exceed [`fill_count`](Self::fill_count); excess is
    /// ignored. Returns the number of bytes released.
    pub fn advance_read(&mut self, len: usize) -> usize {
        debug_assert!(len <= self.fill_count(), "read advance beyond fill count");
        self.inner.skip(len)
    }

    /// Copy up to `len` bytes into `out` without releasing them
    pub fn copy_to(&self, len: usize, out: &mut Vec<u8>) -> usize {
        let (head, tail) = self.read_slices();
        let from_head = len.min(head.len());
        let from_tail = (len - from_head).min(tail.len());

        out.extend_from_slice(&head[..from_head]);
        out.extend_from_slice(&tail[..from_tail]);
        from_head + from_tail
    }

    /// Copy and release up to `out.len()` bytes
    pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
        self.inner.pop_slice(out)
    }

    /// Drop everything currently buffered
    pub fn clear(&mut self) -> usize {
        self.inner.clear()
    }
}
