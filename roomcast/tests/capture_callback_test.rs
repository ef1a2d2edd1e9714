/// Integration tests for the real-time capture callback
///
/// A scripted input driver stands in for the audio device so holes,
/// partial fulfilment and overflow can be reproduced exactly.

use std::collections::VecDeque;
use std::sync::Arc;

use roomcast_lib::audio::buffer::{RingBuffer, RingConsumer};
use roomcast_lib::audio::driver::{FrameView, InputDriver, InputRegion};
use roomcast_lib::audio::{AudioError, AudioResult, CaptureCallback, ChannelLayout, SampleFormat, StreamConfig};
use roomcast_lib::stream::{FaultKind, StopSignal, StreamCounters};

enum Chunk {
    Frames(Vec<u8>),
    Hole(usize),
}

/// Serves scripted chunks, at most one chunk per transaction
struct ScriptedInput {
    layout: ChannelLayout,
    bytes_per_frame: usize,
    chunks: VecDeque<Chunk>,
    pending: usize,
    transactions: usize,
}

impl ScriptedInput {
    fn new(config: &StreamConfig, chunks: Vec<Chunk>) -> Self {
        Self {
            layout: config.interleaved_layout(),
            bytes_per_frame: config.bytes_per_frame(),
            chunks: chunks.into(),
            pending: 0,
            transactions: 0,
        }
    }
}

impl InputDriver for ScriptedInput {
    fn begin_read(&mut self, frame_count: usize) -> AudioResult<InputRegion<'_>> {
        self.transactions += 1;
        let region = match self.chunks.front() {
            None => InputRegion::Hole { frames: 0 },
            Some(Chunk::Hole(frames)) => InputRegion::Hole {
                frames: (*frames).min(frame_count),
            },
            Some(Chunk::Frames(data)) => {
                let frames = (data.len() / self.bytes_per_frame).min(frame_count);
                InputRegion::Frames(FrameView::new(data, &self.layout, frames))
            }
        };
        self.pending = region.frame_count();
        Ok(region)
    }

    fn end_read(&mut self) -> AudioResult<()> {
        let consumed = self.pending;
        self.pending = 0;

        let exhausted = match self.chunks.front_mut() {
            Some(Chunk::Hole(frames)) => {
                *frames -= consumed;
                *frames == 0
            }
            Some(Chunk::Frames(data)) => {
                data.drain(..consumed * self.bytes_per_frame);
                data.is_empty()
            }
            None => false,
        };
        if exhausted {
            self.chunks.pop_front();
        }
        Ok(())
    }
}

fn stereo_s16() -> StreamConfig {
    StreamConfig::new(SampleFormat::S16Le, 48000, 2)
}

fn capture(capacity_frames: usize) -> (CaptureCallback, RingConsumer, StopSignal, Arc<StreamCounters>) {
    let config = stereo_s16();
    let (producer, consumer) = RingBuffer::new(capacity_frames * config.bytes_per_frame());
    let stop = StopSignal::new();
    let counters = Arc::new(StreamCounters::new());
    let callback = CaptureCallback::new(producer, config, stop.clone(), Arc::clone(&counters));
    (callback, consumer, stop, counters)
}

fn drain(consumer: &mut RingConsumer) -> Vec<u8> {
    let mut out = vec![0u8; consumer.fill_count()];
    consumer.pop_into(&mut out);
    out
}

#[test]
fn test_partial_fulfilment_across_transactions() {
    println!("\n=== Capture Partial Fulfilment Test ===");

    let (mut callback, mut consumer, _stop, counters) = capture(16);
    let mut driver = ScriptedInput::new(
        &stereo_s16(),
        vec![
            Chunk::Frames((0..8).collect()),
            Chunk::Frames((8..16).collect()),
            Chunk::Frames((16..24).collect()),
        ],
    );

    let outcome = callback.on_input(&mut driver, 2, 6).unwrap();
    println!("Outcome: {:?}, transactions: {}", outcome, driver.transactions);

    assert_eq!(outcome.frames_written, 6);
    assert_eq!(outcome.hole_frames, 0);
    assert_eq!(driver.transactions, 3);
    assert_eq!(drain(&mut consumer), (0..24).collect::<Vec<u8>>());
    assert_eq!(counters.frames_transferred(), 6);

    println!("\n✓ One request satisfied across three transactions");
}

#[test]
fn test_holes_become_silence_in_place() {
    println!("\n=== Capture Hole Test ===");

    let (mut callback, mut consumer, _stop, _counters) = capture(16);
    let mut driver = ScriptedInput::new(
        &stereo_s16(),
        vec![
            Chunk::Frames(vec![1; 4]),
            Chunk::Hole(2),
            Chunk::Frames(vec![2; 4]),
        ],
    );

    let outcome = callback.on_input(&mut driver, 4, 4).unwrap();
    assert_eq!(outcome.frames_written, 4);
    assert_eq!(outcome.hole_frames, 2);

    let bytes = drain(&mut consumer);
    assert_eq!(&bytes[0..4], &[1; 4]);
    assert_eq!(&bytes[4..12], &[0; 8], "hole frames must be zero bytes");
    assert_eq!(&bytes[12..16], &[2; 4]);

    println!("\n✓ Hole written as silence, alignment preserved");
}

#[test]
fn test_short_driver_commits_only_delivered_frames() {
    let (mut callback, consumer, _stop, _counters) = capture(16);
    let mut driver = ScriptedInput::new(&stereo_s16(), vec![Chunk::Frames(vec![5; 8])]);

    let outcome = callback.on_input(&mut driver, 1, 10).unwrap();
    assert_eq!(outcome.frames_written, 2);
    assert_eq!(consumer.fill_count(), 8);
}

#[test]
fn test_write_limited_by_free_frames() {
    let (mut callback, consumer, _stop, _counters) = capture(4);
    let mut driver = ScriptedInput::new(&stereo_s16(), vec![Chunk::Frames(vec![7; 40])]);

    let outcome = callback.on_input(&mut driver, 2, 10).unwrap();
    assert_eq!(outcome.frames_written, 4);
    assert_eq!(consumer.free_count(), 0);
}

#[test]
fn test_overflow_is_fatal() {
    println!("\n=== Capture Overflow Test ===");

    let (mut callback, consumer, stop, _counters) = capture(4);
    let mut driver = ScriptedInput::new(&stereo_s16(), vec![Chunk::Frames(vec![3; 40])]);

    // Fill the ring and never drain it
    callback.on_input(&mut driver, 4, 4).unwrap();
    assert_eq!(consumer.free_count(), 0);

    let err = callback.on_input(&mut driver, 2, 4).unwrap_err();
    println!("Error: {}", err);

    assert!(matches!(err, AudioError::RingOverflow { requested: 2, free: 0 }));
    assert!(stop.is_stopped());
    assert_eq!(stop.fault(), Some(FaultKind::RingOverflow));
    assert_eq!(consumer.fill_count(), 16, "overflow must not wrap over unread data");

    println!("\n✓ Overflow raised a fault and left the ring untouched");
}

#[test]
fn test_stopped_callback_is_a_no_op() {
    let (mut callback, consumer, stop, _counters) = capture(16);
    let mut driver = ScriptedInput::new(&stereo_s16(), vec![Chunk::Frames(vec![1; 16])]);

    stop.stop();
    let outcome = callback.on_input(&mut driver, 2, 4).unwrap();

    assert_eq!(outcome.frames_written, 0);
    assert_eq!(driver.transactions, 0);
    assert_eq!(consumer.fill_count(), 0);
}

#[test]
fn test_device_overflow_hook_is_observational() {
    let (callback, _consumer, stop, counters) = capture(16);
    let hook = callback.overflow_hook();

    assert_eq!(hook.notify(), 1);
    assert_eq!(hook.notify(), 2);
    assert_eq!(counters.device_overflows(), 2);
    assert!(!stop.is_stopped());
}
