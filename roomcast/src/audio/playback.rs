//! Playback path: playback ring buffer out to the device

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream};
use tracing::{debug, error, info};

use crate::audio::buffer::RingConsumer;
use crate::audio::device::to_cpal_config;
use crate::audio::driver::{InterleavedOutput, OutputDriver};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::format::StreamConfig;
use crate::stream::{FaultKind, StopSignal, StreamCounters};

/// What one playback invocation did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackOutcome {
    /// Frames handed to the driver
    pub frames_written: usize,
    /// Whether the ring ran short and the frames are silence
    pub underflow: bool,
}

/// Device-level discontinuity flag, set by the driver's error path and
/// consumed by the next playback invocation
#[derive(Debug, Clone, Default)]
pub struct UnderflowSignal {
    pending: Arc<AtomicBool>,
}

impl UnderflowSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
    }

    fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

/// Silence still owed ahead of ring data after an underflow recovery
///
/// Written only by the playback callback. The playback bridge reads it so
/// owed silence counts toward its high-water mark.
#[derive(Debug, Clone, Default)]
pub struct SilenceCushion {
    owed: Arc<AtomicUsize>,
}

impl SilenceCushion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of silence not yet played
    pub fn owed(&self) -> usize {
        self.owed.load(Ordering::Acquire)
    }

    fn set(&self, bytes: usize) {
        self.owed.store(bytes, Ordering::Release);
    }
}

/// Real-time consumer of the playback ring
///
/// Owns the ring's consumer half. Underflow recovery drops everything
/// buffered and replaces it with one second of silence; the silence is
/// emitted from this side so the producer half keeps a single writer.
pub struct PlaybackCallback {
    consumer: RingConsumer,
    config: StreamConfig,
    stop: StopSignal,
    counters: Arc<StreamCounters>,
    underflow: UnderflowSignal,
    cushion: SilenceCushion,
}

impl PlaybackCallback {
    pub fn new(
        consumer: RingConsumer,
        config: StreamConfig,
        stop: StopSignal,
        counters: Arc<StreamCounters>,
    ) -> Self {
        Self {
            consumer,
            config,
            stop,
            counters,
            underflow: UnderflowSignal::new(),
            cushion: SilenceCushion::new(),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn counters(&self) -> &Arc<StreamCounters> {
        &self.counters
    }

    /// Handle the driver uses to report device-level underflow
    pub fn underflow_hook(&self) -> UnderflowSignal {
        self.underflow.clone()
    }

    /// Handle the playback bridge uses to see owed silence
    pub fn cushion(&self) -> SilenceCushion {
        self.cushion.clone()
    }

    /// Bytes available to play, recovery cushion included
    pub fn fill_count(&self) -> usize {
        self.cushion.owed() + self.consumer.fill_count()
    }

    pub fn fill_frames(&self) -> usize {
        self.config.bytes_to_frames(self.fill_count())
    }

    /// Drop buffered audio and queue one second of silence
    pub fn recover_underflow(&mut self) {
        let dropped = self.consumer.clear();
        self.cushion.set(self.config.bytes_per_second());
        let count = self.counters.record_underflow_recovery();
        debug!(dropped, count, "Underflow recovery");
    }

    /// Handle one driver invocation needing between `frame_count_min` and
    /// `frame_count_max` frames
    ///
    /// Ring underflow is not an error: the invocation is answered with
    /// exactly `frame_count_min` frames of silence and the ring is left
    /// untouched.
    ///
    /// # Errors
    /// Driver transaction errors, after raising [`FaultKind::Device`].
    pub fn on_output<D: OutputDriver>(
        &mut self,
        driver: &mut D,
        frame_count_min: usize,
        frame_count_max: usize,
    ) -> AudioResult<PlaybackOutcome> {
        let result = self.process(driver, frame_count_min, frame_count_max);
        if result.is_err() {
            self.stop.raise_fault(FaultKind::Device);
        }
        result
    }

    fn process<D: OutputDriver>(
        &mut self,
        driver: &mut D,
        frame_count_min: usize,
        frame_count_max: usize,
    ) -> AudioResult<PlaybackOutcome> {
        if self.stop.is_stopped() {
            let frames_written = write_silence(driver, frame_count_max)?;
            return Ok(PlaybackOutcome {
                frames_written,
                underflow: false,
            });
        }

        if self.underflow.take() {
            self.recover_underflow();
        }

        let fill_frames = self.fill_frames();
        if fill_frames < frame_count_min {
            self.counters.record_ring_underflow();
            let frames_written = write_silence(driver, frame_count_min)?;
            return Ok(PlaybackOutcome {
                frames_written,
                underflow: true,
            });
        }

        let frames_written = self.transfer(driver, fill_frames.min(frame_count_max))?;
        self.counters.add_frames(frames_written);
        Ok(PlaybackOutcome {
            frames_written,
            underflow: false,
        })
    }

    fn transfer<D: OutputDriver>(&mut self, driver: &mut D, read_frames: usize) -> AudioResult<usize> {
        let (head, tail) = self.consumer.read_slices();
        let mut owed = self.cushion.owed();
        let mut ring_offset = 0;
        let mut frames_left = read_frames;

        while frames_left > 0 {
            let mut view = driver.begin_write(frames_left)?;
            let frame_count = view.frames().min(frames_left);
            if frame_count == 0 {
                break;
            }

            for frame in 0..frame_count {
                for channel in 0..view.channel_count() {
                    let sample = view.sample_mut(frame, channel);
                    if owed > 0 {
                        sample.fill(0);
                        owed = owed.saturating_sub(sample.len());
                    } else {
                        copy_from_ring(sample, head, tail, ring_offset);
                        ring_offset += sample.len();
                    }
                }
            }

            driver.end_write()?;
            frames_left -= frame_count;
        }

        self.cushion.set(owed);
        self.consumer.advance_read(ring_offset);
        Ok(read_frames - frames_left)
    }
}

fn copy_from_ring(dst: &mut [u8], head: &[u8], tail: &[u8], offset: usize) {
    for (i, byte) in dst.iter_mut().enumerate() {
        let index = offset + i;
        *byte = if index < head.len() {
            head[index]
        } else {
            tail[index - head.len()]
        };
    }
}

fn write_silence<D: OutputDriver>(driver: &mut D, frames: usize) -> AudioResult<usize> {
    let mut frames_left = frames;
    while frames_left > 0 {
        let mut view = driver.begin_write(frames_left)?;
        let frame_count = view.frames().min(frames_left);
        if frame_count == 0 {
            break;
        }
        view.fill_silence();
        driver.end_write()?;
        frames_left -= frame_count;
    }
    Ok(frames - frames_left)
}

/// A running cpal output stream drained by a [`PlaybackCallback`]
pub struct PlaybackStream {
    stream: Stream,
    config: StreamConfig,
}

impl PlaybackStream {
    /// Build the output stream without starting it
    ///
    /// # Errors
    /// - `AudioError::UnsupportedFormat` if cpal cannot open the negotiated
    ///   sample format
    /// - `AudioError::StreamBuildFailed` if the device rejects the stream
    pub fn open(device: &Device, callback: PlaybackCallback) -> AudioResult<Self> {
        let config = *callback.config();
        let format = config
            .sample_format()
            .to_cpal()
            .ok_or(AudioError::UnsupportedFormat(config.sample_format()))?;
        let cpal_config = to_cpal_config(&config);
        let layout = config.interleaved_layout();

        let underflow = callback.underflow_hook();
        let stop = callback.stop_signal().clone();
        let mut callback = callback;

        let stream = device
            .build_output_stream_raw(
                &cpal_config,
                format,
                move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| {
                    let mut output = InterleavedOutput::new(data.bytes_mut(), &layout);
                    let frames = output.frame_count();
                    if let Err(err) = callback.on_output(&mut output, frames, frames) {
                        error!("Playback stopped: {}", err);
                    }
                    output.silence_remaining();
                },
                move |err| match err {
                    cpal::StreamError::DeviceNotAvailable => {
                        error!("Output device no longer available");
                        stop.raise_fault(FaultKind::Device);
                    }
                    other => {
                        debug!("Output stream error: {}", other);
                        underflow.notify();
                    }
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildFailed(e.to_string()))?;

        info!("Opened playback stream: {}", config);
        Ok(Self { stream, config })
    }

    pub fn start(&self) -> AudioResult<()> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;
        info!("Playback stream started");
        Ok(())
    }

    pub fn pause(&self) -> AudioResult<()> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamError(e.to_string()))
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}
