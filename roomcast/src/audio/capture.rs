//! Capture path: device input into the capture ring buffer

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream};
use tracing::{debug, error, info, warn};

use crate::audio::buffer::RingProducer;
use crate::audio::device::to_cpal_config;
use crate::audio::driver::{InputDriver, InputRegion, InterleavedInput};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::format::StreamConfig;
use crate::stream::{FaultKind, StopSignal, StreamCounters};

/// What one capture invocation did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Frames placed into the ring, holes included
    pub frames_written: usize,
    /// Frames written as silence because the driver had no data
    pub hole_frames: usize,
}

/// Real-time producer for the capture ring
///
/// Owns the ring's producer half. `on_input` does no allocation and takes
/// no locks; the only side effects are ring writes, counter increments and
/// raising the stop signal on overflow.
pub struct CaptureCallback {
    producer: RingProducer,
    config: StreamConfig,
    stop: StopSignal,
    counters: Arc<StreamCounters>,
}

impl CaptureCallback {
    pub fn new(
        producer: RingProducer,
        config: StreamConfig,
        stop: StopSignal,
        counters: Arc<StreamCounters>,
    ) -> Self {
        Self {
            producer,
            config,
            stop,
            counters,
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

    /// Free ring space in whole frames
    pub fn free_frames(&self) -> usize {
        self.config.bytes_to_frames(self.producer.free_count())
    }

    /// Handle one driver invocation offering between `frame_count_min` and
    /// `frame_count_max` frames
    ///
    /// # Errors
    /// - `AudioError::RingOverflow` if the ring cannot take `frame_count_min`
    ///   frames. The stop signal is raised with [`FaultKind::RingOverflow`].
    /// - Any driver transaction error, after raising [`FaultKind::Device`].
    pub fn on_input<D: InputDriver>(
        &mut self,
        driver: &mut D,
        frame_count_min: usize,
        frame_count_max: usize,
    ) -> AudioResult<CaptureOutcome> {
        if self.stop.is_stopped() {
            return Ok(CaptureOutcome::default());
        }

        let free_frames = self.free_frames();
        if free_frames < frame_count_min {
            self.stop.raise_fault(FaultKind::RingOverflow);
            return Err(AudioError::RingOverflow {
                requested: frame_count_min,
                free: free_frames,
            });
        }

        match self.transfer(driver, free_frames.min(frame_count_max)) {
            Ok(outcome) => {
                self.counters.add_frames(outcome.frames_written);
                Ok(outcome)
            }
            Err(err) => {
                self.stop.raise_fault(if err.is_overflow() {
                    FaultKind::RingOverflow
                } else {
                    FaultKind::Device
                });
                Err(err)
            }
        }
    }

    fn transfer<D: InputDriver>(
        &mut self,
        driver: &mut D,
        write_frames: usize,
    ) -> AudioResult<CaptureOutcome> {
        let bytes_per_frame = self.config.bytes_per_frame();
        let mut outcome = CaptureOutcome::default();
        let mut frames_left = write_frames;
        let mut grant = self.producer.write_grant();

        while frames_left > 0 {
            let region = driver.begin_read(frames_left)?;
            let frame_count = region.frame_count().min(frames_left);
            if frame_count == 0 {
                break;
            }

            match region {
                InputRegion::Hole { .. } => {
                    grant.put_silence(frame_count * bytes_per_frame)?;
                    outcome.hole_frames += frame_count;
                }
                InputRegion::Frames(view) => {
                    for frame in 0..frame_count {
                        for channel in 0..view.channel_count() {
                            grant.put(view.sample(frame, channel))?;
                        }
                    }
                }
            }

            driver.end_read()?;
            frames_left -= frame_count;
            outcome.frames_written += frame_count;
        }

        grant.commit();
        Ok(outcome)
    }

    /// Handle for the device-level overflow hook
    pub fn overflow_hook(&self) -> OverflowHook {
        OverflowHook {
            counters: Arc::clone(&self.counters),
        }
    }
}

/// Counts overflows the driver reports at the device level
///
/// Observational only; the stream keeps running.
#[derive(Clone)]
pub struct OverflowHook {
    counters: Arc<StreamCounters>,
}

impl OverflowHook {
    pub fn notify(&self) -> u64 {
        let count = self.counters.record_device_overflow();
        warn!("Device overflow {}", count);
        count
    }
}

/// A running cpal input stream feeding a [`CaptureCallback`]
pub struct CaptureStream {
    stream: Stream,
    config: StreamConfig,
}

impl CaptureStream {
    /// Build the input stream without starting it
    ///
    /// # Errors
    /// - `AudioError::UnsupportedFormat` if cpal cannot open the negotiated
    ///   sample format
    /// - `AudioError::StreamBuildFailed` if the device rejects the stream
    pub fn open(device: &Device, callback: CaptureCallback) -> AudioResult<Self> {
        let config = *callback.config();
        let format = config
            .sample_format()
            .to_cpal()
            .ok_or(AudioError::UnsupportedFormat(config.sample_format()))?;
        let cpal_config = to_cpal_config(&config);
        let layout = config.interleaved_layout();

        let overflow = callback.overflow_hook();
        let stop = callback.stop_signal().clone();
        let mut callback = callback;

        let stream = device
            .build_input_stream_raw(
                &cpal_config,
                format,
                move |data: &cpal::Data, _: &cpal::InputCallbackInfo| {
                    let mut input = InterleavedInput::new(data.bytes(), &layout);
                    let frames = input.frame_count();
                    if let Err(err) = callback.on_input(&mut input, frames, frames) {
                        error!("Capture stopped: {}", err);
                    }
                },
                move |err| match err {
                    cpal::StreamError::DeviceNotAvailable => {
                        error!("Input device no longer available");
                        stop.raise_fault(FaultKind::Device);
                    }
                    other => {
                        debug!("Input stream error: {}", other);
                        overflow.notify();
                    }
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildFailed(e.to_string()))?;

        info!("Opened capture stream: {}", config);
        Ok(Self { stream, config })
    }

    pub fn start(&self) -> AudioResult<()> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;
        info!("Capture stream started");
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
