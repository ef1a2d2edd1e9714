//! Playback side of the transport bridge
//!
//! Pulls audio packets from the room into the playback ring while the ring
//! plus any silence owed by underflow recovery holds less than the
//! high-water mark.

use tracing::{debug, error, info, warn};

use crate::audio::buffer::RingProducer;
use crate::audio::SilenceCushion;
use crate::network::retry::should_retry;
use crate::network::{DataPacket, RetryPolicy, RoomTransport};
use crate::pipeline::backoff::IdleBackoff;
use crate::pipeline::error::{BridgeError, BridgeResult};
use crate::stream::{FaultKind, StopSignal};

/// Result of one [`PlaybackBridge::pump_once`] step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// The ring is at or above the high-water mark; nothing was received
    Full,
    /// The stop signal fired while waiting for a packet
    Stopped,
    /// A packet arrived that carries no audio
    Skipped,
    /// Audio bytes were written into the ring
    Wrote(usize),
}

/// Moves received audio from a room into the playback ring
pub struct PlaybackBridge<T> {
    producer: RingProducer,
    transport: T,
    stop: StopSignal,
    high_water: usize,
    cushion: SilenceCushion,
    backoff: IdleBackoff,
    retry: RetryPolicy,
    packets_received: u64,
    bytes_received: u64,
}

impl<T: RoomTransport> PlaybackBridge<T> {
    /// `high_water` is the fill level in bytes above which the bridge stops
    /// pulling packets
    pub fn new(producer: RingProducer, transport: T, stop: StopSignal, high_water: usize) -> Self {
        Self {
            producer,
            transport,
            stop,
            high_water,
            cushion: SilenceCushion::new(),
            backoff: IdleBackoff::default(),
            retry: RetryPolicy::default(),
            packets_received: 0,
            bytes_received: 0,
        }
    }

    pub fn with_backoff(mut self, backoff: IdleBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Count silence owed by the playback callback toward the high-water mark
    pub fn with_cushion(mut self, cushion: SilenceCushion) -> Self {
        self.cushion = cushion;
        self
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Buffered bytes plus owed silence
    pub fn fill_count(&self) -> usize {
        self.producer.fill_count() + self.cushion.owed()
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Write `len` bytes of silence ahead of any received audio
    ///
    /// # Errors
    /// `AudioError::RingFull` if `len` exceeds the free space
    pub fn prefill(&mut self, len: usize) -> BridgeResult<()> {
        self.producer.push_silence(len)?;
        debug!("Prefilled playback ring with {} bytes of silence", len);
        Ok(())
    }

    /// Receive at most one packet and buffer its audio
    ///
    /// # Errors
    /// - `BridgeError::Receive` when the transport fails after retries
    /// - `BridgeError::Audio` when the payload does not fit in the ring
    pub async fn pump_once(&mut self) -> BridgeResult<PumpOutcome> {
        if self.fill_count() >= self.high_water {
            return Ok(PumpOutcome::Full);
        }

        let stop = self.stop.clone();
        let packet = tokio::select! {
            received = self.receive_with_retry() => received?,
            _ = stop.stopped() => return Ok(PumpOutcome::Stopped),
        };

        if !packet.is_audio() || packet.is_empty() {
            debug!("Skipping {} packet from {}", packet.data_type, packet.identity);
            return Ok(PumpOutcome::Skipped);
        }

        self.producer.push_slice(&packet.payload)?;
        self.packets_received += 1;
        self.bytes_received += packet.len() as u64;
        Ok(PumpOutcome::Wrote(packet.len()))
    }

    async fn receive_with_retry(&mut self) -> BridgeResult<DataPacket> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.receive().await {
                Ok(packet) => return Ok(packet),
                Err(err) if should_retry(&self.retry, &err, attempt) => {
                    let delay = self.retry.delay_for_retry(attempt);
                    warn!(attempt, "Audio receive failed: {}", err);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(BridgeError::Receive(err)),
            }
        }
    }

    /// Pump until stopped or faulted
    pub async fn run(&mut self) -> BridgeResult<()> {
        info!("Playback bridge running as {}", self.transport.identity());
        let stop = self.stop.clone();

        loop {
            if let Some(kind) = stop.fault() {
                error!("Playback bridge stopping on fault: {}", kind);
                return Err(BridgeError::Fault(kind));
            }
            if stop.is_stopped() {
                break;
            }

            match self.pump_once().await {
                Ok(PumpOutcome::Full) => {
                    tokio::select! {
                        _ = self.backoff.wait() => {}
                        _ = stop.stopped() => {}
                    }
                }
                Ok(PumpOutcome::Wrote(_)) => self.backoff.reset(),
                Ok(PumpOutcome::Skipped) | Ok(PumpOutcome::Stopped) => {}
                Err(err) => {
                    error!("Playback bridge failed: {}", err);
                    let kind = match &err {
                        BridgeError::Audio(_) => FaultKind::RingOverflow,
                        _ => FaultKind::Transport,
                    };
                    stop.raise_fault(kind);
                    return Err(err);
                }
            }
        }

        info!(
            "Playback bridge stopped: {} packets, {} bytes received",
            self.packets_received, self.bytes_received
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::audio::buffer::RingBuffer;
    use crate::audio::format::{SampleFormat, StreamConfig};
    use crate::audio::{AudioError, PlaybackCallback};
    use crate::stream::StreamCounters;
    use crate::network::{ConnectInfo, DataType, LoopbackHub, LoopbackRoom, RoomKey};

    fn pair(hub: &LoopbackHub) -> (LoopbackRoom, LoopbackRoom) {
        let mut publisher = hub
            .connect(&ConnectInfo::new("loopback", "", "", "test", "publisher"))
            .unwrap();
        let mut subscriber = hub
            .connect(&ConnectInfo::new("loopback", "", "", "test", "subscriber"))
            .unwrap();
        publisher.set_transmit_key(RoomKey::zero()).unwrap();
        subscriber.add_receive_key("publisher", RoomKey::zero()).unwrap();
        (publisher, subscriber)
    }

    #[tokio::test]
    async fn test_pump_writes_audio() {
        let hub = LoopbackHub::new();
        let (mut publisher, subscriber) = pair(&hub);
        let (producer, mut consumer) = RingBuffer::new(64);
        let mut bridge = PlaybackBridge::new(producer, subscriber, StopSignal::new(), 32);

        publisher.send(DataType::Audio, &[9, 8, 7]).await.unwrap();
        assert_eq!(bridge.pump_once().await.unwrap(), PumpOutcome::Wrote(3));

        let mut out = [0u8; 3];
        consumer.pop_into(&mut out);
        assert_eq!(out, [9, 8, 7]);
    }

    #[tokio::test]
    async fn test_non_audio_packets_skipped() {
        let hub = LoopbackHub::new();
        let (mut publisher, subscriber) = pair(&hub);
        let (producer, _consumer) = RingBuffer::new(64);
        let mut bridge = PlaybackBridge::new(producer, subscriber, StopSignal::new(), 32);

        publisher.send(DataType::Text, b"hello").await.unwrap();
        assert_eq!(bridge.pump_once().await.unwrap(), PumpOutcome::Skipped);
        assert_eq!(bridge.fill_count(), 0);
    }

    #[tokio::test]
    async fn test_high_water_stops_pulling() {
        let hub = LoopbackHub::new();
        let (_publisher, subscriber) = pair(&hub);
        let (producer, _consumer) = RingBuffer::new(64);
        let mut bridge = PlaybackBridge::new(producer, subscriber, StopSignal::new(), 16);

        bridge.prefill(16).unwrap();
        assert_eq!(bridge.pump_once().await.unwrap(), PumpOutcome::Full);
    }

    #[tokio::test]
    async fn test_owed_silence_counts_toward_high_water() {
        let hub = LoopbackHub::new();
        let (mut publisher, subscriber) = pair(&hub);
        let (producer, consumer) = RingBuffer::new(64);

        // 8 bit mono at 8 Hz: recovery owes 8 bytes of silence
        let config = StreamConfig::new(SampleFormat::U8, 8, 1);
        let mut callback = PlaybackCallback::new(
            consumer,
            config,
            StopSignal::new(),
            Arc::new(StreamCounters::new()),
        );
        let mut bridge = PlaybackBridge::new(producer, subscriber, StopSignal::new(), 8)
            .with_cushion(callback.cushion());

        callback.recover_underflow();
        assert_eq!(bridge.fill_count(), 8);

        publisher.send(DataType::Audio, &[1, 2]).await.unwrap();
        assert_eq!(bridge.pump_once().await.unwrap(), PumpOutcome::Full);
        assert_eq!(bridge.bytes_received(), 0);
    }

    #[tokio::test]
    async fn test_stop_interrupts_receive() {
        let hub = LoopbackHub::new();
        let (_publisher, subscriber) = pair(&hub);
        let (producer, _consumer) = RingBuffer::new(64);
        let stop = StopSignal::new();
        let mut bridge = PlaybackBridge::new(producer, subscriber, stop.clone(), 32);

        let stopper = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            stopper.stop();
        });

        assert_eq!(bridge.pump_once().await.unwrap(), PumpOutcome::Stopped);
    }

    #[tokio::test]
    async fn test_payload_larger_than_free_space_is_fatal() {
        let hub = LoopbackHub::new();
        let (mut publisher, subscriber) = pair(&hub);
        let (producer, _consumer) = RingBuffer::new(4);
        let stop = StopSignal::new();
        let mut bridge = PlaybackBridge::new(producer, subscriber, stop.clone(), 4);

        publisher.send(DataType::Audio, &[1; 8]).await.unwrap();
        let err = bridge.run().await.unwrap_err();

        assert!(matches!(err, BridgeError::Audio(AudioError::RingFull { .. })));
        assert_eq!(stop.fault(), Some(FaultKind::RingOverflow));
    }
}
