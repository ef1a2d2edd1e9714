//! Capture side of the transport bridge
//!
//! Drains the capture ring and publishes its contents to the room as audio
//! packets. Runs in the application domain: it may block on the network and
//! wait on timers, but it only ever touches the consumer half of the ring.

use tracing::{debug, error, info, warn};

use crate::audio::buffer::RingConsumer;
use crate::network::retry::should_retry;
use crate::network::{DataType, RetryPolicy, RoomTransport, TransportError};
use crate::pipeline::backoff::IdleBackoff;
use crate::pipeline::error::{BridgeError, BridgeResult};
use crate::stream::{FaultKind, StopSignal};

/// Moves captured bytes from the ring buffer to a room
pub struct CaptureBridge<T> {
    consumer: RingConsumer,
    transport: T,
    stop: StopSignal,
    backoff: IdleBackoff,
    retry: RetryPolicy,
    /// Reused outbound buffer, sized to the ring
    scratch: Vec<u8>,
    packets_sent: u64,
    bytes_sent: u64,
}

impl<T: RoomTransport> CaptureBridge<T> {
    pub fn new(consumer: RingConsumer, transport: T, stop: StopSignal) -> Self {
        let scratch = Vec::with_capacity(consumer.capacity());
        Self {
            consumer,
            transport,
            stop,
            backoff: IdleBackoff::default(),
            retry: RetryPolicy::default(),
            scratch,
            packets_sent: 0,
            bytes_sent: 0,
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

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Publish everything currently buffered as one audio payload
    ///
    /// The read index only advances once the send succeeded, and by exactly
    /// the bytes sent. Returns 0 when the ring was empty.
    ///
    /// # Errors
    /// `BridgeError::Send` when the transport fails after retries
    pub async fn drain_once(&mut self) -> BridgeResult<usize> {
        let fill = self.consumer.fill_count();
        if fill == 0 {
            return Ok(0);
        }

        self.scratch.clear();
        let copied = self.consumer.copy_to(fill, &mut self.scratch);

        self.send_with_retry().await?;

        self.consumer.advance_read(copied);
        self.packets_sent += 1;
        self.bytes_sent += copied as u64;
        Ok(copied)
    }

    /// Send the scratch buffer, retrying transient failures
    ///
    /// After a partial send only the unsent tail is retried, so no byte
    /// reaches the room twice.
    async fn send_with_retry(&mut self) -> BridgeResult<()> {
        let mut offset = 0;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self
                .transport
                .send(DataType::Audio, &self.scratch[offset..])
                .await
            {
                Ok(()) => return Ok(()),
                Err(TransportError::PartialSend { committed, source }) => {
                    offset = (offset + committed).min(self.scratch.len());
                    debug!(offset, "Partial audio send");
                    *source
                }
                Err(err) => err,
            };

            if !should_retry(&self.retry, &err, attempt) {
                return Err(BridgeError::Send(err));
            }
            let delay = self.retry.delay_for_retry(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Audio send failed: {}",
                err
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Drain until stopped or faulted
    ///
    /// A send failure raises a transport fault so the capture callback stops
    /// producing, then returns the error.
    pub async fn run(&mut self) -> BridgeResult<()> {
        info!("Capture bridge running as {}", self.transport.identity());
        let stop = self.stop.clone();

        loop {
            if let Some(kind) = stop.fault() {
                error!("Capture bridge stopping on fault: {}", kind);
                return Err(BridgeError::Fault(kind));
            }
            if stop.is_stopped() {
                break;
            }

            match self.drain_once().await {
                Ok(0) => {
                    tokio::select! {
                        _ = self.backoff.wait() => {}
                        _ = stop.stopped() => {}
                    }
                }
                Ok(sent) => {
                    debug!("Drained {} bytes", sent);
                    self.backoff.reset();
                }
                Err(err) => {
                    error!("Capture bridge failed: {}", err);
                    stop.raise_fault(FaultKind::Transport);
                    return Err(err);
                }
            }
        }

        info!(
            "Capture bridge stopped: {} packets, {} bytes sent",
            self.packets_sent, self.bytes_sent
        );
        Ok(())
    }
}
