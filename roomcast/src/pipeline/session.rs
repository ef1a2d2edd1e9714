//! Publisher and subscriber sessions
//!
//! A session owns one audio stream end to end: it picks and negotiates the
//! device, builds the ring buffer, opens the cpal stream with its real-time
//! callback and runs the matching transport bridge until it stops.
//!
//! # Workflow
//!
//! ```text
//! 1. Select host and device, probe, negotiate
//!    └── State: Uninitialized -> Negotiated
//!
//! 2. Build the ring and callback, open the device stream
//!    └── State: Negotiated -> Opened
//!
//! 3. Start the device stream
//!    └── State: Opened -> Started
//!
//! 4. Run the transport bridge
//!    └── State: Started -> Streaming
//!
//! 5. Stop signal, or a fatal error anywhere above
//!    └── State: -> Stopped | Faulted
//!    └── Room disconnected
//! ```
//!
//! The cpal stream handle is not `Send` on every platform, so `run` must be
//! awaited on the task that created the session rather than spawned.

use std::sync::Arc;

use cpal::Device;
use tracing::{error, info, warn};

use crate::audio::buffer::RingBuffer;
use crate::audio::capture::{CaptureCallback, CaptureStream};
use crate::audio::device::{self, Direction};
use crate::audio::format::StreamConfig;
use crate::audio::playback::{PlaybackCallback, PlaybackStream};
use crate::config::{AudioConfig, BridgeConfig, RoomConfig};
use crate::network::{
    retry_transport, ClientOptions, ConnectInfo, RetryPolicy, RoomClient, RoomTransport,
    TransportError,
};
use crate::pipeline::backoff::IdleBackoff;
use crate::pipeline::capture_bridge::CaptureBridge;
use crate::pipeline::error::{BridgeError, BridgeResult};
use crate::pipeline::playback_bridge::PlaybackBridge;
use crate::stream::{StopSignal, StreamCounters, StreamState, StreamStateManager, StreamStats};

/// Shared view of a running session
///
/// Cheap to clone and `Send`, so a signal handler can hold one while the
/// session runs on the main task.
#[derive(Clone)]
pub struct SessionHandle {
    stop: StopSignal,
    state: Arc<StreamStateManager>,
    counters: Arc<StreamCounters>,
}

impl SessionHandle {
    fn new(label: &'static str) -> Self {
        Self {
            stop: StopSignal::new(),
            state: Arc::new(StreamStateManager::new(label)),
            counters: Arc::new(StreamCounters::new()),
        }
    }

    /// Ask the session to shut down
    pub fn stop(&self) {
        info!(stream = self.state.label(), "Stop requested");
        self.stop.stop();
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn state(&self) -> Arc<StreamState> {
        self.state.current()
    }

    pub fn state_manager(&self) -> &Arc<StreamStateManager> {
        &self.state
    }

    pub fn stats(&self) -> StreamStats {
        self.counters.snapshot()
    }

    fn finish(&self, result: &BridgeResult<()>) {
        match result {
            Ok(()) => {
                self.state.stop();
            }
            Err(err) => {
                error!(stream = self.state.label(), "Session failed: {}", err);
                self.state.fault(err.to_string());
            }
        }
        // Idle the real-time callback before the stream is torn down
        self.stop.stop();

        let stats = self.stats();
        info!(
            stream = self.state.label(),
            device_overflows = stats.device_overflows,
            ring_underflows = stats.ring_underflows,
            underflow_recoveries = stats.underflow_recoveries,
            frames = stats.frames_transferred,
            "Session finished"
        );
    }
}

/// Open the configured device for `direction` and negotiate its stream
fn open_device(audio: &AudioConfig, direction: Direction) -> BridgeResult<(Device, StreamConfig)> {
    let host = device::host_for_backend(audio.backend.as_deref())?;
    info!("Audio backend: {}", host.id().name());

    let device = device::select_device(&host, direction, audio.device_id.as_deref(), audio.raw)?;
    let caps = device::probe(&device, direction);
    let config = audio.negotiator().negotiate(&caps)?;
    Ok((device, config))
}

fn idle_backoff(bridge: &BridgeConfig) -> IdleBackoff {
    IdleBackoff::from_millis(bridge.idle_backoff_min_ms, bridge.idle_backoff_max_ms)
}

/// Captures from an input device and publishes to a room
pub struct Publisher {
    audio: AudioConfig,
    bridge: BridgeConfig,
    handle: SessionHandle,
}

impl Publisher {
    pub fn new(audio: AudioConfig, bridge: BridgeConfig) -> Self {
        Self {
            audio,
            bridge,
            handle: SessionHandle::new("capture"),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stream until stopped or faulted, then disconnect from the room
    ///
    /// Returns the stream counters on an orderly stop.
    pub async fn run<T: RoomTransport>(&self, mut transport: T) -> BridgeResult<StreamStats> {
        let result = self.stream(&mut transport).await;
        self.handle.finish(&result);

        if let Err(e) = transport.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
        result.map(|()| self.handle.stats())
    }

    async fn stream<T: RoomTransport>(&self, transport: &mut T) -> BridgeResult<()> {
        let handle = &self.handle;

        let (device, config) = open_device(&self.audio, Direction::Input)?;
        handle.state.transition(StreamState::Negotiated)?;

        let (producer, consumer) = RingBuffer::for_stream(&config, self.audio.capture_buffer());
        info!("Capture ring: {} bytes", producer.capacity());

        let callback = CaptureCallback::new(
            producer,
            config,
            handle.stop.clone(),
            Arc::clone(&handle.counters),
        );
        let stream = CaptureStream::open(&device, callback)?;
        handle.state.transition(StreamState::Opened)?;

        stream.start()?;
        handle.state.transition(StreamState::Started)?;

        let mut bridge = CaptureBridge::new(consumer, transport, handle.stop.clone())
            .with_backoff(idle_backoff(&self.bridge))
            .with_retry(self.bridge.retry.clone());
        handle.state.transition(StreamState::Streaming)?;

        let result = bridge.run().await;
        if let Err(e) = stream.pause() {
            warn!("Failed to pause capture stream: {}", e);
        }
        result
    }
}

/// Receives from a room and plays on an output device
pub struct Subscriber {
    audio: AudioConfig,
    bridge: BridgeConfig,
    handle: SessionHandle,
}

impl Subscriber {
    pub fn new(audio: AudioConfig, bridge: BridgeConfig) -> Self {
        Self {
            audio,
            bridge,
            handle: SessionHandle::new("playback"),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stream until stopped or faulted, then disconnect from the room
    pub async fn run<T: RoomTransport>(&self, mut transport: T) -> BridgeResult<StreamStats> {
        let result = self.stream(&mut transport).await;
        self.handle.finish(&result);

        if let Err(e) = transport.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
        result.map(|()| self.handle.stats())
    }

    async fn stream<T: RoomTransport>(&self, transport: &mut T) -> BridgeResult<()> {
        let handle = &self.handle;

        let (device, config) = open_device(&self.audio, Direction::Output)?;
        handle.state.transition(StreamState::Negotiated)?;

        let (producer, consumer) = RingBuffer::for_stream(&config, self.audio.playback_buffer());
        info!("Playback ring: {} bytes", producer.capacity());

        let callback = PlaybackCallback::new(
            consumer,
            config,
            handle.stop.clone(),
            Arc::clone(&handle.counters),
        );

        let high_water = config.duration_to_bytes(self.audio.playback_high_water());
        let mut bridge = PlaybackBridge::new(producer, transport, handle.stop.clone(), high_water)
            .with_backoff(idle_backoff(&self.bridge))
            .with_retry(self.bridge.retry.clone())
            .with_cushion(callback.cushion());
        bridge.prefill(config.duration_to_bytes(self.audio.playback_prefill()))?;

        let stream = PlaybackStream::open(&device, callback)?;
        handle.state.transition(StreamState::Opened)?;

        stream.start()?;
        handle.state.transition(StreamState::Started)?;
        handle.state.transition(StreamState::Streaming)?;

        let result = bridge.run().await;
        if let Err(e) = stream.pause() {
            warn!("Failed to pause playback stream: {}", e);
        }
        result
    }
}

/// Join a room server, retrying transient failures
///
/// # Errors
/// `BridgeError::Connect` once retries are exhausted or on a permanent error
pub async fn connect_room(
    info: &ConnectInfo,
    options: &ClientOptions,
    policy: &RetryPolicy,
) -> BridgeResult<RoomClient> {
    retry_transport("connect", policy, || RoomClient::connect(info, options))
        .await
        .map_err(BridgeError::Connect)
}

/// Install the publisher's transmit key
pub fn install_transmit_key<T: RoomTransport + ?Sized>(
    transport: &mut T,
    room: &RoomConfig,
) -> BridgeResult<()> {
    let key = room
        .transmit_key()
        .map_err(|e| BridgeError::KeySetup(TransportError::InvalidKey(e.to_string())))?;
    transport.set_transmit_key(key).map_err(BridgeError::KeySetup)?;
    info!("Transmit key installed");
    Ok(())
}

/// Install the subscriber's receive key for the configured peer
pub fn install_receive_key<T: RoomTransport + ?Sized>(
    transport: &mut T,
    room: &RoomConfig,
) -> BridgeResult<()> {
    let key = room
        .receive_key()
        .map_err(|e| BridgeError::KeySetup(TransportError::InvalidKey(e.to_string())))?;
    transport
        .add_receive_key(&room.peer_identity, key)
        .map_err(BridgeError::KeySetup)?;
    info!("Receive key installed for {}", room.peer_identity);
    Ok(())
}
