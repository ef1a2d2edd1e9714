use async_trait::async_trait;

use crate::network::error::{TransportError, TransportResult};
use crate::network::keys::RoomKey;
use crate::network::packet::{DataPacket, DataType};

/// Default largest payload of one received packet
pub const DEFAULT_MAX_PAYLOAD: usize = 512;

/// Depth of the inbound packet queue; packets beyond it are dropped
pub const INBOUND_QUEUE_DEPTH: usize = 2048;

/// Where and as whom to join a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectInfo {
    /// Server URL, e.g. `ws://localhost:7880`
    pub host: String,
    pub api_key: String,
    pub api_secret: String,
    pub room_name: String,
    pub identity: String,
}

impl ConnectInfo {
    pub fn new(
        host: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        room_name: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            room_name: room_name.into(),
            identity: identity.into(),
        }
    }

    /// # Errors
    /// `TransportError::InvalidConfig` if any field is empty
    pub fn validate(&self) -> TransportResult<()> {
        let fields = [
            ("host", &self.host),
            ("room name", &self.room_name),
            ("identity", &self.identity),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(TransportError::InvalidConfig(format!("{} is empty", name)));
            }
        }
        Ok(())
    }
}

/// A joined room
///
/// `receive` must be cancel-safe: bridges race it against their stop signal.
#[async_trait]
pub trait RoomTransport: Send {
    /// Identity this participant joined as
    fn identity(&self) -> &str;

    /// Install the key outbound data is published with
    fn set_transmit_key(&mut self, key: RoomKey) -> TransportResult<()>;

    /// Accept data from `peer`
    fn add_receive_key(&mut self, peer: &str, key: RoomKey) -> TransportResult<()>;

    /// Stop accepting data from `peer`
    fn remove_receive_key(&mut self, peer: &str) -> TransportResult<()>;

    /// Seal `payload` with the transmit key and publish it
    ///
    /// Either the whole payload is published or none of it is. A transport
    /// that can fail midway reports `TransportError::PartialSend` with the
    /// number of payload bytes already published.
    ///
    /// # Errors
    /// `TransportError::MissingTransmitKey` before [`set_transmit_key`](Self::set_transmit_key).
    async fn send(&mut self, data_type: DataType, payload: &[u8]) -> TransportResult<()>;

    /// Wait for the next packet from a peer with a registered receive key
    ///
    /// Payloads arrive decrypted and split into packets of at most the
    /// receiver's maximum payload size. Packets that fail authentication
    /// are dropped.
    async fn receive(&mut self) -> TransportResult<DataPacket>;

    /// Leave the room
    async fn disconnect(&mut self) -> TransportResult<()>;
}

#[async_trait]
impl<'a, T: RoomTransport + ?Sized> RoomTransport for &'a mut T {
    fn identity(&self) -> &str {
        (**self).identity()
    }

    fn set_transmit_key(&mut self, key: RoomKey) -> TransportResult<()> {
        (**self).set_transmit_key(key)
    }

    fn add_receive_key(&mut self, peer: &str, key: RoomKey) -> TransportResult<()> {
        (**self).add_receive_key(peer, key)
    }

    fn remove_receive_key(&mut self, peer: &str) -> TransportResult<()> {
        (**self).remove_receive_key(peer)
    }

    async fn send(&mut self, data_type: DataType, payload: &[u8]) -> TransportResult<()> {
        (**self).send(data_type, payload).await
    }

    async fn receive(&mut self) -> TransportResult<DataPacket> {
        (**self).receive().await
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        (**self).disconnect().await
    }
}
