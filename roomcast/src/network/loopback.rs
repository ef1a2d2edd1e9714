//! In-process room hub
//!
//! Participants joined through the same [`LoopbackHub`] exchange packets
//! directly through their inbound queues, with the same sealing, key
//! gating, chunking and drop-when-full behaviour as a server-backed room.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::network::error::{TransportError, TransportResult};
use crate::network::keys::{RoomKey, SharedKeys};
use crate::network::packet::{DataPacket, DataType};
use crate::network::room::{ConnectInfo, RoomTransport, DEFAULT_MAX_PAYLOAD, INBOUND_QUEUE_DEPTH};

struct Member {
    identity: String,
    keys: SharedKeys,
    inbound: mpsc::Sender<DataPacket>,
    max_payload: usize,
}

type Rooms = HashMap<String, Vec<Member>>;

/// Registry of in-process rooms
///
/// # Example
/// ```
/// use roomcast_lib::network::{ConnectInfo, DataType, LoopbackHub, RoomKey, RoomTransport};
///
/// # #[tokio::main]
/// # async fn main() {
/// let hub = LoopbackHub::new();
/// let mut alice = hub.connect(&ConnectInfo::new("loopback", "", "", "test", "alice")).unwrap();
/// let mut bob = hub.connect(&ConnectInfo::new("loopback", "", "", "test", "bob")).unwrap();
///
/// alice.set_transmit_key(RoomKey::zero()).unwrap();
/// bob.add_receive_key("alice", RoomKey::zero()).unwrap();
///
/// alice.send(DataType::Text, b"hi").await.unwrap();
/// let packet = bob.receive().await.unwrap();
/// assert_eq!(packet.payload, b"hi");
/// # }
/// ```
#[derive(Clone, Default)]
pub struct LoopbackHub {
    rooms: Arc<Mutex<Rooms>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, Rooms> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join `info.room_name` as `info.identity`
    ///
    /// # Errors
    /// `TransportError::ConnectionFailed` if the identity is already present
    pub fn connect(&self, info: &ConnectInfo) -> TransportResult<LoopbackRoom> {
        info.validate()?;

        let keys = SharedKeys::new();
        let (tx, inbound) = mpsc::channel(INBOUND_QUEUE_DEPTH);

        {
            let mut rooms = self.rooms();
            let members = rooms.entry(info.room_name.clone()).or_default();
            if members.iter().any(|m| m.identity == info.identity) {
                return Err(TransportError::ConnectionFailed(format!(
                    "identity {} already joined room {}",
                    info.identity, info.room_name
                )));
            }
            members.push(Member {
                identity: info.identity.clone(),
                keys: keys.clone(),
                inbound: tx,
                max_payload: DEFAULT_MAX_PAYLOAD,
            });
        }

        info!("Joined loopback room {} as {}", info.room_name, info.identity);
        Ok(LoopbackRoom {
            hub: self.clone(),
            room: info.room_name.clone(),
            identity: info.identity.clone(),
            keys,
            inbound,
            connected: true,
        })
    }

    /// Identities currently in `room`
    pub fn participants(&self, room: &str) -> Vec<String> {
        self.rooms()
            .get(room)
            .map(|members| members.iter().map(|m| m.identity.clone()).collect())
            .unwrap_or_default()
    }

    fn set_max_payload(&self, room: &str, identity: &str, max_payload: usize) {
        if let Some(member) = self
            .rooms()
            .get_mut(room)
            .and_then(|members| members.iter_mut().find(|m| m.identity == identity))
        {
            member.max_payload = max_payload;
        }
    }

    /// Open `sealed` for every other member holding a key for its sender
    /// and queue the resulting packets; returns how many were queued
    fn deliver(&self, room: &str, sealed: &DataPacket) -> usize {
        let rooms = self.rooms();
        let Some(members) = rooms.get(room) else {
            return 0;
        };

        let mut delivered = 0;
        for member in members.iter().filter(|m| m.identity != sealed.identity) {
            let Some(packets) = member.keys.open_packet(sealed, member.max_payload) else {
                continue;
            };
            for packet in packets {
                match member.inbound.try_send(packet) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        debug!("Inbound queue of {} full, dropping packet", member.identity);
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
        }
        delivered
    }

    fn leave(&self, room: &str, identity: &str) {
        let mut rooms = self.rooms();
        if let Some(members) = rooms.get_mut(room) {
            members.retain(|m| m.identity != identity);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }
}

/// One participant's handle on a loopback room
pub struct LoopbackRoom {
    hub: LoopbackHub,
    room: String,
    identity: String,
    keys: SharedKeys,
    inbound: mpsc::Receiver<DataPacket>,
    connected: bool,
}

impl LoopbackRoom {
    /// Largest payload of one packet this participant receives
    pub fn with_max_payload(self, max_payload: usize) -> Self {
        self.hub.set_max_payload(&self.room, &self.identity, max_payload.max(1));
        self
    }

    pub fn room_name(&self) -> &str {
        &self.room
    }
}

#[async_trait]
impl RoomTransport for LoopbackRoom {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn set_transmit_key(&mut self, key: RoomKey) -> TransportResult<()> {
        self.keys.set_transmit(key);
        Ok(())
    }

    fn add_receive_key(&mut self, peer: &str, key: RoomKey) -> TransportResult<()> {
        self.keys.add_receive(peer, key);
        Ok(())
    }

    fn remove_receive_key(&mut self, peer: &str) -> TransportResult<()> {
        self.keys.remove_receive(peer);
        Ok(())
    }

    async fn send(&mut self, data_type: DataType, payload: &[u8]) -> TransportResult<()> {
        if !self.connected {
            return Err(TransportError::ConnectionClosed);
        }
        if !self.keys.has_transmit_key() {
            return Err(TransportError::MissingTransmitKey);
        }
        if payload.is_empty() {
            return Ok(());
        }

        let sealed = DataPacket::new(self.identity.clone(), data_type, self.keys.seal(payload)?);
        self.hub.deliver(&self.room, &sealed);

        debug!("WRITE {} {}", data_type, payload.len());
        Ok(())
    }

    async fn receive(&mut self) -> TransportResult<DataPacket> {
        let packet = self
            .inbound
            .recv()
            .await
            .ok_or(TransportError::ConnectionClosed)?;
        debug!("READ {} - {}", packet.data_type, packet.len());
        Ok(packet)
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        if self.connected {
            self.connected = false;
            self.hub.leave(&self.room, &self.identity);
            info!("Left loopback room {}", self.room);
        }
        Ok(())
    }
}

impl Drop for LoopbackRoom {
    fn drop(&mut self) {
        if self.connected {
            warn!("Loopback room {} dropped without disconnect", self.room);
            self.hub.leave(&self.room, &self.identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(hub: &LoopbackHub, identity: &str) -> LoopbackRoom {
        hub.connect(&ConnectInfo::new("loopback", "devkey", "secret", "test", identity))
            .unwrap()
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let hub = LoopbackHub::new();
        let _first = join(&hub, "publisher");
        let second = hub.connect(&ConnectInfo::new("loopback", "", "", "test", "publisher"));
        assert!(matches!(second, Err(TransportError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_send_requires_transmit_key() {
        let hub = LoopbackHub::new();
        let mut room = join(&hub, "publisher");

        let err = room.send(DataType::Audio, &[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, TransportError::MissingTransmitKey));
        room.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_sender_does_not_receive_own_packets() {
        let hub = LoopbackHub::new();
        let mut publisher = join(&hub, "publisher");
        publisher.set_transmit_key(RoomKey::zero()).unwrap();
        publisher.add_receive_key("publisher", RoomKey::zero()).unwrap();

        publisher.send(DataType::Audio, &[1]).await.unwrap();
        assert!(publisher.inbound.try_recv().is_err());
        publisher.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_leaves_room() {
        let hub = LoopbackHub::new();
        let mut publisher = join(&hub, "publisher");
        let mut subscriber = join(&hub, "subscriber");
        assert_eq!(hub.participants("test").len(), 2);

        publisher.disconnect().await.unwrap();
        assert_eq!(hub.participants("test"), vec!["subscriber".to_string()]);

        subscriber.disconnect().await.unwrap();
        assert!(hub.participants("test").is_empty());
        assert!(matches!(
            subscriber.receive().await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_receiver_chunks_opened_payload() {
        let hub = LoopbackHub::new();
        let mut publisher = join(&hub, "publisher");
        let mut subscriber = join(&hub, "subscriber").with_max_payload(4);
        publisher.set_transmit_key(RoomKey::zero()).unwrap();
        subscriber.add_receive_key("publisher", RoomKey::zero()).unwrap();

        publisher.send(DataType::Audio, &[1, 2, 3, 4, 5, 6]).await.unwrap();
        assert_eq!(subscriber.receive().await.unwrap().payload, vec![1, 2, 3, 4]);
        assert_eq!(subscriber.receive().await.unwrap().payload, vec![5, 6]);

        publisher.disconnect().await.unwrap();
        subscriber.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_mismatched_receive_key_drops_packets() {
        let hub = LoopbackHub::new();
        let mut publisher = join(&hub, "publisher");
        let mut subscriber = join(&hub, "subscriber");
        publisher
            .set_transmit_key(RoomKey::from_bytes(&[1; 32]).unwrap())
            .unwrap();
        subscriber
            .add_receive_key("publisher", RoomKey::from_bytes(&[2; 32]).unwrap())
            .unwrap();

        publisher.send(DataType::Audio, &[1, 2, 3]).await.unwrap();
        assert!(subscriber.inbound.try_recv().is_err());

        publisher.disconnect().await.unwrap();
        subscriber.disconnect().await.unwrap();
    }
}
