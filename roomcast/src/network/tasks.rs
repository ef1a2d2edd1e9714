//! Background receive task for a room connection
//!
//! Reads server frames, opens sealed payloads with the sender's receive key
//! and forwards the plaintext into the bounded inbound queue.

use futures_util::StreamExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::network::connection::WsReader;
use crate::network::error::{TransportError, TransportResult};
use crate::network::keys::SharedKeys;
use crate::network::messages::ServerMessage;
use crate::network::packet::DataPacket;

/// Forward inbound data packets until the stream ends
///
/// Each opened payload is queued as packets of at most `max_payload` bytes.
/// Payloads from unkeyed peers or failing authentication are dropped. A
/// full queue drops the packet rather than stalling the socket. The task
/// ends cleanly on a close frame or when the queue's receiver is dropped,
/// and with an error on a socket or server error.
pub async fn receiver_task(
    mut ws_reader: WsReader,
    packet_tx: mpsc::Sender<DataPacket>,
    keys: SharedKeys,
    max_payload: usize,
) -> TransportResult<()> {
    info!("Receiver task started");

    let mut packet_count = 0u64;
    let mut dropped = 0u64;

    'frames: while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let server_msg = match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("Ignoring unparseable message: {}", e);
                        continue;
                    }
                };

                match server_msg {
                    ServerMessage::Error { message } => {
                        error!("Room server error: {}", message);
                        return Err(TransportError::ServerError(message));
                    }
                    ServerMessage::ParticipantJoined { identity } => {
                        info!("Participant joined: {}", identity);
                    }
                    ServerMessage::ParticipantLeft { identity } => {
                        info!("Participant left: {}", identity);
                    }
                    other => match other.into_packet() {
                        Ok(Some(sealed)) => {
                            let Some(packets) = keys.open_packet(&sealed, max_payload) else {
                                continue;
                            };
                            for packet in packets {
                                packet_count += 1;
                                match packet_tx.try_send(packet) {
                                    Ok(()) => {}
                                    Err(TrySendError::Full(_)) => {
                                        dropped += 1;
                                        if dropped.is_power_of_two() {
                                            warn!("Inbound queue full, {} packets dropped", dropped);
                                        }
                                    }
                                    Err(TrySendError::Closed(_)) => {
                                        debug!("Inbound queue closed");
                                        break 'frames;
                                    }
                                }
                            }
                        }
                        Ok(None) => debug!("Ignoring message with unknown data type"),
                        Err(e) => warn!("Dropping undecodable packet: {}", e),
                    },
                }
            }
            Ok(Message::Close(frame)) => {
                info!("Received close frame: {:?}", frame);
                break;
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled by the underlying library
                debug!("Received ping, length: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {}
            Ok(Message::Binary(data)) => {
                warn!("Received unexpected binary message: {} bytes", data.len());
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                error!("WebSocket error: {}", e);
                return Err(TransportError::WebSocketError(e));
            }
        }
    }

    info!(
        "Receiver task completed: {} packets received, {} dropped",
        packet_count, dropped
    );

    Ok(())
}
