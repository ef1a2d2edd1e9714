//! WebSocket client for a room server
//!
//! Joins a room over one WebSocket, publishes one sealed data frame per
//! payload and receives peer data through a background task.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::network::error::{TransportError, TransportResult};
use crate::network::keys::{RoomKey, SharedKeys};
use crate::network::messages::{ClientMessage, ServerMessage};
use crate::network::packet::{DataPacket, DataType};
use crate::network::room::{ConnectInfo, RoomTransport, DEFAULT_MAX_PAYLOAD, INBOUND_QUEUE_DEPTH};
use crate::network::tasks::receiver_task;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the WebSocket stream
pub type WsWriter = SplitSink<WsStream, Message>;

/// Read half of the WebSocket stream
pub type WsReader = SplitStream<WsStream>;

/// Client-side connection tuning
///
/// # Example
/// ```
/// use roomcast_lib::network::ClientOptions;
///
/// let options = ClientOptions::default().with_timeout(5000).with_max_payload(1024);
/// assert_eq!(options.timeout_ms, 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Connect and join timeout in milliseconds
    pub timeout_ms: u64,

    /// Largest payload of one received packet
    pub max_payload: usize,
}

impl ClientOptions {
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10000,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Build the WebSocket URL for joining `info.room_name`
///
/// # Errors
/// `TransportError::InvalidConfig` unless the host uses `ws://` or `wss://`
pub fn build_url(info: &ConnectInfo) -> TransportResult<String> {
    let host = info.host.trim_end_matches('/');
    if !(host.starts_with("ws://") || host.starts_with("wss://")) {
        return Err(TransportError::InvalidConfig(format!(
            "host must be a ws:// or wss:// URL: {}",
            info.host
        )));
    }

    Ok(format!(
        "{}/rtc?room={}&identity={}",
        host, info.room_name, info.identity
    ))
}

/// Room connection over WebSocket
///
/// # Example
/// ```no_run
/// use roomcast_lib::network::{ClientOptions, ConnectInfo, DataType, RoomClient, RoomKey, RoomTransport};
///
/// #[tokio::main]
/// async fn main() {
///     let info = ConnectInfo::new("ws://localhost:7880", "devkey", "secret", "test", "publisher");
///     let mut room = RoomClient::connect(&info, &ClientOptions::default())
///         .await
///         .unwrap();
///
///     room.set_transmit_key(RoomKey::zero()).unwrap();
///     room.send(DataType::Text, b"hello").await.unwrap();
///     room.disconnect().await.unwrap();
/// }
/// ```
pub struct RoomClient {
    identity: String,
    options: ClientOptions,
    writer: WsWriter,
    inbound: mpsc::Receiver<DataPacket>,
    keys: SharedKeys,
    receiver: JoinHandle<TransportResult<()>>,
    participants: Vec<String>,
    is_open: bool,
}

impl RoomClient {
    /// Connect to the room server and join `info.room_name`
    ///
    /// # Errors
    /// - `TransportError::AuthenticationFailed` if the server rejects the
    ///   credentials
    /// - `TransportError::Timeout` if connecting or joining takes longer
    ///   than `options.timeout_ms`
    /// - `TransportError::ServerError` if the server refuses the join
    pub async fn connect(info: &ConnectInfo, options: &ClientOptions) -> TransportResult<Self> {
        info.validate()?;
        if options.max_payload == 0 {
            return Err(TransportError::InvalidConfig(
                "max payload must be non-zero".to_string(),
            ));
        }

        let url = build_url(info)?;
        info!("Connecting to room server: {}", info.host);
        debug!("Connection URL: {}", url);

        let mut request = url.into_client_request()?;
        let credentials = STANDARD.encode(format!("{}:{}", info.api_key, info.api_secret));
        let auth = HeaderValue::from_str(&format!("Basic {}", credentials))
            .map_err(|e| TransportError::HttpError(e.to_string()))?;
        request.headers_mut().insert("Authorization", auth);

        let timeout = tokio::time::Duration::from_millis(options.timeout_ms);
        let (ws_stream, response) = tokio::time::timeout(timeout, connect_async(request))
            .await
            .map_err(|_| TransportError::Timeout(options.timeout_ms))?
            .map_err(|e| {
                if let tokio_tungstenite::tungstenite::Error::Http(resp) = &e {
                    if resp.status() == 401 {
                        return TransportError::AuthenticationFailed;
                    }
                }
                TransportError::ConnectionFailed(e.to_string())
            })?;

        debug!("Upgrade response status: {}", response.status());

        let (mut writer, mut reader) = ws_stream.split();
        send_message(&mut writer, &ClientMessage::join(&info.room_name, &info.identity)).await?;

        let participants = tokio::time::timeout(timeout, await_joined(&mut reader))
            .await
            .map_err(|_| TransportError::Timeout(options.timeout_ms))??;

        info!(
            "Joined room {} as {} ({} other participants)",
            info.room_name,
            info.identity,
            participants.len()
        );

        let keys = SharedKeys::new();
        let (packet_tx, inbound) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        let receiver = tokio::spawn(receiver_task(
            reader,
            packet_tx,
            keys.clone(),
            options.max_payload,
        ));

        Ok(Self {
            identity: info.identity.clone(),
            options: options.clone(),
            writer,
            inbound,
            keys,
            receiver,
            participants,
            is_open: true,
        })
    }

    /// Participants present when this client joined
    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}

async fn send_message(writer: &mut WsWriter, message: &ClientMessage) -> TransportResult<()> {
    let json = serde_json::to_string(message)?;
    writer.send(Message::Text(json.into())).await?;
    Ok(())
}

async fn await_joined(reader: &mut WsReader) -> TransportResult<Vec<String>> {
    while let Some(msg) = reader.next().await {
        match msg? {
            Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text)? {
                ServerMessage::Joined { participants, .. } => return Ok(participants),
                ServerMessage::Error { message } => return Err(TransportError::ServerError(message)),
                other => debug!("Ignoring message before join: {:?}", other),
            },
            Message::Close(_) => return Err(TransportError::ConnectionClosed),
            _ => {}
        }
    }
    Err(TransportError::ConnectionClosed)
}

#[async_trait]
impl RoomTransport for RoomClient {
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
        if !self.is_open {
            return Err(TransportError::ConnectionClosed);
        }
        if !self.keys.has_transmit_key() {
            return Err(TransportError::MissingTransmitKey);
        }
        if payload.is_empty() {
            return Ok(());
        }

        // One frame per payload, so a failed send published nothing
        let sealed = self.keys.seal(payload)?;
        send_message(&mut self.writer, &ClientMessage::data(data_type, &sealed)).await?;

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
        if !self.is_open {
            return Ok(());
        }
        self.is_open = false;

        info!("Leaving room");
        if let Err(e) = send_message(&mut self.writer, &ClientMessage::Leave).await {
            warn!("Failed to send leave message: {}", e);
        }
        self.receiver.abort();
        self.writer.close().await?;

        info!("Room connection closed");
        Ok(())
    }
}

impl Drop for RoomClient {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(host: &str) -> ConnectInfo {
        ConnectInfo::new(host, "devkey", "secret", "test", "publisher")
    }

    #[test]
    fn test_build_url() {
        let url = build_url(&info("ws://localhost:7880/")).unwrap();
        assert_eq!(url, "ws://localhost:7880/rtc?room=test&identity=publisher");
    }

    #[test]
    fn test_build_url_rejects_http() {
        assert!(matches!(
            build_url(&info("http://localhost:7880")),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_client_options_default() {
        let options = ClientOptions::default();
        assert_eq!(options.timeout_ms, 10000);
        assert_eq!(options.max_payload, 512);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Nothing listens on port 1
        let options = ClientOptions::default().with_timeout(2000);
        let result = RoomClient::connect(&info("ws://127.0.0.1:1"), &options).await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectionFailed(_)) | Err(TransportError::Timeout(_))
        ));
    }
}
