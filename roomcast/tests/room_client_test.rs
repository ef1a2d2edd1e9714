/// Integration tests for the WebSocket room client
///
/// A minimal relay runs on a local port: it answers the join, then echoes
/// every data frame back as if a peer called "publisher" had sent it. The
/// relay only ever sees sealed payloads.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use roomcast_lib::network::cipher::SEAL_OVERHEAD;
use roomcast_lib::network::messages::{ClientMessage, ServerMessage};
use roomcast_lib::network::{
    ClientOptions, ConnectInfo, DataType, RoomClient, RoomKey, RoomTransport, TransportError,
};

fn expected_auth() -> String {
    format!("Basic {}", STANDARD.encode("devkey:secret"))
}

fn check_auth(req: &Request, resp: Response) -> Result<Response, ErrorResponse> {
    let authorized = req
        .headers()
        .get("Authorization")
        .is_some_and(|value| value.to_str().ok() == Some(expected_auth().as_str()));
    if authorized {
        Ok(resp)
    } else {
        let mut err = ErrorResponse::new(Some("unauthorized".to_string()));
        *err.status_mut() = StatusCode::UNAUTHORIZED;
        Err(err)
    }
}

fn text(message: &ServerMessage) -> Message {
    Message::Text(serde_json::to_string(message).unwrap().into())
}

/// Serve exactly one client, then return the payloads of the data frames
/// it sent, as they appeared on the wire
async fn run_relay(listener: TcpListener) -> Vec<Vec<u8>> {
    let (stream, _) = listener.accept().await.unwrap();
    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, check_auth).await else {
        return Vec::new();
    };

    let mut data_frames = Vec::new();
    while let Some(Ok(msg)) = ws.next().await {
        let Message::Text(body) = msg else { continue };
        match serde_json::from_str::<ClientMessage>(&body).unwrap() {
            ClientMessage::Join { room, .. } => {
                let joined = ServerMessage::Joined {
                    room,
                    participants: vec!["publisher".to_string()],
                };
                ws.send(text(&joined)).await.unwrap();

                // Unkeyed peer; the client must drop this
                let stray = ServerMessage::data("stranger", 3, false, STANDARD.encode([9u8; 4]));
                ws.send(text(&stray)).await.unwrap();
            }
            ClientMessage::Data {
                data_type,
                reliable,
                payload,
            } => {
                data_frames.push(STANDARD.decode(&payload).unwrap());
                let echo = ServerMessage::data("publisher", data_type, reliable, payload);
                ws.send(text(&echo)).await.unwrap();
            }
            ClientMessage::Leave => break,
        }
    }
    data_frames
}

async fn start_relay() -> (String, tokio::task::JoinHandle<Vec<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = format!("ws://{}", listener.local_addr().unwrap());
    (host, tokio::spawn(run_relay(listener)))
}

#[tokio::test]
async fn test_join_send_receive_leave() {
    println!("\n=== Room Client Relay Test ===");

    let (host, relay) = start_relay().await;
    let info = ConnectInfo::new(&host, "devkey", "secret", "test", "subscriber");
    let options = ClientOptions::default().with_timeout(5000);

    let mut client = RoomClient::connect(&info, &options).await.unwrap();
    println!("Joined, participants: {:?}", client.participants());
    assert_eq!(client.participants(), ["publisher".to_string()]);

    client.set_transmit_key(RoomKey::zero()).unwrap();
    client.add_receive_key("publisher", RoomKey::zero()).unwrap();

    let payload: Vec<u8> = (0..600).map(|i| (i % 256) as u8).collect();
    client.send(DataType::Audio, &payload).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), client.receive())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), client.receive())
        .await
        .unwrap()
        .unwrap();

    println!("Received chunks: {} + {}", first.len(), second.len());
    assert_eq!(first.identity, "publisher");
    assert_eq!(first.data_type, DataType::Audio);
    assert_eq!(first.len(), 512);
    assert_eq!(second.len(), 88);
    assert_eq!([first.payload, second.payload].concat(), payload);

    client.disconnect().await.unwrap();
    assert!(!client.is_open());

    let frames = relay.await.unwrap();
    println!("Relay saw {} frame(s) of {} bytes", frames.len(), frames[0].len());
    assert_eq!(frames.len(), 1, "one sealed frame per payload");
    assert_eq!(frames[0].len(), payload.len() + SEAL_OVERHEAD);
    assert!(!frames[0].windows(16).any(|w| w == &payload[..16]));

    println!("\n✓ Join, sealed send, chunked key-gated receive and leave all work");
}

#[tokio::test]
async fn test_send_before_transmit_key_fails() {
    let (host, _relay) = start_relay().await;
    let info = ConnectInfo::new(&host, "devkey", "secret", "test", "publisher");

    let mut client = RoomClient::connect(&info, &ClientOptions::default()).await.unwrap();
    let err = client.send(DataType::Audio, &[1, 2, 3]).await.unwrap_err();
    assert!(matches!(err, TransportError::MissingTransmitKey));
    assert!(err.is_key_error());

    client.disconnect().await.unwrap();
    assert!(matches!(
        client.send(DataType::Audio, &[1]).await,
        Err(TransportError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_wrong_secret_is_authentication_failure() {
    let (host, _relay) = start_relay().await;
    let info = ConnectInfo::new(&host, "devkey", "wrong", "test", "publisher");

    let result = RoomClient::connect(&info, &ClientOptions::default()).await;
    assert!(matches!(result, Err(TransportError::AuthenticationFailed)));
}

#[tokio::test]
async fn test_wrong_receive_key_drops_echo() {
    println!("\n=== Room Client Key Mismatch Test ===");

    let (host, relay) = start_relay().await;
    let info = ConnectInfo::new(&host, "devkey", "secret", "test", "subscriber");
    let mut client = RoomClient::connect(&info, &ClientOptions::default()).await.unwrap();

    client
        .set_transmit_key(RoomKey::from_bytes(&[1; 32]).unwrap())
        .unwrap();
    client
        .add_receive_key("publisher", RoomKey::from_bytes(&[2; 32]).unwrap())
        .unwrap();
    client.send(DataType::Audio, &[7; 64]).await.unwrap();

    let received = tokio::time::timeout(Duration::from_millis(200), client.receive()).await;
    assert!(received.is_err(), "payload sealed under another key must be dropped");

    client.disconnect().await.unwrap();
    assert_eq!(relay.await.unwrap().len(), 1);

    println!("\n✓ Echo sealed under a different key never reached the client");
}
