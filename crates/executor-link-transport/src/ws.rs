//! WebSocket implementation of the transport traits.
//!
//! One JSON message per text frame, capped at the configured maximum size;
//! oversized inbound frames are rejected by tungstenite before the session's
//! reader ever sees them.

use async_trait::async_trait;
use executor_link_auth::Credentials;
use executor_link_core::config::KeepaliveConfig;
use executor_link_core::transport::{
    CLOSE_NO_STATUS, Frame, TransportError, TransportReader, TransportWriter,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::{Error as WsError, Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dial the control plane and split the socket into transport halves.
///
/// Credentials, when present, travel as a `Cookie` header on the handshake
/// request.
///
/// # Errors
/// `TransportError::Handshake` if the URL is invalid or the WebSocket
/// handshake fails.
pub async fn connect(
    url: &str,
    credentials: &Credentials,
    config: &KeepaliveConfig,
) -> Result<(WsReader, WsWriter), TransportError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    if let Some(cookie) = credentials.cookie_header() {
        let value = cookie.parse().map_err(|_| {
            TransportError::Handshake("credential cookie is not a valid header value".to_string())
        })?;
        request.headers_mut().insert(COOKIE, value);
    }

    let ws_config = WebSocketConfig::default()
        .max_message_size(Some(config.max_message_size))
        .max_frame_size(Some(config.max_message_size));
    let (stream, _response) = connect_async_with_config(request, Some(ws_config), false)
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    debug!(url, "websocket handshake complete");

    let (sink, stream) = stream.split();
    Ok((WsReader { stream }, WsWriter { sink }))
}

/// Read half of a WebSocket connection.
pub struct WsReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl TransportReader for WsReader {
    async fn next_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            let Some(next) = self.stream.next().await else {
                return Ok(Frame::Eof);
            };
            match next {
                Ok(Message::Text(text)) => return Ok(Frame::Message(text.to_string())),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Frame::Message(text)),
                    Err(_) => {
                        return Err(TransportError::Io(
                            "binary frame is not valid UTF-8".to_string(),
                        ));
                    }
                },
                Ok(Message::Pong(_)) => return Ok(Frame::Pong),
                // tungstenite queues the pong reply to inbound pings itself.
                Ok(Message::Ping(_) | Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    let (code, reason) = frame.map_or((CLOSE_NO_STATUS, String::new()), |f| {
                        (u16::from(f.code), f.reason.to_string())
                    });
                    return Ok(Frame::Close { code, reason });
                }
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Ok(Frame::Eof),
                Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => {
                    return Ok(Frame::Eof);
                }
                Err(err) => return Err(TransportError::Io(err.to_string())),
            }
        }
    }
}

/// Write half of a WebSocket connection.
pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportWriter for WsWriter {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(Utf8Bytes::from(text)))
            .await
            .map_err(io_error)
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.sink
            .send(Message::Ping(bytes::Bytes::new()))
            .await
            .map_err(io_error)
    }

    async fn send_close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Utf8Bytes::from(reason.to_string()),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(io_error)
    }
}

fn io_error(err: WsError) -> TransportError {
    TransportError::Io(err.to_string())
}
