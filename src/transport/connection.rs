//! `tokio-tungstenite` transport and event loop.
//!
//! Each [`WsTransport`] owns a spawned tokio task that drives one client
//! socket and reports through an [`EventSink`].
//!
//! # Event Loop
//!
//! The task:
//!
//! - Emits `Connecting`, then runs the client handshake
//! - Queues outgoing frames until the handshake completes
//! - Emits `Open`, then forwards every data frame as `Message`
//! - Emits exactly one `Closed` when the socket ends
//!
//! A socket that fails or ends without a close frame reports code 1006.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{CLOSE_NO_STATUS, CloseEvent, MessageData, TransportEvent};

use super::{ConnectConfig, EventSink, Transport, TransportFactory};

// ============================================================================
// Types
// ============================================================================

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type ClientSink = futures_util::stream::SplitSink<ClientStream, Message>;

// ============================================================================
// TransportCommand
// ============================================================================

/// Internal commands for the event loop.
enum TransportCommand {
    /// Write a frame.
    Send(Message),
    /// Start the closing handshake.
    Close,
}

// ============================================================================
// TungsteniteFactory
// ============================================================================

/// Creates [`WsTransport`]s on the current tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteFactory;

impl TungsteniteFactory {
    /// Creates a new factory.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransportFactory for TungsteniteFactory {
    fn create(&self, config: &ConnectConfig, sink: EventSink) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(WsTransport::spawn(config, sink)?))
    }
}

// ============================================================================
// WsTransport
// ============================================================================

/// Client WebSocket driven by a background task.
///
/// Dropping the last handle closes the socket.
#[derive(Debug, Clone)]
pub struct WsTransport {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<TransportCommand>,
}

impl WsTransport {
    /// Validates `config` and spawns the socket task.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the url is not a WebSocket url
    /// - [`Error::Config`] if a sub-protocol is invalid or no tokio runtime
    ///   is running
    pub fn spawn(config: &ConnectConfig, sink: EventSink) -> Result<Self> {
        let request = build_request(config)?;
        let runtime = Handle::try_current()
            .map_err(|_| Error::config("WebSocket transport requires a running tokio runtime"))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_event_loop(request, command_rx, sink));

        Ok(Self { command_tx })
    }

    fn command(&self, command: TransportCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| Error::ConnectionClosed)
    }
}

impl Transport for WsTransport {
    fn send_text(&self, text: String) -> Result<()> {
        self.command(TransportCommand::Send(Message::Text(text.into())))
    }

    fn send_binary(&self, data: Vec<u8>) -> Result<()> {
        self.command(TransportCommand::Send(Message::Binary(data.into())))
    }

    fn close(&self) {
        let _ = self.command(TransportCommand::Close);
    }
}

// ============================================================================
// Request
// ============================================================================

/// Builds the client handshake request.
fn build_request(config: &ConnectConfig) -> Result<Request> {
    config.validate()?;

    let mut request = config.url.as_str().into_client_request()?;

    if !config.protocols.is_empty() {
        let value = HeaderValue::from_str(&config.protocols.join(", "))
            .map_err(|e| Error::config(format!("Invalid sub-protocol header: {e}")))?;
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", value);
    }

    Ok(request)
}

// ============================================================================
// Event Loop
// ============================================================================

/// Drives one socket from handshake to close.
async fn run_event_loop(
    request: Request,
    mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
    sink: EventSink,
) {
    sink.emit(TransportEvent::Connecting);

    let mut queued: VecDeque<Message> = VecDeque::new();
    let handshake = connect_async(request);
    tokio::pin!(handshake);

    let ws_stream = loop {
        tokio::select! {
            result = &mut handshake => {
                match result {
                    Ok((stream, _response)) => break stream,
                    Err(e) => {
                        warn!(url = %sink.url(), error = %e, "WebSocket handshake failed");
                        sink.emit(TransportEvent::Closed(CloseEvent::abnormal()));
                        return;
                    }
                }
            }

            command = command_rx.recv() => {
                match command {
                    Some(TransportCommand::Send(message)) => queued.push_back(message),
                    Some(TransportCommand::Close) | None => {
                        debug!(url = %sink.url(), "Closed before handshake completed");
                        sink.emit(TransportEvent::Closed(CloseEvent::abnormal()));
                        return;
                    }
                }
            }
        }
    };

    debug!(url = %sink.url(), connection = %sink.connection(), "WebSocket open");
    sink.emit(TransportEvent::Open);

    let (mut ws_write, mut ws_read) = ws_stream.split();

    for message in queued.drain(..) {
        if let Err(e) = ws_write.send(message).await {
            warn!(url = %sink.url(), error = %e, "Failed to flush queued frame");
            sink.emit(TransportEvent::Closed(CloseEvent::abnormal()));
            return;
        }
    }

    let close_event = loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        sink.emit(TransportEvent::Message(MessageData::Text(text.to_string())));
                    }

                    Some(Ok(Message::Binary(bytes))) => {
                        sink.emit(TransportEvent::Message(MessageData::Binary(bytes.to_vec())));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let event = match frame {
                            Some(frame) => CloseEvent::new(
                                u16::from(frame.code),
                                frame.reason.to_string(),
                                true,
                            ),
                            None => CloseEvent::new(CLOSE_NO_STATUS, "", true),
                        };
                        // Flushes the queued close reply.
                        let _ = ws_write.close().await;
                        break event;
                    }

                    Some(Err(e)) => {
                        warn!(url = %sink.url(), error = %e, "WebSocket error");
                        break CloseEvent::abnormal();
                    }

                    None => {
                        debug!(url = %sink.url(), "WebSocket stream ended");
                        break CloseEvent::abnormal();
                    }

                    // Ignore Ping, Pong, raw Frame
                    Some(Ok(_)) => {}
                }
            }

            command = command_rx.recv() => {
                match command {
                    Some(TransportCommand::Send(message)) => {
                        if let Err(e) = ws_write.send(message).await {
                            warn!(url = %sink.url(), error = %e, "Failed to send frame");
                            break CloseEvent::abnormal();
                        }
                        trace!(url = %sink.url(), "Frame sent");
                    }

                    Some(TransportCommand::Close) | None => {
                        close_socket(&mut ws_write).await;
                        break CloseEvent::normal();
                    }
                }
            }
        }
    };

    debug!(url = %sink.url(), code = close_event.code, "WebSocket closed");
    sink.emit(TransportEvent::Closed(close_event));
}

/// Sends a normal close frame and shuts the write half.
async fn close_socket(ws_write: &mut ClientSink) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: String::new().into(),
    };

    if let Err(e) = ws_write.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Close frame not sent");
    }
    let _ = ws_write.close().await;
}

// ============================================================================
// Tests
// ============================================================================
