//! `tokio-tungstenite` backed transport.
//!
//! Whole messages from tungstenite are handed out in receive-buffer sized
//! chunks. Partial sends are buffered until the final chunk and written as
//! one message.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex as SyncMutex;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseInfo, MessageKind};
use crate::protocol::Received;
use crate::transport::{ConnectRequest, Transport, TransportState};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound message not yet fully copied out to the caller.
struct PendingRead {
    kind: MessageKind,
    data: Bytes,
    offset: usize,
}

enum Incoming {
    Data(PendingRead),
    Close(CloseInfo),
}

#[derive(Default)]
struct Reader {
    stream: Option<SplitStream<WsStream>>,
    pending: Option<PendingRead>,
}

#[derive(Default)]
struct Writer {
    sink: Option<SplitSink<WsStream, WsMessage>>,
    partial: Option<(MessageKind, BytesMut)>,
}

/// Transport over a `tokio-tungstenite` client stream.
pub struct TungsteniteTransport {
    reader: Mutex<Reader>,
    writer: Mutex<Writer>,
    state: SyncMutex<TransportState>,
    close_received: watch::Sender<bool>,
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TungsteniteTransport {
    #[must_use]
    pub fn new() -> Self {
        let (close_received, _) = watch::channel(false);
        Self {
            reader: Mutex::new(Reader::default()),
            writer: Mutex::new(Writer::default()),
            state: SyncMutex::new(TransportState::None),
            close_received,
        }
    }

    fn set_state(&self, state: TransportState) {
        *self.state.lock() = state;
    }

    fn build_request(request: &ConnectRequest) -> Result<Request> {
        let mut http = request.address.as_str().into_client_request()?;

        for (name, value) in &request.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
            http.headers_mut().insert(header, value);
        }

        if !request.subprotocols.is_empty() {
            let offered = request.subprotocols.join(", ");
            let value = HeaderValue::from_str(&offered)
                .map_err(|e| Error::InvalidHeader(format!("Sec-WebSocket-Protocol: {e}")))?;
            http.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        Ok(http)
    }

    async fn open(&self, request: &ConnectRequest) -> Result<()> {
        let http = Self::build_request(request)?;
        let (stream, response) = connect_async(http).await?;
        debug!(status = %response.status(), "Handshake completed");

        let (sink, stream) = stream.split();
        self.writer.lock().await.sink = Some(sink);
        self.reader.lock().await.stream = Some(stream);
        Ok(())
    }

    async fn next_incoming(&self, stream: &mut SplitStream<WsStream>) -> Result<Incoming> {
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return Ok(Incoming::Data(PendingRead {
                        kind: MessageKind::Text,
                        data: Bytes::copy_from_slice(text.as_bytes()),
                        offset: 0,
                    }));
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    return Ok(Incoming::Data(PendingRead {
                        kind: MessageKind::Binary,
                        data,
                        offset: 0,
                    }));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let info = frame
                        .map(|f| {
                            let code = CloseCode::from_u16(u16::from(f.code));
                            CloseInfo::new(code, f.reason.as_str())
                        })
                        .unwrap_or_else(CloseInfo::no_status);
                    {
                        let mut state = self.state.lock();
                        *state = match *state {
                            TransportState::CloseSent => TransportState::Closed,
                            _ => TransportState::CloseReceived,
                        };
                    }
                    self.close_received.send_replace(true);
                    return Ok(Incoming::Close(info));
                }
                // Ping/pong replies are handled inside tungstenite.
                Some(Ok(other)) => trace!(len = other.len(), "Skipping control frame"),
                Some(Err(e)) => {
                    self.set_state(TransportState::Aborted);
                    return Err(e.into());
                }
                None => {
                    self.set_state(TransportState::Aborted);
                    return Err(Error::Transport(
                        "connection closed without a close frame".into(),
                    ));
                }
            }
        }
    }

    fn to_ws_message(kind: MessageKind, data: Bytes) -> Result<WsMessage> {
        match kind {
            MessageKind::Text => {
                let text = String::from_utf8(data.to_vec())
                    .map_err(|_| Error::Transport("text payload is not valid UTF-8".into()))?;
                Ok(WsMessage::text(text))
            }
            MessageKind::Binary => Ok(WsMessage::binary(data)),
        }
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self, request: &ConnectRequest) -> Result<()> {
        self.set_state(TransportState::Connecting);
        match self.open(request).await {
            Ok(()) => {
                self.set_state(TransportState::Open);
                Ok(())
            }
            Err(e) => {
                self.set_state(TransportState::Aborted);
                Err(e)
            }
        }
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<Received> {
        let mut guard = self.reader.lock().await;
        let reader = &mut *guard;

        let mut pending = match reader.pending.take() {
            Some(pending) => pending,
            None => {
                let stream = reader
                    .stream
                    .as_mut()
                    .ok_or_else(|| Error::Transport("not connected".into()))?;
                match self.next_incoming(stream).await? {
                    Incoming::Data(pending) => pending,
                    Incoming::Close(info) => return Ok(Received::Close(info)),
                }
            }
        };

        let len = (pending.data.len() - pending.offset).min(buf.len());
        buf[..len].copy_from_slice(&pending.data[pending.offset..pending.offset + len]);
        pending.offset += len;

        let fin = pending.offset == pending.data.len();
        let kind = pending.kind;
        if !fin {
            reader.pending = Some(pending);
        }
        Ok(Received::fragment(len, kind, fin))
    }

    async fn send(&self, data: &[u8], kind: MessageKind, end_of_message: bool) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = &mut *guard;

        if !end_of_message {
            writer
                .partial
                .get_or_insert_with(|| (kind, BytesMut::new()))
                .1
                .extend_from_slice(data);
            return Ok(());
        }

        let message = match writer.partial.take() {
            Some((first_kind, mut buffered)) => {
                buffered.extend_from_slice(data);
                Self::to_ws_message(first_kind, buffered.freeze())?
            }
            None => Self::to_ws_message(kind, Bytes::copy_from_slice(data))?,
        };

        let sink = writer
            .sink
            .as_mut()
            .ok_or_else(|| Error::Transport("not connected".into()))?;
        sink.send(message).await?;
        Ok(())
    }

    async fn close(&self, code: CloseCode, reason: &str) -> Result<()> {
        {
            let mut writer = self.writer.lock().await;
            let Some(sink) = writer.sink.as_mut() else {
                return Ok(());
            };

            let frame = CloseFrame {
                code: WsCloseCode::from(code.as_u16()),
                reason: reason.to_owned().into(),
            };
            match sink.send(WsMessage::Close(Some(frame))).await {
                Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
                Err(e) => {
                    self.set_state(TransportState::Aborted);
                    return Err(e.into());
                }
            }
        }

        {
            let mut state = self.state.lock();
            if *state == TransportState::CloseReceived {
                *state = TransportState::Closed;
                return Ok(());
            }
            *state = TransportState::CloseSent;
        }

        let mut rx = self.close_received.subscribe();
        let _ = rx.wait_for(|received| *received).await;
        self.set_state(TransportState::Closed);
        Ok(())
    }

    fn state(&self) -> TransportState {
        *self.state.lock()
    }
}
