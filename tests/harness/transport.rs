//! In-memory transport with scripted inbound traffic.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use wsession::protocol::Received;
use wsession::{
    CloseCode, CloseInfo, ConnectRequest, Error, MessageKind, Result, Transport, TransportState,
};

enum Inbound {
    Fragment {
        kind: MessageKind,
        data: Vec<u8>,
        fin: bool,
    },
    Close(CloseInfo),
    Fault(Error),
}

/// Transport double driven entirely by the test.
///
/// Inbound traffic is queued with the `push_*` methods and handed to the
/// receive loop in chunks no larger than its buffer. Outbound writes are
/// recorded, checked for overlap, and optionally echoed back.
#[derive(Default)]
pub struct ScriptedTransport {
    inbound: Mutex<VecDeque<Inbound>>,
    arrived: Notify,
    state: Mutex<TransportState>,

    sent: Mutex<Vec<(MessageKind, Vec<u8>)>>,
    partial: Mutex<Vec<u8>>,
    closes: Mutex<Vec<(CloseCode, String)>>,
    in_flight: AtomicBool,
    overlaps: AtomicUsize,
    connects: AtomicUsize,

    echo: bool,
    send_delay: Duration,
    close_delay: Duration,
    hang_connect: bool,
    silent_close: bool,
    connect_fault: Mutex<Option<Error>>,
    send_fault: Mutex<Option<Error>>,
    close_fault: Mutex<Option<Error>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo every complete outbound message back as inbound traffic.
    pub fn echoing(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Sleep this long inside every write.
    pub fn send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// Sleep this long inside close, after the close frame is recorded.
    pub fn close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    /// Never complete the opening handshake.
    pub fn hang_connect(mut self) -> Self {
        self.hang_connect = true;
        self
    }

    /// Never acknowledge a locally initiated close.
    pub fn silent_close(mut self) -> Self {
        self.silent_close = true;
        self
    }

    pub fn connect_fault(self, err: Error) -> Self {
        *self.connect_fault.lock() = Some(err);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn push_fragment(&self, kind: MessageKind, data: &[u8], fin: bool) {
        self.push(Inbound::Fragment {
            kind,
            data: data.to_vec(),
            fin,
        });
    }

    pub fn push_text(&self, text: &str) {
        self.push_fragment(MessageKind::Text, text.as_bytes(), true);
    }

    pub fn push_binary(&self, data: &[u8]) {
        self.push_fragment(MessageKind::Binary, data, true);
    }

    pub fn push_close(&self, code: u16, reason: &str) {
        self.push(Inbound::Close(CloseInfo::new(CloseCode::from_u16(code), reason)));
    }

    pub fn push_fault(&self, err: Error) {
        self.push(Inbound::Fault(err));
    }

    /// Fail the next write with `err`.
    pub fn fail_next_send(&self, err: Error) {
        *self.send_fault.lock() = Some(err);
    }

    /// Fail the next close handshake with `err`.
    pub fn fail_next_close(&self, err: Error) {
        *self.close_fault.lock() = Some(err);
    }

    fn push(&self, inbound: Inbound) {
        self.inbound.lock().push_back(inbound);
        self.arrived.notify_one();
    }

    pub fn sent(&self) -> Vec<(MessageKind, Vec<u8>)> {
        self.sent.lock().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(kind, _)| *kind == MessageKind::Text)
            .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
            .collect()
    }

    pub fn closes(&self) -> Vec<(CloseCode, String)> {
        self.closes.lock().clone()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, _request: &ConnectRequest) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = TransportState::Connecting;
        if self.hang_connect {
            std::future::pending::<()>().await;
        }
        if let Some(err) = self.connect_fault.lock().take() {
            *self.state.lock() = TransportState::Aborted;
            return Err(err);
        }
        *self.state.lock() = TransportState::Open;
        Ok(())
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<Received> {
        loop {
            let notified = self.arrived.notified();
            let next = self.inbound.lock().pop_front();
            match next {
                Some(Inbound::Fragment { kind, data, fin }) => {
                    if data.len() > buf.len() {
                        let (head, tail) = data.split_at(buf.len());
                        buf.copy_from_slice(head);
                        self.inbound.lock().push_front(Inbound::Fragment {
                            kind,
                            data: tail.to_vec(),
                            fin,
                        });
                        return Ok(Received::fragment(head.len(), kind, false));
                    }
                    buf[..data.len()].copy_from_slice(&data);
                    return Ok(Received::fragment(data.len(), kind, fin));
                }
                Some(Inbound::Close(info)) => {
                    let mut state = self.state.lock();
                    *state = match *state {
                        TransportState::CloseSent => TransportState::Closed,
                        _ => TransportState::CloseReceived,
                    };
                    return Ok(Received::Close(info));
                }
                Some(Inbound::Fault(err)) => {
                    *self.state.lock() = TransportState::Aborted;
                    return Err(err);
                }
                None => notified.await,
            }
        }
    }

    async fn send(&self, data: &[u8], kind: MessageKind, end_of_message: bool) -> Result<()> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        self.in_flight.store(false, Ordering::SeqCst);

        if let Some(err) = self.send_fault.lock().take() {
            return Err(err);
        }

        let message = {
            let mut partial = self.partial.lock();
            partial.extend_from_slice(data);
            if !end_of_message {
                return Ok(());
            }
            std::mem::take(&mut *partial)
        };
        if self.echo {
            self.push(Inbound::Fragment {
                kind,
                data: message.clone(),
                fin: true,
            });
        }
        self.sent.lock().push((kind, message));
        Ok(())
    }

    async fn close(&self, code: CloseCode, reason: &str) -> Result<()> {
        self.closes.lock().push((code, reason.to_owned()));
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
        if let Some(err) = self.close_fault.lock().take() {
            *self.state.lock() = TransportState::Aborted;
            return Err(err);
        }

        let peer_closed_first = {
            let mut state = self.state.lock();
            let first = *state == TransportState::CloseReceived;
            *state = if first {
                TransportState::Closed
            } else {
                TransportState::CloseSent
            };
            first
        };
        if !peer_closed_first && !self.silent_close {
            self.push(Inbound::Close(CloseInfo::new(code, reason)));
        }
        Ok(())
    }

    fn state(&self) -> TransportState {
        *self.state.lock()
    }
}
