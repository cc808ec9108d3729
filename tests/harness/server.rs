//! Loopback echo server for end-to-end tests.
//!
//! Spawns a tokio-tungstenite server on a random port that echoes text and
//! binary messages and answers close frames.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

pub struct EchoServer {
    accept_loop: JoinHandle<()>,
}

impl EchoServer {
    /// Bind to `127.0.0.1:0` and start accepting.
    pub async fn spawn() -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_loop = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(msg)) = ws.next().await {
                        match msg {
                            WsMessage::Text(_) | WsMessage::Binary(_) => {
                                if ws.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            // Keep polling so the close reply is flushed.
                            _ => {}
                        }
                    }
                });
            }
        });

        (Self { accept_loop }, addr)
    }

    /// Spawn a server that sends one close frame right after the handshake.
    pub async fn spawn_closing(code: u16, reason: &'static str) -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_loop = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let frame = CloseFrame {
                        code: code.into(),
                        reason: reason.into(),
                    };
                    if ws.send(WsMessage::Close(Some(frame))).await.is_err() {
                        return;
                    }
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        (Self { accept_loop }, addr)
    }

    pub async fn shutdown(self) {
        self.accept_loop.abort();
        let _ = self.accept_loop.await;
    }
}
