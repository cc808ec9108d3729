//! Shared fixtures for the integration tests.
//!
//! - [`ScriptedTransport`]: in-memory transport with scripted inbound traffic
//!   and fault injection
//! - [`Recorder`]: subscribes to a socket and logs delivered events as strings
//! - [`EchoServer`]: a real WebSocket echo server on a loopback port

#![allow(dead_code)]

mod recorder;
mod transport;

#[cfg(feature = "tungstenite")]
mod server;

pub use recorder::Recorder;
pub use transport::ScriptedTransport;

#[cfg(feature = "tungstenite")]
pub use server::EchoServer;

use std::time::Duration;

use wsession::WebSocket;

/// Upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Drain events until `done` holds, panicking after [`TEST_TIMEOUT`].
pub async fn pump_until(ws: &WebSocket, mut done: impl FnMut() -> bool) {
    let pump = async {
        while !done() {
            ws.events_ready().await;
            ws.dispatch_pending();
        }
    };
    tokio::time::timeout(TEST_TIMEOUT, pump)
        .await
        .expect("timed out waiting for events");
}
