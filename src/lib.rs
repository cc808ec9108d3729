//! # wsession - Client-side WebSocket session engine
//!
//! `wsession` wraps a message-oriented WebSocket transport and gives it a
//! well-defined session lifecycle.
//!
//! ## Features
//!
//! - **Fragment reassembly** of text and binary messages from chunked reads
//! - **Serialized sends**: concurrent callers never interleave on the wire
//! - **Lifecycle state machine** with `Connecting -> Open -> Closing -> Closed`
//! - **Event queue** drained on whichever context the consumer chooses
//! - **Pluggable transport**, with a `tokio-tungstenite` backend by default
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsession::WebSocket;
//!
//! let ws = WebSocket::new("wss://echo.example.test")?;
//! ws.on_message(|msg| println!("{:?}", msg.as_text()));
//! ws.connect().await?;
//! ws.send("hello world!").await?;
//!
//! loop {
//!     ws.events_ready().await;
//!     ws.dispatch_pending();
//! }
//! ```

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod protocol;
pub mod transport;

pub use config::{Config, Limits, Timeouts};
pub use connection::{ConnectionState, WebSocket, WebSocketBuilder};
pub use dispatch::{Event, SubscriptionId};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseInfo, Message, MessageKind, Payload};
pub use transport::{ConnectRequest, Transport, TransportState};

#[cfg(feature = "tungstenite")]
pub use transport::TungsteniteTransport;

pub use tokio_util::sync::CancellationToken;
