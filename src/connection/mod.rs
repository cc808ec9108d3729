//! Connection lifecycle and outbound write serialization.
//!
//! ## Connection Lifecycle
//!
//! 1. **Connecting** - Initial state, until the opening handshake completes
//! 2. **Open** - Messages flow both ways
//! 3. **Closing** - Close handshake in progress
//! 4. **Closed** - Terminal; no transition leaves it
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsession::{CloseCode, WebSocket};
//!
//! let ws = WebSocket::new("ws://localhost:9001")?;
//! ws.connect().await?;
//! ws.send("Hello").await?;
//! ws.close(CloseCode::Normal, "done").await?;
//! ws.dispose().await;
//! ```

mod sender;
mod state;

pub use state::ConnectionState;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::{WebSocket, WebSocketBuilder};
