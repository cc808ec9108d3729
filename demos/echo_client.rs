//! Echo client example.
//!
//! Connects to an echo server, sends a few messages, prints what comes back
//! and closes.
//!
//! Run with:
//!   cargo run --example echo_client -- ws://127.0.0.1:9001
//!
//! Set `RUST_LOG=wsession=debug` to see lifecycle logs.

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use wsession::{CloseCode, Config, WebSocket};

const DEFAULT_ADDR: &str = "ws://127.0.0.1:9001";
const MESSAGES: [&str; 3] = ["Hello, WebSocket!", "second", "third"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let address = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_owned());
    println!("Connecting to {address}");

    let config = Config::new().with_connect_timeout(Duration::from_secs(10));
    let ws = WebSocket::builder(address).config(config).build()?;

    let received = Arc::new(AtomicUsize::new(0));
    ws.on_open(|| println!("Connected"));
    {
        let received = received.clone();
        ws.on_message(move |msg| {
            match msg.as_text() {
                Some(text) => println!("Received: {text}"),
                None => println!("Received binary: {} bytes", msg.len()),
            }
            received.fetch_add(1, Ordering::SeqCst);
        });
    }
    ws.on_error(|err| eprintln!("Error: {err}"));
    ws.on_close(|info| println!("Closed: {} {}", info.code, info.reason));

    ws.connect().await?;
    for message in MESSAGES {
        println!("Sending: {message}");
        ws.send(message).await?;
    }

    // Drain events on this task until every echo has arrived.
    let echoes = async {
        while received.load(Ordering::SeqCst) < MESSAGES.len() {
            ws.events_ready().await;
            ws.dispatch_pending();
        }
    };
    if tokio::time::timeout(Duration::from_secs(5), echoes).await.is_err() {
        eprintln!("Timed out waiting for echoes");
    }

    println!("Closing connection...");
    ws.close(CloseCode::Normal, "goodbye").await?;
    ws.dispatch_pending();
    ws.dispose().await;

    Ok(())
}
