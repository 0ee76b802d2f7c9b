//! Connect to an endpoint, watch the connection state, and print whatever
//! arrives.
//!
//! Run against any WebSocket server speaking JSON envelopes:
//! ```sh
//! RUST_LOG=debug cargo run --example listen -- localhost 8080 /ws
//! ```

use std::time::Duration;

use futures::StreamExt as _;
use persistent_ws::ws::config::Config;
use persistent_ws::{Client, Endpoint, Envelope};
use tokio::time::timeout;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_owned());
    let port = args.next().and_then(|p| p.parse().ok());
    let path = args.next().unwrap_or_else(|| "/ws".to_owned());

    let endpoint = Endpoint::builder()
        .host(host)
        .maybe_port(port)
        .path(path)
        .build();
    let client = Client::new(&endpoint, Config::default())?;
    info!(endpoint = client.endpoint(), "dialing");

    client.connect()?;

    // Report every status flip in the background
    let mut status = client.status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let state = *status.borrow_and_update();
            info!(?state, "connection state changed");
        }
    });

    client.send(&Envelope::new("hello"))?;

    let mut messages = Box::pin(client.messages());
    loop {
        match timeout(Duration::from_secs(30), messages.next()).await {
            Ok(Some(Ok(envelope))) if envelope.is_keep_alive() => {
                info!("peer keepalive echo");
            }
            Ok(Some(Ok(envelope))) => {
                info!(kind = %envelope.kind, fields = ?envelope.fields, "message");
            }
            Ok(Some(Err(e))) => info!(error = %e, "subscription error"),
            Ok(None) => break,
            Err(_) => info!("no traffic for 30s, still listening"),
        }
    }

    client.disconnect()?;
    Ok(())
}
