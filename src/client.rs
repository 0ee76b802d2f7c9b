//! The envelope-typed client and its endpoint construction.

use std::fmt::Write as _;
use std::sync::Arc;

use async_stream::try_stream;
use bon::Builder;
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use url::Url;

use crate::Result;
use crate::types::{Envelope, EnvelopeParser};
use crate::ws::ConnectionManager;
use crate::ws::config::Config;
use crate::ws::connection::ConnectionState;
use crate::ws::error::WsError;

/// Remote endpoint address, assembled into a `ws://` URL.
///
/// The port is optional; the path should carry its leading slash (one is
/// inserted if missing).
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Endpoint {
    /// Host name or address of the remote peer
    #[builder(into)]
    pub host: String,
    /// Explicit port, if any
    pub port: Option<u16>,
    /// Request path
    #[builder(into)]
    pub path: String,
}

impl Endpoint {
    /// Build and validate the endpoint URL.
    ///
    /// Fails with a [`crate::error::Kind::Validation`] error if the
    /// assembled address is not a well-formed URL.
    pub fn url(&self) -> Result<String> {
        let mut url = format!("ws://{}", self.host);
        if let Some(port) = self.port {
            _ = write!(url, ":{port}");
        }
        if !self.path.is_empty() && !self.path.starts_with('/') {
            url.push('/');
        }
        url.push_str(&self.path);

        Ok(Url::parse(&url)?.into())
    }
}

/// Resilient duplex messaging client.
///
/// Maintains a single logical connection to a remote endpoint: dials on
/// [`connect`](Self::connect), transparently re-dials at a fixed delay after
/// unexpected loss, keeps the transport alive with periodic
/// `{"type":"keepAlive"}` frames, and exposes connection status and inbound
/// envelopes as channels that survive reconnects unchanged.
///
/// Clients are cheap to clone and fully independent of one another — each
/// `new` spawns its own event loop, so any number of instances can coexist.
///
/// # Examples
///
/// ```rust, no_run
/// use futures::StreamExt;
/// use persistent_ws::{Client, Endpoint};
/// use persistent_ws::ws::config::Config;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let endpoint = Endpoint::builder()
///         .host("localhost")
///         .port(8080)
///         .path("/ws")
///         .build();
///     let client = Client::new(&endpoint, Config::default())?;
///     client.connect()?;
///
///     let mut messages = Box::pin(client.messages());
///     while let Some(envelope) = messages.next().await {
///         println!("{:?}", envelope?);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    /// Configuration for the connection
    config: Config,
    /// Resolved endpoint URL
    endpoint: String,
    /// Connection manager owning the transport
    connection: ConnectionManager<Envelope, EnvelopeParser>,
}

impl Client {
    /// Create a new client for the given endpoint.
    ///
    /// The client starts disconnected; call [`connect`](Self::connect) to
    /// dial. Fails synchronously if the endpoint address is malformed.
    pub fn new(endpoint: &Endpoint, config: Config) -> Result<Self> {
        let url = endpoint.url()?;
        let connection = ConnectionManager::new(url.clone(), config.clone(), EnvelopeParser)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                endpoint: url,
                connection,
            }),
        })
    }

    /// Express the intent to be connected; dials if no transport exists.
    ///
    /// Idempotent while a transport exists or is being established.
    pub fn connect(&self) -> Result<()> {
        self.inner.connection.connect()
    }

    /// Drop the intent to be connected and close any live transport.
    ///
    /// A pending reconnect attempt is cancelled and never fires. Idempotent.
    pub fn disconnect(&self) -> Result<()> {
        self.inner.connection.disconnect()
    }

    /// Send an envelope to the remote peer.
    ///
    /// Transmits immediately while open. While closed the envelope is
    /// **dropped silently** — there is no buffering or flush-on-reconnect.
    /// Callers that need delivery across reconnects must gate on
    /// [`status`](Self::status) themselves.
    pub fn send(&self, envelope: &Envelope) -> Result<()> {
        self.inner.connection.send(envelope)
    }

    /// Subscribe to inbound envelopes.
    ///
    /// Hot and replay-free: the receiver observes only envelopes decoded
    /// after subscription, with nothing buffered across a disconnect.
    /// Inbound keepalive echoes are forwarded like any other envelope; see
    /// [`Envelope::is_keep_alive`] to filter them.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.inner.connection.subscribe()
    }

    /// Inbound envelopes as a stream.
    ///
    /// A lossy subscriber that falls behind the broadcast capacity yields a
    /// [`WsError::Lagged`] error and then continues with later envelopes.
    /// The stream ends when every client clone has been dropped.
    pub fn messages(&self) -> impl Stream<Item = Result<Envelope>> {
        let mut rx = self.inner.connection.subscribe();

        try_stream! {
            loop {
                match rx.recv().await {
                    Ok(envelope) => yield envelope,
                    Err(RecvError::Lagged(count)) => {
                        tracing::warn!("message subscriber lagged, missed {count} messages");
                        Err(WsError::Lagged { count })?;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Subscribe to connection state changes.
    ///
    /// Replay-latest: a late subscriber's first read observes the current
    /// state, not a historical one.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state_receiver()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Whether the transport is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.connection.is_open()
    }

    /// The resolved endpoint URL this client dials.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
