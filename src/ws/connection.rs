#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt::Debug;
use std::marker::PhantomData;
use std::pin::pin;
use std::time::Instant;

use backoff::backoff::{Backoff as _, Constant};
use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval_at, sleep};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use url::Url;

use super::config::Config;
use super::error::WsError;
use super::traits::MessageParser;
use crate::types::KEEP_ALIVE_FRAME;
use crate::{Result, error::Error};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast channel capacity for incoming messages.
const BROADCAST_CAPACITY: usize = 1024;

/// Connection state tracking.
///
/// Everything except [`ConnectionState::Open`] counts as closed; use
/// [`ConnectionState::is_open`] for the boolean projection.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not wanted connected
    Idle,
    /// A transport is being established
    Connecting,
    /// Successfully connected
    Open {
        /// When the connection was established
        since: Instant,
    },
    /// Connection was lost while wanted; a retry is scheduled
    PendingReconnect,
}

impl ConnectionState {
    /// Check if the transport is currently open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Instructions from handle clones to the event loop.
enum Command {
    Connect,
    Disconnect,
    Send(String),
}

/// Where the event loop goes next once its current phase ends.
enum Phase {
    Idle,
    Dial,
    Open(Box<WsStream>),
    Reconnect,
    Shutdown,
}

/// Manages WebSocket connection lifecycle, reconnection, and keepalive.
///
/// This generic connection manager handles all connection concerns for a
/// single logical duplex link:
/// - Establishing the transport on [`connect`](Self::connect) and tearing it
///   down on [`disconnect`](Self::disconnect)
/// - Automatic reconnection at a fixed delay after unexpected loss, for as
///   long as the connection is wanted
/// - Periodic keepalive frames while open
/// - Broadcasting decoded messages and connection state to any number of
///   subscribers
///
/// The manager distinguishes *intent* (the caller wants to be connected)
/// from *actual state* (the transport is open): only a loss that happens
/// while the connection is still wanted triggers reconnection.
///
/// # Type Parameters
///
/// - `M`: Message type that implements [`DeserializeOwned`] among other "helper" types
/// - `P`: Parser type that implements [`MessageParser<M>`]
///
/// # Example
///
/// ```ignore
/// let connection = ConnectionManager::new(
///     "ws://example.com/stream".to_owned(),
///     config,
///     EnvelopeParser,
/// )?;
/// connection.connect()?;
///
/// // Subscribe to messages
/// let mut rx = connection.subscribe();
/// while let Ok(msg) = rx.recv().await {
///     println!("Received: {:?}", msg);
/// }
/// ```
#[derive(Clone)]
pub struct ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    /// Command channel into the event loop
    command_tx: mpsc::UnboundedSender<Command>,
    /// Watch channel sender for state changes (used to mint new receivers)
    state_tx: watch::Sender<ConnectionState>,
    /// Watch channel receiver for state changes (for use in checking the current state)
    state_rx: watch::Receiver<ConnectionState>,
    /// Broadcast sender for incoming messages
    broadcast_tx: broadcast::Sender<M>,
    /// Phantom data for unused type parameters
    _phantom: PhantomData<P>,
}

impl<M, P> ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    /// Create a new connection manager and spawn its event loop.
    ///
    /// The manager starts idle; nothing is dialed until
    /// [`connect`](Self::connect). The `parser` decodes every inbound frame.
    /// Fails if `endpoint` is not a valid `ws://` or `wss://` URL.
    pub fn new(endpoint: String, config: Config, parser: P) -> Result<Self> {
        let url = Url::parse(&endpoint)?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::validation(format!(
                    "unsupported endpoint scheme `{other}`, expected ws or wss"
                )));
            }
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        let event_loop = EventLoop {
            endpoint,
            reconnect: config.reconnect_policy(),
            config,
            commands: command_rx,
            state_tx: state_tx.clone(),
            broadcast_tx: broadcast_tx.clone(),
            parser,
            wanted: false,
        };
        tokio::spawn(event_loop.run());

        Ok(Self {
            command_tx,
            state_tx,
            state_rx,
            broadcast_tx,
            _phantom: PhantomData,
        })
    }

    /// Express the intent to be connected.
    ///
    /// Dials the endpoint if no transport exists. While a transport exists
    /// or is being established this is a no-op besides re-asserting intent —
    /// a second concurrent transport is never constructed. During a pending
    /// reconnect delay, the dial happens immediately instead of waiting out
    /// the remainder.
    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    /// Drop the intent to be connected and close any live transport.
    ///
    /// Cancels a pending reconnect attempt, so no dial happens after this
    /// call until the next [`connect`](Self::connect). Idempotent.
    pub fn disconnect(&self) -> Result<()> {
        self.command(Command::Disconnect)
    }

    /// Send a message to the server.
    ///
    /// The message is serialized immediately; transmission happens only if
    /// the transport is open. While closed the message is **dropped** — no
    /// buffering or replay on reconnect is performed. This is the current,
    /// revisitable contract rather than a guarantee of loss-free delivery.
    pub fn send<R: Serialize>(&self, message: &R) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.command(Command::Send(json))
    }

    fn command(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Whether the transport is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Subscribe to incoming messages.
    ///
    /// Each call returns a new independent receiver. Receivers observe only
    /// messages decoded after subscription — nothing is replayed, and
    /// nothing is buffered across a disconnect. Multiple subscribers can
    /// receive messages concurrently without blocking each other, and
    /// dropping one affects neither the others nor the transport.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<M> {
        self.broadcast_tx.subscribe()
    }

    /// Subscribe to connection state changes.
    ///
    /// The receiver replays the latest value: a subscriber joining late
    /// observes the current state immediately, not just future transitions.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}

/// The single task owning the transport, its timers, and the intent flag.
///
/// All lifecycle transitions are processed sequentially here; handles only
/// enqueue commands. Each phase owns the resources it arms (dial attempt,
/// keepalive interval, reconnect sleep), so leaving a phase cancels them.
struct EventLoop<M, P> {
    endpoint: String,
    config: Config,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    broadcast_tx: broadcast::Sender<M>,
    parser: P,
    reconnect: Constant,
    /// Connection intent: true between `connect()` and `disconnect()`
    wanted: bool,
}

impl<M, P> EventLoop<M, P>
where
    M: DeserializeOwned + Debug + Clone + Send + 'static,
    P: MessageParser<M>,
{
    async fn run(mut self) {
        let mut phase = Phase::Idle;
        loop {
            phase = match phase {
                Phase::Idle => self.idle().await,
                Phase::Dial => self.dial().await,
                Phase::Open(stream) => self.open(*stream).await,
                Phase::Reconnect => self.await_reconnect().await,
                Phase::Shutdown => break,
            };
        }
        tracing::debug!("connection event loop terminated");
    }

    /// No transport, no intent. Waits for a `connect()`.
    async fn idle(&mut self) -> Phase {
        _ = self.state_tx.send(ConnectionState::Idle);
        loop {
            match self.commands.recv().await {
                Some(Command::Connect) => {
                    self.wanted = true;
                    return Phase::Dial;
                }
                Some(Command::Disconnect) => self.wanted = false,
                Some(Command::Send(_)) => {
                    tracing::debug!("dropping outbound message while closed");
                }
                None => return Phase::Shutdown,
            }
        }
    }

    /// One dial attempt. The attempt future is owned by this phase, so a
    /// `disconnect()` aborts the dial by dropping it.
    async fn dial(&mut self) -> Phase {
        _ = self.state_tx.send(ConnectionState::Connecting);
        let endpoint = self.endpoint.clone();
        let mut attempt = pin!(connect_async(endpoint));

        loop {
            tokio::select! {
                result = &mut attempt => {
                    return match result {
                        Ok((stream, _response)) => Phase::Open(Box::new(stream)),
                        Err(e) => {
                            tracing::warn!(error = %e, "unable to connect");
                            self.next_phase_after_close()
                        }
                    };
                }
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => {} // already dialing
                    Some(Command::Disconnect) => {
                        self.wanted = false;
                        return Phase::Idle;
                    }
                    Some(Command::Send(_)) => {
                        tracing::debug!("dropping outbound message while closed");
                    }
                    None => return Phase::Shutdown,
                }
            }
        }
    }

    /// Transport open: pump inbound frames, outbound sends, and keepalives
    /// until the connection ends for any reason.
    async fn open(&mut self, stream: WsStream) -> Phase {
        _ = self.state_tx.send(ConnectionState::Open {
            since: Instant::now(),
        });

        let (mut write, mut read) = stream.split();

        // First keepalive one full interval after open, then steadily
        let mut keepalive = interval_at(
            tokio::time::Instant::now() + self.config.keepalive_interval,
            self.config.keepalive_interval,
        );

        loop {
            tokio::select! {
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => self.dispatch(text.as_bytes()),
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(?frame, "connection closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary frames and protocol ping/pong are outside the envelope protocol
                    }
                    Some(Err(e)) => {
                        // The error itself is non-fatal to us; the broken read ends the
                        // connection and the reconnect path takes over
                        tracing::warn!(error = %e, "transport error");
                        break;
                    }
                    None => break,
                },
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => {} // already open
                    Some(Command::Disconnect) => {
                        self.wanted = false;
                        if let Err(e) = write.close().await {
                            tracing::debug!(error = %e, "close request failed");
                        }
                        break;
                    }
                    Some(Command::Send(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            tracing::warn!(error = %e, "send failed");
                            break;
                        }
                    }
                    None => {
                        _ = write.close().await;
                        return Phase::Shutdown;
                    }
                },
                _ = keepalive.tick() => {
                    if let Err(e) = write.send(Message::Text(KEEP_ALIVE_FRAME.into())).await {
                        tracing::warn!(error = %e, "keepalive send failed");
                        break;
                    }
                }
            }
        }

        // Transport halves and the keepalive interval are dropped here on every exit path
        self.next_phase_after_close()
    }

    /// Connection lost while wanted: wait out the fixed delay, then re-dial.
    /// The sleep is owned by this phase; `disconnect()` cancels it by
    /// leaving, so the scheduled attempt can never fire afterwards.
    async fn await_reconnect(&mut self) -> Phase {
        _ = self.state_tx.send(ConnectionState::PendingReconnect);
        let delay = self
            .reconnect
            .next_backoff()
            .unwrap_or(self.config.reconnect_delay);
        let mut retry = pin!(sleep(delay));

        loop {
            tokio::select! {
                () = &mut retry => return Phase::Dial,
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => return Phase::Dial, // dial now instead of waiting
                    Some(Command::Disconnect) => {
                        self.wanted = false;
                        return Phase::Idle;
                    }
                    Some(Command::Send(_)) => {
                        tracing::debug!("dropping outbound message while closed");
                    }
                    None => return Phase::Shutdown,
                }
            }
        }
    }

    fn next_phase_after_close(&self) -> Phase {
        if self.wanted {
            Phase::Reconnect
        } else {
            Phase::Idle
        }
    }

    /// Decode an inbound frame and fan out whatever it yields.
    fn dispatch(&self, bytes: &[u8]) {
        match self.parser.parse(bytes) {
            Ok(messages) => {
                for message in messages {
                    tracing::trace!(?message, "decoded inbound message");
                    _ = self.broadcast_tx.send(message);
                }
            }
            Err(e) => {
                // Malformed frames are not fatal: the frame is discarded and
                // the connection stays open
                tracing::warn!(error = %e, "failed to decode inbound message");
            }
        }
    }
}
