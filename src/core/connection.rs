//! Connection manager: transport lifecycle, reader and writer tasks
//!
//! One connection exists at a time. `connect` and `stop` are serialized;
//! every transition bumps a generation counter so results from a
//! cancelled attempt or a dying reader are recognized as stale and
//! dropped instead of reaching the session.

use super::codec::OutgoingFrame;
use super::filter::{FilterChain, FilterContext, LineClass, PromptKind};
use super::framer::LineFramer;
use super::transport::{Connector, DeviceIdentity, Link, LinkReader, LinkWriter};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Transport connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not connected
    #[default]
    None,
    /// Handshake in progress
    Connecting,
    /// Link open, reader running
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "not connected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Events pushed to the session controller, in wire order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// State transition completed
    StateChanged(ConnectionState),
    /// Name of the connected device
    DeviceName(String),
    /// A line that survived the noise and echo filters
    Line {
        /// Sanitized text
        text: String,
        /// Set when the line is a prompt
        prompt: Option<PromptKind>,
    },
    /// The handshake failed
    ConnectFailed(String),
    /// An open link failed
    ConnectionLost(String),
}

/// What the reader has learned about the console on this link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkFlags {
    /// A shell prompt was seen or a login succeeded
    pub already_logged: bool,
    /// The console has shown a username prompt
    pub already_woken: bool,
}

struct Shared {
    state: ConnectionState,
    generation: u64,
    cancel: Option<CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
    writer_tx: Option<mpsc::UnboundedSender<Bytes>>,
    last_sent: Option<String>,
    flags: LinkFlags,
}

struct Inner {
    connector: Arc<dyn Connector>,
    filters: Arc<FilterChain>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    shared: Mutex<Shared>,
    transition: tokio::sync::Mutex<()>,
}

/// Owns the transport of the single active connection
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager and the receiver its events are delivered to
    pub fn new(
        connector: Arc<dyn Connector>,
        filters: FilterChain,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let manager = Self {
            inner: Arc::new(Inner {
                connector,
                filters: Arc::new(filters),
                events,
                shared: Mutex::new(Shared {
                    state: ConnectionState::None,
                    generation: 0,
                    cancel: None,
                    tasks: Vec::new(),
                    writer_tx: None,
                    last_sent: None,
                    flags: LinkFlags::default(),
                }),
                transition: tokio::sync::Mutex::new(()),
            }),
        };
        (manager, rx)
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Flags recorded on the current link
    pub fn flags(&self) -> LinkFlags {
        self.inner.shared.lock().flags
    }

    /// Record a successful login on the current link
    pub fn mark_logged_in(&self) {
        self.inner.shared.lock().flags.already_logged = true;
    }

    /// Most recently written command
    pub fn last_sent(&self) -> Option<String> {
        self.inner.shared.lock().last_sent.clone()
    }

    /// Tear down any existing connection, then start connecting.
    ///
    /// Returns once the attempt is under way; the outcome arrives as an
    /// event.
    pub async fn connect(&self, identity: DeviceIdentity) {
        let _transition = self.inner.transition.lock().await;
        self.shutdown().await;

        let mut shared = self.inner.shared.lock();
        shared.generation += 1;
        let generation = shared.generation;
        let token = CancellationToken::new();
        shared.cancel = Some(token.clone());
        info!("Connecting to {} via {}", identity.address(), self.inner.connector.kind());
        self.set_state(&mut shared, ConnectionState::Connecting);

        let manager = self.clone();
        let task = tokio::spawn(async move {
            manager.run_connect(generation, identity, token).await;
        });
        shared.tasks.push(task);
    }

    /// Cancel any attempt, close the link and return to `None`.
    ///
    /// Safe to call repeatedly.
    pub async fn stop(&self) {
        let _transition = self.inner.transition.lock().await;
        self.shutdown().await;
    }

    /// Forward a frame to the transport.
    ///
    /// Returns `false` without doing anything unless connected.
    pub fn write(&self, frame: &OutgoingFrame) -> bool {
        let mut shared = self.inner.shared.lock();
        if shared.state != ConnectionState::Connected {
            return false;
        }
        let Some(tx) = shared.writer_tx.clone() else {
            return false;
        };
        shared.last_sent = Some(frame.command.clone());
        tx.send(frame.bytes.clone()).is_ok()
    }

    /// Cancel tasks of the current generation and wait for them to exit
    async fn shutdown(&self) {
        let (token, tasks) = {
            let mut shared = self.inner.shared.lock();
            shared.generation += 1;
            shared.writer_tx = None;
            shared.last_sent = None;
            shared.flags = LinkFlags::default();
            self.set_state(&mut shared, ConnectionState::None);
            (shared.cancel.take(), std::mem::take(&mut shared.tasks))
        };

        if let Some(token) = token {
            debug!("Cancelling connection tasks");
            token.cancel();
        }
        let current = tokio::task::try_id();
        for task in tasks {
            // A task tearing down its own connection must not wait on itself.
            if Some(task.id()) == current {
                continue;
            }
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!("Connection task panicked: {}", e);
                }
            }
        }
    }

    fn set_state(&self, shared: &mut Shared, state: ConnectionState) {
        if shared.state == state {
            return;
        }
        debug!("setState() {:?} -> {:?}", shared.state, state);
        shared.state = state;
        let _ = self.inner.events.send(ConnectionEvent::StateChanged(state));
    }

    async fn run_connect(&self, generation: u64, identity: DeviceIdentity, token: CancellationToken) {
        let result = tokio::select! {
            () = token.cancelled() => {
                debug!("Connect attempt to {} cancelled", identity.address());
                return;
            }
            result = self.inner.connector.connect(&identity) => result,
        };

        match result {
            Ok(link) => self.connected(generation, &identity, link, token),
            Err(e) => {
                let mut shared = self.inner.shared.lock();
                if shared.generation != generation {
                    return;
                }
                warn!("Connection to {} failed: {}", identity.address(), e);
                shared.generation += 1;
                shared.cancel = None;
                self.set_state(&mut shared, ConnectionState::None);
                let _ = self.inner.events.send(ConnectionEvent::ConnectFailed(e.to_string()));
            }
        }
    }

    fn connected(&self, generation: u64, identity: &DeviceIdentity, link: Link, token: CancellationToken) {
        let mut shared = self.inner.shared.lock();
        if shared.generation != generation || token.is_cancelled() {
            debug!("Dropping link from a superseded attempt");
            return;
        }

        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        shared.writer_tx = Some(writer_tx);
        self.set_state(&mut shared, ConnectionState::Connected);
        info!("Connected to {}", identity.display_name());
        let _ = self
            .inner
            .events
            .send(ConnectionEvent::DeviceName(identity.display_name().to_string()));

        let Link { reader, writer } = link;
        let reader_task = {
            let manager = self.clone();
            let token = token.clone();
            tokio::spawn(async move { manager.run_reader(generation, reader, token).await })
        };
        let writer_task = {
            let manager = self.clone();
            tokio::spawn(async move { manager.run_writer(generation, writer, writer_rx, token).await })
        };
        shared.tasks.push(reader_task);
        shared.tasks.push(writer_task);
    }

    async fn run_reader(&self, generation: u64, reader: LinkReader, token: CancellationToken) {
        let mut lines = FramedRead::new(reader, LineFramer::new());
        loop {
            let next = tokio::select! {
                () = token.cancelled() => break,
                next = lines.next() => next,
            };
            match next {
                Some(Ok(raw)) => self.handle_line(generation, &raw),
                Some(Err(e)) => {
                    self.link_failed(generation, &e.to_string());
                    break;
                }
                None => {
                    self.link_failed(generation, "end of stream");
                    break;
                }
            }
        }
        debug!("Reader for generation {} finished", generation);
    }

    async fn run_writer(
        &self,
        generation: u64,
        mut writer: LinkWriter,
        mut frames: mpsc::UnboundedReceiver<Bytes>,
        token: CancellationToken,
    ) {
        loop {
            let frame = tokio::select! {
                () = token.cancelled() => break,
                frame = frames.recv() => frame,
            };
            let Some(frame) = frame else { break };
            let result = async {
                writer.write_all(&frame).await?;
                writer.flush().await
            }
            .await;
            if let Err(e) = result {
                warn!("Exception during write: {}", e);
                self.link_failed(generation, &e.to_string());
                break;
            }
        }
        let _ = writer.shutdown().await;
    }

    fn handle_line(&self, generation: u64, raw: &str) {
        let last_sent = self.inner.shared.lock().last_sent.clone();
        let ctx = FilterContext {
            last_sent: last_sent.as_deref(),
        };
        let Some((text, class)) = self.inner.filters.process(raw, &ctx) else {
            return;
        };
        if !class.is_delivered() {
            return;
        }
        let prompt = match class {
            LineClass::Prompt(kind) => Some(kind),
            _ => None,
        };

        let mut shared = self.inner.shared.lock();
        if shared.generation != generation {
            return;
        }
        match prompt {
            Some(PromptKind::Command) => shared.flags.already_logged = true,
            Some(PromptKind::Username) => shared.flags.already_woken = true,
            _ => {}
        }
        let _ = self.inner.events.send(ConnectionEvent::Line { text, prompt });
    }

    /// Report a failed link once and return to `None`
    fn link_failed(&self, generation: u64, reason: &str) {
        let mut shared = self.inner.shared.lock();
        if shared.generation != generation {
            return;
        }
        warn!("Connection lost: {}", reason);
        shared.generation += 1;
        shared.writer_tx = None;
        shared.last_sent = None;
        shared.flags = LinkFlags::default();
        if let Some(token) = shared.cancel.take() {
            token.cancel();
        }
        self.set_state(&mut shared, ConnectionState::None);
        let _ = self
            .inner
            .events
            .send(ConnectionEvent::ConnectionLost(reason.to_string()));
    }
}
