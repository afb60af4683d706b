//! Session controller
//!
//! Sits between the connection manager and whatever presents the session
//! (the CLI, a GUI). One actor task owns the login machine and a single
//! delay queue holding every scheduled step: login steps, the login
//! deadline and paced GPS lines. Connection events, caller commands and
//! timer expiries are all handled on that task, so they never race.

use super::codec::{CommandEncoder, EncodeError, LineEnding};
use super::connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use super::filter::{Dialect, FilterChain, FilterError, PromptKind};
use super::gps;
use super::login::{LoginAction, LoginError, LoginMachine, LoginOutcome, LoginStep};
use super::transcript::DecodedLine;
use super::transport::{Connector, DeviceIdentity, TransportError};
use futures::StreamExt;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::time::DelayQueue;
use tracing::{debug, info, warn};

/// Session events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Connection state changed
    StateChanged(ConnectionState),
    /// Console output
    LineReceived(DecodedLine),
    /// A command was written
    LineSent(DecodedLine),
    /// Name of the connected device
    DeviceName(String),
    /// Connecting failed
    ConnectFailed(String),
    /// An open connection failed
    ConnectionLost(String),
    /// A login ended
    LoginOutcome {
        /// How the login ended
        outcome: LoginOutcome,
        /// Human-readable result
        reason: String,
    },
    /// Progress message
    Notice(String),
}

/// Session controller errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport failure or no connection
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Command could not be framed
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Dialect did not compile
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Login refused to start
    #[error(transparent)]
    Login(#[from] LoginError),

    /// Coordinates out of range
    #[error("Invalid position {latitude}, {longitude}")]
    InvalidPosition {
        /// Latitude in degrees
        latitude: f64,
        /// Longitude in degrees
        longitude: f64,
    },

    /// The actor task is gone
    #[error("Session controller stopped")]
    Closed,
}

/// Settings the controller runs with
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Framing of outgoing commands
    pub encoder: CommandEncoder,
    /// Login deadline, measured from `send_login`
    pub login_timeout: Duration,
    /// Pause before each login step
    pub settle_delay: Duration,
    /// Pause before each GPS line
    pub gps_line_delay: Duration,
    /// Classifier configuration
    pub dialect: Dialect,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            encoder: CommandEncoder::new(false, false, LineEnding::CrLf),
            login_timeout: Duration::from_millis(8000),
            settle_delay: Duration::from_millis(500),
            gps_line_delay: Duration::from_millis(50),
            dialect: Dialect::default(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Internal commands for the actor
enum Command {
    Connect(DeviceIdentity, oneshot::Sender<()>),
    Disconnect(oneshot::Sender<()>),
    Send(String, Reply<()>),
    Login {
        username: String,
        password: String,
        reply: Reply<()>,
    },
    Gps {
        latitude: f64,
        longitude: f64,
        reply: Reply<()>,
    },
}

/// Entries of the delay queue
#[derive(Debug)]
enum Scheduled {
    Login { epoch: u64, step: LoginStep },
    LoginDeadline { epoch: u64 },
    Gps(String),
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionController {
    connection: ConnectionManager,
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SessionEvent>,
    logging_in: Arc<AtomicBool>,
}

impl SessionController {
    /// Start a controller on the current Tokio runtime
    pub fn new(connector: Arc<dyn Connector>, options: SessionOptions) -> Result<Self, SessionError> {
        let filters = FilterChain::from_dialect(&options.dialect)?;
        let (connection, link_events) = ConnectionManager::new(connector, filters);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(1024);
        let logging_in = Arc::new(AtomicBool::new(false));

        let actor = Actor {
            connection: connection.clone(),
            machine: LoginMachine::new(&options.dialect),
            options,
            login_epoch: 0,
            queue: DelayQueue::new(),
            events: events.clone(),
            logging_in: logging_in.clone(),
        };
        tokio::spawn(actor.run(command_rx, link_events));

        Ok(Self {
            connection,
            commands,
            events,
            logging_in,
        })
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Check if a login is running
    pub fn is_logging_in(&self) -> bool {
        self.logging_in.load(Ordering::SeqCst)
    }

    /// Drop any current connection and connect to `identity`.
    ///
    /// The result arrives as `StateChanged` / `ConnectFailed` events.
    pub async fn connect(&self, identity: DeviceIdentity) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.submit(Command::Connect(identity, tx))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Close the connection; safe to call when not connected
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.submit(Command::Disconnect(tx))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Frame and write a command. Blank text is ignored.
    pub async fn send_command(&self, text: &str) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.submit(Command::Send(text.to_string(), tx))?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Start an automated login
    pub async fn send_login(&self, username: &str, password: &str) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Login {
            username: username.to_string(),
            password: password.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Send the position block, one line per GPS line delay
    pub async fn send_gps_coordinates(&self, latitude: f64, longitude: f64) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Gps {
            latitude,
            longitude,
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    fn submit(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}

struct Actor {
    connection: ConnectionManager,
    machine: LoginMachine,
    options: SessionOptions,
    login_epoch: u64,
    queue: DelayQueue<Scheduled>,
    events: broadcast::Sender<SessionEvent>,
    logging_in: Arc<AtomicBool>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut link_events: mpsc::UnboundedReceiver<ConnectionEvent>,
    ) {
        loop {
            tokio::select! {
                biased;
                event = link_events.recv() => match event {
                    Some(event) => self.on_link_event(event),
                    None => break,
                },
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
                Some(expired) = self.queue.next(), if !self.queue.is_empty() => {
                    self.on_timer(expired.into_inner());
                }
            }
        }
        debug!("Session controller shutting down");
        self.connection.stop().await;
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn notice(&self, text: impl Into<String>) {
        self.emit(SessionEvent::Notice(text.into()));
    }

    fn on_link_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::StateChanged(state) => {
                if state == ConnectionState::None {
                    self.reset();
                }
                self.emit(SessionEvent::StateChanged(state));
            }
            ConnectionEvent::DeviceName(name) => self.emit(SessionEvent::DeviceName(name)),
            ConnectionEvent::Line { text, prompt } => {
                // Shell prompts only drive the login machine.
                if prompt != Some(PromptKind::Command) {
                    let encoder = &self.options.encoder;
                    self.emit(SessionEvent::LineReceived(DecodedLine::incoming(
                        &text,
                        encoder.checksum,
                        encoder.hex_mode,
                    )));
                }
                let actions = self.machine.on_line(&text, prompt);
                self.apply(actions);
            }
            ConnectionEvent::ConnectFailed(reason) => self.emit(SessionEvent::ConnectFailed(reason)),
            ConnectionEvent::ConnectionLost(reason) => self.emit(SessionEvent::ConnectionLost(reason)),
        }
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect(identity, reply) => {
                self.reset();
                self.connection.connect(identity).await;
                let _ = reply.send(());
            }
            Command::Disconnect(reply) => {
                self.reset();
                self.connection.stop().await;
                let _ = reply.send(());
            }
            Command::Send(text, reply) => {
                let _ = reply.send(self.send_line(&text));
            }
            Command::Login {
                username,
                password,
                reply,
            } => {
                let _ = reply.send(self.start_login(&username, &password));
            }
            Command::Gps {
                latitude,
                longitude,
                reply,
            } => {
                let _ = reply.send(self.schedule_gps(latitude, longitude));
            }
        }
    }

    fn on_timer(&mut self, entry: Scheduled) {
        match entry {
            Scheduled::Login { epoch, step } if epoch == self.login_epoch => self.run_step(step),
            Scheduled::LoginDeadline { epoch } if epoch == self.login_epoch => {
                if let Some(action) = self.machine.on_timeout() {
                    self.apply(vec![action]);
                }
            }
            Scheduled::Gps(line) => {
                if let Err(e) = self.send_line(&line) {
                    warn!("GPS line dropped: {}", e);
                }
            }
            stale => debug!("Ignoring stale timer {:?}", stale),
        }
    }

    /// Cancel the login and everything scheduled
    fn reset(&mut self) {
        if self.machine.cancel() {
            self.login_epoch += 1;
        }
        self.logging_in.store(false, Ordering::SeqCst);
        self.queue.clear();
    }

    fn send_line(&mut self, text: &str) -> Result<(), SessionError> {
        if !self.connection.is_connected() {
            return Err(TransportError::NotConnected.into());
        }
        let encoder = self.options.encoder;
        let Some(frame) = encoder.frame(text)? else {
            return Ok(());
        };
        if !self.connection.write(&frame) {
            return Err(TransportError::NotConnected.into());
        }
        self.emit(SessionEvent::LineSent(DecodedLine::outgoing(
            &frame,
            encoder.checksum,
            encoder.hex_mode,
        )));
        Ok(())
    }

    fn start_login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        if !self.connection.is_connected() {
            return Err(LoginError::NotConnected.into());
        }
        let actions = self.machine.start(username, password, self.connection.flags())?;

        self.login_epoch += 1;
        self.logging_in.store(true, Ordering::SeqCst);
        self.notice("[APP] Starting login...");
        self.queue.insert(
            Scheduled::LoginDeadline {
                epoch: self.login_epoch,
            },
            self.options.login_timeout,
        );
        self.apply(actions);
        Ok(())
    }

    fn apply(&mut self, actions: Vec<LoginAction>) {
        for action in actions {
            match action {
                LoginAction::Send(step) => {
                    self.queue.insert(
                        Scheduled::Login {
                            epoch: self.login_epoch,
                            step,
                        },
                        self.options.settle_delay,
                    );
                }
                LoginAction::Finish(outcome) => self.finish_login(outcome),
            }
        }
    }

    fn finish_login(&mut self, outcome: LoginOutcome) {
        // Outstanding steps and the deadline belong to the old epoch.
        self.login_epoch += 1;
        self.logging_in.store(false, Ordering::SeqCst);
        if outcome.is_success() {
            self.connection.mark_logged_in();
            self.notice("[APP] Login successful!");
        } else {
            self.notice(format!("[APP] {}", outcome.reason()));
        }
        let reason = outcome.reason();
        self.emit(SessionEvent::LoginOutcome { outcome, reason });
    }

    fn run_step(&mut self, step: LoginStep) {
        let Some(text) = self.machine.take_step(step) else {
            return;
        };

        // Credentials are text even when the terminal is in hex mode.
        let encoder = CommandEncoder {
            hex_mode: false,
            ..self.options.encoder
        };
        let frame = if text.is_empty() {
            Some(encoder.enter())
        } else {
            match encoder.frame(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Login step could not be framed: {}", e);
                    None
                }
            }
        };
        let Some(frame) = frame else { return };

        match step {
            LoginStep::Username => self.notice(format!("Sending username: {text}")),
            LoginStep::Password => self.notice("Sending password: ******"),
            LoginStep::Wake | LoginStep::Enter => {}
        }
        if !self.connection.write(&frame) {
            warn!("Login step {:?} not written, link is down", step);
            return;
        }
        if step == LoginStep::Password {
            self.notice("Login completed, waiting for response");
        }
    }

    fn schedule_gps(&mut self, latitude: f64, longitude: f64) -> Result<(), SessionError> {
        if !gps::is_valid_position(latitude, longitude) {
            return Err(SessionError::InvalidPosition { latitude, longitude });
        }
        if !self.connection.is_connected() {
            return Err(TransportError::NotConnected.into());
        }
        info!("Sending GPS position {:.6}, {:.6}", latitude, longitude);
        let mut delay = Duration::ZERO;
        for line in gps::position_commands(latitude, longitude) {
            delay += self.options.gps_line_delay;
            self.queue.insert(Scheduled::Gps(line), delay);
        }
        Ok(())
    }
}
