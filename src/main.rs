//! sppterm - line terminal for remote consoles
//!
//! Connects to a console over an RFCOMM tty, a native RFCOMM socket or a
//! TCP bridge, optionally logs in and sends a GPS position, then relays
//! stdin lines as commands until `:quit`, end of input or Ctrl+C.

use clap::{ArgGroup, Args, Parser, Subcommand};
use sppterm_core::cli::{
    parse_credentials, parse_input, parse_position, print_exit_codes, render_event, CliResult, ExitCodes,
    InputLine, OutputFormat, Rendered,
};
use sppterm_core::{
    create_connector, AppConfig, ConnectionState, DeviceIdentity, LineEnding, LoginError, LoginOutcome,
    SessionController, SessionError, SessionEvent, Transcript, TransportKind,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_TTY: &str = "/dev/rfcomm0";

/// sppterm CLI
#[derive(Parser, Debug)]
#[command(name = "sppterm", version, about = "Line terminal for remote consoles over Bluetooth SPP", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "SPPTERM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to a device and run a session
    Connect(ConnectArgs),

    /// Print the exit code table
    ExitCodes,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").args(["serial", "tcp", "rfcomm"])))]
struct ConnectArgs {
    /// RFCOMM tty device (default /dev/rfcomm0)
    #[arg(long)]
    serial: Option<String>,

    /// TCP bridge as host:port
    #[arg(long)]
    tcp: Option<String>,

    /// Native RFCOMM socket as MAC[/channel]
    #[arg(long)]
    rfcomm: Option<String>,

    /// Display name of the device
    #[arg(long)]
    name: Option<String>,

    /// Baud rate for tty devices
    #[arg(long)]
    baud: Option<u32>,

    /// Log in as user:password once connected
    #[arg(long, env = "SPPTERM_LOGIN", hide_env_values = true)]
    login: Option<String>,

    /// Send a GPS position as lat,lon
    #[arg(long, allow_hyphen_values = true)]
    gps: Option<String>,

    /// Command to send once ready (repeatable)
    #[arg(short = 'c', long = "command")]
    commands: Vec<String>,

    /// Commands are typed as hex digits
    #[arg(long)]
    hex: bool,

    /// Append and verify modulo-256 checksums
    #[arg(long)]
    checksum: bool,

    /// Command terminator (none, lf, cr, crlf)
    #[arg(long)]
    line_ending: Option<LineEnding>,

    /// Show timestamps
    #[arg(long)]
    timestamps: bool,

    /// Show direction arrows
    #[arg(long)]
    direction: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Keep printing output this long after input ends (ms)
    #[arg(long, default_value = "1000")]
    linger_ms: u64,
}

impl ConnectArgs {
    fn target(&self) -> (String, TransportKind) {
        if let Some(addr) = &self.tcp {
            (addr.clone(), TransportKind::Tcp)
        } else if let Some(addr) = &self.rfcomm {
            (addr.clone(), TransportKind::Rfcomm)
        } else {
            let tty = self.serial.clone().unwrap_or_else(|| DEFAULT_TTY.to_string());
            (tty, TransportKind::Serial)
        }
    }

    fn apply(&self, config: &mut AppConfig) {
        let terminal = &mut config.terminal;
        terminal.hex_mode |= self.hex;
        terminal.checksum |= self.checksum;
        terminal.show_timings |= self.timestamps;
        terminal.show_direction |= self.direction;
        if let Some(ending) = self.line_ending {
            terminal.line_ending = ending;
        }
        if let Some(baud) = self.baud {
            config.transport.baud_rate = baud;
        }
        config.transport.kind = self.target().1;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match &cli.command {
        Commands::ExitCodes => {
            print_exit_codes();
            CliResult::success()
        }
        Commands::Connect(args) => match run_connect(&cli, args).await {
            Ok(result) => result,
            Err(e) => CliResult::error(ExitCodes::ERROR, format!("{e:#}")),
        },
    };

    if let Some(message) = result.message() {
        if !result.is_success() {
            eprintln!("Error: {message}");
        } else if !cli.quiet {
            eprintln!("{message}");
        }
    }
    result.to_exit_code()
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<AppConfig, CliResult> {
    let loaded = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    loaded.map_err(|e| CliResult::from(&e))
}

/// Prints events in the selected format
struct Printer {
    format: OutputFormat,
    transcript: Transcript,
    quiet: bool,
}

impl Printer {
    fn print(&self, event: &SessionEvent) {
        match render_event(event, self.format, &self.transcript) {
            Some(Rendered::Stdout(text)) => println!("{text}"),
            Some(Rendered::Stderr(text)) if !self.quiet => eprintln!("{text}"),
            _ => {}
        }
    }
}

/// Where the session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    LoggingIn,
    Interactive,
}

/// Read stdin on a plain thread so a pending read never holds up shutdown
fn spawn_stdin() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn report(result: Result<(), SessionError>) {
    if let Err(e) = result {
        eprintln!("{e}");
    }
}

async fn run_connect(cli: &Cli, args: &ConnectArgs) -> anyhow::Result<CliResult> {
    let mut config = match load_config(cli) {
        Ok(config) => config,
        Err(result) => return Ok(result),
    };
    args.apply(&mut config);

    let credentials = match args.login.as_deref().map(parse_credentials).transpose() {
        Ok(credentials) => credentials,
        Err(usage) => return Ok(CliResult::error(ExitCodes::INVALID_ARGS, usage)),
    };
    let position = match args.gps.as_deref().map(parse_position).transpose() {
        Ok(position) => position,
        Err(usage) => return Ok(CliResult::error(ExitCodes::INVALID_ARGS, usage)),
    };

    let connector = match create_connector(&config.transport) {
        Ok(connector) => Arc::from(connector),
        Err(e) => return Ok(CliResult::from(&e)),
    };
    let session = match SessionController::new(connector, config.session_options()) {
        Ok(session) => session,
        Err(e) => return Ok(CliResult::from(&e)),
    };

    let (address, _) = args.target();
    let mut identity = DeviceIdentity::new(address);
    if let Some(name) = &args.name {
        identity = identity.with_name(name.clone());
    }

    let run = Run {
        session: &session,
        args,
        credentials,
        position,
        printer: Printer {
            format: args.format,
            transcript: Transcript::new(config.terminal.show_timings, config.terminal.show_direction),
            quiet: cli.quiet,
        },
    };
    // The connector enforces its own timeout; this only guards against a
    // handshake that never reports back.
    let connect_timeout = Duration::from_secs(config.transport.connect_timeout_secs + 5);
    run.drive(identity, connect_timeout, spawn_stdin()).await
}

/// Ask the console for a login.
///
/// `Ok(false)` means the link already shows a shell and there is nothing
/// to log into.
async fn start_login(session: &SessionController, username: &str, password: &str) -> Result<bool, CliResult> {
    match session.send_login(username, password).await {
        Ok(()) => Ok(true),
        Err(SessionError::Login(LoginError::AlreadyLoggedIn)) => {
            info!("Console already shows a shell, skipping login");
            Ok(false)
        }
        Err(e) => Err(CliResult::from(&e)),
    }
}

/// Exit result for a finished login, `None` when the session goes on
fn login_finished(outcome: &LoginOutcome, reason: String) -> Option<CliResult> {
    match outcome {
        LoginOutcome::Success => None,
        LoginOutcome::TimedOut => Some(CliResult::timeout(reason)),
        LoginOutcome::Failed { .. } => Some(CliResult::auth_failed(reason)),
    }
}

/// One `connect` invocation
struct Run<'a> {
    session: &'a SessionController,
    args: &'a ConnectArgs,
    credentials: Option<(String, String)>,
    position: Option<InputLine>,
    printer: Printer,
}

impl Run<'_> {
    /// Connect, log in, send the initial commands, then relay `input`.
    /// The session is always disconnected before returning.
    async fn drive(
        &self,
        identity: DeviceIdentity,
        connect_timeout: Duration,
        input: mpsc::UnboundedReceiver<String>,
    ) -> anyhow::Result<CliResult> {
        let mut events = self.session.subscribe();
        self.session.connect(identity).await?;
        let result = self.event_loop(&mut events, connect_timeout, input).await;
        self.session.disconnect().await?;
        Ok(result)
    }

    async fn event_loop(
        &self,
        events: &mut broadcast::Receiver<SessionEvent>,
        connect_timeout: Duration,
        mut input: mpsc::UnboundedReceiver<String>,
    ) -> CliResult {
        let session = self.session;
        let connect_deadline = Instant::now() + connect_timeout;
        let mut phase = Phase::Connecting;
        let mut linger: Option<Instant> = None;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let event = match event {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Dropped {} events", n);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            return CliResult::error(ExitCodes::INTERNAL_ERROR, "session closed");
                        }
                    };
                    self.printer.print(&event);

                    match event {
                        SessionEvent::StateChanged(ConnectionState::Connected) if phase == Phase::Connecting => {
                            let logging_in = match &self.credentials {
                                Some((username, password)) => match start_login(session, username, password).await {
                                    Ok(started) => started,
                                    Err(result) => return result,
                                },
                                None => false,
                            };
                            if logging_in {
                                phase = Phase::LoggingIn;
                            } else {
                                self.send_initial().await;
                                phase = Phase::Interactive;
                            }
                        }
                        SessionEvent::ConnectFailed(reason) | SessionEvent::ConnectionLost(reason) => {
                            return CliResult::connection_failed(reason);
                        }
                        SessionEvent::LoginOutcome { outcome, reason } if phase == Phase::LoggingIn => {
                            if let Some(result) = login_finished(&outcome, reason) {
                                return result;
                            }
                            self.send_initial().await;
                            phase = Phase::Interactive;
                        }
                        _ => {}
                    }
                }
                line = input.recv(), if phase == Phase::Interactive && linger.is_none() => {
                    let Some(line) = line else {
                        debug!("End of input");
                        linger = Some(Instant::now() + Duration::from_millis(self.args.linger_ms));
                        continue;
                    };
                    match parse_input(&line) {
                        Ok(InputLine::Command(command)) => report(session.send_command(&command).await),
                        Ok(InputLine::Login { username, password }) => {
                            report(session.send_login(&username, &password).await);
                        }
                        Ok(InputLine::Gps { latitude, longitude }) => {
                            report(session.send_gps_coordinates(latitude, longitude).await);
                        }
                        Ok(InputLine::Quit) => return CliResult::success(),
                        Err(usage) => eprintln!("{usage}"),
                    }
                }
                () = sleep_until_opt(linger) => return CliResult::success(),
                () = tokio::time::sleep_until(connect_deadline), if phase == Phase::Connecting => {
                    return CliResult::timeout("no answer from the device");
                }
                _ = tokio::signal::ctrl_c() => return CliResult::success(),
            }
        }
    }

    /// `--command`s and the position block, once the console is ready
    async fn send_initial(&self) {
        for command in &self.args.commands {
            report(self.session.send_command(command).await);
        }
        if let Some(InputLine::Gps { latitude, longitude }) = &self.position {
            report(self.session.send_gps_coordinates(*latitude, *longitude).await);
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sppterm_core::{SessionOptions, TcpConnector};
    use std::net::SocketAddr;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    fn connect_args(argv: &[&str]) -> ConnectArgs {
        let mut full = vec!["sppterm", "connect"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Connect(args) => args,
            Commands::ExitCodes => unreachable!(),
        }
    }

    fn quiet_printer() -> Printer {
        Printer {
            format: OutputFormat::Text,
            transcript: Transcript::default(),
            quiet: true,
        }
    }

    fn session() -> SessionController {
        let options = SessionOptions {
            settle_delay: Duration::from_millis(10),
            ..Default::default()
        };
        SessionController::new(Arc::new(TcpConnector::new(2)), options).unwrap()
    }

    /// A console that is already at a shell: it greets with `greeting`
    /// and records every line it receives.
    async fn shell_console(greeting: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            writer.write_all(greeting).await.unwrap();
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim_end_matches('\r').to_string();
                if line == "show clock" {
                    let _ = writer.write_all(b"12:00:01 UTC\r\nRouter#\r\n").await;
                }
                let _ = seen_tx.send(line);
            }
        });
        (addr, seen_rx)
    }

    #[test]
    fn test_login_finished_exit_codes() {
        assert!(login_finished(&LoginOutcome::Success, "Login successful".into()).is_none());

        let timed_out = login_finished(&LoginOutcome::TimedOut, "Login timeout".into()).unwrap();
        assert_eq!(timed_out.code(), ExitCodes::TIMEOUT);

        let failed = LoginOutcome::Failed {
            reason: "% Login invalid".into(),
        };
        let rejected = login_finished(&failed, failed.reason()).unwrap();
        assert_eq!(rejected.code(), ExitCodes::AUTH_FAILED);
        assert_eq!(rejected.message(), Some("Login failed: % Login invalid"));
    }

    #[tokio::test]
    async fn test_start_login_on_a_console_already_at_a_shell() {
        let (addr, _seen) = shell_console(b"Router#\r\nready\r\n").await;
        let session = session();
        let mut rx = session.subscribe();
        session.connect(DeviceIdentity::new(addr.to_string())).await.unwrap();

        // Lines are handled in order, so the prompt has been seen by now.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let SessionEvent::LineReceived(line) = rx.recv().await.unwrap() {
                    if line.text == "ready" {
                        break;
                    }
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(start_login(&session, "admin", "secret").await.ok(), Some(false));
        assert!(!session.is_logging_in());
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_login_without_connection() {
        let session = session();
        let Err(result) = start_login(&session, "admin", "secret").await else {
            panic!("login started without a connection");
        };
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_login_flag_on_shell_still_sends_commands() {
        let (addr, mut seen) = shell_console(b"Router#\r\n").await;
        let session = session();
        let args = connect_args(&[
            "--tcp",
            &addr.to_string(),
            "--login",
            "admin:secret",
            "-c",
            "show clock",
            "--linger-ms",
            "50",
        ]);
        let run = Run {
            session: &session,
            args: &args,
            credentials: Some(("admin".into(), "secret".into())),
            position: None,
            printer: quiet_printer(),
        };

        // No interactive input: the run ends after the linger.
        let (input_tx, input) = mpsc::unbounded_channel();
        drop(input_tx);
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            run.drive(DeviceIdentity::new(addr.to_string()), Duration::from_secs(5), input),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(result.is_success(), "{:?}", result.message());
        assert_eq!(session.state(), ConnectionState::None);

        let mut lines = Vec::new();
        while let Ok(Some(line)) = tokio::time::timeout(Duration::from_secs(1), seen.recv()).await {
            lines.push(line);
        }
        assert!(lines.contains(&"show clock".to_string()), "{lines:?}");
    }
}
