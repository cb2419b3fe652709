mod pigpio;
mod settings;

use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{bounded, select, unbounded, Receiver as Channel};
use gpiofsk_core::sim::{LoopbackCapture, LoopbackLine, SimulatedClock};
use gpiofsk_core::{
    Authenticator, Clock, FrameEvent, LinkError, LinkMode, Receiver, SymbolDecoder, SystemClock,
    TransmitSequencer, WaveformOutput,
};
use pigpio::{PigpioCapture, PigpioOutput};
use settings::Settings;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

const EXIT_COMMAND: &str = "exit";
const PROMPT: &str = "Enter a string to transmit (or 'exit' to quit)";

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("Failed to parse config {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("No message decoded")]
    NothingDecoded,
}

#[derive(Parser)]
#[command(name = "gpiofsk")]
#[command(about = "Frequency-shift-keyed link over a GPIO pin pair")]
struct Cli {
    #[command(flatten)]
    link: LinkArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Link mode: binary (framed bits) or character (one tone per character)
    #[arg(long, global = true)]
    pub mode: Option<LinkMode>,

    /// pigpio daemon address (default: 127.0.0.1:8888)
    #[arg(long, global = true, value_name = "HOST:PORT")]
    pub pigpio: Option<String>,

    /// GPIO driven by the transmitter
    #[arg(long, global = true)]
    pub output_pin: Option<u32>,

    /// GPIO sampled by the receiver
    #[arg(long, global = true)]
    pub input_pin: Option<u32>,

    /// Tone duration in milliseconds
    #[arg(long, global = true)]
    pub bit_ms: Option<u64>,

    /// Frequency match tolerance in Hz
    #[arg(long, global = true)]
    pub tolerance: Option<f64>,

    /// Credential the receiver authenticates against
    #[arg(long, global = true)]
    pub credential: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send messages typed at a prompt, or a fixed message
    Transmit {
        /// Message to send instead of prompting
        #[arg(short, long)]
        message: Option<String>,

        /// How many times to send --message
        #[arg(short, long, default_value = "1")]
        repeat: usize,
    },

    /// Listen continuously and check each message against the credential
    Receive,

    /// Receive in the background while sending messages typed at the prompt
    Link,

    /// Send a message through the simulated medium and decode it back
    Loopback {
        /// Message to send (default: the credential)
        #[arg(short, long)]
        message: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.link.verbose);
    let settings = Settings::resolve(&cli.link)?;

    match cli.command {
        Commands::Transmit { message, repeat } => {
            transmit_command(&settings, message.as_deref(), repeat)?
        }
        Commands::Receive => receive_command(&settings)?,
        Commands::Link => link_command(&settings)?,
        Commands::Loopback { message } => loopback_command(&settings, message.as_deref())?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Interrupt flag plus a channel that fires once on Ctrl-C
struct Shutdown {
    flag: Arc<AtomicBool>,
    signal: Channel<()>,
}

impl Shutdown {
    fn install() -> Result<Self, CliError> {
        let flag = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(1);
        let handler_flag = flag.clone();
        ctrlc::set_handler(move || {
            handler_flag.store(true, Ordering::SeqCst);
            let _ = tx.try_send(());
        })?;
        Ok(Self { flag, signal: rx })
    }

    fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

fn open_transmitter(
    settings: &Settings,
    clock: Arc<dyn Clock>,
    shutdown: &Shutdown,
) -> Result<TransmitSequencer<PigpioOutput>, CliError> {
    let mut output = PigpioOutput::connect(&settings.pigpio_addr)?;
    output.set_output_mode(settings.link.output_pin)?;
    info!(
        "Transmitting on GPIO {} ({} mode)",
        settings.link.output_pin, settings.link.mode
    );
    Ok(TransmitSequencer::new(Arc::new(Mutex::new(output)), clock, &settings.link)?
        .with_cancel(shutdown.flag.clone()))
}

type PigpioReceiver = Receiver<PigpioCapture, Box<dyn SymbolDecoder>>;

fn open_receiver(settings: &Settings, clock: Arc<dyn Clock>) -> Result<PigpioReceiver, CliError> {
    let capture = PigpioCapture::connect(&settings.pigpio_addr)?;
    let receiver = Receiver::from_config(capture, clock, &settings.link)?;
    info!(
        "Listening on GPIO {} ({} mode)",
        settings.link.input_pin, settings.link.mode
    );
    Ok(receiver)
}

/// Line printed for a receive event; frames without payload are marker noise
fn outcome_line(auth: &Authenticator, event: &FrameEvent) -> Option<String> {
    match event {
        FrameEvent::Completed(frame) if frame.is_empty() => {
            debug!("Empty frame ignored");
            None
        }
        FrameEvent::Completed(frame) => Some(auth.check(frame).to_string()),
        FrameEvent::TimedOut => {
            debug!("Frame abandoned");
            None
        }
    }
}

fn report(auth: &Authenticator, event: &FrameEvent) {
    if let Some(line) = outcome_line(auth, event) {
        println!("{}", line);
    }
}

fn spawn_reporter(events: Channel<FrameEvent>, auth: Authenticator) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for event in events {
            report(&auth, &event);
        }
    })
}

/// Read lines on a separate thread so Ctrl-C can interrupt a blocked prompt
fn spawn_prompt() -> Channel<String> {
    let (tx, rx) = unbounded();
    std::thread::spawn(move || {
        if std::io::stdin().is_terminal() {
            loop {
                let line = dialoguer::Input::<String>::new()
                    .with_prompt(PROMPT)
                    .allow_empty(true)
                    .interact_text();
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        } else {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        }
    });
    rx
}

/// Send each prompted line until `exit`, end of input, or Ctrl-C
fn prompt_loop(tx: &TransmitSequencer<PigpioOutput>, shutdown: &Shutdown) -> Result<(), CliError> {
    let lines = spawn_prompt();
    loop {
        select! {
            recv(lines) -> line => {
                let Ok(line) = line else { break };
                let line = line.trim_end();
                if line.eq_ignore_ascii_case(EXIT_COMMAND) {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                match tx.send(line) {
                    Ok(()) => {}
                    Err(LinkError::Cancelled) => break,
                    Err(e) => return Err(e.into()),
                }
            }
            recv(shutdown.signal) -> _ => break,
        }
    }
    Ok(())
}

fn transmit_command(settings: &Settings, message: Option<&str>, repeat: usize) -> Result<(), CliError> {
    let shutdown = Shutdown::install()?;
    let tx = open_transmitter(settings, Arc::new(SystemClock::new()), &shutdown)?;

    let result = match message {
        Some(message) => send_repeated(&tx, message, repeat),
        None => prompt_loop(&tx, &shutdown),
    };

    info!("Exiting...");
    tx.halt()?;
    result
}

fn send_repeated(
    tx: &TransmitSequencer<PigpioOutput>,
    message: &str,
    repeat: usize,
) -> Result<(), CliError> {
    for _ in 0..repeat {
        match tx.send(message) {
            Ok(()) => {}
            Err(LinkError::Cancelled) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn receive_command(settings: &Settings) -> Result<(), CliError> {
    let shutdown = Shutdown::install()?;
    let handle = open_receiver(settings, Arc::new(SystemClock::new()))?
        .spawn(shutdown.flag.clone())?;
    let reporter = spawn_reporter(
        handle.events.clone(),
        Authenticator::new(settings.credential.clone()),
    );

    loop {
        select! {
            recv(shutdown.signal) -> _ => break,
            default(Duration::from_millis(200)) => {
                if handle.is_finished() {
                    break;
                }
            }
        }
    }

    info!("Exiting...");
    shutdown.trigger();
    let result = handle.join();
    let _ = reporter.join();
    if let Err(e) = &result {
        error!("Receiver failed: {}", e);
    }
    Ok(result?)
}

fn link_command(settings: &Settings) -> Result<(), CliError> {
    let shutdown = Shutdown::install()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    // both connections must be up before the receive loop starts
    let receiver = open_receiver(settings, clock.clone())?;
    let tx = open_transmitter(settings, clock, &shutdown)?;

    let handle = receiver.spawn(shutdown.flag.clone())?;
    let reporter = spawn_reporter(
        handle.events.clone(),
        Authenticator::new(settings.credential.clone()),
    );

    let result = prompt_loop(&tx, &shutdown);

    info!("Exiting...");
    shutdown.trigger();
    tx.halt()?;
    handle.join()?;
    let _ = reporter.join();
    result
}

fn loopback_command(settings: &Settings, message: Option<&str>) -> Result<(), CliError> {
    let message = message.unwrap_or(settings.credential.as_str());

    let tx_clock = SimulatedClock::new();
    let line = LoopbackLine::new(Arc::new(tx_clock.clone()));
    let mut output = line.clone();
    output.set_output_mode(settings.link.output_pin)?;
    let tx = TransmitSequencer::new(
        Arc::new(Mutex::new(output)),
        Arc::new(tx_clock.clone()),
        &settings.link,
    )?;
    tx.send(message)?;

    // replay the recording from time zero, one window past the last tone
    let rx_clock = SimulatedClock::new();
    let capture = LoopbackCapture::new(line, Arc::new(rx_clock.clone()));
    let mut receiver = Receiver::from_config(capture, Arc::new(rx_clock.clone()), &settings.link)?;
    let auth = Authenticator::new(settings.credential.clone());
    let end = tx_clock.now() + settings.link.sampling_window();

    let mut decoded = None;
    while rx_clock.now() < end {
        if let Some(event) = receiver.poll()? {
            report(&auth, &event);
            match event {
                FrameEvent::Completed(frame) if !frame.is_empty() => {
                    decoded = frame.message().ok();
                }
                _ => {}
            }
        }
    }

    match decoded {
        Some(text) => {
            println!("Decoded message: {}", text);
            Ok(())
        }
        None => Err(CliError::NothingDecoded),
    }
}
