//! Probe CLI - run the probe firmware against a simulated ground link.
//!
//! Usage:
//!   probe [--config FILE] [--polling] [--probe-id ID] [--capture-dir DIR] [--trace] [-- MESSAGE...]
//!
//! Each message, given after `--` or read line by line from stdin, is
//! `SENDER: BODY` or just `BODY` (sent from the ground id).
//!
//! Examples:
//!   probe -- TAKE_PICTURE                      # One picture for Earth
//!   probe --polling -- "Mars: TAKE_PICTURE"    # Polling mode, sent from Mars
//!   probe --capture-dir shots                  # Commands from stdin, pictures saved as PPM

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use clap::Parser;
use crossterm::style::Stylize;
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use probe_core::{
    decode_rgb332, CameraUplink, Envelope, Idle, MessageBus, MessageQueue, Probe, ProbeConfig,
    ProbeConsole, RunModeKind, TestPattern, Wake,
};

/// Space probe simulator CLI
#[derive(Parser, Debug)]
#[command(name = "probe")]
#[command(about = "Run the space probe mailbox firmware")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Poll the receiver status register instead of waiting for interrupts
    #[arg(long)]
    polling: bool,

    /// Override the probe id
    #[arg(long)]
    probe_id: Option<String>,

    /// Directory to write received pictures to
    #[arg(long)]
    capture_dir: Option<PathBuf>,

    /// Enable protocol tracing
    #[arg(short, long)]
    trace: bool,

    /// Messages to send instead of reading stdin
    #[arg(last = true)]
    messages: Vec<String>,
}

/// One line of ground input.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Uplink {
    sender: String,
    body: String,
}

/// Parse `SENDER: BODY` or `BODY`. Blank lines yield None.
fn parse_line(line: &str, ground_id: &str) -> Option<Uplink> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(':') {
        Some((sender, body)) if !sender.trim().is_empty() && !sender.trim().contains(' ') => {
            Some(Uplink {
                sender: sender.trim().to_string(),
                body: body.trim().to_string(),
            })
        }
        _ => Some(Uplink {
            sender: ground_id.to_string(),
            body: line.to_string(),
        }),
    }
}

/// Console that writes probe output to stdout.
struct StdoutConsole;

impl ProbeConsole for StdoutConsole {
    fn print(&mut self, text: &str) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let _ = write!(handle, "{}", text.cyan());
        let _ = handle.flush();
    }
}

/// Idle primitive fed by the ground input channel.
///
/// Every wake first ticks the link, so frames sent by the last pass reach
/// the ground and uplinked messages reach the probe queue.
struct ChannelIdle {
    rx: mpsc::Receiver<Uplink>,
    link: MessageBus,
    probe_id: String,
    queue: MessageQueue,
}

impl ChannelIdle {
    fn tick_link(&self) {
        if let Err(e) = self.link.tick() {
            error!("link tick failed: {}", e);
        }
    }

    fn forward(&self, uplink: Uplink) {
        if let Err(e) = self
            .link
            .send(&uplink.sender, &self.probe_id, uplink.body.as_bytes())
        {
            error!("uplink from {} lost: {}", uplink.sender, e);
        }
        self.tick_link();
    }

    fn drained(&self) -> Wake {
        self.tick_link();
        if self.queue.is_empty() {
            Wake::Shutdown
        } else {
            Wake::Continue
        }
    }
}

impl Idle for ChannelIdle {
    fn wait_for_interrupt(&mut self) -> Wake {
        self.tick_link();
        if !self.queue.is_empty() {
            return Wake::Continue;
        }
        match self.rx.recv() {
            Ok(uplink) => {
                self.forward(uplink);
                Wake::Continue
            }
            Err(_) => self.drained(),
        }
    }

    fn delay(&mut self, iterations: u32) -> Wake {
        self.tick_link();
        match self.rx.recv_timeout(Duration::from_micros(u64::from(iterations))) {
            Ok(uplink) => {
                self.forward(uplink);
                Wake::Continue
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Wake::Continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => self.drained(),
        }
    }
}

/// Encode RGBA pixels as a binary PPM.
fn encode_ppm(pixels: &[[u8; 4]], width: usize, height: usize) -> Vec<u8> {
    let mut out = format!("P6\n{} {}\n255\n", width, height).into_bytes();
    out.reserve(pixels.len() * 3);
    for [r, g, b, _] in pixels {
        out.extend_from_slice(&[*r, *g, *b]);
    }
    out
}

/// Decode a received frame and save it under `dir`.
fn save_picture(
    dir: &Path,
    envelope: &Envelope,
    index: usize,
    width: usize,
    height: usize,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let pixels = decode_rgb332(&envelope.payload, width, height)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}-{:03}.ppm", envelope.sender, index));
    std::fs::write(&path, encode_ppm(&pixels, width, height))?;
    Ok(path)
}

fn load_config(args: &Args) -> Result<ProbeConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::default(),
    };
    if args.polling {
        config.mode = RunModeKind::Polling;
    }
    if let Some(id) = &args.probe_id {
        config.probe_id = id.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.trace { "trace" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format!("Failed to load configuration: {}", e).red());
            return Err(e);
        }
    };

    let link = MessageBus::new();

    // Ground station: report pictures and optionally save them
    let frame = config.frame;
    let capture_dir = args.capture_dir.clone();
    let received = Arc::new(AtomicUsize::new(0));
    link.subscribe(config.ground_id.clone(), move |envelope: &Envelope| {
        let index = received.fetch_add(1, Ordering::Relaxed) + 1;
        let line = format!(
            "Picture {} from {} ({} bytes)",
            index,
            envelope.sender,
            envelope.payload.len()
        );
        eprintln!("{}", line.green());
        if let Some(dir) = &capture_dir {
            match save_picture(dir, envelope, index, frame.width, frame.height) {
                Ok(path) => info!("saved {}", path.display()),
                Err(e) => error!("picture {} not saved: {}", index, e),
            }
        }
    })?;

    let (tx, rx) = mpsc::channel::<Uplink>();
    let ground_id = config.ground_id.clone();

    let input_handle = if args.messages.is_empty() {
        // Forward stdin until EOF
        Some(tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(uplink) = parse_line(&line, &ground_id) {
                            if tx.send(uplink).is_err() {
                                break; // Probe stopped
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("stdin: {}", e);
                        break;
                    }
                }
            }
        }))
    } else {
        for message in &args.messages {
            if let Some(uplink) = parse_line(message, &ground_id) {
                tx.send(uplink)?;
            }
        }
        drop(tx);
        None
    };

    let probe_handle = tokio::task::spawn_blocking(move || {
        let uplink = CameraUplink::new(
            config.probe_id.clone(),
            link.clone(),
            config.frame,
            TestPattern::default(),
        );
        let probe_id = config.probe_id.clone();
        let mut probe = Probe::new(config, StdoutConsole, uplink);

        let queue = probe.queue();
        link.subscribe(probe_id.clone(), move |envelope: &Envelope| {
            if let Err(e) = queue.push(&envelope.sender, &envelope.payload) {
                warn!("message from {} rejected: {}", envelope.sender, e);
            }
        })?;

        let mut idle = ChannelIdle {
            rx,
            link,
            probe_id,
            queue: probe.queue(),
        };
        probe.run(&mut idle)
    });

    let result = probe_handle.await?;

    if let Some(handle) = input_handle {
        handle.abort();
    }

    match result {
        Ok(stats) => {
            info!(
                "{} passes, {} messages consumed, {} unknown, {} errors",
                stats.passes, stats.consumed, stats.unknown, stats.errors
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            Err(e.into())
        }
    }
}
