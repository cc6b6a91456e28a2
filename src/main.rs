//! Entry point for `arq-sim`.
//!
//! Parses CLI arguments, builds a [`SimConfig`] from a preset plus overrides,
//! and feeds operator commands (stdin or `--script`) into a session.  All
//! protocol work lives in the library; `main.rs` owns only process setup
//! (logging, argument parsing, line I/O).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use arq_sim::command::{OperatorCommand, COMMAND_HELP};
use arq_sim::config::{Mode, SimConfig};
use arq_sim::event::SimEvent;
use arq_sim::session::{self, Simulation};

/// Step-by-step simulator for sliding-window ARQ and congestion control.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a session, reading operator commands line by line.
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Demo preset: stop-and-wait, go-back-n, slow-start, aimd or tcp.
    #[arg(short, long, default_value = "tcp")]
    mode: Mode,

    /// Number of segments in the stream.
    #[arg(long)]
    segments: Option<u32>,

    /// Initial window size.
    #[arg(short, long)]
    window: Option<u32>,

    /// Retransmission timeout, in simulated seconds.
    #[arg(short, long)]
    timeout: Option<u32>,

    /// Slow-start threshold.
    #[arg(long)]
    ssthresh: Option<u32>,

    /// Cap on exponential window growth.
    #[arg(long)]
    cap: Option<u32>,

    /// One-way network delay, in ticks.
    #[arg(long)]
    transit: Option<u32>,

    /// Probability of losing each segment and ACK.
    #[arg(long)]
    loss_rate: Option<f64>,

    /// Seed for the generated loss plan.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Tick once per real second instead of only on `tick` commands.
    #[arg(long)]
    realtime: bool,

    /// Read commands from a file instead of stdin.
    #[arg(long)]
    script: Option<PathBuf>,
}

impl RunArgs {
    fn config(&self) -> SimConfig {
        let mut cfg = SimConfig::preset(self.mode);
        if let Some(cap) = self.cap {
            cfg = cfg.with_cap(cap);
        }
        if let Some(n) = self.segments {
            cfg.total_segments = n;
        }
        if let Some(w) = self.window {
            cfg.initial_window = w;
        }
        if let Some(t) = self.timeout {
            cfg.timer.timeout_secs = t;
        }
        if let Some(s) = self.ssthresh {
            cfg.ssthresh = s;
        }
        if let Some(t) = self.transit {
            cfg.transit_ticks = t;
        }
        if let Some(p) = self.loss_rate {
            cfg.loss_rate = p;
        }
        cfg.seed = self.seed;
        cfg
    }

    async fn input(&self) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
        match &self.script {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("opening script {}", path.display()))?;
                Ok(Box::new(BufReader::new(file)))
            }
            None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let cfg = args.config();
            let input = args.input().await?;
            log::info!("Starting {} session", cfg.mode);
            if args.realtime {
                run_realtime(cfg, input).await
            } else {
                run_stepped(cfg, input).await
            }
        }
    }
}

/// Deterministic mode: time only moves on `tick`.
async fn run_stepped(cfg: SimConfig, input: Box<dyn AsyncBufRead + Unpin + Send>) -> Result<()> {
    let mut sim = Simulation::new(cfg).context("invalid configuration")?;
    for event in sim.transcript() {
        println!("{event}");
    }

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(cmd) = parse_line(&line) else {
            continue;
        };
        for event in sim.apply(cmd) {
            println!("{event}");
        }
    }
    Ok(())
}

enum Input {
    Line(Option<String>),
    Event(SimEvent),
}

/// Background session with a real 1-second tick.
async fn run_realtime(cfg: SimConfig, input: Box<dyn AsyncBufRead + Unpin + Send>) -> Result<()> {
    let mut handle = session::spawn(cfg).context("invalid configuration")?;
    let mut lines = input.lines();

    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            Some(event) = handle.next_event() => Input::Event(event),
        };
        match input {
            Input::Line(Some(line)) => {
                if let Some(cmd) = parse_line(&line) {
                    handle.send(cmd).await?;
                }
            }
            Input::Line(None) => break,
            Input::Event(event) => println!("{event}"),
        }
    }

    // Flush what was already produced before shutting down.
    while let Ok(event) = handle.events.try_recv() {
        println!("{event}");
    }
    let sim = handle.close().await?;
    log::info!("Session ended at t={}", sim.now());
    Ok(())
}

fn parse_line(line: &str) -> Option<OperatorCommand> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match line.parse() {
        Ok(cmd) => Some(cmd),
        Err(e) => {
            eprintln!("{e}; {COMMAND_HELP}");
            None
        }
    }
}
