//! mvirt-dispatch: offline driver for the frame dispatch engine.
//!
//! Replays a trace of Ethernet frames through a single-threaded dispatcher
//! and reports where every frame was delivered.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mvirt_dispatch::config::{ConfigRegisters, DispatchConfig, Register};
use mvirt_dispatch::dataplane::{
    DEFAULT_QUEUE_DEPTH, Dispatcher, EgressDrain, EgressDrains, FrameFeeder, StatsSnapshot,
};
use mvirt_dispatch::trace::{encode_hex, load_trace};

/// Frame classification and dispatch engine
#[derive(Parser, Debug)]
#[command(name = "mvirt-dispatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a frame trace through the dispatcher
    Replay(ReplayArgs),
    /// Print the configuration register map
    Registers {
        /// Configuration file (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame trace (JSON list of hex-encoded frames)
    #[arg(long)]
    frames: PathBuf,

    /// Depth of each egress queue in words
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH)]
    queue_depth: usize,

    /// Register write applied before the replay, as ADDR=VALUE (repeatable)
    #[arg(long = "write", value_parser = parse_register_write)]
    writes: Vec<(u8, u32)>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

/// One frame as it left the dispatcher
#[derive(Debug, Serialize)]
struct Delivery {
    port: &'static str,
    len: usize,
    frame: String,
}

#[derive(Debug, Serialize)]
struct Report {
    ticks: u64,
    deliveries: Vec<Delivery>,
    stats: StatsSnapshot,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mvirt_dispatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Replay(args) => replay(args),
        Command::Registers { config } => {
            print_registers(&load_config(config.as_ref())?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<DispatchConfig> {
    match path {
        Some(path) => DispatchConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(DispatchConfig::default()),
    }
}

fn replay(args: ReplayArgs) -> Result<()> {
    let registers = Arc::new(ConfigRegisters::new(load_config(args.config.as_ref())?));
    for &(addr, value) in &args.writes {
        registers
            .write(addr, value)
            .with_context(|| format!("Register write {addr:#04x}={value:#x} rejected"))?;
    }

    let frames = load_trace(&args.frames)
        .with_context(|| format!("Failed to load trace {}", args.frames.display()))?;
    info!(frames = frames.len(), queue_depth = args.queue_depth, "Replaying trace");

    let (mut dispatcher, mut drains) = Dispatcher::with_queues(registers, args.queue_depth);
    let mut feeder = FrameFeeder::new();
    for frame in frames {
        feeder.push(frame);
    }

    let mut deliveries = Vec::new();
    let mut ticks = 0u64;
    while !(feeder.is_empty() && dispatcher.is_idle()) {
        dispatcher.step(&mut feeder);
        ticks += 1;
        collect(&mut drains, &mut deliveries);
    }
    collect(&mut drains, &mut deliveries);
    debug!(ticks, "Replay finished");

    let report = Report {
        ticks,
        deliveries,
        stats: dispatcher.stats().snapshot(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn collect(drains: &mut EgressDrains, out: &mut Vec<Delivery>) {
    let ports: [(&'static str, &mut EgressDrain); 3] = [
        ("slow", &mut drains.slow),
        ("other", &mut drains.other),
        ("fast", &mut drains.fast),
    ];
    for (port, drain) in ports {
        for frame in drain.drain_frames() {
            let bytes = frame.to_ethernet();
            out.push(Delivery {
                port,
                len: bytes.len(),
                frame: encode_hex(&bytes),
            });
        }
    }
}

fn print_report(report: &Report) {
    for d in &report.deliveries {
        println!("{:<5} {:>5}  {}", d.port, d.len, d.frame);
    }

    let s = &report.stats;
    println!();
    println!("ticks:        {}", report.ticks);
    println!("words in:     {}", s.words_in);
    println!(
        "frames:       {} (slow {}, other {}, both {}, fast {}, dropped {})",
        s.frames(),
        s.slow,
        s.other,
        s.both,
        s.fast,
        s.dropped
    );
    println!("short:        {}", s.short_frames);
    println!("truncated:    {}", s.truncations);
    println!("extended:     {}", s.extensions);
    println!("stall ticks:  {}", s.stall_ticks);
}

fn print_registers(config: &DispatchConfig) {
    println!("{:<6} {:<14} {:>10}", "ADDR", "NAME", "VALUE");
    for reg in Register::ALL {
        println!(
            "{:<6} {:<14} {:>#10x}",
            format!("{:#04x}", reg.addr()),
            reg.name(),
            config.read(reg)
        );
    }
}

/// Parse `ADDR=VALUE`; both sides accept decimal or `0x` hex
fn parse_register_write(s: &str) -> Result<(u8, u32), String> {
    let (addr, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=VALUE, got {s:?}"))?;
    let addr = parse_number(addr)?;
    let addr = u8::try_from(addr).map_err(|_| format!("register address {addr:#x} out of range"))?;
    Ok((addr, parse_number(value)?))
}

fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number {s:?}: {e}"))
}
