//! Writes synthetic access log lines, for exercising the monitor locally:
//!
//!   log-generator --qps 30 --output access_log
//!   log-generator --count 1000 > access_log

use chrono::Local;
use clap::Parser;
use rand::Rng;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use traffic_monitor::generator::{IpPool, LogGenerator};

#[derive(Parser, Debug)]
#[command(name = "log-generator", version, about = "Synthetic HTTP access log writer")]
struct Cli {
    /// Lines per second
    #[arg(long, default_value_t = 30.0)]
    qps: f64,

    /// Stop after this many lines
    #[arg(long)]
    count: Option<u64>,

    /// Append to this file instead of writing to stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Concurrent client sessions
    #[arg(long, default_value_t = 100)]
    sessions: usize,

    /// Requests per session before its address is retired
    #[arg(long, default_value_t = 10)]
    session_length: u32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if !(cli.qps > 0.0) {
        anyhow::bail!("--qps must be positive");
    }

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(OpenOptions::new().create(true).append(true).open(path)?),
        None => Box::new(io::stdout().lock()),
    };

    let mut generator = LogGenerator::new(IpPool::new(cli.sessions, cli.session_length));
    let mut rng = rand::rng();
    let pause = Duration::from_secs_f64(1.0 / cli.qps);

    let mut written = 0u64;
    while cli.count.is_none_or(|count| written < count) {
        writeln!(out, "{}", generator.line(&mut rng, Local::now()))?;
        out.flush()?;
        written += 1;

        // Up to 100ms of jitter between lines
        let jitter = Duration::from_secs_f64(rng.random_range(0.0..0.1));
        std::thread::sleep(pause + jitter);
    }

    Ok(())
}
