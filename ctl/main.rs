#![forbid(unsafe_code)]

//! `fifo-ack-ctl` — sender side of the named-pipe request/acknowledge protocol.
//!
//! Writes one request block on the set pipe and, for `send`, waits for the
//! receiver's `ACK` on the get pipe. Exits non-zero on any failure.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use fifo_ack::exchange::Exchange;
use fifo_ack::logging::{init_tracing, LogFormat};
use fifo_ack::{GlobalConfig, Result};

#[derive(Debug, Parser)]
#[command(
    name = "fifo-ack-ctl",
    about = "Send requests to a fifo-ackd receiver",
    version,
    long_about = None
)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the request pipe path.
    #[arg(long)]
    set_pipe: Option<PathBuf>,

    /// Override the acknowledgement pipe path.
    #[arg(long)]
    get_pipe: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a request and wait for the receiver's acknowledgement.
    Send {
        /// Request payload.
        payload: String,
    },

    /// Send a request without waiting for an acknowledgement.
    Write {
        /// Request payload.
        payload: String,
    },
}

fn main() {
    let args = Cli::parse();

    if let Err(err) = run(&args) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Cli) -> Result<()> {
    init_tracing(args.log_format, "warn")?;

    let config = match args.config {
        Some(ref path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    }
    .with_overrides(args.set_pipe.clone(), args.get_pipe.clone())?;
    let exchange = Exchange::new(config);

    match &args.command {
        Command::Send { payload } => {
            println!("writing: \"{payload}\"");
            let outcome = exchange.request_then(payload.as_bytes(), |written| {
                println!("Successfully written {written} bytes");
            })?;
            println!("Received : {}", String::from_utf8_lossy(&outcome.ack));
        }
        Command::Write { payload } => {
            println!("writing: \"{payload}\"");
            let written = exchange.write_only(payload.as_bytes())?;
            println!("Successfully written {written} bytes");
        }
    }

    Ok(())
}
