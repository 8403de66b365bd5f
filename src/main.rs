#![forbid(unsafe_code)]

//! `fifo-ackd` — receiver side of the named-pipe request/acknowledge protocol.
//!
//! By default runs the continuous receiver loop on the request pipe until the
//! `quit` sentinel arrives or SIGINT/SIGTERM is received. `--once` answers a
//! single request and exits; `--no-ack` listens without replying.

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use fifo_ack::exchange::Exchange;
use fifo_ack::logging::{init_tracing, LogFormat};
use fifo_ack::receiver::ReceiverLoop;
use fifo_ack::{AppError, GlobalConfig, Result};

#[derive(Debug, Parser)]
#[command(name = "fifo-ackd", about = "Named-pipe request receiver", version, long_about = None)]
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

    /// Answer a single request, then exit.
    #[arg(long, conflicts_with = "no_ack")]
    once: bool,

    /// Print requests without acknowledging them.
    #[arg(long)]
    no_ack: bool,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format, "info")?;

    let config = match args.config {
        Some(ref path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    }
    .with_overrides(args.set_pipe.clone(), args.get_pipe.clone())?;

    info!(
        set_pipe = %config.set_pipe.display(),
        get_pipe = %config.get_pipe.display(),
        "fifo-ackd starting"
    );

    if args.once {
        return respond_once(config);
    }

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Io(format!("failed to build tokio runtime: {err}")))?
        .block_on(serve(config, args.no_ack))
}

fn respond_once(config: GlobalConfig) -> Result<()> {
    Exchange::new(config)
        .respond_once_then(|request| {
            println!("Received : {}", String::from_utf8_lossy(request));
        })
        .map_err(|err| {
            error!(%err, "single exchange failed");
            err
        })?;
    println!("Successfully written {} bytes", fifo_ack::pipe::ACK.len());
    Ok(())
}

async fn serve(config: GlobalConfig, no_ack: bool) -> Result<()> {
    let ct = CancellationToken::new();

    let loop_ct = ct.clone();
    let mut handle = tokio::task::spawn_blocking(move || {
        let mut receiver = ReceiverLoop::new(&config, loop_ct);
        if no_ack {
            receiver = receiver.listen_only();
        }
        receiver.run(|block| {
            println!("Received data: {}", String::from_utf8_lossy(block));
        })
    });

    let joined = tokio::select! {
        joined = &mut handle => joined,
        () = shutdown_signal() => {
            info!("shutdown signal received");
            ct.cancel();
            handle.await
        }
    };

    let exit = joined
        .map_err(|err| AppError::Io(format!("receiver task failed: {err}")))?
        .map_err(|err| {
            error!(%err, "receiver loop failed");
            err
        })?;

    info!(?exit, "fifo-ackd shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(err) => {
            tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
            let _ = ctrl_c.await;
        }
    }
}
