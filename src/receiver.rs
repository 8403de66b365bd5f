//! Continuous receiver loop.
//!
//! Holds one read handle on the request pipe for its whole lifetime and polls
//! it with non-blocking reads. Every non-empty block is handed to the caller
//! and, unless the loop is listen-only, answered with `ACK` on the reply pipe.
//!
//! ```text
//!            read → 0 / would-block (sleep one quantum)
//!              ┌──────┐
//!              ▼      │
//!   start ──► Idle ───┘
//!              │  ▲
//!  read → ≥1   │  │ payload != "quit"
//!              ▼  │
//!           Draining ──── payload == "quit" ───► Stopped
//!
//!   cancellation (checked before every read) ──► Stopped
//! ```

use std::io::{self, Read};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn};

use crate::config::GlobalConfig;
use crate::pipe::{ensure, open_for_read, PipeIo, ACK, BLOCK_SIZE, QUIT};
use crate::{AppError, Result};

/// Observable state of a [`ReceiverLoop`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopState {
    /// Handle open, waiting for data.
    Idle,
    /// A block was read and is being handed off and acknowledged.
    Draining,
    /// The loop has exited and released its handle.
    Stopped,
}

/// Why a [`ReceiverLoop::run`] call returned normally.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopExit {
    /// The `quit` sentinel was received.
    Sentinel,
    /// The cancellation token fired.
    Cancelled,
}

/// Long-running receiver bound to one request pipe.
#[derive(Debug)]
pub struct ReceiverLoop {
    inbound: PathBuf,
    reply: Option<PathBuf>,
    io: PipeIo,
    ack_timeout: Duration,
    cancel: CancellationToken,
    state: LoopState,
    received: u64,
    acknowledged: u64,
}

impl ReceiverLoop {
    /// Build a loop that reads `config.set_pipe` and replies on `config.get_pipe`.
    #[must_use]
    pub fn new(config: &GlobalConfig, cancel: CancellationToken) -> Self {
        Self {
            inbound: config.set_pipe.clone(),
            reply: Some(config.get_pipe.clone()),
            io: PipeIo::from_config(config),
            ack_timeout: config.timeouts.ack_write(),
            cancel,
            state: LoopState::Idle,
            received: 0,
            acknowledged: 0,
        }
    }

    /// Disable acknowledgements; received blocks are only handed to the caller.
    #[must_use]
    pub fn listen_only(mut self) -> Self {
        self.reply = None;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Number of non-empty blocks read so far.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Number of acknowledgements delivered in full.
    #[must_use]
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }

    /// Run until the sentinel arrives or the token is cancelled.
    ///
    /// `on_block` is called with each received block before it is
    /// acknowledged. A failed acknowledgement is logged and the loop keeps
    /// going. The read handle is closed before this returns, on every path.
    ///
    /// # Errors
    ///
    /// - `AppError::Creation` / `AppError::Open` if the request pipe cannot be
    ///   prepared.
    /// - `AppError::Read` on any read failure other than would-block.
    pub fn run<F>(&mut self, mut on_block: F) -> Result<LoopExit>
    where
        F: FnMut(&[u8]),
    {
        let span = info_span!("receiver_loop", pipe = %self.inbound.display());
        let _guard = span.enter();

        ensure(&self.inbound)?;
        let mut pipe = open_for_read(&self.inbound)?;
        self.state = LoopState::Idle;
        info!(listen_only = self.reply.is_none(), "receiver loop started");

        let mut block = vec![0_u8; BLOCK_SIZE];
        let outcome = loop {
            if self.cancel.is_cancelled() {
                info!("cancellation requested");
                break Ok(LoopExit::Cancelled);
            }

            match pipe.read(&mut block) {
                Ok(0) => thread::sleep(self.io.quantum()),
                Ok(len) => {
                    self.state = LoopState::Draining;
                    self.received += 1;
                    let payload = &block[..len];
                    debug!(len, "block received");
                    on_block(payload);
                    self.acknowledge();

                    if payload == QUIT {
                        info!("sentinel received");
                        break Ok(LoopExit::Sentinel);
                    }
                    self.state = LoopState::Idle;
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    thread::sleep(self.io.quantum());
                }
                Err(err) => {
                    break Err(AppError::Read(format!(
                        "cannot read from {}: {err}",
                        self.inbound.display()
                    )));
                }
            }
        };

        drop(pipe);
        self.state = LoopState::Stopped;
        info!(
            received = self.received,
            acknowledged = self.acknowledged,
            "receiver loop stopped"
        );
        outcome
    }

    fn acknowledge(&mut self) {
        let Some(reply) = self.reply.as_deref() else {
            return;
        };

        match self.io.send(reply, ACK, self.ack_timeout) {
            Ok(written) if written == ACK.len() => {
                self.acknowledged += 1;
                info!(written, "ACK delivered");
            }
            Ok(written) => {
                warn!(written, expected = ACK.len(), "ACK only partially written");
            }
            Err(err) => {
                warn!(%err, "ACK not delivered");
            }
        }
    }
}
