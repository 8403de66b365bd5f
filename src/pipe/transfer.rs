//! Bounded-timeout send and receive over a named pipe.
//!
//! Each call opens the pipe, moves one block, and closes it again. The handle
//! is an owned [`File`], so it is released on every return path.

use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use super::lifecycle::{ensure, open_for_read, open_for_write, WriteOpen};
use super::readiness::WaitStrategy;
use super::{BLOCK_SIZE, DEFAULT_POLL_QUANTUM};
use crate::config::GlobalConfig;
use crate::{AppError, Result};

/// Floor for the quantum so a zero value cannot stall the retry budget.
const MIN_QUANTUM: Duration = Duration::from_millis(1);

/// Tunables shared by bounded sends and receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeIo {
    quantum: Duration,
    strategy: WaitStrategy,
}

impl Default for PipeIo {
    fn default() -> Self {
        Self {
            quantum: DEFAULT_POLL_QUANTUM,
            strategy: WaitStrategy::default(),
        }
    }
}

impl PipeIo {
    /// Build with an explicit quantum and wait strategy.
    #[must_use]
    pub fn new(quantum: Duration, strategy: WaitStrategy) -> Self {
        Self {
            quantum: quantum.max(MIN_QUANTUM),
            strategy,
        }
    }

    /// Build from the quantum and strategy in `config`.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(config.poll_quantum(), config.wait_strategy)
    }

    /// Sleep quantum between writer-open attempts.
    #[must_use]
    pub fn quantum(&self) -> Duration {
        self.quantum
    }

    /// Write `payload` to the pipe at `path` in a single write call.
    ///
    /// Creates the pipe if needed, then retries the non-blocking open once per
    /// quantum until a reader attaches or `timeout` is spent. With a zero
    /// timeout exactly one open is attempted. Returns the number of bytes the
    /// write call accepted, which may be less than `payload.len()`.
    ///
    /// # Errors
    ///
    /// - `AppError::Creation` if the pipe cannot be created.
    /// - `AppError::Open` if opening fails for a reason other than a missing reader.
    /// - `AppError::Timeout` if no reader attached within `timeout`.
    /// - `AppError::Write` if the write call fails.
    pub fn send(&self, path: &Path, payload: &[u8], timeout: Duration) -> Result<usize> {
        ensure(path)?;
        let mut pipe = self.acquire_writer(path, timeout)?;

        let written = pipe.write(payload).map_err(|err| {
            AppError::Write(format!("cannot write to {}: {err}", path.display()))
        })?;

        info!(path = %path.display(), written, requested = payload.len(), "sent block");
        Ok(written)
    }

    /// Read one block of at most [`BLOCK_SIZE`] bytes from the pipe at `path`.
    ///
    /// The pipe must already exist. Exactly one read is issued once the handle
    /// becomes readable, so a short block is returned as-is; an empty block
    /// means a writer attached and left without writing.
    ///
    /// # Errors
    ///
    /// - `AppError::Open` if the pipe cannot be opened.
    /// - `AppError::Timeout` if no data arrived within `timeout`.
    /// - `AppError::Wait` if the readiness wait fails.
    /// - `AppError::Read` if the read call fails.
    pub fn receive(&self, path: &Path, timeout: Duration) -> Result<Vec<u8>> {
        let mut pipe = open_for_read(path)?;

        if !self
            .strategy
            .wait_readable(pipe.as_fd(), timeout, self.quantum)?
        {
            return Err(AppError::Timeout(format!(
                "no data arrived on {} within {timeout:?}",
                path.display()
            )));
        }

        let mut block = vec![0_u8; BLOCK_SIZE];
        let read = pipe.read(&mut block).map_err(|err| {
            AppError::Read(format!("cannot read from {}: {err}", path.display()))
        })?;
        block.truncate(read);

        info!(path = %path.display(), read, "received block");
        Ok(block)
    }

    fn acquire_writer(&self, path: &Path, timeout: Duration) -> Result<File> {
        let mut remaining = timeout;
        loop {
            if let WriteOpen::Ready(pipe) = open_for_write(path)? {
                return Ok(pipe);
            }

            if remaining.is_zero() {
                return Err(AppError::Timeout(format!(
                    "waiting for reader to attach to {} after {timeout:?}",
                    path.display()
                )));
            }

            debug!(path = %path.display(), ?remaining, "no reader attached, retrying");
            let nap = self.quantum.min(remaining);
            thread::sleep(nap);
            remaining -= nap;
        }
    }
}

/// [`PipeIo::send`] with the default quantum and wait strategy.
///
/// # Errors
///
/// See [`PipeIo::send`].
pub fn send(path: &Path, payload: &[u8], timeout: Duration) -> Result<usize> {
    PipeIo::default().send(path, payload, timeout)
}

/// [`PipeIo::receive`] with the default quantum and wait strategy.
///
/// # Errors
///
/// See [`PipeIo::receive`].
pub fn receive(path: &Path, timeout: Duration) -> Result<Vec<u8>> {
    PipeIo::default().receive(path, timeout)
}
