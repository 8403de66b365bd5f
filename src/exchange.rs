//! Request/acknowledge exchanges built on the pipe primitives.
//!
//! [`Exchange::request`] is the sender side: write one request block on the
//! set pipe, then wait for the literal `ACK` on the get pipe.
//! [`Exchange::respond_once`] is the matching single-shot receiver, and
//! [`Exchange::write_only`] sends a request without waiting for a reply.

use std::path::Path;
use std::time::Duration;

use tracing::{info, info_span};

use crate::config::{GlobalConfig, TimeoutConfig};
use crate::pipe::{ensure, PipeIo, ACK, BLOCK_SIZE};
use crate::{AppError, Result};

/// Result of a successful request/acknowledge exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    /// Bytes of the request accepted by the pipe.
    pub written: usize,
    /// Acknowledgement bytes as received.
    pub ack: Vec<u8>,
}

/// Both ends of the request/acknowledge protocol for one pipe pair.
#[derive(Debug, Clone)]
pub struct Exchange {
    config: GlobalConfig,
    io: PipeIo,
}

impl Exchange {
    /// Create an exchange over the pipes and budgets in `config`.
    #[must_use]
    pub fn new(config: GlobalConfig) -> Self {
        let io = PipeIo::from_config(&config);
        Self { config, io }
    }

    /// Pipe configuration in use.
    #[must_use]
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Send `payload` and wait for the receiver's acknowledgement.
    ///
    /// # Errors
    ///
    /// - `AppError::EmptyPayload` if `payload` is empty.
    /// - `AppError::PayloadTooLarge` if `payload` exceeds [`BLOCK_SIZE`].
    /// - Any pipe error from the request write or the acknowledgement read.
    /// - `AppError::ShortWrite` if the request was only partially written.
    /// - `AppError::AckMismatch` if the reply is anything other than `ACK`.
    pub fn request(&self, payload: &[u8]) -> Result<ExchangeOutcome> {
        self.request_then(payload, |_| {})
    }

    /// Like [`Exchange::request`], but calls `on_written` with the byte count
    /// as soon as the request is on the pipe, before the acknowledgement wait.
    ///
    /// # Errors
    ///
    /// Same as [`Exchange::request`]. `on_written` is not called when the
    /// request itself fails.
    pub fn request_then<F>(&self, payload: &[u8], on_written: F) -> Result<ExchangeOutcome>
    where
        F: FnOnce(usize),
    {
        let _span = info_span!("request", len = payload.len()).entered();
        check_payload(payload)?;

        // The reply pipe must exist before the receiver tries to answer.
        ensure(&self.config.get_pipe)?;

        let written =
            self.send_all(&self.config.set_pipe, payload, self.timeouts().request_write())?;
        info!(written, "request written, awaiting ACK");
        on_written(written);

        let ack = self
            .io
            .receive(&self.config.get_pipe, self.timeouts().ack_read())?;

        if ack != ACK {
            return Err(AppError::AckMismatch(format!(
                "expected \"ACK\", got {} bytes: {:?}",
                ack.len(),
                String::from_utf8_lossy(&ack)
            )));
        }

        info!(written, "request acknowledged");
        Ok(ExchangeOutcome { written, ack })
    }

    /// Send `payload` on the request pipe without waiting for a reply.
    ///
    /// # Errors
    ///
    /// - `AppError::EmptyPayload` if `payload` is empty.
    /// - `AppError::PayloadTooLarge` if `payload` exceeds [`BLOCK_SIZE`].
    /// - Any pipe error from the write.
    /// - `AppError::ShortWrite` if the request was only partially written.
    pub fn write_only(&self, payload: &[u8]) -> Result<usize> {
        check_payload(payload)?;
        self.send_all(&self.config.set_pipe, payload, self.timeouts().request_write())
    }

    /// Wait for one request and acknowledge it.
    ///
    /// Returns the request bytes.
    ///
    /// # Errors
    ///
    /// - Any pipe error from the request read or the acknowledgement write.
    /// - `AppError::Read` if a writer attached but sent nothing.
    /// - `AppError::ShortWrite` if the acknowledgement was only partially written.
    pub fn respond_once(&self) -> Result<Vec<u8>> {
        self.respond_once_then(|_| {})
    }

    /// Like [`Exchange::respond_once`], but hands the request to `on_request`
    /// before the acknowledgement is sent.
    ///
    /// # Errors
    ///
    /// Same as [`Exchange::respond_once`].
    pub fn respond_once_then<F>(&self, on_request: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&[u8]),
    {
        let _span = info_span!("respond_once").entered();

        ensure(&self.config.set_pipe)?;
        let request = self
            .io
            .receive(&self.config.set_pipe, self.timeouts().request_read())?;

        if request.is_empty() {
            return Err(AppError::Read(format!(
                "writer closed {} without sending data",
                self.config.set_pipe.display()
            )));
        }

        on_request(&request);
        info!(len = request.len(), "sending ACK");
        self.send_all(&self.config.get_pipe, ACK, self.timeouts().ack_write())?;
        Ok(request)
    }

    fn send_all(&self, path: &Path, payload: &[u8], timeout: Duration) -> Result<usize> {
        let written = self.io.send(path, payload, timeout)?;
        if written != payload.len() {
            return Err(AppError::ShortWrite {
                written,
                expected: payload.len(),
            });
        }
        Ok(written)
    }

    fn timeouts(&self) -> &TimeoutConfig {
        &self.config.timeouts
    }
}

fn check_payload(payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        return Err(AppError::EmptyPayload);
    }
    if payload.len() > BLOCK_SIZE {
        return Err(AppError::PayloadTooLarge {
            len: payload.len(),
            max: BLOCK_SIZE,
        });
    }
    Ok(())
}
