//! Error types shared across the library and both binaries.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering every pipe and exchange failure.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The FIFO entry could not be created.
    Creation(String),
    /// A handle could not be obtained for a reason other than "no reader yet".
    Open(String),
    /// A bounded wait expired before the awaited condition occurred.
    Timeout(String),
    /// The readiness mechanism itself failed.
    Wait(String),
    /// Byte-level write failure.
    Write(String),
    /// Byte-level read failure after readiness was signalled.
    Read(String),
    /// Payload is empty; a zero-byte write is indistinguishable from no data.
    EmptyPayload,
    /// Payload exceeds the single-transfer block capacity.
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },
    /// Fewer bytes were written than the payload holds.
    ShortWrite {
        /// Bytes actually written.
        written: usize,
        /// Bytes requested.
        expected: usize,
    },
    /// The acknowledgement did not match the expected literal.
    AckMismatch(String),
    /// Process-level I/O or runtime failure outside the pipe primitives.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Creation(msg) => write!(f, "creation: {msg}"),
            Self::Open(msg) => write!(f, "open: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Wait(msg) => write!(f, "wait: {msg}"),
            Self::Write(msg) => write!(f, "write: {msg}"),
            Self::Read(msg) => write!(f, "read: {msg}"),
            Self::EmptyPayload => write!(f, "empty payload: nothing to send"),
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload too large: {len} bytes exceeds {max}")
            }
            Self::ShortWrite { written, expected } => {
                write!(f, "short write: {written} of {expected} bytes")
            }
            Self::AckMismatch(msg) => write!(f, "ack mismatch: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
