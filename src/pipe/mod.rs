//! Named-pipe I/O primitives.
//!
//! A channel is a FIFO addressed by a filesystem path. Each transfer moves at
//! most [`BLOCK_SIZE`] bytes through one open/close cycle:
//!
//! - [`lifecycle`] creates the FIFO on demand and opens it without blocking.
//! - [`readiness`] waits for a handle to become readable within a deadline.
//! - [`transfer`] composes the two into bounded [`send`](transfer::send) and
//!   [`receive`](transfer::receive) calls.

pub mod lifecycle;
pub mod readiness;
pub mod transfer;

use std::time::Duration;

pub use lifecycle::{ensure, open_for_read, open_for_write, WriteOpen};
pub use readiness::WaitStrategy;
pub use transfer::{receive, send, PipeIo};

/// Default path of the request (sender → receiver) channel.
pub const DEFAULT_SET_PIPE: &str = "/tmp/my_pipe_set";

/// Default path of the acknowledgement (receiver → sender) channel.
pub const DEFAULT_GET_PIPE: &str = "/tmp/my_pipe_get";

/// Upper bound on a single read and on an accepted request payload.
pub const BLOCK_SIZE: usize = 4096;

/// Acknowledgement payload.
pub const ACK: &[u8] = b"ACK";

/// Payload that stops the continuous receiver loop.
pub const QUIT: &[u8] = b"quit";

/// Default sleep between writer-open attempts and idle loop reads.
pub const DEFAULT_POLL_QUANTUM: Duration = Duration::from_millis(10);
