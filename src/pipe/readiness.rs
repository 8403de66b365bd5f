//! Deadline-bounded readiness waits.
//!
//! [`WaitStrategy::Poll`] blocks in a single `poll(2)` call until the handle
//! is readable or the deadline passes. [`WaitStrategy::Sleep`] is the fallback
//! for platforms where a long `poll` is unreliable: it probes readiness with
//! zero-timeout polls and sleeps one quantum between probes, so it may
//! overshoot the deadline by at most one quantum.

use std::os::fd::BorrowedFd;
use std::thread;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use serde::Deserialize;
use tracing::trace;

use crate::{AppError, Result};

/// How a bounded read waits for data.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// One blocking `poll(2)` with the full deadline.
    #[default]
    Poll,
    /// Zero-timeout probes separated by the sleep quantum.
    Sleep,
}

impl WaitStrategy {
    /// Wait until `fd` is readable or `timeout` elapses.
    ///
    /// Returns `true` when the handle is readable (data or end-of-stream),
    /// `false` when the deadline passed first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Wait` if the underlying `poll` call fails.
    pub fn wait_readable(
        self,
        fd: BorrowedFd<'_>,
        timeout: Duration,
        quantum: Duration,
    ) -> Result<bool> {
        match self {
            Self::Poll => poll_readable(fd, poll_millis(timeout)),
            Self::Sleep => probe_until_readable(fd, timeout, quantum),
        }
    }
}

/// Split fractional seconds into whole seconds and a microsecond remainder.
///
/// Negative, zero and non-finite inputs all yield `(0, 0)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn split_seconds(seconds: f64) -> (u64, u32) {
    if !seconds.is_finite() || seconds <= 0.0 {
        return (0, 0);
    }

    let whole = seconds.trunc();
    let micros = ((seconds - whole) * 1_000_000.0) as u32;
    (whole as u64, micros.min(999_999))
}

/// Convert fractional seconds into a [`Duration`] via [`split_seconds`].
#[must_use]
pub fn seconds_to_duration(seconds: f64) -> Duration {
    let (secs, micros) = split_seconds(seconds);
    Duration::new(secs, micros * 1_000)
}

/// Round up to whole milliseconds so the wait never ends before `timeout`.
fn poll_millis(timeout: Duration) -> i32 {
    let millis = timeout.as_micros().div_ceil(1_000);
    i32::try_from(millis).unwrap_or(i32::MAX)
}

fn poll_readable(fd: BorrowedFd<'_>, millis: i32) -> Result<bool> {
    let timeout = PollTimeout::try_from(millis)
        .map_err(|_| AppError::Wait(format!("invalid poll timeout: {millis}ms")))?;
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    let ready = poll(&mut fds, timeout)
        .map_err(|errno| AppError::Wait(format!("poll failed: {errno}")))?;
    Ok(ready > 0)
}

fn probe_until_readable(fd: BorrowedFd<'_>, timeout: Duration, quantum: Duration) -> Result<bool> {
    let started = Instant::now();
    loop {
        if poll_readable(fd, 0)? {
            return Ok(true);
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Ok(false);
        }

        trace!("no data yet, sleeping");
        thread::sleep(quantum.min(timeout - elapsed));
    }
}
