//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::pipe::readiness::{seconds_to_duration, WaitStrategy};
use crate::pipe::{DEFAULT_GET_PIPE, DEFAULT_SET_PIPE};
use crate::{AppError, Result};

/// Bounded-wait budgets (fractional seconds) for each leg of an exchange.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Sender: budget for a reader to attach to the request pipe.
    #[serde(default = "default_short_seconds")]
    pub request_write_seconds: f64,
    /// Sender: how long to wait for the acknowledgement.
    #[serde(default = "default_long_seconds")]
    pub ack_read_seconds: f64,
    /// Single-shot receiver: how long to wait for a request.
    #[serde(default = "default_long_seconds")]
    pub request_read_seconds: f64,
    /// Receiver: budget for the sender to attach to the ACK pipe.
    #[serde(default = "default_short_seconds")]
    pub ack_write_seconds: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_write_seconds: default_short_seconds(),
            ack_read_seconds: default_long_seconds(),
            request_read_seconds: default_long_seconds(),
            ack_write_seconds: default_short_seconds(),
        }
    }
}

impl TimeoutConfig {
    /// Writer-acquisition budget for the request.
    #[must_use]
    pub fn request_write(&self) -> Duration {
        seconds_to_duration(self.request_write_seconds)
    }

    /// Wait budget for the acknowledgement.
    #[must_use]
    pub fn ack_read(&self) -> Duration {
        seconds_to_duration(self.ack_read_seconds)
    }

    /// Wait budget for an inbound request.
    #[must_use]
    pub fn request_read(&self) -> Duration {
        seconds_to_duration(self.request_read_seconds)
    }

    /// Writer-acquisition budget for the acknowledgement.
    #[must_use]
    pub fn ack_write(&self) -> Duration {
        seconds_to_duration(self.ack_write_seconds)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("request_write_seconds", self.request_write_seconds),
            ("ack_read_seconds", self.ack_read_seconds),
            ("request_read_seconds", self.request_read_seconds),
            ("ack_write_seconds", self.ack_write_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Config(format!(
                    "timeouts.{name} must be a finite, non-negative number of seconds"
                )));
            }
        }
        Ok(())
    }
}

fn default_short_seconds() -> f64 {
    0.1
}

fn default_long_seconds() -> f64 {
    10.0
}

fn default_set_pipe() -> PathBuf {
    PathBuf::from(DEFAULT_SET_PIPE)
}

fn default_get_pipe() -> PathBuf {
    PathBuf::from(DEFAULT_GET_PIPE)
}

fn default_poll_quantum_ms() -> u64 {
    10
}

/// Global configuration parsed from a TOML file.
///
/// Every field has a default, so an empty document yields the stock
/// `/tmp/my_pipe_set` / `/tmp/my_pipe_get` pair.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Request channel: written by the sender, read by the receiver.
    #[serde(default = "default_set_pipe")]
    pub set_pipe: PathBuf,
    /// Acknowledgement channel: written by the receiver, read by the sender.
    #[serde(default = "default_get_pipe")]
    pub get_pipe: PathBuf,
    /// Sleep quantum between writer-open attempts and idle loop reads.
    #[serde(default = "default_poll_quantum_ms")]
    pub poll_quantum_ms: u64,
    /// How bounded reads wait for data.
    #[serde(default)]
    pub wait_strategy: WaitStrategy,
    /// Per-leg timeout budgets.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            set_pipe: default_set_pipe(),
            get_pipe: default_get_pipe(),
            poll_quantum_ms: default_poll_quantum_ms(),
            wait_strategy: WaitStrategy::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line path overrides and re-validate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the resulting pipe pair is invalid.
    pub fn with_overrides(
        mut self,
        set_pipe: Option<PathBuf>,
        get_pipe: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(path) = set_pipe {
            self.set_pipe = path;
        }
        if let Some(path) = get_pipe {
            self.get_pipe = path;
        }
        self.validate()?;
        Ok(self)
    }

    /// Sleep quantum as a [`Duration`].
    #[must_use]
    pub fn poll_quantum(&self) -> Duration {
        Duration::from_millis(self.poll_quantum_ms)
    }

    /// Validate field invariants.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.set_pipe.as_os_str().is_empty() || self.get_pipe.as_os_str().is_empty() {
            return Err(AppError::Config("pipe paths must not be empty".into()));
        }

        if self.set_pipe == self.get_pipe {
            return Err(AppError::Config(
                "set_pipe and get_pipe must name different paths".into(),
            ));
        }

        if self.poll_quantum_ms == 0 {
            return Err(AppError::Config(
                "poll_quantum_ms must be greater than zero".into(),
            ));
        }

        self.timeouts.validate()
    }
}
