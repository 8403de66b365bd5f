#![forbid(unsafe_code)]

//! Request/acknowledge exchange between two processes over a pair of named
//! pipes.
//!
//! The [`pipe`] module holds the I/O primitives; [`exchange`] and [`receiver`]
//! compose them into the sender and receiver roles.

pub mod config;
pub mod errors;
pub mod exchange;
pub mod logging;
pub mod pipe;
pub mod receiver;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
