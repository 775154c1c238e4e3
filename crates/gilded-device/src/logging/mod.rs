//! Logging utilities.
//!
//! The device only speaks the `log` facade. Hosts that do not install their
//! own logger can call [`init_logging`] once at startup.

mod init;

pub use init::{init_logging, LoggingConfig};
