//! Logging utilities.
//!
//! Everything in the engine logs through the `log` facade. Binaries pick the
//! backend; `init_logging` wires up `env_logger` for the common case.

mod init;

pub use init::{init_logging, LoggingConfig};
