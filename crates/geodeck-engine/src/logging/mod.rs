//! Logging utilities.
//!
//! The engine only talks to the `log` facade. Binaries call [`init_logging`]
//! once; libraries embedding the engine can install any other backend instead.
//!
//! Level conventions used across the crate:
//! - `debug!` layer lifecycle (initialize, match, finalize) and render stats
//! - `trace!` per-frame minor events (viewport activation, skipped frames)
//! - `warn!` structural problems (duplicate ids) and isolated layer failures

mod init;

pub use init::{init_logging, LoggingConfig};
