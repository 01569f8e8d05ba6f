//! Core types for the gsx GS plugin
//!
//! This crate provides the error taxonomy, the string-keyed option map
//! and the logging setup shared by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod logging;

pub use config::GsConfig;
pub use error::{ConfigError, DeviceError, FreezeError, GsError, MemoryError, Result};
pub use logging::init_logging;
