//! Configuration model and error types shared by the SHIFT crates.

pub mod config;
pub mod error;

pub use config::ShiftConfig;
pub use error::{Result, ShiftError};
