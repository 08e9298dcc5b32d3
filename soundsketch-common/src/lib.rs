//! Shared foundation for the SoundSketch workspace
//!
//! Provides the common error type, TOML configuration loading with
//! environment overrides, and the bounded async call utility used for
//! every outbound collaborator request.

pub mod bounded;
pub mod config;
pub mod error;

pub use bounded::{bounded, BoundedError};
pub use error::{Error, Result};
