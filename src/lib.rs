//! Defensio wallet lifecycle library
//!
//! Manages a batch of DFO mining wallets through the generated,
//! registered, and donating lifecycle stages against the Defensio mining
//! service.

pub mod api;
pub mod cli;
pub mod config;
pub mod donate;
pub mod error;
pub mod register;
pub mod signing;
pub mod wallets;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
