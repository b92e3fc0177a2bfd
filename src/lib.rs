//! Acoustic feedback ("howling") suppression for live 16-bit PCM.
//!
//! [`suppress::FeedbackSuppressor`] is the entry point: create one per
//! monitoring session and feed it every captured block.

pub mod error;
pub mod suppress;

pub use error::ConfigError;
pub use suppress::{FeedbackSuppressor, SuppressorConfig};
