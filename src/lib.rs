//! lanplay - LAN media server
//!
//! Probes library files with ffprobe, decides per file whether the client
//! can play it directly or needs a transmux/transcode, and streams the
//! result. This library crate exposes the core for the binary and for
//! integration tests.

pub mod config;
pub mod delivery;
pub mod error;
pub mod library;
pub mod probe;
pub mod process;
pub mod server;
pub mod streaming;

#[cfg(test)]
mod test_fixtures;

pub use error::{Error, Result};
