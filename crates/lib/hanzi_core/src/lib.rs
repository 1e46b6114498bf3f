//! # hanzi_core
//!
//! Client core for Hanzi Cards, a Chinese vocabulary notebook with Thai
//! meanings. Sessions, repositories, the image upload pipeline, the chat
//! gateway and the screen controllers live here; the `hanzi` binary drives
//! them from the command line.

pub mod auth;
pub mod backend;
pub mod chat;
pub mod config;
pub mod controllers;
pub mod error;
pub mod images;
pub mod models;
pub mod notifications;
pub mod upload;
pub mod words;

pub use config::AppConfig;
pub use error::{Error, Result};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
