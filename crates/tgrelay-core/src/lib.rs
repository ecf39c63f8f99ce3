//! Core domain + application logic for the Telegram relay bridge.
//!
//! This crate is intentionally framework-agnostic: the Telegram client lives
//! behind a port (trait) implemented in the adapter crate, so the relay,
//! gateway, and supervisor can be exercised against stubs.

pub mod config;
pub mod domain;
pub mod errors;
pub mod event;
pub mod gateway;
pub mod logging;
pub mod media;
pub mod media_server;
pub mod platform;
pub mod relay;
pub mod supervisor;
pub mod webhook;

pub use errors::{Error, Result};
