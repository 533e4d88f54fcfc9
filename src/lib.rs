//! Bluetooth-module protocol engine and state coordinator for a remotely
//! controlled field recorder.
//!
//! The module and the phone talk to the recorder through a line-based serial
//! protocol. Everything here is pure logic over one owned [`Context`] and
//! runs on the host for testing (`cargo test`). The board supplies audio,
//! storage, GPS, LEDs and clock through the traits in [`hooks`].
//!
//! With the `embedded` feature, [`runtime`] drives a [`Coordinator`] from an
//! async serial port, a button channel and an Embassy timer.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Configuration & errors
// ═══════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod error;
mod text;

// ═══════════════════════════════════════════════════════════════════════════
// Data model
// ═══════════════════════════════════════════════════════════════════════════

pub mod context;
pub mod record;
pub mod registry;
pub mod state;

// ═══════════════════════════════════════════════════════════════════════════
// Protocol engine
// ═══════════════════════════════════════════════════════════════════════════

pub mod line_buffer;
pub mod protocol;
pub mod scheduler;

// ═══════════════════════════════════════════════════════════════════════════
// Coordination
// ═══════════════════════════════════════════════════════════════════════════

pub mod coordinator;
pub mod hooks;
pub mod indicator_logic;

#[cfg(feature = "embedded")]
pub mod runtime;

pub use context::Context;
pub use coordinator::Coordinator;
pub use error::{Error, StorageError};
pub use protocol::{dispatch, encode, tokenize, Action, Outbound, ParsedMessage};
