//! Shared types used across all agentops crates.
//!
//! This crate defines the provider-agnostic vocabulary the rest of the
//! workspace builds on: messages and tool calls, the session event log,
//! risk levels, streaming chunk types, the error taxonomy, structured
//! trace events, and the configuration tree.

pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod risk;
pub mod stream;
pub mod trace;

pub use error::{Error, Result};
