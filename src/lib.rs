//! vidconv - batch video format converter
//!
//! This library crate exposes the batch engine for the CLI and for
//! integration testing.

pub mod batch;
pub mod config;
pub mod events;
