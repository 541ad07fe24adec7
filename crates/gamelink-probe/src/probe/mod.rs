//! Probe internals.
//!
//! - [`config`] - CLI arguments and their validation into a [`config::ProbeConfig`].
//! - [`commands`] - What each subcommand does against a [`gamelink::Client`].
//! - [`telemetry`] - Log subscriber and optional metrics export.

pub mod commands;
pub mod config;
pub mod telemetry;
