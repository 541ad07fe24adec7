//! Shared definitions for every gamelink component.
//!
//! - [`error`] - The unified [`Error`] type and its gRPC status mapping.
//! - [`proto`] - The `rpc.Game` wire envelope and client stub.
//! - [`types`] - Protocol number alias and call defaults.

pub mod error;
pub mod proto;
pub mod types;

pub use error::{Error, Result};
