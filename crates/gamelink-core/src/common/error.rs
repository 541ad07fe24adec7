//! Error types for the cluster RPC runtime.
//!
//! This module defines the central `Error` enum, which captures every failure a
//! caller of the RPC client or the task pool can observe. Errors are returned
//! to the immediate caller unchanged; nothing in the runtime retries, swallows
//! or re-classifies them. It implements `From<Error>` for `tonic::Status` so a
//! hosting service can forward a downstream failure to its own client with an
//! appropriate status code.
//!
//! ## Error Cases
//! - `Config`: Unknown node, malformed service table or invalid client/pool
//!   settings.
//! - `Dial`: The transport failed to establish a connection to a node.
//! - `Encode` / `Decode`: The payload codec rejected a request or reply.
//! - `Transport`: The call or stream failed at the network layer, including
//!   deadline expiry.
//! - `Remote`: The callee answered with a non-empty `error` field.
//! - `NotFound`: Unknown service name or protocol number.
//! - `Closed`: A job was submitted to a task pool that has been closed.

use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the cluster RPC runtime.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid configuration (unknown node, malformed service entry, ...).
    #[error("Config error: {reason}")]
    Config { reason: String },

    /// Establishing a connection to `node` at `addr` failed.
    #[error("Dial error: node {node} ({addr}): {source}")]
    Dial {
        node: String,
        addr: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The request payload could not be serialized.
    #[error("Encode error: {reason}")]
    Encode { reason: String },

    /// The reply payload could not be deserialized into the reply target.
    #[error("Decode error: {reason}")]
    Decode { reason: String },

    /// The call or stream failed at the network layer.
    #[error("Transport error: {0}")]
    Transport(#[from] Status),

    /// The remote service reported a logical failure.
    #[error("Remote error: {message}")]
    Remote { message: String },

    /// No registry entry matched the lookup.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// The task pool no longer accepts jobs.
    #[error("Task pool is closed")]
    Closed,
}

impl Error {
    /// Returns `true` when the call was abandoned because its deadline
    /// elapsed.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::Transport(status) if status.code() == Code::DeadlineExceeded)
    }

    /// Short, stable label for the error kind. Used for log fields and metric
    /// attributes.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Dial { .. } => "dial",
            Self::Encode { .. } => "encode",
            Self::Decode { .. } => "decode",
            Self::Transport(_) => "transport",
            Self::Remote { .. } => "remote",
            Self::NotFound { .. } => "not_found",
            Self::Closed => "closed",
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Config { reason } => Status::failed_precondition(reason),
            Error::Dial { node, addr, source } => {
                Status::unavailable(format!("Dial {node} ({addr}) failed: {source}"))
            }
            Error::Encode { reason } => Status::invalid_argument(reason),
            Error::Decode { reason } => Status::internal(format!("Decode error: {reason}")),
            Error::Transport(status) => status,
            Error::Remote { message } => Status::unknown(message),
            Error::NotFound { what } => Status::not_found(what),
            Error::Closed => Status::unavailable("Task pool is closed"),
        }
    }
}
