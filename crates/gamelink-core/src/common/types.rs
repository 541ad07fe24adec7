//! # Shared Types and Constants
//!
//! Values every node in the cluster must agree on: the width of a protocol
//! number and the default deadline applied to unary calls.
//!
//! ## Type Aliases
//!
//! - [`ProtocolNumber`] - Numeric service identifier used by game clients to
//!   address a service without its name.
//!
//! ## Constants
//!
//! - [`DEFAULT_CALL_TIMEOUT`] - Deadline attached to every unary call unless
//!   the client is configured otherwise.
//! - [`STREAM_SEND_BUFFER`] - Outgoing envelopes buffered per open stream.

use core::time::Duration;

/// Numeric identifier of a service, unique within one registry snapshot.
pub type ProtocolNumber = u16;

/// Deadline attached to unary calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of outgoing envelopes a stream buffers before `send` waits for the
/// transport.
///
/// A stream call sends one envelope and then waits for the matching reply, so
/// a single slot is enough in steady state; the extra slot lets a caller
/// pipeline a fire-and-forget send ahead of a call.
pub const STREAM_SEND_BUFFER: usize = 2;

/// Fully-qualified gRPC service name of the cluster envelope service.
pub const GAME_SERVICE: &str = "rpc.Game";
