//! Transport capability consumed by the RPC client.
//!
//! The client never talks to the network directly. It asks a [`Transport`] to
//! dial a node, then drives the resulting [`Connection`] with unary calls and
//! bidirectional [`EnvelopeStream`]s. Deadlines and request-scoped metadata
//! ride on the [`tonic::Request`] / [`MetadataMap`] handed to the connection.
//!
//! - [`grpc`] - The production transport over tonic channels.
//! - `mock` - A scripted in-memory transport for tests.

use core::future::Future;
use gamelink_core::{Result, proto::GameMsg};
use tonic::{Request, Status, metadata::MetadataMap};

pub mod grpc;
#[cfg(test)]
pub(crate) mod mock;

/// Dials nodes.
pub trait Transport: Send + Sync + 'static {
    type Conn: Connection;

    /// Establish a connection to `addr`. `node` is only used for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`gamelink_core::Error::Dial`] when the connection cannot be
    /// established.
    fn dial(&self, node: &str, addr: &str) -> impl Future<Output = Result<Self::Conn>> + Send;
}

/// A live, shareable connection to one node.
///
/// Clones refer to the same underlying connection.
pub trait Connection: Clone + Send + Sync + 'static {
    type Stream: EnvelopeStream;

    /// Send one envelope and wait for one reply.
    fn unary(
        &self,
        request: Request<GameMsg>,
    ) -> impl Future<Output = core::result::Result<GameMsg, Status>> + Send;

    /// Open a bidirectional stream. `metadata` is sent as request headers and
    /// stays attached for the lifetime of the stream.
    fn open_stream(
        &self,
        metadata: MetadataMap,
    ) -> impl Future<Output = core::result::Result<Self::Stream, Status>> + Send;
}

/// One open bidirectional envelope stream.
pub trait EnvelopeStream: Send + 'static {
    /// Queue one envelope for the peer.
    fn send(&mut self, msg: GameMsg) -> impl Future<Output = core::result::Result<(), Status>> + Send;

    /// Wait for the next envelope from the peer.
    fn recv(&mut self) -> impl Future<Output = core::result::Result<GameMsg, Status>> + Send;

    /// Half-close the outgoing side; the peer observes end of stream.
    fn close_send(&mut self);
}
