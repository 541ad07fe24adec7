//! The `rpc.Game` wire envelope and its gRPC client stub.
//!
//! Every node exposes a single gRPC service with two methods:
//!
//! - `Call(GameMsg) returns (GameMsg)` - one request, one reply.
//! - `Stream(stream GameMsg) returns (stream GameMsg)` - a long-lived
//!   bidirectional stream of request/reply envelopes.
//!
//! The envelope names the logical service being addressed and carries an
//! opaque, codec-encoded payload. Callees signal logical failures through the
//! `error` field rather than through the gRPC status, so a transport-level
//! success may still be a failed call.
//!
//! The stub below is equivalent to what `tonic-build` would emit for the
//! following schema, written out by hand so that consumers do not need
//! `protoc` at build time:
//!
//! ```proto
//! syntax = "proto3";
//! package rpc;
//!
//! service Game {
//!   rpc Call(GameMsg) returns (GameMsg);
//!   rpc Stream(stream GameMsg) returns (stream GameMsg);
//! }
//!
//! message GameMsg {
//!   string service_name = 1;
//!   bytes msg = 2;
//!   string error = 3;
//! }
//! ```

use crate::types::GAME_SERVICE;
use tonic::codec::{CompressionEncoding, Streaming};
use tonic::codegen::http;
use tonic::transport::Channel;
use tonic::{GrpcMethod, IntoStreamingRequest, Request, Response, Status};

/// The unit exchanged over both `Call` and `Stream`.
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct GameMsg {
    /// Logical service the envelope is addressed to.
    #[prost(string, tag = "1")]
    pub service_name: ::prost::alloc::string::String,
    /// Codec-encoded payload. Empty when the sender has no data.
    #[prost(bytes = "bytes", tag = "2")]
    pub msg: ::prost::bytes::Bytes,
    /// Non-empty when the callee reports a logical failure.
    #[prost(string, tag = "3")]
    pub error: ::prost::alloc::string::String,
}

impl GameMsg {
    /// Builds a request envelope for `service` carrying `payload`.
    pub fn request(service: impl Into<String>, payload: impl Into<::prost::bytes::Bytes>) -> Self {
        Self {
            service_name: service.into(),
            msg: payload.into(),
            error: String::new(),
        }
    }

    /// Returns `true` when the envelope carries a payload worth decoding.
    pub fn has_payload(&self) -> bool {
        !self.msg.is_empty()
    }

    /// Returns the remote failure message, if the callee reported one.
    pub fn remote_error(&self) -> Option<&str> {
        (!self.error.is_empty()).then_some(self.error.as_str())
    }
}

/// gRPC client for the `rpc.Game` service over a tonic [`Channel`].
///
/// Cloning is cheap and clones share the underlying HTTP/2 connection, so one
/// `GameClient` per node is enough for any number of concurrent calls.
#[derive(Debug, Clone)]
pub struct GameClient {
    inner: tonic::client::Grpc<Channel>,
}

impl GameClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    /// Compress requests with the given encoding.
    #[must_use]
    pub fn send_compressed(mut self, encoding: CompressionEncoding) -> Self {
        self.inner = self.inner.send_compressed(encoding);
        self
    }

    /// Accept responses compressed with the given encoding.
    #[must_use]
    pub fn accept_compressed(mut self, encoding: CompressionEncoding) -> Self {
        self.inner = self.inner.accept_compressed(encoding);
        self
    }

    /// Unary `rpc.Game/Call`.
    pub async fn call(&mut self, request: Request<GameMsg>) -> Result<Response<GameMsg>, Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {e}")))?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/rpc.Game/Call");
        let mut req = request;
        req.extensions_mut()
            .insert(GrpcMethod::new(GAME_SERVICE, "Call"));
        self.inner.unary(req, path, codec).await
    }

    /// Bidirectional `rpc.Game/Stream`.
    pub async fn stream(
        &mut self,
        request: impl IntoStreamingRequest<Message = GameMsg>,
    ) -> Result<Response<Streaming<GameMsg>>, Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {e}")))?;
        let codec = tonic_prost::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/rpc.Game/Stream");
        let mut req = request.into_streaming_request();
        req.extensions_mut()
            .insert(GrpcMethod::new(GAME_SERVICE, "Stream"));
        self.inner.streaming(req, path, codec).await
    }
}
