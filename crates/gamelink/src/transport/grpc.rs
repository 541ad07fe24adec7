//! tonic-backed [`Transport`].
//!
//! Each node gets one HTTP/2 [`Channel`](tonic::transport::Channel) wrapped in
//! a [`GameClient`]. Unary calls and streams are multiplexed over that channel,
//! so the connection cache only ever needs a single handle per node.

use super::{Connection, EnvelopeStream, Transport};
use core::time::Duration;
use gamelink_core::{
    Error, Result,
    proto::{GameClient, GameMsg},
    types::STREAM_SEND_BUFFER,
};
use serde::Deserialize;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinHandle},
};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{
    Request, Status,
    codec::{CompressionEncoding, Streaming},
    metadata::MetadataMap,
    transport::Endpoint,
};

/// Payload compression negotiated on every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zstd,
}

impl Compression {
    fn encoding(self) -> Option<CompressionEncoding> {
        match self {
            Self::None => None,
            Self::Gzip => Some(CompressionEncoding::Gzip),
            Self::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

/// Connection options applied to every dial.
///
/// All fields have defaults, so a cluster file may omit the whole section or
/// any subset of it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DialOptions {
    /// URI scheme prepended to bare `host:port` addresses.
    pub scheme: String,
    /// Upper bound on establishing the TCP/HTTP2 connection.
    pub connect_timeout_ms: Option<u64>,
    pub tcp_nodelay: bool,
    /// HTTP/2 keep-alive ping interval. Disabled when unset.
    pub keep_alive_interval_ms: Option<u64>,
    pub keep_alive_timeout_ms: Option<u64>,
    /// Defer the actual connect until the first call instead of failing the
    /// dial when the node is unreachable.
    pub lazy: bool,
    pub compression: Compression,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            connect_timeout_ms: Some(3_000),
            tcp_nodelay: true,
            keep_alive_interval_ms: None,
            keep_alive_timeout_ms: None,
            lazy: false,
            compression: Compression::None,
        }
    }
}

impl DialOptions {
    fn uri(&self, addr: &str) -> String {
        if addr.contains("://") {
            addr.to_string()
        } else {
            format!("{}://{addr}", self.scheme)
        }
    }

    fn endpoint(&self, addr: &str) -> core::result::Result<Endpoint, tonic::transport::Error> {
        let mut endpoint = Endpoint::from_shared(self.uri(addr))?.tcp_nodelay(self.tcp_nodelay);
        if let Some(ms) = self.connect_timeout_ms {
            endpoint = endpoint.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.keep_alive_interval_ms {
            endpoint = endpoint.http2_keep_alive_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.keep_alive_timeout_ms {
            endpoint = endpoint.keep_alive_timeout(Duration::from_millis(ms));
        }
        Ok(endpoint)
    }
}

/// Dials nodes over gRPC.
#[derive(Debug, Clone, Default)]
pub struct GrpcTransport {
    options: DialOptions,
}

impl GrpcTransport {
    pub const fn new(options: DialOptions) -> Self {
        Self { options }
    }

    pub const fn options(&self) -> &DialOptions {
        &self.options
    }
}

impl Transport for GrpcTransport {
    type Conn = GrpcConnection;

    async fn dial(&self, node: &str, addr: &str) -> Result<GrpcConnection> {
        let dial_err = |source| Error::Dial {
            node: node.to_string(),
            addr: addr.to_string(),
            source,
        };

        let endpoint = self.options.endpoint(addr).map_err(dial_err)?;
        let channel = if self.options.lazy {
            endpoint.connect_lazy()
        } else {
            endpoint.connect().await.map_err(dial_err)?
        };

        let mut client = GameClient::new(channel);
        if let Some(encoding) = self.options.compression.encoding() {
            client = client
                .send_compressed(encoding)
                .accept_compressed(encoding);
        }

        Ok(GrpcConnection { client })
    }
}

/// A node connection: a cheaply clonable [`GameClient`].
#[derive(Debug, Clone)]
pub struct GrpcConnection {
    client: GameClient,
}

impl Connection for GrpcConnection {
    type Stream = GrpcStream;

    fn unary(
        &self,
        request: Request<GameMsg>,
    ) -> impl Future<Output = core::result::Result<GameMsg, Status>> + Send {
        let mut client = self.client.clone();
        async move { client.call(request).await.map(tonic::Response::into_inner) }
    }

    fn open_stream(
        &self,
        metadata: MetadataMap,
    ) -> impl Future<Output = core::result::Result<GrpcStream, Status>> + Send {
        let mut client = self.client.clone();
        async move {
            let (tx, rx) = mpsc::channel(STREAM_SEND_BUFFER);
            let mut request = Request::new(ReceiverStream::new(rx));
            *request.metadata_mut() = metadata;

            // Response headers only arrive once the peer answers, and many peers
            // read the first request before answering. The call runs in its own
            // task so the caller can send while the headers are outstanding.
            let response = tokio::spawn(async move {
                client
                    .stream(request)
                    .await
                    .map(tonic::Response::into_inner)
            });

            Ok(GrpcStream {
                outbound: Some(tx),
                inbound: Inbound::Pending(response),
            })
        }
    }
}

enum Inbound {
    /// Waiting for the peer's response headers.
    Pending(JoinHandle<core::result::Result<Streaming<GameMsg>, Status>>),
    Open(Streaming<GameMsg>),
    /// The call failed before any reply; every `recv` reports the same status.
    Failed(Status),
}

impl Inbound {
    fn resolved(
        joined: core::result::Result<core::result::Result<Streaming<GameMsg>, Status>, JoinError>,
    ) -> Self {
        match joined {
            Ok(Ok(streaming)) => Self::Open(streaming),
            Ok(Err(status)) => Self::Failed(status),
            Err(e) => Self::Failed(Status::internal(format!("stream call task failed: {e}"))),
        }
    }
}

/// An open `rpc.Game/Stream` call.
///
/// Sends are accepted as soon as the stream is opened; the first
/// [`recv`](EnvelopeStream::recv) waits for the peer's response headers.
pub struct GrpcStream {
    outbound: Option<mpsc::Sender<GameMsg>>,
    inbound: Inbound,
}

impl EnvelopeStream for GrpcStream {
    async fn send(&mut self, msg: GameMsg) -> core::result::Result<(), Status> {
        let Some(tx) = &self.outbound else {
            return Err(Status::failed_precondition("stream send side is closed"));
        };
        tx.send(msg)
            .await
            .map_err(|_| Status::unavailable("stream closed by transport"))
    }

    async fn recv(&mut self) -> core::result::Result<GameMsg, Status> {
        if let Inbound::Pending(response) = &mut self.inbound {
            let resolved = Inbound::resolved(response.await);
            self.inbound = resolved;
        }

        match &mut self.inbound {
            Inbound::Open(inbound) => match inbound.message().await? {
                Some(msg) => Ok(msg),
                None => Err(Status::unavailable("stream closed by peer")),
            },
            Inbound::Failed(status) => Err(status.clone()),
            Inbound::Pending(_) => Err(Status::internal("stream response still pending")),
        }
    }

    fn close_send(&mut self) {
        self.outbound = None;
    }
}

impl Drop for GrpcStream {
    fn drop(&mut self) {
        if let Inbound::Pending(response) = &self.inbound {
            response.abort();
        }
    }
}
