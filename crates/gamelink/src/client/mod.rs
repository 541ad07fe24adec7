//! Node-to-node RPC client.
//!
//! [`Client`] ties together the [`ServiceRegistry`], the [`ConnectionCache`], a
//! [`Transport`] and a [`Codec`]:
//!
//! 1. resolve (or dial) the connection for the target node,
//! 2. encode the request payload,
//! 3. send a [`GameMsg`] envelope with a deadline,
//! 4. surface transport errors and envelope-level remote errors unchanged,
//! 5. decode the reply payload.
//!
//! Nothing is retried. Every call makes at most one remote invocation, and the
//! caller sees the first failure as-is.
//!
//! Long-lived request/reply exchanges use [`GameStream`], opened with
//! [`Client::open_stream`].

mod stream;

pub use stream::GameStream;

use crate::{
    cluster::ConnectionCache,
    codec::{Codec, MsgPackCodec},
    config::ClusterConfig,
    registry::{Route, ServiceEntry, ServiceRegistry},
    telemetry::{
        increment_call_errors, increment_calls, increment_streams_opened, record_call_duration,
    },
    transport::{Connection, Transport, grpc::GrpcTransport},
};
use core::time::Duration;
use gamelink_core::{Error, Result, proto::GameMsg, types::ProtocolNumber};
use serde::{Serialize, de::DeserializeOwned};
use tonic::{
    Request, Status,
    metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue},
};

/// Client for calling named services on other cluster nodes.
///
/// Construct one per process (or per test) and share it by reference or
/// `Arc`; all methods take `&self`.
pub struct Client<T: Transport = GrpcTransport, C: Codec = MsgPackCodec> {
    name: String,
    registry: ServiceRegistry,
    connections: ConnectionCache<T>,
    codec: C,
    call_timeout: Duration,
}

impl Client {
    /// Builds a gRPC client with the MessagePack codec from a cluster config.
    ///
    /// No node is dialed until it is first called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the service table is invalid or the call
    /// timeout is zero.
    pub fn from_config(config: ClusterConfig) -> Result<Self> {
        let transport = GrpcTransport::new(config.dial.clone());
        Self::new(config, transport, MsgPackCodec)
    }
}

impl<T: Transport, C: Codec> Client<T, C> {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the service table is invalid or the call
    /// timeout is zero.
    pub fn new(config: ClusterConfig, transport: T, codec: C) -> Result<Self> {
        if config.call_timeout_ms == 0 {
            return Err(Error::Config {
                reason: "call_timeout_ms must be greater than zero".to_string(),
            });
        }
        let call_timeout = config.call_timeout();
        Ok(Self {
            registry: ServiceRegistry::new(&config.services)?,
            connections: ConnectionCache::new(transport, config.cluster),
            name: config.name,
            codec,
            call_timeout,
        })
    }

    /// Name of the local process within the cluster.
    pub fn local_name(&self) -> &str {
        &self.name
    }

    pub const fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub const fn connections(&self) -> &ConnectionCache<T> {
        &self.connections
    }

    pub const fn codec(&self) -> &C {
        &self.codec
    }

    pub const fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Atomically replace the service table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the new table is invalid; the current
    /// table stays active.
    pub fn reload_services(&self, entries: &[ServiceEntry]) -> Result<()> {
        self.registry.load(entries)
    }

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unregistered protocol number.
    pub fn resolve_by_number(&self, pnum: ProtocolNumber) -> Result<Route> {
        self.registry.resolve_by_number(pnum)
    }

    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unregistered service.
    pub fn resolve_by_name(&self, service: &str) -> Result<ProtocolNumber> {
        self.registry.resolve_by_name(service)
    }

    /// Call `service` on `node` and decode the reply.
    ///
    /// Returns `Ok(None)` when the callee answered without a payload. Only the
    /// first value of a multi-value reply payload is decoded.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] / [`Error::Dial`] if the node cannot be reached.
    /// - [`Error::Encode`] if `request` cannot be serialized.
    /// - [`Error::Transport`] on network failure or when the call timeout
    ///   elapses (`DeadlineExceeded`).
    /// - [`Error::Remote`] if the callee reported a failure.
    /// - [`Error::Decode`] if the reply does not decode as `R`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, request), err(level = "debug")))]
    pub async fn call<Q, R>(&self, node: &str, service: &str, request: &Q) -> Result<Option<R>>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let reply = self.unary(node, service, request).await?;
        if !reply.has_payload() {
            return Ok(None);
        }

        match self.codec.decode(&reply.msg) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to decode reply from {service}: {e}");
                increment_call_errors(e.kind());
                Err(e)
            }
        }
    }

    /// Call `service` on `node` without a reply target. A reply payload, if
    /// any, is discarded undecoded.
    ///
    /// # Errors
    ///
    /// Same as [`Client::call`], minus decoding.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, request), err(level = "debug")))]
    pub async fn invoke<Q>(&self, node: &str, service: &str, request: &Q) -> Result<()>
    where
        Q: Serialize + ?Sized,
    {
        self.unary(node, service, request).await.map(drop)
    }

    /// Resolve `pnum` through the registry and [`call`](Self::call) the
    /// service it names.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unregistered number, otherwise as
    /// [`Client::call`].
    pub async fn call_by_number<Q, R>(&self, pnum: ProtocolNumber, request: &Q) -> Result<Option<R>>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let route = self.registry.resolve_by_number(pnum)?;
        self.call(&route.node, &route.service, request).await
    }

    /// Open a bidirectional stream to `node`.
    ///
    /// # Errors
    ///
    /// Node resolution errors, or [`Error::Transport`] if the stream cannot be
    /// established.
    pub async fn open_stream(
        &self,
        node: &str,
    ) -> Result<GameStream<<T::Conn as Connection>::Stream, C>> {
        self.open_stream_with_metadata(node, core::iter::empty::<(&str, &str)>())
            .await
    }

    /// Open a bidirectional stream to `node`, attaching `metadata` as request
    /// headers visible to the peer for the lifetime of the stream.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a metadata key or value that is not a valid
    /// header, node resolution errors, or [`Error::Transport`] if the
    /// transport refuses the stream. The gRPC transport does not wait for the
    /// peer's response headers here, so a call the peer rejects surfaces on the
    /// first exchange instead.
    pub async fn open_stream_with_metadata<I, K, V>(
        &self,
        node: &str,
        metadata: I,
    ) -> Result<GameStream<<T::Conn as Connection>::Stream, C>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let metadata = metadata_map(metadata)?;
        let conn = self.connections.get(node).await?;

        let stream = conn.open_stream(metadata).await.map_err(|status| {
            increment_call_errors("transport");
            Error::Transport(status)
        })?;

        increment_streams_opened();
        Ok(GameStream::new(stream, self.codec.clone()))
    }

    async fn unary<Q>(&self, node: &str, service: &str, request: &Q) -> Result<GameMsg>
    where
        Q: Serialize + ?Sized,
    {
        let start = std::time::Instant::now();
        increment_calls();

        let result = self.unary_inner(node, service, request).await;
        match &result {
            Ok(_) => record_call_duration(start.elapsed().as_secs_f64() * 1000.0),
            Err(e) => increment_call_errors(e.kind()),
        }
        result
    }

    async fn unary_inner<Q>(&self, node: &str, service: &str, request: &Q) -> Result<GameMsg>
    where
        Q: Serialize + ?Sized,
    {
        let conn = self.connections.get(node).await?;
        let payload = self.codec.encode(request)?;

        let mut req = Request::new(GameMsg::request(service, payload));
        req.set_timeout(self.call_timeout);

        let reply = tokio::time::timeout(self.call_timeout, conn.unary(req))
            .await
            .map_err(|_| {
                Status::deadline_exceeded(format!(
                    "{service} on {node} did not answer within {:?}",
                    self.call_timeout
                ))
            })??;

        if let Some(message) = reply.remote_error() {
            return Err(Error::Remote {
                message: message.to_string(),
            });
        }
        Ok(reply)
    }
}

fn metadata_map<I, K, V>(pairs: I) -> Result<MetadataMap>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut map = MetadataMap::new();
    for (key, value) in pairs {
        let (key, value) = (key.as_ref(), value.as_ref());
        let name = MetadataKey::<Ascii>::from_bytes(key.as_bytes()).map_err(|e| Error::Config {
            reason: format!("invalid metadata key {key:?}: {e}"),
        })?;
        let value = MetadataValue::<Ascii>::try_from(value).map_err(|e| Error::Config {
            reason: format!("invalid metadata value for {key:?}: {e}"),
        })?;
        map.insert(name, value);
    }
    Ok(map)
}
