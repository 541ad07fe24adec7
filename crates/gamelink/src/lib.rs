#![doc = include_str!("../README.md")]

pub mod client;
pub mod cluster;
pub mod codec;
pub mod config;
pub mod pool;
pub mod registry;
pub mod telemetry;
pub mod transport;

pub use crate::client::{Client, GameStream};
pub use crate::cluster::ConnectionCache;
pub use crate::codec::{Codec, MsgPackCodec, ReplyTargets, ValueReader};
pub use crate::config::ClusterConfig;
pub use crate::pool::TaskPool;
pub use crate::registry::{Route, ServiceEntry, ServiceRegistry, Snapshot};
pub use crate::transport::grpc::{Compression, DialOptions, GrpcTransport};
pub use crate::transport::{Connection, EnvelopeStream, Transport};
// Downstream crates reach the wire types through `gamelink::proto` and
// `gamelink::types` without depending on `gamelink-core` directly.
pub use gamelink_core::{Error, Result, proto, types};
