//! Lazily dialed, memoized node connections.
//!
//! The first caller that needs a node dials it; everyone after that reuses the
//! same handle for the lifetime of the cache. Each node has its own dial cell,
//! so concurrent first calls to one node share a single dial while a slow or
//! hanging dial never holds up first use of another node. Failed dials are not
//! remembered and the next caller tries again.

use crate::transport::Transport;
use gamelink_core::{Error, Result};
use std::collections::HashMap;
use tokio::sync::OnceCell;

struct NodeSlot<C> {
    addr: String,
    conn: OnceCell<C>,
}

pub struct ConnectionCache<T: Transport> {
    transport: T,
    nodes: HashMap<String, NodeSlot<T::Conn>>,
}

impl<T: Transport> ConnectionCache<T> {
    /// `addresses` maps node names to the address the transport dials.
    pub fn new(transport: T, addresses: HashMap<String, String>) -> Self {
        let nodes = addresses
            .into_iter()
            .map(|(node, addr)| {
                let slot = NodeSlot {
                    addr,
                    conn: OnceCell::new(),
                };
                (node, slot)
            })
            .collect();
        Self { transport, nodes }
    }

    /// Returns the connection to `node`, dialing it on first use.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `node` is not in the cluster table.
    /// - Whatever the transport returns from a failed dial.
    pub async fn get(&self, node: &str) -> Result<T::Conn> {
        let slot = self.nodes.get(node).ok_or_else(|| Error::Config {
            reason: format!("node {node} is not in the cluster table"),
        })?;
        if let Some(conn) = slot.conn.get() {
            return Ok(conn.clone());
        }

        // Callers racing on the same node queue here; only one dials, and a
        // failure leaves the cell empty for the next one.
        let conn = slot
            .conn
            .get_or_try_init(|| self.dial(node, &slot.addr))
            .await?;
        Ok(conn.clone())
    }

    async fn dial(&self, node: &str, addr: &str) -> Result<T::Conn> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Dialing node {node} at {addr}");
        crate::telemetry::increment_dials();

        match self.transport.dial(node, addr).await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Dial to node {node} at {addr} failed: {e}");
                Err(e)
            }
        }
    }

    /// Whether a live handle for `node` is cached.
    pub fn is_connected(&self, node: &str) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|slot| slot.conn.initialized())
    }

    /// Address configured for `node`.
    pub fn address(&self, node: &str) -> Option<&str> {
        self.nodes.get(node).map(|slot| slot.addr.as_str())
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{Behavior, MockTransport};
    use core::time::Duration;
    use std::sync::Arc;

    fn cache(transport: MockTransport) -> ConnectionCache<MockTransport> {
        ConnectionCache::new(
            transport,
            HashMap::from([
                ("A".to_string(), "10.0.0.1:9000".to_string()),
                ("B".to_string(), "10.0.0.2:9000".to_string()),
            ]),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_dials_once() {
        let transport = MockTransport::new(Behavior::echo());
        transport.set_dial_delay(Duration::from_millis(20));
        let cache = Arc::new(cache(transport.clone()));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get("A").await.unwrap() })
            })
            .collect();

        let mut conns = Vec::new();
        for handle in handles {
            conns.push(handle.await.unwrap());
        }

        assert_eq!(transport.dials_to("10.0.0.1:9000"), 1);
        assert!(conns.iter().all(|c| c.same_as(&conns[0])));
    }

    #[tokio::test]
    async fn unknown_node_is_a_config_error() {
        let transport = MockTransport::new(Behavior::echo());
        let cache = cache(transport.clone());

        let err = cache.get("Z").await.err().unwrap();
        assert!(matches!(err, Error::Config { .. }));
        assert!(!cache.is_connected("Z"));
    }

    #[tokio::test]
    async fn failed_dial_is_retried_on_next_use() {
        let transport = MockTransport::new(Behavior::echo());
        transport.fail_next_dials(1);
        let cache = cache(transport.clone());

        assert!(matches!(cache.get("B").await, Err(Error::Dial { .. })));
        assert!(!cache.is_connected("B"));

        let first = cache.get("B").await.unwrap();
        let second = cache.get("B").await.unwrap();
        assert!(first.same_as(&second));
        assert_eq!(transport.dials_to("10.0.0.2:9000"), 2);
    }

    #[tokio::test]
    async fn nodes_get_distinct_connections() {
        let transport = MockTransport::new(Behavior::echo());
        let cache = cache(transport);

        let a = cache.get("A").await.unwrap();
        let b = cache.get("B").await.unwrap();
        assert!(!a.same_as(&b));
        assert_eq!(cache.address("A"), Some("10.0.0.1:9000"));
    }

    #[tokio::test]
    async fn hanging_dial_does_not_block_other_nodes() {
        let transport = MockTransport::new(Behavior::echo());
        transport.hang_dials_to("10.0.0.1:9000");
        let cache = Arc::new(cache(transport.clone()));

        let stuck = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("A").await.map(drop) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.dials_to("10.0.0.1:9000"), 1);

        tokio::time::timeout(Duration::from_secs(1), cache.get("B"))
            .await
            .expect("node B dials while node A hangs")
            .unwrap();
        assert!(cache.is_connected("B"));
        assert!(!cache.is_connected("A"));

        stuck.abort();
    }
}
