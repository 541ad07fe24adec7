//! Service registry: bidirectional lookup between service names, protocol
//! numbers and the node that hosts each service.
//!
//! The registry holds an immutable [`Snapshot`] behind an `Arc`. A reload
//! builds a complete new snapshot off to the side and swaps the pointer in one
//! step, so a reader sees either the old table or the new one, never a mix.
//! Readers only hold the lock long enough to clone the `Arc`.

use gamelink_core::{Error, Result, types::ProtocolNumber};
use parking_lot::RwLock;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};

/// One row of the service table.
///
/// Deserializes from the `[protocolNumber, serviceName, nodeName]` string
/// triple used by cluster configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "(String, String, String)")]
pub struct ServiceEntry {
    /// Protocol number exactly as configured; validated on load.
    pub protocol: String,
    pub service: String,
    pub node: String,
}

impl ServiceEntry {
    pub fn new(protocol: impl Into<String>, service: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            service: service.into(),
            node: node.into(),
        }
    }
}

impl From<(String, String, String)> for ServiceEntry {
    fn from((protocol, service, node): (String, String, String)) -> Self {
        Self {
            protocol,
            service,
            node,
        }
    }
}

/// Where a protocol number is served.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub node: String,
    pub service: String,
}

/// One consistent version of the service table.
#[derive(Debug, Default)]
pub struct Snapshot {
    by_name: HashMap<String, ProtocolNumber>,
    by_number: HashMap<ProtocolNumber, Route>,
}

impl Snapshot {
    /// Build and validate a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a protocol number is not a valid `u16`, or
    /// if a service name or protocol number appears more than once.
    pub fn build(entries: &[ServiceEntry]) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(entries.len());
        let mut by_number = HashMap::with_capacity(entries.len());

        for entry in entries {
            let pnum = entry
                .protocol
                .trim()
                .parse::<ProtocolNumber>()
                .map_err(|e| Error::Config {
                    reason: format!(
                        "service {}: invalid protocol number {:?}: {e}",
                        entry.service, entry.protocol
                    ),
                })?;

            if by_name.insert(entry.service.clone(), pnum).is_some() {
                return Err(Error::Config {
                    reason: format!("duplicate service name {}", entry.service),
                });
            }

            let route = Route {
                node: entry.node.clone(),
                service: entry.service.clone(),
            };
            if let Some(prev) = by_number.insert(pnum, route) {
                return Err(Error::Config {
                    reason: format!(
                        "protocol number {pnum} assigned to both {} and {}",
                        prev.service, entry.service
                    ),
                });
            }
        }

        Ok(Self { by_name, by_number })
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}

/// Reloadable service registry.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    current: RwLock<Arc<Snapshot>>,
}

impl ServiceRegistry {
    /// Build a registry from an initial service table.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::build`].
    pub fn new(entries: &[ServiceEntry]) -> Result<Self> {
        Ok(Self {
            current: RwLock::new(Arc::new(Snapshot::build(entries)?)),
        })
    }

    /// Replace the whole table. On error the active table is left untouched.
    ///
    /// # Errors
    ///
    /// See [`Snapshot::build`].
    pub fn load(&self, entries: &[ServiceEntry]) -> Result<()> {
        let next = Arc::new(Snapshot::build(entries)?);

        #[cfg(feature = "tracing")]
        tracing::info!("Service table reloaded ({} entries)", next.len());

        *self.current.write() = next;
        Ok(())
    }

    /// The currently installed table.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Look up the node and service for a protocol number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the number is not registered.
    pub fn resolve_by_number(&self, pnum: ProtocolNumber) -> Result<Route> {
        self.snapshot()
            .by_number
            .get(&pnum)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                what: format!("protocol number {pnum}"),
            })
    }

    /// Look up the protocol number of a service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the service is not registered.
    pub fn resolve_by_name(&self, service: &str) -> Result<ProtocolNumber> {
        self.snapshot()
            .by_name
            .get(service)
            .copied()
            .ok_or_else(|| Error::NotFound {
                what: format!("service {service}"),
            })
    }

    /// All registered routes, ordered by protocol number.
    pub fn entries(&self) -> Vec<(ProtocolNumber, Route)> {
        let snapshot = self.snapshot();
        let mut entries: Vec<_> = snapshot
            .by_number
            .iter()
            .map(|(pnum, route)| (*pnum, route.clone()))
            .collect();
        entries.sort_unstable_by_key(|(pnum, _)| *pnum);
        entries
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
