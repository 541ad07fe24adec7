//! Scripted in-memory [`Transport`] for tests.
//!
//! Every dialed node answers with the transport's current [`Behavior`]. Dials
//! can be delayed, failed or left hanging per address, and the metadata of
//! every opened stream is recorded for inspection.

use super::{Connection, EnvelopeStream, Transport};
use core::time::Duration;
use gamelink_core::{Error, Result, proto::GameMsg};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tonic::{Request, Status, metadata::MetadataMap};

/// How a mock node answers a unary call.
#[derive(Clone)]
pub(crate) enum Behavior {
    /// Answer with the envelope produced by the closure.
    Reply(Arc<dyn Fn(&GameMsg) -> GameMsg + Send + Sync>),
    /// Fail with a transport status.
    Fail(Status),
    /// Never answer.
    Hang,
}

impl Behavior {
    pub(crate) fn reply(f: impl Fn(&GameMsg) -> GameMsg + Send + Sync + 'static) -> Self {
        Self::Reply(Arc::new(f))
    }

    /// Echo the request payload back under the same service name.
    pub(crate) fn echo() -> Self {
        Self::reply(|req| req.clone())
    }
}

#[derive(Default)]
struct Shared {
    dials: Mutex<HashMap<String, usize>>,
    failing_dials: AtomicUsize,
    dial_delay: Mutex<Option<Duration>>,
    hung_dials: Mutex<HashSet<String>>,
    behavior: Mutex<Option<Behavior>>,
    calls: AtomicUsize,
    stream_metadata: Mutex<Vec<MetadataMap>>,
}

/// In-memory [`Transport`] whose nodes answer according to a scripted
/// [`Behavior`].
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    shared: Arc<Shared>,
}

impl MockTransport {
    pub(crate) fn new(behavior: Behavior) -> Self {
        let transport = Self::default();
        transport.set_behavior(behavior);
        transport
    }

    pub(crate) fn set_behavior(&self, behavior: Behavior) {
        *self.shared.behavior.lock() = Some(behavior);
    }

    /// Make the next `n` dials fail.
    pub(crate) fn fail_next_dials(&self, n: usize) {
        self.shared.failing_dials.store(n, Ordering::SeqCst);
    }

    pub(crate) fn set_dial_delay(&self, delay: Duration) {
        *self.shared.dial_delay.lock() = Some(delay);
    }

    /// Dials to `addr` never complete.
    pub(crate) fn hang_dials_to(&self, addr: &str) {
        self.shared.hung_dials.lock().insert(addr.to_string());
    }

    /// Dial attempts made to `addr`, successful or not.
    pub(crate) fn dials_to(&self, addr: &str) -> usize {
        self.shared.dials.lock().get(addr).copied().unwrap_or(0)
    }

    pub(crate) fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn stream_metadata(&self) -> Vec<MetadataMap> {
        self.shared.stream_metadata.lock().clone()
    }
}

impl Transport for MockTransport {
    type Conn = MockConnection;

    async fn dial(&self, node: &str, addr: &str) -> Result<MockConnection> {
        *self.shared.dials.lock().entry(addr.to_string()).or_default() += 1;

        let hung = self.shared.hung_dials.lock().contains(addr);
        if hung {
            futures::future::pending::<()>().await;
        }

        let delay = *self.shared.dial_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .shared
            .failing_dials
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            // A real transport error cannot be built by hand; an invalid URI
            // yields one.
            let source = tonic::transport::Endpoint::from_shared("http://bad uri")
                .err()
                .expect("invalid uri");
            return Err(Error::Dial {
                node: node.to_string(),
                addr: addr.to_string(),
                source,
            });
        }

        Ok(MockConnection {
            id: Arc::new(()),
            shared: Arc::clone(&self.shared),
        })
    }
}

#[derive(Clone)]
pub(crate) struct MockConnection {
    id: Arc<()>,
    shared: Arc<Shared>,
}

impl MockConnection {
    /// Whether two handles refer to the same dialed connection.
    pub(crate) fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.id, &other.id)
    }

    fn behavior(&self) -> Behavior {
        self.shared
            .behavior
            .lock()
            .clone()
            .unwrap_or_else(Behavior::echo)
    }
}

impl Connection for MockConnection {
    type Stream = MockStream;

    async fn unary(&self, request: Request<GameMsg>) -> core::result::Result<GameMsg, Status> {
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior() {
            Behavior::Reply(f) => Ok(f(request.get_ref())),
            Behavior::Fail(status) => Err(status),
            Behavior::Hang => futures::future::pending().await,
        }
    }

    async fn open_stream(&self, metadata: MetadataMap) -> core::result::Result<MockStream, Status> {
        self.shared.stream_metadata.lock().push(metadata);
        Ok(MockStream {
            behavior: self.behavior(),
            pending: Vec::new(),
            send_closed: false,
        })
    }
}

/// Stream that answers every sent envelope with the node's [`Behavior`].
pub(crate) struct MockStream {
    behavior: Behavior,
    pending: Vec<GameMsg>,
    send_closed: bool,
}

impl EnvelopeStream for MockStream {
    async fn send(&mut self, msg: GameMsg) -> core::result::Result<(), Status> {
        if self.send_closed {
            return Err(Status::failed_precondition("stream send side is closed"));
        }
        self.pending.push(msg);
        Ok(())
    }

    async fn recv(&mut self) -> core::result::Result<GameMsg, Status> {
        if self.pending.is_empty() {
            return Err(Status::unavailable("stream closed by peer"));
        }
        let request = self.pending.remove(0);
        match &self.behavior {
            Behavior::Reply(f) => Ok(f(&request)),
            Behavior::Fail(status) => Err(status.clone()),
            Behavior::Hang => futures::future::pending().await,
        }
    }

    fn close_send(&mut self) {
        self.send_closed = true;
    }
}
