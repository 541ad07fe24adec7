//! Bounded pool of persistent async workers with rendezvous handoff.
//!
//! Every idle worker publishes a [`WorkerSlot`] into a bounded channel sized
//! to the worker count, then parks on the slot's one-shot handoff. A sender
//! takes one slot and hands its job to exactly that worker. When every worker
//! is busy no slot is available and the sender waits, which is the pool's only
//! admission control.
//!
//! - [`manager`] - [`TaskPool`], the public handle: dispatch, close, wait, join.
//! - [`worker`] - The per-worker run loop.
//!
//! Shutdown is a single [`CancellationToken`](tokio_util::sync::CancellationToken)
//! observed by every worker. Running jobs are never interrupted; a worker exits
//! the next time it goes idle.

pub mod manager;
pub mod worker;
#[cfg(test)]
mod tests;

pub use manager::TaskPool;

use crate::telemetry::add_jobs_inflight;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

/// Default handler for message jobs, shared by all workers.
pub(crate) type Callback<M> = Arc<dyn Fn(M) -> BoxFuture<'static, ()> + Send + Sync>;

/// A unit of work accepted by the pool.
pub(crate) enum Job<M> {
    /// Run the pool callback with this message.
    Msg(M),
    /// Run this closure instead of the callback.
    Fn(Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>),
}

/// A job on its way to a worker, with its place in the outstanding count.
pub(crate) struct Dispatch<M> {
    pub(crate) job: Job<M>,
    pub(crate) ticket: Ticket,
}

/// An idle worker, offered to the next sender.
pub(crate) struct WorkerSlot<M> {
    pub(crate) worker_id: usize,
    pub(crate) handoff: oneshot::Sender<Dispatch<M>>,
}

/// Counts one accepted job for as long as it lives.
///
/// Created when a send starts and dropped when the job finishes or is
/// abandoned, so a send that is cancelled midway never leaves the count high.
pub(crate) struct Ticket {
    outstanding: Arc<watch::Sender<usize>>,
}

impl Ticket {
    pub(crate) fn new(outstanding: &Arc<watch::Sender<usize>>) -> Self {
        outstanding.send_modify(|n| *n += 1);
        add_jobs_inflight(1);
        Self {
            outstanding: Arc::clone(outstanding),
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.outstanding.send_modify(|n| *n -= 1);
        add_jobs_inflight(-1);
    }
}
