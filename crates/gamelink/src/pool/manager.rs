use super::{Callback, Dispatch, Job, Ticket, WorkerSlot, worker::worker_loop};
use crate::telemetry::increment_jobs_dispatched;
use core::future::Future;
use futures::FutureExt;
use gamelink_core::{Error, Result};
use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

/// A fixed-size pool of async workers that run message jobs through a shared
/// callback, or arbitrary closure jobs.
///
/// States are `open` and `closed`; [`close`](Self::close) is one-way.
///
/// ```no_run
/// # async fn demo() -> gamelink::Result<()> {
/// use gamelink::TaskPool;
///
/// let pool = TaskPool::new(4, |player_id: u64| async move {
///     println!("saving {player_id}");
/// })?;
///
/// pool.send_msg(7).await?;
/// pool.send_fn(|| async { println!("flush") }).await?;
///
/// pool.wait().await;
/// pool.close();
/// pool.join().await;
/// # Ok(())
/// # }
/// ```
pub struct TaskPool<M: Send + 'static> {
    available: Mutex<mpsc::Receiver<WorkerSlot<M>>>,
    outstanding: Arc<watch::Sender<usize>>,
    shutdown: CancellationToken,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl<M: Send + 'static> TaskPool<M> {
    /// Spawn `workers` workers on the current Tokio runtime. Message jobs are
    /// passed to `callback`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `workers` is zero.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new<F, Fut>(workers: usize, callback: F) -> Result<Self>
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if workers == 0 {
            return Err(Error::Config {
                reason: "task pool needs at least one worker".to_string(),
            });
        }

        let callback: Callback<M> = Arc::new(move |msg| callback(msg).boxed());
        let (available_tx, available_rx) = mpsc::channel(workers);
        let shutdown = CancellationToken::new();

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    available_tx.clone(),
                    Arc::clone(&callback),
                    shutdown.clone(),
                ))
            })
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!("Task pool started with {workers} workers");

        Ok(Self {
            available: Mutex::new(available_rx),
            outstanding: Arc::new(watch::Sender::new(0)),
            shutdown,
            handles: parking_lot::Mutex::new(handles),
            worker_count: workers,
        })
    }

    /// Hand `msg` to an idle worker, waiting for one if all are busy.
    ///
    /// Returns once a worker has accepted the job, not when it has finished.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the pool is closed, or closes while this
    /// call is waiting for a worker. The job is not run in that case.
    pub async fn send_msg(&self, msg: M) -> Result<()> {
        self.dispatch(Job::Msg(msg)).await
    }

    /// Hand a closure job to an idle worker; the pool callback is bypassed.
    ///
    /// # Errors
    ///
    /// Same as [`TaskPool::send_msg`].
    pub async fn send_fn<F, Fut>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatch(Job::Fn(Box::new(move || f().boxed()))).await
    }

    async fn dispatch(&self, job: Job<M>) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Closed);
        }

        let ticket = Ticket::new(&self.outstanding);

        let slot = {
            let mut available = self.available.lock().await;
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => None,
                slot = available.recv() => slot,
            }
        };
        let Some(WorkerSlot {
            worker_id: _worker_id,
            handoff,
        }) = slot
        else {
            return Err(Error::Closed);
        };

        // Fails only if the worker already exited on shutdown.
        handoff
            .send(Dispatch { job, ticket })
            .map_err(|_| Error::Closed)?;

        #[cfg(feature = "tracing")]
        tracing::trace!("Job handed to worker {_worker_id}");
        increment_jobs_dispatched();
        Ok(())
    }

    /// Close the pool. New sends fail with [`Error::Closed`]; running jobs
    /// finish and every worker exits once idle.
    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Closing task pool ({} jobs outstanding)", self.outstanding());
            self.shutdown.cancel();
        }
    }

    /// Wait until every accepted job has finished.
    ///
    /// Does not wait for workers to exit; use [`join`](Self::join) after
    /// [`close`](Self::close) for that.
    pub async fn wait(&self) {
        let mut outstanding = self.outstanding.subscribe();
        // The sender lives in `self`, so this only returns once the count is zero.
        let _ = outstanding.wait_for(|n| *n == 0).await;
    }

    /// Wait for every worker task to exit. Only returns after
    /// [`close`](Self::close); calling it on an open pool waits forever.
    pub async fn join(&self) {
        let handles = core::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(_e) = handle.await {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker task failed: {_e}");
            }
        }
    }

    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Jobs accepted (or being handed over) and not yet finished.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl<M: Send + 'static> Drop for TaskPool<M> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
