use super::{Callback, Dispatch, Job, WorkerSlot};
use core::panic::AssertUnwindSafe;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Worker task: publish a slot, run whatever is handed over, repeat.
///
/// Runs until `shutdown` is cancelled while the worker is idle, or until the
/// pool drops its end of `available`. A job that was handed over in the same
/// instant as the shutdown signal still runs before the worker exits.
///
/// # Arguments
///
/// - `worker_id`: Identifier used in logs.
/// - `available`: Where the worker offers itself when idle.
/// - `callback`: Handler for [`Job::Msg`].
/// - `shutdown`: Pool-wide shutdown signal.
pub(crate) async fn worker_loop<M: Send + 'static>(
    worker_id: usize,
    available: mpsc::Sender<WorkerSlot<M>>,
    callback: Callback<M>,
    shutdown: CancellationToken,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    loop {
        let (handoff, mut inbox) = oneshot::channel();
        if available.send(WorkerSlot { worker_id, handoff }).await.is_err() {
            break;
        }

        tokio::select! {
            biased;
            dispatch = &mut inbox => match dispatch {
                Ok(dispatch) => run(worker_id, dispatch, &callback).await,
                // The sender that took our slot gave up before handing over.
                Err(_) => continue,
            },
            () = shutdown.cancelled() => {
                inbox.close();
                if let Ok(dispatch) = inbox.try_recv() {
                    run(worker_id, dispatch, &callback).await;
                }
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}

async fn run<M>(_worker_id: usize, dispatch: Dispatch<M>, callback: &Callback<M>) {
    let Dispatch { job, ticket } = dispatch;

    let job = async move {
        match job {
            Job::Msg(msg) => callback(msg).await,
            Job::Fn(f) => f().await,
        }
    };

    if let Err(_panic) = AssertUnwindSafe(job).catch_unwind().await {
        #[cfg(feature = "tracing")]
        tracing::error!(
            "Worker {_worker_id} job panicked: {}",
            panic_message(_panic.as_ref())
        );
    }

    drop(ticket);
}

#[cfg(feature = "tracing")]
fn panic_message(payload: &(dyn core::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
