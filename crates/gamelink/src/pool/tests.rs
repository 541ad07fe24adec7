use super::*;
use core::time::Duration;
use futures::FutureExt;
use gamelink_core::Error;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::{sync::Semaphore, time::timeout};

/// Callback that records concurrency and blocks until `gate` hands out a
/// permit.
fn gated(
    gate: &Arc<Semaphore>,
    running: &Arc<AtomicUsize>,
    peak: &Arc<AtomicUsize>,
    done: &Arc<AtomicUsize>,
) -> impl Fn(usize) -> BoxFuture<'static, ()> + Send + Sync + 'static {
    let (gate, running, peak, done) = (
        Arc::clone(gate),
        Arc::clone(running),
        Arc::clone(peak),
        Arc::clone(done),
    );
    move |_job| {
        let (gate, running, peak, done) = (
            Arc::clone(&gate),
            Arc::clone(&running),
            Arc::clone(&peak),
            Arc::clone(&done),
        );
        async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            gate.acquire().await.unwrap().forget();
            running.fetch_sub(1, Ordering::SeqCst);
            done.fetch_add(1, Ordering::SeqCst);
        }
        .boxed()
    }
}

#[tokio::test]
async fn busy_workers_apply_backpressure() {
    let gate = Arc::new(Semaphore::new(0));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));
    let pool = TaskPool::new(2, gated(&gate, &running, &peak, &done)).unwrap();

    pool.send_msg(1).await.unwrap();
    pool.send_msg(2).await.unwrap();

    // Both workers are parked on the gate, so there is no one to take job 3.
    assert!(
        timeout(Duration::from_millis(100), pool.send_msg(3))
            .await
            .is_err()
    );
    assert_eq!(running.load(Ordering::SeqCst), 2);

    gate.add_permits(1);
    timeout(Duration::from_secs(1), pool.send_msg(3))
        .await
        .expect("a worker freed up")
        .unwrap();

    gate.add_permits(4);
    pool.send_msg(4).await.unwrap();
    pool.send_msg(5).await.unwrap();
    pool.wait().await;

    assert_eq!(done.load(Ordering::SeqCst), 5);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wait_returns_after_every_job_ran_once() {
    const JOBS: usize = 200;
    let hits: Arc<Vec<AtomicUsize>> = Arc::new((0..JOBS).map(|_| AtomicUsize::new(0)).collect());

    let pool = {
        let hits = Arc::clone(&hits);
        TaskPool::new(4, move |job: usize| {
            let hits = Arc::clone(&hits);
            async move {
                tokio::task::yield_now().await;
                hits[job].fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap()
    };

    for job in 0..JOBS {
        if job % 2 == 0 {
            pool.send_msg(job).await.unwrap();
        } else {
            let hits = Arc::clone(&hits);
            pool.send_fn(move || async move {
                hits[job].fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }
    }
    pool.wait().await;

    assert!(hits.iter().all(|h| h.load(Ordering::SeqCst) == 1));
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn wait_on_an_idle_pool_returns_immediately() {
    let pool = TaskPool::new(1, |_: ()| async {}).unwrap();
    timeout(Duration::from_secs(1), pool.wait()).await.unwrap();
}

#[tokio::test]
async fn closed_pool_rejects_work() {
    let ran = Arc::new(AtomicUsize::new(0));
    let pool = {
        let ran = Arc::clone(&ran);
        TaskPool::new(2, move |_: u32| {
            ran.fetch_add(1, Ordering::SeqCst);
            async {}
        })
        .unwrap()
    };

    pool.close();
    assert!(pool.is_closed());

    for i in 0..10 {
        assert!(matches!(pool.send_msg(i).await, Err(Error::Closed)));
    }
    let ran_fn = Arc::clone(&ran);
    let result = pool
        .send_fn(move || async move {
            ran_fn.fetch_add(1, Ordering::SeqCst);
        })
        .await;
    assert!(matches!(result, Err(Error::Closed)));

    pool.join().await;
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn close_lets_running_jobs_finish() {
    let finished = Arc::new(AtomicBool::new(false));
    let pool = TaskPool::new(1, |_: ()| async {}).unwrap();

    let flag = Arc::clone(&finished);
    pool.send_fn(move || async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        flag.store(true, Ordering::SeqCst);
    })
    .await
    .unwrap();

    pool.close();
    timeout(Duration::from_secs(2), pool.join()).await.unwrap();

    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn sender_waiting_for_a_worker_sees_close() {
    let gate = Arc::new(Semaphore::new(0));
    let counters = (
        Arc::new(AtomicUsize::new(0)),
        Arc::new(AtomicUsize::new(0)),
        Arc::new(AtomicUsize::new(0)),
    );
    let pool = Arc::new(
        TaskPool::new(1, gated(&gate, &counters.0, &counters.1, &counters.2)).unwrap(),
    );
    pool.send_msg(1).await.unwrap();

    let blocked = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.send_msg(2).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.close();
    assert!(matches!(blocked.await.unwrap(), Err(Error::Closed)));

    gate.add_permits(1);
    pool.join().await;
    assert_eq!(counters.2.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_job_does_not_kill_its_worker() {
    let ran = Arc::new(AtomicUsize::new(0));
    let pool = {
        let ran = Arc::clone(&ran);
        TaskPool::new(1, move |_: ()| {
            let ran = Arc::clone(&ran);
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap()
    };

    pool.send_fn(|| async { panic!("job failed") }).await.unwrap();
    pool.send_msg(()).await.unwrap();
    pool.wait().await;

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn cancelled_send_does_not_leak_outstanding_work() {
    let gate = Arc::new(Semaphore::new(0));
    let counters = (
        Arc::new(AtomicUsize::new(0)),
        Arc::new(AtomicUsize::new(0)),
        Arc::new(AtomicUsize::new(0)),
    );
    let pool = TaskPool::new(1, gated(&gate, &counters.0, &counters.1, &counters.2)).unwrap();
    pool.send_msg(1).await.unwrap();

    assert!(
        timeout(Duration::from_millis(50), pool.send_msg(2))
            .await
            .is_err()
    );
    assert_eq!(pool.outstanding(), 1);

    gate.add_permits(1);
    pool.wait().await;
    assert_eq!(counters.2.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_workers_is_rejected() {
    let err = TaskPool::new(0, |_: ()| async {}).err().unwrap();
    assert!(matches!(err, Error::Config { .. }));
}

#[tokio::test]
async fn worker_count_is_reported() {
    let pool = TaskPool::new(3, |_: ()| async {}).unwrap();
    assert_eq!(pool.worker_count(), 3);
    assert!(!pool.is_closed());
}
