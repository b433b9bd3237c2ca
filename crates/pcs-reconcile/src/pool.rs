//! Bounded worker pool.
//!
//! A blocking producer feeds a bounded queue; `workers` tasks pull from it.
//! With `fail_fast`, the first error stops dispatch: items already taken run
//! to completion, nothing new is handed out and the error is returned after
//! every task has joined.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    pub workers: usize,
    pub queue_depth: usize,
    pub fail_fast: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_depth: 2,
            fail_fast: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError<E> {
    /// First work error under fail-fast.
    #[error("work aborted: {0}")]
    Aborted(E),
    #[error("pool task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Run `work` over every item and wait for all of it to finish.
///
/// Without `fail_fast`, work errors are dropped here; `work` is expected to
/// have logged and counted them itself.
pub async fn run_pool<T, I, F, Fut, E>(
    items: I,
    opts: PoolOptions,
    work: F,
) -> Result<(), PoolError<E>>
where
    T: Send + 'static,
    I: IntoIterator<Item = T> + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    let workers = opts.workers.max(1);
    let (tx, rx) = mpsc::channel::<T>(opts.queue_depth.max(1));
    let rx = Arc::new(Mutex::new(rx));
    let stop = Arc::new(AtomicBool::new(false));
    let first_err: Arc<StdMutex<Option<E>>> = Arc::new(StdMutex::new(None));

    let producer = {
        let stop = Arc::clone(&stop);
        tokio::task::spawn_blocking(move || {
            for item in items {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                // Every receiver gone: workers have stopped.
                if tx.blocking_send(item).is_err() {
                    break;
                }
            }
        })
    };

    let work = Arc::new(work);
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let rx = Arc::clone(&rx);
        let stop = Arc::clone(&stop);
        let work = Arc::clone(&work);
        let first_err = Arc::clone(&first_err);
        let fail_fast = opts.fail_fast;
        handles.push(tokio::spawn(async move {
            loop {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                let next = rx.lock().await.recv().await;
                let Some(item) = next else {
                    break;
                };
                if let Err(e) = (*work)(item).await {
                    if fail_fast {
                        let mut slot = first_err.lock().unwrap_or_else(|p| p.into_inner());
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                        stop.store(true, Ordering::Release);
                    }
                }
            }
        }));
    }
    drop(rx);

    for handle in handles {
        handle.await?;
    }
    producer.await?;

    let first = first_err.lock().unwrap_or_else(|p| p.into_inner()).take();
    match first {
        Some(e) => Err(PoolError::Aborted(e)),
        None => Ok(()),
    }
}
