//! FIFO rate throttler for per-address provider calls
//!
//! Providers like Etherscan meter requests per second, and token balance
//! lookups are one request per address. The throttler spaces out dispatches
//! of arbitrary async work items by a fixed minimum interval so a burst of
//! addresses never trips a provider ban.
//!
//! Construct one per provider quota and share it (`Arc`) across every
//! source that draws on that quota.

use crate::error::ThrottleError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() + Send>;

/// FIFO call scheduler with a fixed minimum interval between dispatches.
///
/// A single drain task dequeues one item at a time, starts it without
/// awaiting its completion, then sleeps the interval. Throughput is capped
/// at one dispatch per interval; completion latency of an individual item
/// does not delay the queue.
///
/// Must be created inside a Tokio runtime. Dropping the throttler closes
/// the queue and ends the drain task; items already dispatched run to
/// completion.
pub struct Throttler {
    queue: mpsc::UnboundedSender<Job>,
}

impl Throttler {
    pub fn new(interval: Duration) -> Self {
        let (queue, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                // Start the item, don't wait for it to finish: dispatch
                // spacing is decoupled from item duration.
                job();
                tokio::time::sleep(interval).await;
            }
        });

        Self { queue }
    }

    /// Enqueues `work` and resolves with its own outcome once it has been
    /// dispatched and has completed.
    ///
    /// A panic inside `work` is contained to that item: its caller gets
    /// [`ThrottleError::Dropped`] and the queue keeps draining.
    pub async fn throttle<T, F>(&self, work: F) -> Result<T, ThrottleError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            tokio::spawn(async move {
                let outcome = work.await;
                // Receiver may have given up; nothing to do then.
                let _ = done_tx.send(outcome);
            });
        });

        self.queue
            .send(job)
            .map_err(|_| ThrottleError::Closed)?;

        done_rx.await.map_err(|_| ThrottleError::Dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn spaces_dispatches_by_interval() {
        let interval = Duration::from_millis(250);
        let throttler = Arc::new(Throttler::new(interval));
        let dispatches: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4u32 {
            let throttler = throttler.clone();
            let dispatches = dispatches.clone();
            handles.push(tokio::spawn(async move {
                throttler
                    .throttle(async move {
                        dispatches.lock().unwrap().push(Instant::now());
                        i
                    })
                    .await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(results.len(), 4);

        let dispatches = dispatches.lock().unwrap();
        assert_eq!(dispatches.len(), 4);
        for pair in dispatches.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= interval);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn preserves_enqueue_order() {
        let throttler = Arc::new(Throttler::new(Duration::from_millis(10)));
        let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5u32 {
            let throttler = throttler.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                throttler
                    .throttle(async move {
                        order.lock().unwrap().push(i);
                    })
                    .await
            }));
            // Enqueue deterministically before spawning the next caller.
            tokio::task::yield_now().await;
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn work_outcome_passes_through() {
        let throttler = Throttler::new(Duration::from_millis(10));

        let ok = throttler.throttle(async { 42u64 }).await;
        assert_eq!(ok, Ok(42));

        let err: Result<Result<(), String>, _> = throttler
            .throttle(async { Err("provider said no".to_string()) })
            .await;
        assert_eq!(err, Ok(Err("provider said no".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_item_does_not_stop_the_queue() {
        let throttler = Arc::new(Throttler::new(Duration::from_millis(10)));

        let doomed = {
            let throttler = throttler.clone();
            tokio::spawn(async move {
                throttler
                    .throttle(async {
                        panic!("work item exploded");
                    })
                    .await
            })
        };

        let outcome: Result<(), ThrottleError> = doomed.await.unwrap();
        assert_eq!(outcome, Err(ThrottleError::Dropped));

        // The queue is still draining.
        assert_eq!(throttler.throttle(async { 7u32 }).await, Ok(7));
    }
}
