//! Bounded-concurrency background revalidation.
//!
//! # Scheduling
//!
//! Paths wait in a FIFO queue. Whenever fewer than `concurrency` paths are
//! in flight, a worker task is started for the front of the queue. A worker
//! that finishes a path takes the next queued one itself, so at most
//! `concurrency` workers ever exist and the queue drains without recursion.
//!
//! The queue, its membership set and the in-flight set live under a single
//! mutex. It is never held across an `.await`.
//!
//! # Invariants
//!
//! - A path is never both queued and in flight
//! - A path is never queued twice
//! - The in-flight set never exceeds the concurrency limit

use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::pin::pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::error::RevalidateError;
use crate::lock;
use crate::render::RenderPipeline;

const SOURCE: &str = "revalidation";

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<String>,
    queued: HashSet<String>,
    in_flight: HashSet<String>,
}

impl QueueState {
    fn contains(&self, path: &str) -> bool {
        self.queued.contains(path) || self.in_flight.contains(path)
    }

    fn push(&mut self, path: &str) {
        self.queued.insert(path.to_owned());
        self.queue.push_back(path.to_owned());
    }

    /// Move the next queued path into flight.
    fn pop(&mut self) -> Option<String> {
        let path = self.queue.pop_front()?;
        self.queued.remove(&path);
        self.in_flight.insert(path.clone());
        Some(path)
    }

    /// Move queued paths into flight until the limit is reached.
    fn claim(&mut self, limit: usize) -> Vec<String> {
        let mut claimed = Vec::new();
        while self.in_flight.len() < limit {
            let Some(path) = self.pop() else {
                break;
            };
            claimed.push(path);
        }
        claimed
    }

    /// Return claimed paths to the front of the queue, keeping their order.
    fn unclaim(&mut self, paths: Vec<String>) {
        for path in paths.into_iter().rev() {
            self.in_flight.remove(&path);
            self.queued.insert(path.clone());
            self.queue.push_front(path);
        }
    }

    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_empty()
    }
}

struct Shared {
    pipeline: Arc<RenderPipeline>,
    state: Mutex<QueueState>,
    limit: usize,
    idle: Notify,
}

impl Shared {
    /// Revalidate `path`, then keep taking queued paths until none are left.
    async fn run_worker(self: Arc<Self>, mut path: String) {
        loop {
            self.revalidate_logged(&path).await;

            let next = {
                let mut state = lock::lock(&self.state, SOURCE, "worker.next");
                state.in_flight.remove(&path);
                let next = state.pop();
                if state.is_idle() {
                    self.idle.notify_waiters();
                }
                next
            };

            match next {
                Some(queued) => path = queued,
                None => break,
            }
        }
    }

    async fn revalidate_logged(&self, path: &str) {
        let start = Instant::now();

        // A panicking renderer must still release the path from the in-flight set
        let result = self.pipeline.revalidate_isolated(path).await;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(()) => tracing::info!(path, elapsed_ms, "Revalidated page"),
            Err(e @ (RevalidateError::Unresolved(_) | RevalidateError::Ineligible { .. })) => {
                tracing::info!(path, reason = %e, "Skipped revalidation");
            }
            Err(e) => tracing::warn!(
                path,
                error = %e,
                elapsed_ms,
                "Revalidation failed, keeping previous entry"
            ),
        }
    }
}

/// Background regeneration queue with a fixed concurrency limit.
///
/// Workers are spawned on the Tokio runtime that is current when a path is
/// queued. Queuing outside a runtime keeps the path queued until a later call
/// from inside one.
pub struct RevalidationScheduler {
    shared: Arc<Shared>,
}

impl RevalidationScheduler {
    pub(crate) fn new(pipeline: Arc<RenderPipeline>, concurrency: NonZeroUsize) -> Self {
        Self {
            shared: Arc::new(Shared {
                pipeline,
                state: Mutex::new(QueueState::default()),
                limit: concurrency.get(),
                idle: Notify::new(),
            }),
        }
    }

    /// Queue `path` for background regeneration.
    ///
    /// Returns `false` without doing anything if the path is already queued
    /// or in flight.
    pub fn queue(&self, path: &str) -> bool {
        let claimed = {
            let mut state = lock::lock(&self.shared.state, SOURCE, "queue");
            if state.contains(path) {
                tracing::debug!(path, "Revalidation already pending");
                return false;
            }
            state.push(path);
            state.claim(self.shared.limit)
        };

        self.start_workers(claimed);
        true
    }

    fn start_workers(&self, paths: Vec<String>) {
        if paths.is_empty() {
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            tracing::error!(
                pending = paths.len(),
                "No async runtime available, revalidation stays queued"
            );
            lock::lock(&self.shared.state, SOURCE, "unclaim").unclaim(paths);
            return;
        };

        for path in paths {
            handle.spawn(Arc::clone(&self.shared).run_worker(path));
        }
    }

    /// Maximum number of paths in flight.
    #[must_use]
    pub fn concurrency_limit(&self) -> usize {
        self.shared.limit
    }

    /// Number of paths currently being regenerated.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        lock::lock(&self.shared.state, SOURCE, "in_flight_len")
            .in_flight
            .len()
    }

    /// Number of paths waiting for a worker.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        lock::lock(&self.shared.state, SOURCE, "queued_len")
            .queue
            .len()
    }

    /// True if nothing is queued or in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        lock::lock(&self.shared.state, SOURCE, "is_idle").is_idle()
    }

    /// Wait until nothing is queued or in flight.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = pin!(self.shared.idle.notified());
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}
