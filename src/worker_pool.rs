use std::thread::JoinHandle;

use tracing::warn;

/// An ordered collection of joinable worker threads, collected by an
/// external runner that spawns one OS thread per pipeline stage and drives
/// it with the schedule this crate produces.
///
/// This performs no scheduling logic of its own; it only tracks handles so
/// the runner can join them during shutdown.
#[derive(Default)]
pub struct WorkerPool {
    workers: Vec<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self { workers: Vec::new() }
    }

    /// Register a worker thread, returning its id for later `join` calls.
    pub fn push(&mut self, handle: JoinHandle<()>) -> usize {
        self.workers.push(Some(handle));
        self.workers.len() - 1
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Join a single worker. A no-op if `worker_id` is out of range or has
    /// already been joined.
    pub fn join(&mut self, worker_id: usize) {
        let Some(slot) = self.workers.get_mut(worker_id) else {
            return;
        };
        let Some(handle) = slot.take() else {
            return;
        };
        if let Err(e) = handle.join() {
            warn!(worker_id, error = ?e, "worker thread panicked");
        }
    }

    /// Join every worker that hasn't already been joined.
    pub fn join_all(&mut self) {
        for worker_id in 0..self.workers.len() {
            self.join(worker_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_idempotent() {
        let mut pool = WorkerPool::new();
        let id = pool.push(std::thread::spawn(|| {}));
        pool.join(id);
        // Second join on the same id is a no-op, not a panic.
        pool.join(id);
    }

    #[test]
    fn join_all_joins_every_worker() {
        let mut pool = WorkerPool::new();
        for _ in 0..4 {
            pool.push(std::thread::spawn(|| {}));
        }
        assert_eq!(pool.len(), 4);
        pool.join_all();
    }

    #[test]
    fn join_out_of_range_is_a_no_op() {
        let mut pool = WorkerPool::new();
        pool.join(0);
        assert!(pool.is_empty());
    }
}
