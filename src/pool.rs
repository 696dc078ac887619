//! Bounded worker pool for metadata-phase I/O tasks.

use std::sync::mpsc;

use snafu::prelude::*;

use crate::errors::{PoolBuildSnafu, Result};

/// FIFO task pool with a completion channel.
///
/// Tasks are self-contained closures that own their inputs; at most the
/// configured number run at once and [`TaskPool::wait_all`] blocks until
/// every submitted task has produced a result. Completion order is
/// unspecified.
pub(crate) struct TaskPool<T> {
    pool: rayon::ThreadPool,
    tx: mpsc::Sender<T>,
    rx: mpsc::Receiver<T>,
    in_flight: usize,
}

impl<T: Send + 'static> TaskPool<T> {
    /// Build a pool with `threads` workers; any value `<= 0` selects one
    /// worker per hardware thread.
    pub(crate) fn new(threads: i64) -> Result<Self> {
        let threads = if threads <= 0 { 0 } else { threads as usize };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context(PoolBuildSnafu)?;
        let (tx, rx) = mpsc::channel();
        Ok(Self { pool, tx, rx, in_flight: 0 })
    }

    pub(crate) fn submit<F>(&mut self, task: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let tx = self.tx.clone();
        self.pool.spawn_fifo(move || {
            let _ = tx.send(task());
        });
        self.in_flight += 1;
    }

    /// Block until every submitted task has completed and return the results
    /// in completion order.
    pub(crate) fn wait_all(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.in_flight);
        for _ in 0..self.in_flight {
            match self.rx.recv() {
                Ok(value) => out.push(value),
                Err(_) => break,
            }
        }
        self.in_flight = 0;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    #[test]
    fn wait_all_collects_every_result() {
        let mut pool = TaskPool::new(2).unwrap();
        for i in 0..8usize {
            pool.submit(move || i * i);
        }
        let mut results = pool.wait_all();
        results.sort();
        assert_eq!(results, [0, 1, 4, 9, 16, 25, 36, 49]);
    }

    #[test]
    fn index_keyed_results_assemble_in_order() {
        // Earlier tasks sleep longer, so completion order inverts submission
        // order; keying by index must restore it.
        let mut pool = TaskPool::new(4).unwrap();
        for i in 0..4u64 {
            pool.submit(move || {
                std::thread::sleep(Duration::from_millis(30 * (4 - i)));
                (i, i * 10)
            });
        }
        let ordered: BTreeMap<u64, u64> = pool.wait_all().into_iter().collect();
        let values: Vec<u64> = ordered.values().copied().collect();
        assert_eq!(values, [0, 10, 20, 30]);
    }

    #[test]
    fn pool_is_reusable_after_wait_all() {
        let mut pool = TaskPool::new(1).unwrap();
        pool.submit(|| 1);
        assert_eq!(pool.wait_all(), [1]);
        pool.submit(|| 2);
        assert_eq!(pool.wait_all(), [2]);
    }
}
