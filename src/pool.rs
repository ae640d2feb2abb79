//! Fixed-size worker pool and the block-order gate.
//!
//! The pool is a rayon thread pool with bounded-submit semantics: a
//! `crossbeam_channel::bounded` channel acts as a semaphore so submitters
//! block when the queue is full, and a pending counter plus condvar lets a
//! driver wait for a whole wave of jobs to settle.
//!
//! The [`BlockGate`] serializes shared-bitstream access into block order: a
//! worker holding block `k` spins until the gate reads `k - 1`, performs
//! its shared I/O, then advances the gate to `k`. A sentinel of `-1`
//! cancels every waiter. The gate is the only ordering mechanism in the
//! pipeline; the expensive transform and entropy work runs fully parallel.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    slot_tx: Sender<()>,
    slot_rx: Receiver<()>,
    state: Arc<(Mutex<usize>, Condvar)>,
}

impl WorkerPool {
    /// Pool with `nb_threads` workers and room for `queue_size` queued jobs
    /// beyond the ones executing.
    pub fn new(nb_threads: usize, queue_size: usize) -> Result<Self> {
        if nb_threads == 0 || queue_size == 0 {
            return Err(Error::InvalidParam("pool needs threads and queue".to_string()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nb_threads)
            .build()
            .map_err(|e| Error::InvalidParam(format!("thread pool: {}", e)))?;
        let capacity = nb_threads + queue_size;
        let (slot_tx, slot_rx) = bounded(capacity);
        for _ in 0..capacity {
            slot_tx
                .send(())
                .map_err(|_| Error::InvalidParam("pool slot channel".to_string()))?;
        }
        Ok(WorkerPool {
            pool,
            slot_tx,
            slot_rx,
            state: Arc::new((Mutex::new(0), Condvar::new())),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Submit a job; blocks while the queue is full.
    pub fn submit(&self, job: Job) {
        self.slot_rx.recv().expect("pool slot channel closed");
        {
            let (lock, _) = &*self.state;
            *lock.lock().unwrap() += 1;
        }
        let state = Arc::clone(&self.state);
        let slot_tx = self.slot_tx.clone();
        self.pool.spawn(move || {
            job();
            let (lock, cvar) = &*state;
            let mut pending = lock.lock().unwrap();
            *pending -= 1;
            if *pending == 0 {
                cvar.notify_all();
            }
            let _ = slot_tx.send(());
        });
    }

    /// Block until every submitted job has finished. The pool stays usable.
    pub fn wait_idle(&self) {
        let (lock, cvar) = &*self.state;
        let mut pending = lock.lock().unwrap();
        while *pending > 0 {
            pending = cvar.wait(pending).unwrap();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.wait_idle();
    }
}

// ---------------------------------------------------------------------------
// Block-order gate
// ---------------------------------------------------------------------------

/// Monotonic gate over the last fully emitted/drained block id.
pub struct BlockGate {
    processed: AtomicI64,
}

/// Sentinel meaning "cancel all remaining workers".
const CANCELED: i64 = -1;

impl BlockGate {
    pub fn new() -> Self {
        BlockGate {
            processed: AtomicI64::new(0),
        }
    }

    /// Spin until block `block_id - 1` has been processed. Returns
    /// `Err(Canceled)` if the sentinel is observed.
    pub fn wait_for(&self, block_id: u64) -> Result<()> {
        let want = block_id as i64 - 1;
        let mut spins = 0u32;
        loop {
            let cur = self.processed.load(Ordering::Acquire);
            if cur == CANCELED {
                return Err(Error::Canceled);
            }
            if cur == want {
                return Ok(());
            }
            spins = spins.wrapping_add(1);
            if spins % 64 == 0 {
                std::thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }
    }

    /// Mark `block_id` processed, unblocking its successor. A canceled gate
    /// stays canceled.
    pub fn release(&self, block_id: u64) {
        let _ = self.processed.compare_exchange(
            block_id as i64 - 1,
            block_id as i64,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Cancel all current and future waiters.
    pub fn cancel(&self) {
        self.processed.store(CANCELED, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.processed.load(Ordering::Acquire) == CANCELED
    }
}

impl Default for BlockGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn pool_runs_all_jobs_and_waits() {
        let pool = WorkerPool::new(4, 4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..64 {
            let c = Arc::clone(&counter);
            pool.submit(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.wait_idle();
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn gate_orders_concurrent_workers() {
        let pool = WorkerPool::new(4, 4).unwrap();
        let gate = Arc::new(BlockGate::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        // Submit out of natural order; the gate must still serialize 1..=4.
        for id in [3u64, 1, 4, 2] {
            let gate = Arc::clone(&gate);
            let order = Arc::clone(&order);
            pool.submit(Box::new(move || {
                gate.wait_for(id).unwrap();
                order.lock().unwrap().push(id);
                gate.release(id);
            }));
        }
        pool.wait_idle();
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn canceled_gate_rejects_waiters() {
        let gate = BlockGate::new();
        gate.cancel();
        assert!(gate.is_canceled());
        assert!(matches!(gate.wait_for(5), Err(Error::Canceled)));
        // Release after cancel must not resurrect the gate.
        gate.release(1);
        assert!(gate.is_canceled());
    }

    #[test]
    fn gate_release_is_monotonic() {
        let gate = BlockGate::new();
        gate.release(1);
        gate.release(2);
        assert!(gate.wait_for(3).is_ok());
    }
}
