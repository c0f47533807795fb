//! Native OS-thread pool executing `Work::Blocking` callables so they
//! never stall the scheduler's cooperative loop.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use tokio::sync::oneshot;

use crate::core::{BoxBlocking, TaskResult};
use crate::sync::Mutex;

struct Job {
    work: BoxBlocking,
    reply: oneshot::Sender<Result<TaskResult, String>>,
}

/// Fixed pool of OS threads, each blocking on a shared channel for work.
/// Dropping the sender half (on [`NativeWorkerPool::shutdown`]) unblocks
/// every worker naturally.
pub struct NativeWorkerPool {
    task_tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl NativeWorkerPool {
    /// Spawn `worker_count` OS threads waiting on a shared job queue.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        let (tx, rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let rx = rx.clone();
            workers.push(thread::spawn(move || {
                while let Ok(job) = rx.recv() {
                    let outcome = (job.work)();
                    let _ = job.reply.send(outcome);
                }
            }));
        }
        Self {
            task_tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    /// Hand `work` off to a worker thread and await its result. Fails
    /// immediately if the pool has been shut down.
    pub async fn execute(&self, work: BoxBlocking) -> Result<TaskResult, String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job { work, reply: reply_tx };

        let sent = match self.task_tx.lock().as_ref() {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        };
        if !sent {
            return Err("worker pool is shut down".to_string());
        }

        reply_rx.await.unwrap_or_else(|_| Err("worker dropped before replying".to_string()))
    }

    /// Stop accepting new jobs and join every worker thread. Workers
    /// finish whatever job they're currently running before exiting.
    pub fn shutdown(&self) {
        *self.task_tx.lock() = None;
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }
}
