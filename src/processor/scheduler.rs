//! Concurrent Processor (C6): priority-scheduled task execution honoring
//! the Resource Monitor's worker-count and throttle signals.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use super::queue::{PriorityQueue, QueuedTask};
use super::worker_pool::NativeWorkerPool;
use crate::core::{CoreError, Priority, TaskMetadata, TaskMetrics, TaskResult, TaskStatus, Work};
use crate::resource_monitor::ResourceMonitor;
use crate::sync::Mutex;
use crate::util::clock::now_ms;

const COMPLETED_RETENTION_CAP: usize = 1000;
const COMPLETED_PRUNE_BATCH: usize = 100;
const SCHEDULER_IDLE_BACKOFF_MS: u64 = 10;
const THROTTLE_BACKOFF_MS: u64 = 50;
const QUEUE_RETRY_INTERVAL_MS: u64 = 5;
const MONITOR_INTERVAL_SECS: u64 = 30;
const STUCK_TASK_THRESHOLD_SECS: u64 = 5 * 60;
const STOP_GRACE_MS: u64 = 1000;

/// Construction-time tuning for a [`ConcurrentProcessor`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcessorConfig {
    /// Base worker count fed into `ResourceMonitor::optimal_workers`.
    pub max_workers: usize,
    /// Bounded priority queue capacity.
    pub max_concurrent_tasks: usize,
    /// How long `submit` will retry against a full queue before failing.
    pub queue_timeout_ms: u64,
}

impl ProcessorConfig {
    /// Validate this config's fields are all non-zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".to_string());
        }
        if self.max_concurrent_tasks == 0 {
            return Err("max_concurrent_tasks must be greater than 0".to_string());
        }
        if self.queue_timeout_ms == 0 {
            return Err("queue_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

struct Completed {
    metrics: HashMap<String, TaskMetrics>,
    results: HashMap<String, Result<TaskResult, String>>,
    order: VecDeque<String>,
}

impl Completed {
    fn insert(&mut self, id: String, metrics: TaskMetrics, result: Result<TaskResult, String>) {
        self.metrics.insert(id.clone(), metrics);
        self.results.insert(id.clone(), result);
        self.order.push_back(id);
        while self.order.len() > COMPLETED_RETENTION_CAP {
            let drop_count = COMPLETED_PRUNE_BATCH.min(self.order.len());
            for _ in 0..drop_count {
                if let Some(old) = self.order.pop_front() {
                    self.metrics.remove(&old);
                    self.results.remove(&old);
                }
            }
        }
    }
}

/// Priority-scheduled executor for `Work` callables.
pub struct ConcurrentProcessor {
    config: ProcessorConfig,
    resource_monitor: Arc<ResourceMonitor>,
    worker_pool: Arc<NativeWorkerPool>,
    queue: Mutex<PriorityQueue>,
    active: Mutex<HashMap<String, TaskMetrics>>,
    completed: Mutex<Completed>,
    running: AtomicBool,
    scheduler_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    monitor_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ConcurrentProcessor {
    /// Create a processor. Call [`ConcurrentProcessor::start`] to begin
    /// its scheduling and monitor loops.
    #[must_use]
    pub fn new(config: ProcessorConfig, resource_monitor: Arc<ResourceMonitor>) -> Arc<Self> {
        let worker_pool = Arc::new(NativeWorkerPool::new(config.max_workers.max(1)));
        Arc::new(Self {
            queue: Mutex::new(PriorityQueue::new(config.max_concurrent_tasks)),
            config,
            resource_monitor,
            worker_pool,
            active: Mutex::new(HashMap::new()),
            completed: Mutex::new(Completed {
                metrics: HashMap::new(),
                results: HashMap::new(),
                order: VecDeque::new(),
            }),
            running: AtomicBool::new(false),
            scheduler_handle: Mutex::new(None),
            monitor_handle: Mutex::new(None),
        })
    }

    /// Start the scheduling and monitor loops. Idempotent: a second call
    /// while already running is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let scheduler_self = Arc::clone(self);
        let scheduler_handle = tokio::spawn(async move { scheduler_self.run_scheduler().await });
        *self.scheduler_handle.lock() = Some(scheduler_handle);

        let monitor_self = Arc::clone(self);
        let monitor_handle = tokio::spawn(async move { monitor_self.run_monitor().await });
        *self.monitor_handle.lock() = Some(monitor_handle);
    }

    /// Stop the scheduling and monitor loops and shut down the worker
    /// pool. Idempotent. Running tasks are not forcibly killed; `Stop`
    /// waits briefly before returning.
    pub async fn stop(self: &Arc<Self>) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.scheduler_handle.lock().take() {
            handle.abort();
        }
        if let Some(handle) = self.monitor_handle.lock().take() {
            handle.abort();
        }
        tokio::time::sleep(Duration::from_millis(STOP_GRACE_MS)).await;
        self.worker_pool.shutdown();
    }

    /// Enqueue `work`, retrying against a full queue for up to
    /// `queue_timeout_ms` before giving up.
    pub async fn submit(
        self: &Arc<Self>,
        work: Work,
        priority: Priority,
        timeout: Option<Duration>,
    ) -> Result<String, CoreError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(CoreError::ShuttingDown);
        }
        let task_id = Uuid::new_v4().to_string();
        let meta = TaskMetadata {
            task_id: task_id.clone(),
            priority,
            timeout,
            created_at_ms: now_ms(),
        };

        let deadline = now_ms() + u128::from(self.config.queue_timeout_ms);
        self.enqueue_with_retry(meta, work, deadline).await?;
        Ok(task_id)
    }

    /// Wait for room in the queue (polling the depth against
    /// `max_concurrent_tasks`) and then enqueue in one atomic step once a
    /// slot is believed free, retrying the whole cycle on a lost race.
    async fn enqueue_with_retry(
        &self,
        meta: TaskMetadata,
        work: Work,
        deadline_ms: u128,
    ) -> Result<(), CoreError> {
        let mut pending = Some(QueuedTask { meta, work });
        loop {
            let attempt = {
                let mut queue = self.queue.lock();
                if queue.len() < queue.max_depth() {
                    Some(queue.enqueue(pending.take().expect("pending present until enqueued")))
                } else {
                    None
                }
            };
            match attempt {
                Some(Ok(())) => return Ok(()),
                Some(Err(e)) => return Err(e),
                None => {
                    if now_ms() >= deadline_ms {
                        return Err(CoreError::QueueFull(format!(
                            "queue_timeout_ms elapsed after {deadline_ms}"
                        )));
                    }
                    // `queue.enqueue` consumes its argument only on success;
                    // since we never called it here, `pending` is still ours.
                    tokio::time::sleep(Duration::from_millis(QUEUE_RETRY_INTERVAL_MS)).await;
                    continue;
                }
            }
        }
    }

    /// Submit every item in `items`, returning their task ids in order.
    pub async fn submit_batch(
        self: &Arc<Self>,
        items: Vec<(Work, Priority, Option<Duration>)>,
    ) -> Vec<Result<String, CoreError>> {
        let mut ids = Vec::with_capacity(items.len());
        for (work, priority, timeout) in items {
            ids.push(self.submit(work, priority, timeout).await);
        }
        ids
    }

    /// Poll for `task_id`'s result until it completes or `timeout`
    /// elapses.
    pub async fn wait(&self, task_id: &str, timeout: Duration) -> Result<TaskResult, CoreError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let completed = self.completed.lock();
                if let Some(metrics) = completed.metrics.get(task_id) {
                    return match metrics.status {
                        TaskStatus::Completed => completed
                            .results
                            .get(task_id)
                            .cloned()
                            .unwrap_or(Ok(Vec::new()))
                            .map_err(CoreError::ProviderFailure),
                        TaskStatus::Failed => Err(CoreError::ProviderFailure(
                            metrics.error.clone().unwrap_or_default(),
                        )),
                        TaskStatus::Cancelled => Err(CoreError::Cancelled),
                        TaskStatus::Pending | TaskStatus::Running => unreachable!(),
                    };
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CoreError::Timeout);
            }
            tokio::time::sleep(Duration::from_millis(QUEUE_RETRY_INTERVAL_MS)).await;
        }
    }

    /// Wait on several task ids in parallel, preserving input order.
    pub async fn wait_batch(&self, task_ids: &[String], timeout: Duration) -> Vec<Result<TaskResult, CoreError>> {
        let mut out = Vec::with_capacity(task_ids.len());
        for id in task_ids {
            out.push(self.wait(id, timeout).await);
        }
        out
    }

    async fn run_scheduler(self: Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            self.resource_monitor.sample();
            if self.resource_monitor.should_throttle() {
                tokio::time::sleep(Duration::from_millis(THROTTLE_BACKOFF_MS)).await;
                continue;
            }

            let target = self.resource_monitor.optimal_workers(self.config.max_workers);
            let mut spawned_any = false;
            loop {
                let active_count = self.active.lock().len();
                if active_count >= target {
                    break;
                }
                let Some(task) = self.queue.lock().dequeue() else {
                    break;
                };
                self.spawn_execution(task);
                spawned_any = true;
            }

            if !spawned_any {
                tokio::time::sleep(Duration::from_millis(SCHEDULER_IDLE_BACKOFF_MS)).await;
            }
        }
    }

    fn spawn_execution(self: &Arc<Self>, task: QueuedTask) {
        let task_id = task.meta.task_id.clone();
        let mut metrics = TaskMetrics::new(task_id.clone());
        metrics.status = TaskStatus::Running;
        metrics.start_time_ms = Some(now_ms());
        self.active.lock().insert(task_id.clone(), metrics);

        let processor = Arc::clone(self);
        let timeout = task.meta.timeout;
        tokio::spawn(async move {
            let outcome = processor.run_one(task.work, timeout).await;
            processor.finalize(task_id, outcome);
        });
    }

    async fn run_one(&self, work: Work, timeout: Option<Duration>) -> Result<TaskResult, String> {
        let run = async move {
            match work {
                Work::Async(fut) => fut.await,
                Work::Blocking(job) => self.worker_pool.execute(job).await,
            }
        };
        match timeout {
            Some(t) => tokio::time::timeout(t, run)
                .await
                .unwrap_or_else(|_| Err("timeout".to_string())),
            None => run.await,
        }
    }

    fn finalize(&self, task_id: String, outcome: Result<TaskResult, String>) {
        let Some(mut metrics) = self.active.lock().remove(&task_id) else {
            return;
        };
        metrics.end_time_ms = Some(now_ms());
        match &outcome {
            Ok(bytes) => {
                metrics.status = TaskStatus::Completed;
                metrics.result_size = bytes.len();
            }
            Err(e) => {
                metrics.status = TaskStatus::Failed;
                metrics.error = Some(e.clone());
            }
        }
        self.completed.lock().insert(task_id, metrics, outcome);
    }

    async fn run_monitor(self: Arc<Self>) {
        loop {
            tokio::time::sleep(Duration::from_secs(MONITOR_INTERVAL_SECS)).await;
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            let now = now_ms();
            let active = self.active.lock();
            for (task_id, metrics) in active.iter() {
                if let Some(start) = metrics.start_time_ms {
                    let running_secs = now.saturating_sub(start) / 1000;
                    if running_secs > u128::from(STUCK_TASK_THRESHOLD_SECS) {
                        let running_secs = u64::try_from(running_secs).unwrap_or(u64::MAX);
                        warn!(%task_id, running_secs, "task potentially stuck");
                    }
                }
            }
            debug!(active = active.len(), "scheduler monitor tick");
        }
    }

    /// Current count of tasks in flight.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Current count of retained completed-task metrics.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.lock().order.len()
    }
}
