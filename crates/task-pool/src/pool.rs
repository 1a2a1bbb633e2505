use async_trait::async_trait;
use router_protocol::{ErrorKind, ResultEnvelope, RouterError};
use serde::Serialize;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Executes one tool call on behalf of the pool.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<ResultEnvelope, RouterError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Point-in-time view of one task, as returned by `poll`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub server_name: String,
    pub tool_name: String,
    pub priority: i32,
    pub submitted_at: u64,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct TaskRecord {
    snapshot: TaskSnapshot,
    arguments: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Heap entry: higher priority first, then submission order.
struct QueueEntry {
    priority: i32,
    seq: u64,
    task_id: String,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct PoolState {
    queue: BinaryHeap<QueueEntry>,
    tasks: HashMap<String, TaskRecord>,
    queued: usize,
    next_seq: u64,
}

/// Fixed-size worker pool over a priority queue.
pub struct TaskPool {
    state: Mutex<PoolState>,
    notify: Notify,
    runner: Arc<dyn ToolRunner>,
    queue_limit: usize,
    stopping: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskPool {
    /// Create the pool and spawn its workers.
    pub fn start(runner: Arc<dyn ToolRunner>, workers: usize, queue_limit: usize) -> Arc<Self> {
        let pool = Arc::new(Self {
            state: Mutex::new(PoolState::default()),
            notify: Notify::new(),
            runner,
            queue_limit,
            stopping: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        });
        let mut handles = Vec::with_capacity(workers.max(1));
        for worker_id in 0..workers.max(1) {
            let worker = pool.clone();
            handles.push(tokio::spawn(async move {
                worker.worker_loop(worker_id).await;
            }));
        }
        *pool.workers.lock().unwrap() = handles;
        pool
    }

    /// Enqueue a task. Fails with `BACKPRESSURE` when the queue is full.
    pub fn submit(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
        priority: i32,
    ) -> Result<String, RouterError> {
        let task_id = Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock().unwrap();
            if state.queued >= self.queue_limit {
                return Err(RouterError::new(
                    ErrorKind::Backpressure,
                    format!("task queue is full ({} queued)", state.queued),
                ));
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.tasks.insert(
                task_id.clone(),
                TaskRecord {
                    snapshot: TaskSnapshot {
                        task_id: task_id.clone(),
                        server_name: server_name.to_string(),
                        tool_name: tool_name.to_string(),
                        priority,
                        submitted_at: unix_now(),
                        status: TaskStatus::Queued,
                        result: None,
                        error: None,
                    },
                    arguments,
                },
            );
            state.queue.push(QueueEntry {
                priority,
                seq,
                task_id: task_id.clone(),
            });
            state.queued += 1;
        }
        self.notify.notify_one();
        log::debug!("task {task_id} queued for {server_name}.{tool_name} (priority {priority})");
        Ok(task_id)
    }

    /// Current status of a task, with result or error once terminal.
    pub fn poll(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .get(task_id)
            .map(|record| record.snapshot.clone())
    }

    /// Cancel a QUEUED task. RUNNING tasks are not interrupted; the current
    /// status comes back either way so the caller sees what happened.
    pub fn cancel(&self, task_id: &str) -> Option<TaskStatus> {
        let mut state = self.state.lock().unwrap();
        let record = state.tasks.get_mut(task_id)?;
        let was_queued = record.snapshot.status == TaskStatus::Queued;
        if was_queued {
            record.snapshot.status = TaskStatus::Cancelled;
        }
        let status = record.snapshot.status;
        if was_queued {
            state.queued = state.queued.saturating_sub(1);
        }
        Some(status)
    }

    /// Cancel everything queued and stop workers after their current task.
    pub async fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        {
            let mut state = self.state.lock().unwrap();
            let ids: Vec<String> = state
                .tasks
                .iter()
                .filter(|(_, r)| r.snapshot.status == TaskStatus::Queued)
                .map(|(id, _)| id.clone())
                .collect();
            for id in ids {
                if let Some(record) = state.tasks.get_mut(&id) {
                    record.snapshot.status = TaskStatus::Cancelled;
                }
            }
            state.queue.clear();
            state.queued = 0;
        }
        self.notify.notify_waiters();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        loop {
            let notified = self.notify.notified();
            match self.take_next() {
                Some((task_id, server_name, tool_name, arguments)) => {
                    log::debug!("worker {worker_id} picked task {task_id}");
                    let outcome = self
                        .runner
                        .run_tool(&server_name, &tool_name, arguments)
                        .await;
                    self.finish(&task_id, outcome);
                }
                None => {
                    if self.stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    notified.await;
                }
            }
        }
    }

    /// Pop the highest-priority QUEUED task and mark it RUNNING.
    /// Entries whose task was cancelled in the meantime are discarded.
    #[allow(clippy::type_complexity)]
    fn take_next(
        &self,
    ) -> Option<(
        String,
        String,
        String,
        Option<serde_json::Map<String, serde_json::Value>>,
    )> {
        let mut state = self.state.lock().unwrap();
        while let Some(entry) = state.queue.pop() {
            let Some(record) = state.tasks.get_mut(&entry.task_id) else {
                continue;
            };
            if record.snapshot.status != TaskStatus::Queued {
                continue;
            }
            record.snapshot.status = TaskStatus::Running;
            let picked = (
                entry.task_id,
                record.snapshot.server_name.clone(),
                record.snapshot.tool_name.clone(),
                record.arguments.take(),
            );
            state.queued = state.queued.saturating_sub(1);
            return Some(picked);
        }
        None
    }

    fn finish(&self, task_id: &str, outcome: Result<ResultEnvelope, RouterError>) {
        let mut state = self.state.lock().unwrap();
        let Some(record) = state.tasks.get_mut(task_id) else {
            return;
        };
        match outcome {
            Ok(envelope) => {
                record.snapshot.status = TaskStatus::Succeeded;
                record.snapshot.result = Some(envelope);
            }
            Err(e) => {
                record.snapshot.status = TaskStatus::Failed;
                record.snapshot.error = Some(e.to_text());
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
