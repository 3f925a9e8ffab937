//! Tick scheduler
//!
//! The queue is keyed by `(due_ms, task_id)`, so tasks due at the same
//! moment fire in scheduling order. A task being fired is out of the queue;
//! cancelling it then only stops it from repeating.

use crate::error::{Result, SchedulerError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tendril_core::{EntityId, ScriptError, TaskId};
use tendril_engine::{Kernel, TaskRequest, TaskSink, Value};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub entity_id: EntityId,
    pub verb: String,
    pub args: Vec<serde_json::Value>,
    /// Scheduler clock time the task becomes due.
    pub due_ms: u64,
    pub repeat_ms: Option<u64>,
}

/// Runs a fired task. The target entity is also the caller.
#[async_trait::async_trait]
pub trait VerbRunner: Send + Sync {
    async fn run_task(&self, task: &ScheduledTask) -> std::result::Result<(), ScriptError>;
}

#[async_trait::async_trait]
impl VerbRunner for Kernel {
    async fn run_task(&self, task: &ScheduledTask) -> std::result::Result<(), ScriptError> {
        let args = task.args.iter().map(Value::from_json).collect();
        self.invoke(task.entity_id, &task.verb, args, task.entity_id).await?;
        Ok(())
    }
}

/// Outcome of one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Tasks run this tick, failed ones included.
    pub fired: usize,
    pub failures: Vec<SchedulerError>,
}

#[derive(Default)]
struct Queue {
    due: BTreeMap<(u64, TaskId), ScheduledTask>,
    /// Due time of every queued task.
    index: HashMap<TaskId, u64>,
    /// Owner of every task being fired.
    firing: HashMap<TaskId, EntityId>,
    cancelled: HashSet<TaskId>,
}

pub struct Scheduler {
    queue: Mutex<Queue>,
    next_id: AtomicU64,
    started: Instant,
    tick_ms: u64,
    runner: Arc<dyn VerbRunner>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn VerbRunner>, tick_ms: u64) -> Result<Self> {
        if tick_ms == 0 {
            return Err(SchedulerError::InvalidInterval);
        }
        Ok(Self {
            queue: Mutex::new(Queue::default()),
            next_id: AtomicU64::new(1),
            started: Instant::now(),
            tick_ms,
            runner,
        })
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    /// Milliseconds since the scheduler was created.
    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Queue a task `delay_ms` from now.
    pub fn schedule(&self, request: TaskRequest) -> TaskId {
        let due = self.now_ms().saturating_add(request.delay_ms);
        self.schedule_at(request.entity_id, request.verb, request.args, due, request.repeat_ms)
    }

    /// Queue a task at an absolute scheduler time.
    pub fn schedule_at(
        &self,
        entity_id: EntityId,
        verb: impl Into<String>,
        args: Vec<serde_json::Value>,
        due_ms: u64,
        repeat_ms: Option<u64>,
    ) -> TaskId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = ScheduledTask { id, entity_id, verb: verb.into(), args, due_ms, repeat_ms };
        debug!(task = id, entity = entity_id, verb = %task.verb, due_ms, ?repeat_ms, "task scheduled");
        self.enqueue(task);
        id
    }

    fn enqueue(&self, task: ScheduledTask) {
        let mut queue = self.queue.lock();
        queue.index.insert(task.id, task.due_ms);
        queue.due.insert((task.due_ms, task.id), task);
    }

    /// Drop a pending task, or stop a firing one from repeating. Returns
    /// false for unknown or finished tasks.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.cancel_if(id, |_| true)
    }

    /// Like [`Scheduler::cancel`], but only for tasks scheduled on `owner`.
    pub fn cancel_owned(&self, owner: EntityId, id: TaskId) -> bool {
        self.cancel_if(id, |entity| entity == owner)
    }

    fn cancel_if(&self, id: TaskId, allowed: impl Fn(EntityId) -> bool) -> bool {
        let mut queue = self.queue.lock();
        if let Some(&due) = queue.index.get(&id) {
            if !queue.due.get(&(due, id)).is_some_and(|task| allowed(task.entity_id)) {
                return false;
            }
            queue.index.remove(&id);
            queue.due.remove(&(due, id));
            debug!(task = id, "task cancelled");
            return true;
        }
        match queue.firing.get(&id) {
            Some(&entity) if allowed(entity) => {
                queue.cancelled.insert(id);
                true
            }
            _ => false,
        }
    }

    /// Queued tasks in firing order.
    pub fn pending(&self) -> Vec<ScheduledTask> {
        self.queue.lock().due.values().cloned().collect()
    }

    fn take_due(&self, now: u64) -> Vec<ScheduledTask> {
        let mut queue = self.queue.lock();
        let later = queue.due.split_off(&(now.saturating_add(1), 0));
        let due = std::mem::replace(&mut queue.due, later);
        let tasks: Vec<ScheduledTask> = due.into_values().collect();
        for task in &tasks {
            queue.index.remove(&task.id);
            queue.firing.insert(task.id, task.entity_id);
        }
        tasks
    }

    fn finish(&self, mut task: ScheduledTask, fired_at: u64) {
        let mut queue = self.queue.lock();
        queue.firing.remove(&task.id);
        if queue.cancelled.remove(&task.id) {
            return;
        }
        if let Some(interval) = task.repeat_ms {
            task.due_ms = fired_at.saturating_add(interval);
            queue.index.insert(task.id, task.due_ms);
            queue.due.insert((task.due_ms, task.id), task);
        }
    }

    /// Fire every task due at `now`, in due order. A failing task is logged
    /// and reported; it does not stop the rest.
    pub async fn tick_at(&self, now: u64) -> TickReport {
        let mut report = TickReport::default();
        for task in self.take_due(now) {
            report.fired += 1;
            if let Err(source) = self.runner.run_task(&task).await {
                warn!(task = task.id, entity = task.entity_id, verb = %task.verb, error = %source, "scheduled task failed");
                report.failures.push(SchedulerError::TaskFailed {
                    task: task.id,
                    entity: task.entity_id,
                    verb: task.verb.clone(),
                    source,
                });
            }
            self.finish(task, now);
        }
        report
    }

    pub async fn tick(&self) -> TickReport {
        self.tick_at(self.now_ms()).await
    }

    /// Tick every `tick_ms` until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_millis(self.tick_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick_ms = self.tick_ms, "scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(pending = self.queue.lock().due.len(), "scheduler stopped");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.tick().await;
                    if report.fired > 0 {
                        debug!(fired = report.fired, failed = report.failures.len(), "tick");
                    }
                }
            }
        }
    }
}

impl TaskSink for Scheduler {
    fn schedule(&self, request: TaskRequest) -> TaskId {
        Scheduler::schedule(self, request)
    }

    fn cancel(&self, owner: EntityId, id: TaskId) -> bool {
        self.cancel_owned(owner, id)
    }
}
