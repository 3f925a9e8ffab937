//! Scheduler errors

use tendril_core::{EntityId, ScriptError, TaskId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("tick interval must be at least 1ms")]
    InvalidInterval,

    #[error("task {task} ({verb} on entity {entity}) failed: {source}")]
    TaskFailed {
        task: TaskId,
        entity: EntityId,
        verb: String,
        source: ScriptError,
    },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
