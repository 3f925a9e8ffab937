//! Tendril Scheduler - deferred and repeating verb invocations
//!
//! Tasks sit in a queue ordered by due time on the scheduler's own
//! millisecond clock. Each tick fires everything due, one task after
//! another, through a [`VerbRunner`] (normally the kernel).

pub mod error;
pub mod scheduler;

pub use error::{Result, SchedulerError};
pub use scheduler::{ScheduledTask, Scheduler, TickReport, VerbRunner};
