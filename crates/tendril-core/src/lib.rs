//! Tendril Core - Expression tree, shared types, configuration and errors

pub mod config;
pub mod error;
pub mod expr;
pub mod types;

pub use config::{EngineConfig, LogConfig, SchedulerConfig, TendrilConfig};
pub use error::{ErrorKind, Escape, Result, ScriptError};
pub use expr::Expr;
pub use types::*;
