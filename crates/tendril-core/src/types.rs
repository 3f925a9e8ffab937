//! Core types for Tendril

use serde::{Deserialize, Serialize};

/// Entity identity. Stable across restarts.
pub type EntityId = i64;

/// Scheduled task identity, unique within one scheduler.
pub type TaskId = u64;

/// How a verb's expression tree is executed.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Tree-walking evaluation.
    #[default]
    Interpret,
    /// Ahead-of-time compilation to closures.
    Compile,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Interpret => write!(f, "interpret"),
            Strategy::Compile => write!(f, "compile"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interpret" | "interpreter" => Ok(Strategy::Interpret),
            "compile" | "compiler" => Ok(Strategy::Compile),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}
