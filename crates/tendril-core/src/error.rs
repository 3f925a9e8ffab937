//! Error types for Tendril scripts

use thiserror::Error;

/// Every way a script invocation can fail. All of them unwind the whole
/// invocation; there is no in-script recovery. [`ScriptError::Escape`] is
/// the exception: loops and function calls absorb it before it reaches the
/// host.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),

    #[error("capability denied: {0}")]
    CapabilityDenied(String),

    #[error("gas exhausted (budget {budget})")]
    GasExhausted { budget: u64 },

    #[error("unbound variable: {0}")]
    UnboundVariable(String),

    #[error("cannot set undefined variable: {0}")]
    UndefinedAssignment(String),

    #[error("hydration error: {0}")]
    Hydration(String),

    #[error("external error: {service} - {message}")]
    External { service: String, message: String },

    #[error("{opcode}: {message}")]
    Type { opcode: String, message: String },

    #[error("{opcode}: expected {expected} arguments, got {got}")]
    Arity {
        opcode: String,
        expected: String,
        got: usize,
    },

    #[error("script error: {0}")]
    Thrown(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("call depth limit of {0} exceeded")]
    DepthLimit(usize),

    #[error("expression nesting limit of {0} exceeded")]
    NestingLimit(usize),

    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("{0} outside of a loop or function")]
    Escape(Escape),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Non-local exit raised by `std.break`, `std.continue` and `std.return`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Escape {
    Break,
    Continue,
    Return,
}

impl std::fmt::Display for Escape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Escape::Break => "std.break",
            Escape::Continue => "std.continue",
            Escape::Return => "std.return",
        })
    }
}

/// Coarse classification of a [`ScriptError`]. Two failures of the same
/// kind are considered equivalent even when their messages differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownOpcode,
    CapabilityDenied,
    GasExhausted,
    Scope,
    Hydration,
    External,
    Argument,
    Thrown,
    NotFound,
    Limit,
    Internal,
}

pub type Result<T> = std::result::Result<T, ScriptError>;

impl ScriptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownOpcode(_) => ErrorKind::UnknownOpcode,
            Self::CapabilityDenied(_) => ErrorKind::CapabilityDenied,
            Self::GasExhausted { .. } => ErrorKind::GasExhausted,
            Self::UnboundVariable(_) | Self::UndefinedAssignment(_) => ErrorKind::Scope,
            Self::Hydration(_) => ErrorKind::Hydration,
            Self::External { .. } => ErrorKind::External,
            Self::Type { .. } | Self::Arity { .. } => ErrorKind::Argument,
            Self::Thrown(_) => ErrorKind::Thrown,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DepthLimit(_) | Self::NestingLimit(_) | Self::ResourceLimit(_) => ErrorKind::Limit,
            // only observable when an escape is misplaced
            Self::Escape(_) => ErrorKind::Argument,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self::CapabilityDenied(reason.into())
    }

    pub fn type_error(opcode: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Type {
            opcode: opcode.into(),
            message: message.into(),
        }
    }

    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::External {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::ResourceLimit(message.into())
    }
}
