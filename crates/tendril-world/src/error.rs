//! Error types for the entity and capability layer

use tendril_core::{EntityId, ScriptError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorldError {
    #[error("hydration failed: {0}")]
    Hydration(String),

    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("denied: {0}")]
    Denied(String),

    #[error("invalid restriction for '{key}': {reason}")]
    InvalidRestriction { key: String, reason: String },

    #[error("{method}: {message}")]
    InvalidArgument { method: String, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WorldError>;

impl WorldError {
    pub fn hydration(message: impl Into<String>) -> Self {
        Self::Hydration(message.into())
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied(reason.into())
    }

    pub fn invalid_argument(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn invalid_restriction(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRestriction {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<WorldError> for ScriptError {
    fn from(err: WorldError) -> Self {
        match err {
            WorldError::Hydration(_) | WorldError::Json(_) => ScriptError::Hydration(err.to_string()),
            WorldError::EntityNotFound(_) | WorldError::CapabilityNotFound(_) => {
                ScriptError::NotFound(err.to_string())
            }
            WorldError::Denied(_) | WorldError::InvalidRestriction { .. } => {
                ScriptError::CapabilityDenied(err.to_string())
            }
            WorldError::InvalidArgument { method, message } => ScriptError::type_error(method, message),
            WorldError::Storage(message) => ScriptError::external("storage", message),
            WorldError::Io(e) => ScriptError::external("storage", e.to_string()),
        }
    }
}
