//! Opcode registry
//!
//! Built once during startup, then frozen behind an `Arc` and shared by
//! every invocation. Registration is last-write-wins per name so hosts can
//! override a built-in.

use crate::opcode::{Alias, Arity, Evaluation, Opcode};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tendril_core::{Result, ScriptError};

/// Read-only description of an opcode for tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpcodeMetadata {
    pub name: String,
    pub category: String,
    pub arity: Arity,
    pub is_async: bool,
    pub evaluation: Evaluation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_capability: Option<String>,
}

pub struct OpcodeRegistry {
    opcodes: HashMap<String, Arc<dyn Opcode>>,
}

impl Default for OpcodeRegistry {
    fn default() -> Self { Self::new() }
}

impl OpcodeRegistry {
    pub fn new() -> Self { Self { opcodes: HashMap::new() } }

    /// Register an opcode. Replaces any existing opcode with the same name.
    pub fn register(&mut self, opcode: impl Opcode + 'static) {
        self.register_arc(Arc::new(opcode));
    }

    pub fn register_arc(&mut self, opcode: Arc<dyn Opcode>) {
        let name = opcode.name().to_string();
        if self.opcodes.insert(name.clone(), opcode).is_some() {
            tracing::debug!(opcode = %name, "opcode overridden");
        }
    }

    /// Merge a library of opcodes, overriding same-named entries.
    pub fn register_library(&mut self, library: impl IntoIterator<Item = Arc<dyn Opcode>>) {
        for opcode in library {
            self.register_arc(opcode);
        }
    }

    /// Register `alias` as another name for `target`. Returns false when
    /// `target` is not registered.
    pub fn alias(&mut self, alias: &str, target: &str) -> bool {
        match self.get(target) {
            Some(opcode) => {
                self.register(Alias::new(alias, opcode));
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Opcode>> {
        self.opcodes.get(name).cloned()
    }

    /// Like [`get`](Self::get) but failing with an unknown-opcode error.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Opcode>> {
        self.get(name).ok_or_else(|| ScriptError::UnknownOpcode(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.opcodes.contains_key(name)
    }

    pub fn len(&self) -> usize { self.opcodes.len() }

    pub fn is_empty(&self) -> bool { self.opcodes.is_empty() }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.opcodes.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Metadata for every opcode, sorted by name.
    pub fn list_metadata(&self) -> Vec<OpcodeMetadata> {
        let mut metadata: Vec<OpcodeMetadata> = self
            .opcodes
            .values()
            .map(|op| OpcodeMetadata {
                name: op.name().to_string(),
                category: op.category().to_string(),
                arity: op.arity(),
                is_async: op.is_async(),
                evaluation: op.evaluation(),
                required_capability: op.required_capability().map(String::from),
            })
            .collect();
        metadata.sort_by(|a, b| a.name.cmp(&b.name));
        metadata
    }
}
