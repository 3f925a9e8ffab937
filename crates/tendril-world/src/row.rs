//! Persisted row shapes and hydration
//!
//! Rows are what the storage collaborator hands back: property and
//! parameter bags are still serialized JSON strings. Hydration parses them
//! into typed runtime objects and is the only place raw rows are trusted.

use crate::capability::Capability;
use crate::entity::{Entity, Props};
use crate::error::{Result, WorldError};
use serde::{Deserialize, Serialize};
use tendril_core::{EntityId, Expr};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    pub id: EntityId,
    #[serde(default)]
    pub prototype_id: Option<EntityId>,
    /// Serialized JSON object.
    pub props: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRow {
    pub id: String,
    pub owner_id: EntityId,
    #[serde(rename = "type")]
    pub cap_type: String,
    /// Serialized JSON object.
    pub params: String,
}

/// A verb stored on an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerbRow {
    pub entity_id: EntityId,
    pub name: String,
    pub code: Expr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_capability: Option<String>,
}

/// A raw record discriminated by its `kind` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Row {
    Entity(EntityRow),
    Capability(CapabilityRow),
}

impl Row {
    /// Decode a raw JSON record. Unknown or missing discriminants fail.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| WorldError::hydration(e.to_string()))
    }
}

/// Anything with a stable identity that survives rehydration.
pub trait HasId {
    fn stable_id(&self) -> String;
}

/// The typed runtime shape a row hydrates into.
#[derive(Debug, Clone, PartialEq)]
pub enum Hydrated {
    Entity(Entity),
    Capability(Capability),
}

impl HasId for Hydrated {
    fn stable_id(&self) -> String {
        match self {
            Hydrated::Entity(e) => e.stable_id(),
            Hydrated::Capability(c) => c.stable_id(),
        }
    }
}

pub fn hydrate(row: Row) -> Result<Hydrated> {
    match row {
        Row::Entity(row) => Entity::hydrate(&row).map(Hydrated::Entity),
        Row::Capability(row) => Capability::hydrate(&row).map(Hydrated::Capability),
    }
}

/// Parse a serialized bag. Anything but a JSON object is malformed.
pub(crate) fn parse_bag(raw: &str, what: &str) -> Result<Props> {
    if raw.trim().is_empty() {
        return Ok(Props::new());
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(WorldError::hydration(format!(
            "{} must be a JSON object, got {}",
            what, other
        ))),
        Err(e) => Err(WorldError::hydration(format!("{}: {}", what, e))),
    }
}

pub(crate) fn serialize_bag(bag: &Props) -> String {
    serde_json::Value::Object(bag.clone()).to_string()
}
