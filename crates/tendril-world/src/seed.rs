//! JSON world seeds
//!
//! A seed describes a starting world: entities with their verbs,
//! capabilities, and tasks to schedule once the scheduler is up.
//!
//! ```json
//! {
//!   "entities": [
//!     {"id": 1, "props": {"name": "Lobby"}, "verbs": {"look": ["world.prop", ["std.this"], "name"]}}
//!   ],
//!   "capabilities": [{"owner_id": 1, "type": "entity.control", "params": {"*": true}}],
//!   "tasks": [{"entity_id": 1, "verb": "look", "delay_ms": 0, "repeat_ms": 1000}]
//! }
//! ```

use crate::entity::{Entity, Props};
use crate::error::Result;
use crate::row::VerbRow;
use crate::store::WorldStore;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tendril_core::{EntityId, Expr};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub entities: Vec<SeedEntity>,
    pub capabilities: Vec<SeedCapability>,
    pub tasks: Vec<SeedTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEntity {
    pub id: EntityId,
    #[serde(default)]
    pub prototype_id: Option<EntityId>,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub verbs: BTreeMap<String, SeedVerb>,
}

/// A verb body. In a seed it is written either as a bare expression or as
/// `{"code": <expr>, "required_capability": "<type>"}`.
#[derive(Debug, Clone, Serialize)]
pub struct SeedVerb {
    pub code: Expr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_capability: Option<String>,
}

impl<'de> Deserialize<'de> for SeedVerb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Object(mut fields) if fields.contains_key("code") => {
                let required_capability = match fields.remove("required_capability") {
                    None | Some(serde_json::Value::Null) => None,
                    Some(serde_json::Value::String(cap_type)) => Some(cap_type),
                    Some(_) => return Err(D::Error::custom("required_capability must be a string")),
                };
                let code = fields.remove("code").map(Expr::from).unwrap_or(Expr::Null);
                Ok(SeedVerb { code, required_capability })
            }
            bare => Ok(SeedVerb { code: Expr::from(bare), required_capability: None }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedCapability {
    pub owner_id: EntityId,
    #[serde(rename = "type")]
    pub cap_type: String,
    #[serde(default)]
    pub params: Props,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedTask {
    pub entity_id: EntityId,
    pub verb: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub repeat_ms: Option<u64>,
}

impl Seed {
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let seed = Self::from_json(&content)?;
        info!(
            "Loaded seed from {} ({} entities, {} capabilities, {} tasks)",
            path.display(),
            seed.entities.len(),
            seed.capabilities.len(),
            seed.tasks.len()
        );
        Ok(seed)
    }

    /// Write entities, verbs and capabilities into `store`. Tasks are left
    /// for the caller to hand to a scheduler.
    pub async fn apply(&self, store: &dyn WorldStore) -> Result<()> {
        for seed in &self.entities {
            let entity = Entity::new(seed.id, seed.prototype_id, seed.props.clone());
            store.insert_entity(entity.to_row()).await?;
            for (name, verb) in &seed.verbs {
                store
                    .add_verb(VerbRow {
                        entity_id: seed.id,
                        name: name.clone(),
                        code: verb.code.clone(),
                        required_capability: verb.required_capability.clone(),
                    })
                    .await?;
            }
        }
        for cap in &self.capabilities {
            store.create_capability(cap.owner_id, &cap.cap_type, cap.params.clone()).await?;
        }
        Ok(())
    }
}
