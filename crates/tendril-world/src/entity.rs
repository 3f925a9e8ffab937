//! Hydrated entities

use crate::error::Result;
use crate::row::{parse_bag, serialize_bag, EntityRow, HasId};
use tendril_core::EntityId;

/// Property and parameter bags.
pub type Props = serde_json::Map<String, serde_json::Value>;

/// Prototype chains longer than this are treated as malformed.
pub const MAX_PROTOTYPE_DEPTH: usize = 64;

/// A hydrated entity. Mutating it in place is never persisted; writes go
/// through `entity.control`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub prototype_id: Option<EntityId>,
    pub props: Props,
}

impl Entity {
    pub fn new(id: EntityId, prototype_id: Option<EntityId>, props: Props) -> Self {
        Self { id, prototype_id, props }
    }

    pub fn hydrate(row: &EntityRow) -> Result<Self> {
        let props = parse_bag(&row.props, "entity props")?;
        Ok(Self { id: row.id, prototype_id: row.prototype_id, props })
    }

    pub fn to_row(&self) -> EntityRow {
        EntityRow {
            id: self.id,
            prototype_id: self.prototype_id,
            props: serialize_bag(&self.props),
        }
    }

    /// Own property, ignoring the prototype chain.
    pub fn own(&self, key: &str) -> Option<&serde_json::Value> {
        self.props.get(key)
    }
}

impl HasId for Entity {
    fn stable_id(&self) -> String {
        self.id.to_string()
    }
}

/// Overlay a chain of entities, nearest first, into resolved properties.
/// The nearest entity's own properties win.
pub fn overlay_chain<'a>(chain: impl DoubleEndedIterator<Item = &'a Entity>) -> Props {
    let mut resolved = Props::new();
    for entity in chain.rev() {
        for (key, value) in &entity.props {
            resolved.insert(key.clone(), value.clone());
        }
    }
    resolved
}
