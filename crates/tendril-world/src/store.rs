//! Storage boundary
//!
//! [`WorldStore`] is what a persistence engine implements. It deals only in
//! raw rows; hydration and authorization live above it in [`crate::World`].
//! [`MemoryStore`] is the in-process implementation used by the CLI and tests.

use crate::entity::Props;
use crate::error::{Result, WorldError};
use crate::row::{parse_bag, serialize_bag, CapabilityRow, EntityRow, VerbRow};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tendril_core::EntityId;

#[async_trait::async_trait]
pub trait WorldStore: Send + Sync {
    async fn entity_row(&self, id: EntityId) -> Result<Option<EntityRow>>;

    /// Insert a row with a caller-chosen id, replacing any existing row.
    async fn insert_entity(&self, row: EntityRow) -> Result<()>;

    async fn create_entity(&self, prototype_id: Option<EntityId>, props: Props) -> Result<EntityId>;

    /// Merge `patch` into the entity's props. Atomic per call: concurrent
    /// readers see either the old or the new bag, never a partial write.
    async fn update_entity(&self, id: EntityId, patch: Props) -> Result<()>;

    async fn set_prototype(&self, id: EntityId, prototype_id: Option<EntityId>) -> Result<()>;

    /// Capabilities owned by `owner`, in creation order.
    async fn capability_rows(&self, owner: EntityId) -> Result<Vec<CapabilityRow>>;

    async fn capability_row(&self, id: &str) -> Result<Option<CapabilityRow>>;

    async fn create_capability(&self, owner: EntityId, cap_type: &str, params: Props) -> Result<String>;

    async fn set_capability_owner(&self, id: &str, owner: EntityId) -> Result<()>;

    async fn verb_rows(&self, entity: EntityId) -> Result<Vec<VerbRow>>;

    /// Add a verb, replacing an existing verb of the same name on that entity.
    async fn add_verb(&self, verb: VerbRow) -> Result<()>;
}

pub struct MemoryStore {
    entities: DashMap<EntityId, EntityRow>,
    capabilities: DashMap<String, (u64, CapabilityRow)>,
    verbs: DashMap<EntityId, Vec<VerbRow>>,
    next_entity: AtomicI64,
    next_capability: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entities: DashMap::new(),
            capabilities: DashMap::new(),
            verbs: DashMap::new(),
            next_entity: AtomicI64::new(1),
            next_capability: AtomicU64::new(0),
        }
    }

    pub fn entity_count(&self) -> usize { self.entities.len() }

    pub fn capability_count(&self) -> usize { self.capabilities.len() }
}

#[async_trait::async_trait]
impl WorldStore for MemoryStore {
    async fn entity_row(&self, id: EntityId) -> Result<Option<EntityRow>> {
        Ok(self.entities.get(&id).map(|row| row.clone()))
    }

    async fn insert_entity(&self, row: EntityRow) -> Result<()> {
        self.next_entity.fetch_max(row.id + 1, Ordering::SeqCst);
        self.entities.insert(row.id, row);
        Ok(())
    }

    async fn create_entity(&self, prototype_id: Option<EntityId>, props: Props) -> Result<EntityId> {
        let id = self.next_entity.fetch_add(1, Ordering::SeqCst);
        self.entities.insert(id, EntityRow { id, prototype_id, props: serialize_bag(&props) });
        Ok(id)
    }

    async fn update_entity(&self, id: EntityId, patch: Props) -> Result<()> {
        // The entry guard is held for the whole read-merge-write.
        let mut row = self.entities.get_mut(&id).ok_or(WorldError::EntityNotFound(id))?;
        let mut props = parse_bag(&row.props, "entity props")?;
        for (key, value) in patch {
            props.insert(key, value);
        }
        row.props = serialize_bag(&props);
        Ok(())
    }

    async fn set_prototype(&self, id: EntityId, prototype_id: Option<EntityId>) -> Result<()> {
        let mut row = self.entities.get_mut(&id).ok_or(WorldError::EntityNotFound(id))?;
        row.prototype_id = prototype_id;
        Ok(())
    }

    async fn capability_rows(&self, owner: EntityId) -> Result<Vec<CapabilityRow>> {
        let mut owned: Vec<(u64, CapabilityRow)> = self
            .capabilities
            .iter()
            .filter(|entry| entry.value().1.owner_id == owner)
            .map(|entry| entry.value().clone())
            .collect();
        owned.sort_by_key(|(seq, _)| *seq);
        Ok(owned.into_iter().map(|(_, row)| row).collect())
    }

    async fn capability_row(&self, id: &str) -> Result<Option<CapabilityRow>> {
        Ok(self.capabilities.get(id).map(|entry| entry.value().1.clone()))
    }

    async fn create_capability(&self, owner: EntityId, cap_type: &str, params: Props) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let seq = self.next_capability.fetch_add(1, Ordering::SeqCst);
        let row = CapabilityRow {
            id: id.clone(),
            owner_id: owner,
            cap_type: cap_type.to_string(),
            params: serialize_bag(&params),
        };
        self.capabilities.insert(id.clone(), (seq, row));
        Ok(id)
    }

    async fn set_capability_owner(&self, id: &str, owner: EntityId) -> Result<()> {
        let mut entry = self
            .capabilities
            .get_mut(id)
            .ok_or_else(|| WorldError::CapabilityNotFound(id.to_string()))?;
        entry.1.owner_id = owner;
        Ok(())
    }

    async fn verb_rows(&self, entity: EntityId) -> Result<Vec<VerbRow>> {
        Ok(self.verbs.get(&entity).map(|verbs| verbs.clone()).unwrap_or_default())
    }

    async fn add_verb(&self, verb: VerbRow) -> Result<()> {
        let mut verbs = self.verbs.entry(verb.entity_id).or_default();
        verbs.retain(|existing| existing.name != verb.name);
        verbs.push(verb);
        Ok(())
    }
}
