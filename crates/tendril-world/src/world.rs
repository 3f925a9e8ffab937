//! World facade: hydration, prototype resolution and capability resolution
//! over a [`WorldStore`].

use crate::capability::{best_match, is_valid_restriction, namespace_covers, Capability};
use crate::class::EntityControl;
use crate::entity::{overlay_chain, Entity, Props, MAX_PROTOTYPE_DEPTH};
use crate::error::{Result, WorldError};
use crate::row::VerbRow;
use crate::store::WorldStore;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tendril_core::EntityId;
use tracing::{debug, info, warn};

/// Capability type that authorizes minting new capabilities.
pub const MINT_TYPE: &str = "sys.mint";

#[derive(Clone)]
pub struct World {
    store: Arc<dyn WorldStore>,
}

impl World {
    pub fn new(store: Arc<dyn WorldStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn WorldStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    pub async fn try_entity(&self, id: EntityId) -> Result<Option<Entity>> {
        match self.store.entity_row(id).await? {
            Some(row) => Entity::hydrate(&row).map(Some),
            None => Ok(None),
        }
    }

    pub async fn entity(&self, id: EntityId) -> Result<Entity> {
        self.try_entity(id).await?.ok_or(WorldError::EntityNotFound(id))
    }

    /// The entity followed by its prototypes, nearest first. The walk stops
    /// at a missing prototype, a cycle, or [`MAX_PROTOTYPE_DEPTH`].
    pub async fn prototype_chain(&self, entity: &Entity) -> Result<Vec<Entity>> {
        let mut chain = vec![entity.clone()];
        let mut visited = HashSet::from([entity.id]);
        let mut next = entity.prototype_id;

        while let Some(proto_id) = next {
            if chain.len() >= MAX_PROTOTYPE_DEPTH {
                warn!(entity = entity.id, depth = chain.len(), "prototype chain too deep, truncating");
                break;
            }
            if !visited.insert(proto_id) {
                warn!(entity = entity.id, prototype = proto_id, "prototype cycle detected");
                break;
            }
            match self.try_entity(proto_id).await? {
                Some(proto) => {
                    next = proto.prototype_id;
                    chain.push(proto);
                }
                None => {
                    debug!(entity = entity.id, prototype = proto_id, "missing prototype");
                    break;
                }
            }
        }
        Ok(chain)
    }

    /// Own properties overlaid on the prototype chain, nearest wins.
    pub async fn resolve_props(&self, entity: &Entity) -> Result<Props> {
        let chain = self.prototype_chain(entity).await?;
        Ok(overlay_chain(chain.iter()))
    }

    pub async fn resolve_prop(&self, entity: &Entity, key: &str) -> Result<Option<serde_json::Value>> {
        for link in self.prototype_chain(entity).await? {
            if let Some(value) = link.props.get(key) {
                return Ok(Some(value.clone()));
            }
        }
        Ok(None)
    }

    pub async fn create_entity(
        &self,
        creator: Option<EntityId>,
        prototype_id: Option<EntityId>,
        props: Props,
    ) -> Result<EntityId> {
        if let Some(proto) = prototype_id {
            self.entity(proto).await?;
        }
        let id = self.store.create_entity(prototype_id, props).await?;
        if let Some(creator) = creator {
            let mut params = Props::new();
            params.insert("target_id".into(), json!(id));
            self.store.create_capability(creator, EntityControl::TYPE, params).await?;
        }
        info!(entity = id, creator = ?creator, "entity created");
        Ok(id)
    }

    pub async fn update_entity(&self, id: EntityId, patch: Props) -> Result<()> {
        self.store.update_entity(id, patch).await
    }

    /// Re-parent an entity. Refuses links that would close a cycle.
    pub async fn set_prototype(&self, id: EntityId, prototype_id: Option<EntityId>) -> Result<()> {
        self.entity(id).await?;
        if let Some(proto) = prototype_id {
            let proto_entity = self.entity(proto).await?;
            let chain = self.prototype_chain(&proto_entity).await?;
            if chain.iter().any(|link| link.id == id) {
                return Err(WorldError::invalid_argument(
                    "set_prototype",
                    format!("entity {} would become its own prototype", id),
                ));
            }
        }
        self.store.set_prototype(id, prototype_id).await
    }

    // ------------------------------------------------------------------
    // Verbs
    // ------------------------------------------------------------------

    /// Find a verb on the entity or its prototypes, nearest first.
    pub async fn find_verb(&self, entity: &Entity, name: &str) -> Result<Option<VerbRow>> {
        for link in self.prototype_chain(entity).await? {
            let verbs = self.store.verb_rows(link.id).await?;
            if let Some(verb) = verbs.into_iter().find(|v| v.name == name) {
                return Ok(Some(verb));
            }
        }
        Ok(None)
    }

    /// Names of every verb reachable through the chain, nearest first.
    pub async fn verb_names(&self, entity: &Entity) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for link in self.prototype_chain(entity).await? {
            for verb in self.store.verb_rows(link.id).await? {
                if !names.contains(&verb.name) {
                    names.push(verb.name);
                }
            }
        }
        Ok(names)
    }

    pub async fn add_verb(&self, verb: VerbRow) -> Result<()> {
        self.store.add_verb(verb).await
    }

    // ------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------

    pub async fn capabilities(&self, owner: EntityId) -> Result<Vec<Capability>> {
        self.store
            .capability_rows(owner)
            .await?
            .iter()
            .map(Capability::hydrate)
            .collect()
    }

    pub async fn capability(&self, id: &str) -> Result<Option<Capability>> {
        match self.store.capability_row(id).await? {
            Some(row) => Capability::hydrate(&row).map(Some),
            None => Ok(None),
        }
    }

    /// Best capability of `cap_type` owned by `owner` that covers `request`.
    /// `None` means the operation is denied.
    pub async fn get_capability(
        &self,
        owner: EntityId,
        cap_type: &str,
        request: &Props,
    ) -> Result<Option<Capability>> {
        let owned = self.capabilities(owner).await?;
        let candidates = owned.iter().filter(|cap| cap.cap_type == cap_type);
        Ok(best_match(candidates, request).cloned())
    }

    /// Re-read a capability and check that `owner` still holds it.
    pub async fn owned_capability(&self, owner: EntityId, id: &str) -> Result<Capability> {
        let cap = self
            .capability(id)
            .await?
            .ok_or_else(|| WorldError::CapabilityNotFound(id.to_string()))?;
        if cap.owner_id != owner {
            return Err(WorldError::denied(format!(
                "capability {} is not owned by entity {}",
                id, owner
            )));
        }
        Ok(cap)
    }

    pub async fn grant(&self, owner: EntityId, cap_type: &str, params: Props) -> Result<Capability> {
        let id = self.store.create_capability(owner, cap_type, params).await?;
        self.capability(&id)
            .await?
            .ok_or(WorldError::CapabilityNotFound(id))
    }

    /// Mint a new capability using a `sys.mint` authority held by `owner`.
    pub async fn mint(
        &self,
        owner: EntityId,
        authority_id: &str,
        cap_type: &str,
        params: Props,
    ) -> Result<Capability> {
        let authority = self.owned_capability(owner, authority_id).await?;
        if authority.cap_type != MINT_TYPE {
            return Err(WorldError::denied(format!("{} is not a {} authority", authority.id, MINT_TYPE)));
        }
        if !namespace_covers(&authority.params, cap_type) {
            return Err(WorldError::denied(format!(
                "authority namespace does not cover {}",
                cap_type
            )));
        }
        let cap = self.grant(owner, cap_type, params).await?;
        info!(owner, cap_type, cap = %cap.id, "capability minted");
        Ok(cap)
    }

    /// Derive a narrower capability from one `owner` holds.
    pub async fn delegate(&self, owner: EntityId, parent_id: &str, restrictions: Props) -> Result<Capability> {
        let parent = self.owned_capability(owner, parent_id).await?;
        is_valid_restriction(&parent.params, &restrictions)?;
        let mut params = parent.params.clone();
        for (key, value) in restrictions {
            params.insert(key, value);
        }
        let cap = self.grant(owner, &parent.cap_type, params).await?;
        info!(owner, parent = %parent.id, cap = %cap.id, "capability delegated");
        Ok(cap)
    }

    /// Move a capability `owner` holds to `recipient`.
    pub async fn give(&self, owner: EntityId, cap_id: &str, recipient: EntityId) -> Result<()> {
        self.owned_capability(owner, cap_id).await?;
        self.entity(recipient).await?;
        self.store.set_capability_owner(cap_id, recipient).await?;
        info!(from = owner, to = recipient, cap = cap_id, "capability transferred");
        Ok(())
    }
}
