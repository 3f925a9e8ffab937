//! Capability classes
//!
//! A capability's type tag selects the class that implements it. Plugins
//! register classes at startup; the table is frozen before the first
//! invocation. To add a new class: implement [`CapabilityClass`] and register
//! it alongside [`default_classes`].

use crate::capability::Capability;
use crate::entity::Props;
use crate::error::{Result, WorldError};
use crate::world::World;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tendril_core::EntityId;

#[async_trait::async_trait]
pub trait CapabilityClass: Send + Sync {
    /// Type tag this class implements (e.g. "entity.control").
    fn type_tag(&self) -> &str;

    /// Method names scripts may call on a capability of this type.
    fn methods(&self) -> &[&'static str];

    /// Whether methods reach an external service and may suspend.
    fn is_async(&self) -> bool { false }

    /// Run `method`. Ownership has already been checked by the caller;
    /// the class checks that the capability's params cover the request.
    async fn invoke(
        &self,
        cap: &Capability,
        method: &str,
        args: Vec<Value>,
        world: &World,
    ) -> Result<Value>;
}

pub struct CapabilityClasses {
    classes: HashMap<String, Arc<dyn CapabilityClass>>,
}

impl Default for CapabilityClasses {
    fn default() -> Self { Self::new() }
}

impl CapabilityClasses {
    pub fn new() -> Self { Self { classes: HashMap::new() } }

    /// Register a class. Replaces any existing class with the same tag.
    pub fn register(&mut self, class: impl CapabilityClass + 'static) {
        let tag = class.type_tag().to_string();
        self.classes.insert(tag, Arc::new(class));
    }

    pub fn get(&self, type_tag: &str) -> Option<Arc<dyn CapabilityClass>> {
        self.classes.get(type_tag).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.classes.keys().map(|s| s.as_str()).collect();
        tags.sort_unstable();
        tags
    }
}

/// Classes every world ships with.
pub fn default_classes() -> CapabilityClasses {
    let mut classes = CapabilityClasses::new();
    classes.register(EntityControl);
    classes
}

/// `entity.control`: the only sanctioned way to persist entity changes.
///
/// Params: `{"target_id": <id>}` for one entity or `{"*": true}` for all.
pub struct EntityControl;

impl EntityControl {
    pub const TYPE: &'static str = "entity.control";

    fn authorize(cap: &Capability, target: EntityId) -> Result<()> {
        let mut request = Props::new();
        request.insert("target_id".into(), json!(target));
        match cap.matches(&request) {
            Some(_) => Ok(()),
            None => Err(WorldError::denied(format!(
                "{} does not cover entity {}",
                Self::TYPE,
                target
            ))),
        }
    }
}

#[async_trait::async_trait]
impl CapabilityClass for EntityControl {
    fn type_tag(&self) -> &str { Self::TYPE }

    fn methods(&self) -> &[&'static str] { &["update", "set_prototype"] }

    async fn invoke(
        &self,
        cap: &Capability,
        method: &str,
        args: Vec<Value>,
        world: &World,
    ) -> Result<Value> {
        let target = args
            .first()
            .and_then(Value::as_f64)
            .map(|n| n as EntityId)
            .ok_or_else(|| {
                WorldError::invalid_argument(format!("{}.{}", Self::TYPE, method), "target entity required")
            })?;
        Self::authorize(cap, target)?;

        match method {
            "update" => {
                let patch = match args.get(1) {
                    Some(Value::Object(map)) => map.clone(),
                    _ => {
                        return Err(WorldError::invalid_argument(
                            "entity.control.update",
                            "props must be an object",
                        ))
                    }
                };
                world.update_entity(target, patch).await?;
                Ok(Value::Null)
            }
            "set_prototype" => {
                let prototype = args.get(1).and_then(Value::as_f64).map(|n| n as EntityId);
                world.set_prototype(target, prototype).await?;
                Ok(Value::Null)
            }
            other => Err(WorldError::invalid_argument(Self::TYPE, format!("no method {}", other))),
        }
    }
}
