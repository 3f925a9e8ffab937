//! Tendril World - entities, capabilities and the storage boundary
//!
//! Raw rows come out of a [`WorldStore`], are hydrated into [`Entity`] and
//! [`Capability`] values, and every privileged write goes back through a
//! capability class such as [`EntityControl`].

pub mod capability;
pub mod class;
pub mod entity;
pub mod error;
pub mod row;
pub mod seed;
pub mod store;
pub mod world;

pub use capability::{is_valid_restriction, match_quality, Capability, MatchQuality};
pub use class::{default_classes, CapabilityClass, CapabilityClasses, EntityControl};
pub use entity::{Entity, Props, MAX_PROTOTYPE_DEPTH};
pub use error::{Result, WorldError};
pub use row::{hydrate, CapabilityRow, EntityRow, HasId, Hydrated, Row, VerbRow};
pub use seed::{Seed, SeedTask, SeedVerb};
pub use store::{MemoryStore, WorldStore};
pub use world::{World, MINT_TYPE};
