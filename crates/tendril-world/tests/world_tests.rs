//! Tests for tendril-world: hydration, prototype resolution, capability
//! matching, delegation, entity.control and seeds

use serde_json::{json, Value};
use std::sync::Arc;
use tendril_world::*;

fn props(value: Value) -> Props {
    value.as_object().cloned().unwrap()
}

fn world() -> World {
    World::new(Arc::new(MemoryStore::new()))
}

async fn entity_with(world: &World, id: i64, proto: Option<i64>, bag: Value) -> Entity {
    let entity = Entity::new(id, proto, props(bag));
    world.store().insert_entity(entity.to_row()).await.unwrap();
    entity
}

// ===========================================================================
// Hydration
// ===========================================================================

#[test]
fn hydrate_entity_row() {
    let row = Row::from_json(json!({"kind": "entity", "id": 3, "prototype_id": 1, "props": "{\"name\":\"box\"}"}))
        .unwrap();
    match hydrate(row).unwrap() {
        Hydrated::Entity(entity) => {
            assert_eq!(entity.id, 3);
            assert_eq!(entity.prototype_id, Some(1));
            assert_eq!(entity.own("name"), Some(&json!("box")));
            assert_eq!(entity.stable_id(), "3");
        }
        other => panic!("expected entity, got {:?}", other),
    }
}

#[test]
fn hydrate_capability_row() {
    let row = Row::from_json(json!({
        "kind": "capability", "id": "c1", "owner_id": 3, "type": "entity.control",
        "params": "{\"target_id\":5}"
    }))
    .unwrap();
    let hydrated = hydrate(row).unwrap();
    assert_eq!(hydrated.stable_id(), "c1");
    match hydrated {
        Hydrated::Capability(cap) => {
            assert_eq!(cap.cap_type, "entity.control");
            assert_eq!(cap.params.get("target_id"), Some(&json!(5)));
            assert!(!cap.is_wildcard());
        }
        other => panic!("expected capability, got {:?}", other),
    }
}

#[test]
fn hydrate_rejects_unknown_kind() {
    let err = Row::from_json(json!({"kind": "verb", "id": 1})).unwrap_err();
    assert!(matches!(err, WorldError::Hydration(_)));
}

#[test]
fn hydrate_rejects_missing_kind() {
    assert!(Row::from_json(json!({"id": 1, "props": "{}"})).is_err());
}

#[test]
fn hydrate_rejects_malformed_bag() {
    let row = Row::Entity(EntityRow { id: 1, prototype_id: None, props: "[1,2]".into() });
    assert!(matches!(hydrate(row), Err(WorldError::Hydration(_))));

    let row = Row::Entity(EntityRow { id: 1, prototype_id: None, props: "{not json".into() });
    assert!(matches!(hydrate(row), Err(WorldError::Hydration(_))));
}

#[test]
fn hydrate_treats_empty_bag_as_empty_object() {
    let row = Row::Entity(EntityRow { id: 1, prototype_id: None, props: String::new() });
    match hydrate(row).unwrap() {
        Hydrated::Entity(entity) => assert!(entity.props.is_empty()),
        other => panic!("expected entity, got {:?}", other),
    }
}

#[test]
fn hydration_errors_map_to_script_errors() {
    let err: tendril_core::ScriptError = WorldError::hydration("bad").into();
    assert_eq!(err.kind(), tendril_core::ErrorKind::Hydration);
    let err: tendril_core::ScriptError = WorldError::EntityNotFound(9).into();
    assert_eq!(err.kind(), tendril_core::ErrorKind::NotFound);
    let err: tendril_core::ScriptError = WorldError::denied("no").into();
    assert_eq!(err.kind(), tendril_core::ErrorKind::CapabilityDenied);
}

// ===========================================================================
// Prototype resolution
// ===========================================================================

#[tokio::test]
async fn resolve_props_inherits_from_prototype() {
    let world = world();
    entity_with(&world, 1, None, json!({"name": "X", "color": "red"})).await;
    let child = entity_with(&world, 2, Some(1), json!({"size": 3})).await;

    let resolved = world.resolve_props(&child).await.unwrap();
    assert_eq!(resolved.get("name"), Some(&json!("X")));
    assert_eq!(resolved.get("size"), Some(&json!(3)));
}

#[tokio::test]
async fn resolve_props_own_value_overrides_prototype() {
    let world = world();
    entity_with(&world, 1, None, json!({"name": "X"})).await;
    let child = entity_with(&world, 2, Some(1), json!({"name": "Y"})).await;

    let resolved = world.resolve_props(&child).await.unwrap();
    assert_eq!(resolved.get("name"), Some(&json!("Y")));
    assert_eq!(world.resolve_prop(&child, "name").await.unwrap(), Some(json!("Y")));
}

#[tokio::test]
async fn resolve_props_reflects_later_updates() {
    let world = world();
    entity_with(&world, 1, None, json!({"name": "X"})).await;
    let child = entity_with(&world, 2, Some(1), json!({})).await;
    world.update_entity(1, props(json!({"name": "Z"}))).await.unwrap();

    assert_eq!(world.resolve_prop(&child, "name").await.unwrap(), Some(json!("Z")));
}

#[tokio::test]
async fn resolve_props_stops_on_cycle() {
    let world = world();
    entity_with(&world, 1, Some(2), json!({"a": 1})).await;
    let b = entity_with(&world, 2, Some(1), json!({"b": 2})).await;

    let chain = world.prototype_chain(&b).await.unwrap();
    assert_eq!(chain.len(), 2);
    let resolved = world.resolve_props(&b).await.unwrap();
    assert_eq!(resolved.get("a"), Some(&json!(1)));
    assert_eq!(resolved.get("b"), Some(&json!(2)));
}

#[tokio::test]
async fn prototype_chain_is_depth_bounded() {
    let world = world();
    entity_with(&world, 0, None, json!({})).await;
    for id in 1..100 {
        entity_with(&world, id, Some(id - 1), json!({})).await;
    }
    let deep = world.entity(99).await.unwrap();
    let chain = world.prototype_chain(&deep).await.unwrap();
    assert_eq!(chain.len(), MAX_PROTOTYPE_DEPTH);
}

#[tokio::test]
async fn prototype_chain_stops_at_missing_prototype() {
    let world = world();
    let orphan = entity_with(&world, 1, Some(42), json!({"a": 1})).await;
    assert_eq!(world.prototype_chain(&orphan).await.unwrap().len(), 1);
}

#[tokio::test]
async fn set_prototype_refuses_cycles() {
    let world = world();
    entity_with(&world, 1, None, json!({})).await;
    entity_with(&world, 2, Some(1), json!({})).await;
    assert!(world.set_prototype(1, Some(2)).await.is_err());
    assert!(world.set_prototype(2, None).await.is_ok());
    assert_eq!(world.entity(2).await.unwrap().prototype_id, None);
}

#[tokio::test]
async fn find_verb_walks_chain_nearest_first() {
    let world = world();
    let parent = entity_with(&world, 1, None, json!({})).await;
    let child = entity_with(&world, 2, Some(1), json!({})).await;
    for (entity_id, code) in [(1, json!("parent")), (2, json!("child"))] {
        world
            .add_verb(VerbRow { entity_id, name: "greet".into(), code: code.into(), required_capability: None })
            .await
            .unwrap();
    }
    world
        .add_verb(VerbRow { entity_id: 1, name: "only_parent".into(), code: json!(1).into(), required_capability: None })
        .await
        .unwrap();

    let verb = world.find_verb(&child, "greet").await.unwrap().unwrap();
    assert_eq!(verb.entity_id, 2);
    let verb = world.find_verb(&child, "only_parent").await.unwrap().unwrap();
    assert_eq!(verb.entity_id, 1);
    assert!(world.find_verb(&parent, "missing").await.unwrap().is_none());
    assert_eq!(world.verb_names(&child).await.unwrap(), vec!["greet", "only_parent"]);
}

// ===========================================================================
// Capability matching
// ===========================================================================

#[tokio::test]
async fn exact_target_beats_wildcard() {
    let world = world();
    entity_with(&world, 1, None, json!({})).await;
    let wildcard = world.grant(1, "entity.control", props(json!({"*": true}))).await.unwrap();
    let scoped = world.grant(1, "entity.control", props(json!({"target_id": 5}))).await.unwrap();

    let found = world
        .get_capability(1, "entity.control", &props(json!({"target_id": 5})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, scoped.id);

    let found = world
        .get_capability(1, "entity.control", &props(json!({"target_id": 6})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, wildcard.id);
}

#[tokio::test]
async fn no_matching_capability_yields_none() {
    let world = world();
    entity_with(&world, 1, None, json!({})).await;
    world.grant(1, "entity.control", props(json!({"target_id": 5}))).await.unwrap();
    world.grant(2, "entity.control", props(json!({"*": true}))).await.unwrap();

    let request = props(json!({"target_id": 6}));
    assert!(world.get_capability(1, "entity.control", &request).await.unwrap().is_none());
    assert!(world.get_capability(1, "fs.read", &Props::new()).await.unwrap().is_none());
}

#[test]
fn path_prefix_ranks_between_exact_and_wildcard() {
    let request = props(json!({"path": "/data/notes/a.txt"}));
    assert_eq!(match_quality(&props(json!({"path": "/data/notes/a.txt"})), &request), Some(MatchQuality::Exact));
    assert_eq!(match_quality(&props(json!({"path": "/data"})), &request), Some(MatchQuality::Prefix));
    assert_eq!(match_quality(&props(json!({"path": "*"})), &request), Some(MatchQuality::Wildcard));
    assert_eq!(match_quality(&props(json!({"path": "/etc"})), &request), None);
}

#[test]
fn weakest_key_decides_quality() {
    let request = props(json!({"path": "/data/x", "mode": "read"}));
    let params = props(json!({"path": "/data", "mode": "read"}));
    assert_eq!(match_quality(&params, &request), Some(MatchQuality::Prefix));
    let params = props(json!({"path": "/data", "mode": "write"}));
    assert_eq!(match_quality(&params, &request), None);
}

// ===========================================================================
// Delegation, minting, transfer
// ===========================================================================

#[test]
fn restriction_rules() {
    let parent = props(json!({"*": true, "path": "/home", "methods": ["GET", "POST"], "readonly": false,
        "domain": "example.com", "namespace": "user", "limit": 10}));

    assert!(is_valid_restriction(&parent, &props(json!({"*": false}))).is_ok());
    assert!(is_valid_restriction(&parent, &props(json!({"path": "/home/docs"}))).is_ok());
    assert!(is_valid_restriction(&parent, &props(json!({"path": "/etc"}))).is_err());
    assert!(is_valid_restriction(&parent, &props(json!({"methods": ["GET"]}))).is_ok());
    assert!(is_valid_restriction(&parent, &props(json!({"methods": ["DELETE"]}))).is_err());
    assert!(is_valid_restriction(&parent, &props(json!({"readonly": true}))).is_ok());
    assert!(is_valid_restriction(&parent, &props(json!({"domain": "api.example.com"}))).is_ok());
    assert!(is_valid_restriction(&parent, &props(json!({"domain": "evil.com"}))).is_err());
    assert!(is_valid_restriction(&parent, &props(json!({"namespace": "user.1"}))).is_ok());
    assert!(is_valid_restriction(&parent, &props(json!({"limit": 11}))).is_err());
    assert!(is_valid_restriction(&parent, &props(json!({"new_key": "x"}))).is_ok());
}

#[test]
fn restriction_cannot_add_wildcard_or_unset_flag() {
    let parent = props(json!({"target_id": 5, "readonly": true}));
    assert!(is_valid_restriction(&parent, &props(json!({"*": true}))).is_err());
    assert!(is_valid_restriction(&parent, &props(json!({"readonly": false}))).is_err());
    assert!(is_valid_restriction(&parent, &props(json!({"target_id": 6}))).is_err());
}

#[tokio::test]
async fn delegate_merges_restrictions() {
    let world = world();
    let parent = world.grant(1, "fs.read", props(json!({"path": "/data"}))).await.unwrap();
    let child = world.delegate(1, &parent.id, props(json!({"path": "/data/public"}))).await.unwrap();
    assert_eq!(child.cap_type, "fs.read");
    assert_eq!(child.owner_id, 1);
    assert_eq!(child.params.get("path"), Some(&json!("/data/public")));

    assert!(world.delegate(1, &parent.id, props(json!({"path": "/"}))).await.is_err());
    assert!(world.delegate(2, &parent.id, props(json!({}))).await.is_err());
}

#[tokio::test]
async fn mint_requires_covering_authority() {
    let world = world();
    let authority = world.grant(1, "sys.mint", props(json!({"namespace": "fs."}))).await.unwrap();
    let cap = world.mint(1, &authority.id, "fs.write", props(json!({"path": "/tmp"}))).await.unwrap();
    assert_eq!(cap.owner_id, 1);
    assert!(world.mint(1, &authority.id, "net.fetch", Props::new()).await.is_err());
    assert!(world.mint(2, &authority.id, "fs.read", Props::new()).await.is_err());

    let not_authority = world.grant(1, "fs.read", Props::new()).await.unwrap();
    assert!(world.mint(1, &not_authority.id, "fs.read", Props::new()).await.is_err());
}

#[tokio::test]
async fn give_moves_ownership() {
    let world = world();
    entity_with(&world, 1, None, json!({})).await;
    entity_with(&world, 2, None, json!({})).await;
    let cap = world.grant(1, "fs.read", Props::new()).await.unwrap();

    world.give(1, &cap.id, 2).await.unwrap();
    assert_eq!(world.capability(&cap.id).await.unwrap().unwrap().owner_id, 2);
    assert!(world.give(1, &cap.id, 1).await.is_err());
    assert!(world.capabilities(1).await.unwrap().is_empty());
}

// ===========================================================================
// Entity creation and entity.control
// ===========================================================================

#[tokio::test]
async fn create_entity_grants_control_to_creator() {
    let world = world();
    entity_with(&world, 10, None, json!({})).await;
    let id = world.create_entity(Some(10), None, props(json!({"name": "new"}))).await.unwrap();
    assert!(id > 10);

    let cap = world
        .get_capability(10, EntityControl::TYPE, &props(json!({"target_id": id})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cap.params.get("target_id"), Some(&json!(id)));
}

#[tokio::test]
async fn entity_control_update_merges_props() {
    let world = world();
    entity_with(&world, 5, None, json!({"name": "old", "keep": true})).await;
    let cap = world.grant(1, EntityControl::TYPE, props(json!({"target_id": 5}))).await.unwrap();

    let classes = default_classes();
    let class = classes.get(EntityControl::TYPE).unwrap();
    class.invoke(&cap, "update", vec![json!(5), json!({"name": "new"})], &world).await.unwrap();

    let entity = world.entity(5).await.unwrap();
    assert_eq!(entity.own("name"), Some(&json!("new")));
    assert_eq!(entity.own("keep"), Some(&json!(true)));
}

#[tokio::test]
async fn entity_control_refuses_other_targets() {
    let world = world();
    entity_with(&world, 5, None, json!({})).await;
    entity_with(&world, 6, None, json!({"name": "safe"})).await;
    let cap = world.grant(1, EntityControl::TYPE, props(json!({"target_id": 5}))).await.unwrap();

    let class = default_classes().get(EntityControl::TYPE).unwrap();
    let err = class
        .invoke(&cap, "update", vec![json!(6), json!({"name": "pwned"})], &world)
        .await
        .unwrap_err();
    assert!(matches!(err, WorldError::Denied(_)));
    assert_eq!(world.entity(6).await.unwrap().own("name"), Some(&json!("safe")));
}

#[tokio::test]
async fn in_place_mutation_is_not_persisted() {
    let world = world();
    entity_with(&world, 5, None, json!({"name": "stored"})).await;
    let mut entity = world.entity(5).await.unwrap();
    entity.props.insert("name".into(), json!("scribbled"));
    assert_eq!(world.entity(5).await.unwrap().own("name"), Some(&json!("stored")));
}

#[tokio::test]
async fn concurrent_updates_do_not_lose_writes() {
    let world = world();
    entity_with(&world, 1, None, json!({})).await;
    let mut handles = Vec::new();
    for i in 0..20 {
        let world = world.clone();
        handles.push(tokio::spawn(async move {
            world.update_entity(1, props(json!({format!("k{}", i): i}))).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(world.entity(1).await.unwrap().props.len(), 20);
}

// ===========================================================================
// Seeds
// ===========================================================================

#[tokio::test]
async fn seed_applies_entities_verbs_and_capabilities() {
    let seed = Seed::from_json(
        &json!({
            "entities": [
                {"id": 1, "props": {"name": "Base"}, "verbs": {
                    "hello": ["str.concat", "hi ", ["world.prop", ["std.this"], "name"]],
                    "admin": {"code": 1, "required_capability": "sys.admin"}
                }},
                {"id": 2, "prototype_id": 1, "props": {}}
            ],
            "capabilities": [{"owner_id": 2, "type": "entity.control", "params": {"*": true}}],
            "tasks": [{"entity_id": 2, "verb": "hello", "delay_ms": 10, "repeat_ms": 50}]
        })
        .to_string(),
    )
    .unwrap();

    let store = Arc::new(MemoryStore::new());
    seed.apply(store.as_ref()).await.unwrap();
    let world = World::new(store.clone());

    assert_eq!(store.entity_count(), 2);
    assert_eq!(store.capability_count(), 1);
    let child = world.entity(2).await.unwrap();
    let admin = world.find_verb(&child, "admin").await.unwrap().unwrap();
    assert_eq!(admin.required_capability.as_deref(), Some("sys.admin"));
    assert_eq!(seed.tasks[0].repeat_ms, Some(50));

    let created = world.create_entity(None, None, Props::new()).await.unwrap();
    assert_eq!(created, 3);
}

#[test]
fn bare_two_element_verb_is_code() {
    let seed = Seed::from_json(
        &json!({"entities": [{"id": 1, "verbs": {"shout": ["str.upper", "abc"]}}]}).to_string(),
    )
    .unwrap();
    let verb = &seed.entities[0].verbs["shout"];
    assert_eq!(verb.required_capability, None);
    assert_eq!(verb.code, tendril_core::Expr::from(json!(["str.upper", "abc"])));
}
