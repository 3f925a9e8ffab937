//! Capabilities, request matching and delegation rules
//!
//! A capability's params describe what it authorizes. A request descriptor
//! is matched key by key against those params:
//!
//! - equal value: exact match
//! - `path` key with the requested path under the granted one: prefix match
//! - `"*"` value, or a capability carrying `{"*": true}`: wildcard match
//!
//! A capability is only as good as its weakest key, and the best capability
//! wins. Exact beats prefix beats wildcard.

use crate::entity::Props;
use crate::error::{Result, WorldError};
use crate::row::{parse_bag, serialize_bag, CapabilityRow, HasId};
use serde_json::Value;
use tendril_core::EntityId;

pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub id: String,
    pub owner_id: EntityId,
    pub cap_type: String,
    pub params: Props,
}

impl Capability {
    pub fn hydrate(row: &CapabilityRow) -> Result<Self> {
        let params = parse_bag(&row.params, "capability params")?;
        Ok(Self {
            id: row.id.clone(),
            owner_id: row.owner_id,
            cap_type: row.cap_type.clone(),
            params,
        })
    }

    pub fn to_row(&self) -> CapabilityRow {
        CapabilityRow {
            id: self.id.clone(),
            owner_id: self.owner_id,
            cap_type: self.cap_type.clone(),
            params: serialize_bag(&self.params),
        }
    }

    /// `{"*": true}` authorizes every request of this type.
    pub fn is_wildcard(&self) -> bool {
        self.params.get(WILDCARD) == Some(&Value::Bool(true))
    }

    pub fn matches(&self, request: &Props) -> Option<MatchQuality> {
        match_quality(&self.params, request)
    }
}

impl HasId for Capability {
    fn stable_id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchQuality {
    Wildcard = 1,
    Prefix = 2,
    Exact = 3,
}

/// How well `params` authorize `request`, or `None` when they do not.
pub fn match_quality(params: &Props, request: &Props) -> Option<MatchQuality> {
    let blanket = params.get(WILDCARD) == Some(&Value::Bool(true));
    let mut quality = if blanket { MatchQuality::Wildcard } else { MatchQuality::Exact };

    for (key, wanted) in request {
        let key_quality = match params.get(key) {
            Some(granted) if values_equal(granted, wanted) => MatchQuality::Exact,
            Some(Value::String(granted)) if granted == WILDCARD => MatchQuality::Wildcard,
            Some(Value::String(granted)) if key == "path" => match wanted.as_str() {
                Some(path) if is_subpath(granted, path) => MatchQuality::Prefix,
                _ => return None,
            },
            Some(_) => return None,
            None if blanket => MatchQuality::Wildcard,
            None => return None,
        };
        quality = quality.min(key_quality);
    }
    Some(quality)
}

/// Pick the best match. Ties go to the earliest capability.
pub fn best_match<'a>(
    caps: impl IntoIterator<Item = &'a Capability>,
    request: &Props,
) -> Option<&'a Capability> {
    let mut best: Option<(MatchQuality, &Capability)> = None;
    for cap in caps {
        if let Some(quality) = cap.matches(request) {
            if best.map_or(true, |(q, _)| quality > q) {
                best = Some((quality, cap));
            }
        }
    }
    best.map(|(_, cap)| cap)
}

/// Check that `restrictions` only narrow `parent`. Keys the parent lacks
/// add a new constraint and are accepted, except the wildcard itself.
pub fn is_valid_restriction(parent: &Props, restrictions: &Props) -> Result<()> {
    for (key, child) in restrictions {
        let parent_value = match parent.get(key) {
            Some(value) => value.clone(),
            None if key == WILDCARD => Value::Bool(false),
            None => continue,
        };
        if !narrows(key, &parent_value, child) {
            return Err(WorldError::invalid_restriction(
                key,
                format!("{} does not narrow {}", child, parent_value),
            ));
        }
    }
    Ok(())
}

fn narrows(key: &str, parent: &Value, child: &Value) -> bool {
    if values_equal(parent, child) {
        return true;
    }
    if key == WILDCARD {
        return matches!((parent, child), (Value::Bool(true), Value::Bool(_)) | (Value::Bool(false), Value::Bool(false)));
    }
    match (parent, child) {
        (Value::Array(granted), Value::Array(wanted)) => {
            wanted.iter().all(|w| granted.iter().any(|g| values_equal(g, w)))
        }
        (Value::String(granted), Value::String(wanted)) => match key {
            "path" => is_subpath(granted, wanted),
            "domain" => wanted.ends_with(&format!(".{}", granted)),
            "namespace" => granted == WILDCARD || wanted.starts_with(granted.as_str()),
            _ => false,
        },
        // Restrictive flags may be switched on, never off.
        (Value::Bool(granted), Value::Bool(wanted)) => !granted || *wanted,
        _ => false,
    }
}

/// Whether a `sys.mint` authority's namespace covers `cap_type`.
pub fn namespace_covers(authority: &Props, cap_type: &str) -> bool {
    match authority.get("namespace").and_then(Value::as_str) {
        Some(WILDCARD) => true,
        Some(namespace) => cap_type.starts_with(namespace),
        None => false,
    }
}

/// `child` equals `parent` or lies beneath it.
pub fn is_subpath(parent: &str, child: &str) -> bool {
    if parent == child {
        return true;
    }
    let parent = if parent.ends_with('/') { parent.to_string() } else { format!("{}/", parent) };
    let child = if child.ends_with('/') { child.to_string() } else { format!("{}/", child) };
    child.starts_with(&parent) && !child[parent.len()..].split('/').any(|seg| seg == "..")
}

/// JSON equality with numbers compared by value, so `5` matches `5.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
