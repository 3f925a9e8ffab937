//! Runtime values
//!
//! Lists and maps are shared references, so `list.push` on a list bound to
//! two variables is visible through both. Entities and capabilities are
//! references; scripts cannot build either from plain data.

use crate::function::Callable;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tendril_core::{expr::number_to_json, EntityId, Expr, Result, ScriptError};
use tendril_world::Capability;

pub type ListRef = Arc<RwLock<Vec<Value>>>;
pub type MapRef = Arc<RwLock<BTreeMap<String, Value>>>;

/// Deepest container nesting a conversion or comparison will follow.
pub const MAX_VALUE_DEPTH: usize = 128;

/// Most values one conversion or comparison will visit.
pub const MAX_WALK_NODES: usize = 1 << 18;

/// Longest string any opcode produces, and the most text one conversion
/// will copy.
pub const MAX_TEXT_LEN: usize = 1 << 20;

/// Most elements a list or object may grow to.
pub const MAX_COLLECTION_LEN: usize = 1 << 16;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    List(ListRef),
    Map(MapRef),
    Function(Arc<Callable>),
    Entity(EntityId),
    Capability(Arc<Capability>),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Arc::new(RwLock::new(entries)))
    }

    /// Only `null` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "object",
            Value::Function(_) => "function",
            Value::Entity(_) => "entity",
            Value::Capability(_) => "capability",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    /// Entity references, or integral numbers used as ids.
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Value::Entity(id) => Some(*id),
            Value::Number(n) if n.fract() == 0.0 => Some(*n as EntityId),
            _ => None,
        }
    }

    /// Text used by `std.string`, `str.concat` and script logging.
    pub fn to_display_string(&self) -> Result<String> {
        self.display_in(&mut Walk::new())
    }

    /// Display text charged against a walk shared with sibling values.
    pub(crate) fn display_in(&self, walk: &mut Walk) -> Result<String> {
        Ok(match self {
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => {
                walk.visit(s.len())?;
                s.to_string()
            }
            Value::List(_) | Value::Map(_) => self.json_in(walk)?.to_string(),
            Value::Function(_) => "<function>".into(),
            Value::Entity(id) => format!("#{}", id),
            Value::Capability(cap) => format!("<capability {} {}>", cap.cap_type, cap.id),
        })
    }

    /// Display texts of `values` joined by `separator`, under one walk.
    pub fn join_display(values: &[Value], separator: &str) -> Result<String> {
        let mut walk = Walk::new();
        let mut out = String::new();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                walk.visit(separator.len())?;
                out.push_str(separator);
            }
            out.push_str(&value.display_in(&mut walk)?);
            if out.len() > MAX_TEXT_LEN {
                return Err(ScriptError::resource(format!("string longer than {} bytes", MAX_TEXT_LEN)));
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // JSON conversion
    // ------------------------------------------------------------------

    /// Plain-data view of the value. Entities become their id, functions
    /// become null. Fails on containers that hold themselves or that exceed
    /// the walk limits.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.json_in(&mut Walk::new())
    }

    /// Converts several values under one shared budget.
    pub fn all_to_json(values: &[Value]) -> Result<Vec<serde_json::Value>> {
        let mut walk = Walk::new();
        values.iter().map(|v| v.json_in(&mut walk)).collect()
    }

    pub(crate) fn json_in(&self, walk: &mut Walk) -> Result<serde_json::Value> {
        walk.visit(0)?;
        Ok(match self {
            Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => {
                walk.visit(s.len())?;
                serde_json::Value::String(s.to_string())
            }
            Value::List(items) => {
                walk.open(Arc::as_ptr(items) as *const () as usize)?;
                let items = items.read();
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter() {
                    out.push(item.json_in(walk)?);
                }
                walk.close();
                serde_json::Value::Array(out)
            }
            Value::Map(entries) => {
                walk.open(Arc::as_ptr(entries) as *const () as usize)?;
                let entries = entries.read();
                let mut out = serde_json::Map::new();
                for (key, value) in entries.iter() {
                    walk.visit(key.len())?;
                    out.insert(key.clone(), value.json_in(walk)?);
                }
                walk.close();
                serde_json::Value::Object(out)
            }
            Value::Entity(id) => serde_json::Value::from(*id),
            Value::Capability(cap) => serde_json::json!({
                "id": cap.id,
                "owner_id": cap.owner_id,
                "type": cap.cap_type,
                "params": cap.params,
            }),
        })
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => Value::list(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::map(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect(),
            ),
        }
    }

    /// An expression tree as data, for `std.quote`.
    pub fn from_expr(expr: &Expr) -> Self {
        match expr {
            Expr::Null => Value::Null,
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Number(n) => Value::Number(*n),
            Expr::String(s) => Value::String(s.clone()),
            Expr::List(items) => Value::list(items.iter().map(Value::from_expr).collect()),
            Expr::Object(map) => Value::map(
                map.iter().map(|(k, v)| (k.clone(), Value::from_expr(v))).collect(),
            ),
        }
    }

    // ------------------------------------------------------------------
    // Equality
    // ------------------------------------------------------------------

    /// Deep structural equality. Functions compare by identity. Fails when
    /// the comparison outgrows the walk limits.
    pub fn equals(&self, other: &Value) -> Result<bool> {
        self.equals_in(other, &mut Walk::new())
    }

    pub(crate) fn equals_in(&self, other: &Value, walk: &mut Walk) -> Result<bool> {
        walk.visit(0)?;
        Ok(match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Arc::ptr_eq(a, b) {
                    return Ok(true);
                }
                walk.open(Arc::as_ptr(a) as *const () as usize)?;
                let (a, b) = (a.read(), b.read());
                let mut equal = a.len() == b.len();
                for (x, y) in a.iter().zip(b.iter()) {
                    if !equal {
                        break;
                    }
                    equal = x.equals_in(y, walk)?;
                }
                walk.close();
                equal
            }
            (Value::Map(a), Value::Map(b)) => {
                if Arc::ptr_eq(a, b) {
                    return Ok(true);
                }
                walk.open(Arc::as_ptr(a) as *const () as usize)?;
                let (a, b) = (a.read(), b.read());
                let mut equal = a.len() == b.len();
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    if !equal {
                        break;
                    }
                    equal = ka == kb && va.equals_in(vb, walk)?;
                }
                walk.close();
                equal
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Entity(a), Value::Entity(b)) => a == b,
            (Value::Capability(a), Value::Capability(b)) => a.id == b.id,
            _ => false,
        })
    }
}

/// Budget for one traversal of a value graph: node and byte counts, plus
/// the chain of containers currently open so self-containment is caught
/// before it recurses.
pub(crate) struct Walk {
    nodes: usize,
    bytes: usize,
    open: Vec<usize>,
}

impl Walk {
    pub(crate) fn new() -> Self {
        Self { nodes: 0, bytes: 0, open: Vec::new() }
    }

    pub(crate) fn visit(&mut self, bytes: usize) -> Result<()> {
        self.nodes += 1;
        self.bytes = self.bytes.saturating_add(bytes);
        if self.nodes > MAX_WALK_NODES {
            return Err(ScriptError::resource(format!("value has more than {} elements", MAX_WALK_NODES)));
        }
        if self.bytes > MAX_TEXT_LEN {
            return Err(ScriptError::resource(format!("value holds more than {} bytes of text", MAX_TEXT_LEN)));
        }
        Ok(())
    }

    fn open(&mut self, container: usize) -> Result<()> {
        if self.open.contains(&container) {
            return Err(ScriptError::resource("value contains itself"));
        }
        if self.open.len() >= MAX_VALUE_DEPTH {
            return Err(ScriptError::resource(format!("value nested deeper than {}", MAX_VALUE_DEPTH)));
        }
        self.open.push(container);
        Ok(())
    }

    fn close(&mut self) {
        self.open.pop();
    }
}

/// Cut-off comparisons and cyclic values compare unequal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Function(_) => f.write_str("<function>"),
            Value::Entity(id) => write!(f, "#{}", id),
            Value::Capability(cap) => write!(f, "<capability {} {}>", cap.cap_type, cap.id),
            _ => match self.to_json() {
                Ok(json) => write!(f, "{}", json),
                Err(_) => write!(f, "<{} too large to show>", self.type_name()),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

/// Integral numbers print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
