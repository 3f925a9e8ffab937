//! Expression trees
//!
//! A verb is plain JSON. A list whose first element is a string is a call
//! form (`["math.add", 1, 2]`); every other value is a literal. Literal
//! lists and objects still evaluate their elements, so `[1, ["math.add", 1, 1]]`
//! evaluates to `[1, 2]`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    List(Arc<[Expr]>),
    Object(Arc<BTreeMap<String, Expr>>),
}

impl Expr {
    /// Build a call form from an opcode name and its arguments.
    pub fn call(opcode: &str, args: impl IntoIterator<Item = Expr>) -> Self {
        let mut items = vec![Expr::from(opcode)];
        items.extend(args);
        Expr::List(items.into())
    }

    /// Split a call form into opcode name and argument expressions.
    pub fn as_call(&self) -> Option<(&str, &[Expr])> {
        match self {
            Expr::List(items) => match items.split_first() {
                Some((Expr::String(name), args)) => Some((name.as_ref(), args)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Parse an expression from JSON text.
    pub fn parse(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }

    /// Number of nodes in the tree, literals included.
    pub fn node_count(&self) -> usize {
        match self {
            Expr::List(items) => 1 + items.iter().map(Expr::node_count).sum::<usize>(),
            Expr::Object(map) => 1 + map.values().map(Expr::node_count).sum::<usize>(),
            _ => 1,
        }
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::String(Arc::from(s))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Number(n)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Bool(b)
    }
}

impl From<serde_json::Value> for Expr {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Expr::Null,
            serde_json::Value::Bool(b) => Expr::Bool(b),
            serde_json::Value::Number(n) => Expr::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Expr::String(Arc::from(s)),
            serde_json::Value::Array(items) => {
                Expr::List(items.into_iter().map(Expr::from).collect())
            }
            serde_json::Value::Object(map) => Expr::Object(Arc::new(
                map.into_iter().map(|(k, v)| (k, Expr::from(v))).collect(),
            )),
        }
    }
}

impl From<Expr> for serde_json::Value {
    fn from(expr: Expr) -> Self {
        (&expr).into()
    }
}

impl From<&Expr> for serde_json::Value {
    fn from(expr: &Expr) -> Self {
        match expr {
            Expr::Null => serde_json::Value::Null,
            Expr::Bool(b) => serde_json::Value::Bool(*b),
            Expr::Number(n) => number_to_json(*n),
            Expr::String(s) => serde_json::Value::String(s.to_string()),
            Expr::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Expr::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Integral numbers serialize as JSON integers so ids and counters
/// round-trip without a trailing `.0`.
pub fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}
