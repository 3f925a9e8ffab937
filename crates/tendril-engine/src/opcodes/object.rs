//! `obj` library. Objects are shared string-keyed maps with sorted keys.

use super::{arg, collection_len, function, map, native, string};
use crate::context::ExecContext;
use crate::function::apply;
use crate::opcode::{Arity, Opcode};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tendril_core::{Result, ScriptError};

const CATEGORY: &str = "obj";

pub fn library() -> Vec<Arc<dyn Opcode>> {
    vec![
        native("obj.new", CATEGORY, Arity::Variadic { min: 0 }, new),
        native("obj.get", CATEGORY, Arity::Range(2, 3), get),
        native("obj.set", CATEGORY, Arity::Fixed(3), set),
        native("obj.has", CATEGORY, Arity::Fixed(2), has),
        native("obj.del", CATEGORY, Arity::Fixed(2), del),
        native("obj.keys", CATEGORY, Arity::Fixed(1), keys),
        native("obj.values", CATEGORY, Arity::Fixed(1), values),
        native("obj.entries", CATEGORY, Arity::Fixed(1), entries),
        native("obj.merge", CATEGORY, Arity::Variadic { min: 1 }, merge),
        Arc::new(Traverse::Map),
        Arc::new(Traverse::Filter),
        Arc::new(Traverse::Reduce),
        Arc::new(Traverse::FlatMap),
    ]
}

/// `["obj.new", "k1", v1, "k2", v2]`
fn new(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    if args.len() % 2 != 0 {
        return Err(ScriptError::type_error(opcode, "expected key/value pairs"));
    }
    let mut entries = BTreeMap::new();
    for i in (0..args.len()).step_by(2) {
        entries.insert(string(opcode, args, i)?.to_string(), args[i + 1].clone());
    }
    Ok(Value::map(entries))
}

fn get(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let entries = map(opcode, args, 0)?;
    let key = string(opcode, args, 1)?;
    let found = entries.read().get(key).cloned();
    Ok(found.unwrap_or_else(|| arg(args, 2).clone()))
}

fn set(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let entries = map(opcode, args, 0)?;
    let key = string(opcode, args, 1)?;
    let mut guard = entries.write();
    if !guard.contains_key(key) {
        collection_len(opcode, guard.len() + 1)?;
    }
    guard.insert(key.to_string(), args[2].clone());
    drop(guard);
    Ok(args[0].clone())
}

fn has(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let entries = map(opcode, args, 0)?;
    let key = string(opcode, args, 1)?;
    let present = entries.read().contains_key(key);
    Ok(Value::Bool(present))
}

/// Returns the removed value, or null.
fn del(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let entries = map(opcode, args, 0)?;
    let key = string(opcode, args, 1)?;
    let removed = entries.write().remove(key);
    Ok(removed.unwrap_or(Value::Null))
}

fn keys(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let entries = map(opcode, args, 0)?;
    let keys = entries.read().keys().map(Value::string).collect();
    Ok(Value::list(keys))
}

fn values(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let entries = map(opcode, args, 0)?;
    let values = entries.read().values().cloned().collect();
    Ok(Value::list(values))
}

fn entries(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let source = map(opcode, args, 0)?;
    let pairs = source
        .read()
        .iter()
        .map(|(k, v)| Value::list(vec![Value::string(k), v.clone()]))
        .collect();
    Ok(Value::list(pairs))
}

/// A new object; later arguments win.
fn merge(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let mut merged = BTreeMap::new();
    for i in 0..args.len() {
        let source = map(opcode, args, i)?;
        for (key, value) in source.read().iter() {
            merged.insert(key.clone(), value.clone());
        }
        collection_len(opcode, merged.len())?;
    }
    Ok(Value::map(merged))
}

/// Opcodes that call a function with `(value, key)` for each entry, in key
/// order, over a snapshot taken when the call starts.
enum Traverse {
    Map,
    Filter,
    /// `(object, fn(acc, value, key), initial)`
    Reduce,
    /// Object results are merged into the result; anything else is dropped.
    FlatMap,
}

#[async_trait::async_trait]
impl Opcode for Traverse {
    fn name(&self) -> &str {
        match self {
            Traverse::Map => "obj.map",
            Traverse::Filter => "obj.filter",
            Traverse::Reduce => "obj.reduce",
            Traverse::FlatMap => "obj.flatMap",
        }
    }

    fn category(&self) -> &str { CATEGORY }

    fn arity(&self) -> Arity {
        match self {
            Traverse::Reduce => Arity::Fixed(3),
            _ => Arity::Fixed(2),
        }
    }

    fn is_async(&self) -> bool { true }

    async fn call(&self, args: Vec<Value>, ctx: &mut ExecContext) -> Result<Value> {
        let entries = map(self.name(), &args, 0)?.read().clone();
        let f = function(self.name(), &args, 1)?;

        match self {
            Traverse::Map => {
                let mut mapped = BTreeMap::new();
                for (key, value) in entries {
                    let result = apply(f.clone(), vec![value, Value::string(&key)], ctx).await?;
                    mapped.insert(key, result);
                }
                Ok(Value::map(mapped))
            }
            Traverse::Filter => {
                let mut kept = BTreeMap::new();
                for (key, value) in entries {
                    if apply(f.clone(), vec![value.clone(), Value::string(&key)], ctx).await?.is_truthy() {
                        kept.insert(key, value);
                    }
                }
                Ok(Value::map(kept))
            }
            Traverse::Reduce => {
                let mut acc = args[2].clone();
                for (key, value) in entries {
                    acc = apply(f.clone(), vec![acc, value, Value::string(&key)], ctx).await?;
                }
                Ok(acc)
            }
            Traverse::FlatMap => {
                let mut merged = BTreeMap::new();
                for (key, value) in entries {
                    if let Value::Map(result) = apply(f.clone(), vec![value, Value::string(&key)], ctx).await? {
                        for (k, v) in result.read().iter() {
                            merged.insert(k.clone(), v.clone());
                        }
                        collection_len(self.name(), merged.len())?;
                    }
                }
                Ok(Value::map(merged))
            }
        }
    }
}
