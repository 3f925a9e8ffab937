//! `list` library. Lists are shared references: mutating opcodes change the
//! list in place and return it. Indices are zero-based; negative indices
//! count from the end.

use super::{arg, collection_len, function, integer, list, native, string};
use crate::context::ExecContext;
use crate::function::apply;
use crate::opcode::{Arity, Opcode};
use crate::value::{Value, Walk};
use std::cmp::Ordering;
use std::sync::Arc;
use tendril_core::{Result, ScriptError};

const CATEGORY: &str = "list";

pub fn library() -> Vec<Arc<dyn Opcode>> {
    vec![
        native("list.new", CATEGORY, Arity::Variadic { min: 0 }, new),
        native("list.len", CATEGORY, Arity::Fixed(1), len),
        native("list.empty", CATEGORY, Arity::Fixed(1), empty),
        native("list.get", CATEGORY, Arity::Range(2, 3), get),
        native("list.set", CATEGORY, Arity::Fixed(3), set),
        native("list.push", CATEGORY, Arity::Variadic { min: 2 }, push),
        native("list.pop", CATEGORY, Arity::Fixed(1), pop),
        native("list.unshift", CATEGORY, Arity::Fixed(2), unshift),
        native("list.shift", CATEGORY, Arity::Fixed(1), shift),
        native("list.concat", CATEGORY, Arity::Variadic { min: 0 }, concat),
        native("list.slice", CATEGORY, Arity::Range(2, 3), slice),
        native("list.includes", CATEGORY, Arity::Fixed(2), includes),
        native("list.indexOf", CATEGORY, Arity::Fixed(2), index_of),
        native("list.splice", CATEGORY, Arity::Variadic { min: 2 }, splice),
        native("list.reverse", CATEGORY, Arity::Fixed(1), reverse),
        native("list.join", CATEGORY, Arity::Range(1, 2), join),
        native("list.sort", CATEGORY, Arity::Fixed(1), sort),
        Arc::new(HigherOrder::Map),
        Arc::new(HigherOrder::Filter),
        Arc::new(HigherOrder::Find),
        Arc::new(HigherOrder::Reduce),
        Arc::new(HigherOrder::FlatMap),
    ]
}

/// Resolve a possibly negative index against `len`.
fn position(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 { len as i64 + index } else { index };
    (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

/// Clamp a slice bound into `0..=len`.
fn bound(index: i64, len: usize) -> usize {
    let resolved = if index < 0 { len as i64 + index } else { index };
    resolved.clamp(0, len as i64) as usize
}

fn new(_opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::list(args.to_vec()))
}

fn len(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Number(list(opcode, args, 0)?.read().len() as f64))
}

fn empty(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Bool(list(opcode, args, 0)?.read().is_empty()))
}

/// Out-of-range reads yield the default, or null.
fn get(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let items = list(opcode, args, 0)?;
    let index = integer(opcode, args, 1)?;
    let items = items.read();
    Ok(position(index, items.len())
        .map(|i| items[i].clone())
        .unwrap_or_else(|| arg(args, 2).clone()))
}

fn set(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let items = list(opcode, args, 0)?;
    let index = integer(opcode, args, 1)?;
    let mut guard = items.write();
    let i = position(index, guard.len())
        .ok_or_else(|| ScriptError::type_error(opcode, format!("index {} out of range", index)))?;
    guard[i] = args[2].clone();
    drop(guard);
    Ok(args[0].clone())
}

fn push(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let items = list(opcode, args, 0)?;
    let mut guard = items.write();
    collection_len(opcode, guard.len() + args.len() - 1)?;
    guard.extend(args[1..].iter().cloned());
    Ok(Value::Number(guard.len() as f64))
}

fn pop(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let items = list(opcode, args, 0)?;
    let popped = items.write().pop();
    Ok(popped.unwrap_or(Value::Null))
}

fn unshift(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let items = list(opcode, args, 0)?;
    let mut guard = items.write();
    collection_len(opcode, guard.len() + 1)?;
    guard.insert(0, args[1].clone());
    Ok(Value::Number(guard.len() as f64))
}

fn shift(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let items = list(opcode, args, 0)?;
    let mut guard = items.write();
    if guard.is_empty() {
        return Ok(Value::Null);
    }
    Ok(guard.remove(0))
}

fn concat(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let mut joined = Vec::new();
    for i in 0..args.len() {
        let items = list(opcode, args, i)?;
        let items = items.read();
        collection_len(opcode, joined.len() + items.len())?;
        joined.extend(items.iter().cloned());
    }
    Ok(Value::list(joined))
}

fn slice(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let items = list(opcode, args, 0)?;
    let items = items.read();
    let start = bound(integer(opcode, args, 1)?, items.len());
    let end = match arg(args, 2) {
        Value::Null => items.len(),
        _ => bound(integer(opcode, args, 2)?, items.len()),
    };
    Ok(Value::list(if start < end { items[start..end].to_vec() } else { Vec::new() }))
}

fn includes(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Bool(first_equal(opcode, args)?.is_some()))
}

/// Zero-based index of the first equal element, or -1.
fn index_of(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Number(first_equal(opcode, args)?.map(|i| i as f64).unwrap_or(-1.0)))
}

/// Every comparison in one search shares a single walk budget.
fn first_equal(opcode: &str, args: &[Value]) -> Result<Option<usize>> {
    let items = list(opcode, args, 0)?.read().clone();
    let mut walk = Walk::new();
    for (i, item) in items.iter().enumerate() {
        if item.equals_in(&args[1], &mut walk)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

/// `(list, start, delete_count?, ...items)` removes `delete_count` elements
/// (all remaining when null) at `start`, inserts `items` there and returns
/// the removed elements.
fn splice(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let items = list(opcode, args, 0)?;
    let start = integer(opcode, args, 1)?;
    let delete = match arg(args, 2) {
        Value::Null => None,
        _ => Some(integer(opcode, args, 2)?),
    };
    let inserted = args.get(3..).unwrap_or_default();

    let mut guard = items.write();
    let start = bound(start, guard.len());
    let end = match delete {
        Some(count) => start + (count.max(0) as usize).min(guard.len() - start),
        None => guard.len(),
    };
    collection_len(opcode, guard.len() - (end - start) + inserted.len())?;
    let removed: Vec<Value> = guard.splice(start..end, inserted.iter().cloned()).collect();
    Ok(Value::list(removed))
}

fn reverse(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    list(opcode, args, 0)?.write().reverse();
    Ok(args[0].clone())
}

fn join(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let items = list(opcode, args, 0)?;
    let separator = match arg(args, 1) {
        Value::Null => ",",
        _ => string(opcode, args, 1)?,
    };
    let items = items.read().clone();
    Ok(Value::string(Value::join_display(&items, separator)?))
}

/// Sorts numbers and strings in place; numbers before strings, anything
/// else is an argument error.
fn sort(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let items = list(opcode, args, 0)?;
    let mut guard = items.write();
    if let Some(bad) = guard.iter().find(|v| !matches!(v, Value::Number(_) | Value::String(_))) {
        return Err(ScriptError::type_error(opcode, format!("cannot sort {}", bad.type_name())));
    }
    guard.sort_by(|a, b| match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(_), _) => Ordering::Less,
        _ => Ordering::Greater,
    });
    drop(guard);
    Ok(args[0].clone())
}

/// Opcodes that apply a function to each element. They iterate a snapshot
/// taken when the call starts.
enum HigherOrder {
    Map,
    Filter,
    Find,
    Reduce,
    /// Like map, but list results are spliced in one level deep.
    FlatMap,
}

#[async_trait::async_trait]
impl Opcode for HigherOrder {
    fn name(&self) -> &str {
        match self {
            HigherOrder::Map => "list.map",
            HigherOrder::Filter => "list.filter",
            HigherOrder::Find => "list.find",
            HigherOrder::Reduce => "list.reduce",
            HigherOrder::FlatMap => "list.flatMap",
        }
    }

    fn category(&self) -> &str { CATEGORY }

    fn arity(&self) -> Arity {
        match self {
            HigherOrder::Reduce => Arity::Fixed(3),
            _ => Arity::Fixed(2),
        }
    }

    fn is_async(&self) -> bool { true }

    async fn call(&self, args: Vec<Value>, ctx: &mut ExecContext) -> Result<Value> {
        let items = list(self.name(), &args, 0)?.read().clone();
        let f = function(self.name(), &args, 1)?;

        match self {
            HigherOrder::Map => {
                let mut mapped = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    mapped.push(apply(f.clone(), vec![item, Value::Number(i as f64)], ctx).await?);
                }
                Ok(Value::list(mapped))
            }
            HigherOrder::Filter => {
                let mut kept = Vec::new();
                for (i, item) in items.into_iter().enumerate() {
                    if apply(f.clone(), vec![item.clone(), Value::Number(i as f64)], ctx).await?.is_truthy() {
                        kept.push(item);
                    }
                }
                Ok(Value::list(kept))
            }
            HigherOrder::Find => {
                for (i, item) in items.into_iter().enumerate() {
                    if apply(f.clone(), vec![item.clone(), Value::Number(i as f64)], ctx).await?.is_truthy() {
                        return Ok(item);
                    }
                }
                Ok(Value::Null)
            }
            HigherOrder::Reduce => {
                let mut acc = args[2].clone();
                for (i, item) in items.into_iter().enumerate() {
                    acc = apply(f.clone(), vec![acc, item, Value::Number(i as f64)], ctx).await?;
                }
                Ok(acc)
            }
            HigherOrder::FlatMap => {
                let mut flat = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    match apply(f.clone(), vec![item, Value::Number(i as f64)], ctx).await? {
                        Value::List(inner) => {
                            let inner = inner.read();
                            collection_len(self.name(), flat.len() + inner.len())?;
                            flat.extend(inner.iter().cloned());
                        }
                        other => flat.push(other),
                    }
                }
                Ok(Value::list(flat))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_positions_count_from_end() {
        assert_eq!(position(-1, 3), Some(2));
        assert_eq!(position(3, 3), None);
        assert_eq!(position(-4, 3), None);
    }

    fn numbers(values: &[f64]) -> Value {
        Value::list(values.iter().map(|n| Value::Number(*n)).collect())
    }

    fn ctx() -> ExecContext {
        ExecContext::new(Arc::new(crate::registry::OpcodeRegistry::new()))
    }

    #[test]
    fn splice_removes_and_inserts() {
        let l = numbers(&[1.0, 2.0, 3.0, 4.0]);
        let args = vec![l.clone(), Value::Number(1.0), Value::Number(2.0), Value::string("x")];
        assert_eq!(splice("list.splice", &args, &mut ctx()).unwrap(), numbers(&[2.0, 3.0]));
        assert_eq!(l.to_json().unwrap(), serde_json::json!([1, "x", 4]));

        let args = vec![l.clone(), Value::Number(-1.0)];
        assert_eq!(splice("list.splice", &args, &mut ctx()).unwrap(), numbers(&[4.0]));
        assert_eq!(l.to_json().unwrap(), serde_json::json!([1, "x"]));
    }

    #[test]
    fn push_stops_at_collection_limit() {
        let l = Value::list(vec![Value::Null; crate::value::MAX_COLLECTION_LEN]);
        let err = push("list.push", &[l, Value::Null], &mut ctx()).unwrap_err();
        assert_eq!(err.kind(), tendril_core::ErrorKind::Limit);
    }

    #[test]
    fn slice_bounds_clamp() {
        assert_eq!(bound(-10, 3), 0);
        assert_eq!(bound(10, 3), 3);
        assert_eq!(bound(-1, 3), 2);
    }
}
