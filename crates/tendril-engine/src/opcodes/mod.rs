//! Standard opcode libraries
//!
//! Each submodule exposes `library()`, the list of opcodes it contributes.
//! [`crate::create_default_registry`] merges them all.

pub mod capability;
pub mod json;
pub mod list;
pub mod logic;
pub mod math;
pub mod object;
pub mod stdlib;
pub mod text;
pub mod time;
pub mod world;

use crate::function::Callable;
use crate::opcode::{Arity, NativeHandler, NativeOpcode, Opcode};
use crate::value::{ListRef, MapRef, Value, MAX_COLLECTION_LEN, MAX_TEXT_LEN};
use std::sync::Arc;
use tendril_core::{EntityId, Result, ScriptError};

pub(crate) fn native(name: &'static str, category: &'static str, arity: Arity, handler: NativeHandler) -> Arc<dyn Opcode> {
    Arc::new(NativeOpcode::new(name, category, arity, handler))
}

/// Argument `i`, or null when absent.
pub(crate) fn arg(args: &[Value], i: usize) -> &Value {
    static NULL: Value = Value::Null;
    args.get(i).unwrap_or(&NULL)
}

fn expected(opcode: &str, i: usize, what: &str, got: &Value) -> ScriptError {
    ScriptError::type_error(opcode, format!("argument {} must be a {}, got {}", i + 1, what, got.type_name()))
}

pub(crate) fn number(opcode: &str, args: &[Value], i: usize) -> Result<f64> {
    let value = arg(args, i);
    value.as_f64().ok_or_else(|| expected(opcode, i, "number", value))
}

pub(crate) fn integer(opcode: &str, args: &[Value], i: usize) -> Result<i64> {
    let n = number(opcode, args, i)?;
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(ScriptError::type_error(opcode, format!("argument {} must be an integer, got {}", i + 1, n)));
    }
    Ok(n as i64)
}

pub(crate) fn string<'a>(opcode: &str, args: &'a [Value], i: usize) -> Result<&'a str> {
    let value = arg(args, i);
    value.as_str().ok_or_else(|| expected(opcode, i, "string", value))
}

pub(crate) fn list(opcode: &str, args: &[Value], i: usize) -> Result<ListRef> {
    match arg(args, i) {
        Value::List(items) => Ok(items.clone()),
        other => Err(expected(opcode, i, "list", other)),
    }
}

pub(crate) fn map(opcode: &str, args: &[Value], i: usize) -> Result<MapRef> {
    match arg(args, i) {
        Value::Map(entries) => Ok(entries.clone()),
        other => Err(expected(opcode, i, "object", other)),
    }
}

pub(crate) fn entity(opcode: &str, args: &[Value], i: usize) -> Result<EntityId> {
    let value = arg(args, i);
    value.as_entity().ok_or_else(|| expected(opcode, i, "entity", value))
}

pub(crate) fn function(opcode: &str, args: &[Value], i: usize) -> Result<Arc<Callable>> {
    match arg(args, i) {
        Value::Function(func) => Ok(func.clone()),
        other => Err(expected(opcode, i, "function", other)),
    }
}

/// Plain-data props for world operations. Null means empty.
pub(crate) fn props(opcode: &str, args: &[Value], i: usize) -> Result<tendril_world::Props> {
    match arg(args, i).to_json()? {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(tendril_world::Props::new()),
        _ => Err(expected(opcode, i, "object", arg(args, i))),
    }
}

/// Fails when a string result of `len` bytes would be too long.
pub(crate) fn text_len(opcode: &str, len: usize) -> Result<()> {
    if len > MAX_TEXT_LEN {
        return Err(ScriptError::resource(format!("{}: string of {} bytes exceeds {}", opcode, len, MAX_TEXT_LEN)));
    }
    Ok(())
}

/// Fails when a list or object would grow past `MAX_COLLECTION_LEN` entries.
pub(crate) fn collection_len(opcode: &str, len: usize) -> Result<()> {
    if len > MAX_COLLECTION_LEN {
        return Err(ScriptError::resource(format!(
            "{}: {} elements exceeds {}",
            opcode, len, MAX_COLLECTION_LEN
        )));
    }
    Ok(())
}
