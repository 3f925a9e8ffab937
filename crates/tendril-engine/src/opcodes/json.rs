//! `json` library

use super::{native, string, text_len};
use crate::context::ExecContext;
use crate::opcode::{Arity, Opcode};
use crate::value::Value;
use std::sync::Arc;
use tendril_core::{Result, ScriptError};

const CATEGORY: &str = "json";

pub fn library() -> Vec<Arc<dyn Opcode>> {
    vec![
        native("json.stringify", CATEGORY, Arity::Fixed(1), stringify),
        native("json.parse", CATEGORY, Arity::Fixed(1), parse),
    ]
}

fn stringify(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let text = args[0].to_json()?.to_string();
    text_len(opcode, text.len())?;
    Ok(Value::string(text))
}

fn parse(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let text = string(opcode, args, 0)?;
    let parsed: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ScriptError::type_error(opcode, format!("invalid JSON: {}", e)))?;
    Ok(Value::from_json(&parsed))
}
