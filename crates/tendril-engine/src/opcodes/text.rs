//! `str` library. Lengths and slices count characters, not bytes.

use super::{arg, collection_len, integer, native, string, text_len};
use crate::context::ExecContext;
use crate::opcode::{Arity, Opcode};
use crate::value::Value;
use regex::RegexBuilder;
use std::sync::Arc;
use tendril_core::{Result, ScriptError};

const CATEGORY: &str = "str";

/// Compiled size limit for `str.match` patterns.
const REGEX_SIZE_LIMIT: usize = 1 << 16;

pub fn library() -> Vec<Arc<dyn Opcode>> {
    vec![
        native("str.len", CATEGORY, Arity::Fixed(1), len),
        native("str.concat", CATEGORY, Arity::Variadic { min: 0 }, concat),
        native("str.upper", CATEGORY, Arity::Fixed(1), upper),
        native("str.lower", CATEGORY, Arity::Fixed(1), lower),
        native("str.trim", CATEGORY, Arity::Fixed(1), trim),
        native("str.split", CATEGORY, Arity::Fixed(2), split),
        native("str.slice", CATEGORY, Arity::Range(2, 3), slice),
        native("str.includes", CATEGORY, Arity::Fixed(2), includes),
        native("str.indexOf", CATEGORY, Arity::Fixed(2), index_of),
        native("str.startsWith", CATEGORY, Arity::Fixed(2), affix),
        native("str.endsWith", CATEGORY, Arity::Fixed(2), affix),
        native("str.replace", CATEGORY, Arity::Fixed(3), replace),
        native("str.repeat", CATEGORY, Arity::Fixed(2), repeat),
        native("str.match", CATEGORY, Arity::Fixed(2), matches),
    ]
}

fn len(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Number(string(opcode, args, 0)?.chars().count() as f64))
}

/// Non-string operands are converted with their display form.
fn concat(_opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::string(Value::join_display(args, "")?))
}

// case mapping can lengthen a string
fn upper(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let upper = string(opcode, args, 0)?.to_uppercase();
    text_len(opcode, upper.len())?;
    Ok(Value::string(upper))
}

fn lower(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let lower = string(opcode, args, 0)?.to_lowercase();
    text_len(opcode, lower.len())?;
    Ok(Value::string(lower))
}

fn trim(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::string(string(opcode, args, 0)?.trim()))
}

fn split(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let text = string(opcode, args, 0)?;
    let separator = string(opcode, args, 1)?;
    let parts: Vec<Value> = if separator.is_empty() {
        collection_len(opcode, text.chars().count())?;
        text.chars().map(|c| Value::string(c.to_string())).collect()
    } else {
        collection_len(opcode, text.matches(separator).count() + 1)?;
        text.split(separator).map(Value::string).collect()
    };
    Ok(Value::list(parts))
}

fn slice(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let chars: Vec<char> = string(opcode, args, 0)?.chars().collect();
    let clamp = |index: i64| {
        let resolved = if index < 0 { chars.len() as i64 + index } else { index };
        resolved.clamp(0, chars.len() as i64) as usize
    };
    let start = clamp(integer(opcode, args, 1)?);
    let end = match arg(args, 2) {
        Value::Null => chars.len(),
        _ => clamp(integer(opcode, args, 2)?),
    };
    let sliced: String = if start < end { chars[start..end].iter().collect() } else { String::new() };
    Ok(Value::string(sliced))
}

fn includes(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Bool(string(opcode, args, 0)?.contains(string(opcode, args, 1)?)))
}

/// Character index of the first occurrence, or -1.
fn index_of(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let text = string(opcode, args, 0)?;
    let needle = string(opcode, args, 1)?;
    Ok(Value::Number(match text.find(needle) {
        Some(byte) => text[..byte].chars().count() as f64,
        None => -1.0,
    }))
}

fn affix(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let text = string(opcode, args, 0)?;
    let part = string(opcode, args, 1)?;
    Ok(Value::Bool(if opcode == "str.startsWith" { text.starts_with(part) } else { text.ends_with(part) }))
}

/// Replaces every occurrence.
fn replace(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let text = string(opcode, args, 0)?;
    let from = string(opcode, args, 1)?;
    let to = string(opcode, args, 2)?;
    if from.is_empty() {
        return Ok(Value::string(text));
    }
    let hits = text.matches(from).count();
    text_len(opcode, (text.len() - hits * from.len()).saturating_add(hits.saturating_mul(to.len())))?;
    Ok(Value::string(text.replace(from, to)))
}

fn repeat(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let text = string(opcode, args, 0)?;
    let count = integer(opcode, args, 1)?;
    let count = usize::try_from(count)
        .map_err(|_| ScriptError::type_error(opcode, "count must not be negative"))?;
    text_len(opcode, text.len().saturating_mul(count))?;
    Ok(Value::string(text.repeat(count)))
}

/// First match of a regular expression: the whole match followed by the
/// capture groups, or null when nothing matches.
fn matches(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let text = string(opcode, args, 0)?;
    let pattern = string(opcode, args, 1)?;
    let regex = RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| ScriptError::type_error(opcode, format!("invalid pattern: {}", e)))?;
    Ok(match regex.captures(text) {
        Some(captures) => Value::list(
            captures
                .iter()
                .map(|group| group.map(|m| Value::string(m.as_str())).unwrap_or(Value::Null))
                .collect(),
        ),
        None => Value::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OpcodeRegistry;

    fn ctx() -> ExecContext {
        ExecContext::new(Arc::new(OpcodeRegistry::new()))
    }

    #[test]
    fn slice_counts_characters() {
        let args = vec![Value::string("héllo"), Value::Number(1.0), Value::Number(3.0)];
        assert_eq!(slice("str.slice", &args, &mut ctx()).unwrap(), Value::string("él"));
    }

    #[test]
    fn match_returns_groups() {
        let args = vec![Value::string("key=42"), Value::string(r"(\w+)=(\d+)")];
        let result = matches("str.match", &args, &mut ctx()).unwrap();
        assert_eq!(result.to_json().unwrap(), serde_json::json!(["key=42", "key", "42"]));
    }

    #[test]
    fn repeat_is_bounded() {
        let args = vec![Value::string("ab"), Value::Number(1e9)];
        let err = repeat("str.repeat", &args, &mut ctx()).unwrap_err();
        assert_eq!(err.kind(), tendril_core::ErrorKind::Limit);
    }

    #[test]
    fn replace_checks_grown_length() {
        let text = Value::string("a".repeat(1 << 12));
        let args = vec![text, Value::string("a"), Value::string("b".repeat(1 << 9))];
        assert!(replace("str.replace", &args, &mut ctx()).is_err());
    }

    #[test]
    fn index_of_counts_characters() {
        let args = vec![Value::string("héllo"), Value::string("llo")];
        assert_eq!(index_of("str.indexOf", &args, &mut ctx()).unwrap(), Value::Number(2.0));
        let args = vec![Value::string("héllo"), Value::string("z")];
        assert_eq!(index_of("str.indexOf", &args, &mut ctx()).unwrap(), Value::Number(-1.0));
    }
}
