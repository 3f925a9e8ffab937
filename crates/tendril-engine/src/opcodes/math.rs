//! `math` library. Arithmetic folds left to right over numbers.

use super::{native, number};
use crate::context::ExecContext;
use crate::opcode::{Arity, Opcode};
use crate::value::Value;
use std::sync::Arc;
use tendril_core::{Result, ScriptError};

const CATEGORY: &str = "math";

pub fn library() -> Vec<Arc<dyn Opcode>> {
    vec![
        native("math.add", CATEGORY, Arity::Variadic { min: 1 }, add),
        native("math.sub", CATEGORY, Arity::Variadic { min: 1 }, sub),
        native("math.mul", CATEGORY, Arity::Variadic { min: 1 }, mul),
        native("math.div", CATEGORY, Arity::Variadic { min: 2 }, div),
        native("math.mod", CATEGORY, Arity::Fixed(2), modulo),
        native("math.pow", CATEGORY, Arity::Fixed(2), pow),
        native("math.neg", CATEGORY, Arity::Fixed(1), unary),
        native("math.abs", CATEGORY, Arity::Fixed(1), unary),
        native("math.floor", CATEGORY, Arity::Fixed(1), unary),
        native("math.ceil", CATEGORY, Arity::Fixed(1), unary),
        native("math.round", CATEGORY, Arity::Fixed(1), unary),
        native("math.trunc", CATEGORY, Arity::Fixed(1), unary),
        native("math.sign", CATEGORY, Arity::Fixed(1), unary),
        native("math.sqrt", CATEGORY, Arity::Fixed(1), unary),
        native("math.min", CATEGORY, Arity::Variadic { min: 1 }, extreme),
        native("math.max", CATEGORY, Arity::Variadic { min: 1 }, extreme),
        native("math.clamp", CATEGORY, Arity::Fixed(3), clamp),
    ]
}

fn numbers(opcode: &str, args: &[Value]) -> Result<Vec<f64>> {
    (0..args.len()).map(|i| number(opcode, args, i)).collect()
}

fn fold(opcode: &str, args: &[Value], op: fn(f64, f64) -> f64) -> Result<Value> {
    let values = numbers(opcode, args)?;
    let first = values[0];
    Ok(Value::Number(values[1..].iter().fold(first, |acc, n| op(acc, *n))))
}

fn add(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    fold(opcode, args, |a, b| a + b)
}

/// A single operand is negated.
fn sub(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    if args.len() == 1 {
        return Ok(Value::Number(-number(opcode, args, 0)?));
    }
    fold(opcode, args, |a, b| a - b)
}

fn mul(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    fold(opcode, args, |a, b| a * b)
}

fn div(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let values = numbers(opcode, args)?;
    if values[1..].iter().any(|n| *n == 0.0) {
        return Err(ScriptError::type_error(opcode, "division by zero"));
    }
    Ok(Value::Number(values[1..].iter().fold(values[0], |acc, n| acc / n)))
}

/// Floored modulo: the result takes the sign of the divisor.
fn modulo(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let (a, b) = (number(opcode, args, 0)?, number(opcode, args, 1)?);
    if b == 0.0 {
        return Err(ScriptError::type_error(opcode, "division by zero"));
    }
    Ok(Value::Number(a - b * (a / b).floor()))
}

fn pow(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Number(number(opcode, args, 0)?.powf(number(opcode, args, 1)?)))
}

fn unary(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let n = number(opcode, args, 0)?;
    let result = match opcode {
        "math.neg" => -n,
        "math.abs" => n.abs(),
        "math.floor" => n.floor(),
        "math.ceil" => n.ceil(),
        "math.round" => n.round(),
        "math.trunc" => n.trunc(),
        "math.sign" if n == 0.0 => 0.0,
        "math.sign" => n.signum(),
        "math.sqrt" if n < 0.0 => {
            return Err(ScriptError::type_error(opcode, "square root of a negative number"))
        }
        "math.sqrt" => n.sqrt(),
        _ => return Err(ScriptError::Internal(format!("{} is not a unary math opcode", opcode))),
    };
    Ok(Value::Number(result))
}

fn extreme(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let values = numbers(opcode, args)?;
    let pick: fn(f64, f64) -> f64 = if opcode == "math.min" { f64::min } else { f64::max };
    Ok(Value::Number(values[1..].iter().fold(values[0], |acc, n| pick(acc, *n))))
}

fn clamp(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let (n, lo, hi) = (number(opcode, args, 0)?, number(opcode, args, 1)?, number(opcode, args, 2)?);
    if lo > hi {
        return Err(ScriptError::type_error(opcode, "lower bound exceeds upper bound"));
    }
    Ok(Value::Number(n.clamp(lo, hi)))
}
