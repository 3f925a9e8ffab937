//! `bool` library. `and`, `or`, `nullish` and the relational chains are
//! lazy so they can stop evaluating operands early.

use super::native;
use crate::context::ExecContext;
use crate::opcode::{Arity, Evaluation, Opcode, Thunk};
use crate::value::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use tendril_core::{Result, ScriptError};

const CATEGORY: &str = "bool";

pub fn library() -> Vec<Arc<dyn Opcode>> {
    vec![
        Arc::new(Junction { name: "bool.and", stop_on: false }),
        Arc::new(Junction { name: "bool.or", stop_on: true }),
        Arc::new(Nullish),
        Arc::new(Relation { name: "bool.lt", holds: |o| o == Ordering::Less }),
        Arc::new(Relation { name: "bool.lte", holds: |o| o != Ordering::Greater }),
        Arc::new(Relation { name: "bool.gt", holds: |o| o == Ordering::Greater }),
        Arc::new(Relation { name: "bool.gte", holds: |o| o != Ordering::Less }),
        native("bool.not", CATEGORY, Arity::Fixed(1), not),
        native("bool.eq", CATEGORY, Arity::Fixed(2), eq),
        native("bool.neq", CATEGORY, Arity::Fixed(2), neq),
        native("bool.guard", CATEGORY, Arity::Fixed(2), guard),
    ]
}

/// `and` stops at the first falsy operand, `or` at the first truthy one.
struct Junction {
    name: &'static str,
    stop_on: bool,
}

#[async_trait::async_trait]
impl Opcode for Junction {
    fn name(&self) -> &str { self.name }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Variadic { min: 0 } }
    fn evaluation(&self) -> Evaluation { Evaluation::Lazy }

    async fn call_lazy(&self, args: &[Arc<dyn Thunk>], ctx: &mut ExecContext) -> Result<Value> {
        for operand in args {
            if operand.eval(ctx).await?.is_truthy() == self.stop_on {
                return Ok(Value::Bool(self.stop_on));
            }
        }
        Ok(Value::Bool(!self.stop_on))
    }
}

/// First non-null operand, or null.
struct Nullish;

#[async_trait::async_trait]
impl Opcode for Nullish {
    fn name(&self) -> &str { "bool.nullish" }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Variadic { min: 0 } }
    fn evaluation(&self) -> Evaluation { Evaluation::Lazy }

    async fn call_lazy(&self, args: &[Arc<dyn Thunk>], ctx: &mut ExecContext) -> Result<Value> {
        for operand in args {
            let value = operand.eval(ctx).await?;
            if !value.is_null() {
                return Ok(value);
            }
        }
        Ok(Value::Null)
    }
}

/// Pairwise fold: `a < b < c`. Stops at the first pair that fails.
struct Relation {
    name: &'static str,
    holds: fn(Ordering) -> bool,
}

#[async_trait::async_trait]
impl Opcode for Relation {
    fn name(&self) -> &str { self.name }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Variadic { min: 2 } }
    fn evaluation(&self) -> Evaluation { Evaluation::Lazy }

    async fn call_lazy(&self, args: &[Arc<dyn Thunk>], ctx: &mut ExecContext) -> Result<Value> {
        let mut left = args[0].eval(ctx).await?;
        for operand in &args[1..] {
            let right = operand.eval(ctx).await?;
            if !(self.holds)(compare(self.name, &left, &right)?) {
                return Ok(Value::Bool(false));
            }
            left = right;
        }
        Ok(Value::Bool(true))
    }
}

fn compare(opcode: &str, left: &Value, right: &Value) -> Result<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .partial_cmp(b)
            .ok_or_else(|| ScriptError::type_error(opcode, "cannot compare NaN")),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(ScriptError::type_error(
            opcode,
            format!("cannot compare {} with {}", left.type_name(), right.type_name()),
        )),
    }
}

fn not(_opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn eq(_opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Bool(args[0].equals(&args[1])?))
}

fn neq(_opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Bool(!args[0].equals(&args[1])?))
}

/// Eager two-operand default: the right value when the left is null.
/// `false` on the left is kept.
fn guard(_opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(if args[0].is_null() { args[1].clone() } else { args[0].clone() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_rejects_mixed_types() {
        assert!(compare("<", &Value::Number(1.0), &Value::string("a")).is_err());
        assert_eq!(compare("<", &Value::string("a"), &Value::string("b")).unwrap(), Ordering::Less);
    }
}
