//! `std` library: control flow, variables, functions, invocation data and
//! script logging.

use super::{arg, function, integer, native, string};
use crate::context::ExecContext;
use crate::function::{self as func, Callable, Lambda};
use crate::opcode::{Arity, Evaluation, Opcode, Thunk};
use crate::value::Value;
use std::sync::Arc;
use tendril_core::{Escape, Expr, Result, ScriptError};
use tracing::{info, warn};

const CATEGORY: &str = "std";

pub fn library() -> Vec<Arc<dyn Opcode>> {
    vec![
        Arc::new(Seq),
        Arc::new(If),
        Arc::new(While),
        Arc::new(For),
        Arc::new(LambdaOp),
        Arc::new(Quote),
        Arc::new(Apply),
        Arc::new(CallMethod),
        native("std.let", CATEGORY, Arity::Fixed(2), let_var),
        native("std.set", CATEGORY, Arity::Fixed(2), set_var),
        native("std.var", CATEGORY, Arity::Fixed(1), get_var),
        native("std.this", CATEGORY, Arity::Fixed(0), this),
        native("std.caller", CATEGORY, Arity::Fixed(0), caller),
        native("std.arg", CATEGORY, Arity::Fixed(1), nth_arg),
        native("std.args", CATEGORY, Arity::Fixed(0), all_args),
        native("std.self", CATEGORY, Arity::Fixed(0), receiver),
        native("std.method", CATEGORY, Arity::Fixed(2), method),
        native("std.break", CATEGORY, Arity::Fixed(0), escape),
        native("std.continue", CATEGORY, Arity::Fixed(0), escape),
        native("std.return", CATEGORY, Arity::Range(0, 1), return_value),
        native("std.throw", CATEGORY, Arity::Fixed(1), throw),
        native("std.log", CATEGORY, Arity::Variadic { min: 0 }, log),
        native("std.warn", CATEGORY, Arity::Variadic { min: 0 }, log),
        native("std.typeof", CATEGORY, Arity::Fixed(1), type_of),
        native("std.string", CATEGORY, Arity::Fixed(1), to_string),
        native("std.number", CATEGORY, Arity::Fixed(1), to_number),
        native("std.boolean", CATEGORY, Arity::Fixed(1), to_boolean),
    ]
}

// ============================================================================
// Control flow
// ============================================================================

struct Seq;

#[async_trait::async_trait]
impl Opcode for Seq {
    fn name(&self) -> &str { "std.seq" }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Variadic { min: 0 } }
    fn evaluation(&self) -> Evaluation { Evaluation::Lazy }

    async fn call_lazy(&self, args: &[Arc<dyn Thunk>], ctx: &mut ExecContext) -> Result<Value> {
        let mut last = Value::Null;
        for step in args {
            last = step.eval(ctx).await?;
        }
        Ok(last)
    }
}

struct If;

#[async_trait::async_trait]
impl Opcode for If {
    fn name(&self) -> &str { "std.if" }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Range(2, 3) }
    fn evaluation(&self) -> Evaluation { Evaluation::Lazy }

    async fn call_lazy(&self, args: &[Arc<dyn Thunk>], ctx: &mut ExecContext) -> Result<Value> {
        if args[0].eval(ctx).await?.is_truthy() {
            args[1].eval(ctx).await
        } else if let Some(otherwise) = args.get(2) {
            otherwise.eval(ctx).await
        } else {
            Ok(Value::Null)
        }
    }
}

struct While;

#[async_trait::async_trait]
impl Opcode for While {
    fn name(&self) -> &str { "std.while" }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Fixed(2) }
    fn evaluation(&self) -> Evaluation { Evaluation::Lazy }

    async fn call_lazy(&self, args: &[Arc<dyn Thunk>], ctx: &mut ExecContext) -> Result<Value> {
        while args[0].eval(ctx).await?.is_truthy() {
            if !keep_looping(args[1].eval(ctx).await)? {
                break;
            }
        }
        Ok(Value::Null)
    }
}

/// `["std.for", name, list, body]`
struct For;

#[async_trait::async_trait]
impl Opcode for For {
    fn name(&self) -> &str { "std.for" }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Fixed(3) }
    fn evaluation(&self) -> Evaluation { Evaluation::Lazy }

    async fn call_lazy(&self, args: &[Arc<dyn Thunk>], ctx: &mut ExecContext) -> Result<Value> {
        let name = args[0].eval(ctx).await?;
        let name = name
            .as_str()
            .ok_or_else(|| ScriptError::type_error(self.name(), "loop variable must be a string"))?
            .to_string();
        let iterable = args[1].eval(ctx).await?;
        let items = match &iterable {
            Value::List(items) => items.read().clone(),
            other => {
                return Err(ScriptError::type_error(
                    self.name(),
                    format!("cannot iterate over {}", other.type_name()),
                ))
            }
        };

        for item in items {
            let frame = ctx.scope.child();
            frame.define(&name, item);
            let saved = std::mem::replace(&mut ctx.scope, frame);
            let result = args[2].eval(ctx).await;
            ctx.scope = saved;
            if !keep_looping(result)? {
                break;
            }
        }
        Ok(Value::Null)
    }
}

/// Outcome of one pass through a loop body: continue with the next pass,
/// stop on `std.break`, or fail.
fn keep_looping(pass: Result<Value>) -> Result<bool> {
    match pass {
        Ok(_) | Err(ScriptError::Escape(Escape::Continue)) => Ok(true),
        Err(ScriptError::Escape(Escape::Break)) => Ok(false),
        Err(err) => Err(err),
    }
}

fn escape(opcode: &str, _args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Err(ScriptError::Escape(if opcode == "std.break" { Escape::Break } else { Escape::Continue }))
}

/// Leaves the innermost function, or the whole verb at top level.
fn return_value(_opcode: &str, args: &[Value], ctx: &mut ExecContext) -> Result<Value> {
    Err(ctx.begin_return(arg(args, 0).clone()))
}

// ============================================================================
// Functions
// ============================================================================

/// `["std.lambda", ["a", "b"], body]`. Parameter names are read as written,
/// never evaluated.
struct LambdaOp;

impl LambdaOp {
    fn params(&self, expr: &Expr) -> Result<Vec<String>> {
        let invalid = || ScriptError::type_error("std.lambda", "parameters must be a list of names");
        match expr {
            Expr::String(name) => Ok(vec![name.to_string()]),
            Expr::List(items) => items
                .iter()
                .map(|item| item.as_str().map(String::from).ok_or_else(invalid))
                .collect(),
            _ => Err(invalid()),
        }
    }
}

#[async_trait::async_trait]
impl Opcode for LambdaOp {
    fn name(&self) -> &str { "std.lambda" }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Fixed(2) }
    fn evaluation(&self) -> Evaluation { Evaluation::Lazy }

    async fn call_lazy(&self, args: &[Arc<dyn Thunk>], ctx: &mut ExecContext) -> Result<Value> {
        let lambda = Lambda {
            params: self.params(args[0].expr())?,
            body: args[1].clone(),
            scope: ctx.scope.clone(),
        };
        Ok(Value::Function(Arc::new(Callable::Lambda(lambda))))
    }
}

struct Quote;

#[async_trait::async_trait]
impl Opcode for Quote {
    fn name(&self) -> &str { "std.quote" }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Fixed(1) }
    fn evaluation(&self) -> Evaluation { Evaluation::Lazy }

    async fn call_lazy(&self, args: &[Arc<dyn Thunk>], _ctx: &mut ExecContext) -> Result<Value> {
        Ok(Value::from_expr(args[0].expr()))
    }
}

struct Apply;

#[async_trait::async_trait]
impl Opcode for Apply {
    fn name(&self) -> &str { "std.apply" }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Variadic { min: 1 } }
    fn is_async(&self) -> bool { true }

    async fn call(&self, mut args: Vec<Value>, ctx: &mut ExecContext) -> Result<Value> {
        let f = function(self.name(), &args, 0)?;
        let rest = args.split_off(1);
        func::apply(f, rest, ctx).await
    }
}

/// `["std.call_method", receiver, name, ...args]`
struct CallMethod;

#[async_trait::async_trait]
impl Opcode for CallMethod {
    fn name(&self) -> &str { "std.call_method" }
    fn category(&self) -> &str { CATEGORY }
    fn arity(&self) -> Arity { Arity::Variadic { min: 2 } }
    fn is_async(&self) -> bool { true }

    async fn call(&self, mut args: Vec<Value>, ctx: &mut ExecContext) -> Result<Value> {
        let name = string(self.name(), &args, 1)?.to_string();
        let bound = func::method(self.name(), &args[0], &name)?;
        let rest = args.split_off(2);
        match bound {
            Value::Function(f) => func::apply(f, rest, ctx).await,
            _ => Err(ScriptError::Internal("method binding produced a non-function".into())),
        }
    }
}

fn method(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    let name = string(opcode, args, 1)?;
    func::method(opcode, &args[0], name)
}

fn receiver(_opcode: &str, _args: &[Value], ctx: &mut ExecContext) -> Result<Value> {
    Ok(ctx.scope.receiver().unwrap_or(Value::Null))
}

// ============================================================================
// Variables
// ============================================================================

fn let_var(opcode: &str, args: &[Value], ctx: &mut ExecContext) -> Result<Value> {
    let name = string(opcode, args, 0)?;
    ctx.scope.define(name, args[1].clone());
    Ok(args[1].clone())
}

fn set_var(opcode: &str, args: &[Value], ctx: &mut ExecContext) -> Result<Value> {
    let name = string(opcode, args, 0)?;
    if ctx.scope.assign(name, args[1].clone()) {
        Ok(args[1].clone())
    } else {
        Err(ScriptError::UndefinedAssignment(name.to_string()))
    }
}

fn get_var(opcode: &str, args: &[Value], ctx: &mut ExecContext) -> Result<Value> {
    let name = string(opcode, args, 0)?;
    ctx.scope
        .lookup(name)
        .ok_or_else(|| ScriptError::UnboundVariable(name.to_string()))
}

// ============================================================================
// Invocation data
// ============================================================================

fn this(_opcode: &str, _args: &[Value], ctx: &mut ExecContext) -> Result<Value> {
    Ok(ctx.this.map(Value::Entity).unwrap_or(Value::Null))
}

fn caller(_opcode: &str, _args: &[Value], ctx: &mut ExecContext) -> Result<Value> {
    Ok(ctx.caller.map(Value::Entity).unwrap_or(Value::Null))
}

fn nth_arg(opcode: &str, args: &[Value], ctx: &mut ExecContext) -> Result<Value> {
    let index = integer(opcode, args, 0)?;
    Ok(usize::try_from(index)
        .ok()
        .and_then(|i| ctx.args.get(i).cloned())
        .unwrap_or(Value::Null))
}

fn all_args(_opcode: &str, _args: &[Value], ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::list(ctx.args.clone()))
}

// ============================================================================
// Errors and logging
// ============================================================================

fn throw(_opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Err(ScriptError::Thrown(args[0].to_display_string()?))
}

fn log(opcode: &str, args: &[Value], ctx: &mut ExecContext) -> Result<Value> {
    let message = Value::join_display(args, " ")?;
    if opcode == "std.warn" {
        warn!(target: "tendril::script", entity = ?ctx.this, "{}", message);
    } else {
        info!(target: "tendril::script", entity = ?ctx.this, "{}", message);
    }
    Ok(Value::Null)
}

// ============================================================================
// Conversions
// ============================================================================

fn type_of(_opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::string(args[0].type_name()))
}

fn to_string(_opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::string(args[0].to_display_string()?))
}

/// Unparsable strings become null.
fn to_number(opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    match arg(args, 0) {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::String(s) => Ok(s.trim().parse::<f64>().map(Value::Number).unwrap_or(Value::Null)),
        Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        Value::Null => Ok(Value::Null),
        Value::Entity(id) => Ok(Value::Number(*id as f64)),
        other => Err(ScriptError::type_error(opcode, format!("cannot convert {} to number", other.type_name()))),
    }
}

fn to_boolean(_opcode: &str, args: &[Value], _ctx: &mut ExecContext) -> Result<Value> {
    Ok(Value::Bool(args[0].is_truthy()))
}
