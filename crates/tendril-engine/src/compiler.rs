//! Ahead-of-time compiler to closures
//!
//! Opcode lookup, arity and evaluation policy are resolved once at compile
//! time. What remains at run time mirrors the interpreter step for step: one
//! gas unit and one nesting level per node, the same failure at the same
//! node, the same handlers.
//! Lazy opcodes receive precompiled thunks, so control flow is shared code.

use crate::context::ExecContext;
use crate::opcode::{Evaluation, Opcode, Thunk};
use crate::registry::OpcodeRegistry;
use crate::value::Value;
use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tendril_core::{Expr, Result, ScriptError};

pub type CompiledFn =
    Arc<dyn for<'a> Fn(&'a mut ExecContext) -> BoxFuture<'a, Result<Value>> + Send + Sync>;

/// A compiled expression tree.
pub struct Program {
    expr: Expr,
    root: CompiledFn,
}

impl Program {
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Run as a whole program; a top-level `std.return` ends it.
    pub async fn run(&self, ctx: &mut ExecContext) -> Result<Value> {
        let result = (self.root)(ctx).await;
        ctx.settle(result)
    }
}

pub fn compile(expr: &Expr, registry: &OpcodeRegistry) -> Program {
    Program { expr: expr.clone(), root: compile_node(expr, registry) }
}

fn node<F>(f: F) -> CompiledFn
where
    F: for<'a> Fn(&'a mut ExecContext) -> BoxFuture<'a, Result<Value>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A leaf: enters and leaves its node at once.
fn leaf(outcome: Result<Value>) -> CompiledFn {
    node(move |ctx| {
        let outcome = outcome.clone();
        async move {
            ctx.enter_node()?;
            ctx.leave_node();
            outcome
        }
        .boxed()
    })
}

fn compile_node(expr: &Expr, registry: &OpcodeRegistry) -> CompiledFn {
    match expr {
        Expr::Null => leaf(Ok(Value::Null)),
        Expr::Bool(b) => leaf(Ok(Value::Bool(*b))),
        Expr::Number(n) => leaf(Ok(Value::Number(*n))),
        Expr::String(s) => leaf(Ok(Value::String(s.clone()))),
        Expr::List(items) => match expr.as_call() {
            Some((name, args)) => compile_call(name, args, registry),
            None => {
                let elements: Arc<[CompiledFn]> =
                    items.iter().map(|item| compile_node(item, registry)).collect();
                node(move |ctx| {
                    let elements = elements.clone();
                    async move {
                        ctx.enter_node()?;
                        let result = build_list(&elements, ctx).await;
                        ctx.leave_node();
                        result
                    }
                    .boxed()
                })
            }
        },
        Expr::Object(fields) => {
            let fields: Arc<[(String, CompiledFn)]> = fields
                .iter()
                .map(|(key, value)| (key.clone(), compile_node(value, registry)))
                .collect();
            node(move |ctx| {
                let fields = fields.clone();
                async move {
                    ctx.enter_node()?;
                    let result = build_map(&fields, ctx).await;
                    ctx.leave_node();
                    result
                }
                .boxed()
            })
        }
    }
}

async fn build_list(elements: &[CompiledFn], ctx: &mut ExecContext) -> Result<Value> {
    let mut values = Vec::with_capacity(elements.len());
    for element in elements {
        values.push(element(ctx).await?);
    }
    Ok(Value::list(values))
}

async fn build_map(fields: &[(String, CompiledFn)], ctx: &mut ExecContext) -> Result<Value> {
    let mut entries = BTreeMap::new();
    for (key, value) in fields {
        entries.insert(key.clone(), value(ctx).await?);
    }
    Ok(Value::map(entries))
}

fn compile_call(name: &str, args: &[Expr], registry: &OpcodeRegistry) -> CompiledFn {
    let Some(opcode) = registry.get(name) else {
        return leaf(Err(ScriptError::UnknownOpcode(name.to_string())));
    };
    // Raised only if the node is reached, like the interpreter.
    let arity_error = opcode.arity().check(name, args.len()).err();

    match opcode.evaluation() {
        Evaluation::Eager => {
            let children: Arc<[CompiledFn]> = args.iter().map(|arg| compile_node(arg, registry)).collect();
            node(move |ctx| {
                let opcode = opcode.clone();
                let children = children.clone();
                let arity_error = arity_error.clone();
                async move {
                    ctx.enter_node()?;
                    let result = call_eager(opcode.as_ref(), arity_error, &children, ctx).await;
                    ctx.leave_node();
                    result
                }
                .boxed()
            })
        }
        Evaluation::Lazy => {
            let thunks: Arc<[Arc<dyn Thunk>]> = args
                .iter()
                .map(|arg| {
                    Arc::new(CompiledThunk { expr: arg.clone(), run: compile_node(arg, registry) })
                        as Arc<dyn Thunk>
                })
                .collect();
            node(move |ctx| {
                let opcode = opcode.clone();
                let thunks = thunks.clone();
                let arity_error = arity_error.clone();
                async move {
                    ctx.enter_node()?;
                    let result = call_lazy(opcode.as_ref(), arity_error, &thunks, ctx).await;
                    ctx.leave_node();
                    result
                }
                .boxed()
            })
        }
    }
}

async fn call_eager(
    opcode: &dyn Opcode,
    arity_error: Option<ScriptError>,
    children: &[CompiledFn],
    ctx: &mut ExecContext,
) -> Result<Value> {
    prologue(ctx, opcode, arity_error).await?;
    let mut values = Vec::with_capacity(children.len());
    for child in children {
        values.push(child(ctx).await?);
    }
    opcode.call(values, ctx).await
}

async fn call_lazy(
    opcode: &dyn Opcode,
    arity_error: Option<ScriptError>,
    thunks: &[Arc<dyn Thunk>],
    ctx: &mut ExecContext,
) -> Result<Value> {
    prologue(ctx, opcode, arity_error).await?;
    opcode.call_lazy(thunks, ctx).await
}

async fn prologue(ctx: &mut ExecContext, opcode: &dyn Opcode, arity_error: Option<ScriptError>) -> Result<()> {
    if let Some(err) = arity_error {
        return Err(err);
    }
    ctx.check_opcode_capability(opcode).await
}

/// A precompiled sub-expression handed to lazy opcodes.
struct CompiledThunk {
    expr: Expr,
    run: CompiledFn,
}

impl Thunk for CompiledThunk {
    fn expr(&self) -> &Expr {
        &self.expr
    }

    fn eval<'a>(&'a self, ctx: &'a mut ExecContext) -> BoxFuture<'a, Result<Value>> {
        (self.run)(ctx)
    }
}
