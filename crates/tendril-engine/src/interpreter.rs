//! Tree-walking interpreter
//!
//! Every visited node costs one unit of gas, literals included, and holds
//! one level of nesting while it runs. A call node charges, resolves its
//! opcode, checks arity and the opcode's required capability, then
//! evaluates arguments per the opcode's evaluation policy.

use crate::context::ExecContext;
use crate::opcode::{Evaluation, Thunk};
use crate::value::Value;
use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tendril_core::{Expr, Result};

/// Evaluate `expr` in `ctx` as a whole program. A top-level `std.return`
/// ends it with the returned value.
pub fn evaluate<'a>(expr: &'a Expr, ctx: &'a mut ExecContext) -> BoxFuture<'a, Result<Value>> {
    async move {
        let result = eval_node(expr, ctx).await;
        ctx.settle(result)
    }
    .boxed()
}

fn eval_node<'a>(expr: &'a Expr, ctx: &'a mut ExecContext) -> BoxFuture<'a, Result<Value>> {
    async move {
        ctx.enter_node()?;
        let result = eval_entered(expr, ctx).await;
        ctx.leave_node();
        result
    }
    .boxed()
}

async fn eval_entered(expr: &Expr, ctx: &mut ExecContext) -> Result<Value> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::List(items) => match expr.as_call() {
            Some((name, args)) => call(name, args, ctx).await,
            None => {
                let mut values = Vec::with_capacity(items.len());
                for item in items.iter() {
                    values.push(eval_node(item, ctx).await?);
                }
                Ok(Value::list(values))
            }
        },
        Expr::Object(fields) => {
            let mut entries = BTreeMap::new();
            for (key, value) in fields.iter() {
                entries.insert(key.clone(), eval_node(value, ctx).await?);
            }
            Ok(Value::map(entries))
        }
    }
}

async fn call(name: &str, args: &[Expr], ctx: &mut ExecContext) -> Result<Value> {
    let opcode = ctx.registry.lookup(name)?;
    opcode.arity().check(name, args.len())?;
    ctx.check_opcode_capability(opcode.as_ref()).await?;

    match opcode.evaluation() {
        Evaluation::Eager => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_node(arg, ctx).await?);
            }
            opcode.call(values, ctx).await
        }
        Evaluation::Lazy => {
            let thunks: Vec<Arc<dyn Thunk>> = args
                .iter()
                .map(|arg| Arc::new(ExprThunk(arg.clone())) as Arc<dyn Thunk>)
                .collect();
            opcode.call_lazy(&thunks, ctx).await
        }
    }
}

/// A raw sub-expression, evaluated by the interpreter on demand.
pub struct ExprThunk(pub Expr);

impl Thunk for ExprThunk {
    fn expr(&self) -> &Expr {
        &self.0
    }

    fn eval<'a>(&'a self, ctx: &'a mut ExecContext) -> BoxFuture<'a, Result<Value>> {
        eval_node(&self.0, ctx)
    }
}
