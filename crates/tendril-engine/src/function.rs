//! Callable values and function application

use crate::context::ExecContext;
use crate::kernel;
use crate::opcode::Thunk;
use crate::scope::Scope;
use crate::value::Value;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tendril_core::{EntityId, Result, ScriptError};
use tendril_world::Capability;

pub enum Callable {
    /// A script closure.
    Lambda(Lambda),
    /// A function taken from a map together with the map it came from.
    Bound { receiver: Value, func: Arc<Callable> },
    /// A method of a capability's class.
    CapabilityMethod { cap: Arc<Capability>, method: String },
    /// A verb on an entity.
    Verb { entity: EntityId, verb: String },
}

pub struct Lambda {
    pub params: Vec<String>,
    pub body: Arc<dyn Thunk>,
    /// Frame the lambda was defined in.
    pub scope: Scope,
}

impl Callable {
    pub fn arity(&self) -> Option<usize> {
        match self {
            Callable::Lambda(lambda) => Some(lambda.params.len()),
            Callable::Bound { func, .. } => func.arity(),
            Callable::CapabilityMethod { .. } | Callable::Verb { .. } => None,
        }
    }
}

/// Apply a function value to already evaluated arguments.
pub fn apply<'a>(func: Arc<Callable>, args: Vec<Value>, ctx: &'a mut ExecContext) -> BoxFuture<'a, Result<Value>> {
    apply_with_receiver(func, None, args, ctx)
}

fn apply_with_receiver<'a>(
    func: Arc<Callable>,
    receiver: Option<Value>,
    args: Vec<Value>,
    ctx: &'a mut ExecContext,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        match func.as_ref() {
            Callable::Lambda(lambda) => {
                let frame = match receiver {
                    Some(receiver) => lambda.scope.method_frame(receiver),
                    None => lambda.scope.child(),
                };
                let mut args = args.into_iter();
                for param in &lambda.params {
                    frame.define(param, args.next().unwrap_or(Value::Null));
                }

                ctx.enter()?;
                let saved = std::mem::replace(&mut ctx.scope, frame);
                let result = lambda.body.eval(ctx).await;
                ctx.scope = saved;
                ctx.leave();
                ctx.settle(result)
            }
            Callable::Bound { receiver, func } => {
                apply_with_receiver(func.clone(), Some(receiver.clone()), args, ctx).await
            }
            Callable::CapabilityMethod { cap, method } => invoke_capability(cap, method, args, ctx).await,
            Callable::Verb { entity, verb } => kernel::call_verb(ctx, *entity, verb, args).await,
        }
    }
    .boxed()
}

/// Run a capability class method on behalf of `this`. The capability is
/// re-read from the store so revoked or transferred tokens stop working.
async fn invoke_capability(
    cap: &Capability,
    method: &str,
    args: Vec<Value>,
    ctx: &mut ExecContext,
) -> Result<Value> {
    let services = ctx.services()?;
    let this = ctx.this_entity()?;
    let current = services.world.owned_capability(this, &cap.id).await?;
    let class = services
        .classes
        .get(&current.cap_type)
        .ok_or_else(|| ScriptError::denied(format!("no handler for capability type {}", current.cap_type)))?;
    if !class.methods().iter().any(|m| *m == method) {
        return Err(ScriptError::type_error(
            current.cap_type.clone(),
            format!("unknown method {}", method),
        ));
    }
    let json_args = Value::all_to_json(&args)?;
    let result = class.invoke(&current, method, json_args, &services.world).await?;
    Ok(Value::from_json(&result))
}

/// Look up `name` on `target` and bind it as a method.
pub fn method(opcode: &str, target: &Value, name: &str) -> Result<Value> {
    let callable = match target {
        Value::Map(entries) => {
            let field = entries.read().get(name).cloned();
            match field {
                Some(Value::Function(func)) => Callable::Bound { receiver: target.clone(), func },
                Some(other) => {
                    return Err(ScriptError::type_error(
                        opcode,
                        format!("field {} is a {}, not a function", name, other.type_name()),
                    ))
                }
                None => return Err(ScriptError::type_error(opcode, format!("no method {}", name))),
            }
        }
        Value::Capability(cap) => Callable::CapabilityMethod { cap: cap.clone(), method: name.to_string() },
        Value::Entity(id) => Callable::Verb { entity: *id, verb: name.to_string() },
        other => {
            return Err(ScriptError::type_error(
                opcode,
                format!("cannot call methods on {}", other.type_name()),
            ))
        }
    };
    Ok(Value::Function(Arc::new(callable)))
}
