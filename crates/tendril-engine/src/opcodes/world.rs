//! `world` library: entity reads, entity creation, verb calls and
//! scheduling. Every opcode here needs a context with a world attached.

use super::{arg, entity, integer, number, props, string};
use crate::context::ExecContext;
use crate::kernel::{call_verb, TaskRequest};
use crate::opcode::{Arity, Opcode};
use crate::value::Value;
use std::sync::Arc;
use tendril_core::{Result, ScriptError};
use tracing::debug;

const CATEGORY: &str = "world";

/// Capability an entity needs to create entities.
pub const CREATE_CAPABILITY: &str = "sys.create";

pub fn library() -> Vec<Arc<dyn Opcode>> {
    [
        WorldOp::Get,
        WorldOp::Props,
        WorldOp::Prop,
        WorldOp::Create,
        WorldOp::Verbs,
        WorldOp::Call,
        WorldOp::Schedule,
        WorldOp::Cancel,
    ]
    .into_iter()
    .map(|op| Arc::new(op) as Arc<dyn Opcode>)
    .collect()
}

#[derive(Clone, Copy)]
enum WorldOp {
    /// `(id)` entity reference, failing when the entity does not exist.
    Get,
    /// `(entity)` resolved properties as an object.
    Props,
    /// `(entity, key)` one resolved property, or null.
    Prop,
    /// `(props, prototype?)` new entity; the creator gets `entity.control`.
    Create,
    /// `(entity)` verb names reachable through the prototype chain.
    Verbs,
    /// `(entity, verb, ...args)` nested verb call sharing this invocation's gas.
    Call,
    /// `(verb, args, delay_ms, repeat_ms?)` run a verb on `this` later.
    Schedule,
    /// `(task_id)` drop a pending task this entity scheduled.
    Cancel,
}

#[async_trait::async_trait]
impl Opcode for WorldOp {
    fn name(&self) -> &str {
        match self {
            WorldOp::Get => "world.get",
            WorldOp::Props => "world.props",
            WorldOp::Prop => "world.prop",
            WorldOp::Create => "world.create",
            WorldOp::Verbs => "world.verbs",
            WorldOp::Call => "world.call",
            WorldOp::Schedule => "world.schedule",
            WorldOp::Cancel => "world.cancel",
        }
    }

    fn category(&self) -> &str { CATEGORY }

    fn arity(&self) -> Arity {
        match self {
            WorldOp::Get | WorldOp::Props | WorldOp::Verbs | WorldOp::Cancel => Arity::Fixed(1),
            WorldOp::Prop => Arity::Fixed(2),
            WorldOp::Create => Arity::Range(1, 2),
            WorldOp::Call => Arity::Variadic { min: 2 },
            WorldOp::Schedule => Arity::Range(3, 4),
        }
    }

    fn is_async(&self) -> bool {
        !matches!(self, WorldOp::Schedule | WorldOp::Cancel)
    }

    fn required_capability(&self) -> Option<&str> {
        match self {
            WorldOp::Create => Some(CREATE_CAPABILITY),
            _ => None,
        }
    }

    async fn call(&self, mut args: Vec<Value>, ctx: &mut ExecContext) -> Result<Value> {
        let opcode = self.name();
        let services = ctx.services()?;
        let world = &services.world;

        match self {
            WorldOp::Get => {
                let id = entity(opcode, &args, 0)?;
                world.entity(id).await?;
                Ok(Value::Entity(id))
            }
            WorldOp::Props => {
                let target = world.entity(entity(opcode, &args, 0)?).await?;
                let resolved = world.resolve_props(&target).await?;
                Ok(Value::from_json(&serde_json::Value::Object(resolved)))
            }
            WorldOp::Prop => {
                let target = world.entity(entity(opcode, &args, 0)?).await?;
                let key = string(opcode, &args, 1)?;
                let value = world.resolve_prop(&target, key).await?;
                Ok(value.as_ref().map(Value::from_json).unwrap_or(Value::Null))
            }
            WorldOp::Create => {
                let creator = ctx.this_entity()?;
                let initial = props(opcode, &args, 0)?;
                let prototype = match arg(&args, 1) {
                    Value::Null => None,
                    _ => Some(entity(opcode, &args, 1)?),
                };
                let id = world.create_entity(Some(creator), prototype, initial).await?;
                Ok(Value::Entity(id))
            }
            WorldOp::Verbs => {
                let target = world.entity(entity(opcode, &args, 0)?).await?;
                let names = world.verb_names(&target).await?;
                Ok(Value::list(names.into_iter().map(Value::from).collect()))
            }
            WorldOp::Call => {
                let target = entity(opcode, &args, 0)?;
                let verb = string(opcode, &args, 1)?.to_string();
                let rest = args.split_off(2);
                call_verb(ctx, target, &verb, rest).await
            }
            WorldOp::Schedule => {
                let this = ctx.this_entity()?;
                let verb = string(opcode, &args, 0)?.to_string();
                let frozen = match arg(&args, 1) {
                    Value::Null => Vec::new(),
                    Value::List(items) => Value::all_to_json(&items.read())?,
                    other => {
                        return Err(ScriptError::type_error(
                            opcode,
                            format!("arguments must be a list, got {}", other.type_name()),
                        ))
                    }
                };
                let delay_ms = non_negative(opcode, number(opcode, &args, 2)?)?;
                let repeat_ms = match arg(&args, 3) {
                    Value::Null => None,
                    _ => Some(non_negative(opcode, number(opcode, &args, 3)?)?.max(1)),
                };
                let id = services.task_sink()?.schedule(TaskRequest {
                    entity_id: this,
                    verb: verb.clone(),
                    args: frozen,
                    delay_ms,
                    repeat_ms,
                });
                debug!(entity = this, verb = %verb, task = id, delay_ms, "task scheduled from script");
                Ok(Value::Number(id as f64))
            }
            WorldOp::Cancel => {
                let this = ctx.this_entity()?;
                let id = integer(opcode, &args, 0)?;
                // only tasks scheduled by this entity
                let cancelled = match u64::try_from(id) {
                    Ok(id) => services.task_sink()?.cancel(this, id),
                    Err(_) => false,
                };
                Ok(Value::Bool(cancelled))
            }
        }
    }
}

fn non_negative(opcode: &str, ms: f64) -> Result<u64> {
    if ms < 0.0 || !ms.is_finite() {
        return Err(ScriptError::type_error(opcode, "milliseconds must be a non-negative number"));
    }
    Ok(ms as u64)
}
