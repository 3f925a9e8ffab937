//! `cap` library. Capability values are unforgeable references: scripts
//! obtain them only from these opcodes, and every use re-reads the token
//! and checks that the current entity still owns it.

use super::{arg, entity, props, string};
use crate::context::ExecContext;
use crate::opcode::{Arity, Opcode};
use crate::value::Value;
use std::sync::Arc;
use tendril_core::{Result, ScriptError};
use tendril_world::{Capability, Props};

const CATEGORY: &str = "cap";

pub fn library() -> Vec<Arc<dyn Opcode>> {
    [
        CapOp::Get,
        CapOp::Has,
        CapOp::List,
        CapOp::Mint,
        CapOp::Delegate,
        CapOp::Give,
        CapOp::Type,
        CapOp::Params,
    ]
    .into_iter()
    .map(|op| Arc::new(op) as Arc<dyn Opcode>)
    .collect()
}

fn capability(opcode: &str, args: &[Value], i: usize) -> Result<Arc<Capability>> {
    match arg(args, i) {
        Value::Capability(cap) => Ok(cap.clone()),
        other => Err(ScriptError::type_error(
            opcode,
            format!("argument {} must be a capability, got {}", i + 1, other.type_name()),
        )),
    }
}

#[derive(Clone, Copy)]
enum CapOp {
    /// `(type, request?)` best matching capability of `this`, or null.
    Get,
    /// `(type, request?)`
    Has,
    /// `()` every capability `this` owns.
    List,
    /// `(authority, type, params)`
    Mint,
    /// `(parent, restrictions)`
    Delegate,
    /// `(capability, entity)`
    Give,
    Type,
    Params,
}

#[async_trait::async_trait]
impl Opcode for CapOp {
    fn name(&self) -> &str {
        match self {
            CapOp::Get => "cap.get",
            CapOp::Has => "cap.has",
            CapOp::List => "cap.list",
            CapOp::Mint => "cap.mint",
            CapOp::Delegate => "cap.delegate",
            CapOp::Give => "cap.give",
            CapOp::Type => "cap.type",
            CapOp::Params => "cap.params",
        }
    }

    fn category(&self) -> &str { CATEGORY }

    fn arity(&self) -> Arity {
        match self {
            CapOp::Get | CapOp::Has => Arity::Range(1, 2),
            CapOp::List => Arity::Fixed(0),
            CapOp::Mint => Arity::Fixed(3),
            CapOp::Delegate | CapOp::Give => Arity::Fixed(2),
            CapOp::Type | CapOp::Params => Arity::Fixed(1),
        }
    }

    fn is_async(&self) -> bool {
        !matches!(self, CapOp::Type | CapOp::Params)
    }

    async fn call(&self, args: Vec<Value>, ctx: &mut ExecContext) -> Result<Value> {
        let opcode = self.name();

        // Pure accessors on a token the script already holds.
        match self {
            CapOp::Type => return Ok(Value::string(&capability(opcode, &args, 0)?.cap_type)),
            CapOp::Params => {
                let cap = capability(opcode, &args, 0)?;
                return Ok(Value::from_json(&serde_json::Value::Object(cap.params.clone())));
            }
            _ => {}
        }

        let services = ctx.services()?;
        let world = &services.world;
        let this = ctx.this_entity()?;

        match self {
            CapOp::Get | CapOp::Has => {
                let cap_type = string(opcode, &args, 0)?;
                let request = request(opcode, &args)?;
                let found = world.get_capability(this, cap_type, &request).await?;
                Ok(match (self, found) {
                    (CapOp::Has, found) => Value::Bool(found.is_some()),
                    (_, Some(cap)) => Value::Capability(Arc::new(cap)),
                    (_, None) => Value::Null,
                })
            }
            CapOp::List => {
                let owned = world.capabilities(this).await?;
                Ok(Value::list(owned.into_iter().map(|cap| Value::Capability(Arc::new(cap))).collect()))
            }
            CapOp::Mint => {
                let authority = capability(opcode, &args, 0)?;
                let cap_type = string(opcode, &args, 1)?;
                let params = props(opcode, &args, 2)?;
                let minted = world.mint(this, &authority.id, cap_type, params).await?;
                Ok(Value::Capability(Arc::new(minted)))
            }
            CapOp::Delegate => {
                let parent = capability(opcode, &args, 0)?;
                let restrictions = props(opcode, &args, 1)?;
                let child = world.delegate(this, &parent.id, restrictions).await?;
                Ok(Value::Capability(Arc::new(child)))
            }
            CapOp::Give => {
                let cap = capability(opcode, &args, 0)?;
                let recipient = entity(opcode, &args, 1)?;
                world.give(this, &cap.id, recipient).await?;
                Ok(Value::Null)
            }
            CapOp::Type | CapOp::Params => Err(ScriptError::Internal(format!("{} handled above", opcode))),
        }
    }
}

fn request(opcode: &str, args: &[Value]) -> Result<Props> {
    props(opcode, args, 1)
}
