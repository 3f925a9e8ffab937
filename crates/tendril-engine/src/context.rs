//! Execution context
//!
//! One context per top-level invocation. It owns the scope chain and the
//! gas counter; nested lambda applications push frames onto it and nested
//! verb calls borrow its gas.
//!
//! Two depth counters bound recursion: `depth` counts lambda applications
//! and verb calls, `nesting` counts expression nodes under evaluation. Both
//! strategies move them at the same points.

use crate::kernel::Services;
use crate::opcode::Opcode;
use crate::registry::OpcodeRegistry;
use crate::scope::Scope;
use crate::value::Value;
use std::sync::Arc;
use tendril_core::{EngineConfig, EntityId, Escape, Result, ScriptError};
use tendril_world::Props;

pub struct ExecContext {
    /// Entity the running verb belongs to.
    pub this: Option<EntityId>,
    /// Entity that invoked the verb.
    pub caller: Option<EntityId>,
    /// Positional invocation arguments.
    pub args: Vec<Value>,
    /// Current innermost scope frame.
    pub scope: Scope,
    pub registry: Arc<OpcodeRegistry>,
    gas: u64,
    budget: u64,
    depth: usize,
    max_depth: usize,
    nesting: usize,
    max_nesting: usize,
    /// Value carried by a `std.return` while it unwinds.
    returning: Option<Value>,
    services: Option<Arc<Services>>,
}

impl ExecContext {
    pub fn new(registry: Arc<OpcodeRegistry>) -> Self {
        let defaults = EngineConfig::default();
        Self {
            this: None,
            caller: None,
            args: Vec::new(),
            scope: Scope::root(),
            registry,
            gas: defaults.gas_limit,
            budget: defaults.gas_limit,
            depth: 0,
            max_depth: defaults.max_call_depth,
            nesting: 0,
            max_nesting: defaults.max_nesting,
            returning: None,
            services: None,
        }
    }

    pub fn with_this(mut self, this: EntityId) -> Self {
        self.this = Some(this);
        self
    }

    pub fn with_caller(mut self, caller: EntityId) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self.budget = gas;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    pub fn with_services(mut self, services: Arc<Services>) -> Self {
        self.services = Some(services);
        self
    }

    pub fn gas(&self) -> u64 { self.gas }

    pub fn budget(&self) -> u64 { self.budget }

    pub fn depth(&self) -> usize { self.depth }

    pub fn nesting(&self) -> usize { self.nesting }

    /// Spend one unit of gas for an evaluated node.
    pub fn charge(&mut self) -> Result<()> {
        if self.gas == 0 {
            return Err(ScriptError::GasExhausted { budget: self.budget });
        }
        self.gas -= 1;
        Ok(())
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(ScriptError::DepthLimit(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Charge for one expression node and descend into it. Every successful
    /// call is paired with [`ExecContext::leave_node`].
    pub(crate) fn enter_node(&mut self) -> Result<()> {
        self.charge()?;
        if self.nesting >= self.max_nesting {
            return Err(ScriptError::NestingLimit(self.max_nesting));
        }
        self.nesting += 1;
        Ok(())
    }

    pub(crate) fn leave_node(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    /// Start unwinding to the enclosing function with `value`.
    pub(crate) fn begin_return(&mut self, value: Value) -> ScriptError {
        self.returning = Some(value);
        ScriptError::Escape(Escape::Return)
    }

    /// Close an escape at a function or invocation boundary: a return
    /// yields its value, a stray break or continue is an error.
    pub(crate) fn settle(&mut self, result: Result<Value>) -> Result<Value> {
        match result {
            Err(ScriptError::Escape(Escape::Return)) => Ok(self.returning.take().unwrap_or_default()),
            Err(ScriptError::Escape(escape)) => {
                Err(ScriptError::type_error(escape.to_string(), "used outside of a loop"))
            }
            other => other,
        }
    }

    /// World services. Fails for contexts running without a world.
    pub fn services(&self) -> Result<Arc<Services>> {
        self.services
            .clone()
            .ok_or_else(|| ScriptError::external("world", "no world attached to this context"))
    }

    pub fn this_entity(&self) -> Result<EntityId> {
        self.this.ok_or_else(|| ScriptError::not_found("entity bound to this context"))
    }

    /// A context for a nested verb call on `target`. It starts with a fresh
    /// scope and the parent's remaining gas; the caller is the parent's
    /// `this`.
    pub fn nested(&self, target: EntityId, args: Vec<Value>) -> Result<ExecContext> {
        if self.depth >= self.max_depth {
            return Err(ScriptError::DepthLimit(self.max_depth));
        }
        Ok(ExecContext {
            this: Some(target),
            caller: self.this,
            args,
            scope: Scope::root(),
            registry: self.registry.clone(),
            gas: self.gas,
            budget: self.budget,
            depth: self.depth + 1,
            max_depth: self.max_depth,
            nesting: self.nesting,
            max_nesting: self.max_nesting,
            returning: None,
            services: self.services.clone(),
        })
    }

    /// Hand back gas left over by a nested context.
    pub(crate) fn absorb(&mut self, nested: &ExecContext) {
        self.gas = nested.gas;
    }

    /// Fail unless `this` holds any capability of `cap_type`.
    pub async fn require_capability(&self, cap_type: &str) -> Result<()> {
        let services = self.services()?;
        let this = self.this_entity()?;
        let found = services.world.get_capability(this, cap_type, &Props::new()).await?;
        match found {
            Some(_) => Ok(()),
            None => Err(ScriptError::denied(format!("entity {} lacks {}", this, cap_type))),
        }
    }

    pub(crate) async fn check_opcode_capability(&self, opcode: &dyn Opcode) -> Result<()> {
        match opcode.required_capability() {
            Some(cap_type) => self.require_capability(cap_type).await,
            None => Ok(()),
        }
    }
}
