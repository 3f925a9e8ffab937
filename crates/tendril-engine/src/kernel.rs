//! Invocation entry point
//!
//! `Kernel::invoke(target, verb, args, caller)` hydrates the target and
//! caller, finds the verb through the prototype chain, checks the verb's
//! required capability against the caller, and runs the verb with the
//! configured strategy. Scheduler firings and nested `world.call`s go
//! through the same path.

use crate::compiler::{compile, Program};
use crate::context::ExecContext;
use crate::interpreter::evaluate;
use crate::registry::OpcodeRegistry;
use crate::value::Value;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tendril_core::{EngineConfig, EntityId, Expr, Result, ScriptError, Strategy, TaskId};
use tendril_world::{CapabilityClasses, Entity, Props, SeedTask, VerbRow, World};
use tracing::{debug, info};

/// A request to run a verb later, produced by `world.schedule`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub entity_id: EntityId,
    pub verb: String,
    /// Arguments frozen as plain data at scheduling time.
    pub args: Vec<serde_json::Value>,
    pub delay_ms: u64,
    pub repeat_ms: Option<u64>,
}

impl From<&SeedTask> for TaskRequest {
    fn from(task: &SeedTask) -> Self {
        Self {
            entity_id: task.entity_id,
            verb: task.verb.clone(),
            args: task.args.clone(),
            delay_ms: task.delay_ms,
            repeat_ms: task.repeat_ms,
        }
    }
}

/// Where scheduled work goes. Implemented by the scheduler.
pub trait TaskSink: Send + Sync {
    fn schedule(&self, request: TaskRequest) -> TaskId;

    /// Drops a task `owner` scheduled. Returns false when no such task is
    /// pending or it belongs to another entity.
    fn cancel(&self, owner: EntityId, id: TaskId) -> bool;
}

/// Everything an invocation may reach besides its own context.
pub struct Services {
    pub world: World,
    pub classes: Arc<CapabilityClasses>,
    pub config: EngineConfig,
    tasks: RwLock<Option<Weak<dyn TaskSink>>>,
    programs: DashMap<(EntityId, String), Arc<Program>>,
}

impl Services {
    pub fn new(world: World, classes: Arc<CapabilityClasses>, config: EngineConfig) -> Self {
        Self { world, classes, config, tasks: RwLock::new(None), programs: DashMap::new() }
    }

    pub fn task_sink(&self) -> Result<Arc<dyn TaskSink>> {
        self.tasks
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| ScriptError::external("scheduler", "no scheduler attached"))
    }

    /// Compiled form of a verb, cached per defining entity and name and
    /// rebuilt when the stored code changes.
    fn program(&self, verb: &VerbRow, registry: &OpcodeRegistry) -> Arc<Program> {
        let key = (verb.entity_id, verb.name.clone());
        if let Some(cached) = self.programs.get(&key) {
            if cached.expr() == &verb.code {
                return cached.clone();
            }
        }
        let program = Arc::new(compile(&verb.code, registry));
        self.programs.insert(key, program.clone());
        debug!(entity = verb.entity_id, verb = %verb.name, "verb compiled");
        program
    }
}

pub struct Kernel {
    registry: Arc<OpcodeRegistry>,
    services: Arc<Services>,
}

impl Kernel {
    pub fn new(
        registry: Arc<OpcodeRegistry>,
        world: World,
        classes: Arc<CapabilityClasses>,
        config: EngineConfig,
    ) -> Self {
        Self { registry, services: Arc::new(Services::new(world, classes, config)) }
    }

    pub fn registry(&self) -> &Arc<OpcodeRegistry> {
        &self.registry
    }

    pub fn world(&self) -> &World {
        &self.services.world
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn strategy(&self) -> Strategy {
        self.services.config.strategy
    }

    /// Attach the scheduler. Only a weak reference is kept, since the
    /// scheduler itself holds the kernel.
    pub fn set_task_sink(&self, sink: Arc<dyn TaskSink>) {
        *self.services.tasks.write() = Some(Arc::downgrade(&sink));
    }

    /// A fresh context wired to this kernel's world and limits.
    pub fn context(&self, this: Option<EntityId>, caller: Option<EntityId>, args: Vec<Value>) -> ExecContext {
        let mut ctx = ExecContext::new(self.registry.clone())
            .with_args(args)
            .with_gas(self.services.config.gas_limit)
            .with_max_depth(self.services.config.max_call_depth)
            .with_max_nesting(self.services.config.max_nesting)
            .with_services(self.services.clone());
        ctx.this = this;
        ctx.caller = caller;
        ctx
    }

    /// Run `verb` on `target` on behalf of `caller`.
    pub async fn invoke(
        &self,
        target: EntityId,
        verb: &str,
        args: Vec<Value>,
        caller: EntityId,
    ) -> Result<Value> {
        let world = &self.services.world;
        let target_entity = world.entity(target).await?;
        world.entity(caller).await?;
        let verb_row = find_verb(world, &target_entity, verb).await?;
        authorize_verb(world, &verb_row, caller).await?;

        debug!(target, verb, caller, "invoking verb");
        let mut ctx = self.context(Some(target), Some(caller), args);
        let result = run_verb(&self.services, &verb_row, &mut ctx).await;
        debug!(target, verb, gas_used = ctx.budget() - ctx.gas(), ok = result.is_ok(), "verb finished");
        result
    }

    /// Evaluate a free-standing expression as `this`, with the given strategy.
    pub async fn eval(&self, expr: &Expr, this: Option<EntityId>, strategy: Strategy) -> Result<Value> {
        let mut ctx = self.context(this, this, Vec::new());
        run(expr, strategy, &mut ctx).await
    }
}

/// Evaluate `expr` in `ctx` with either strategy.
pub async fn run(expr: &Expr, strategy: Strategy, ctx: &mut ExecContext) -> Result<Value> {
    match strategy {
        Strategy::Interpret => evaluate(expr, ctx).await,
        Strategy::Compile => compile(expr, &ctx.registry).run(ctx).await,
    }
}

async fn find_verb(world: &World, target: &Entity, verb: &str) -> Result<VerbRow> {
    world
        .find_verb(target, verb)
        .await?
        .ok_or_else(|| ScriptError::not_found(format!("verb {} on entity {}", verb, target.id)))
}

async fn authorize_verb(world: &World, verb: &VerbRow, caller: EntityId) -> Result<()> {
    if let Some(cap_type) = &verb.required_capability {
        if world.get_capability(caller, cap_type, &Props::new()).await?.is_none() {
            info!(verb = %verb.name, caller, required = %cap_type, "verb call denied");
            return Err(ScriptError::denied(format!(
                "verb {} requires {}",
                verb.name, cap_type
            )));
        }
    }
    Ok(())
}

async fn run_verb(services: &Services, verb: &VerbRow, ctx: &mut ExecContext) -> Result<Value> {
    match services.config.strategy {
        Strategy::Interpret => evaluate(&verb.code, ctx).await,
        Strategy::Compile => {
            let program = services.program(verb, &ctx.registry);
            program.run(ctx).await
        }
    }
}

/// Call a verb from inside a running script. The callee runs as `target`
/// with the current entity as caller and draws on the same gas budget.
pub async fn call_verb(ctx: &mut ExecContext, target: EntityId, verb: &str, args: Vec<Value>) -> Result<Value> {
    let services = ctx.services()?;
    let caller = ctx.this_entity()?;
    let world = &services.world;
    let target_entity = world.entity(target).await?;
    let verb_row = find_verb(world, &target_entity, verb).await?;
    authorize_verb(world, &verb_row, caller).await?;

    let mut nested = ctx.nested(target, args)?;
    let result = run_verb(&services, &verb_row, &mut nested).await;
    ctx.absorb(&nested);
    result
}
