//! Tendril Engine - opcode registry, interpreter, compiler and kernel
//!
//! Scripts are [`Expr`](tendril_core::Expr) trees. The same tree can be run
//! by the tree-walking [`interpreter`] or turned into closures by the
//! [`compiler`]; both dispatch to the opcodes in an [`OpcodeRegistry`] and
//! must produce the same results.

pub mod compiler;
pub mod context;
pub mod function;
pub mod interpreter;
pub mod kernel;
pub mod opcode;
pub mod opcodes;
pub mod registry;
pub mod scope;
pub mod value;

pub use compiler::{compile, Program};
pub use context::ExecContext;
pub use function::Callable;
pub use interpreter::evaluate;
pub use kernel::{Kernel, Services, TaskRequest, TaskSink};
pub use opcode::{Arity, Evaluation, NativeOpcode, Opcode, Thunk};
pub use registry::{OpcodeMetadata, OpcodeRegistry};
pub use scope::Scope;
pub use value::Value;

/// Operator spellings and the opcodes they stand for.
pub const OPERATOR_ALIASES: &[(&str, &str)] = &[
    ("+", "math.add"),
    ("-", "math.sub"),
    ("*", "math.mul"),
    ("/", "math.div"),
    ("%", "math.mod"),
    ("==", "bool.eq"),
    ("!=", "bool.neq"),
    ("<", "bool.lt"),
    ("<=", "bool.lte"),
    (">", "bool.gt"),
    (">=", "bool.gte"),
];

/// Create a registry with every standard library and operator alias.
pub fn create_default_registry() -> OpcodeRegistry {
    let mut registry = OpcodeRegistry::new();
    registry.register_library(opcodes::stdlib::library());
    registry.register_library(opcodes::logic::library());
    registry.register_library(opcodes::math::library());
    registry.register_library(opcodes::list::library());
    registry.register_library(opcodes::object::library());
    registry.register_library(opcodes::text::library());
    registry.register_library(opcodes::json::library());
    registry.register_library(opcodes::time::library());
    registry.register_library(opcodes::world::library());
    registry.register_library(opcodes::capability::library());

    for (alias, target) in OPERATOR_ALIASES {
        if !registry.alias(alias, target) {
            tracing::warn!(alias, target, "alias target missing");
        }
    }
    tracing::debug!(opcodes = registry.len(), "default registry created");
    registry
}
