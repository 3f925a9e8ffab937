//! Opcode definitions
//!
//! Each opcode is a self-contained unit implementing [`Opcode`]. Simple
//! eager opcodes are described by a [`NativeOpcode`] table entry; opcodes
//! that suspend, apply functions or control evaluation implement the trait
//! directly.

use crate::context::ExecContext;
use crate::value::Value;
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tendril_core::{Expr, Result, ScriptError};

/// How an opcode receives its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Evaluation {
    /// All arguments evaluated left to right before the handler runs.
    Eager,
    /// The handler receives deferred sub-expressions and decides what to
    /// evaluate, and when.
    Lazy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arity {
    Fixed(usize),
    Range(usize, usize),
    Variadic { min: usize },
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Fixed(k) => n == k,
            Arity::Range(lo, hi) => n >= lo && n <= hi,
            Arity::Variadic { min } => n >= min,
        }
    }

    pub fn check(&self, opcode: &str, got: usize) -> Result<()> {
        if self.accepts(got) {
            Ok(())
        } else {
            Err(ScriptError::Arity { opcode: opcode.to_string(), expected: self.to_string(), got })
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Arity::Fixed(k) => write!(f, "{}", k),
            Arity::Range(lo, hi) => write!(f, "{}..={}", lo, hi),
            Arity::Variadic { min } => write!(f, "{}+", min),
        }
    }
}

/// A deferred sub-expression handed to a lazy opcode. The interpreter
/// wraps raw expressions; the compiler wraps precompiled closures. Either
/// way `eval` charges gas exactly as evaluating the expression in place.
pub trait Thunk: Send + Sync {
    /// The sub-expression as written.
    fn expr(&self) -> &Expr;

    fn eval<'a>(&'a self, ctx: &'a mut ExecContext) -> BoxFuture<'a, Result<Value>>;
}

#[async_trait::async_trait]
pub trait Opcode: Send + Sync {
    /// Namespaced name (e.g. "list.push").
    fn name(&self) -> &str;

    /// Library the opcode belongs to, for tooling.
    fn category(&self) -> &str;

    fn arity(&self) -> Arity;

    /// Whether the handler may suspend on I/O.
    fn is_async(&self) -> bool { false }

    /// Capability type the invoking entity must hold to use this opcode.
    fn required_capability(&self) -> Option<&str> { None }

    fn evaluation(&self) -> Evaluation { Evaluation::Eager }

    /// Eager entry point.
    async fn call(&self, _args: Vec<Value>, _ctx: &mut ExecContext) -> Result<Value> {
        Err(ScriptError::Internal(format!("{} is lazy and has no eager entry point", self.name())))
    }

    /// Lazy entry point.
    async fn call_lazy(&self, _args: &[Arc<dyn Thunk>], _ctx: &mut ExecContext) -> Result<Value> {
        Err(ScriptError::Internal(format!("{} is eager and has no lazy entry point", self.name())))
    }
}

pub type NativeHandler = fn(&str, &[Value], &mut ExecContext) -> Result<Value>;

/// A synchronous, eager opcode backed by a plain function.
#[derive(Clone, Copy)]
pub struct NativeOpcode {
    pub name: &'static str,
    pub category: &'static str,
    pub arity: Arity,
    pub handler: NativeHandler,
}

impl NativeOpcode {
    pub const fn new(name: &'static str, category: &'static str, arity: Arity, handler: NativeHandler) -> Self {
        Self { name, category, arity, handler }
    }
}

#[async_trait::async_trait]
impl Opcode for NativeOpcode {
    fn name(&self) -> &str { self.name }

    fn category(&self) -> &str { self.category }

    fn arity(&self) -> Arity { self.arity }

    async fn call(&self, args: Vec<Value>, ctx: &mut ExecContext) -> Result<Value> {
        (self.handler)(self.name, &args, ctx)
    }
}

/// Another name for an existing opcode (`"+"` for `math.add`).
pub struct Alias {
    name: String,
    target: Arc<dyn Opcode>,
}

impl Alias {
    pub fn new(name: impl Into<String>, target: Arc<dyn Opcode>) -> Self {
        Self { name: name.into(), target }
    }

    pub fn target(&self) -> &str { self.target.name() }
}

#[async_trait::async_trait]
impl Opcode for Alias {
    fn name(&self) -> &str { &self.name }

    fn category(&self) -> &str { self.target.category() }

    fn arity(&self) -> Arity { self.target.arity() }

    fn is_async(&self) -> bool { self.target.is_async() }

    fn required_capability(&self) -> Option<&str> { self.target.required_capability() }

    fn evaluation(&self) -> Evaluation { self.target.evaluation() }

    async fn call(&self, args: Vec<Value>, ctx: &mut ExecContext) -> Result<Value> {
        self.target.call(args, ctx).await
    }

    async fn call_lazy(&self, args: &[Arc<dyn Thunk>], ctx: &mut ExecContext) -> Result<Value> {
        self.target.call_lazy(args, ctx).await
    }
}
