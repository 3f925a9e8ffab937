//! Lexical scope frames
//!
//! A scope is a reference-counted chain of frames. Lambdas hold the frame
//! they were defined in, so later writes to captured variables stay visible
//! to them. Method frames additionally carry the receiver for `std.self`.

use crate::value::Value;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Clone)]
pub struct Scope(Arc<Frame>);

struct Frame {
    vars: RwLock<HashMap<String, Value>>,
    receiver: Option<Value>,
    parent: Option<Scope>,
}

impl Default for Scope {
    fn default() -> Self { Self::root() }
}

impl Scope {
    pub fn root() -> Self {
        Self::with_parent(None, None)
    }

    fn with_parent(parent: Option<Scope>, receiver: Option<Value>) -> Self {
        Scope(Arc::new(Frame { vars: RwLock::new(HashMap::new()), receiver, parent }))
    }

    /// A new innermost frame.
    pub fn child(&self) -> Self {
        Self::with_parent(Some(self.clone()), None)
    }

    /// A new innermost frame that binds `receiver` for `std.self`.
    pub fn method_frame(&self, receiver: Value) -> Self {
        Self::with_parent(Some(self.clone()), Some(receiver))
    }

    /// Bind in the current frame, shadowing outer bindings.
    pub fn define(&self, name: &str, value: Value) {
        self.0.vars.write().insert(name.to_string(), value);
    }

    /// Overwrite the nearest existing binding. Returns false if none exists.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            {
                let mut vars = scope.0.vars.write();
                if let Some(slot) = vars.get_mut(name) {
                    *slot = value;
                    return true;
                }
            }
            frame = scope.0.parent.as_ref();
        }
        false
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            if let Some(value) = scope.0.vars.read().get(name) {
                return Some(value.clone());
            }
            frame = scope.0.parent.as_ref();
        }
        None
    }

    /// Receiver of the nearest enclosing method frame.
    pub fn receiver(&self) -> Option<Value> {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            if let Some(receiver) = &scope.0.receiver {
                return Some(receiver.clone());
            }
            frame = scope.0.parent.as_ref();
        }
        None
    }

    /// Bindings of the current frame only.
    pub fn locals(&self) -> BTreeMap<String, Value> {
        self.0.vars.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Every visible binding, innermost winning.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let mut frames = Vec::new();
        let mut frame = Some(self);
        while let Some(scope) = frame {
            frames.push(scope);
            frame = scope.0.parent.as_ref();
        }
        let mut visible = BTreeMap::new();
        for scope in frames.into_iter().rev() {
            visible.extend(scope.locals());
        }
        visible
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frame = self.0.parent.as_ref();
        while let Some(scope) = frame {
            depth += 1;
            frame = scope.0.parent.as_ref();
        }
        depth
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
