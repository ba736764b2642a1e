//! The per-invocation environment chain.
//!
//! Every variable reference resolves against an [`Env`]: a small stack of
//! frames, most recent first. Loops and calls push fresh frames that link
//! back to the enclosing one; nothing is ever mutated in an outer frame.
//! Frames live on the Rust stack for exactly one iteration or call, so
//! building one is a couple of map inserts, not a clone of the chain.

use std::collections::HashMap;

use crate::value::Value;

/// Loop bookkeeping carried by a `foreach` frame, addressable through the
/// loop variable via `index($v)` / `isFirst($v)` / `isLast($v)`.
#[derive(Debug, Clone)]
pub struct LoopFrame {
    pub var: String,
    pub index: usize,
    pub len: usize,
}

/// One frame of the lookup chain.
///
/// A frame holds locally-introduced bindings (loop variables, call params),
/// optionally the caller-supplied data value (only on the root frame of a
/// call), and a link to the enclosing frame.
#[derive(Debug, Default)]
pub struct Env<'a> {
    vars: HashMap<String, Value>,
    loop_frame: Option<LoopFrame>,
    data: Option<&'a Value>,
    parent: Option<&'a Env<'a>>,
}

impl<'a> Env<'a> {
    /// Root environment of a top-level render: lookups read straight from
    /// the supplied data value.
    pub fn from_data(data: &'a Value) -> Env<'a> {
        Env {
            data: Some(data),
            ..Env::default()
        }
    }

    /// Environment of a call with no `data` attribute: params only.
    pub fn call_empty(params: HashMap<String, Value>) -> Env<'a> {
        Env {
            vars: params,
            ..Env::default()
        }
    }

    /// Environment of a `data="all"` call: params in front of the whole
    /// caller chain.
    pub fn call_all(parent: &'a Env<'a>, params: HashMap<String, Value>) -> Env<'a> {
        Env {
            vars: params,
            parent: Some(parent),
            ..Env::default()
        }
    }

    /// Environment of a `data="expr"` call: params in front of the
    /// evaluated data value.
    pub fn call_with_data(data: &'a Value, params: HashMap<String, Value>) -> Env<'a> {
        Env {
            vars: params,
            data: Some(data),
            ..Env::default()
        }
    }

    /// One `foreach` iteration: the loop variable plus its metadata.
    pub fn loop_iteration(
        parent: &'a Env<'a>,
        var: &str,
        value: Value,
        index: usize,
        len: usize,
    ) -> Env<'a> {
        let mut vars = HashMap::with_capacity(1);
        vars.insert(var.to_string(), value);
        Env {
            vars,
            loop_frame: Some(LoopFrame {
                var: var.to_string(),
                index,
                len,
            }),
            parent: Some(parent),
            data: None,
        }
    }

    /// One `for` iteration: just the counter binding, no loop metadata.
    pub fn for_iteration(parent: &'a Env<'a>, var: &str, value: i64) -> Env<'a> {
        let mut vars = HashMap::with_capacity(1);
        vars.insert(var.to_string(), Value::Integer(value));
        Env {
            vars,
            parent: Some(parent),
            ..Env::default()
        }
    }

    /// Resolve a variable: own bindings first, then the data value, then
    /// the enclosing frame. Misses resolve to nothing, not an error.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.get(name) {
            return Some(value.clone());
        }
        if let Some(Value::Object(map)) = self.data {
            if let Some(value) = map.get(name) {
                return Some(value.clone());
            }
        }
        self.parent.and_then(|parent| parent.lookup(name))
    }

    /// The nearest loop frame introduced for `var`. Same-name nesting
    /// shadows the outer loop.
    pub fn loop_meta(&self, var: &str) -> Option<&LoopFrame> {
        if let Some(frame) = &self.loop_frame {
            if frame.var == var {
                return Some(frame);
            }
        }
        self.parent.and_then(|parent| parent.loop_meta(var))
    }

    /// Whether the outermost supplied data of the current call is
    /// non-empty. Loop frames and param layers do not count.
    pub fn has_data(&self) -> bool {
        let mut env = self;
        while let Some(parent) = env.parent {
            env = parent;
        }
        env.data.is_some_and(|data| data.is_truthy())
    }
}
