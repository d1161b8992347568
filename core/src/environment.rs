//! Environment for variable bindings
//!
//! The Environment is a lexical scope that holds variable bindings.
//! It forms a chain of scopes, with child environments referencing their parents.
//! Each binding may carry a metadata map (`:macro`, `:private`, `:doc`, ...).

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{LispError, TraceFrame};
use crate::interner::InternedSymbol;
use crate::language::Value;

// ============================================================================
// Metadata
// ============================================================================

/// Keyword-keyed annotations attached to a definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: FxHashMap<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// True when the key is present with a truthy value.
    pub fn flag(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(Value::is_truthy)
    }

    pub fn merge(&mut self, other: &Metadata) {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub meta: Option<Metadata>,
}

// ============================================================================
// Environment
// ============================================================================

// Internal state holding the data and parent pointer
#[derive(Debug, Default)]
struct Frame {
    data: FxHashMap<InternedSymbol, Binding>,
    parent: Option<Environment>,
    ident: Option<String>,
    source: Option<String>,
    location: (usize, usize),
}

/// Environment for variable bindings.
///
/// The Environment is cheap to clone (just an Rc increment). Closures keep
/// their defining frame alive through it.
#[derive(Clone, Debug)]
pub struct Environment {
    state: Rc<RefCell<Frame>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Create a new, empty root environment
    pub fn new() -> Self {
        Environment {
            state: Rc::new(RefCell::new(Frame::default())),
        }
    }

    /// Create an empty child environment extending the current one
    pub fn extend(&self) -> Self {
        let parent = self.state.borrow();
        Environment {
            state: Rc::new(RefCell::new(Frame {
                parent: Some(self.clone()),
                source: parent.source.clone(),
                ..Frame::default()
            })),
        }
    }

    /// Create a child environment binding `params` to `args` positionally
    pub fn extend_with(&self, params: &[InternedSymbol], args: &[Value]) -> Self {
        let child = self.extend();
        {
            let mut state = child.state.borrow_mut();
            for (param, arg) in params.iter().zip(args.iter()) {
                state.data.insert(
                    *param,
                    Binding {
                        value: arg.clone(),
                        meta: None,
                    },
                );
            }
        }
        child
    }

    pub fn parent(&self) -> Option<Environment> {
        self.state.borrow().parent.clone()
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Find the nearest frame (this one or an ancestor) binding `name`.
    pub fn lookup(&self, name: InternedSymbol) -> Option<Environment> {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            if env.state.borrow().data.contains_key(&name) {
                return Some(env);
            }
            current = env.parent();
        }
        None
    }

    /// Value of the nearest binding of `name`.
    pub fn get(&self, name: InternedSymbol) -> Option<Value> {
        self.binding(name).map(|b| b.value)
    }

    /// Nearest binding of `name`, metadata included.
    pub fn binding(&self, name: InternedSymbol) -> Option<Binding> {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            if let Some(binding) = env.state.borrow().data.get(&name) {
                return Some(binding.clone());
            }
            current = env.parent();
        }
        None
    }

    /// Binding of `name` in this frame only.
    pub fn own(&self, name: InternedSymbol) -> Option<Binding> {
        self.state.borrow().data.get(&name).cloned()
    }

    pub fn has_own(&self, name: InternedSymbol) -> bool {
        self.state.borrow().data.contains_key(&name)
    }

    /// Define a variable in the CURRENT scope.
    ///
    /// Without a value the name is bound to nil, unless it is already bound
    /// here, in which case the existing value is kept. Metadata replaces
    /// what was there only when given.
    pub fn define(&self, name: InternedSymbol, value: Option<Value>, meta: Option<Metadata>) {
        let mut state = self.state.borrow_mut();
        match state.data.get_mut(&name) {
            Some(existing) => {
                if let Some(value) = value {
                    existing.value = value;
                }
                if meta.is_some() {
                    existing.meta = meta;
                }
            }
            None => {
                state.data.insert(
                    name,
                    Binding {
                        value: value.unwrap_or(Value::Nil),
                        meta,
                    },
                );
            }
        }
    }

    /// Rebind the nearest existing binding of `name`.
    pub fn set(&self, name: InternedSymbol, value: Value) -> Result<(), LispError> {
        let scope = self.lookup(name).ok_or_else(|| LispError::undefined(name))?;
        let mut state = scope.state.borrow_mut();
        if let Some(binding) = state.data.get_mut(&name) {
            binding.value = value;
        }
        Ok(())
    }

    /// Names bound in this frame only.
    pub fn names(&self) -> Vec<InternedSymbol> {
        self.state.borrow().data.keys().copied().collect()
    }

    pub fn set_ident(&self, ident: impl Into<String>) {
        self.state.borrow_mut().ident = Some(ident.into());
    }

    pub fn ident(&self) -> Option<String> {
        self.state.borrow().ident.clone()
    }

    pub fn set_source(&self, source: impl Into<String>) {
        self.state.borrow_mut().source = Some(source.into());
    }

    pub fn source(&self) -> Option<String> {
        self.state.borrow().source.clone()
    }

    pub fn set_location(&self, line: usize, column: usize) {
        self.state.borrow_mut().location = (line, column);
    }

    /// Frames from this scope outward, one per identified scope.
    pub fn stacktrace(&self) -> Vec<TraceFrame> {
        let mut trace = Vec::new();
        let mut current = Some(self.clone());
        while let Some(env) = current {
            {
                let state = env.state.borrow();
                if let Some(ident) = &state.ident {
                    trace.push(TraceFrame {
                        source: state.source.clone(),
                        ident: ident.clone(),
                        line: state.location.0,
                        column: state.location.1,
                    });
                }
            }
            current = env.parent();
        }
        trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> InternedSymbol {
        InternedSymbol::new(s)
    }

    #[test]
    fn lookup_finds_the_defining_frame() {
        let root = Environment::new();
        root.define(sym("x"), Some(Value::Number(1.0)), None);
        let child = root.extend();
        let found = child.lookup(sym("x")).expect("x should be found");
        assert!(found.ptr_eq(&root));
        assert!(child.lookup(sym("missing")).is_none());
    }

    #[test]
    fn define_without_value_keeps_existing_binding() {
        let env = Environment::new();
        env.define(sym("y"), Some(Value::Number(5.0)), None);
        env.define(sym("y"), None, None);
        assert_eq!(env.get(sym("y")), Some(Value::Number(5.0)));

        env.define(sym("z"), None, None);
        assert_eq!(env.get(sym("z")), Some(Value::Nil));
    }

    #[test]
    fn set_mutates_the_nearest_binding() {
        let root = Environment::new();
        root.define(sym("counter"), Some(Value::Number(0.0)), None);
        let child = root.extend();
        child.set(sym("counter"), Value::Number(3.0)).unwrap();
        assert_eq!(root.get(sym("counter")), Some(Value::Number(3.0)));
    }

    #[test]
    fn set_on_unbound_name_is_an_error() {
        let env = Environment::new();
        let err = env.set(sym("nope"), Value::Nil).unwrap_err();
        assert_eq!(err.to_string(), "Undefined variable: 'nope'");
    }

    #[test]
    fn metadata_flags_survive_redefinition() {
        let env = Environment::new();
        let meta = Metadata::new().with("macro", Value::Bool(true));
        env.define(sym("m"), Some(Value::Nil), Some(meta));
        env.define(sym("m"), Some(Value::Number(1.0)), None);
        let binding = env.binding(sym("m")).unwrap();
        assert!(binding.meta.unwrap().flag("macro"));
    }

    #[test]
    fn stacktrace_lists_identified_scopes_innermost_first() {
        let root = Environment::new();
        root.set_source("main.ws");
        let outer = root.extend();
        outer.set_ident("outer");
        outer.set_location(1, 1);
        let inner = outer.extend();
        inner.set_ident("inner");
        inner.set_location(4, 2);

        let trace = inner.stacktrace();
        let idents: Vec<_> = trace.iter().map(|f| f.ident.as_str()).collect();
        assert_eq!(idents, ["inner", "outer"]);
        assert_eq!(trace[0].source.as_deref(), Some("main.ws"));
    }
}
