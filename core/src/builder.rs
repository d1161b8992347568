//! Literal builders: how the reader materializes what it parsed.
//!
//! The grammar never constructs collections directly. It hands element
//! lists to a `LiteralBuilder`, so the same reader can produce FxHash/Vec
//! backed values or `im`-backed persistent values.

use std::rc::Rc;

use im::{HashMap as ImHashMap, HashSet as ImHashSet, Vector as ImVector};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::language::{
    ListValue, MapValue, Name, PersistentMap, PersistentSet, PersistentVector, SetValue, Value,
    VectorValue,
};

/// Which representation collection literals take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionMode {
    #[default]
    Native,
    Persistent,
}

impl CollectionMode {
    pub fn builder(self) -> &'static dyn LiteralBuilder {
        match self {
            CollectionMode::Native => &NativeBuilder,
            CollectionMode::Persistent => &PersistentBuilder,
        }
    }
}

pub trait LiteralBuilder {
    fn mode(&self) -> CollectionMode;

    fn vector(&self, elements: Vec<Value>) -> Value;

    fn map(&self, entries: Vec<(Value, Value)>) -> Value;

    fn set(&self, elements: Vec<Value>) -> Value;

    // Scalars and lists look the same in every representation.

    fn nil(&self) -> Value {
        Value::Nil
    }

    fn boolean(&self, value: bool) -> Value {
        Value::Bool(value)
    }

    fn number(&self, value: f64) -> Value {
        Value::Number(value)
    }

    fn string(&self, value: &str) -> Value {
        Value::string(value)
    }

    fn symbol(&self, name: Name) -> Value {
        Value::Symbol(name)
    }

    fn keyword(&self, name: Name) -> Value {
        Value::Keyword(name)
    }

    fn quoted(&self, form: Value) -> Value {
        Value::quoted(form)
    }

    fn list(&self, elements: Vec<Value>) -> Value {
        Value::List(Rc::new(ListValue { elements }))
    }
}

/// Vec and FxHash backed collections.
pub struct NativeBuilder;

impl LiteralBuilder for NativeBuilder {
    fn mode(&self) -> CollectionMode {
        CollectionMode::Native
    }

    fn vector(&self, elements: Vec<Value>) -> Value {
        Value::Vector(Rc::new(VectorValue { elements }))
    }

    fn map(&self, entries: Vec<(Value, Value)>) -> Value {
        let entries: FxHashMap<Value, Value> = entries.into_iter().collect();
        Value::Map(Rc::new(MapValue { entries }))
    }

    fn set(&self, elements: Vec<Value>) -> Value {
        let elements: FxHashSet<Value> = elements.into_iter().collect();
        Value::Set(Rc::new(SetValue { elements }))
    }
}

/// `im` backed collections with structural sharing.
pub struct PersistentBuilder;

impl LiteralBuilder for PersistentBuilder {
    fn mode(&self) -> CollectionMode {
        CollectionMode::Persistent
    }

    fn vector(&self, elements: Vec<Value>) -> Value {
        let elements: ImVector<Value> = elements.into_iter().collect();
        Value::PersistentVector(Rc::new(PersistentVector { elements }))
    }

    fn map(&self, entries: Vec<(Value, Value)>) -> Value {
        let entries: ImHashMap<Value, Value> = entries.into_iter().collect();
        Value::PersistentMap(Rc::new(PersistentMap { entries }))
    }

    fn set(&self, elements: Vec<Value>) -> Value {
        let elements: ImHashSet<Value> = elements.into_iter().collect();
        Value::PersistentSet(Rc::new(PersistentSet { elements }))
    }
}
