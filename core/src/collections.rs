//! Collection operations consumed by the evaluator and the standard natives.
//!
//! The evaluator never inspects collection internals itself; it goes
//! through a `CollectionOps` implementation. `StandardCollections` covers
//! both the native (Vec/FxHash) and persistent (`im`) representations and
//! builds new collections in the representation its mode selects.

// Value is used as a hash key; lambdas and objects hash by identity.
#![allow(clippy::mutable_key_type)]

use std::rc::Rc;

use unicode_segmentation::UnicodeSegmentation;

use crate::builder::{CollectionMode, LiteralBuilder};
use crate::error::LispError;
use crate::language::{
    MapValue, PersistentMap, PersistentSet, PersistentVector, SetValue, Value, VectorValue,
};

/// Callback used by the higher-order operations to apply a procedure.
pub type Apply<'a> = dyn FnMut(Vec<Value>) -> Result<Value, LispError> + 'a;

pub trait CollectionOps {
    fn mode(&self) -> CollectionMode;

    // Constructors
    fn list(&self, items: Vec<Value>) -> Value;
    fn vector(&self, items: Vec<Value>) -> Value;
    fn hash_map(&self, entries: Vec<(Value, Value)>) -> Value;
    fn hash_set(&self, items: Vec<Value>) -> Value;

    /// Elements of any seqable value, in iteration order.
    fn items(&self, coll: &Value) -> Result<Vec<Value>, LispError>;

    fn cons(&self, item: Value, coll: &Value) -> Result<Value, LispError>;
    fn first(&self, coll: &Value) -> Result<Value, LispError>;
    fn rest(&self, coll: &Value) -> Result<Value, LispError>;
    fn count(&self, coll: &Value) -> Result<usize, LispError>;
    fn nth(&self, coll: &Value, index: usize) -> Result<Value, LispError>;

    fn get(&self, coll: &Value, key: &Value) -> Value;
    fn assoc(&self, coll: &Value, key: Value, value: Value) -> Result<Value, LispError>;
    fn dissoc(&self, coll: &Value, key: &Value) -> Result<Value, LispError>;
    fn merge(&self, maps: &[Value]) -> Result<Value, LispError>;
    fn conj(&self, coll: &Value, item: Value) -> Result<Value, LispError>;
    fn concat(&self, colls: &[Value]) -> Result<Value, LispError>;
    fn contains(&self, coll: &Value, key: &Value) -> bool;

    fn map(&self, f: &mut Apply<'_>, coll: &Value) -> Result<Value, LispError>;
    fn filter(&self, pred: &mut Apply<'_>, coll: &Value) -> Result<Value, LispError>;
    fn reduce(
        &self,
        f: &mut Apply<'_>,
        init: Option<Value>,
        coll: &Value,
    ) -> Result<Value, LispError>;

    fn equals(&self, a: &Value, b: &Value) -> bool;
}

/// The collection capability for both representations.
pub struct StandardCollections {
    builder: &'static dyn LiteralBuilder,
}

impl StandardCollections {
    pub fn new(mode: CollectionMode) -> Self {
        StandardCollections {
            builder: mode.builder(),
        }
    }

    fn index_of(key: &Value) -> Option<usize> {
        match key {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
            _ => None,
        }
    }

    fn pair(&self, k: &Value, v: &Value) -> Value {
        self.builder.vector(vec![k.clone(), v.clone()])
    }

    fn map_entries(&self, coll: &Value) -> Option<Vec<(Value, Value)>> {
        match coll {
            Value::Map(map) => Some(
                map.entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            Value::PersistentMap(map) => Some(
                map.entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl Default for StandardCollections {
    fn default() -> Self {
        Self::new(CollectionMode::Native)
    }
}

impl CollectionOps for StandardCollections {
    fn mode(&self) -> CollectionMode {
        self.builder.mode()
    }

    fn list(&self, items: Vec<Value>) -> Value {
        self.builder.list(items)
    }

    fn vector(&self, items: Vec<Value>) -> Value {
        self.builder.vector(items)
    }

    fn hash_map(&self, entries: Vec<(Value, Value)>) -> Value {
        self.builder.map(entries)
    }

    fn hash_set(&self, items: Vec<Value>) -> Value {
        self.builder.set(items)
    }

    fn items(&self, coll: &Value) -> Result<Vec<Value>, LispError> {
        match coll {
            Value::Nil => Ok(Vec::new()),
            Value::List(_) | Value::Vector(_) | Value::PersistentVector(_) => {
                Ok(coll.sequential_items().unwrap_or_default())
            }
            Value::Set(set) => Ok(set.elements.iter().cloned().collect()),
            Value::PersistentSet(set) => Ok(set.elements.iter().cloned().collect()),
            Value::Map(_) | Value::PersistentMap(_) => Ok(self
                .map_entries(coll)
                .unwrap_or_default()
                .iter()
                .map(|(k, v)| self.pair(k, v))
                .collect()),
            Value::String(s) => Ok(s.graphemes(true).map(Value::string).collect()),
            other => Err(LispError::type_error(format!(
                "Don't know how to create a sequence from {other}"
            ))),
        }
    }

    fn cons(&self, item: Value, coll: &Value) -> Result<Value, LispError> {
        let mut items = Vec::with_capacity(1);
        items.push(item);
        items.extend(self.items(coll)?);
        Ok(self.builder.list(items))
    }

    fn first(&self, coll: &Value) -> Result<Value, LispError> {
        match coll {
            Value::List(list) => Ok(list.elements.first().cloned().unwrap_or(Value::Nil)),
            Value::Vector(vec) => Ok(vec.elements.first().cloned().unwrap_or(Value::Nil)),
            Value::PersistentVector(vec) => Ok(vec.elements.front().cloned().unwrap_or(Value::Nil)),
            _ => Ok(self.items(coll)?.into_iter().next().unwrap_or(Value::Nil)),
        }
    }

    fn rest(&self, coll: &Value) -> Result<Value, LispError> {
        let items = self.items(coll)?;
        Ok(self.builder.list(items.into_iter().skip(1).collect()))
    }

    fn count(&self, coll: &Value) -> Result<usize, LispError> {
        match coll {
            Value::Nil => Ok(0),
            Value::List(list) => Ok(list.elements.len()),
            Value::Vector(vec) => Ok(vec.elements.len()),
            Value::PersistentVector(vec) => Ok(vec.elements.len()),
            Value::Map(map) => Ok(map.entries.len()),
            Value::PersistentMap(map) => Ok(map.entries.len()),
            Value::Set(set) => Ok(set.elements.len()),
            Value::PersistentSet(set) => Ok(set.elements.len()),
            Value::String(s) => Ok(s.graphemes(true).count()),
            other => Err(LispError::type_error(format!(
                "count not supported on {}",
                other.type_name()
            ))),
        }
    }

    fn nth(&self, coll: &Value, index: usize) -> Result<Value, LispError> {
        match coll {
            Value::Vector(vec) => Ok(vec.elements.get(index).cloned().unwrap_or(Value::Nil)),
            Value::PersistentVector(vec) => {
                Ok(vec.elements.get(index).cloned().unwrap_or(Value::Nil))
            }
            _ => Ok(self.items(coll)?.into_iter().nth(index).unwrap_or(Value::Nil)),
        }
    }

    fn get(&self, coll: &Value, key: &Value) -> Value {
        match coll {
            Value::Map(map) => map.entries.get(key).cloned().unwrap_or(Value::Nil),
            Value::PersistentMap(map) => map.entries.get(key).cloned().unwrap_or(Value::Nil),
            Value::Set(set) if set.elements.contains(key) => key.clone(),
            Value::PersistentSet(set) if set.elements.contains(key) => key.clone(),
            Value::Vector(vec) => Self::index_of(key)
                .and_then(|i| vec.elements.get(i).cloned())
                .unwrap_or(Value::Nil),
            Value::PersistentVector(vec) => Self::index_of(key)
                .and_then(|i| vec.elements.get(i).cloned())
                .unwrap_or(Value::Nil),
            Value::String(s) => Self::index_of(key)
                .and_then(|i| s.graphemes(true).nth(i))
                .map_or(Value::Nil, Value::string),
            Value::Object(obj) => match key {
                Value::Keyword(name) => obj.field(&name.name_str()).unwrap_or(Value::Nil),
                Value::String(s) => obj.field(s).unwrap_or(Value::Nil),
                _ => Value::Nil,
            },
            _ => Value::Nil,
        }
    }

    fn assoc(&self, coll: &Value, key: Value, value: Value) -> Result<Value, LispError> {
        match coll {
            Value::Nil => Ok(self.builder.map(vec![(key, value)])),
            Value::Map(map) => {
                let mut entries = map.entries.clone();
                entries.insert(key, value);
                Ok(Value::Map(Rc::new(MapValue { entries })))
            }
            Value::PersistentMap(map) => Ok(Value::PersistentMap(Rc::new(PersistentMap {
                entries: map.entries.update(key, value),
            }))),
            Value::Vector(vec) => {
                let idx = Self::index_of(&key)
                    .ok_or_else(|| LispError::type_error("Vector assoc requires integer key"))?;
                let mut elements = vec.elements.clone();
                match idx.cmp(&elements.len()) {
                    std::cmp::Ordering::Less => elements[idx] = value,
                    std::cmp::Ordering::Equal => elements.push(value),
                    std::cmp::Ordering::Greater => {
                        return Err(LispError::type_error(format!(
                            "Index {idx} out of bounds for vector of length {}",
                            elements.len()
                        )));
                    }
                }
                Ok(Value::Vector(Rc::new(VectorValue { elements })))
            }
            Value::PersistentVector(vec) => {
                let idx = Self::index_of(&key)
                    .ok_or_else(|| LispError::type_error("Vector assoc requires integer key"))?;
                let len = vec.elements.len();
                let elements = if idx < len {
                    vec.elements.update(idx, value)
                } else if idx == len {
                    let mut elements = vec.elements.clone();
                    elements.push_back(value);
                    elements
                } else {
                    return Err(LispError::type_error(format!(
                        "Index {idx} out of bounds for vector of length {len}"
                    )));
                };
                Ok(Value::PersistentVector(Rc::new(PersistentVector { elements })))
            }
            other => Err(LispError::type_error(format!("Cannot assoc on {other}"))),
        }
    }

    fn dissoc(&self, coll: &Value, key: &Value) -> Result<Value, LispError> {
        match coll {
            Value::Nil => Ok(Value::Nil),
            Value::Map(map) => {
                let mut entries = map.entries.clone();
                entries.remove(key);
                Ok(Value::Map(Rc::new(MapValue { entries })))
            }
            Value::PersistentMap(map) => Ok(Value::PersistentMap(Rc::new(PersistentMap {
                entries: map.entries.without(key),
            }))),
            other => Err(LispError::type_error(format!("Cannot dissoc on {other}"))),
        }
    }

    fn merge(&self, maps: &[Value]) -> Result<Value, LispError> {
        let mut result = Value::Nil;
        for map in maps {
            if matches!(map, Value::Nil) {
                continue;
            }
            let entries = self
                .map_entries(map)
                .ok_or_else(|| LispError::type_error(format!("Cannot merge {map}")))?;
            if matches!(result, Value::Nil) {
                result = map.clone();
                continue;
            }
            for (k, v) in entries {
                result = self.assoc(&result, k, v)?;
            }
        }
        Ok(result)
    }

    fn conj(&self, coll: &Value, item: Value) -> Result<Value, LispError> {
        match coll {
            Value::Nil | Value::List(_) => self.cons(item, coll),
            Value::Vector(vec) => {
                let mut elements = vec.elements.clone();
                elements.push(item);
                Ok(Value::Vector(Rc::new(VectorValue { elements })))
            }
            Value::PersistentVector(vec) => {
                let mut elements = vec.elements.clone();
                elements.push_back(item);
                Ok(Value::PersistentVector(Rc::new(PersistentVector { elements })))
            }
            Value::Set(set) => {
                let mut elements = set.elements.clone();
                elements.insert(item);
                Ok(Value::Set(Rc::new(SetValue { elements })))
            }
            Value::PersistentSet(set) => Ok(Value::PersistentSet(Rc::new(PersistentSet {
                elements: set.elements.update(item),
            }))),
            Value::Map(_) | Value::PersistentMap(_) => match item.sequential_items() {
                Some(pair) if pair.len() == 2 => {
                    let mut pair = pair.into_iter();
                    let key = pair.next().unwrap_or(Value::Nil);
                    let value = pair.next().unwrap_or(Value::Nil);
                    self.assoc(coll, key, value)
                }
                _ => Err(LispError::type_error(
                    "Map conj requires a [key value] pair",
                )),
            },
            other => Err(LispError::type_error(format!("Cannot conj onto {other}"))),
        }
    }

    fn concat(&self, colls: &[Value]) -> Result<Value, LispError> {
        let mut items = Vec::new();
        for coll in colls {
            items.extend(self.items(coll)?);
        }
        Ok(self.builder.list(items))
    }

    fn contains(&self, coll: &Value, key: &Value) -> bool {
        match coll {
            Value::Map(map) => map.entries.contains_key(key),
            Value::PersistentMap(map) => map.entries.contains_key(key),
            Value::Set(set) => set.elements.contains(key),
            Value::PersistentSet(set) => set.elements.contains(key),
            Value::Vector(vec) => Self::index_of(key).is_some_and(|i| i < vec.elements.len()),
            Value::PersistentVector(vec) => {
                Self::index_of(key).is_some_and(|i| i < vec.elements.len())
            }
            _ => false,
        }
    }

    fn map(&self, f: &mut Apply<'_>, coll: &Value) -> Result<Value, LispError> {
        let results = self
            .items(coll)?
            .into_iter()
            .map(|item| f(vec![item]))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.builder.list(results))
    }

    fn filter(&self, pred: &mut Apply<'_>, coll: &Value) -> Result<Value, LispError> {
        let mut kept = Vec::new();
        for item in self.items(coll)? {
            if pred(vec![item.clone()])?.is_truthy() {
                kept.push(item);
            }
        }
        Ok(self.builder.list(kept))
    }

    fn reduce(
        &self,
        f: &mut Apply<'_>,
        init: Option<Value>,
        coll: &Value,
    ) -> Result<Value, LispError> {
        let mut items = self.items(coll)?.into_iter();
        let mut acc = match init {
            Some(init) => init,
            None => match items.next() {
                Some(first) => first,
                None => return f(Vec::new()),
            },
        };
        for item in items {
            acc = f(vec![acc, item])?;
        }
        Ok(acc)
    }

    /// Sequential collections compare by elements regardless of kind, as do
    /// native and persistent maps and sets.
    fn equals(&self, a: &Value, b: &Value) -> bool {
        if let (Some(xs), Some(ys)) = (a.sequential_items(), b.sequential_items()) {
            return xs.len() == ys.len() && xs.iter().zip(&ys).all(|(x, y)| self.equals(x, y));
        }
        if let (Some(xs), Some(ys)) = (self.map_entries(a), self.map_entries(b)) {
            return xs.len() == ys.len()
                && xs.iter().all(|(k, v)| {
                    ys.iter()
                        .find(|(k2, _)| self.equals(k, k2))
                        .is_some_and(|(_, v2)| self.equals(v, v2))
                });
        }
        if a.is_set() && b.is_set() {
            return match (self.items(a), self.items(b)) {
                (Ok(xs), Ok(ys)) => {
                    xs.len() == ys.len() && xs.iter().all(|x| ys.iter().any(|y| self.equals(x, y)))
                }
                _ => false,
            };
        }
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn first_and_rest_of_empty_collections() {
        let ops = StandardCollections::default();
        assert_eq!(ops.first(&Value::Nil).unwrap(), Value::Nil);
        assert_eq!(ops.rest(&Value::Nil).unwrap(), Value::list(vec![]));
    }

    #[test]
    fn conj_adds_where_the_collection_prefers() {
        let ops = StandardCollections::default();
        let list = Value::list(vec![num(2.0)]);
        assert_eq!(
            ops.conj(&list, num(1.0)).unwrap(),
            Value::list(vec![num(1.0), num(2.0)])
        );
        let vec = Value::vector(vec![num(1.0)]);
        assert_eq!(
            ops.conj(&vec, num(2.0)).unwrap(),
            Value::vector(vec![num(1.0), num(2.0)])
        );
    }

    #[test]
    fn assoc_in_persistent_mode_stays_persistent() {
        let ops = StandardCollections::new(CollectionMode::Persistent);
        let map = ops.assoc(&Value::Nil, Value::keyword("a"), num(1.0)).unwrap();
        assert!(matches!(map, Value::PersistentMap(_)));
        let map = ops.assoc(&map, Value::keyword("b"), num(2.0)).unwrap();
        assert_eq!(ops.count(&map).unwrap(), 2);
        assert_eq!(ops.get(&map, &Value::keyword("b")), num(2.0));
    }

    #[test]
    fn string_count_uses_graphemes() {
        let ops = StandardCollections::default();
        assert_eq!(ops.count(&Value::string("e\u{301}a")).unwrap(), 2);
    }

    #[test]
    fn reduce_without_init_uses_first_element() {
        let ops = StandardCollections::default();
        let mut add = |args: Vec<Value>| -> Result<Value, LispError> {
            let sum = args.iter().map(|a| match a {
                Value::Number(n) => *n,
                _ => 0.0,
            });
            Ok(Value::Number(sum.sum()))
        };
        let coll = Value::list(vec![num(1.0), num(2.0), num(3.0)]);
        assert_eq!(ops.reduce(&mut add, None, &coll).unwrap(), num(6.0));
        assert_eq!(ops.reduce(&mut add, None, &Value::Nil).unwrap(), num(0.0));
    }

    #[test]
    fn lists_and_vectors_with_same_elements_are_equal() {
        let ops = StandardCollections::default();
        let list = Value::list(vec![num(1.0), num(2.0)]);
        let vec = Value::vector(vec![num(1.0), num(2.0)]);
        assert!(ops.equals(&list, &vec));
        assert!(!ops.equals(&list, &Value::vector(vec![num(1.0)])));
    }

    #[test]
    fn dissoc_and_merge() {
        let ops = StandardCollections::default();
        let a = ops.hash_map(vec![(Value::keyword("a"), num(1.0))]);
        let b = ops.hash_map(vec![(Value::keyword("b"), num(2.0))]);
        let merged = ops.merge(&[a, Value::Nil, b]).unwrap();
        assert_eq!(ops.count(&merged).unwrap(), 2);
        let smaller = ops.dissoc(&merged, &Value::keyword("a")).unwrap();
        assert_eq!(ops.get(&smaller, &Value::keyword("a")), Value::Nil);
    }
}
