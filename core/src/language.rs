use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::rc::Rc;

use im::{HashMap as ImHashMap, HashSet as ImHashSet, Vector as ImVector};
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::environment::Environment;
use crate::interner::InternedSymbol;
use crate::native::NativeFn;

// ============================================================================
// Names
// ============================================================================

/// A possibly namespace-qualified name, shared by symbols and keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Name {
    pub namespace: Option<InternedSymbol>,
    pub name: InternedSymbol,
}

impl Name {
    pub fn simple(name: &str) -> Self {
        Name {
            namespace: None,
            name: InternedSymbol::new(name),
        }
    }

    pub fn qualified(namespace: &str, name: &str) -> Self {
        Name {
            namespace: Some(InternedSymbol::new(namespace)),
            name: InternedSymbol::new(name),
        }
    }

    /// Split `ns/name` on the first slash. A lone `/` and names with a
    /// leading or trailing slash stay unqualified.
    pub fn parse(text: &str) -> Self {
        match text.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => Name::qualified(ns, name),
            _ => Name::simple(text),
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.namespace.is_some()
    }

    /// Keywords written `::kw` keep a leading colon in their name until
    /// evaluation substitutes the active module.
    pub fn is_auto_namespaced(&self) -> bool {
        self.namespace.is_none() && self.name.with_str(|s| s.starts_with(':'))
    }

    pub fn name_str(&self) -> String {
        self.name.resolve()
    }

    pub fn namespace_str(&self) -> Option<String> {
        self.namespace.map(|ns| ns.resolve())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

// ============================================================================
// Collections
// ============================================================================

/// Ordered list used for code and data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ListValue {
    pub elements: Vec<Value>,
}

/// Vector value - fast vector using Vec
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct VectorValue {
    pub elements: Vec<Value>,
}

/// Persistent vector - immutable with structural sharing using im::Vector
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistentVector {
    pub elements: ImVector<Value>,
}

impl Hash for PersistentVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.elements.len());
        for elem in &self.elements {
            elem.hash(state);
        }
    }
}

/// Map value - fast hash map using FxHash
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapValue {
    pub entries: FxHashMap<Value, Value>,
}

impl Hash for MapValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_unordered_pairs(self.entries.iter(), self.entries.len(), state);
    }
}

/// Persistent map - immutable with structural sharing using im::HashMap
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistentMap {
    pub entries: ImHashMap<Value, Value>,
}

impl Hash for PersistentMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_unordered_pairs(self.entries.iter(), self.entries.len(), state);
    }
}

/// Set value - fast hash set using FxHash
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetValue {
    pub elements: FxHashSet<Value>,
}

impl Hash for SetValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_unordered(self.elements.iter(), self.elements.len(), state);
    }
}

/// Persistent set - immutable with structural sharing using im::HashSet
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistentSet {
    pub elements: ImHashSet<Value>,
}

impl Hash for PersistentSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_unordered(self.elements.iter(), self.elements.len(), state);
    }
}

// Hash by sorting on the printed form so iteration order does not leak in.
fn hash_unordered<'a, H: Hasher>(items: impl Iterator<Item = &'a Value>, len: usize, state: &mut H) {
    let mut printed: Vec<String> = items.map(|v| v.to_string()).collect();
    printed.sort();
    state.write_usize(len);
    printed.hash(state);
}

fn hash_unordered_pairs<'a, H: Hasher>(
    pairs: impl Iterator<Item = (&'a Value, &'a Value)>,
    len: usize,
    state: &mut H,
) {
    let mut printed: Vec<(String, String)> =
        pairs.map(|(k, v)| (k.to_string(), v.to_string())).collect();
    printed.sort();
    state.write_usize(len);
    printed.hash(state);
}

// ============================================================================
// Callables
// ============================================================================

/// Number of arguments a lambda clause accepts.
///
/// Ordered so that exact clauses sort before variadic ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arity {
    Exact(usize),
    /// At least this many positional arguments; the rest are collected.
    AtLeast(usize),
}

impl Arity {
    /// Signed encoding: `n` for exactly `n`, `-(n + 1)` for at least `n`.
    pub fn key(&self) -> i64 {
        match *self {
            Arity::Exact(n) => n as i64,
            Arity::AtLeast(n) => -(n as i64) - 1,
        }
    }

    pub fn accepts(&self, argc: usize) -> bool {
        match *self {
            Arity::Exact(n) => argc == n,
            Arity::AtLeast(n) => argc >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// One body of a (possibly overloaded) lambda.
#[derive(Debug, Clone)]
pub struct Clause {
    pub arity: Arity,
    pub params: Vec<InternedSymbol>,
    pub rest: Option<InternedSymbol>,
    pub body: Vec<Value>,
}

pub struct LambdaCell {
    pub id: usize,
    pub clauses: BTreeMap<Arity, Clause>,
    pub env: Environment,
    /// Module active where the lambda was created; its body runs there.
    pub context: ModuleContext,
    /// The `lambda` form itself, used when printing.
    pub source: Value,
    /// Name given by `define`/`define-macro`, for stack traces and errors.
    pub ident: RefCell<Option<Name>>,
}

impl LambdaCell {
    pub fn display_name(&self) -> String {
        match *self.ident.borrow() {
            Some(name) => name.to_string(),
            None => format!("lambda-{}", self.id),
        }
    }

    pub fn arities(&self) -> Vec<Arity> {
        self.clauses.keys().copied().collect()
    }
}

// Environment holds a RefCell and may be cyclic through closures.
impl fmt::Debug for LambdaCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaCell")
            .field("id", &self.id)
            .field("arities", &self.arities())
            .field("ident", &self.ident.borrow())
            .finish()
    }
}

/// Native function exposed to programs.
pub struct NativeFunction {
    pub name: &'static str,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// A named set of methods that can be mixed into a type's method table.
#[derive(Debug)]
pub struct ProtocolValue {
    pub name: Name,
    pub methods: Vec<(String, Value)>,
}

/// A record type: positional fields plus a shared method table.
#[derive(Debug)]
pub struct TypeValue {
    pub name: Name,
    pub fields: Vec<InternedSymbol>,
    pub parent: Option<Rc<TypeValue>>,
    pub methods: RefCell<FxHashMap<String, Value>>,
    /// Protocols installed so far, in installation order.
    pub mixins: RefCell<Vec<Name>>,
}

impl TypeValue {
    pub fn new(name: Name, fields: Vec<InternedSymbol>, parent: Option<Rc<TypeValue>>) -> Self {
        TypeValue {
            name,
            fields,
            parent,
            methods: RefCell::new(FxHashMap::default()),
            mixins: RefCell::new(Vec::new()),
        }
    }

    /// Look a method up on this type, then on its ancestors.
    pub fn method(&self, name: &str) -> Option<Value> {
        if let Some(m) = self.methods.borrow().get(name) {
            return Some(m.clone());
        }
        self.parent.as_ref().and_then(|p| p.method(name))
    }

    pub fn is_subtype_of(self: &Rc<Self>, other: &Rc<TypeValue>) -> bool {
        let mut current = Some(self.clone());
        while let Some(ty) = current {
            if Rc::ptr_eq(&ty, other) {
                return true;
            }
            current = ty.parent.clone();
        }
        false
    }
}

/// An instance of a `TypeValue`, or a host object.
#[derive(Debug)]
pub struct ObjectValue {
    pub class: Rc<TypeValue>,
    pub fields: RefCell<BTreeMap<String, Value>>,
}

impl ObjectValue {
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        self.fields.borrow_mut().insert(name.into(), value);
    }
}

/// Compiled regular expression literal.
#[derive(Debug)]
pub struct RegexValue {
    pub regex: Regex,
}

// ============================================================================
// Modules
// ============================================================================

/// A namespace node's payload: its name and its own scope.
#[derive(Debug)]
pub struct Module {
    pub name: Name,
    pub scope: Environment,
}

/// The module that unqualified definitions and fallback lookups target,
/// threaded explicitly through evaluation alongside the environment.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    pub module: Rc<Module>,
    /// Directory `require` resolves relative paths against.
    pub dir: Option<PathBuf>,
}

impl ModuleContext {
    pub fn new(module: Rc<Module>, dir: Option<PathBuf>) -> Self {
        ModuleContext { module, dir }
    }

    pub fn module_name(&self) -> Name {
        self.module.name
    }
}

// ============================================================================
// Value
// ============================================================================

#[derive(Clone, Debug)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Name),
    /// Self-evaluating keyword, printed with a leading colon.
    Keyword(Name),
    List(Rc<ListValue>),
    /// Fast vector (Vec-based)
    Vector(Rc<VectorValue>),
    /// Fast map (FxHashMap-based)
    Map(Rc<MapValue>),
    /// Fast set (FxHashSet-based)
    Set(Rc<SetValue>),
    /// Persistent vector with structural sharing (im::Vector)
    PersistentVector(Rc<PersistentVector>),
    /// Persistent map with structural sharing (im::HashMap)
    PersistentMap(Rc<PersistentMap>),
    /// Persistent set with structural sharing (im::HashSet)
    PersistentSet(Rc<PersistentSet>),
    Quoted(Rc<Value>),
    Regex(Rc<RegexValue>),
    Lambda(Rc<LambdaCell>),
    NativeFn(Rc<NativeFunction>),
    Protocol(Rc<ProtocolValue>),
    Type(Rc<TypeValue>),
    Object(Rc<ObjectValue>),
    Module(Rc<Module>),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn symbol(text: &str) -> Value {
        Value::Symbol(Name::parse(text))
    }

    pub fn keyword(text: &str) -> Value {
        Value::Keyword(Name::parse(text))
    }

    pub fn list(elements: Vec<Value>) -> Value {
        Value::List(Rc::new(ListValue { elements }))
    }

    pub fn vector(elements: Vec<Value>) -> Value {
        Value::Vector(Rc::new(VectorValue { elements }))
    }

    pub fn quoted(form: Value) -> Value {
        Value::Quoted(Rc::new(form))
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_symbol(&self) -> Option<&Name> {
        match self {
            Value::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Elements of a list, vector or persistent vector.
    pub fn sequential_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(list) => Some(list.elements.clone()),
            Value::Vector(vec) => Some(vec.elements.clone()),
            Value::PersistentVector(vec) => Some(vec.elements.iter().cloned().collect()),
            _ => None,
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Value::Vector(_) | Value::PersistentVector(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_) | Value::PersistentMap(_))
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Value::Set(_) | Value::PersistentSet(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::List(_) => "list",
            Value::Vector(_) | Value::PersistentVector(_) => "vector",
            Value::Map(_) | Value::PersistentMap(_) => "map",
            Value::Set(_) | Value::PersistentSet(_) => "set",
            Value::Quoted(_) => "quoted",
            Value::Regex(_) => "regex",
            Value::Lambda(_) => "lambda",
            Value::NativeFn(_) => "native-fn",
            Value::Protocol(_) => "protocol",
            Value::Type(_) => "type",
            Value::Object(_) => "object",
            Value::Module(_) => "module",
        }
    }
}

fn number_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

// Manual PartialEq: data compares structurally, runtime objects by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => number_eq(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::PersistentVector(a), Value::PersistentVector(b)) => a == b,
            (Value::PersistentMap(a), Value::PersistentMap(b)) => a == b,
            (Value::PersistentSet(a), Value::PersistentSet(b)) => a == b,
            (Value::Quoted(a), Value::Quoted(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a.regex.as_str() == b.regex.as_str(),
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFn(a), Value::NativeFn(b)) => Rc::ptr_eq(a, b),
            (Value::Protocol(a), Value::Protocol(b)) => Rc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => {
                // -0.0 == 0.0, so they must hash alike
                let n = if *n == 0.0 { 0.0 } else { *n };
                n.to_bits().hash(state)
            }
            Value::String(s) => s.hash(state),
            Value::Symbol(n) | Value::Keyword(n) => n.hash(state),
            Value::List(l) => l.hash(state),
            Value::Vector(v) => v.hash(state),
            Value::Map(m) => m.hash(state),
            Value::Set(s) => s.hash(state),
            Value::PersistentVector(v) => v.hash(state),
            Value::PersistentMap(m) => m.hash(state),
            Value::PersistentSet(s) => s.hash(state),
            Value::Quoted(q) => q.hash(state),
            Value::Regex(r) => r.regex.as_str().hash(state),
            Value::Lambda(l) => (Rc::as_ptr(l) as usize).hash(state),
            Value::NativeFn(f) => (Rc::as_ptr(f) as usize).hash(state),
            Value::Protocol(p) => (Rc::as_ptr(p) as usize).hash(state),
            Value::Type(t) => (Rc::as_ptr(t) as usize).hash(state),
            Value::Object(o) => (Rc::as_ptr(o) as usize).hash(state),
            Value::Module(m) => (Rc::as_ptr(m) as usize).hash(state),
        }
    }
}

// ============================================================================
// Display Implementation
// ============================================================================

fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '\r' => result.push_str("\\r"),
            '\u{0B}' => result.push_str("\\v"),
            '\u{08}' => result.push_str("\\b"),
            '\u{0C}' => result.push_str("\\f"),
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            c => result.push(c),
        }
    }
    result
}

/// Integral numbers print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format!("{n}")
    }
}

fn write_seq<'a>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: impl Iterator<Item = &'a Value>,
    close: &str,
) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, elem) in items.enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{elem}")?;
    }
    write!(f, "{close}")
}

fn write_map<'a>(
    f: &mut fmt::Formatter<'_>,
    entries: impl Iterator<Item = (&'a Value, &'a Value)>,
) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (k, v)) in entries.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{k} {v}")?;
    }
    write!(f, "}}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "\"{}\"", escape_string(s)),
            Value::Symbol(name) => write!(f, "{name}"),
            Value::Keyword(name) => write!(f, ":{name}"),
            Value::List(list) => write_seq(f, "(", list.elements.iter(), ")"),
            Value::Vector(vec) => write_seq(f, "[", vec.elements.iter(), "]"),
            Value::PersistentVector(vec) => write_seq(f, "[", vec.elements.iter(), "]"),
            Value::Map(map) => write_map(f, map.entries.iter()),
            Value::PersistentMap(map) => write_map(f, map.entries.iter()),
            Value::Set(set) => write_seq(f, "#{", set.elements.iter(), "}"),
            Value::PersistentSet(set) => write_seq(f, "#{", set.elements.iter(), "}"),
            Value::Quoted(form) => write!(f, "'{form}"),
            Value::Regex(re) => write!(f, "#\"{}\"", re.regex.as_str()),
            Value::Lambda(lambda) => match *lambda.ident.borrow() {
                Some(name) => write!(f, "#<lambda {name}>"),
                None => write!(f, "{}", lambda.source),
            },
            Value::NativeFn(native) => write!(f, "#<native {}>", native.name),
            Value::Protocol(protocol) => write!(f, "#<protocol {}>", protocol.name),
            Value::Type(ty) => write!(f, "#<type {}>", ty.name),
            Value::Object(obj) => {
                write!(f, "#<{}", obj.class.name)?;
                for (k, v) in obj.fields.borrow().iter() {
                    write!(f, " {k}={v}")?;
                }
                write!(f, ">")
            }
            Value::Module(module) => write!(f, "#<module {}>", module.name),
        }
    }
}
