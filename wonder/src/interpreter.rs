//! Tree-walking evaluator.
//!
//! Every evaluation call receives the form, the lexical `Environment` and
//! the `ModuleContext` naming the active module. Evaluation returns a
//! `Completion`: either a value or the `again` recursion signal, which
//! travels outward until a lambda invocation or `loop` consumes it.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use wonder_core::reader::strip_shebang;
use wonder_core::{
    Arity, Binding, CollectionOps, Environment, ErrorKind, InternedSymbol, LambdaCell,
    LiteralBuilder, LispError, ListValue, MapValue, Module, ModuleContext, Name, NativeFunction,
    PersistentMap, PersistentSet, PersistentVector, ProtocolValue, Reader, Runtime, SetValue,
    StandardCollections, TypeValue, Value,
};

use crate::forms::SpecialForm;
use crate::modules::ModuleRegistry;
use crate::options::InterpreterOptions;
use crate::types::ErrorTypes;
use crate::{host, primitives, stdlib};

/// Name of the module active when an interpreter starts.
pub const CORE_MODULE: &str = "wonder.core";

pub const VERSION: &str = "0.0.1-alpha";

/// Outcome of evaluating a form.
#[derive(Debug, Clone)]
pub enum Completion {
    Value(Value),
    /// Raised by `again`: rebind and restart the nearest lambda or loop.
    Again(Vec<Value>),
}

pub type EvalResult = Result<Completion, LispError>;

// ============================================================================
// Invocable values
// ============================================================================

/// Values that may appear in operator position.
pub enum Invocable<'a> {
    Procedure(Procedure<'a>),
    /// Maps and vectors look up their argument.
    AssociativeLookup(&'a Value),
    /// Keywords look themselves up in their argument.
    Keyword(&'a Value),
    /// Sets test membership.
    Set(&'a Value),
    /// A symbol (usually quoted) looks itself up like a keyword.
    QuotedSymbolRef(&'a Value),
}

pub enum Procedure<'a> {
    Lambda(&'a Rc<LambdaCell>),
    Native(&'a Rc<NativeFunction>),
    /// Calling a protocol installs its methods on a type.
    Mixin(&'a Rc<ProtocolValue>),
    /// Calling a type constructs an instance.
    Constructor(&'a Rc<TypeValue>),
}

impl<'a> Invocable<'a> {
    pub fn classify(value: &'a Value) -> Option<Self> {
        Some(match value {
            Value::Lambda(l) => Invocable::Procedure(Procedure::Lambda(l)),
            Value::NativeFn(f) => Invocable::Procedure(Procedure::Native(f)),
            Value::Protocol(p) => Invocable::Procedure(Procedure::Mixin(p)),
            Value::Type(t) => Invocable::Procedure(Procedure::Constructor(t)),
            Value::Map(_) | Value::PersistentMap(_) | Value::Vector(_) | Value::PersistentVector(_) => {
                Invocable::AssociativeLookup(value)
            }
            Value::Keyword(_) => Invocable::Keyword(value),
            Value::Set(_) | Value::PersistentSet(_) => Invocable::Set(value),
            Value::Symbol(_) => Invocable::QuotedSymbolRef(value),
            Value::Quoted(inner) if matches!(**inner, Value::Symbol(_)) => {
                Invocable::QuotedSymbolRef(inner)
            }
            _ => return None,
        })
    }
}

// ============================================================================
// Top-level state
// ============================================================================

/// The active module plus the scope top-level forms are evaluated in.
#[derive(Clone)]
pub(crate) struct Toplevel {
    pub ctx: ModuleContext,
    pub scope: Environment,
    module: Rc<Module>,
    /// Bindings every top-level scope of this source gets (`*file*`, `*dir*`).
    locals: Vec<(InternedSymbol, Value)>,
}

impl Toplevel {
    pub fn new(ctx: ModuleContext) -> Self {
        let scope = Self::scope_for(&ctx.module);
        Toplevel {
            module: ctx.module.clone(),
            ctx,
            scope,
            locals: Vec::new(),
        }
    }

    fn bind(&mut self, name: &str, value: Value) {
        let name = InternedSymbol::new(name);
        self.scope.define(name, Some(value.clone()), None);
        self.locals.push((name, value));
    }

    fn scope_for(module: &Rc<Module>) -> Environment {
        let scope = module.scope.extend();
        scope.set_ident(module.name.to_string());
        scope
    }

    /// Start a fresh top-level scope if a form switched modules.
    fn follow_module(&mut self) {
        if !Rc::ptr_eq(&self.module, &self.ctx.module) {
            let source = self.scope.source();
            self.module = self.ctx.module.clone();
            self.scope = Self::scope_for(&self.module);
            if let Some(source) = source {
                self.scope.set_source(source);
            }
            for (name, value) in &self.locals {
                self.scope.define(*name, Some(value.clone()), None);
            }
        }
    }
}

// ============================================================================
// Interpreter
// ============================================================================

pub struct Interpreter {
    pub(crate) global: Environment,
    pub(crate) modules: ModuleRegistry,
    pub(crate) errors: ErrorTypes,
    pub(crate) options: InterpreterOptions,
    collections: StandardCollections,
    builder: &'static dyn LiteralBuilder,
    counter: Cell<usize>,
    session: RefCell<Toplevel>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_options(InterpreterOptions::default())
    }

    pub fn with_options(options: InterpreterOptions) -> Self {
        let global = Environment::new();
        let core = Rc::new(Module {
            name: Name::simple(CORE_MODULE),
            scope: global.clone(),
        });
        let modules = ModuleRegistry::new();
        modules.insert(core.clone());

        let interp = Interpreter {
            global,
            modules,
            errors: ErrorTypes::new(),
            collections: StandardCollections::new(options.collection_mode),
            builder: options.collection_mode.builder(),
            counter: Cell::new(0),
            session: RefCell::new(Toplevel::new(ModuleContext::new(core, None))),
            options,
        };
        interp.install_globals();
        interp
    }

    fn install_globals(&self) {
        let define = |name: &str, value: Value| {
            self.global
                .define(InternedSymbol::new(name), Some(value), None)
        };
        define("*module-name*", Value::symbol(CORE_MODULE));
        define("*version*", Value::string(VERSION));
        define("*environment*", Value::keyword("development"));
        define("*platform*", Value::keyword(std::env::consts::OS));
        define(
            "*platform-version*",
            Value::string(format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)),
        );
        define("*target-language*", Value::keyword("rust"));
        define("*source*", Value::Nil);

        self.errors.install(&self.global);
        primitives::install(&self.global);
        stdlib::register_stdlib(self);
        host::install(self);
    }

    pub fn global_env(&self) -> &Environment {
        &self.global
    }

    pub fn options(&self) -> &InterpreterOptions {
        &self.options
    }

    /// Name of the module unqualified definitions currently go to.
    pub fn current_module(&self) -> Name {
        self.session.borrow().ctx.module_name()
    }

    pub(crate) fn next_id(&self) -> usize {
        let id = self.counter.get();
        self.counter.set(id + 1);
        id
    }

    // ========================================================================
    // Public entry points
    // ========================================================================

    /// Read `text` and evaluate every form, returning the last value.
    pub fn eval_str(&self, text: &str, source: &str) -> Result<Value, LispError> {
        let reader = Reader::with_builder(text, source, self.builder);
        let mut top = self.session.borrow().clone();
        self.eval_forms(reader, &mut top, true)
    }

    /// Read every form in `text` without evaluating.
    pub fn read(&self, text: &str, source: &str) -> Result<Vec<Value>, LispError> {
        Reader::with_builder(text, source, self.builder).collect()
    }

    /// Evaluate an already-read form in the active module.
    pub fn eval(&self, form: &Value) -> Result<Value, LispError> {
        let mut top = self.session.borrow().clone();
        let result = self.eval_toplevel(form, &top.scope.clone(), &mut top.ctx);
        *self.session.borrow_mut() = top;
        result
    }

    /// Evaluate an already-read form in the given environment.
    pub fn eval_with_env(&self, form: &Value, env: &Environment) -> Result<Value, LispError> {
        let mut ctx = self.session.borrow().ctx.clone();
        let result = self.eval_toplevel(form, env, &mut ctx);
        self.session.borrow_mut().ctx = ctx;
        self.session.borrow_mut().follow_module();
        result
    }

    /// Evaluate a source file. Module switches inside it stay local to it.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value, LispError> {
        let ctx = self.session.borrow().ctx.clone();
        self.eval_file(path.as_ref(), ctx)
    }

    pub(crate) fn eval_file(&self, path: &Path, mut ctx: ModuleContext) -> Result<Value, LispError> {
        let text = fs::read_to_string(path)
            .map_err(|e| LispError::io(format!("Reading file: \"{}\": {e}", path.display())))?;
        ctx.dir = path.parent().map(Path::to_path_buf);
        let source = path.display().to_string();
        let reader = Reader::with_builder(strip_shebang(&text), &source, self.builder);
        let mut top = Toplevel::new(ctx);
        let dir = path
            .parent()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();
        top.bind("*file*", Value::string(&source));
        top.bind("*dir*", Value::string(dir));
        self.eval_forms(reader, &mut top, false)
    }

    /// Evaluate every form a reader yields. With `session` set, the
    /// interpreter's own top level follows each form so natives such as
    /// `eval` see module switches made earlier in the same text.
    pub(crate) fn eval_forms(
        &self,
        mut reader: Reader,
        top: &mut Toplevel,
        session: bool,
    ) -> Result<Value, LispError> {
        top.scope.set_source(reader.source());
        let mut last = Value::Nil;
        let result = loop {
            let form = match reader.read_next() {
                Ok(Some(form)) => form,
                Ok(None) => break Ok(last),
                Err(e) => break Err(e),
            };
            top.follow_module();
            let (line, column) = reader.location();
            top.scope.set_location(line, column);
            let scope = top.scope.clone();
            let outcome = self.eval_toplevel(&form, &scope, &mut top.ctx);
            if session {
                top.follow_module();
                *self.session.borrow_mut() = top.clone();
            }
            match outcome {
                Ok(value) => last = value,
                Err(e) => break Err(e),
            }
        };
        top.follow_module();
        if session {
            *self.session.borrow_mut() = top.clone();
        }
        result
    }

    /// Evaluate one form where no lambda or loop can catch `again`.
    pub(crate) fn eval_toplevel(
        &self,
        form: &Value,
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> Result<Value, LispError> {
        match self.eval_in(form, env, ctx) {
            Ok(Completion::Value(value)) => Ok(value),
            Ok(Completion::Again(_)) => {
                Err(LispError::new(ErrorKind::UncaughtRecursionPoint).with_trace(env.stacktrace()))
            }
            Err(e) => Err(e.with_trace(env.stacktrace())),
        }
    }

    /// Apply any invocable value to evaluated arguments.
    pub fn apply(&self, func: &Value, args: Vec<Value>) -> Result<Value, LispError> {
        self.invoke(func, args, func)
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    pub fn eval_in(&self, form: &Value, env: &Environment, ctx: &mut ModuleContext) -> EvalResult {
        let form = self.macroexpand_in(form, env, ctx)?;
        match &form {
            Value::Nil | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Regex(_) => {
                Ok(Completion::Value(form))
            }
            Value::Keyword(name) => Ok(Completion::Value(self.eval_keyword(name, ctx))),
            Value::Vector(_)
            | Value::PersistentVector(_)
            | Value::Map(_)
            | Value::PersistentMap(_)
            | Value::Set(_)
            | Value::PersistentSet(_) => self.eval_collection_literal(&form, env, ctx),
            Value::Symbol(name) => self.lookup_variable(name, env, ctx).map(Completion::Value),
            Value::Quoted(inner) => Ok(Completion::Value((**inner).clone())),
            Value::List(list) => self.eval_list(list, env, ctx),
            // Runtime values spliced into code by macros stand for themselves.
            Value::Lambda(_)
            | Value::NativeFn(_)
            | Value::Protocol(_)
            | Value::Type(_)
            | Value::Object(_)
            | Value::Module(_) => Ok(Completion::Value(form)),
        }
    }

    /// Evaluate forms in order, yielding the last value (nil when empty).
    pub(crate) fn eval_body(
        &self,
        body: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let mut last = Value::Nil;
        for form in body {
            last = value!(self.eval_in(form, env, ctx));
        }
        Ok(Completion::Value(last))
    }

    /// `::kw` takes the active module as its namespace.
    fn eval_keyword(&self, name: &Name, ctx: &ModuleContext) -> Value {
        if name.is_auto_namespaced() {
            let local = name.name.with_str(|s| s.trim_start_matches(':').to_string());
            Value::Keyword(Name::qualified(&ctx.module_name().to_string(), &local))
        } else {
            Value::Keyword(*name)
        }
    }

    fn eval_collection_literal(
        &self,
        form: &Value,
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let value = match form {
            Value::Vector(vec) => {
                let mut elements = Vec::with_capacity(vec.elements.len());
                for elem in &vec.elements {
                    elements.push(value!(self.eval_in(elem, env, ctx)));
                }
                Value::vector(elements)
            }
            Value::PersistentVector(vec) => {
                let mut elements = im::Vector::new();
                for elem in &vec.elements {
                    elements.push_back(value!(self.eval_in(elem, env, ctx)));
                }
                Value::PersistentVector(Rc::new(PersistentVector { elements }))
            }
            Value::Map(map) => {
                let mut entries = FxHashMap::default();
                for (k, v) in &map.entries {
                    let k = value!(self.eval_in(k, env, ctx));
                    let v = value!(self.eval_in(v, env, ctx));
                    entries.insert(k, v);
                }
                Value::Map(Rc::new(MapValue { entries }))
            }
            Value::PersistentMap(map) => {
                let mut entries = im::HashMap::new();
                for (k, v) in &map.entries {
                    let k = value!(self.eval_in(k, env, ctx));
                    let v = value!(self.eval_in(v, env, ctx));
                    entries.insert(k, v);
                }
                Value::PersistentMap(Rc::new(PersistentMap { entries }))
            }
            Value::Set(set) => {
                let mut elements = FxHashSet::default();
                for elem in &set.elements {
                    elements.insert(value!(self.eval_in(elem, env, ctx)));
                }
                Value::Set(Rc::new(SetValue { elements }))
            }
            Value::PersistentSet(set) => {
                let mut elements = im::HashSet::new();
                for elem in &set.elements {
                    elements.insert(value!(self.eval_in(elem, env, ctx)));
                }
                Value::PersistentSet(Rc::new(PersistentSet { elements }))
            }
            other => return Err(LispError::invalid(format!("invalid form: {other}"))),
        };
        Ok(Completion::Value(value))
    }

    fn eval_list(
        &self,
        list: &Rc<ListValue>,
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let Some(head) = list.elements.first() else {
            return Ok(Completion::Value(Value::List(list.clone())));
        };
        if let Value::Symbol(name) = head
            && let Some(form) = SpecialForm::from_name(name)
        {
            return self.eval_special(form, list, env, ctx);
        }
        self.eval_application(&list.elements, env, ctx)
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// Module a qualified symbol's namespace refers to.
    pub(crate) fn qualifier_module(&self, namespace: InternedSymbol) -> Result<Rc<Module>, LispError> {
        let ns = namespace.resolve();
        self.modules
            .find(&ns)
            .ok_or_else(|| LispError::module(format!("module {ns} does not exist")))
    }

    /// Find the binding a symbol refers to: the lexical chain, then the
    /// active module, then the globals. Qualified symbols read the named
    /// module's own scope.
    pub(crate) fn resolve_binding(
        &self,
        name: &Name,
        env: &Environment,
        ctx: &ModuleContext,
    ) -> Result<Option<Binding>, LispError> {
        match name.namespace {
            Some(ns) => Ok(self.qualifier_module(ns)?.scope.own(name.name)),
            None => Ok(env
                .binding(name.name)
                .or_else(|| ctx.module.scope.binding(name.name))
                .or_else(|| self.global.binding(name.name))),
        }
    }

    /// The frame that owns a symbol's binding, for `set!`.
    pub(crate) fn binding_scope(
        &self,
        name: &Name,
        env: &Environment,
        ctx: &ModuleContext,
    ) -> Result<Option<Environment>, LispError> {
        match name.namespace {
            Some(ns) => {
                let module = self.qualifier_module(ns)?;
                Ok(module.scope.has_own(name.name).then(|| module.scope.clone()))
            }
            None => Ok(env
                .lookup(name.name)
                .or_else(|| ctx.module.scope.lookup(name.name))
                .or_else(|| self.global.lookup(name.name))),
        }
    }

    pub(crate) fn lookup_variable(
        &self,
        name: &Name,
        env: &Environment,
        ctx: &ModuleContext,
    ) -> Result<Value, LispError> {
        self.resolve_binding(name, env, ctx)?
            .map(|binding| binding.value)
            .ok_or_else(|| LispError::undefined(name))
    }

    // ========================================================================
    // Application
    // ========================================================================

    pub(crate) fn eval_application(
        &self,
        items: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let op = &items[0];
        if let Value::Symbol(name) = op
            && let Some(rewritten) = crate::forms::interop::desugar(name, items)
        {
            return self.eval_in(&rewritten, env, ctx);
        }

        let mut args = Vec::with_capacity(items.len() - 1);
        for form in &items[1..] {
            args.push(value!(self.eval_in(form, env, ctx)));
        }

        if let Value::Symbol(name) = op
            && let Some(primitive) = primitives::lookup(name)
        {
            return primitive(&args, self).map(Completion::Value);
        }

        let func = value!(self.eval_in(op, env, ctx));
        self.invoke(&func, args, op).map(Completion::Value)
    }

    /// Call `func`; `form` names the operator in error messages.
    pub(crate) fn invoke(
        &self,
        func: &Value,
        args: Vec<Value>,
        form: &Value,
    ) -> Result<Value, LispError> {
        let Some(invocable) = Invocable::classify(func) else {
            return Err(LispError::not_invocable(form));
        };
        match invocable {
            Invocable::Procedure(Procedure::Lambda(lambda)) => self.call_lambda(lambda, args),
            Invocable::Procedure(Procedure::Native(native)) => (native.func)(&args, self),
            Invocable::Procedure(Procedure::Mixin(protocol)) => self.apply_mixin(protocol, &args),
            Invocable::Procedure(Procedure::Constructor(ty)) => self.construct(ty, args),
            Invocable::AssociativeLookup(coll) => {
                wonder_core::native::expect_range(&func.to_string(), &args, 1, 2)?;
                Ok(self.lookup_or(coll, &args[0], args.get(1)))
            }
            Invocable::Keyword(key) | Invocable::QuotedSymbolRef(key) => {
                wonder_core::native::expect_range(&key.to_string(), &args, 1, 2)?;
                Ok(self.lookup_or(&args[0], key, args.get(1)))
            }
            Invocable::Set(set) => {
                wonder_core::native::expect_args(&set.to_string(), &args, 1)?;
                Ok(if self.collections.contains(set, &args[0]) {
                    args[0].clone()
                } else {
                    Value::Nil
                })
            }
        }
    }

    fn lookup_or(&self, coll: &Value, key: &Value, default: Option<&Value>) -> Value {
        match default {
            Some(default) if !self.collections.contains(coll, key) => default.clone(),
            _ => self.collections.get(coll, key),
        }
    }

    /// Arities of a callable, when it has a fixed set.
    pub fn arities_of(&self, func: &Value) -> Option<Vec<Arity>> {
        match func {
            Value::Lambda(lambda) => Some(lambda.arities()),
            Value::Type(ty) => Some(vec![Arity::Exact(ty.fields.len())]),
            Value::Protocol(_) => Some(vec![Arity::Exact(1)]),
            Value::Set(_) => Some(vec![Arity::Exact(1)]),
            Value::Keyword(_) | Value::Symbol(_) => Some(vec![Arity::Exact(1), Arity::Exact(2)]),
            v if v.is_map() || v.is_vector() => Some(vec![Arity::Exact(1), Arity::Exact(2)]),
            _ => None,
        }
    }

    pub(crate) fn collections_ref(&self) -> &StandardCollections {
        &self.collections
    }
}

// ============================================================================
// Runtime handle for natives
// ============================================================================

impl Runtime for Interpreter {
    fn apply(&self, func: &Value, args: Vec<Value>) -> Result<Value, LispError> {
        Interpreter::apply(self, func, args)
    }

    fn eval(&self, form: &Value) -> Result<Value, LispError> {
        Interpreter::eval(self, form)
    }

    fn macroexpand(&self, form: &Value) -> Result<Value, LispError> {
        let top = self.session.borrow().clone();
        self.macroexpand_in(form, &top.scope, &top.ctx)
    }

    fn collections(&self) -> &dyn CollectionOps {
        &self.collections
    }

    fn builder(&self) -> &'static dyn LiteralBuilder {
        self.builder
    }

    fn gensym(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.next_id())
    }

    fn arities(&self, func: &Value) -> Option<Vec<Arity>> {
        self.arities_of(func)
    }

    fn load_file(&self, path: &str) -> Result<Value, LispError> {
        Interpreter::load_file(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(interp: &Interpreter, input: &str) -> Result<Value, LispError> {
        interp.eval_str(input, "test")
    }

    #[test]
    fn self_evaluating_atoms() {
        let interp = Interpreter::new();
        assert_eq!(eval(&interp, "42").unwrap(), Value::Number(42.0));
        assert_eq!(eval(&interp, "\"s\"").unwrap(), Value::string("s"));
        assert_eq!(eval(&interp, "nil").unwrap(), Value::Nil);
        assert_eq!(eval(&interp, ":k").unwrap(), Value::keyword("k"));
    }

    #[test]
    fn empty_list_evaluates_to_itself() {
        let interp = Interpreter::new();
        assert_eq!(eval(&interp, "()").unwrap(), Value::list(vec![]));
    }

    #[test]
    fn auto_namespaced_keyword_uses_active_module() {
        let interp = Interpreter::new();
        assert_eq!(
            eval(&interp, "::k").unwrap().to_string(),
            ":wonder.core/k"
        );
        assert_eq!(
            eval(&interp, "(module app.main) ::k").unwrap().to_string(),
            ":app.main/k"
        );
    }

    #[test]
    fn uncaught_again_is_an_error() {
        let interp = Interpreter::new();
        let err = eval(&interp, "(again 1)").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UncaughtRecursionPoint));
    }

    #[test]
    fn classify_rejects_plain_data() {
        assert!(Invocable::classify(&Value::Number(1.0)).is_none());
        assert!(Invocable::classify(&Value::string("s")).is_none());
        assert!(matches!(
            Invocable::classify(&Value::keyword("k")),
            Some(Invocable::Keyword(_))
        ));
    }

    #[test]
    fn session_keeps_private_definitions_between_calls() {
        let interp = Interpreter::new();
        eval(&interp, "(define :private secret 7)").unwrap();
        assert_eq!(eval(&interp, "secret").unwrap(), Value::Number(7.0));
    }
}
