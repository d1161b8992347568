//! `define`, `set!` and `define-macro`.

use std::rc::Rc;

use wonder_core::{Environment, LispError, Metadata, ModuleContext, Name, Value};

use super::expect_symbol;
use crate::interpreter::{Completion, EvalResult, Interpreter};

/// Metadata written before the name: `:private` or `{:doc "..."}`.
fn parse_metadata(form: &Value) -> Option<Metadata> {
    match form {
        Value::Keyword(key) => Some(Metadata::new().with(&key.name_str(), Value::Bool(true))),
        Value::Map(map) => Some(metadata_from(map.entries.iter())),
        Value::PersistentMap(map) => Some(metadata_from(map.entries.iter())),
        _ => None,
    }
}

fn metadata_from<'a>(entries: impl Iterator<Item = (&'a Value, &'a Value)>) -> Metadata {
    let mut meta = Metadata::new();
    for (k, v) in entries {
        let key = match k {
            Value::Keyword(name) | Value::Symbol(name) => name.name_str(),
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        };
        meta.insert(&key, v.clone());
    }
    meta
}

/// Give an anonymous lambda the name it was defined under.
fn name_lambda(value: &Value, name: &Name) {
    if let Value::Lambda(lambda) = value
        && lambda.ident.borrow().is_none()
    {
        *lambda.ident.borrow_mut() = Some(*name);
    }
}

impl Interpreter {
    /// Frame a definition belongs in: the local frame for private
    /// definitions, otherwise the active (or named) module's scope.
    fn definition_scope(
        &self,
        env: &Environment,
        ctx: &ModuleContext,
        name: &Name,
        meta: &Metadata,
    ) -> Result<(Environment, Option<Name>), LispError> {
        if meta.flag("private") {
            return Ok((env.clone(), None));
        }
        let module = match name.namespace {
            None => ctx.module.clone(),
            Some(ns) => {
                let ns = ns.resolve();
                self.modules
                    .find(&ns)
                    .ok_or_else(|| LispError::module(format!("module {ns} is undefined")))?
            }
        };
        Ok((module.scope.clone(), Some(module.name)))
    }

    pub(crate) fn define_variable(
        &self,
        env: &Environment,
        ctx: &ModuleContext,
        name: &Name,
        value: Value,
        meta: Option<Metadata>,
    ) -> Result<(), LispError> {
        let mut meta = meta.unwrap_or_default();
        let (scope, module) = self.definition_scope(env, ctx, name, &meta)?;
        if let Some(module) = module {
            meta.insert("module", Value::Symbol(module));
        }
        scope.define(name.name, Some(value), Some(meta));
        Ok(())
    }

    pub(crate) fn eval_define(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let (meta, rest) = match args.first() {
            Some(Value::Symbol(_)) => (None, args),
            Some(first) => match parse_metadata(first) {
                Some(meta) => (Some(meta), &args[1..]),
                None => {
                    return Err(LispError::invalid(format!(
                        "define: first element should be a symbol, keyword, or map, got {first}"
                    )));
                }
            },
            None => return Err(LispError::arity("define", "at least 1", 0)),
        };
        let (ident, init) = match rest {
            [ident] => (expect_symbol(ident, "define")?, None),
            [ident, init] => (expect_symbol(ident, "define")?, Some(init)),
            _ => return Err(LispError::invalid("define: expected a name and at most one value")),
        };

        // Visible while the value is computed, so definitions can refer to themselves.
        let placeholder_meta = meta.clone().unwrap_or_default();
        let (scope, _) = self.definition_scope(env, ctx, ident, &placeholder_meta)?;
        scope.define(ident.name, None, None);

        let value = match init {
            Some(form) => value!(self.eval_in(form, env, ctx)),
            None => Value::Nil,
        };
        self.define_variable(env, ctx, ident, value.clone(), meta)?;
        name_lambda(&value, ident);
        Ok(Completion::Value(value))
    }

    pub(crate) fn eval_set(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let [target, form] = args else {
            return Err(LispError::arity("set!", "2", args.len()));
        };
        let name = expect_symbol(target, "set!")?;
        let scope = self
            .binding_scope(name, env, ctx)?
            .ok_or_else(|| LispError::undefined(name))?;
        let value = value!(self.eval_in(form, env, ctx));
        scope.set(name.name, value.clone())?;
        Ok(Completion::Value(value))
    }

    pub(crate) fn eval_define_macro(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let Some((ident, rest)) = args.split_first() else {
            return Err(LispError::arity("define-macro", "at least 2", 0));
        };
        let name = expect_symbol(ident, "define-macro")?;
        let mut meta = Metadata::new().with("macro", Value::Bool(true));
        let rest = match rest {
            [Value::String(doc), body @ ..] if !body.is_empty() => {
                meta.insert("doc", Value::String(doc.clone()));
                body
            }
            _ => rest,
        };
        if rest.is_empty() {
            return Err(LispError::invalid(format!(
                "define-macro: {name} needs an argument list and a body"
            )));
        }

        let mut source = vec![Value::symbol("lambda")];
        source.extend_from_slice(rest);
        let lambda = self.make_lambda(rest, Value::list(source), env, ctx)?;
        *lambda.ident.borrow_mut() = Some(*name);
        self.define_variable(env, ctx, name, Value::Lambda(Rc::clone(&lambda)), Some(meta))?;
        Ok(Completion::Value(Value::Symbol(*name)))
    }
}

#[cfg(test)]
mod tests {
    use crate::Interpreter;
    use wonder_core::{ErrorKind, InternedSymbol, Value};

    fn eval(interp: &Interpreter, input: &str) -> Result<Value, wonder_core::LispError> {
        interp.eval_str(input, "test")
    }

    #[test]
    fn define_returns_the_value() {
        let interp = Interpreter::new();
        assert_eq!(eval(&interp, "(define x 3)").unwrap(), Value::Number(3.0));
        assert_eq!(eval(&interp, "x").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn define_without_value_binds_nil() {
        let interp = Interpreter::new();
        assert_eq!(eval(&interp, "(define x) x").unwrap(), Value::Nil);
    }

    #[test]
    fn definitions_carry_module_metadata() {
        let interp = Interpreter::new();
        eval(&interp, "(define {:doc \"answer\"} x 42)").unwrap();
        let binding = interp
            .global_env()
            .own(InternedSymbol::new("x"))
            .expect("x should be defined in the core module");
        let meta = binding.meta.expect("definitions carry metadata");
        assert_eq!(meta.get("doc"), Some(&Value::string("answer")));
        assert_eq!(meta.get("module"), Some(&Value::symbol("wonder.core")));
    }

    #[test]
    fn private_definitions_stay_in_the_local_frame() {
        let interp = Interpreter::new();
        eval(&interp, "(define f (lambda [] (define :private inner 1) inner))").unwrap();
        assert_eq!(eval(&interp, "(f)").unwrap(), Value::Number(1.0));
        let err = eval(&interp, "inner").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UndefinedVariable(_)));
    }

    #[test]
    fn set_requires_an_existing_binding() {
        let interp = Interpreter::new();
        let err = eval(&interp, "(set! nope 1)").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UndefinedVariable(_)));
    }

    #[test]
    fn defined_lambdas_take_their_name() {
        let interp = Interpreter::new();
        let value = eval(&interp, "(define add (lambda [a b] (+ a b)))").unwrap();
        let Value::Lambda(lambda) = value else {
            panic!("expected a lambda");
        };
        assert_eq!(lambda.display_name(), "add");
    }

    #[test]
    fn define_macro_returns_its_name() {
        let interp = Interpreter::new();
        let name = eval(&interp, "(define-macro unless \"inverted when\" [c x] (list 'cond c nil :else x))");
        assert_eq!(name.unwrap(), Value::symbol("unless"));
        assert_eq!(eval(&interp, "(unless false 5)").unwrap(), Value::Number(5.0));
    }

    #[test]
    fn qualified_definition_into_missing_module_fails() {
        let interp = Interpreter::new();
        let err = eval(&interp, "(define nowhere/x 1)").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Module(_)));
    }
}
