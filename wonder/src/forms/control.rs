//! `cond`, `do`, `try` and `throw`.

use wonder_core::{Environment, LispError, ModuleContext, Name, Value};

use super::{SpecialForm, expect_symbol};
use crate::interpreter::{Completion, EvalResult, Interpreter};

/// A `(catch [binding Class] body...)` clause.
struct CatchClause<'a> {
    binding: Name,
    class: Value,
    body: &'a [Value],
}

/// The body of a `try` split into plain forms, catch clauses and finally.
struct TryParts<'a> {
    body: Vec<Value>,
    catches: Vec<CatchClause<'a>>,
    finally: Option<&'a [Value]>,
}

fn clause_tag(form: &Value) -> Option<(SpecialForm, &[Value])> {
    let Value::List(list) = form else {
        return None;
    };
    let (head, rest) = list.elements.split_first()?;
    match head.as_symbol().and_then(SpecialForm::from_name) {
        Some(tag @ (SpecialForm::Catch | SpecialForm::Finally)) => Some((tag, rest)),
        _ => None,
    }
}

fn parse_catch<'a>(form: &Value, rest: &'a [Value]) -> Result<CatchClause<'a>, LispError> {
    let Some((spec, body)) = rest.split_first() else {
        return Err(LispError::invalid(format!("catch needs a binding vector: {form}")));
    };
    match spec.sequential_items().as_deref() {
        Some([binding, class]) if spec.is_vector() => Ok(CatchClause {
            binding: *expect_symbol(binding, "catch")?,
            class: class.clone(),
            body,
        }),
        _ => Err(LispError::invalid(format!(
            "catch binding should be a vector of a symbol and a class: {spec}"
        ))),
    }
}

fn split_try(args: &[Value]) -> Result<TryParts<'_>, LispError> {
    let mut parts = TryParts {
        body: Vec::new(),
        catches: Vec::new(),
        finally: None,
    };
    for form in args {
        match clause_tag(form) {
            Some((SpecialForm::Catch, rest)) => parts.catches.push(parse_catch(form, rest)?),
            Some((_, rest)) => {
                if parts.finally.is_some() {
                    return Err(LispError::invalid("a try block can have only one finally"));
                }
                parts.finally = Some(rest);
            }
            None => parts.body.push(form.clone()),
        }
    }
    if parts.catches.is_empty() && parts.finally.is_none() {
        return Err(LispError::invalid(
            "A try block should have a catch block or a finally block",
        ));
    }
    Ok(parts)
}

/// Render a stack trace the way error objects carry it.
pub(crate) fn stack_string(env: &Environment) -> Value {
    let lines: Vec<String> = env
        .stacktrace()
        .iter()
        .map(|frame| format!("    at {frame}"))
        .collect();
    Value::string(lines.join("\n"))
}

impl Interpreter {
    pub(crate) fn eval_cond(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        if args.len() % 2 != 0 {
            return Err(LispError::invalid(
                "cond requires an even number of elements",
            ));
        }
        for pair in args.chunks(2) {
            let is_else = matches!(&pair[0], Value::Keyword(k) if !k.is_qualified() && k.name_str() == "else");
            if is_else || value!(self.eval_in(&pair[0], env, ctx)).is_truthy() {
                return self.eval_in(&pair[1], env, ctx);
            }
        }
        Ok(Completion::Value(Value::Nil))
    }

    pub(crate) fn eval_do(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let scope = env.extend();
        scope.set_ident("do");
        self.eval_body(args, &scope, ctx)
    }

    pub(crate) fn eval_try(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let parts = split_try(args)?;
        let scope = env.extend();
        scope.set_ident("try");

        let mut outcome = match self.eval_body(&parts.body, &scope, ctx) {
            Err(error) if !parts.catches.is_empty() => {
                self.eval_catches(&parts.catches, error, &scope, ctx)
            }
            other => other,
        };

        if let Some(finally) = parts.finally {
            let cleanup = scope.extend();
            cleanup.set_ident("finally");
            let value = value!(self.eval_body(finally, &cleanup, ctx));
            if !finally.is_empty() && matches!(outcome, Ok(Completion::Value(_))) {
                outcome = Ok(Completion::Value(value));
            }
        }
        outcome
    }

    /// Run the first catch clause whose class matches; otherwise rethrow.
    fn eval_catches(
        &self,
        catches: &[CatchClause<'_>],
        error: LispError,
        scope: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let thrown = self.reify_error(&error);
        for clause in catches {
            let class = value!(self.eval_in(&clause.class, scope, ctx));
            if !self.instance_of(&thrown, &class)? {
                continue;
            }
            let handler = scope.extend_with(&[clause.binding.name], std::slice::from_ref(&thrown));
            handler.set_ident("catch");
            return self.eval_body(clause.body, &handler, ctx);
        }
        Err(error)
    }

    pub(crate) fn eval_throw(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let [form] = args else {
            return Err(LispError::arity("throw", "1", args.len()));
        };
        let value = value!(self.eval_in(form, env, ctx));
        let thrown = match value {
            Value::String(message) => {
                self.errors
                    .instantiate(&self.errors.base, Value::String(message), stack_string(env))
            }
            Value::Object(ref obj) if obj.field("stack").is_none() => {
                obj.set_field("stack", stack_string(env));
                value
            }
            other => other,
        };
        Err(LispError::thrown(thrown).with_trace(env.stacktrace()))
    }
}
