//! Lambdas, `loop` and the `again` trampoline.
//!
//! A lambda indexes its clauses by `Arity`. Calling it selects a clause,
//! binds parameters in a fresh child of the captured environment and runs
//! the body. When the body completes with `Completion::Again`, the same
//! invocation rebinds and runs again instead of recursing, so
//! self-tail-recursive code runs in constant stack depth.

use std::collections::BTreeMap;
use std::rc::Rc;

use wonder_core::{
    Arity, Clause, CollectionOps, Environment, InternedSymbol, LambdaCell, LispError,
    ModuleContext, Value,
};

use crate::forms::expect_symbol;
use crate::interpreter::{Completion, EvalResult, Interpreter};

// ============================================================================
// Construction
// ============================================================================

/// Parse a parameter vector. `[a b & more]` and `[a b &more]` both collect
/// the remaining arguments into `more`.
fn parse_params(form: &Value) -> Result<(Vec<InternedSymbol>, Option<InternedSymbol>), LispError> {
    let Some(items) = form.sequential_items().filter(|_| form.is_vector()) else {
        return Err(LispError::invalid(format!(
            "lambda parameters should be a vector, got {form}"
        )));
    };
    let mut params = Vec::with_capacity(items.len());
    let mut iter = items.iter();
    while let Some(item) = iter.next() {
        let name = expect_symbol(item, "lambda")?;
        let text = name.name_str();
        let Some(rest_name) = text.strip_prefix('&') else {
            params.push(name.name);
            continue;
        };
        let rest = if rest_name.is_empty() {
            match iter.next() {
                Some(next) => expect_symbol(next, "lambda")?.name,
                None => {
                    return Err(LispError::invalid(format!(
                        "& should be followed by a parameter name in {form}"
                    )));
                }
            }
        } else {
            InternedSymbol::new(rest_name)
        };
        if iter.next().is_some() {
            return Err(LispError::invalid(format!(
                "the rest parameter should be last in {form}"
            )));
        }
        return Ok((params, Some(rest)));
    }
    Ok((params, None))
}

fn parse_clause(params: &Value, body: &[Value]) -> Result<Clause, LispError> {
    let (params, rest) = parse_params(params)?;
    let arity = match rest {
        Some(_) => Arity::AtLeast(params.len()),
        None => Arity::Exact(params.len()),
    };
    Ok(Clause {
        arity,
        params,
        rest,
        body: body.to_vec(),
    })
}

/// Clauses of `(lambda [a] ...)` or `(lambda ([a] ...) ([a b] ...))`.
fn parse_clauses(rest: &[Value]) -> Result<Vec<Clause>, LispError> {
    match rest.first() {
        Some(params) if params.is_vector() => Ok(vec![parse_clause(params, &rest[1..])?]),
        Some(Value::List(_)) => rest
            .iter()
            .map(|form| match form {
                Value::List(list) if !list.elements.is_empty() => {
                    parse_clause(&list.elements[0], &list.elements[1..])
                }
                other => Err(LispError::invalid(format!(
                    "lambda clause should be a list of parameters and body, got {other}"
                ))),
            })
            .collect(),
        Some(other) => Err(LispError::invalid(format!(
            "lambda expects a parameter vector or clauses, got {other}"
        ))),
        None => Err(LispError::invalid("lambda expects a parameter vector")),
    }
}

/// Pick the clause for `argc` arguments: an exact match, else the variadic
/// clause with the largest satisfiable minimum.
fn select_clause(lambda: &LambdaCell, argc: usize) -> Result<&Clause, LispError> {
    if let Some(clause) = lambda.clauses.get(&Arity::Exact(argc)) {
        return Ok(clause);
    }
    lambda
        .clauses
        .iter()
        .filter_map(|(arity, clause)| match arity {
            Arity::AtLeast(min) if *min <= argc => Some((*min, clause)),
            _ => None,
        })
        .max_by_key(|(min, _)| *min)
        .map(|(_, clause)| clause)
        .ok_or_else(|| {
            let expected: Vec<String> = lambda.arities().iter().map(Arity::to_string).collect();
            LispError::arity(lambda.display_name(), expected.join(" or "), argc)
        })
}

impl Interpreter {
    pub(crate) fn make_lambda(
        &self,
        rest: &[Value],
        source: Value,
        env: &Environment,
        ctx: &ModuleContext,
    ) -> Result<Rc<LambdaCell>, LispError> {
        let mut clauses = BTreeMap::new();
        for clause in parse_clauses(rest)? {
            let arity = clause.arity;
            if clauses.insert(arity, clause).is_some() {
                return Err(LispError::invalid(format!(
                    "lambda has more than one clause taking {arity} arguments: {source}"
                )));
            }
        }
        Ok(Rc::new(LambdaCell {
            id: self.next_id(),
            clauses,
            env: env.clone(),
            context: ctx.clone(),
            source,
            ident: Default::default(),
        }))
    }

    pub(crate) fn eval_lambda_form(
        &self,
        args: &[Value],
        source: Value,
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let lambda = self.make_lambda(args, source, env, ctx)?;
        Ok(Completion::Value(Value::Lambda(lambda)))
    }

    fn bind_clause(&self, lambda: &LambdaCell, clause: &Clause, args: &[Value]) -> Environment {
        let fixed = clause.params.len().min(args.len());
        let scope = lambda.env.extend_with(&clause.params, &args[..fixed]);
        if let Some(rest) = clause.rest {
            let extra = self.collections_ref().list(args[fixed..].to_vec());
            scope.define(rest, Some(extra), None);
        }
        scope.set_ident(lambda.display_name());
        scope
    }

    /// Invoke a lambda, trampolining on `again`.
    pub fn call_lambda(&self, lambda: &Rc<LambdaCell>, args: Vec<Value>) -> Result<Value, LispError> {
        let mut ctx = lambda.context.clone();
        let mut args = args;
        loop {
            let clause = select_clause(lambda, args.len())?;
            let scope = self.bind_clause(lambda, clause, &args);
            match self.eval_body(&clause.body, &scope, &mut ctx) {
                Ok(Completion::Value(value)) => return Ok(value),
                Ok(Completion::Again(next)) => args = next,
                Err(e) => return Err(e.with_trace(scope.stacktrace())),
            }
        }
    }

    // ========================================================================
    // loop / again
    // ========================================================================

    pub(crate) fn eval_loop(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let Some((bindings, body)) = args.split_first() else {
            return Err(LispError::arity("loop", "at least 1", 0));
        };
        let pairs = match bindings.sequential_items() {
            Some(items) if bindings.is_vector() && items.len() % 2 == 0 => items,
            _ => {
                return Err(LispError::invalid(format!(
                    "loop bindings should be a vector of name/value pairs, got {bindings}"
                )));
            }
        };

        let base = env.extend();
        base.set_ident("loop");
        let mut names = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            let name = expect_symbol(&pair[0], "loop")?.name;
            let value = value!(self.eval_in(&pair[1], &base, ctx));
            base.define(name, Some(value), None);
            names.push(name);
        }

        let mut scope = base.clone();
        loop {
            match self.eval_body(body, &scope, ctx)? {
                Completion::Value(value) => return Ok(Completion::Value(value)),
                Completion::Again(values) => {
                    if values.len() != names.len() {
                        return Err(LispError::arity("loop", names.len().to_string(), values.len()));
                    }
                    scope = base.extend_with(&names, &values);
                    scope.set_ident("loop");
                }
            }
        }
    }

    pub(crate) fn eval_again(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let mut values = Vec::with_capacity(args.len());
        for form in args {
            values.push(value!(self.eval_in(form, env, ctx)));
        }
        Ok(Completion::Again(values))
    }
}
