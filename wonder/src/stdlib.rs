//! Standard library native functions
//!
//! Collection natives delegate to the interpreter's `CollectionOps`, so
//! they behave the same for native and persistent collections.

use std::io::{self, Write};
use std::rc::Rc;

use regex::Regex;
use wonder_core::native::{
    expect_args, expect_at_least, expect_range, extract_index, extract_name, extract_number,
    extract_string, native,
};
use wonder_core::{
    InternedSymbol, LispError, Name, NativeFn, RegexValue, Runtime, Value, read_json,
    read_string_with,
};

use crate::interpreter::Interpreter;

// ============================================================================
// Constructors and sequences
// ============================================================================

fn list(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    Ok(rt.collections().list(args.to_vec()))
}

fn vector(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    Ok(rt.collections().vector(args.to_vec()))
}

fn hash_map(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    if args.len() % 2 != 0 {
        return Err(LispError::invalid(
            "hash-map requires an even number of arguments",
        ));
    }
    let entries = args
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    Ok(rt.collections().hash_map(entries))
}

fn hash_set(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    Ok(rt.collections().hash_set(args.to_vec()))
}

fn cons(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("cons", args, 2)?;
    rt.collections().cons(args[0].clone(), &args[1])
}

fn first(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("first", args, 1)?;
    rt.collections().first(&args[0])
}

fn rest(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("rest", args, 1)?;
    rt.collections().rest(&args[0])
}

fn second(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("second", args, 1)?;
    rt.collections().nth(&args[0], 1)
}

fn count(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("count", args, 1)?;
    Ok(Value::Number(rt.collections().count(&args[0])? as f64))
}

fn nth(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("nth", args, 2)?;
    rt.collections().nth(&args[0], extract_index(&args[1])?)
}

fn get(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_range("get", args, 2, 3)?;
    let coll = rt.collections();
    match args.get(2) {
        Some(default) if !coll.contains(&args[0], &args[1]) => Ok(default.clone()),
        _ => Ok(coll.get(&args[0], &args[1])),
    }
}

fn assoc(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_at_least("assoc", args, 3)?;
    if args.len() % 2 == 0 {
        return Err(LispError::invalid("assoc expects key/value pairs"));
    }
    let mut result = args[0].clone();
    for pair in args[1..].chunks(2) {
        result = rt
            .collections()
            .assoc(&result, pair[0].clone(), pair[1].clone())?;
    }
    Ok(result)
}

fn dissoc(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_at_least("dissoc", args, 1)?;
    let mut result = args[0].clone();
    for key in &args[1..] {
        result = rt.collections().dissoc(&result, key)?;
    }
    Ok(result)
}

fn merge(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    rt.collections().merge(args)
}

fn conj(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_at_least("conj", args, 1)?;
    let mut result = args[0].clone();
    for item in &args[1..] {
        result = rt.collections().conj(&result, item.clone())?;
    }
    Ok(result)
}

fn concat(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    rt.collections().concat(args)
}

// ============================================================================
// Higher-order
// ============================================================================

fn map(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("map", args, 2)?;
    let f = &args[0];
    rt.collections()
        .map(&mut |call_args: Vec<Value>| rt.apply(f, call_args), &args[1])
}

fn filter(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("filter", args, 2)?;
    let f = &args[0];
    rt.collections()
        .filter(&mut |call_args: Vec<Value>| rt.apply(f, call_args), &args[1])
}

/// `(reduce f coll)` or `(reduce f init coll)`.
fn reduce(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_range("reduce", args, 2, 3)?;
    let f = &args[0];
    let (init, coll) = match args {
        [_, init, coll] => (Some(init.clone()), coll),
        _ => (None, &args[1]),
    };
    rt.collections()
        .reduce(&mut |call_args: Vec<Value>| rt.apply(f, call_args), init, coll)
}

fn apply(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_at_least("apply", args, 2)?;
    let Some((spread, fixed)) = args[1..].split_last() else {
        return Err(LispError::arity("apply", "at least 2", args.len()));
    };
    let mut call_args = fixed.to_vec();
    call_args.extend(rt.collections().items(spread)?);
    rt.apply(&args[0], call_args)
}

// ============================================================================
// Equality and comparison
// ============================================================================

fn equals(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_at_least("=", args, 1)?;
    let coll = rt.collections();
    Ok(Value::Bool(
        args.windows(2).all(|pair| coll.equals(&pair[0], &pair[1])),
    ))
}

fn not_equals(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    match equals(args, rt)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

fn compare_chain(name: &str, args: &[Value], op: fn(f64, f64) -> bool) -> Result<Value, LispError> {
    expect_at_least(name, args, 1)?;
    let nums = args
        .iter()
        .map(extract_number)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Bool(nums.windows(2).all(|w| op(w[0], w[1]))))
}

fn less(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    compare_chain("<", args, |a, b| a < b)
}

fn greater(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    compare_chain(">", args, |a, b| a > b)
}

fn less_eq(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    compare_chain("<=", args, |a, b| a <= b)
}

fn greater_eq(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    compare_chain(">=", args, |a, b| a >= b)
}

// ============================================================================
// Predicates
// ============================================================================

macro_rules! predicate {
    ($fn_name:ident, $name:literal, $pattern:pat) => {
        fn $fn_name(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
            expect_args($name, args, 1)?;
            Ok(Value::Bool(matches!(args[0], $pattern)))
        }
    };
}

predicate!(is_list, "list?", Value::List(_));
predicate!(is_vector, "vector?", Value::Vector(_) | Value::PersistentVector(_));
predicate!(is_map, "map?", Value::Map(_) | Value::PersistentMap(_));
predicate!(is_set, "set?", Value::Set(_) | Value::PersistentSet(_));
predicate!(is_symbol, "symbol?", Value::Symbol(_));
predicate!(is_keyword, "keyword?", Value::Keyword(_));
predicate!(is_string, "string?", Value::String(_));
predicate!(is_number, "number?", Value::Number(_));
predicate!(is_nil, "nil?", Value::Nil);
predicate!(is_fn, "fn?", Value::Lambda(_) | Value::NativeFn(_));

fn is_empty(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("empty?", args, 1)?;
    Ok(Value::Bool(rt.collections().count(&args[0])? == 0))
}

// ============================================================================
// Names
// ============================================================================

/// `(symbol "name")` or `(symbol "ns" "name")`; `keyword` likewise.
fn make_name(fn_name: &str, args: &[Value]) -> Result<Name, LispError> {
    expect_range(fn_name, args, 1, 2)?;
    match args {
        [ns, name] => Ok(Name::qualified(&extract_name(ns)?, &extract_name(name)?)),
        _ => Ok(Name::parse(&extract_name(&args[0])?)),
    }
}

fn symbol(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    make_name("symbol", args).map(Value::Symbol)
}

fn keyword(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    make_name("keyword", args).map(Value::Keyword)
}

fn name(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("name", args, 1)?;
    extract_name(&args[0]).map(Value::string)
}

fn namespace(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("namespace", args, 1)?;
    match &args[0] {
        Value::Symbol(name) | Value::Keyword(name) => {
            Ok(name.namespace_str().map_or(Value::Nil, Value::string))
        }
        other => Err(LispError::type_error(format!(
            "namespace expects a symbol or keyword, got {other}"
        ))),
    }
}

fn gensym(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_range("gensym", args, 0, 1)?;
    let prefix = match args.first() {
        Some(prefix) => extract_name(prefix)?,
        None => "G__".to_string(),
    };
    Ok(Value::Symbol(Name::simple(&rt.gensym(&prefix))))
}

// ============================================================================
// Evaluation and reflection
// ============================================================================

fn eval(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("eval", args, 1)?;
    rt.eval(&args[0])
}

fn macroexpand(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("macroexpand", args, 1)?;
    rt.macroexpand(&args[0])
}

/// Arity keys of a callable: `n` for exactly `n`, `-(n + 1)` for at least `n`.
fn arity(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("arity", args, 1)?;
    Ok(match rt.arities(&args[0]) {
        Some(arities) => rt.collections().vector(
            arities
                .iter()
                .map(|a| Value::Number(a.key() as f64))
                .collect(),
        ),
        None => Value::Nil,
    })
}

fn inspect(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("inspect", args, 1)?;
    Ok(Value::string(args[0].to_string()))
}

fn read_string(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("read-string", args, 1)?;
    let text = extract_string(&args[0])?;
    let forms = read_string_with(&text, "read-string", rt.builder())?;
    Ok(forms.into_iter().next().unwrap_or(Value::Nil))
}

/// Evaluate a file relative to the working directory; yields its last value.
fn read_file(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("read-file", args, 1)?;
    rt.load_file(&extract_string(&args[0])?)
}

fn read_json_native(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("read-json", args, 1)?;
    read_json(&extract_string(&args[0])?, rt.builder())
}

// ============================================================================
// Regular expressions
// ============================================================================

fn extract_regex(value: &Value) -> Result<Rc<RegexValue>, LispError> {
    match value {
        Value::Regex(re) => Ok(re.clone()),
        Value::String(s) => compile(s),
        other => Err(LispError::type_error(format!("Expected regex, got {other}"))),
    }
}

fn compile(pattern: &str) -> Result<Rc<RegexValue>, LispError> {
    Regex::new(pattern)
        .map(|regex| Rc::new(RegexValue { regex }))
        .map_err(|e| LispError::type_error(format!("invalid regex {pattern:?}: {e}")))
}

/// The whole match, or a vector of it and its groups when there are groups.
fn match_value(caps: regex::Captures<'_>, rt: &dyn Runtime) -> Value {
    if caps.len() == 1 {
        return Value::string(&caps[0]);
    }
    rt.collections().vector(
        caps.iter()
            .map(|m| m.map_or(Value::Nil, |m| Value::string(m.as_str())))
            .collect(),
    )
}

fn re_pattern(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("re-pattern", args, 1)?;
    compile(&extract_string(&args[0])?).map(Value::Regex)
}

fn re_find(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("re-find", args, 2)?;
    let re = extract_regex(&args[0])?;
    let text = extract_string(&args[1])?;
    Ok(re
        .regex
        .captures(&text)
        .map_or(Value::Nil, |caps| match_value(caps, rt)))
}

fn re_matches(args: &[Value], rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("re-matches", args, 2)?;
    let re = extract_regex(&args[0])?;
    let text = extract_string(&args[1])?;
    Ok(match re.regex.captures(&text) {
        Some(caps) if caps.get(0).is_some_and(|m| m.start() == 0 && m.end() == text.len()) => {
            match_value(caps, rt)
        }
        _ => Value::Nil,
    })
}

// ============================================================================
// I/O
// ============================================================================

/// Print values separated by spaces; strings print without quotes.
fn println(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let text: Vec<String> = args
        .iter()
        .map(|v| match v {
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        })
        .collect();
    writeln!(handle, "{}", text.join(" "))
        .and_then(|_| handle.flush())
        .map_err(|e| LispError::io(format!("println: I/O error: {e}")))?;
    Ok(Value::Nil)
}

/// Print the readable form of a value.
fn pprint(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("pprint", args, 1)?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", args[0])
        .and_then(|_| handle.flush())
        .map_err(|e| LispError::io(format!("pprint: I/O error: {e}")))?;
    Ok(Value::Nil)
}

// ============================================================================
// Registration
// ============================================================================

const NATIVES: &[(&str, NativeFn)] = &[
    ("list", list),
    ("vector", vector),
    ("hash-map", hash_map),
    ("hash-set", hash_set),
    ("cons", cons),
    ("first", first),
    ("rest", rest),
    ("second", second),
    ("count", count),
    ("nth", nth),
    ("get", get),
    ("assoc", assoc),
    ("dissoc", dissoc),
    ("merge", merge),
    ("conj", conj),
    ("concat", concat),
    ("map", map),
    ("filter", filter),
    ("reduce", reduce),
    ("apply", apply),
    ("=", equals),
    ("not=", not_equals),
    ("<", less),
    (">", greater),
    ("<=", less_eq),
    (">=", greater_eq),
    ("list?", is_list),
    ("vector?", is_vector),
    ("map?", is_map),
    ("set?", is_set),
    ("symbol?", is_symbol),
    ("keyword?", is_keyword),
    ("string?", is_string),
    ("number?", is_number),
    ("nil?", is_nil),
    ("fn?", is_fn),
    ("empty?", is_empty),
    ("symbol", symbol),
    ("keyword", keyword),
    ("name", name),
    ("namespace", namespace),
    ("gensym", gensym),
    ("eval", eval),
    ("macroexpand", macroexpand),
    ("arity", arity),
    ("inspect", inspect),
    ("read-string", read_string),
    ("read-file", read_file),
    ("read-json", read_json_native),
    ("re-pattern", re_pattern),
    ("re-find", re_find),
    ("re-matches", re_matches),
    ("println", println),
    ("pprint", pprint),
    ("p", pprint),
];

/// Register all standard library functions in the interpreter's global scope.
pub fn register_stdlib(interp: &Interpreter) {
    let env = interp.global_env();
    for (name, func) in NATIVES {
        env.define(InternedSymbol::new(name), Some(native(*name, *func)), None);
    }
}
