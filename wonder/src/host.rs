//! The host namespace.
//!
//! Qualified symbols under the host token (`host/Math`, `host/console`,
//! `host/Error`) reach runtime-provided objects, which programs drive with
//! the interop forms: `(.sqrt host/Math 16)`, `(.-PI host/Math)`,
//! `(new host/Error "boom")`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;
use wonder_core::native::{expect_args, expect_at_least, expect_range, extract_number, native};
use wonder_core::{
    Environment, InternedSymbol, LispError, Module, Name, NativeFn, ObjectValue, Runtime,
    TypeValue, Value,
};

use crate::interpreter::Interpreter;

fn host_object(class: &str, methods: &[(&'static str, NativeFn)], fields: &[(&str, Value)]) -> Value {
    let ty = TypeValue::new(Name::simple(class), Vec::new(), None);
    {
        let mut table = ty.methods.borrow_mut();
        for (name, func) in methods {
            table.insert(name.to_string(), native(*name, *func));
        }
    }
    let fields: BTreeMap<String, Value> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Value::Object(Rc::new(ObjectValue {
        class: Rc::new(ty),
        fields: RefCell::new(fields),
    }))
}

// ============================================================================
// Math
// ============================================================================

/// Numeric arguments after the receiver.
fn numbers(name: &str, args: &[Value], n: usize) -> Result<Vec<f64>, LispError> {
    expect_args(name, args, n + 1)?;
    args[1..].iter().map(extract_number).collect()
}

fn unary(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, LispError> {
    let n = numbers(name, args, 1)?;
    Ok(Value::Number(f(n[0])))
}

fn math_abs(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    unary("abs", args, f64::abs)
}

fn math_floor(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    unary("floor", args, f64::floor)
}

fn math_ceil(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    unary("ceil", args, f64::ceil)
}

fn math_round(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    unary("round", args, f64::round)
}

fn math_sqrt(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    unary("sqrt", args, f64::sqrt)
}

fn math_sin(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    unary("sin", args, f64::sin)
}

fn math_cos(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    unary("cos", args, f64::cos)
}

fn math_log(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    unary("log", args, f64::ln)
}

fn math_exp(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    unary("exp", args, f64::exp)
}

fn math_pow(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    let n = numbers("pow", args, 2)?;
    Ok(Value::Number(n[0].powf(n[1])))
}

fn math_min(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_at_least("min", args, 1)?;
    let mut result = f64::INFINITY;
    for arg in &args[1..] {
        result = result.min(extract_number(arg)?);
    }
    Ok(Value::Number(result))
}

fn math_max(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_at_least("max", args, 1)?;
    let mut result = f64::NEG_INFINITY;
    for arg in &args[1..] {
        result = result.max(extract_number(arg)?);
    }
    Ok(Value::Number(result))
}

// ============================================================================
// console and globals
// ============================================================================

fn console_log(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_at_least("log", args, 1)?;
    let parts: Vec<String> = args[1..]
        .iter()
        .map(|v| match v {
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        })
        .collect();
    println!("{}", parts.join(" "));
    Ok(Value::Nil)
}

fn parse_float(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("parseFloat", args, 1)?;
    let text = wonder_core::native::extract_string(&args[0])?;
    Ok(Value::Number(text.trim().parse().unwrap_or(f64::NAN)))
}

fn parse_int(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_range("parseInt", args, 1, 2)?;
    let text = wonder_core::native::extract_string(&args[0])?;
    let radix = match args.get(1) {
        Some(r) => extract_number(r)? as u32,
        None => 10,
    };
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(match i64::from_str_radix(text.trim(), radix) {
        Ok(n) => Value::Number(n as f64),
        Err(_) => Value::Number(f64::NAN),
    })
}

/// Populate the host module's scope and register it.
pub fn install(interp: &Interpreter) {
    let scope = Environment::new();
    scope.set_ident(interp.options.host_namespace.clone());
    let define = |name: &str, value: Value| scope.define(InternedSymbol::new(name), Some(value), None);

    interp.errors.install(&scope);
    define(
        "Object",
        Value::Type(Rc::new(TypeValue::new(Name::simple("Object"), Vec::new(), None))),
    );
    define(
        "Math",
        host_object(
            "Math",
            &[
                ("abs", math_abs),
                ("floor", math_floor),
                ("ceil", math_ceil),
                ("round", math_round),
                ("sqrt", math_sqrt),
                ("pow", math_pow),
                ("min", math_min),
                ("max", math_max),
                ("sin", math_sin),
                ("cos", math_cos),
                ("log", math_log),
                ("exp", math_exp),
            ],
            &[
                ("PI", Value::Number(std::f64::consts::PI)),
                ("E", Value::Number(std::f64::consts::E)),
            ],
        ),
    );
    define("console", host_object("Console", &[("log", console_log)], &[]));
    define("parseFloat", native("parseFloat", parse_float));
    define("parseInt", native("parseInt", parse_int));

    let module = Rc::new(Module {
        name: Name::simple(&interp.options.host_namespace),
        scope,
    });
    interp.modules.insert(module);
    debug!(namespace = %interp.options.host_namespace, "installed host namespace");
}

// ============================================================================
// String methods
// ============================================================================

fn string_arg(method: &str, args: &[Value]) -> Result<Rc<str>, LispError> {
    expect_args(method, args, 1)?;
    wonder_core::native::extract_string(&args[0])
}

/// Methods callable on strings with `.`; `args` excludes the receiver.
pub fn string_method(method: &str, s: &str, args: &[Value]) -> Result<Value, LispError> {
    Ok(match method {
        "toUpperCase" => Value::string(s.to_uppercase()),
        "toLowerCase" => Value::string(s.to_lowercase()),
        "trim" => Value::string(s.trim()),
        "length" => Value::Number(s.graphemes(true).count() as f64),
        "includes" => Value::Bool(s.contains(&*string_arg(method, args)?)),
        "startsWith" => Value::Bool(s.starts_with(&*string_arg(method, args)?)),
        "endsWith" => Value::Bool(s.ends_with(&*string_arg(method, args)?)),
        "indexOf" => {
            let needle = string_arg(method, args)?;
            match s.find(&*needle) {
                Some(byte) => Value::Number(s[..byte].graphemes(true).count() as f64),
                None => Value::Number(-1.0),
            }
        }
        "split" => {
            let sep = string_arg(method, args)?;
            let parts = if sep.is_empty() {
                s.graphemes(true).map(Value::string).collect()
            } else {
                s.split(&*sep).map(Value::string).collect()
            };
            Value::vector(parts)
        }
        _ => {
            return Err(LispError::type_error(format!("string has no method {method}")));
        }
    })
}
