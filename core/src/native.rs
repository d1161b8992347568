//! Native function utilities and helpers
//!
//! Native functions are plain Rust functions that receive their evaluated
//! arguments and a handle back into the running interpreter.

use std::rc::Rc;

use crate::builder::LiteralBuilder;
use crate::collections::CollectionOps;
use crate::error::LispError;
use crate::language::{Arity, NativeFunction, Value};

/// What a native function may ask of the interpreter calling it.
pub trait Runtime {
    /// Apply any invocable value to already-evaluated arguments.
    fn apply(&self, func: &Value, args: Vec<Value>) -> Result<Value, LispError>;

    /// Evaluate a form in the global environment of the active module.
    fn eval(&self, form: &Value) -> Result<Value, LispError>;

    fn macroexpand(&self, form: &Value) -> Result<Value, LispError>;

    fn collections(&self) -> &dyn CollectionOps;

    fn builder(&self) -> &'static dyn LiteralBuilder;

    /// A fresh symbol name with the given prefix.
    fn gensym(&self, prefix: &str) -> String;

    /// Arities accepted by a callable, if it has a fixed set.
    fn arities(&self, func: &Value) -> Option<Vec<Arity>>;

    /// Evaluate a source file, returning its last value.
    fn load_file(&self, path: &str) -> Result<Value, LispError>;
}

pub type NativeFn = fn(&[Value], &dyn Runtime) -> Result<Value, LispError>;

pub fn native(name: &'static str, func: NativeFn) -> Value {
    Value::NativeFn(Rc::new(NativeFunction { name, func }))
}

// ============================================================================
// Argument Helpers
// ============================================================================

/// Fail unless exactly `n` arguments were passed.
pub fn expect_args(name: &str, args: &[Value], n: usize) -> Result<(), LispError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(LispError::arity(name, n.to_string(), args.len()))
    }
}

/// Fail unless at least `n` arguments were passed.
pub fn expect_at_least(name: &str, args: &[Value], n: usize) -> Result<(), LispError> {
    if args.len() >= n {
        Ok(())
    } else {
        Err(LispError::arity(name, format!("at least {n}"), args.len()))
    }
}

/// Fail unless between `min` and `max` arguments (inclusive) were passed.
pub fn expect_range(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), LispError> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else {
        Err(LispError::arity(name, format!("{min} to {max}"), args.len()))
    }
}

// ============================================================================
// Value Extraction Helpers
// ============================================================================

/// Extract a number from a Value
pub fn extract_number(value: &Value) -> Result<f64, LispError> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(LispError::type_error(format!("Expected number, got {value}"))),
    }
}

/// Extract a non-negative integral number from a Value
pub fn extract_index(value: &Value) -> Result<usize, LispError> {
    match value {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as usize),
        _ => Err(LispError::type_error(format!(
            "Expected non-negative integer, got {value}"
        ))),
    }
}

/// Extract a string from a Value
pub fn extract_string(value: &Value) -> Result<Rc<str>, LispError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(LispError::type_error(format!("Expected string, got {value}"))),
    }
}

/// Text of a string, symbol or keyword.
pub fn extract_name(value: &Value) -> Result<String, LispError> {
    match value {
        Value::String(s) => Ok(s.to_string()),
        Value::Symbol(name) | Value::Keyword(name) => Ok(name.name_str()),
        _ => Err(LispError::type_error(format!(
            "Expected string, symbol or keyword, got {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_helpers_report_expected_counts() {
        let args = [Value::Nil];
        assert!(expect_args("f", &args, 1).is_ok());
        let err = expect_at_least("g", &args, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "\"g\" wrong number of arguments, expected at least 2, got 1"
        );
        assert!(expect_range("h", &args, 0, 1).is_ok());
    }

    #[test]
    fn extraction_helpers() {
        assert_eq!(extract_number(&Value::Number(2.0)).unwrap(), 2.0);
        assert!(extract_number(&Value::Nil).is_err());
        assert_eq!(extract_index(&Value::Number(3.0)).unwrap(), 3);
        assert!(extract_index(&Value::Number(-1.0)).is_err());
        assert_eq!(extract_name(&Value::keyword("k")).unwrap(), "k");
        assert_eq!(&*extract_string(&Value::string("s")).unwrap(), "s");
    }
}
