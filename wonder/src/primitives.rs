//! Inlined operators.
//!
//! Applications whose operator is one of these unqualified symbols call the
//! Rust function directly instead of looking the symbol up. The same
//! functions are also bound in the global environment so they can be
//! passed around as values.

use wonder_core::native::{expect_args, expect_at_least, extract_number, native};
use wonder_core::{Environment, InternedSymbol, LispError, Name, NativeFn, Runtime, Value};

pub const PRIMITIVES: &[(&str, NativeFn)] = &[
    ("+", add),
    ("-", sub),
    ("*", mul),
    ("/", div),
    ("mod", modulo),
    ("bit-or", bit_or),
    ("bit-and", bit_and),
    ("bit-xor", bit_xor),
    ("bit-not", bit_not),
    ("bit-shift-left", bit_shift_left),
    ("bit-shift-right", bit_shift_right),
    ("str", str_concat),
    ("add1", add1),
    ("sub1", sub1),
    ("not", not),
];

/// The inlined implementation an operator symbol names.
pub fn lookup(name: &Name) -> Option<NativeFn> {
    if name.is_qualified() {
        return None;
    }
    name.name.with_str(|s| {
        PRIMITIVES
            .iter()
            .find(|(op, _)| *op == s)
            .map(|(_, func)| *func)
    })
}

pub fn install(env: &Environment) {
    for (name, func) in PRIMITIVES {
        env.define(InternedSymbol::new(name), Some(native(*name, *func)), None);
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

fn numbers(args: &[Value]) -> Result<Vec<f64>, LispError> {
    args.iter().map(extract_number).collect()
}

fn add(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    Ok(Value::Number(numbers(args)?.into_iter().sum()))
}

fn mul(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    Ok(Value::Number(numbers(args)?.into_iter().product()))
}

/// `(-)` is 0, `(- x)` negates, otherwise subtract left to right.
fn sub(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    let nums = numbers(args)?;
    Ok(Value::Number(match nums.as_slice() {
        [] => 0.0,
        [x] => -x,
        [first, rest @ ..] => rest.iter().fold(*first, |acc, n| acc - n),
    }))
}

/// `(/)` is 1 and `(/ x)` is `x`; otherwise divide left to right.
fn div(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    let nums = numbers(args)?;
    Ok(Value::Number(match nums.as_slice() {
        [] => 1.0,
        [x] => *x,
        [first, rest @ ..] => rest.iter().fold(*first, |acc, n| acc / n),
    }))
}

fn modulo(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("mod", args, 2)?;
    let (a, b) = (extract_number(&args[0])?, extract_number(&args[1])?);
    Ok(Value::Number(a % b))
}

fn add1(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("add1", args, 1)?;
    Ok(Value::Number(extract_number(&args[0])? + 1.0))
}

fn sub1(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("sub1", args, 1)?;
    Ok(Value::Number(extract_number(&args[0])? - 1.0))
}

// ============================================================================
// Bitwise (on the integral part, as i64)
// ============================================================================

fn integers(args: &[Value]) -> Result<Vec<i64>, LispError> {
    args.iter().map(|v| extract_number(v).map(|n| n as i64)).collect()
}

fn fold_bits(name: &str, args: &[Value], f: fn(i64, i64) -> i64) -> Result<Value, LispError> {
    expect_at_least(name, args, 1)?;
    let ints = integers(args)?;
    let result = ints[1..].iter().fold(ints[0], |acc, n| f(acc, *n));
    Ok(Value::Number(result as f64))
}

fn bit_or(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    fold_bits("bit-or", args, |a, b| a | b)
}

fn bit_and(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    fold_bits("bit-and", args, |a, b| a & b)
}

fn bit_xor(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    fold_bits("bit-xor", args, |a, b| a ^ b)
}

fn bit_not(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("bit-not", args, 1)?;
    Ok(Value::Number(!(extract_number(&args[0])? as i64) as f64))
}

fn shift(name: &str, args: &[Value], f: fn(i64, u32) -> i64) -> Result<Value, LispError> {
    expect_args(name, args, 2)?;
    let ints = integers(args)?;
    let amount = u32::try_from(ints[1])
        .ok()
        .filter(|n| *n < 64)
        .ok_or_else(|| LispError::type_error(format!("{name}: invalid shift amount {}", ints[1])))?;
    Ok(Value::Number(f(ints[0], amount) as f64))
}

fn bit_shift_left(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    shift("bit-shift-left", args, |a, n| a << n)
}

fn bit_shift_right(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    shift("bit-shift-right", args, |a, n| a >> n)
}

// ============================================================================
// Strings and logic
// ============================================================================

/// Concatenate printed forms; strings contribute their raw text, nil nothing.
fn str_concat(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    let mut out = String::new();
    for arg in args {
        match arg {
            Value::Nil => {}
            Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
    }
    Ok(Value::string(out))
}

fn not(args: &[Value], _rt: &dyn Runtime) -> Result<Value, LispError> {
    expect_args("not", args, 1)?;
    Ok(Value::Bool(!args[0].is_truthy()))
}

#[cfg(test)]
mod tests {
    use crate::Interpreter;
    use wonder_core::{ErrorKind, Value};

    fn eval(input: &str) -> Value {
        Interpreter::new().eval_str(input, "test").unwrap()
    }

    #[test]
    fn arithmetic_identities() {
        assert_eq!(eval("(+)"), Value::Number(0.0));
        assert_eq!(eval("(-)"), Value::Number(0.0));
        assert_eq!(eval("(*)"), Value::Number(1.0));
        assert_eq!(eval("(/)"), Value::Number(1.0));
        assert_eq!(eval("(- 5)"), Value::Number(-5.0));
        assert_eq!(eval("(- 10 3 2)"), Value::Number(5.0));
        assert_eq!(eval("(/ 12 2 3)"), Value::Number(2.0));
        assert_eq!(eval("(mod 7 3)"), Value::Number(1.0));
    }

    #[test]
    fn bitwise_operators() {
        assert_eq!(eval("(bit-or 4 1)"), Value::Number(5.0));
        assert_eq!(eval("(bit-and 6 3)"), Value::Number(2.0));
        assert_eq!(eval("(bit-xor 6 3)"), Value::Number(5.0));
        assert_eq!(eval("(bit-not 0)"), Value::Number(-1.0));
        assert_eq!(eval("(bit-shift-left 1 4)"), Value::Number(16.0));
        assert_eq!(eval("(bit-shift-right 16 2)"), Value::Number(4.0));
    }

    #[test]
    fn str_and_not() {
        assert_eq!(eval("(str \"a\" 1 nil :k)"), Value::string("a1:k"));
        assert_eq!(eval("(not nil)"), Value::Bool(true));
        assert_eq!(eval("(not 0)"), Value::Bool(false));
        assert_eq!(eval("(add1 (sub1 5))"), Value::Number(5.0));
    }

    #[test]
    fn primitives_are_first_class() {
        assert_eq!(eval("(reduce + 0 [1 2 3])"), Value::Number(6.0));
    }

    #[test]
    fn non_numbers_are_type_errors() {
        let err = Interpreter::new().eval_str("(+ 1 \"a\")", "test").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Type(_)));
    }
}
