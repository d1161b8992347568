//! Tests for the persistent collection mode
//!
//! With `InterpreterOptions::persistent()` every collection literal and
//! every collection native produces the structurally shared variants.

use wonder_core::Value;
use wonderscript::{Interpreter, InterpreterOptions};

fn persistent() -> Interpreter {
    Interpreter::with_options(InterpreterOptions::new().persistent())
}

fn eval_str(interp: &Interpreter, code: &str) -> Value {
    interp.eval_str(code, "test").expect("eval failed")
}

#[test]
fn test_literals_are_persistent() {
    let interp = persistent();
    assert!(matches!(eval_str(&interp, "[1 2 3]"), Value::PersistentVector(_)));
    assert!(matches!(eval_str(&interp, "{:a 1}"), Value::PersistentMap(_)));
    assert!(matches!(eval_str(&interp, "#{1 2}"), Value::PersistentSet(_)));
}

#[test]
fn test_natives_build_persistent_collections() {
    let interp = persistent();
    assert!(matches!(eval_str(&interp, "(vector 1 2)"), Value::PersistentVector(_)));
    assert!(matches!(eval_str(&interp, "(hash-map :a 1)"), Value::PersistentMap(_)));
    assert!(matches!(eval_str(&interp, "(conj [1] 2)"), Value::PersistentVector(_)));
}

#[test]
fn test_native_mode_is_the_default() {
    let interp = Interpreter::new();
    assert!(matches!(eval_str(&interp, "[1 2 3]"), Value::Vector(_)));
    assert!(matches!(eval_str(&interp, "{:a 1}"), Value::Map(_)));
}

#[test]
fn test_vector_immutability() {
    let interp = persistent();
    eval_str(&interp, "(define v1 [1 2 3])");
    eval_str(&interp, "(define v2 (conj v1 4))");
    assert_eq!(eval_str(&interp, "(count v1)"), Value::Number(3.0));
    assert_eq!(eval_str(&interp, "(count v2)"), Value::Number(4.0));
    assert_eq!(eval_str(&interp, "v2").to_string(), "[1 2 3 4]");
}

#[test]
fn test_map_immutability() {
    let interp = persistent();
    eval_str(&interp, "(define m1 {:a 1})");
    eval_str(&interp, "(define m2 (assoc m1 :b 2))");
    eval_str(&interp, "(define m3 (dissoc m2 :a))");
    assert_eq!(eval_str(&interp, "(count m1)"), Value::Number(1.0));
    assert_eq!(eval_str(&interp, "(count m2)"), Value::Number(2.0));
    assert_eq!(eval_str(&interp, "(get m3 :a)"), Value::Nil);
    assert_eq!(eval_str(&interp, "(get m2 :a)"), Value::Number(1.0));
}

#[test]
fn test_invocation_works_on_persistent_collections() {
    let interp = persistent();
    assert_eq!(eval_str(&interp, "({:a 1} :a)"), Value::Number(1.0));
    assert_eq!(eval_str(&interp, "([10 20] 1)"), Value::Number(20.0));
    assert_eq!(eval_str(&interp, "(#{:x} :x)"), Value::keyword("x"));
    assert_eq!(eval_str(&interp, "(:k {:k :v})"), Value::keyword("v"));
}

#[test]
fn test_equality_across_persistent_values() {
    let interp = persistent();
    assert_eq!(eval_str(&interp, "(= [1 2] (vector 1 2))"), Value::Bool(true));
    assert_eq!(eval_str(&interp, "(= {:a 1} (assoc {} :a 1))"), Value::Bool(true));
}

#[test]
fn test_higher_order_functions() {
    let interp = persistent();
    assert_eq!(eval_str(&interp, "(reduce + (map add1 [1 2 3]))"), Value::Number(9.0));
    assert_eq!(
        eval_str(&interp, "(count (filter (lambda [x] (> x 2)) [1 2 3 4]))"),
        Value::Number(2.0)
    );
}

#[test]
fn test_large_vector_build() {
    let interp = persistent();
    let code = "(loop [i 0 acc []] (cond (= i 1000) (count acc) :else (again (+ i 1) (conj acc i))))";
    assert_eq!(eval_str(&interp, code), Value::Number(1000.0));
}
