//! Protocols, record types and host interop.

use wonder_core::ErrorKind;
use wonderscript::Interpreter;

fn eval_expr(interp: &Interpreter, expr: &str) -> String {
    match interp.eval_str(expr, "test") {
        Ok(result) => result.to_string(),
        Err(e) => format!("Error: {e}"),
    }
}

fn shapes() -> Interpreter {
    let interp = Interpreter::new();
    interp
        .eval_str(
            r#"
(define-protocol Shape
  (area [self] 0)
  (describe [self] (str "shape with area " (.area self))))

(define-type Square [side]
  Shape
  (area [self] (* (.-side self) (.-side self))))

(define-type Circle [r]
  Shape)
"#,
            "test",
        )
        .unwrap();
    interp
}

#[test]
fn test_type_fields() {
    let interp = shapes();
    assert_eq!(eval_expr(&interp, "(.-side (Square 3))"), "3");
    assert_eq!(eval_expr(&interp, "(.- (new Square 4) side)"), "4");
    assert_eq!(eval_expr(&interp, "(:side (Square. 5))"), "5");
}

#[test]
fn test_type_methods_override_protocol_defaults() {
    let interp = shapes();
    assert_eq!(eval_expr(&interp, "(.area (Square 3))"), "9");
    assert_eq!(eval_expr(&interp, "(.area (Circle 1))"), "0");
    assert_eq!(
        eval_expr(&interp, "(.describe (Square 2))"),
        "\"shape with area 4\""
    );
}

#[test]
fn test_both_method_call_spellings() {
    let interp = shapes();
    assert_eq!(eval_expr(&interp, "(. (Square 3) area)"), "9");
    assert_eq!(eval_expr(&interp, "(. (Square 3) (area))"), "9");
}

#[test]
fn test_property_assignment() {
    let interp = shapes();
    interp.eval_str("(define sq (Square 2))", "test").unwrap();
    assert_eq!(eval_expr(&interp, "(.-set! sq side 10)"), "10");
    assert_eq!(eval_expr(&interp, "(.area sq)"), "100");

    let err = interp.eval_str("(.-set! [1 2] x 1)", "test").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Type(_)));
}

#[test]
fn test_constructor_arity() {
    let interp = shapes();
    let err = interp.eval_str("(Square 1 2)", "test").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Arity { .. }));
}

#[test]
fn test_new_requires_a_type() {
    let interp = shapes();
    let err = interp.eval_str("(new 42)", "test").unwrap_err();
    assert!(err.to_string().contains("not a valid constructor"));
}

#[test]
fn test_protocol_and_type_definitions_return_names() {
    let interp = Interpreter::new();
    assert_eq!(eval_expr(&interp, "(define-protocol P (m [self] 1))"), "P");
    assert_eq!(eval_expr(&interp, "(define-type T [a] P)"), "T");
    assert_eq!(eval_expr(&interp, "(.m (T 1))"), "1");
}

#[test]
fn test_property_access_on_data() {
    let interp = Interpreter::new();
    assert_eq!(eval_expr(&interp, "(.-length [1 2 3])"), "3");
    assert_eq!(eval_expr(&interp, "(.-length \"héllo\")"), "5");
    assert_eq!(eval_expr(&interp, "(.- {:a 1} a)"), "1");
    assert_eq!(eval_expr(&interp, "(.- [10 20] 1)"), "20");
}

#[test]
fn test_property_of_nil() {
    let interp = Interpreter::new();
    let err = interp.eval_str("(.-x nil)", "test").unwrap_err();
    assert!(err.to_string().contains("nil is not an object"));
}

#[test]
fn test_string_methods() {
    let interp = Interpreter::new();
    assert_eq!(eval_expr(&interp, "(.toUpperCase \"abc\")"), "\"ABC\"");
    assert_eq!(eval_expr(&interp, "(.startsWith \"wonder\" \"won\")"), "true");
    assert_eq!(eval_expr(&interp, "(.split \"a-b-c\" \"-\")"), "[\"a\" \"b\" \"c\"]");
}

#[test]
fn test_host_namespace() {
    let interp = Interpreter::new();
    assert_eq!(eval_expr(&interp, "(.pow host/Math 2 10)"), "1024");
    assert_eq!(eval_expr(&interp, "(.floor host/Math 2.7)"), "2");
    assert_eq!(eval_expr(&interp, "(host/parseFloat \"2.5\")"), "2.5");
}

#[test]
fn test_thrown_objects_keep_their_class() {
    let interp = shapes();
    assert_eq!(
        eval_expr(&interp, "(try (throw (Square 7)) (catch [e Square] (.area e)))"),
        "49"
    );
}

#[test]
fn test_host_error_class() {
    let interp = Interpreter::new();
    assert_eq!(
        eval_expr(
            &interp,
            "(try (throw (host/Error. \"raw\")) (catch [e Error] (.-message e)))"
        ),
        "\"raw\""
    );
}
