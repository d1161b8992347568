use wonderscript::Interpreter;

fn eval_multi(inputs: &[&str]) -> Result<String, String> {
    let interp = Interpreter::new();
    let mut result = String::new();
    for input in inputs {
        let value = interp.eval_str(input, "test").map_err(|e| e.to_string())?;
        result = value.to_string();
    }
    Ok(result)
}

#[test]
fn test_macro_receives_unevaluated_forms() {
    let result = eval_multi(&[
        "(define-macro quoted [form] (list 'quote form))",
        "(quoted (+ 1 2))",
    ]);
    assert_eq!(result.unwrap(), "(+ 1 2)");
}

#[test]
fn test_define_macro_returns_its_name() {
    assert_eq!(eval_multi(&["(define-macro m [] nil)"]).unwrap(), "m");
}

#[test]
fn test_when_macro() {
    let result = eval_multi(&[
        "(define-macro when [test & body] (list 'cond test (cons 'do body)))",
        "(when (> 2 1) :a :b)",
    ]);
    assert_eq!(result.unwrap(), ":b");
    assert_eq!(
        eval_multi(&[
            "(define-macro when [test & body] (list 'cond test (cons 'do body)))",
            "(when false :a)",
        ])
        .unwrap(),
        "nil"
    );
}

#[test]
fn test_unless_macro_with_docstring() {
    let interp = Interpreter::new();
    interp
        .eval_str(
            "(define-macro unless \"Inverse of when.\" [test then] (list 'cond test nil :else then))",
            "test",
        )
        .unwrap();
    assert_eq!(interp.eval_str("(unless false 5)", "test").unwrap().to_string(), "5");

    let binding = interp
        .global_env()
        .binding(wonder_core::InternedSymbol::new("unless"))
        .unwrap();
    let meta = binding.meta.unwrap();
    assert!(meta.flag("macro"));
    assert_eq!(meta.get("doc").unwrap().to_string(), "\"Inverse of when.\"");
}

#[test]
fn test_gensym_keeps_macro_bindings_apart() {
    // The expansion binds a fresh symbol, so a caller's `tmp` is not captured.
    let result = eval_multi(&[
        "(define-macro my-or [a b]
           ((lambda [tmp] (list (list 'lambda [tmp] (list 'cond tmp tmp :else b)) a)) (gensym)))",
        "(define tmp 5)",
        "(my-or false tmp)",
    ]);
    assert_eq!(result.unwrap(), "5");
}

#[test]
fn test_naive_macro_captures_caller_names() {
    let result = eval_multi(&[
        "(define-macro my-or [a b] (list (list 'lambda ['tmp] (list 'cond 'tmp 'tmp :else b)) a))",
        "(define tmp 5)",
        "(my-or false tmp)",
    ]);
    assert_eq!(result.unwrap(), "false");
}

#[test]
fn test_macroexpand_expands_fully() {
    let result = eval_multi(&[
        "(define-macro inc [x] (list '+ x 1))",
        "(define-macro inc2 [x] (list 'inc (list 'inc x)))",
        "(macroexpand '(inc2 y))",
    ]);
    assert_eq!(result.unwrap(), "(+ (inc y) 1)");
}

#[test]
fn test_macroexpand_leaves_non_macros_alone() {
    assert_eq!(eval_multi(&["(macroexpand '(+ 1 2))"]).unwrap(), "(+ 1 2)");
    assert_eq!(eval_multi(&["(macroexpand 5)"]).unwrap(), "5");
}

#[test]
fn test_macros_expand_inside_lambda_bodies() {
    let result = eval_multi(&[
        "(define-macro square [x] (list '* x x))",
        "(define f (lambda [n] (square (+ n 1))))",
        "(f 3)",
    ]);
    assert_eq!(result.unwrap(), "16");
}

#[test]
fn test_macros_are_reachable_through_their_module() {
    let result = eval_multi(&[
        "(module util) (define-macro twice [x] (list '+ x x)) (module app)",
        "(util/twice 21)",
    ]);
    assert_eq!(result.unwrap(), "42");
}
