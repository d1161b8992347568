use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use wonder_core::ErrorKind;
use wonderscript::{Interpreter, InterpreterOptions};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

// Fresh scratch directory per test
fn scratch_dir() -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("wonder_test_{}_{n}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

// Run a source file through the `ws` binary
fn run_ws_file(content: &str) -> Result<String, String> {
    let dir = scratch_dir();
    let file_path = write(&dir, "main.ws", content);

    let output = Command::new(env!("CARGO_BIN_EXE_ws"))
        .arg(&file_path)
        .output()
        .map_err(|e| e.to_string())?;

    fs::remove_dir_all(&dir).ok();

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

#[test]
fn test_multiple_expressions() {
    let result = run_ws_file(
        r#"
(define a 1)
(define b 2)
(+ a b)
"#,
    );
    // Should print the last expression result
    assert_eq!(result.unwrap(), "3");
}

#[test]
fn test_comments_between_forms() {
    let result = run_ws_file(
        r#"
; leading comment
(define x 10) ; trailing comment
; another
(* x 2)
"#,
    );
    assert_eq!(result.unwrap(), "20");
}

#[test]
fn test_shebang_is_skipped() {
    let result = run_ws_file("#!/usr/bin/env ws\n(str \"ok\")\n");
    assert_eq!(result.unwrap(), "\"ok\"");
}

#[test]
fn test_console_output() {
    let result = run_ws_file("(.log host/console \"hello\" 42)\n:done");
    assert_eq!(result.unwrap(), "hello 42\n:done");
}

#[test]
fn test_errors_exit_nonzero() {
    let err = run_ws_file("(define x 1)\n(undefined-fn x)").unwrap_err();
    assert!(err.contains("Undefined variable: 'undefined-fn'"));
}

#[test]
fn test_syntax_error_reports_location() {
    let err = run_ws_file("(define x\n  (+ 1 2)").unwrap_err();
    assert!(err.contains("main.ws"));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let interp = Interpreter::new();
    let err = interp.load_file("/definitely/not/here.ws").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Io(_)));
}

#[test]
fn test_load_file_returns_last_value() {
    let dir = scratch_dir();
    let path = write(&dir, "prog.ws", "(define xs [1 2 3])\n(reduce + xs)");
    let value = Interpreter::new().load_file(&path).unwrap();
    assert_eq!(value.to_string(), "6");
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_require_by_relative_path() {
    let dir = scratch_dir();
    write(&dir, "lib/util.ws", "(module util)\n(define double (lambda [x] (* 2 x)))");
    let main = write(&dir, "main.ws", "(require \"lib/util.ws\")\n(util/double 21)");

    let value = Interpreter::new().load_file(&main).unwrap();
    assert_eq!(value.to_string(), "42");
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_require_by_module_name() {
    let dir = scratch_dir();
    write(&dir, "src/a/b.ws", "(module a.b)\n(define greeting \"hi\")");
    let main = write(&dir, "main.ws", "(require a.b)\na.b/greeting");

    let value = Interpreter::new().load_file(&main).unwrap();
    assert_eq!(value.to_string(), "\"hi\"");
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_require_leaves_the_active_module_alone() {
    let dir = scratch_dir();
    write(&dir, "src/lib.ws", "(module lib)\n(define v 1)");
    let interp = Interpreter::with_options(InterpreterOptions::new().source_root(&dir));

    interp.eval_str("(module app) (require lib)", "test").unwrap();
    assert_eq!(interp.current_module().to_string(), "app");
    assert_eq!(interp.eval_str("lib/v", "test").unwrap().to_string(), "1");
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_require_checks_the_module_was_defined() {
    let dir = scratch_dir();
    write(&dir, "src/quiet.ws", "(define nothing nil)");
    let interp = Interpreter::with_options(InterpreterOptions::new().source_root(&dir));

    let err = interp.eval_str("(require quiet)", "test").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Module(_)));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_require_missing_file() {
    let dir = scratch_dir();
    let interp = Interpreter::with_options(InterpreterOptions::new().source_root(&dir));
    let err = interp.eval_str("(require \"nope.ws\")", "test").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Io(_)));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_read_file_evaluates_another_file() {
    let dir = scratch_dir();
    let lib = write(&dir, "lib.ws", "(define shared 41)\n(+ shared 1)");
    let interp = Interpreter::new();

    let code = format!("(read-file {:?})", lib.display().to_string());
    assert_eq!(interp.eval_str(&code, "test").unwrap().to_string(), "42");
    assert_eq!(interp.eval_str("shared", "test").unwrap().to_string(), "41");
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_file_and_dir_are_bound_per_file() {
    let dir = scratch_dir();
    let path = write(&dir, "where.ws", "(module where.am.i)\n[*file* *dir*]");
    let value = Interpreter::new().load_file(&path).unwrap();

    let expected = format!(
        "[{:?} {:?}]",
        path.display().to_string(),
        dir.display().to_string()
    );
    assert_eq!(value.to_string(), expected);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_file_is_unbound_outside_files() {
    let err = Interpreter::new().eval_str("*file*", "test").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UndefinedVariable(_)));
}

#[test]
fn test_pprint_prints_the_readable_form() {
    let result = run_ws_file("(pprint \"quoted\")\n(p [1 :k])\n(pprint nil)");
    assert_eq!(result.unwrap(), "\"quoted\"\n[1 :k]\nnil\nnil");
}
