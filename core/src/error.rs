//! Error taxonomy shared by the reader and the evaluator.

use std::fmt;

use thiserror::Error;

use crate::language::Value;

/// One entry of a reconstructed call stack.
///
/// Frames are produced by walking an environment's parent links, so the
/// trace is lexical: it names the scopes that enclose the failing form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceFrame {
    pub source: Option<String>,
    pub ident: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}:{}",
            self.ident,
            self.source.as_deref().unwrap_or("unknown"),
            self.line,
            self.column
        )
    }
}

/// Categories of interpreter errors.
#[derive(Error, Debug, Clone)]
pub enum ErrorKind {
    /// Malformed source text, located at the point the reader gave up.
    #[error("{message} at {file}:{line}:{column}")]
    Syntax {
        message: String,
        file: String,
        line: usize,
        column: usize,
    },

    #[error("Undefined variable: '{0}'")]
    UndefinedVariable(String),

    #[error("\"{name}\" wrong number of arguments, expected {expected}, got {actual}")]
    Arity {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("'{0}' is not invocable")]
    NotInvocable(String),

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("module error: {0}")]
    Module(String),

    /// An operand of the wrong shape reached a primitive or interop form.
    #[error("type error: {0}")]
    Type(String),

    #[error("{0}")]
    Io(String),

    /// A value raised by `throw`.
    #[error("{}", describe_thrown(.0))]
    Thrown(Value),

    #[error("'again' used outside of a loop or lambda body")]
    UncaughtRecursionPoint,
}

/// Error objects print as `Class: message`; anything else prints as itself.
fn describe_thrown(value: &Value) -> String {
    if let Value::Object(obj) = value
        && let Some(Value::String(message)) = obj.field("message")
    {
        return format!("{}: {message}", obj.class.name);
    }
    value.to_string()
}

/// An interpreter error with the stack trace of the scope it surfaced in.
#[derive(Error, Debug, Clone)]
#[error("{kind}")]
pub struct LispError {
    pub kind: ErrorKind,
    pub trace: Vec<TraceFrame>,
}

impl LispError {
    pub fn new(kind: ErrorKind) -> Self {
        LispError {
            kind,
            trace: Vec::new(),
        }
    }

    pub fn syntax(
        message: impl Into<String>,
        file: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self::new(ErrorKind::Syntax {
            message: message.into(),
            file: file.into(),
            line,
            column,
        })
    }

    pub fn undefined(name: impl fmt::Display) -> Self {
        Self::new(ErrorKind::UndefinedVariable(name.to_string()))
    }

    pub fn arity(name: impl Into<String>, expected: impl Into<String>, actual: usize) -> Self {
        Self::new(ErrorKind::Arity {
            name: name.into(),
            expected: expected.into(),
            actual,
        })
    }

    pub fn not_invocable(what: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NotInvocable(what.to_string()))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidExpression(message.into()))
    }

    pub fn module(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Module(message.into()))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type(message.into()))
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io(message.into()))
    }

    pub fn thrown(value: Value) -> Self {
        Self::new(ErrorKind::Thrown(value))
    }

    /// Attach a stack trace unless an inner scope already attached one.
    pub fn with_trace(mut self, trace: Vec<TraceFrame>) -> Self {
        if self.trace.is_empty() {
            self.trace = trace;
        }
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Message followed by one line per trace frame.
    pub fn report(&self) -> String {
        let mut out = self.kind.to_string();
        for frame in &self.trace {
            out.push_str("\n    at ");
            out.push_str(&frame.to_string());
        }
        out
    }
}

impl From<ErrorKind> for LispError {
    fn from(kind: ErrorKind) -> Self {
        LispError::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_errors_carry_their_location() {
        let err = LispError::syntax("unexpected '.'", "repl", 3, 7);
        assert_eq!(err.to_string(), "unexpected '.' at repl:3:7");
    }

    #[test]
    fn first_attached_trace_wins() {
        let inner = vec![TraceFrame {
            source: Some("a.ws".into()),
            ident: "inner".into(),
            line: 1,
            column: 2,
        }];
        let outer = vec![TraceFrame::default()];
        let err = LispError::undefined("x").with_trace(inner.clone()).with_trace(outer);
        assert_eq!(err.trace, inner);
        assert!(err.report().contains("inner@a.ws:1:2"));
    }

    #[test]
    fn thrown_plain_values_print_as_themselves() {
        let err = LispError::thrown(Value::keyword("oops"));
        assert_eq!(err.to_string(), ":oops");
    }

    #[test]
    fn arity_message_names_the_callable() {
        let err = LispError::arity("add", "2", 3);
        assert_eq!(
            err.to_string(),
            "\"add\" wrong number of arguments, expected 2, got 3"
        );
    }
}
