//! WonderScript runtime
//!
//! This crate provides the execution side of WonderScript:
//! - Tree-walking interpreter with macro expansion
//! - Closures with arity overloading and an `again` trampoline
//! - Protocols, record types and a module registry
//! - Standard library natives and host interop

/// Unwrap a `Completion::Value`, returning any `Completion::Again` to the
/// caller so the recursion signal keeps travelling outward.
macro_rules! value {
    ($completion:expr) => {
        match $completion? {
            $crate::interpreter::Completion::Value(value) => value,
            again @ $crate::interpreter::Completion::Again(_) => return Ok(again),
        }
    };
}

pub mod forms;
pub mod host;
pub mod interpreter;
pub mod lambda;
pub mod macros;
pub mod modules;
pub mod options;
pub mod primitives;
pub mod stdlib;
pub mod types;

// Re-export interpreter types
pub use interpreter::{Completion, Interpreter};
pub use options::InterpreterOptions;

// Re-export stdlib registration
pub use stdlib::register_stdlib;

pub use wonder_core::{LispError, Value};
