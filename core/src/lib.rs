//! Core language definition for WonderScript
//!
//! This crate contains the data model, reader, environment chain and
//! collection abstractions. It does not evaluate anything; the
//! interpreter lives in the `wonderscript` crate.

pub mod builder;
pub mod collections;
pub mod environment;
pub mod error;
pub mod interner;
pub mod json;
pub mod language;
pub mod native;
pub mod reader;
pub mod stream;

// Re-export commonly used items for convenience
pub use builder::{CollectionMode, LiteralBuilder, NativeBuilder, PersistentBuilder};
pub use collections::{CollectionOps, StandardCollections};
pub use environment::{Binding, Environment, Metadata};
pub use error::{ErrorKind, LispError, TraceFrame};
pub use interner::InternedSymbol;
pub use json::read_json;
pub use language::{
    Arity, Clause, LambdaCell, ListValue, MapValue, Module, ModuleContext, Name, NativeFunction,
    ObjectValue, PersistentMap, PersistentSet, PersistentVector, ProtocolValue, RegexValue,
    SetValue, TypeValue, Value, VectorValue,
};
pub use native::{NativeFn, Runtime};
pub use reader::{Reader, read_file, read_string, read_string_with};
pub use stream::CharStream;
