//! Runtime object model shared by the evaluator.
//!
//! Values, the lexical scope chain, the metaobject protocol (classes,
//! instances, attributes), and the built-in class and function surface.

pub mod attr;
pub mod bool;
pub mod builtins;
pub mod class;
pub mod error;
pub mod func;
pub mod instance;
pub mod nil;
pub mod number;
pub mod require;
pub mod scope;
pub mod string;
pub mod table;
pub mod value;

pub use builtins::default_namespace;
pub use require::register_lib;
pub use scope::{Output, Scope, ScopeRef};
pub use value::Value;
