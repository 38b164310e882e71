//! Error plumbing and the built-in Error class family.
//!
//! Inside the object model errors travel as `OpError`: a bare message, a
//! raised Error instance (`spill`), or an already-located `RuntimeError`.
//! The evaluator wraps the first two into `RuntimeError` at the node that
//! triggered them, attaching span, trace, and a class instance for `cleanup`
//! matching.

use std::fmt;

use thiserror::Error;

use crate::excerpt;
use crate::runtime::attr::Attribute;
use crate::runtime::class::Class;
use crate::runtime::instance::{self, InstanceHandle};
use crate::runtime::scope::ScopeRef;
use crate::runtime::value::{self, Value};
use crate::token::Span;

#[derive(Debug, Clone)]
pub enum OpError {
    Message(String),
    Raise(InstanceHandle),
    Runtime(Box<RuntimeError>),
}

impl OpError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Parse failures surface as plain messages (their rendered form);
    /// runtime failures keep their location and trace.
    pub(crate) fn from_eval(err: crate::error::Error) -> OpError {
        match err {
            crate::error::Error::Parse(parse) => OpError::Message(parse.to_string()),
            crate::error::Error::Runtime(runtime) => OpError::Runtime(Box::new(runtime)),
        }
    }
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.write_str(message),
            Self::Raise(inst) => f.write_str(&inst.message()),
            Self::Runtime(err) => write!(f, "{err}"),
        }
    }
}

impl From<RuntimeError> for OpError {
    fn from(err: RuntimeError) -> Self {
        Self::Runtime(Box::new(err))
    }
}

/// A located runtime failure: the triggering span, a message, the Error
/// instance used for `cleanup` class matching, and a copy of the call trace.
#[derive(Debug, Clone, Error)]
#[error("{}", self.render())]
pub struct RuntimeError {
    pub is_file: bool,
    pub origin: String,
    pub span: Span,
    pub class_name: String,
    pub message: String,
    pub instance: InstanceHandle,
    pub trace: Vec<String>,
}

impl RuntimeError {
    fn render(&self) -> String {
        let (clip, location) = if self.is_file {
            (
                excerpt::from_file(&self.origin, self.span),
                format!("{}:{} {}", self.origin, self.span.start_line, self.message),
            )
        } else {
            (
                excerpt::from_str(&self.origin, self.span),
                format!("~:{} {}", self.span.start_line, self.message),
            )
        };
        let mut trace = self.trace.clone();
        trace.reverse();
        format!(
            "\n{}: {}\n{}\n{}\n{}",
            self.class_name,
            self.message,
            clip,
            location,
            trace.join("\n")
        )
    }
}

/// Raises an instance of the named error class, falling back to a bare
/// message when the class is not in scope.
pub fn raise(scope: &ScopeRef, class_name: &str, message: &str) -> OpError {
    match instance::create_handle(scope, class_name, vec![Value::Str(message.to_string())]) {
        Ok(inst) => OpError::Raise(inst),
        Err(_) => OpError::msg(message),
    }
}

/// A RuntimeError instance detached from any scope, for failures raised
/// before (or without) a namespace, e.g. a shadowed RuntimeError class.
pub fn detached_runtime_error(message: String) -> InstanceHandle {
    let base = error_class();
    let class = Class::create("RuntimeError", Some(base), vec![]);
    let inst = InstanceHandle::fresh(class);
    inst.set_data("message", Value::Str(message));
    inst
}

pub fn error_class() -> std::rc::Rc<Class> {
    Class::create(
        "Error",
        None,
        vec![
            Attribute::new(
                "message",
                Value::Str("an error has occurred".to_string()),
                None,
            ),
            Attribute::method("new", |scope, selfv, args| {
                let inst = instance::self_instance(selfv)?;
                if !args.is_empty() {
                    inst.set_data(
                        "message",
                        Value::Str(value::to_output(scope, &value::arg(&args, 0))),
                    );
                }
                Ok(Value::Nil)
            }),
            Attribute::method("__eq", |_scope, selfv, args| {
                let inst = instance::self_instance(selfv)?;
                match value::arg(&args, 0) {
                    Value::Instance(other) if other.is_a("Error") => {
                        Ok(Value::Bool(inst.message() == other.message()))
                    }
                    _ => Ok(Value::Bool(false)),
                }
            }),
            Attribute::method("tobool", |_scope, _selfv, _args| Ok(Value::Bool(true))),
            Attribute::method("tostring", |_scope, selfv, _args| {
                let inst = instance::self_instance(selfv)?;
                Ok(Value::Str(format!(
                    "{}: {}",
                    inst.class_name(),
                    inst.message()
                )))
            }),
        ],
    )
}
