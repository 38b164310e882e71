//! Runtime value polymorphism.
//!
//! `Value` is the sealed sum every evaluation produces. The `Bool`, `Number`,
//! `Str` and `Table` variants are host payloads: built-in methods return them
//! raw and the call layer lifts them into class instances via `to_value`, so
//! user code only ever observes instances. `Break`/`Next`/`Return` are
//! ordinary control markers matched at block boundaries, never errors.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::runtime::class::ClassHandle;
use crate::runtime::error::OpError;
use crate::runtime::func::Func;
use crate::runtime::instance::{create, InstanceHandle};
use crate::runtime::scope::ScopeRef;
use crate::runtime::table::Table;
use crate::token::Span;

pub type TableRef = Rc<RefCell<Table>>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Table(TableRef),
    Class(ClassHandle),
    Instance(InstanceHandle),
    Func(Rc<Func>),
    Break,
    Next,
    Return(Vec<Value>),
    Spread(TableRef),
    Range(usize, usize),
    Member(Box<Member>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", type_of(self))
    }
}

/// A deferred index access bound to (source, key). Resolution happens on read
/// or write so that calling `source.key(...)` can extract `self`.
#[derive(Debug, Clone)]
pub struct Member {
    pub source: Value,
    pub key: Value,
    pub span: Span,
}

impl Member {
    pub fn get(&self, scope: &ScopeRef) -> Result<Value, OpError> {
        op_index(scope, &self.source, &self.key)
    }

    pub fn set(&self, scope: &ScopeRef, val: Value) -> Result<Value, OpError> {
        op_assign_index(scope, &self.source, &self.key, val)
    }
}

pub fn type_of(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Bool(_) => "Boolean".to_string(),
        Value::Number(_) => "Number".to_string(),
        Value::Str(_) => "String".to_string(),
        Value::Table(_) => "Table".to_string(),
        Value::Class(_) => "Class".to_string(),
        Value::Instance(handle) => handle.class_name().to_string(),
        Value::Func(_) => "Func".to_string(),
        Value::Break => "break".to_string(),
        Value::Next => "next".to_string(),
        Value::Return(_) => "return".to_string(),
        Value::Spread(_) => "spread".to_string(),
        Value::Range(_, _) => "range".to_string(),
        Value::Member(_) => "member".to_string(),
    }
}

pub fn is_a(value: &Value, name: &str) -> bool {
    match value {
        Value::Instance(handle) => handle.is_a(name),
        Value::Class(_) => name == "Class",
        Value::Func(_) => name == "Func",
        Value::Bool(_) => name == "Boolean",
        Value::Number(_) => name == "Number",
        Value::Str(_) => name == "String",
        Value::Table(_) => name == "Table",
        _ => false,
    }
}

/// Dispatches a dunder or named method on the target's class.
pub fn op(
    scope: &ScopeRef,
    target: &Value,
    method: &str,
    args: Vec<Value>,
) -> Result<Value, OpError> {
    match target {
        Value::Instance(handle) => handle.op(scope, method, args),
        Value::Class(handle) => handle.class.op(scope, method, args),
        Value::Func(_) => Err(OpError::msg(format!("cannot use {method} on Func"))),
        other => Err(OpError::msg(format!(
            "cannot use {method} on {}",
            type_of(other)
        ))),
    }
}

pub fn op_index(scope: &ScopeRef, target: &Value, key: &Value) -> Result<Value, OpError> {
    match target {
        Value::Instance(handle) => handle.index(scope, key),
        Value::Class(handle) => {
            handle
                .class
                .get(scope, &to_output(scope, key), None, handle.privileged)
        }
        Value::Func(_) => Err(OpError::msg("cannot index on Func")),
        other => Err(OpError::msg(format!(
            "cannot index {} on {}",
            to_output(scope, key),
            type_of(other)
        ))),
    }
}

pub fn op_assign_index(
    scope: &ScopeRef,
    target: &Value,
    key: &Value,
    val: Value,
) -> Result<Value, OpError> {
    match target {
        Value::Instance(handle) => handle.assign_index(scope, key, val),
        Value::Class(handle) => {
            handle
                .class
                .set(scope, &to_output(scope, key), val, None, handle.privileged)
        }
        Value::Func(_) => Err(OpError::msg("cannot assign index on Func")),
        other => Err(OpError::msg(format!(
            "cannot assign index {} on {}",
            to_output(scope, key),
            type_of(other)
        ))),
    }
}

pub fn to_output(scope: &ScopeRef, value: &Value) -> String {
    match value {
        Value::Str(text) => text.clone(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Number(n) => format_number(*n),
        Value::Table(table) => Table::render(scope, table),
        Value::Member(member) => match member.get(scope) {
            Ok(resolved) => to_output(scope, &resolved),
            Err(_) => String::new(),
        },
        Value::Instance(handle) => handle.to_output(scope),
        Value::Class(handle) => format!("#<Class {}>", handle.class.name()),
        Value::Func(func) => func.to_output(),
        _ => String::new(),
    }
}

/// Shortest-roundtrip float formatting; whole numbers print without a dot.
pub fn format_number(n: f64) -> String {
    format!("{n}")
}

pub fn is_truthy(scope: &ScopeRef, value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0,
        Value::Str(text) => !text.is_empty(),
        Value::Table(_) => true,
        Value::Member(member) => match member.get(scope) {
            Ok(resolved) => is_truthy(scope, &resolved),
            Err(_) => false,
        },
        Value::Instance(handle) => handle.truthy(scope),
        Value::Class(_) | Value::Func(_) => true,
        _ => false,
    }
}

pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Str(text) => text.parse().unwrap_or(0.0),
        Value::Bool(_) => 0.0,
        Value::Instance(handle) => {
            if handle.is_a("Number") {
                handle.number()
            } else if handle.is_a("String") {
                handle.string().parse().unwrap_or(0.0)
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Lifts raw host payloads into instances of their built-in classes.
/// Instances, classes and markers pass through untouched.
pub fn to_value(scope: &ScopeRef, value: Value) -> Result<Value, OpError> {
    match value {
        Value::Bool(b) => create(scope, "Boolean", vec![Value::Bool(b)]),
        Value::Str(text) => create(scope, "String", vec![Value::Str(text)]),
        Value::Number(n) => create(scope, "Number", vec![Value::Number(n)]),
        Value::Nil => create(scope, "Nil", vec![]),
        Value::Table(table) => create(scope, "Table", vec![Value::Table(table)]),
        other => Ok(other),
    }
}

pub fn nil_instance(scope: &ScopeRef) -> Result<Value, OpError> {
    create(scope, "Nil", vec![])
}

/// The access mode an object grants to its own methods: instances and classes
/// become privileged handles, everything else is itself.
pub fn self_value(value: &Value) -> Value {
    match value {
        Value::Instance(handle) => Value::Instance(handle.as_self()),
        Value::Class(handle) => Value::Class(handle.as_self()),
        other => other.clone(),
    }
}

pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Nil)
}
