//! Global built-in functions and the default namespace.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use crate::interpreter;
use crate::runtime::bool::boolean_class;
use crate::runtime::class::{Class, ClassHandle};
use crate::runtime::error::{self, raise, OpError};
use crate::runtime::func::{BuiltinFn, Func};
use crate::runtime::nil::nil_class;
use crate::runtime::number::number_class;
use crate::runtime::require;
use crate::runtime::scope::{Output, Scope, ScopeRef};
use crate::runtime::string::string_class;
use crate::runtime::table::table_class;
use crate::runtime::value::{self, Value};

/// A scope seeded with the core functions and built-in classes. All child
/// scopes share `out` (stdout when not given) as the `print` sink.
pub fn default_namespace(out: Option<Output>) -> ScopeRef {
    let out = out.unwrap_or_else(|| Rc::new(RefCell::new(io::stdout())) as Output);
    let scope = Scope::root(out);

    let functions: &[(&str, BuiltinFn)] = &[
        ("new", std_new),
        ("spill", std_spill),
        ("eval", std_eval),
        ("require", std_require),
        ("print", std_print),
        ("typeof", std_typeof),
        ("delete", std_delete),
        ("tostring", std_tostring),
        ("tonumber", std_tonumber),
    ];
    for (name, body) in functions {
        scope.set(name, Value::Func(Func::builtin(name, *body)));
    }

    scope.set("Boolean", Value::Class(ClassHandle::new(boolean_class())));
    scope.set("Nil", Value::Class(ClassHandle::new(nil_class())));
    scope.set("Number", Value::Class(ClassHandle::new(number_class())));
    scope.set("String", Value::Class(ClassHandle::new(string_class())));
    scope.set("Table", Value::Class(ClassHandle::new(table_class())));

    let error = error::error_class();
    scope.set("Error", Value::Class(ClassHandle::new(error.clone())));
    scope.set(
        "ArgumentError",
        Value::Class(ClassHandle::new(Class::create(
            "ArgumentError",
            Some(error.clone()),
            vec![],
        ))),
    );
    scope.set(
        "RuntimeError",
        Value::Class(ClassHandle::new(Class::create(
            "RuntimeError",
            Some(error),
            vec![],
        ))),
    );
    scope
}

fn std_new(scope: &ScopeRef, _selfv: Option<&Value>, args: Vec<Value>) -> Result<Value, OpError> {
    let Some(first) = args.first() else {
        return Err(OpError::msg("not enough arguments to new"));
    };
    let Value::Class(handle) = first else {
        return Err(OpError::msg(format!(
            "wrong value type {} passed to new",
            value::type_of(first)
        )));
    };
    let inst = Class::new_instance(&handle.class, scope, args[1..].to_vec())?;
    Ok(Value::Instance(inst))
}

fn std_spill(scope: &ScopeRef, _selfv: Option<&Value>, args: Vec<Value>) -> Result<Value, OpError> {
    let Some(first) = args.first() else {
        return Err(raise(scope, "ArgumentError", "not enough arguments to spill"));
    };
    match first {
        Value::Instance(handle) if args.len() == 1 && handle.is_a("String") => {
            Err(OpError::msg(handle.string()))
        }
        Value::Instance(handle) if handle.is_a("Error") => Err(OpError::Raise(handle.clone())),
        Value::Class(handle) => {
            let inst = Class::new_instance(&handle.class, scope, args[1..].to_vec())?;
            if !inst.is_a("Error") {
                return Err(raise(scope, "ArgumentError", "cannot spill non-error classes"));
            }
            Err(OpError::Raise(inst))
        }
        _ => Err(raise(scope, "ArgumentError", "bad params passed to spill")),
    }
}

fn std_eval(scope: &ScopeRef, _selfv: Option<&Value>, args: Vec<Value>) -> Result<Value, OpError> {
    let Some(first) = args.first() else {
        return Err(raise(scope, "ArgumentError", "not enough arguments to eval"));
    };
    match first {
        Value::Instance(handle) if handle.is_a("String") => {
            interpreter::eval_str(scope, &handle.string()).map_err(OpError::from_eval)
        }
        _ => Err(OpError::msg("wrong value type passed to eval")),
    }
}

fn std_require(
    scope: &ScopeRef,
    _selfv: Option<&Value>,
    args: Vec<Value>,
) -> Result<Value, OpError> {
    let Some(first) = args.first() else {
        return Err(raise(scope, "ArgumentError", "not enough arguments to require"));
    };
    match first {
        Value::Instance(handle) if handle.is_a("String") => {
            require::require_path(scope, &handle.string())
        }
        _ => Err(OpError::msg("wrong value type passed to require")),
    }
}

fn std_print(scope: &ScopeRef, _selfv: Option<&Value>, args: Vec<Value>) -> Result<Value, OpError> {
    let rendered: Vec<String> = args.iter().map(|a| value::to_output(scope, a)).collect();
    scope.write(&format!("{}\n", rendered.join(" ")));
    Ok(Value::Nil)
}

fn std_typeof(
    _scope: &ScopeRef,
    _selfv: Option<&Value>,
    args: Vec<Value>,
) -> Result<Value, OpError> {
    let Some(first) = args.first() else {
        return Err(OpError::msg("not enough arguments to typeof"));
    };
    Ok(Value::Str(value::type_of(first)))
}

fn std_delete(
    scope: &ScopeRef,
    _selfv: Option<&Value>,
    args: Vec<Value>,
) -> Result<Value, OpError> {
    if args.len() < 2 {
        return Ok(Value::Nil);
    }
    let target = &args[0];
    if !matches!(target, Value::Instance(_) | Value::Class(_)) {
        return Ok(Value::Nil);
    }
    for member in &args[1..] {
        value::op(scope, target, "__del", vec![member.clone()])?;
    }
    Ok(Value::Nil)
}

fn std_tostring(
    scope: &ScopeRef,
    _selfv: Option<&Value>,
    args: Vec<Value>,
) -> Result<Value, OpError> {
    let Some(first) = args.first() else {
        return Err(OpError::msg("not enough arguments to tostring"));
    };
    Ok(Value::Str(value::to_output(scope, first)))
}

fn std_tonumber(
    scope: &ScopeRef,
    _selfv: Option<&Value>,
    args: Vec<Value>,
) -> Result<Value, OpError> {
    crate::runtime::instance::create(scope, "Number", args)
}
