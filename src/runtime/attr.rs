//! Class attributes and their refinements.

use std::cell::RefCell;

use crate::runtime::error::OpError;
use crate::runtime::func::{self, BuiltinFn, Func};
use crate::runtime::instance::InstanceHandle;
use crate::runtime::scope::ScopeRef;
use crate::runtime::value::{self, Value};

/// Constraints layered onto an attribute: `const`, a required class for
/// assigned values, construction-time `required`, and getter/setter
/// redirection for non-self access.
#[derive(Debug, Clone, Default)]
pub struct Refinement {
    pub constant: bool,
    pub class: Option<String>,
    pub required: bool,
    pub get: Option<String>,
    pub set: Option<String>,
}

#[derive(Debug)]
pub struct Attribute {
    name: String,
    val: RefCell<Value>,
    private: bool,
    static_: bool,
    refine: Refinement,
}

impl Attribute {
    pub fn new(name: &str, val: Value, refine: Option<Refinement>) -> Self {
        let (private, static_) = crate::parser::name_flags(name);
        Self {
            name: name.to_string(),
            val: RefCell::new(val),
            private,
            static_,
            refine: refine.unwrap_or_default(),
        }
    }

    /// A built-in method attribute; methods are always constant.
    pub fn method(name: &str, builtin: BuiltinFn) -> Self {
        Self::new(
            name,
            Value::Func(Func::builtin(name, builtin)),
            Some(Refinement {
                constant: true,
                ..Refinement::default()
            }),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn is_static(&self) -> bool {
        self.static_
    }

    pub fn refine(&self) -> &Refinement {
        &self.refine
    }

    pub fn value(&self) -> Value {
        self.val.borrow().clone()
    }

    pub fn call(
        &self,
        scope: &ScopeRef,
        selfv: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, OpError> {
        let callee = self.value();
        match callee {
            Value::Func(f) => func::call(&f, scope, selfv, args),
            other => Err(OpError::msg(format!(
                "tried to call a non callable object ({})",
                value::type_of(&other)
            ))),
        }
    }

    pub fn get(
        &self,
        scope: &ScopeRef,
        key: &str,
        inst: Option<&InstanceHandle>,
        allow_private: bool,
    ) -> Result<Value, OpError> {
        if let Some(inst) = inst {
            if !allow_private {
                if let Some(getter) = &self.refine.get {
                    return inst.op(scope, getter, vec![]);
                }
            }
            if let Some(val) = inst.get_data(key) {
                return Ok(val);
            }
        }
        Ok(self.value())
    }

    pub fn set(
        &self,
        scope: &ScopeRef,
        key: &str,
        val: Value,
        inst: Option<&InstanceHandle>,
        allow_private: bool,
    ) -> Result<Value, OpError> {
        if self.refine.constant {
            return Err(OpError::msg(format!(
                "cannot assign to constant attribute {}",
                self.name
            )));
        }
        if let Some(class) = &self.refine.class {
            if !value::is_a(&val, class) {
                return Err(OpError::msg(format!(
                    "incorrect type {} passed to attribute {}",
                    value::type_of(&val),
                    self.name
                )));
            }
        }
        if let Some(inst) = inst {
            if !allow_private {
                if let Some(setter) = &self.refine.set {
                    return inst.op(scope, setter, vec![val]);
                }
            }
            inst.set_data(key, val.clone());
            return Ok(val);
        }
        *self.val.borrow_mut() = val.clone();
        Ok(val)
    }
}

/// Reads refinement settings out of an evaluated `{ ... }` table, e.g.
/// `attr size = 0, { const: false, type: Number, required: true }`.
pub fn refinement_from_table(
    scope: &ScopeRef,
    table: &crate::runtime::value::TableRef,
) -> Result<Refinement, OpError> {
    let entries: Vec<(Value, Value)> = {
        let t = table.borrow();
        t.keys.iter().cloned().zip(t.vals.iter().cloned()).collect()
    };
    let mut refine = Refinement::default();
    for (key, val) in entries {
        let Some(name) = string_payload(&key) else {
            continue;
        };
        match name.as_str() {
            "const" => refine.constant = value::is_truthy(scope, &val),
            "required" => refine.required = value::is_truthy(scope, &val),
            "type" => {
                refine.class = Some(match &val {
                    Value::Class(handle) => handle.class.name().to_string(),
                    other => string_payload(other).ok_or_else(|| {
                        OpError::msg("invalid value provided to type refinement")
                    })?,
                })
            }
            "get" => {
                refine.get = Some(match &val {
                    Value::Func(f) => f.name.clone(),
                    other => string_payload(other)
                        .ok_or_else(|| OpError::msg("invalid value provided to get refinement"))?,
                })
            }
            "set" => {
                refine.set = Some(match &val {
                    Value::Func(f) => f.name.clone(),
                    other => string_payload(other)
                        .ok_or_else(|| OpError::msg("invalid value provided to set refinement"))?,
                })
            }
            other => return Err(OpError::msg(format!("invalid refinement {other}"))),
        }
    }
    Ok(refine)
}

fn string_payload(value: &Value) -> Option<String> {
    match value {
        Value::Str(text) => Some(text.clone()),
        Value::Instance(handle) if handle.is_a("String") => Some(handle.string()),
        _ => None,
    }
}
