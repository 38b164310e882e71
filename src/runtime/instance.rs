//! Instances and the two access modes onto them.
//!
//! An `InstanceHandle` pairs the shared instance storage with an access mode:
//! the plain handle sees only public attributes, while the privileged handle
//! (bound as `self` inside methods) also reaches private ones. Primitive
//! payloads live in the data map under conventional keys (`_val`, `_tbl`,
//! `message`).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::runtime::class::{find_class, Class};
use crate::runtime::error::OpError;
use crate::runtime::scope::ScopeRef;
use crate::runtime::value::{self, TableRef, Value};

#[derive(Debug)]
pub struct Instance {
    class: Rc<Class>,
    data: RefCell<HashMap<String, Value>>,
}

#[derive(Clone)]
pub struct InstanceHandle {
    inst: Rc<Instance>,
    privileged: bool,
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.class_name())
    }
}

/// Constructs an instance of a class looked up by name in the scope.
pub fn create(scope: &ScopeRef, class_name: &str, args: Vec<Value>) -> Result<Value, OpError> {
    Ok(Value::Instance(create_handle(scope, class_name, args)?))
}

pub fn create_handle(
    scope: &ScopeRef,
    class_name: &str,
    args: Vec<Value>,
) -> Result<InstanceHandle, OpError> {
    Class::new_instance(&find_class(scope, class_name)?, scope, args)
}

/// The instance receiver of a built-in method.
pub fn self_instance(selfv: Option<&Value>) -> Result<InstanceHandle, OpError> {
    match selfv {
        Some(Value::Instance(handle)) => Ok(handle.clone()),
        _ => Err(OpError::msg("method called without an instance receiver")),
    }
}

impl InstanceHandle {
    pub fn fresh(class: Rc<Class>) -> Self {
        Self {
            inst: Rc::new(Instance {
                class,
                data: RefCell::new(HashMap::new()),
            }),
            privileged: false,
        }
    }

    pub fn as_self(&self) -> Self {
        Self {
            inst: self.inst.clone(),
            privileged: true,
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.inst.class
    }

    pub fn class_name(&self) -> &str {
        self.inst.class.name()
    }

    pub fn ptr_eq(&self, other: &InstanceHandle) -> bool {
        Rc::ptr_eq(&self.inst, &other.inst)
    }

    pub fn is_a(&self, name: &str) -> bool {
        let mut class = Some(self.inst.class.clone());
        while let Some(current) = class {
            if current.name() == name {
                return true;
            }
            class = current.parent().cloned();
        }
        false
    }

    pub fn get_data(&self, key: &str) -> Option<Value> {
        self.inst.data.borrow().get(key).cloned()
    }

    pub fn set_data(&self, key: &str, val: Value) {
        self.inst.data.borrow_mut().insert(key.to_string(), val);
    }

    /// Method dispatch as the object itself (private lookup allowed).
    pub fn op(&self, scope: &ScopeRef, method: &str, args: Vec<Value>) -> Result<Value, OpError> {
        let attr = self.inst.class.index(method, true, true)?;
        attr.call(scope, Some(Value::Instance(self.clone())), args)
    }

    /// Attribute read with `__index` fallback when no attribute matches.
    pub fn index(&self, scope: &ScopeRef, key: &Value) -> Result<Value, OpError> {
        let key_str = value::to_output(scope, key);
        if self.inst.class.index(&key_str, true, self.privileged).is_err() {
            if let Ok(fallback) = self.inst.class.index("__index", true, true) {
                return fallback.call(scope, Some(Value::Instance(self.clone())), vec![key.clone()]);
            }
        }
        self.inst
            .class
            .get(scope, &key_str, Some(self), self.privileged)
    }

    /// Attribute write with `__assignindex` fallback.
    pub fn assign_index(
        &self,
        scope: &ScopeRef,
        key: &Value,
        val: Value,
    ) -> Result<Value, OpError> {
        let key_str = value::to_output(scope, key);
        if self.inst.class.index(&key_str, true, self.privileged).is_err() {
            if let Ok(fallback) = self.inst.class.index("__assignindex", true, true) {
                return fallback.call(
                    scope,
                    Some(Value::Instance(self.clone())),
                    vec![key.clone(), val],
                );
            }
        }
        self.inst
            .class
            .set(scope, &key_str, val, Some(self), self.privileged)
    }

    pub fn number(&self) -> f64 {
        match self.get_data("_val") {
            Some(Value::Number(n)) => n,
            _ => 0.0,
        }
    }

    pub fn string(&self) -> String {
        match self.get_data("_val") {
            Some(Value::Str(text)) => text,
            _ => String::new(),
        }
    }

    pub fn boolean(&self) -> bool {
        matches!(self.get_data("_val"), Some(Value::Bool(true)))
    }

    pub fn table(&self) -> Option<TableRef> {
        match self.get_data("_tbl") {
            Some(Value::Table(table)) => Some(table),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self.get_data("message") {
            Some(Value::Str(text)) => text,
            Some(other) => value::type_of(&other),
            None => String::new(),
        }
    }

    pub fn truthy(&self, scope: &ScopeRef) -> bool {
        match self.op(scope, "tobool", vec![]) {
            Ok(Value::Instance(result)) if result.is_a("Boolean") => result.boolean(),
            Ok(_) | Err(_) => true,
        }
    }

    pub fn to_output(&self, scope: &ScopeRef) -> String {
        match self.op(scope, "tostring", vec![]) {
            Ok(Value::Instance(result)) if result.is_a("String") => result.string(),
            _ => format!("#<Instance of {}>", self.class_name()),
        }
    }
}
