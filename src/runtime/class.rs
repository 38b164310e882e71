//! Classes and the attribute lookup rules.
//!
//! A class is immutable after creation and shared by all of its instances.
//! Lookup walks the parent chain; access is gated by the private flag and by
//! whether the request comes through an instance (non-static attributes) or
//! the class itself (static attributes). Privileged handles represent access
//! "as the object itself" and may reach private attributes.

use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::attr::Attribute;
use crate::runtime::error::OpError;
use crate::runtime::instance::InstanceHandle;
use crate::runtime::scope::ScopeRef;
use crate::runtime::value::{self, Value};

#[derive(Debug)]
pub struct Class {
    name: String,
    parent: Option<Rc<Class>>,
    attributes: HashMap<String, Attribute>,
}

/// A class reference plus the access mode it was obtained under.
#[derive(Clone)]
pub struct ClassHandle {
    pub class: Rc<Class>,
    pub privileged: bool,
}

impl std::fmt::Debug for ClassHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Class({})", self.class.name)
    }
}

impl ClassHandle {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            privileged: false,
        }
    }

    pub fn as_self(&self) -> Self {
        Self {
            class: self.class.clone(),
            privileged: true,
        }
    }
}

impl Class {
    pub fn create(name: &str, parent: Option<Rc<Class>>, attrs: Vec<Attribute>) -> Rc<Class> {
        let mut attributes = HashMap::new();
        for attr in attrs {
            if let Value::Func(f) = attr.value() {
                f.class_name.replace(Some(name.to_string()));
            }
            attributes.insert(attr.name().to_string(), attr);
        }
        Rc::new(Self {
            name: name.to_string(),
            parent,
            attributes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Class>> {
        self.parent.as_ref()
    }

    /// Finds an attribute by name. Requests through an instance see only
    /// non-static attributes, requests on the class itself only static ones;
    /// private attributes need a privileged caller.
    pub(crate) fn index(
        &self,
        key: &str,
        has_instance: bool,
        allow_private: bool,
    ) -> Result<&Attribute, OpError> {
        let req_static = !has_instance;
        if let Some(attr) = self.attributes.get(key) {
            if !allow_private && attr.is_private() {
                return Err(OpError::msg(format!(
                    "tried to access private attribute {key}"
                )));
            } else if attr.is_static() == req_static && (allow_private || !attr.is_private()) {
                return Ok(attr);
            }
        } else if let Some(parent) = &self.parent {
            return parent.index(key, has_instance, allow_private);
        }
        Err(OpError::msg(format!(
            "undefined attribute {key} on class {}",
            self.name
        )))
    }

    pub fn get(
        &self,
        scope: &ScopeRef,
        key: &str,
        inst: Option<&InstanceHandle>,
        allow_private: bool,
    ) -> Result<Value, OpError> {
        let attr = self.index(key, inst.is_some(), allow_private)?;
        attr.get(scope, key, inst, allow_private)
    }

    pub fn set(
        &self,
        scope: &ScopeRef,
        key: &str,
        val: Value,
        inst: Option<&InstanceHandle>,
        allow_private: bool,
    ) -> Result<Value, OpError> {
        let attr = self.index(key, inst.is_some(), allow_private)?;
        attr.set(scope, key, val, inst, allow_private)
    }

    pub fn op(&self, scope: &ScopeRef, method: &str, args: Vec<Value>) -> Result<Value, OpError> {
        let attr = self.index(method, false, true)?;
        attr.call(scope, None, args)
    }

    /// Constructs an instance: run the class's `new` if it has one, otherwise
    /// copy key/value pairs from any Table arguments, then verify required
    /// attributes across the inheritance chain.
    pub fn new_instance(
        class: &Rc<Class>,
        scope: &ScopeRef,
        args: Vec<Value>,
    ) -> Result<InstanceHandle, OpError> {
        let inst = InstanceHandle::fresh(class.clone());
        if let Ok(constructor) = class.index("new", true, true) {
            constructor.call(scope, Some(Value::Instance(inst.clone())), args)?;
        } else {
            for opts in &args {
                let Value::Instance(handle) = opts else {
                    continue;
                };
                if !handle.is_a("Table") {
                    continue;
                }
                let Some(table) = handle.table() else {
                    continue;
                };
                let entries: Vec<(Value, Value)> = {
                    let t = table.borrow();
                    t.keys.iter().cloned().zip(t.vals.iter().cloned()).collect()
                };
                for (key, val) in entries {
                    class.set(scope, &value::to_output(scope, &key), val, Some(&inst), true)?;
                }
            }
        }

        let mut cursor = Some(class.clone());
        while let Some(current) = cursor {
            for attr in current.attributes.values() {
                if !attr.is_static() && attr.refine().required {
                    let val = current.get(scope, attr.name(), Some(&inst), true)?;
                    if !value::is_truthy(scope, &val) {
                        return Err(OpError::msg(format!(
                            "required attribute {} was not given a value",
                            attr.name()
                        )));
                    }
                }
            }
            cursor = current.parent.clone();
        }
        Ok(inst)
    }
}

pub fn find_class(scope: &ScopeRef, class_name: &str) -> Result<Rc<Class>, OpError> {
    match scope.get(class_name) {
        Value::Nil => Err(OpError::msg(format!("undefined class {class_name}"))),
        Value::Class(handle) => Ok(handle.class),
        other => Err(OpError::msg(format!(
            "cannot use a {} as a class",
            value::type_of(&other)
        ))),
    }
}
