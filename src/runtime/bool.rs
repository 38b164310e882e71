//! The Boolean built-in class: `_val` holds the truth value.

use std::rc::Rc;

use crate::runtime::attr::Attribute;
use crate::runtime::class::Class;
use crate::runtime::instance;
use crate::runtime::value::{self, Value};

pub fn boolean_class() -> Rc<Class> {
    Class::create(
        "Boolean",
        None,
        vec![
            Attribute::new("_val", Value::Bool(false), None),
            Attribute::method("new", |scope, selfv, args| {
                let inst = instance::self_instance(selfv)?;
                if !args.is_empty() {
                    inst.set_data("_val", Value::Bool(value::is_truthy(scope, &args[0])));
                }
                Ok(Value::Nil)
            }),
            Attribute::method("__eq", |scope, selfv, args| {
                let inst = instance::self_instance(selfv)?;
                Ok(Value::Bool(
                    inst.boolean() == value::is_truthy(scope, &value::arg(&args, 0)),
                ))
            }),
            Attribute::method("tobool", |_scope, selfv, _args| {
                let inst = instance::self_instance(selfv)?;
                Ok(Value::Instance(inst))
            }),
            Attribute::method("tostring", |_scope, selfv, _args| {
                let inst = instance::self_instance(selfv)?;
                Ok(Value::Str(
                    if inst.boolean() { "true" } else { "false" }.to_string(),
                ))
            }),
        ],
    )
}
