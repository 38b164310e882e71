//! The Nil built-in class. Carries no payload; equal only to other Nils.

use std::rc::Rc;

use crate::runtime::attr::Attribute;
use crate::runtime::class::Class;
use crate::runtime::value::{self, Value};

pub fn nil_class() -> Rc<Class> {
    Class::create(
        "Nil",
        None,
        vec![
            Attribute::method("__eq", |_scope, _selfv, args| {
                Ok(Value::Bool(value::is_a(&value::arg(&args, 0), "Nil")))
            }),
            Attribute::method("tobool", |_scope, _selfv, _args| Ok(Value::Bool(false))),
            Attribute::method("tostring", |_scope, _selfv, _args| {
                Ok(Value::Str("nil".to_string()))
            }),
        ],
    )
}
