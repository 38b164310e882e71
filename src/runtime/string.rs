//! The String built-in class: byte-oriented text payload under `_val`.
//!
//! Indexing and slicing work on bytes; slices that split a multi-byte
//! sequence render lossily. `__add` concatenates with the stringified
//! right-hand side, whatever its type.

use std::rc::Rc;

use crate::runtime::attr::Attribute;
use crate::runtime::class::Class;
use crate::runtime::error::OpError;
use crate::runtime::instance;
use crate::runtime::table::int_key;
use crate::runtime::value::{self, Value};

fn payload(selfv: Option<&Value>) -> Result<String, OpError> {
    Ok(instance::self_instance(selfv)?.string())
}

fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn string_class() -> Rc<Class> {
    Class::create(
        "String",
        None,
        vec![
            Attribute::new("_val", Value::Str(String::new()), None),
            Attribute::method("new", |scope, selfv, args| {
                let inst = instance::self_instance(selfv)?;
                if !args.is_empty() {
                    inst.set_data("_val", Value::Str(value::to_output(scope, &args[0])));
                }
                Ok(Value::Nil)
            }),
            Attribute::method("__index", |_scope, selfv, args| {
                let text = payload(selfv)?;
                let bytes = text.as_bytes();
                match value::arg(&args, 0) {
                    Value::Range(start, end) => {
                        if start > bytes.len() || end > bytes.len() {
                            return Err(OpError::msg("range index out of range"));
                        }
                        Ok(Value::Str(bytes_to_string(&bytes[start..end])))
                    }
                    key => {
                        let Some(index) = int_key(&key) else {
                            return Err(OpError::msg("non int key used to index a string"));
                        };
                        if index >= bytes.len() {
                            return Err(OpError::msg("index out of range"));
                        }
                        Ok(Value::Str(bytes_to_string(&bytes[index..index + 1])))
                    }
                }
            }),
            Attribute::method("__assignindex", |scope, selfv, args| {
                let inst = instance::self_instance(selfv)?;
                let text = inst.string();
                let bytes = text.as_bytes();
                let (start, end) = match value::arg(&args, 0) {
                    Value::Range(start, end) => {
                        if start > bytes.len() || end > bytes.len() {
                            return Err(OpError::msg("range index out of range"));
                        }
                        (start, end)
                    }
                    key => {
                        let Some(index) = int_key(&key) else {
                            return Err(OpError::msg("non int key used to index a string"));
                        };
                        if index >= bytes.len() {
                            return Err(OpError::msg("index out of range"));
                        }
                        (index, index + 1)
                    }
                };
                let replacement = value::to_output(scope, &value::arg(&args, 1));
                let spliced = format!(
                    "{}{}{}",
                    bytes_to_string(&bytes[..start]),
                    replacement,
                    bytes_to_string(&bytes[end..])
                );
                inst.set_data("_val", Value::Str(spliced));
                Ok(Value::Instance(inst))
            }),
            Attribute::method("__add", |scope, selfv, args| {
                let text = payload(selfv)?;
                Ok(Value::Str(format!(
                    "{text}{}",
                    value::to_output(scope, &value::arg(&args, 0))
                )))
            }),
            Attribute::method("__eq", |scope, selfv, args| {
                let text = payload(selfv)?;
                Ok(Value::Bool(
                    text == value::to_output(scope, &value::arg(&args, 0)),
                ))
            }),
            Attribute::method("__len", |_scope, selfv, _args| {
                Ok(Value::Number(payload(selfv)?.len() as f64))
            }),
            Attribute::method("tobool", |_scope, selfv, _args| {
                Ok(Value::Bool(!payload(selfv)?.is_empty()))
            }),
            Attribute::method("tostring", |_scope, selfv, _args| {
                let inst = instance::self_instance(selfv)?;
                Ok(Value::Instance(inst))
            }),
        ],
    )
}
