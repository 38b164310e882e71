//! The Number built-in class: f64 payload under `_val`.
//!
//! Arithmetic stays in f64; shifts and bitwise operators truncate both
//! operands to i64 first. `__compare` returns -1/0/1 and backs all four
//! ordering operators.

use std::rc::Rc;

use crate::runtime::attr::Attribute;
use crate::runtime::class::Class;
use crate::runtime::error::OpError;
use crate::runtime::instance::{self, InstanceHandle};
use crate::runtime::value::{self, Value};

fn operands(
    verb: &str,
    selfv: Option<&Value>,
    args: &[Value],
) -> Result<(f64, f64), OpError> {
    let inst = instance::self_instance(selfv)?;
    let other = value::arg(args, 0);
    if !value::is_a(&other, "Number") {
        return Err(OpError::msg(format!(
            "cannot {verb} number and {}",
            value::type_of(&other)
        )));
    }
    Ok((inst.number(), value::to_number(&other)))
}

fn receiver(selfv: Option<&Value>) -> Result<InstanceHandle, OpError> {
    instance::self_instance(selfv)
}

pub fn number_class() -> Rc<Class> {
    Class::create(
        "Number",
        None,
        vec![
            Attribute::new("_val", Value::Number(0.0), None),
            Attribute::method("new", |_scope, selfv, args| {
                let inst = receiver(selfv)?;
                if !args.is_empty() {
                    inst.set_data("_val", Value::Number(value::to_number(&args[0])));
                }
                Ok(Value::Nil)
            }),
            Attribute::method("__add", |_scope, selfv, args| {
                let (me, you) = operands("add", selfv, &args)?;
                Ok(Value::Number(me + you))
            }),
            Attribute::method("__sub", |_scope, selfv, args| {
                let (me, you) = operands("subtract", selfv, &args)?;
                Ok(Value::Number(me - you))
            }),
            Attribute::method("__mul", |_scope, selfv, args| {
                let (me, you) = operands("mul", selfv, &args)?;
                Ok(Value::Number(me * you))
            }),
            Attribute::method("__div", |_scope, selfv, args| {
                let (me, you) = operands("div", selfv, &args)?;
                Ok(Value::Number(me / you))
            }),
            Attribute::method("__mod", |_scope, selfv, args| {
                let (me, you) = operands("mod", selfv, &args)?;
                Ok(Value::Number(me % you))
            }),
            Attribute::method("__exp", |_scope, selfv, args| {
                let (me, you) = operands("exp", selfv, &args)?;
                Ok(Value::Number(me.powf(you)))
            }),
            Attribute::method("__shiftleft", |_scope, selfv, args| {
                let (me, you) = operands("shift", selfv, &args)?;
                let shifted = (me as i64).checked_shl(you as u32).unwrap_or(0);
                Ok(Value::Number(shifted as f64))
            }),
            Attribute::method("__shiftright", |_scope, selfv, args| {
                let (me, you) = operands("shift", selfv, &args)?;
                let shifted = (me as i64).checked_shr(you as u32).unwrap_or(0);
                Ok(Value::Number(shifted as f64))
            }),
            Attribute::method("__and", |_scope, selfv, args| {
                let (me, you) = operands("and", selfv, &args)?;
                Ok(Value::Number(((me as i64) & (you as i64)) as f64))
            }),
            Attribute::method("__or", |_scope, selfv, args| {
                let (me, you) = operands("or", selfv, &args)?;
                Ok(Value::Number(((me as i64) | (you as i64)) as f64))
            }),
            Attribute::method("__xor", |_scope, selfv, args| {
                let (me, you) = operands("xor", selfv, &args)?;
                Ok(Value::Number(((me as i64) ^ (you as i64)) as f64))
            }),
            Attribute::method("__bitnot", |_scope, selfv, _args| {
                let inst = receiver(selfv)?;
                Ok(Value::Number(!(inst.number() as i64) as f64))
            }),
            Attribute::method("__compare", |_scope, selfv, args| {
                let (me, you) = operands("compare", selfv, &args)?;
                let ordering = if me < you {
                    -1.0
                } else if me == you {
                    0.0
                } else {
                    1.0
                };
                Ok(Value::Number(ordering))
            }),
            Attribute::method("__eq", |_scope, selfv, args| {
                let (me, you) = operands("compare", selfv, &args)?;
                Ok(Value::Bool(me == you))
            }),
            Attribute::method("tobool", |_scope, selfv, _args| {
                Ok(Value::Bool(receiver(selfv)?.number() != 0.0))
            }),
            Attribute::method("tostring", |_scope, selfv, _args| {
                Ok(Value::Str(value::format_number(receiver(selfv)?.number())))
            }),
        ],
    )
}
