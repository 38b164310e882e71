//! Tables: a dense 0-based array part plus insertion-ordered key/value pairs.
//!
//! Duplicate keys overwrite in place; `==` is identity on the shared storage.
//! The helpers here take the shared `TableRef` and keep borrows short, since
//! key comparison can dispatch into user-defined `__eq` methods.

use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::attr::Attribute;
use crate::runtime::class::Class;
use crate::runtime::error::OpError;
use crate::runtime::instance::{self, InstanceHandle};
use crate::runtime::scope::ScopeRef;
use crate::runtime::value::{self, TableRef, Value};

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub arr: Vec<Value>,
    pub keys: Vec<Value>,
    pub vals: Vec<Value>,
}

impl Table {
    pub fn from_arr(arr: Vec<Value>) -> Self {
        Self {
            arr,
            keys: Vec::new(),
            vals: Vec::new(),
        }
    }

    pub fn share(self) -> TableRef {
        Rc::new(RefCell::new(self))
    }

    /// Appends the other table's array part and merges its key/value pairs.
    pub fn add(scope: &ScopeRef, table: &TableRef, other: &Table) {
        table.borrow_mut().arr.extend(other.arr.iter().cloned());
        for (key, val) in other.keys.iter().zip(other.vals.iter()) {
            Self::assign(scope, table, key.clone(), val.clone());
        }
    }

    /// Pads the array part with nil instances up to and including `size`.
    pub fn ensure_size(scope: &ScopeRef, table: &TableRef, size: usize) {
        let len = table.borrow().arr.len();
        if size < len {
            return;
        }
        for _ in len..=size {
            let nil = value::nil_instance(scope).unwrap_or(Value::Nil);
            table.borrow_mut().arr.push(nil);
        }
    }

    /// Integer keys land in the array part (padding as needed); other keys
    /// overwrite an existing entry or append in insertion order.
    pub fn assign(scope: &ScopeRef, table: &TableRef, key: Value, val: Value) -> Value {
        if let Some(index) = int_key(&key) {
            Self::ensure_size(scope, table, index);
            table.borrow_mut().arr[index] = val.clone();
            return val;
        }
        match Self::find_key(scope, table, &key) {
            Some((index, _)) => table.borrow_mut().vals[index] = val.clone(),
            None => {
                let mut t = table.borrow_mut();
                t.keys.push(key);
                t.vals.push(val.clone());
            }
        }
        val
    }

    pub fn find_key(scope: &ScopeRef, table: &TableRef, key: &Value) -> Option<(usize, Value)> {
        let keys: Vec<Value> = table.borrow().keys.clone();
        for (i, candidate) in keys.iter().enumerate() {
            if values_equal(scope, candidate, key) {
                return Some((i, table.borrow().vals[i].clone()));
            }
        }
        None
    }

    pub fn find_value(scope: &ScopeRef, table: &TableRef, val: &Value) -> Option<usize> {
        let arr: Vec<Value> = table.borrow().arr.clone();
        for (i, candidate) in arr.iter().enumerate() {
            if values_equal(scope, candidate, val) {
                return Some(i);
            }
        }
        None
    }

    pub fn render(scope: &ScopeRef, table: &TableRef) -> String {
        let snapshot = table.borrow().clone();
        let mut parts: Vec<String> = snapshot
            .arr
            .iter()
            .map(|v| value::to_output(scope, v))
            .collect();
        for (key, val) in snapshot.keys.iter().zip(snapshot.vals.iter()) {
            parts.push(format!(
                "{}: {}",
                value::to_output(scope, key),
                value::to_output(scope, val)
            ));
        }
        format!("{{{}}}", parts.join(", "))
    }
}

/// Equality as stored keys see it: raw payloads compare structurally,
/// instances dispatch their `__eq`.
fn values_equal(scope: &ScopeRef, candidate: &Value, other: &Value) -> bool {
    match candidate {
        Value::Str(text) => value::is_a(other, "String") && *text == value::to_output(scope, other),
        Value::Number(n) => value::is_a(other, "Number") && *n == value::to_number(other),
        Value::Bool(b) => {
            value::is_a(other, "Boolean") && *b == value::is_truthy(scope, other)
        }
        _ => match value::op(scope, candidate, "__eq", vec![other.clone()]) {
            Ok(result) => value::is_truthy(scope, &result),
            Err(_) => false,
        },
    }
}

/// A non-negative whole Number usable as an array index.
pub fn int_key(key: &Value) -> Option<usize> {
    let n = match key {
        Value::Number(n) => *n,
        Value::Instance(handle) if handle.is_a("Number") => handle.number(),
        _ => return None,
    };
    if n >= 0.0 && n.trunc() == n {
        Some(n as usize)
    } else {
        None
    }
}

fn self_table(selfv: Option<&Value>) -> Result<(InstanceHandle, TableRef), OpError> {
    let inst = instance::self_instance(selfv)?;
    let table = inst
        .table()
        .unwrap_or_else(|| Table::default().share());
    Ok((inst, table))
}

fn other_table(value: &Value) -> Option<TableRef> {
    match value {
        Value::Instance(handle) if handle.is_a("Table") => handle.table(),
        Value::Table(table) => Some(table.clone()),
        _ => None,
    }
}

pub fn table_class() -> Rc<Class> {
    Class::create(
        "Table",
        None,
        vec![
            Attribute::new("_tbl", Value::Nil, None),
            Attribute::method("new", |_scope, selfv, args| {
                let inst = instance::self_instance(selfv)?;
                if args.len() == 1 {
                    if let Some(table) = other_table(&args[0]) {
                        inst.set_data("_tbl", Value::Table(table));
                        return Ok(Value::Nil);
                    }
                }
                inst.set_data("_tbl", Value::Table(Table::from_arr(args).share()));
                Ok(Value::Nil)
            }),
            Attribute::method("__index", |scope, selfv, args| {
                let (_, table) = self_table(selfv)?;
                let key = value::arg(&args, 0);
                if let Value::Range(start, end) = key {
                    let t = table.borrow();
                    let start = start.min(t.arr.len());
                    let end = end.min(t.arr.len());
                    return Ok(Value::Table(
                        Table::from_arr(t.arr[start..end].to_vec()).share(),
                    ));
                }
                if let Some(index) = int_key(&key) {
                    let t = table.borrow();
                    return Ok(t.arr.get(index).cloned().unwrap_or(Value::Nil));
                }
                match Table::find_key(scope, &table, &key) {
                    Some((_, val)) => Ok(val),
                    None => Ok(Value::Nil),
                }
            }),
            Attribute::method("__assignindex", |scope, selfv, args| {
                let (_, table) = self_table(selfv)?;
                let key = value::arg(&args, 0);
                let val = value::arg(&args, 1);
                if let Value::Range(start, end) = key {
                    Table::ensure_size(scope, &table, end.saturating_sub(1));
                    let mut t = table.borrow_mut();
                    let tail: Vec<Value> = t.arr[end.min(t.arr.len())..].to_vec();
                    let arr_len = t.arr.len();
                    t.arr.truncate(start.min(arr_len));
                    match other_table(&val) {
                        Some(other) => t.arr.extend(other.borrow().arr.iter().cloned()),
                        None => t.arr.push(val.clone()),
                    }
                    t.arr.extend(tail);
                    return Ok(val);
                }
                Ok(Table::assign(scope, &table, key, val))
            }),
            Attribute::method("__add", |scope, selfv, args| {
                let (_, table) = self_table(selfv)?;
                let other = value::arg(&args, 0);
                let Some(other) = other_table(&other) else {
                    return Err(OpError::msg(format!(
                        "cannot add table and {}",
                        value::type_of(&value::arg(&args, 0))
                    )));
                };
                let merged = Table::default().share();
                Table::add(scope, &merged, &table.borrow().clone());
                Table::add(scope, &merged, &other.borrow().clone());
                Ok(Value::Table(merged))
            }),
            Attribute::method("__sub", |scope, selfv, args| {
                let (_, table) = self_table(selfv)?;
                let other = value::arg(&args, 0);
                let Some(other) = other_table(&other) else {
                    return Err(OpError::msg(format!(
                        "cannot sub table and {}",
                        value::type_of(&value::arg(&args, 0))
                    )));
                };
                let difference = Table::default().share();
                let snapshot = table.borrow().clone();
                for val in &snapshot.arr {
                    if Table::find_value(scope, &other, val).is_none() {
                        difference.borrow_mut().arr.push(val.clone());
                    }
                }
                for (key, val) in snapshot.keys.iter().zip(snapshot.vals.iter()) {
                    if Table::find_key(scope, &other, key).is_none() {
                        Table::assign(scope, &difference, key.clone(), val.clone());
                    }
                }
                Ok(Value::Table(difference))
            }),
            Attribute::method("__shiftleft", |_scope, selfv, args| {
                let (inst, table) = self_table(selfv)?;
                table.borrow_mut().arr.push(value::arg(&args, 0));
                Ok(Value::Instance(inst))
            }),
            Attribute::method("__eq", |_scope, selfv, args| {
                let (_, table) = self_table(selfv)?;
                match other_table(&value::arg(&args, 0)) {
                    Some(other) => Ok(Value::Bool(Rc::ptr_eq(&table, &other))),
                    None => Ok(Value::Bool(false)),
                }
            }),
            Attribute::method("__len", |_scope, selfv, _args| {
                let (_, table) = self_table(selfv)?;
                let len = table.borrow().arr.len();
                Ok(Value::Number(len as f64))
            }),
            Attribute::method("__del", |scope, selfv, args| {
                let (_, table) = self_table(selfv)?;
                let key = value::arg(&args, 0);
                if let Some(index) = int_key(&key) {
                    let mut t = table.borrow_mut();
                    if index >= t.arr.len() {
                        return Ok(Value::Nil);
                    }
                    return Ok(t.arr.remove(index));
                }
                if let Some((index, val)) = Table::find_key(scope, &table, &key) {
                    let mut t = table.borrow_mut();
                    t.keys.remove(index);
                    t.vals.remove(index);
                    return Ok(val);
                }
                Ok(Value::Nil)
            }),
            Attribute::method("tobool", |_scope, _selfv, _args| Ok(Value::Bool(true))),
            Attribute::method("tostring", |scope, selfv, _args| {
                let (_, table) = self_table(selfv)?;
                Ok(Value::Str(Table::render(scope, &table)))
            }),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::builtins::default_namespace;

    fn scope() -> ScopeRef {
        default_namespace(Some(Rc::new(RefCell::new(Vec::<u8>::new()))))
    }

    fn number(n: f64, scope: &ScopeRef) -> Value {
        value::to_value(scope, Value::Number(n)).expect("number should lift")
    }

    fn string(text: &str, scope: &ScopeRef) -> Value {
        value::to_value(scope, Value::Str(text.to_string())).expect("string should lift")
    }

    #[test]
    fn assign_fills_array_part_for_integer_keys() {
        let scope = scope();
        let table = Table::default().share();
        Table::assign(&scope, &table, number(2.0, &scope), number(9.0, &scope));
        assert_eq!(table.borrow().arr.len(), 3);
        assert!(matches!(
            &table.borrow().arr[2],
            Value::Instance(h) if h.number() == 9.0
        ));
    }

    #[test]
    fn assign_overwrites_duplicate_keys_in_place() {
        let scope = scope();
        let table = Table::default().share();
        Table::assign(&scope, &table, string("a", &scope), number(1.0, &scope));
        Table::assign(&scope, &table, string("b", &scope), number(2.0, &scope));
        Table::assign(&scope, &table, string("a", &scope), number(3.0, &scope));
        assert_eq!(table.borrow().keys.len(), 2);
        let (index, val) = Table::find_key(&scope, &table, &string("a", &scope))
            .expect("key should be found");
        assert_eq!(index, 0);
        assert!(matches!(val, Value::Instance(h) if h.number() == 3.0));
    }

    #[test]
    fn render_lists_array_then_keyed_entries() {
        let scope = scope();
        let table = Table::default().share();
        table.borrow_mut().arr.push(number(1.0, &scope));
        table.borrow_mut().arr.push(number(2.0, &scope));
        Table::assign(&scope, &table, string("k", &scope), number(3.0, &scope));
        assert_eq!(Table::render(&scope, &table), "{1, 2, k: 3}");
    }

    #[test]
    fn int_key_accepts_only_whole_non_negative_numbers() {
        assert_eq!(int_key(&Value::Number(2.0)), Some(2));
        assert_eq!(int_key(&Value::Number(0.0)), Some(0));
        assert_eq!(int_key(&Value::Number(2.5)), None);
        assert_eq!(int_key(&Value::Number(-1.0)), None);
        assert_eq!(int_key(&Value::Str("2".to_string())), None);
    }
}
