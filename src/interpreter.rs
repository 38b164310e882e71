//! Tree-walking evaluator.
//!
//! Walks the AST directly against a scope chain. Errors carry the triggering
//! span and a snapshot of the call trace; `cleanup` handlers attached to a
//! block catch them by matching the error instance's class ancestry.
//! Break/Next/Return travel as ordinary values and are consumed at loop and
//! call boundaries.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::error::Error;
use crate::interpolate::interpolate;
use crate::parser;
use crate::parser::ast::{Node, NodeKind};
use crate::runtime::attr::{refinement_from_table, Attribute, Refinement};
use crate::runtime::class::{find_class, Class, ClassHandle};
use crate::runtime::error::{self, OpError, RuntimeError};
use crate::runtime::func::{self, Func, FuncBody, UserFn};
use crate::runtime::instance::{self, InstanceHandle};
use crate::runtime::scope::ScopeRef;
use crate::runtime::table::{int_key, Table};
use crate::runtime::value::{self, Member, TableRef, Value};
use crate::token::Span;

/// Per-evaluation context: where the source came from and the live call
/// trace. User functions keep a handle to the runtime they were defined
/// under, so module functions report frames against their own file.
#[derive(Debug)]
pub struct Runtime {
    is_file: bool,
    origin: String,
    trace: RefCell<Vec<String>>,
    me: Weak<Runtime>,
}

/// Parses and evaluates a file; a top-level `return` becomes the result.
pub fn eval_file(scope: &ScopeRef, path: &str) -> Result<Value, Error> {
    let ast = parser::parse_file(path)?;
    let runtime = Runtime::new(true, path);
    runtime.push_stack("<main>", 0);
    let result = runtime.eval_block(scope, &ast.block, &ast.catches);
    runtime.pop_stack();
    Ok(unwrap_return(scope, result?))
}

/// Parses and evaluates a source string in the given scope.
pub fn eval_str(scope: &ScopeRef, source: &str) -> Result<Value, Error> {
    let ast = parser::parse_str(source)?;
    let runtime = Runtime::new(false, source);
    runtime.push_stack("<main>", 0);
    let result = runtime.eval_block(scope, &ast.block, &ast.catches);
    runtime.pop_stack();
    Ok(unwrap_return(scope, result?))
}

fn unwrap_return(scope: &ScopeRef, value: Value) -> Value {
    match value {
        Value::Return(mut vals) => match vals.len() {
            0 => Value::Nil,
            1 => vals.pop().expect("length checked above"),
            _ => {
                let table = Table::from_arr(vals).share();
                value::to_value(scope, Value::Table(table.clone())).unwrap_or(Value::Table(table))
            }
        },
        other => other,
    }
}

impl Runtime {
    fn new(is_file: bool, origin: &str) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            is_file,
            origin: origin.to_string(),
            trace: RefCell::new(Vec::new()),
            me: me.clone(),
        })
    }

    /// A strong handle to this runtime, carried by user functions so a later
    /// call can re-enter evaluation.
    fn handle(&self) -> Rc<Runtime> {
        self.me.upgrade().expect("runtime is alive while borrowed")
    }

    fn display_name(&self) -> &str {
        if self.is_file {
            &self.origin
        } else {
            "~"
        }
    }

    pub(crate) fn push_stack(&self, name: &str, line: usize) {
        self.trace
            .borrow_mut()
            .push(format!("{}:{line} in {name}", self.display_name()));
    }

    pub(crate) fn pop_stack(&self) {
        self.trace.borrow_mut().pop();
    }

    fn error(&self, scope: &ScopeRef, span: Span, message: String) -> RuntimeError {
        let instance = instance::create_handle(
            scope,
            "RuntimeError",
            vec![Value::Str(message.clone())],
        )
        .unwrap_or_else(|_| error::detached_runtime_error(message.clone()));
        RuntimeError {
            is_file: self.is_file,
            origin: self.origin.clone(),
            span,
            class_name: "RuntimeError".to_string(),
            message,
            instance,
            trace: self.trace.borrow().clone(),
        }
    }

    /// Attaches a location and trace to an object-model error. Raised error
    /// instances keep their class for `cleanup` matching.
    fn wrap(&self, scope: &ScopeRef, span: Span, err: OpError) -> RuntimeError {
        match err {
            OpError::Runtime(located) => *located,
            OpError::Raise(instance) => RuntimeError {
                is_file: self.is_file,
                origin: self.origin.clone(),
                span,
                class_name: instance.class_name().to_string(),
                message: instance.message(),
                instance,
                trace: self.trace.borrow().clone(),
            },
            OpError::Message(message) => self.error(scope, span, message),
        }
    }

    /// Runs a block's statements in order. An error checks the attached
    /// cleanup handlers: the first whose class list matches an ancestor of
    /// the error's class runs in a child scope and its result becomes the
    /// block's result. Control markers end the block immediately.
    pub(crate) fn eval_block(
        &self,
        scope: &ScopeRef,
        block: &[Node],
        catches: &[Node],
    ) -> Result<Value, RuntimeError> {
        for node in block {
            match self.eval(scope, node) {
                Err(err) => {
                    for catch in catches {
                        for class_node in &catch.vars {
                            if !err.instance.is_a(&class_node.name) {
                                continue;
                            }
                            let mut binds = HashMap::new();
                            if !catch.name.is_empty() {
                                binds.insert(
                                    catch.name.clone(),
                                    Value::Instance(err.instance.clone()),
                                );
                            }
                            let handler_scope = scope.child(binds);
                            return self.eval_block(
                                &handler_scope,
                                &catch.block,
                                &catch.catches,
                            );
                        }
                    }
                    return Err(err);
                }
                Ok(marker @ (Value::Break | Value::Next | Value::Return(_))) => {
                    return Ok(marker)
                }
                Ok(_) => {}
            }
        }
        Ok(Value::Nil)
    }

    fn eval(&self, scope: &ScopeRef, node: &Node) -> Result<Value, RuntimeError> {
        match node.kind {
            NodeKind::Assignment => self.eval_assign(scope, node),
            NodeKind::FuncCall => self.eval_func_call(scope, node),
            NodeKind::FuncDef => self.eval_func_def(scope, node),
            NodeKind::If => self.eval_if(scope, node),
            NodeKind::Do => self.eval_block(scope, &node.block, &node.catches),
            NodeKind::ForIn => self.eval_for_in(scope, node),
            NodeKind::ForNum => self.eval_for_num(scope, node),
            NodeKind::While => self.eval_while(scope, node),
            NodeKind::Binary | NodeKind::Unary => self.eval_operator(scope, node),
            NodeKind::Table => {
                let table = self.eval_table(scope, node)?;
                instance::create(scope, "Table", vec![Value::Table(table)])
                    .map_err(|e| self.wrap(scope, node.pos, e))
            }
            NodeKind::Index => {
                let member = self.eval_index(scope, &node.vals[0], &node.vals[1], false)?;
                Ok(Value::Member(Box::new(member)))
            }
            NodeKind::Member => {
                let member = self.eval_index(scope, &node.vals[0], &node.vals[1], true)?;
                Ok(Value::Member(Box::new(member)))
            }
            NodeKind::Return => self.eval_return(scope, node),
            NodeKind::Identifier => Ok(scope.get(&node.name)),
            NodeKind::String => self.eval_string_lit(scope, node),
            NodeKind::Bool => self.lift(scope, node.pos, Value::Bool(node.bool_value)),
            NodeKind::Number => self.lift(scope, node.pos, Value::Number(node.number_value)),
            NodeKind::Nil => self.lift(scope, node.pos, Value::Nil),
            NodeKind::Break => Ok(Value::Break),
            NodeKind::Next => Ok(Value::Next),
            NodeKind::Spread => self.eval_spread(scope, node),
            NodeKind::Range => self.eval_range(scope, node),
            NodeKind::ClassDef => self.eval_class_def(scope, node),
            NodeKind::Ternary => self.eval_ternary(scope, node),
            kind => Err(self.error(
                scope,
                node.pos,
                format!("missed node kind {kind:?}, this is a bug in squirt and not in your code"),
            )),
        }
    }

    /// Evaluates and resolves a deferred member access, if any. Raw payloads
    /// read straight out of attribute storage lift to instances so operators
    /// can dispatch on them; raw nil stays raw.
    fn eval_resolved(
        &self,
        scope: &ScopeRef,
        node: &Node,
    ) -> Result<Value, RuntimeError> {
        match self.eval(scope, node)? {
            Value::Member(member) => {
                let span = member.span;
                let resolved = member.get(scope).map_err(|e| self.wrap(scope, span, e))?;
                match resolved {
                    raw @ (Value::Bool(_) | Value::Number(_) | Value::Str(_) | Value::Table(_)) => {
                        self.lift(scope, span, raw)
                    }
                    other => Ok(other),
                }
            }
            other => Ok(other),
        }
    }

    fn lift(&self, scope: &ScopeRef, span: Span, raw: Value) -> Result<Value, RuntimeError> {
        value::to_value(scope, raw).map_err(|e| self.wrap(scope, span, e))
    }

    /// Targets fill left to right from the flattened right-hand values.
    /// Surplus values collect into a Table in the last target; targets with
    /// no value are set to nil.
    fn eval_assign(&self, scope: &ScopeRef, node: &Node) -> Result<Value, RuntimeError> {
        let mut values = Vec::new();
        for expr in &node.vals {
            match self.eval_resolved(scope, expr)? {
                Value::Spread(table) => values.extend(table.borrow().arr.iter().cloned()),
                other => values.push(other),
            }
        }

        let last = node.vars.len() - 1;
        for (i, target) in node.vars.iter().enumerate() {
            let val = if i == last && values.len() > node.vars.len() {
                let rest = values[i..].to_vec();
                instance::create(scope, "Table", rest)
                    .map_err(|e| self.wrap(scope, node.pos, e))?
            } else if i < values.len() {
                values[i].clone()
            } else {
                value::nil_instance(scope).map_err(|e| self.wrap(scope, node.pos, e))?
            };
            match target.kind {
                NodeKind::Identifier => scope.set(&target.name, val),
                NodeKind::Member | NodeKind::Index => {
                    let member = self.eval_index(
                        scope,
                        &target.vals[0],
                        &target.vals[1],
                        target.kind == NodeKind::Member,
                    )?;
                    member
                        .set(scope, val)
                        .map_err(|e| self.wrap(scope, node.pos, e))?;
                }
                kind => {
                    return Err(self.error(
                        scope,
                        node.pos,
                        format!("cannot assign to type {kind:?}"),
                    ))
                }
            }
        }
        Ok(Value::Nil)
    }

    fn eval_func_call(
        &self,
        scope: &ScopeRef,
        node: &Node,
    ) -> Result<Value, RuntimeError> {
        let Some(callee_node) = node.value.as_deref() else {
            return Err(self.error(scope, node.pos, "call is missing a callee".to_string()));
        };
        let callee = self.eval(scope, callee_node)?;

        let mut args = Vec::new();
        for expr in &node.vals {
            match self.eval_resolved(scope, expr)? {
                Value::Spread(table) => args.extend(table.borrow().arr.iter().cloned()),
                other => args.push(other),
            }
        }

        // A member callee supplies the receiver for `self`/`super`.
        let (callee, receiver) = match callee {
            Value::Member(member) => {
                let resolved = member
                    .get(scope)
                    .map_err(|e| self.wrap(scope, node.pos, e))?;
                (resolved, Some(member.source))
            }
            other => (other, None),
        };

        match callee {
            Value::Func(function) => func::call(&function, scope, receiver, args)
                .map_err(|e| self.wrap(scope, node.pos, e)),
            Value::Instance(handle) => handle
                .op(scope, "__call", args)
                .map_err(|e| self.wrap(scope, node.pos, e)),
            Value::Class(handle) => Class::new_instance(&handle.class, scope, args)
                .map(Value::Instance)
                .map_err(|e| self.wrap(scope, node.pos, e)),
            other => Err(self.error(
                scope,
                node.pos,
                format!(
                    "tried to call a non callable object {}",
                    value::type_of(&other)
                ),
            )),
        }
    }

    fn make_function(
        &self,
        scope: &ScopeRef,
        node: &Node,
        class_name: Option<&str>,
    ) -> Rc<Func> {
        let mut vararg = false;
        let mut params = Vec::with_capacity(node.vars.len());
        for (i, parameter) in node.vars.iter().enumerate() {
            let mut name = parameter.name.clone();
            if i == node.vars.len() - 1 && name.ends_with("...") {
                vararg = true;
                name.truncate(name.len() - 3);
            }
            params.push(name);
        }
        let name = node
            .value
            .as_deref()
            .map(|n| n.name.clone())
            .unwrap_or_default();
        Rc::new(Func {
            name,
            class_name: RefCell::new(class_name.map(str::to_string)),
            line: node.pos.start_line,
            params,
            vararg,
            body: FuncBody::User(UserFn {
                block: Rc::new(node.block.clone()),
                catches: Rc::new(node.catches.clone()),
                scope: scope.clone(),
                runtime: self.handle(),
            }),
        })
    }

    fn eval_func_def(
        &self,
        scope: &ScopeRef,
        node: &Node,
    ) -> Result<Value, RuntimeError> {
        let function = self.make_function(scope, node, None);
        if let Some(name_node) = node.value.as_deref() {
            match name_node.kind {
                NodeKind::Identifier => {
                    scope.set(&name_node.name, Value::Func(function.clone()))
                }
                NodeKind::Member => {
                    let member =
                        self.eval_index(scope, &name_node.vals[0], &name_node.vals[1], true)?;
                    member
                        .set(scope, Value::Func(function.clone()))
                        .map_err(|e| self.wrap(scope, node.pos, e))?;
                }
                _ => {}
            }
        }
        Ok(Value::Func(function))
    }

    fn eval_if(&self, scope: &ScopeRef, node: &Node) -> Result<Value, RuntimeError> {
        for (i, clause) in node.block.iter().enumerate() {
            match clause.cond.as_deref() {
                None if i == node.block.len() - 1 => {
                    return self.eval_block(scope, &clause.block, &clause.catches)
                }
                None => continue,
                Some(cond) => {
                    let value = self.eval_resolved(scope, cond)?;
                    if value::is_truthy(scope, &value) {
                        return self.eval_block(scope, &clause.block, &clause.catches);
                    }
                }
            }
        }
        Ok(Value::Nil)
    }

    fn eval_ternary(&self, scope: &ScopeRef, node: &Node) -> Result<Value, RuntimeError> {
        let cond = self.eval_resolved(scope, &node.vals[0])?;
        if value::is_truthy(scope, &cond) {
            self.eval_resolved(scope, &node.vals[1])
        } else {
            self.eval_resolved(scope, &node.vals[2])
        }
    }

    fn eval_for_num(&self, scope: &ScopeRef, node: &Node) -> Result<Value, RuntimeError> {
        let Some(start_node) = node.value.as_deref() else {
            return Ok(Value::Nil);
        };
        let start = self.eval_resolved(scope, start_node)?;
        scope.set(&node.name, start);
        loop {
            let cond = match node.cond.as_deref() {
                Some(cond) => self.eval_resolved(scope, cond)?,
                None => break,
            };
            if !value::is_truthy(scope, &cond) {
                break;
            }
            match self.eval_block(scope, &node.block, &node.catches)? {
                Value::Break => break,
                marker @ Value::Return(_) => {
                    scope.set(&node.name, Value::Nil);
                    return Ok(marker);
                }
                // Next still runs the step before re-checking the condition.
                _ => {}
            }
            if let Some(step) = node.step.as_deref() {
                self.eval(scope, step)?;
            }
        }
        scope.set(&node.name, Value::Nil);
        Ok(Value::Nil)
    }

    /// Iterates the array part first (integer keys), then the key/value part
    /// in insertion order, over a snapshot of the entries.
    fn eval_for_in(&self, scope: &ScopeRef, node: &Node) -> Result<Value, RuntimeError> {
        let Some(iterator) = node.value.as_deref() else {
            return Ok(Value::Nil);
        };
        let data = self.eval_resolved(scope, iterator)?;
        let table = match &data {
            Value::Instance(handle) if handle.is_a("Table") => handle.table(),
            _ => None,
        };
        let Some(table) = table else {
            return Err(self.error(
                scope,
                node.pos,
                "used for-in loop on non table data type".to_string(),
            ));
        };

        let entries: Vec<(Value, Value)> = {
            let t = table.borrow();
            let mut entries: Vec<(Value, Value)> = t
                .arr
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::Number(i as f64), v.clone()))
                .collect();
            entries.extend(t.keys.iter().cloned().zip(t.vals.iter().cloned()));
            entries
        };

        let key_var = &node.vars[0].name;
        let val_var = node.vars.get(1).map(|v| v.name.as_str());
        for (key, val) in entries {
            match val_var {
                Some(val_var) => {
                    let key = self.lift(scope, node.pos, key)?;
                    scope.set(key_var, key);
                    scope.set(val_var, val);
                }
                None => scope.set(key_var, val),
            }
            match self.eval_block(scope, &node.block, &node.catches)? {
                Value::Break => break,
                marker @ Value::Return(_) => {
                    self.clear_loop_vars(scope, node);
                    return Ok(marker);
                }
                _ => {}
            }
        }
        self.clear_loop_vars(scope, node);
        Ok(Value::Nil)
    }

    fn clear_loop_vars(&self, scope: &ScopeRef, node: &Node) {
        for var in &node.vars {
            scope.set(&var.name, Value::Nil);
        }
    }

    fn eval_while(&self, scope: &ScopeRef, node: &Node) -> Result<Value, RuntimeError> {
        loop {
            let cond = match node.cond.as_deref() {
                Some(cond) => self.eval_resolved(scope, cond)?,
                None => break,
            };
            if !value::is_truthy(scope, &cond) {
                break;
            }
            match self.eval_block(scope, &node.block, &node.catches)? {
                Value::Break => break,
                marker @ Value::Return(_) => return Ok(marker),
                _ => {}
            }
        }
        Ok(Value::Nil)
    }

    fn eval_operator(
        &self,
        scope: &ScopeRef,
        node: &Node,
    ) -> Result<Value, RuntimeError> {
        let left_node = if node.kind == NodeKind::Unary {
            node.value.as_deref()
        } else {
            node.vals.first()
        };
        let Some(left_node) = left_node else {
            return Err(self.error(scope, node.pos, "operator is missing an operand".to_string()));
        };

        if node.name == "@" {
            return self.eval_try(scope, node, left_node);
        }

        let left = self.eval_resolved(scope, left_node)?;

        if node.kind == NodeKind::Unary {
            if node.name == "!" {
                return self.lift(scope, node.pos, Value::Bool(!value::is_truthy(scope, &left)));
            }
            let Value::Instance(left) = &left else {
                return Err(self.error(
                    scope,
                    node.pos,
                    "left operand is an invalid value".to_string(),
                ));
            };
            let result = match node.name.as_str() {
                "~" => left.op(scope, "__bitnot", vec![]),
                "#" => left.op(scope, "__len", vec![]),
                "-" => match instance::create(scope, "Number", vec![Value::Number(0.0)]) {
                    Ok(zero) => {
                        value::op(scope, &zero, "__sub", vec![Value::Instance(left.clone())])
                    }
                    Err(err) => Err(err),
                },
                other => Err(OpError::msg(format!("unsupported unary {other}"))),
            };
            return result.map_err(|e| self.wrap(scope, node.pos, e));
        }

        if node.name == "and" {
            if !value::is_truthy(scope, &left) {
                return Ok(left);
            }
            return self.eval_resolved(scope, &node.vals[1]);
        } else if node.name == "or" {
            if value::is_truthy(scope, &left) {
                return Ok(left);
            }
            return self.eval_resolved(scope, &node.vals[1]);
        }

        let Value::Instance(left) = left else {
            return Err(self.error(
                scope,
                node.pos,
                "left operand is an invalid value".to_string(),
            ));
        };
        let right = self.eval_resolved(scope, &node.vals[1])?;
        let Value::Instance(right) = right else {
            return Err(self.error(
                scope,
                node.pos,
                "right operand is an invalid value".to_string(),
            ));
        };

        let dunder = match node.name.as_str() {
            "+" => "__add",
            "-" => "__sub",
            "/" => "__div",
            "*" => "__mul",
            "^" => "__exp",
            "%" => "__mod",
            "<<" => "__shiftleft",
            ">>" => "__shiftright",
            "&" => "__and",
            "~" => "__xor",
            "|" => "__or",
            "==" => "__eq",
            "!=" => {
                let eq = left
                    .op(scope, "__eq", vec![Value::Instance(right)])
                    .map_err(|e| self.wrap(scope, node.pos, e))?;
                return self.lift(scope, node.pos, Value::Bool(!value::is_truthy(scope, &eq)));
            }
            "<" | "<=" | ">" | ">=" => {
                return self.eval_comparison(scope, node, &left, right);
            }
            other => {
                return Err(self.error(
                    scope,
                    node.pos,
                    format!(
                        "undefined operation {} {other} {}",
                        left.class_name(),
                        right.class_name()
                    ),
                ))
            }
        };
        left.op(scope, dunder, vec![Value::Instance(right)])
            .map_err(|e| self.wrap(scope, node.pos, e))
    }

    /// All four orderings go through `__compare`, which must return a Number:
    /// negative for less, zero for equal, positive for greater.
    fn eval_comparison(
        &self,
        scope: &ScopeRef,
        node: &Node,
        left: &InstanceHandle,
        right: InstanceHandle,
    ) -> Result<Value, RuntimeError> {
        let compared = left
            .op(scope, "__compare", vec![Value::Instance(right)])
            .map_err(|e| self.wrap(scope, node.pos, e))?;
        let ordering = match &compared {
            Value::Instance(handle) if handle.is_a("Number") => handle.number(),
            _ => return self.lift(scope, node.pos, Value::Bool(false)),
        };
        let truth = (ordering <= -1.0 && node.name.starts_with('<'))
            || (ordering >= 1.0 && node.name.starts_with('>'))
            || (ordering == 0.0 && node.name.contains('='));
        self.lift(scope, node.pos, Value::Bool(truth))
    }

    /// The non-fatal `@` prefix: an error becomes the result value, success
    /// gets nil prepended so `err, val = @expr` destructures cleanly.
    fn eval_try(
        &self,
        scope: &ScopeRef,
        node: &Node,
        operand: &Node,
    ) -> Result<Value, RuntimeError> {
        let value = match self.eval_resolved(scope, operand) {
            Err(err) => return Ok(Value::Instance(err.instance)),
            Ok(value) => value,
        };
        let nil = value::nil_instance(scope).map_err(|e| self.wrap(scope, node.pos, e))?;
        Ok(match value {
            Value::Spread(table) => {
                table.borrow_mut().arr.insert(0, nil);
                Value::Spread(table)
            }
            Value::Nil => Value::Spread(Table::from_arr(vec![nil]).share()),
            other => Value::Spread(Table::from_arr(vec![nil, other]).share()),
        })
    }

    fn eval_table(&self, scope: &ScopeRef, node: &Node) -> Result<TableRef, RuntimeError> {
        let table = Table::default().share();
        for entry in &node.vals {
            match entry.kind {
                NodeKind::TableValue => {
                    let Some(value_node) = entry.value.as_deref() else {
                        continue;
                    };
                    match self.eval_resolved(scope, value_node)? {
                        Value::Spread(other) => {
                            let other = other.borrow().clone();
                            Table::add(scope, &table, &other);
                        }
                        other => table.borrow_mut().arr.push(other),
                    }
                }
                NodeKind::TableKey => {
                    let (Some(key_node), Some(value_node)) =
                        (entry.key.as_deref(), entry.value.as_deref())
                    else {
                        continue;
                    };
                    let key = if key_node.kind == NodeKind::Identifier {
                        instance::create(scope, "String", vec![Value::Str(key_node.name.clone())])
                            .map_err(|e| self.wrap(scope, key_node.pos, e))?
                    } else {
                        self.eval_resolved(scope, key_node)?
                    };
                    let val = self.eval_resolved(scope, value_node)?;
                    Table::assign(scope, &table, key, val);
                }
                _ => {}
            }
        }
        Ok(table)
    }

    fn eval_index(
        &self,
        scope: &ScopeRef,
        base: &Node,
        index: &Node,
        is_member: bool,
    ) -> Result<Member, RuntimeError> {
        let mut source = self.eval(scope, base)?;
        if let Value::Member(member) = source {
            source = member
                .get(scope)
                .map_err(|e| self.wrap(scope, base.pos, e))?;
        }
        let key = if is_member && index.kind == NodeKind::Identifier {
            instance::create(scope, "String", vec![Value::Str(index.name.clone())])
                .map_err(|e| self.wrap(scope, index.pos, e))?
        } else {
            self.eval_resolved(scope, index)?
        };
        if matches!(source, Value::Nil) {
            return Err(self.error(scope, index.pos, "cannot index nil".to_string()));
        }
        Ok(Member {
            source,
            key,
            span: index.pos,
        })
    }

    fn eval_return(&self, scope: &ScopeRef, node: &Node) -> Result<Value, RuntimeError> {
        let mut vals = Vec::with_capacity(node.vals.len());
        for expr in &node.vals {
            vals.push(self.eval_resolved(scope, expr)?);
        }
        Ok(Value::Return(vals))
    }

    fn eval_spread(&self, scope: &ScopeRef, node: &Node) -> Result<Value, RuntimeError> {
        let Some(operand) = node.value.as_deref() else {
            return Ok(Value::Nil);
        };
        match self.eval_resolved(scope, operand)? {
            Value::Instance(handle) if handle.is_a("Table") => match handle.table() {
                Some(table) => Ok(Value::Spread(table)),
                None => Ok(Value::Spread(Table::default().share())),
            },
            Value::Table(table) => Ok(Value::Spread(table)),
            _ => Err(self.error(
                scope,
                node.pos,
                "spread operator used on non table value".to_string(),
            )),
        }
    }

    fn eval_range(&self, scope: &ScopeRef, node: &Node) -> Result<Value, RuntimeError> {
        let start_val = self.eval_resolved(scope, &node.vals[0])?;
        let Some(start) = int_key(&start_val) else {
            return Err(self.error(
                scope,
                node.pos,
                "start in range is not a non decimal number".to_string(),
            ));
        };
        let end_val = self.eval_resolved(scope, &node.vals[1])?;
        let Some(end) = int_key(&end_val) else {
            return Err(self.error(
                scope,
                node.pos,
                "end in range is not a non decimal number".to_string(),
            ));
        };
        if end < start {
            return Err(self.error(scope, node.pos, "range can only be positive".to_string()));
        }
        Ok(Value::Range(start, end))
    }

    fn eval_class_def(
        &self,
        scope: &ScopeRef,
        node: &Node,
    ) -> Result<Value, RuntimeError> {
        let parent = if node.parent.is_empty() {
            None
        } else {
            Some(find_class(scope, &node.parent).map_err(|e| self.wrap(scope, node.pos, e))?)
        };

        let constant = Refinement {
            constant: true,
            ..Refinement::default()
        };
        let mut attrs = Vec::new();
        for member in &node.block {
            match member.kind {
                NodeKind::FuncDef => {
                    let method = self.make_function(scope, member, Some(&node.name));
                    let method_name = method.name.clone();
                    attrs.push(Attribute::new(
                        &method_name,
                        Value::Func(method),
                        Some(constant.clone()),
                    ));
                }
                NodeKind::AttrDef => {
                    let val = match member.value.as_deref() {
                        Some(value_node) => self.eval_resolved(scope, value_node)?,
                        None => Value::Nil,
                    };
                    let refine = match member.cond.as_deref() {
                        Some(table_node) => {
                            let table = self.eval_table(scope, table_node)?;
                            Some(
                                refinement_from_table(scope, &table)
                                    .map_err(|e| self.wrap(scope, member.pos, e))?,
                            )
                        }
                        None => None,
                    };
                    attrs.push(Attribute::new(&member.name, val, refine));
                }
                NodeKind::ClassDef => {
                    let nested = self.eval_class_def(scope, member)?;
                    attrs.push(Attribute::new(&member.name, nested, Some(constant.clone())));
                }
                _ => {
                    return Err(self.error(
                        scope,
                        member.pos,
                        "unexpected member in class definition".to_string(),
                    ))
                }
            }
        }

        let class = Class::create(&node.name, parent, attrs);
        let class_value = Value::Class(ClassHandle::new(class));
        scope.set(&node.name, class_value.clone());
        Ok(class_value)
    }

    /// `${...}` segments re-enter the parser and evaluate in the current
    /// scope; their stringified results join the literal parts.
    fn eval_string_lit(
        &self,
        scope: &ScopeRef,
        node: &Node,
    ) -> Result<Value, RuntimeError> {
        let text = interpolate(&node.string_value, |segment| {
            let ast = parser::parse_str(segment)
                .map_err(|e| self.error(scope, node.pos, e.message.clone()))?;
            let Some(first) = ast.block.first() else {
                return Ok(String::new());
            };
            let result = self.eval_resolved(scope, first)?;
            Ok(value::to_output(scope, &result))
        })?;
        instance::create(scope, "String", vec![Value::Str(text)])
            .map_err(|e| self.wrap(scope, node.pos, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::builtins::default_namespace;
    use indoc::indoc;

    fn run(source: &str) -> Result<String, Error> {
        let sink = Rc::new(RefCell::new(Vec::<u8>::new()));
        let scope = default_namespace(Some(sink.clone()));
        eval_str(&scope, source)?;
        let bytes = sink.borrow().clone();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn run_err(source: &str) -> RuntimeError {
        let scope = default_namespace(Some(Rc::new(RefCell::new(Vec::<u8>::new()))));
        match eval_str(&scope, source) {
            Err(Error::Runtime(err)) => err,
            Err(other) => panic!("expected runtime error, got {other}"),
            Ok(_) => panic!("expected runtime error, got success"),
        }
    }

    #[test]
    fn evaluates_assignment_and_print() {
        let output = run("n = 1 + 2 print(n)").expect("run failed");
        assert_eq!(output, "3\n");
    }

    #[test]
    fn short_circuits_and_or() {
        let output = run(indoc! {r#"
            func boom() spill("should not run") end
            print(false and boom())
            print(true or boom())
            print(1 and 2)
            print(false or "fallback")
        "#})
        .expect("run failed");
        assert_eq!(output, "false\ntrue\n2\nfallback\n");
    }

    #[test]
    fn while_loop_consumes_break_and_next() {
        let output = run(indoc! {"
            i = 0
            while true do
              i += 1
              if i == 2 then next end
              if i > 3 then break end
              print(i)
            end
        "})
        .expect("run failed");
        assert_eq!(output, "1\n3\n");
    }

    #[test]
    fn numeric_for_runs_step_after_next() {
        let output = run(indoc! {"
            for i = 0, i < 5, i += 1 do
              if i == 2 then next end
              print(i)
            end
        "})
        .expect("run failed");
        assert_eq!(output, "0\n1\n3\n4\n");
    }

    #[test]
    fn reports_undefined_attribute() {
        let err = run_err(indoc! {"
            class Empty do end
            e = new(Empty)
            print(e.missing)
        "});
        assert!(
            err.message.contains("undefined attribute missing"),
            "{}",
            err.message
        );
    }

    #[test]
    fn uncaught_spill_carries_class_and_trace() {
        let err = run_err(indoc! {r#"
            func inner() spill(ArgumentError, "busted") end
            func outer() inner() end
            outer()
        "#});
        assert_eq!(err.class_name, "ArgumentError");
        assert_eq!(err.message, "busted");
        assert!(err.trace.len() >= 3, "trace: {:?}", err.trace);
        assert!(err.trace[0].contains("<main>"));
    }

    #[test]
    fn cleanup_catches_by_class_ancestry() {
        let output = run(indoc! {r#"
            do
              spill(ArgumentError, "nope")
              print("unreachable")
            cleanup e = Error do
              print("caught: " + e.message)
            end
        "#})
        .expect("run failed");
        assert_eq!(output, "caught: nope\n");
    }

    #[test]
    fn unmatched_cleanup_propagates() {
        let err = run_err(indoc! {r#"
            class QuietError isa Error do end
            do
              spill("boom")
            cleanup QuietError do
              print("wrong handler")
            end
        "#});
        assert_eq!(err.class_name, "RuntimeError");
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn try_operator_never_raises() {
        let output = run(indoc! {r#"
            err, v = @spill("blown")
            print(typeof(err))
            err2, v2 = @(1 + 1)
            print(err2, v2)
        "#})
        .expect("run failed");
        assert_eq!(output, "RuntimeError\nnil 2\n");
    }

    #[test]
    fn eval_runs_in_current_scope() {
        let output = run(indoc! {r#"
            x = 4
            eval("x = x + 1")
            print(x)
        "#})
        .expect("run failed");
        assert_eq!(output, "5\n");
    }
}
