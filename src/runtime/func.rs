//! First-class functions: user-defined, built-in, and the `super` thunk.
//!
//! A user function captures its declaration scope and the runtime it was
//! defined under; each call evaluates the body in a fresh child scope. A
//! `return` of one value unwraps to that value, several values become a
//! spread, and built-ins have their raw host results lifted to instances.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::interpreter::Runtime;
use crate::parser::ast::Node;
use crate::runtime::class::Class;
use crate::runtime::error::OpError;
use crate::runtime::instance::{create, InstanceHandle};
use crate::runtime::scope::ScopeRef;
use crate::runtime::table::Table;
use crate::runtime::value::{self, Value};

pub type BuiltinFn = fn(&ScopeRef, Option<&Value>, Vec<Value>) -> Result<Value, OpError>;

pub struct Func {
    pub name: String,
    pub class_name: RefCell<Option<String>>,
    pub line: usize,
    pub params: Vec<String>,
    pub vararg: bool,
    pub body: FuncBody,
}

pub enum FuncBody {
    Builtin(BuiltinFn),
    Super(SuperFn),
    User(UserFn),
}

pub struct UserFn {
    pub block: Rc<Vec<Node>>,
    pub catches: Rc<Vec<Node>>,
    pub scope: ScopeRef,
    pub runtime: Rc<Runtime>,
}

/// Deferred dispatch to the parent class's version of a method. Calling it
/// with no arguments re-uses the arguments of the original call.
pub struct SuperFn {
    pub class: Rc<Class>,
    pub inst: Option<InstanceHandle>,
    pub method: String,
    pub args: Vec<Value>,
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Func({})", self.name)
    }
}

impl Func {
    pub fn builtin(name: &str, body: BuiltinFn) -> Rc<Func> {
        Rc::new(Func {
            name: name.to_string(),
            class_name: RefCell::new(None),
            line: 0,
            params: Vec::new(),
            vararg: false,
            body: FuncBody::Builtin(body),
        })
    }

    fn is_builtin(&self) -> bool {
        matches!(self.body, FuncBody::Builtin(_) | FuncBody::Super(_))
    }

    pub fn to_output(&self) -> String {
        let name = match &*self.class_name.borrow() {
            Some(class) => format!("{class}.{}", self.name),
            None => self.name.clone(),
        };
        let mut params = self.params.join(", ");
        if self.vararg {
            params.push_str("...");
        }
        let builtin = if self.is_builtin() { " builtin" } else { "" };
        format!("#<func {name}({params}){builtin}>")
    }
}

/// The `super` value bound inside a method body.
pub fn make_super(receiver: &Value, method: &str, args: &[Value]) -> Value {
    let sup = match receiver {
        Value::Instance(handle) => SuperFn {
            class: handle.class().clone(),
            inst: Some(handle.clone()),
            method: method.to_string(),
            args: args.to_vec(),
        },
        Value::Class(handle) => SuperFn {
            class: handle.class.clone(),
            inst: None,
            method: method.to_string(),
            args: args.to_vec(),
        },
        _ => return Value::Nil,
    };
    Value::Func(Rc::new(Func {
        name: "super".to_string(),
        class_name: RefCell::new(Some(sup.class.name().to_string())),
        line: 0,
        params: Vec::new(),
        vararg: false,
        body: FuncBody::Super(sup),
    }))
}

pub fn call(
    func: &Rc<Func>,
    scope: &ScopeRef,
    selfv: Option<Value>,
    args: Vec<Value>,
) -> Result<Value, OpError> {
    let result = match &func.body {
        FuncBody::Builtin(body) => body(scope, selfv.as_ref(), args)?,
        FuncBody::Super(sup) => call_super(sup, scope, args)?,
        FuncBody::User(user) => {
            let qualified = match &*func.class_name.borrow() {
                Some(class) => format!("{class}.{}", func.name),
                None => func.name.clone(),
            };
            user.runtime.push_stack(&qualified, func.line);
            let outcome = call_user(func, user, scope, selfv, args);
            user.runtime.pop_stack();
            outcome?
        }
    };
    match result {
        Value::Return(mut vals) => match vals.len() {
            0 => Ok(Value::Nil),
            1 => Ok(vals.pop().expect("length checked above")),
            _ => Ok(Value::Spread(Rc::new(RefCell::new(Table::from_arr(vals))))),
        },
        Value::Nil => Ok(Value::Nil),
        other if func.is_builtin() => value::to_value(scope, other),
        _ => Ok(Value::Nil),
    }
}

fn call_user(
    func: &Rc<Func>,
    user: &UserFn,
    scope: &ScopeRef,
    selfv: Option<Value>,
    args: Vec<Value>,
) -> Result<Value, OpError> {
    let super_args = if selfv.is_some() { args.clone() } else { Vec::new() };
    let mut binds = map_params(scope, &func.params, func.vararg, args)?;
    if let Some(receiver) = &selfv {
        binds.insert("self".to_string(), value::self_value(receiver));
        binds.insert(
            "super".to_string(),
            make_super(receiver, &func.name, &super_args),
        );
    }
    let call_scope = user.scope.child(binds);
    user.runtime
        .eval_block(&call_scope, &user.block, &user.catches)
        .map_err(OpError::from)
}

fn call_super(sup: &SuperFn, scope: &ScopeRef, args: Vec<Value>) -> Result<Value, OpError> {
    let Some(parent) = sup.class.parent() else {
        return Ok(Value::Nil);
    };
    let attr = parent.index(&sup.method, sup.inst.is_some(), true)?;
    let receiver = sup.inst.clone().map(Value::Instance);
    let call_args = if args.is_empty() {
        sup.args.clone()
    } else {
        args
    };
    attr.call(scope, receiver, call_args)
}

/// Binds positional parameters left to right; a variadic final parameter
/// collects the remaining arguments into a Table. Parameters without a
/// matching argument stay unbound.
fn map_params(
    scope: &ScopeRef,
    params: &[String],
    vararg: bool,
    args: Vec<Value>,
) -> Result<HashMap<String, Value>, OpError> {
    let mut binds = HashMap::new();
    let positional = if vararg {
        params.len().saturating_sub(1)
    } else {
        params.len()
    };
    for (name, val) in params.iter().take(positional).zip(args.iter()) {
        binds.insert(name.clone(), val.clone());
    }
    if vararg {
        let rest = if args.len() > positional {
            args[positional..].to_vec()
        } else {
            Vec::new()
        };
        let table = create(scope, "Table", rest)?;
        if let Some(last) = params.last() {
            binds.insert(last.clone(), table);
        }
    }
    Ok(binds)
}
