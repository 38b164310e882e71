//! Lexical scope chain.
//!
//! Scopes are reified data rather than host closures so `eval` and `require`
//! can inject bindings. Assignment walks the chain to the defining scope and
//! mutates it there; only unbound names create a new entry in the current
//! scope. Every scope in a chain shares one output sink for `print`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::{Rc, Weak};

use crate::runtime::value::Value;

pub type ScopeRef = Rc<Scope>;
pub type Output = Rc<RefCell<dyn Write>>;

pub struct Scope {
    data: RefCell<HashMap<String, Value>>,
    out: Output,
    parent: Option<ScopeRef>,
    me: Weak<Scope>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({} bindings)", self.data.borrow().len())
    }
}

impl Scope {
    pub fn root(out: Output) -> ScopeRef {
        Rc::new_cyclic(|me| Self {
            data: RefCell::new(HashMap::new()),
            out,
            parent: None,
            me: me.clone(),
        })
    }

    pub fn child(&self, binds: HashMap<String, Value>) -> ScopeRef {
        let parent = self.me.upgrade().expect("scope is alive while borrowed");
        Rc::new_cyclic(|me| Self {
            data: RefCell::new(binds),
            out: self.out.clone(),
            parent: Some(parent),
            me: me.clone(),
        })
    }

    fn find(&self, key: &str) -> Option<&Scope> {
        let mut scope = self;
        loop {
            if scope.data.borrow().contains_key(key) {
                return Some(scope);
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => return None,
            }
        }
    }

    /// Rebinds an existing name wherever it was defined, otherwise defines it
    /// here.
    pub fn set(&self, key: &str, value: Value) {
        match self.find(key) {
            Some(owner) => {
                owner.data.borrow_mut().insert(key.to_string(), value);
            }
            None => {
                self.data.borrow_mut().insert(key.to_string(), value);
            }
        }
    }

    /// Nil when the name is unbound anywhere on the chain.
    pub fn get(&self, key: &str) -> Value {
        match self.find(key) {
            Some(owner) => owner.data.borrow().get(key).cloned().unwrap_or(Value::Nil),
            None => Value::Nil,
        }
    }

    pub fn write(&self, text: &str) {
        let _ = self.out.borrow_mut().write_all(text.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_scope() -> ScopeRef {
        Scope::root(Rc::new(RefCell::new(Vec::<u8>::new())))
    }

    fn number(scope: &ScopeRef, key: &str) -> f64 {
        match scope.get(key) {
            Value::Number(n) => n,
            other => panic!("expected number for {key}, got {other:?}"),
        }
    }

    #[test]
    fn set_then_get_roundtrips() {
        let scope = test_scope();
        scope.set("x", Value::Number(7.0));
        assert_eq!(number(&scope, "x"), 7.0);
    }

    #[test]
    fn missing_names_are_nil() {
        let scope = test_scope();
        assert!(matches!(scope.get("missing"), Value::Nil));
    }

    #[test]
    fn child_reads_nearest_binding() {
        let outer = test_scope();
        outer.set("x", Value::Number(1.0));
        let inner = outer.child(HashMap::new());
        assert_eq!(number(&inner, "x"), 1.0);

        inner.set("y", Value::Number(2.0));
        assert!(matches!(outer.get("y"), Value::Nil));
    }

    #[test]
    fn binds_shadow_outer_names() {
        let outer = test_scope();
        outer.set("x", Value::Number(1.0));
        let inner = outer.child(HashMap::from([("x".to_string(), Value::Number(9.0))]));
        assert_eq!(number(&inner, "x"), 9.0);
        assert_eq!(number(&outer, "x"), 1.0);
    }

    #[test]
    fn assignment_mutates_defining_scope_instead_of_shadowing() {
        let outer = test_scope();
        outer.set("x", Value::Number(1.0));
        let inner = outer.child(HashMap::new());
        inner.set("x", Value::Number(5.0));
        assert_eq!(number(&outer, "x"), 5.0);
        assert!(inner.data.borrow().get("x").is_none());
    }
}
