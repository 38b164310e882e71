//! `require`: module loading with a per-path cache and host libraries.
//!
//! The cache is first-seen-wins and never evicted. Values are `Rc`-based and
//! the interpreter is single-threaded, so the process-wide singletons live in
//! thread-local storage.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::interpreter;
use crate::runtime::error::OpError;
use crate::runtime::scope::ScopeRef;
use crate::runtime::value::Value;

pub type LibFn = fn(&ScopeRef) -> Result<Value, OpError>;

thread_local! {
    static REGISTERED_LIBS: RefCell<HashMap<String, LibFn>> = RefCell::new(HashMap::new());
    static REQUIRE_CACHE: RefCell<HashMap<String, Value>> = RefCell::new(HashMap::new());
}

/// Registers a named host library. The first `require(name)` invokes it once
/// and caches its value.
pub fn register_lib(name: &str, lib: LibFn) {
    REGISTERED_LIBS.with(|libs| libs.borrow_mut().insert(name.to_string(), lib));
}

pub fn require_path(scope: &ScopeRef, path: &str) -> Result<Value, OpError> {
    if let Some(cached) = REQUIRE_CACHE.with(|cache| cache.borrow().get(path).cloned()) {
        return Ok(cached);
    }

    let val = match REGISTERED_LIBS.with(|libs| libs.borrow().get(path).copied()) {
        Some(lib) => lib(scope)?,
        None => interpreter::eval_file(&scope.child(HashMap::new()), path)
            .map_err(OpError::from_eval)?,
    };

    REQUIRE_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .entry(path.to_string())
            .or_insert_with(|| val.clone());
    });
    Ok(val)
}
