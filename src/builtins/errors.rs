//! Error raising helpers: throw, assert
//!
//! Raised errors carry the default user kind; `try`/`catch` intercepts them,
//! `quit` and the stop flag bypass the handler.

use crate::env::Frame;
use crate::error::{BraidError, ARITY_ONE_OR_TWO};
use crate::value::Value;
use std::rc::Rc;

/// (throw message) — raise a user error.
pub fn builtin_throw(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    let message = match args.first() {
        Some(v) => v.display_string(),
        None => "error".to_string(),
    };
    Err(BraidError::user(message))
}

/// (assert cond message?) — raise unless cond is truthy.
pub fn builtin_assert(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.is_empty() || args.len() > 2 {
        return Err(BraidError::arity_error("assert", ARITY_ONE_OR_TWO, args.len()));
    }
    if args[0].is_truthy() {
        return Ok(Value::Bool(true));
    }
    let message = match args.get(1) {
        Some(v) => v.display_string(),
        None => "assertion failed".to_string(),
    };
    Err(BraidError::user(message))
}

pub fn register(env: &Rc<Frame>) {
    super::define(env, "throw", builtin_throw);
    super::define(env, "assert", builtin_assert);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Frame;

    #[test]
    fn test_throw_raises_user_error() {
        let env = Frame::global();
        let err = builtin_throw(&[Value::str("boom")], &env).unwrap_err();
        assert!(matches!(err, BraidError::User { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_assert() {
        let env = Frame::global();
        assert!(builtin_assert(&[Value::Bool(true)], &env).is_ok());
        assert!(builtin_assert(&[Value::Nil, Value::str("nope")], &env).is_err());
    }
}
