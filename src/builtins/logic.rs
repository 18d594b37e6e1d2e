//! Logic operations
//!
//! `and` and `or` are special forms (they short-circuit); only `not` is an
//! ordinary function.

use crate::env::Frame;
use crate::error::{BraidError, ARITY_ONE};
use crate::value::Value;
use std::rc::Rc;

/// (not x) — logical negation; nil and false are falsy, all else truthy.
pub fn builtin_not(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("not", ARITY_ONE, args.len()));
    }
    Ok(Value::Bool(!args[0].is_truthy()))
}

pub fn register(env: &Rc<Frame>) {
    super::define(env, "not", builtin_not);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Frame;

    #[test]
    fn test_not() {
        let env = Frame::global();
        assert_eq!(builtin_not(&[Value::Nil], &env).unwrap(), Value::Bool(true));
        assert_eq!(builtin_not(&[Value::Int(0)], &env).unwrap(), Value::Bool(false));
        assert_eq!(
            builtin_not(&[Value::Bool(false)], &env).unwrap(),
            Value::Bool(true)
        );
    }
}
