//! Comparison operations: ==, !=, <, >, <=, >=
//!
//! Equality is deep structural equality; numbers compare across the
//! Int/BigInt/Float kinds. Ordering is defined for numbers, strings,
//! characters, keywords and symbols.

use crate::env::Frame;
use crate::error::{BraidError, ARITY_AT_LEAST_TWO};
use crate::value::Value;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::cmp::Ordering;
use std::rc::Rc;

fn compare(a: &Value, b: &Value, function: &str) -> Result<Ordering, BraidError> {
    let ord = match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.partial_cmp(y),
        (Value::BigInt(x), Value::BigInt(y)) => x.partial_cmp(y),
        (Value::Int(x), Value::BigInt(y)) => BigInt::from(*x).partial_cmp(y.as_ref()),
        (Value::BigInt(x), Value::Int(y)) => (**x).partial_cmp(&BigInt::from(*y)),
        (Value::Str(x), Value::Str(y)) => x.partial_cmp(y),
        (Value::Char(x), Value::Char(y)) => x.partial_cmp(y),
        (Value::Keyword(x), Value::Keyword(y)) => x.text().partial_cmp(&y.text()),
        (Value::Symbol(x), Value::Symbol(y)) => x.text().partial_cmp(&y.text()),
        (x, y) => {
            let fx = num_f64(x);
            let fy = num_f64(y);
            match (fx, fy) {
                (Some(fx), Some(fy)) => fx.partial_cmp(&fy),
                _ => None,
            }
        }
    };
    ord.ok_or_else(|| {
        BraidError::user(format!(
            "{}: cannot compare {} with {}",
            function,
            a.type_name(),
            b.type_name()
        ))
    })
}

fn num_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::BigInt(b) => b.to_f64(),
        _ => None,
    }
}

fn pairwise(
    args: &[Value],
    function: &str,
    test: impl Fn(Ordering) -> bool,
) -> Result<Value, BraidError> {
    if args.len() < 2 {
        return Err(BraidError::arity_error(function, ARITY_AT_LEAST_TWO, args.len()));
    }
    for pair in args.windows(2) {
        if !test(compare(&pair[0], &pair[1], function)?) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

/// (== a b …) — deep structural equality over all arguments.
pub fn builtin_eq(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() < 2 {
        return Err(BraidError::arity_error("==", ARITY_AT_LEAST_TWO, args.len()));
    }
    Ok(Value::Bool(args.windows(2).all(|w| w[0] == w[1])))
}

pub fn builtin_ne(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    match builtin_eq(args, env)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

pub fn builtin_lt(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    pairwise(args, "<", |o| o == Ordering::Less)
}

pub fn builtin_gt(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    pairwise(args, ">", |o| o == Ordering::Greater)
}

pub fn builtin_le(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    pairwise(args, "<=", |o| o != Ordering::Greater)
}

pub fn builtin_ge(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    pairwise(args, ">=", |o| o != Ordering::Less)
}

pub fn register(env: &Rc<Frame>) {
    super::define(env, "==", builtin_eq);
    super::define(env, "!=", builtin_ne);
    super::define(env, "<", builtin_lt);
    super::define(env, ">", builtin_gt);
    super::define(env, "<=", builtin_le);
    super::define(env, ">=", builtin_ge);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Frame;

    fn env() -> Rc<Frame> {
        Frame::global()
    }

    #[test]
    fn test_equality_across_kinds() {
        let args = [Value::Int(2), Value::Float(2.0)];
        assert_eq!(builtin_eq(&args, &env()).unwrap(), Value::Bool(true));

        let args = [
            Value::list(vec![Value::Int(1), Value::Int(2)]),
            Value::list(vec![Value::Int(1), Value::Int(2)]),
        ];
        assert_eq!(builtin_eq(&args, &env()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_ordering_chain() {
        let args = [Value::Int(1), Value::Int(2), Value::Int(3)];
        assert_eq!(builtin_lt(&args, &env()).unwrap(), Value::Bool(true));
        let args = [Value::Int(1), Value::Int(3), Value::Int(2)];
        assert_eq!(builtin_lt(&args, &env()).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_string_ordering() {
        let args = [Value::str("apple"), Value::str("banana")];
        assert_eq!(builtin_lt(&args, &env()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_incomparable_types_raise() {
        let args = [Value::Int(1), Value::str("x")];
        assert!(builtin_lt(&args, &env()).is_err());
    }
}
