//! Arithmetic operations: +, -, *, /, %, inc, dec, abs
//!
//! Exact integers promote to big integers on overflow; mixing in a float
//! promotes the whole computation to floating point.

use crate::env::Frame;
use crate::error::{BraidError, ARITY_AT_LEAST_ONE, ARITY_ONE, ARITY_TWO};
use crate::value::Value;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::rc::Rc;

enum Num {
    I(i64),
    B(BigInt),
    F(f64),
}

fn num(v: &Value, function: &str, position: usize) -> Result<Num, BraidError> {
    match v {
        Value::Int(i) => Ok(Num::I(*i)),
        Value::BigInt(b) => Ok(Num::B((**b).clone())),
        Value::Float(f) => Ok(Num::F(*f)),
        other => Err(BraidError::type_error(function, "number", other, position)),
    }
}

fn to_value(n: Num) -> Value {
    match n {
        Num::I(i) => Value::Int(i),
        Num::B(b) => Value::BigInt(Rc::new(b)),
        Num::F(f) => Value::Float(f),
    }
}

fn big(i: i64) -> BigInt {
    BigInt::from(i)
}

fn as_f64(n: &Num) -> f64 {
    match n {
        Num::I(i) => *i as f64,
        Num::B(b) => b.to_f64().unwrap_or(f64::INFINITY),
        Num::F(f) => *f,
    }
}

fn add(a: Num, b: Num) -> Num {
    match (a, b) {
        (Num::I(x), Num::I(y)) => match x.checked_add(y) {
            Some(v) => Num::I(v),
            None => Num::B(big(x) + big(y)),
        },
        (Num::B(x), Num::B(y)) => Num::B(x + y),
        (Num::I(x), Num::B(y)) | (Num::B(y), Num::I(x)) => Num::B(big(x) + y),
        (x, y) => Num::F(as_f64(&x) + as_f64(&y)),
    }
}

fn sub(a: Num, b: Num) -> Num {
    match (a, b) {
        (Num::I(x), Num::I(y)) => match x.checked_sub(y) {
            Some(v) => Num::I(v),
            None => Num::B(big(x) - big(y)),
        },
        (Num::B(x), Num::B(y)) => Num::B(x - y),
        (Num::I(x), Num::B(y)) => Num::B(big(x) - y),
        (Num::B(x), Num::I(y)) => Num::B(x - big(y)),
        (x, y) => Num::F(as_f64(&x) - as_f64(&y)),
    }
}

fn mul(a: Num, b: Num) -> Num {
    match (a, b) {
        (Num::I(x), Num::I(y)) => match x.checked_mul(y) {
            Some(v) => Num::I(v),
            None => Num::B(big(x) * big(y)),
        },
        (Num::B(x), Num::B(y)) => Num::B(x * y),
        (Num::I(x), Num::B(y)) | (Num::B(y), Num::I(x)) => Num::B(big(x) * y),
        (x, y) => Num::F(as_f64(&x) * as_f64(&y)),
    }
}

fn is_zero(n: &Num) -> bool {
    match n {
        Num::I(i) => *i == 0,
        Num::B(b) => b.is_zero(),
        Num::F(f) => *f == 0.0,
    }
}

fn div(a: Num, b: Num) -> Result<Num, BraidError> {
    if is_zero(&b) {
        return Err(BraidError::user("division by zero"));
    }
    Ok(match (a, b) {
        // Integer division stays exact when it divides evenly.
        (Num::I(x), Num::I(y)) => {
            if x == i64::MIN && y == -1 {
                Num::B(big(x) / big(y))
            } else if x % y == 0 {
                Num::I(x / y)
            } else {
                Num::F(x as f64 / y as f64)
            }
        }
        (Num::B(x), Num::B(y)) => {
            if (&x % &y).is_zero() {
                Num::B(x / y)
            } else {
                Num::F(x.to_f64().unwrap_or(f64::INFINITY) / y.to_f64().unwrap_or(f64::INFINITY))
            }
        }
        (Num::I(x), Num::B(y)) => {
            let x = big(x);
            if (&x % &y).is_zero() {
                Num::B(x / y)
            } else {
                Num::F(x.to_f64().unwrap_or(0.0) / y.to_f64().unwrap_or(f64::INFINITY))
            }
        }
        (Num::B(x), Num::I(y)) => {
            let y = big(y);
            if (&x % &y).is_zero() {
                Num::B(x / y)
            } else {
                Num::F(x.to_f64().unwrap_or(f64::INFINITY) / y.to_f64().unwrap_or(0.0))
            }
        }
        (x, y) => Num::F(as_f64(&x) / as_f64(&y)),
    })
}

/// (+ …) — sum of all arguments; identity 0.
pub fn builtin_add(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut acc = Num::I(0);
    for (i, arg) in args.iter().enumerate() {
        acc = add(acc, num(arg, "+", i)?);
    }
    Ok(to_value(acc))
}

/// (- first rest…) — subtraction, or negation with one argument.
pub fn builtin_sub(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.is_empty() {
        return Err(BraidError::arity_error("-", ARITY_AT_LEAST_ONE, 0));
    }
    let first = num(&args[0], "-", 0)?;
    if args.len() == 1 {
        return Ok(to_value(sub(Num::I(0), first)));
    }
    let mut acc = first;
    for (i, arg) in args[1..].iter().enumerate() {
        acc = sub(acc, num(arg, "-", i + 1)?);
    }
    Ok(to_value(acc))
}

/// (* …) — product of all arguments; identity 1.
pub fn builtin_mul(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut acc = Num::I(1);
    for (i, arg) in args.iter().enumerate() {
        acc = mul(acc, num(arg, "*", i)?);
    }
    Ok(to_value(acc))
}

/// (/ first rest…) — division; exact while it divides evenly.
pub fn builtin_div(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.is_empty() {
        return Err(BraidError::arity_error("/", ARITY_AT_LEAST_ONE, 0));
    }
    let first = num(&args[0], "/", 0)?;
    if args.len() == 1 {
        return Ok(to_value(div(Num::I(1), first)?));
    }
    let mut acc = first;
    for (i, arg) in args[1..].iter().enumerate() {
        acc = div(acc, num(arg, "/", i + 1)?)?;
    }
    Ok(to_value(acc))
}

/// (% a b) — remainder.
pub fn builtin_mod(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("%", ARITY_TWO, args.len()));
    }
    match (num(&args[0], "%", 0)?, num(&args[1], "%", 1)?) {
        (_, b) if is_zero(&b) => Err(BraidError::user("division by zero")),
        (Num::I(a), Num::I(b)) => Ok(Value::Int(a.wrapping_rem(b))),
        (Num::B(a), Num::B(b)) => Ok(Value::BigInt(Rc::new(a % b))),
        (Num::I(a), Num::B(b)) => Ok(Value::BigInt(Rc::new(big(a) % b))),
        (Num::B(a), Num::I(b)) => Ok(Value::BigInt(Rc::new(a % big(b)))),
        (a, b) => Ok(Value::Float(as_f64(&a) % as_f64(&b))),
    }
}

pub fn builtin_inc(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("inc", ARITY_ONE, args.len()));
    }
    builtin_add(&[args[0].clone(), Value::Int(1)], env)
}

pub fn builtin_dec(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("dec", ARITY_ONE, args.len()));
    }
    builtin_sub(&[args[0].clone(), Value::Int(1)], env)
}

pub fn builtin_abs(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("abs", ARITY_ONE, args.len()));
    }
    Ok(match num(&args[0], "abs", 0)? {
        Num::I(i) => Value::Int(i.abs()),
        Num::B(b) => Value::BigInt(Rc::new(b.abs())),
        Num::F(f) => Value::Float(f.abs()),
    })
}

pub fn register(env: &Rc<Frame>) {
    super::define(env, "+", builtin_add);
    super::define(env, "-", builtin_sub);
    super::define(env, "*", builtin_mul);
    super::define(env, "/", builtin_div);
    super::define(env, "%", builtin_mod);
    super::define(env, "inc", builtin_inc);
    super::define(env, "dec", builtin_dec);
    super::define(env, "abs", builtin_abs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Frame;

    fn env() -> Rc<Frame> {
        Frame::global()
    }

    #[test]
    fn test_add_identity_and_sum() {
        assert_eq!(builtin_add(&[], &env()).unwrap(), Value::Int(0));
        let args = [Value::Int(1), Value::Int(2), Value::Int(3)];
        assert_eq!(builtin_add(&args, &env()).unwrap(), Value::Int(6));
    }

    #[test]
    fn test_add_promotes_on_overflow() {
        let args = [Value::Int(i64::MAX), Value::Int(1)];
        match builtin_add(&args, &env()).unwrap() {
            Value::BigInt(b) => {
                assert_eq!(*b, BigInt::from(i64::MAX) + 1);
            }
            other => panic!("expected bigint, got {}", other),
        }
    }

    #[test]
    fn test_mixed_float_promotes() {
        let args = [Value::Int(1), Value::Float(0.5)];
        assert_eq!(builtin_add(&args, &env()).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_sub_and_negate() {
        assert_eq!(
            builtin_sub(&[Value::Int(10), Value::Int(3), Value::Int(2)], &env()).unwrap(),
            Value::Int(5)
        );
        assert_eq!(builtin_sub(&[Value::Int(5)], &env()).unwrap(), Value::Int(-5));
    }

    #[test]
    fn test_div_exact_vs_float() {
        assert_eq!(
            builtin_div(&[Value::Int(20), Value::Int(4)], &env()).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            builtin_div(&[Value::Int(5), Value::Int(2)], &env()).unwrap(),
            Value::Float(2.5)
        );
        assert!(builtin_div(&[Value::Int(1), Value::Int(0)], &env()).is_err());
    }

    #[test]
    fn test_mod() {
        assert_eq!(
            builtin_mod(&[Value::Int(17), Value::Int(5)], &env()).unwrap(),
            Value::Int(2)
        );
        assert!(builtin_mod(&[Value::Int(1), Value::Int(0)], &env()).is_err());
    }

    #[test]
    fn test_type_error_mentions_position() {
        let err = builtin_add(&[Value::Int(1), Value::str("x")], &env()).unwrap_err();
        assert!(err.to_string().contains("argument 1"));
    }
}
