//! List and sequence primitives: cons, car, cdr, list, first, rest, last,
//! nth, length, reverse, append

use crate::env::Frame;
use crate::error::{BraidError, ARITY_ONE, ARITY_TWO};
use crate::value::{SourceInfo, Value};
use std::rc::Rc;

fn seq_arg(v: &Value, function: &str) -> Result<Vec<Value>, BraidError> {
    v.seq_values()
        .ok_or_else(|| BraidError::type_error(function, "sequence", v, 0))
}

/// (cons a b) — a fresh pair; lists grow by consing onto their head.
pub fn builtin_cons(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("cons", ARITY_TWO, args.len()));
    }
    Ok(Value::cons(
        args[0].clone(),
        args[1].clone(),
        SourceInfo::default(),
    ))
}

/// (car pair) — the head; nil for an empty list.
pub fn builtin_car(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("car", ARITY_ONE, args.len()));
    }
    match &args[0] {
        Value::Cons(cell) => Ok(cell.car.borrow().clone()),
        Value::Nil => Ok(Value::Nil),
        other => Err(BraidError::type_error("car", "list", other, 0)),
    }
}

/// (cdr pair) — the tail; nil for an empty list.
pub fn builtin_cdr(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("cdr", ARITY_ONE, args.len()));
    }
    match &args[0] {
        Value::Cons(cell) => Ok(cell.cdr.borrow().clone()),
        Value::Nil => Ok(Value::Nil),
        other => Err(BraidError::type_error("cdr", "list", other, 0)),
    }
}

/// (list …) — a fresh list of the arguments.
pub fn builtin_list(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    Ok(Value::list(args.to_vec()))
}

/// (first seq) — first element of any sequence; nil when empty.
pub fn builtin_first(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("first", ARITY_ONE, args.len()));
    }
    Ok(seq_arg(&args[0], "first")?.into_iter().next().unwrap_or(Value::Nil))
}

/// (rest seq) — everything after the first element, as the same shape as
/// the input (lists stay lists, vectors stay vectors).
pub fn builtin_rest(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("rest", ARITY_ONE, args.len()));
    }
    match &args[0] {
        Value::Cons(cell) => Ok(cell.cdr.borrow().clone()),
        Value::Nil => Ok(Value::Nil),
        other => {
            let mut values = seq_arg(other, "rest")?;
            if values.is_empty() {
                return Ok(Value::vector(Vec::new()));
            }
            values.remove(0);
            Ok(Value::vector(values))
        }
    }
}

pub fn builtin_last(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("last", ARITY_ONE, args.len()));
    }
    Ok(seq_arg(&args[0], "last")?.into_iter().last().unwrap_or(Value::Nil))
}

/// (nth seq n) — element by zero-based index; nil out of range.
pub fn builtin_nth(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("nth", ARITY_TWO, args.len()));
    }
    let index = match &args[1] {
        Value::Int(i) if *i >= 0 => *i as usize,
        other => return Err(BraidError::type_error("nth", "non-negative int", other, 1)),
    };
    Ok(seq_arg(&args[0], "nth")?
        .into_iter()
        .nth(index)
        .unwrap_or(Value::Nil))
}

/// (length x) — element count of any sequence, dictionary, or string.
pub fn builtin_length(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("length", ARITY_ONE, args.len()));
    }
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::Dict(d) => d.borrow().len(),
        Value::Set(s) => s.borrow().len(),
        other => seq_arg(other, "length")?.len(),
    };
    Ok(Value::Int(n as i64))
}

pub fn builtin_reverse(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("reverse", ARITY_ONE, args.len()));
    }
    let mut values = seq_arg(&args[0], "reverse")?;
    values.reverse();
    Ok(match &args[0] {
        Value::Vector(_) | Value::Slice(_) => Value::vector(values),
        _ => Value::list(values),
    })
}

/// (append seq …) — concatenation; the result takes the first argument's
/// shape.
pub fn builtin_append(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut out = Vec::new();
    for arg in args {
        crate::eval::check_stop()?;
        out.extend(seq_arg(arg, "append")?);
    }
    Ok(match args.first() {
        Some(Value::Vector(_)) | Some(Value::Slice(_)) => Value::vector(out),
        _ => Value::list(out),
    })
}

pub fn register(env: &Rc<Frame>) {
    super::define(env, "cons", builtin_cons);
    super::define(env, "car", builtin_car);
    super::define(env, "cdr", builtin_cdr);
    super::define(env, "list", builtin_list);
    super::define(env, "first", builtin_first);
    super::define(env, "rest", builtin_rest);
    super::define(env, "last", builtin_last);
    super::define(env, "nth", builtin_nth);
    super::define(env, "length", builtin_length);
    super::define(env, "reverse", builtin_reverse);
    super::define(env, "append", builtin_append);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Frame;

    fn env() -> Rc<Frame> {
        Frame::global()
    }

    #[test]
    fn test_cons_car_cdr() {
        let pair = builtin_cons(&[Value::Int(1), Value::Int(2)], &env()).unwrap();
        assert_eq!(builtin_car(&[pair.clone()], &env()).unwrap(), Value::Int(1));
        assert_eq!(builtin_cdr(&[pair], &env()).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_car_of_empty_is_nil() {
        assert_eq!(builtin_car(&[Value::Nil], &env()).unwrap(), Value::Nil);
        assert_eq!(builtin_cdr(&[Value::Nil], &env()).unwrap(), Value::Nil);
    }

    #[test]
    fn test_first_rest_over_vector() {
        let vec = Value::vector(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(builtin_first(&[vec.clone()], &env()).unwrap(), Value::Int(1));
        assert_eq!(
            builtin_rest(&[vec], &env()).unwrap(),
            Value::vector(vec![Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_length_counts_chars_and_entries() {
        assert_eq!(
            builtin_length(&[Value::str("abc")], &env()).unwrap(),
            Value::Int(3)
        );
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(builtin_length(&[list], &env()).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_append_keeps_first_shape() {
        let a = Value::vector(vec![Value::Int(1)]);
        let b = Value::list(vec![Value::Int(2)]);
        let joined = builtin_append(&[a, b], &env()).unwrap();
        assert_eq!(joined, Value::vector(vec![Value::Int(1), Value::Int(2)]));
    }
}
