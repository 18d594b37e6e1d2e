//! Higher-order sequence operations: map, filter, reduce, apply, range,
//! count, empty?, concat, take, drop
//!
//! These consume any sequence kind (lists, vectors, slices, ranges,
//! strings, sets, dictionaries as key/value pairs) and poll the stop flag
//! between elements.

use crate::env::Frame;
use crate::error::{BraidError, ARITY_AT_LEAST_ONE, ARITY_ONE, ARITY_TWO};
use crate::eval::{apply, check_stop};
use crate::value::{RangeList, Value};
use indexmap::IndexMap;
use std::rc::Rc;

fn seq_arg(v: &Value, function: &str, position: usize) -> Result<Vec<Value>, BraidError> {
    v.seq_values()
        .ok_or_else(|| BraidError::type_error(function, "sequence", v, position))
}

fn same_shape(template: &Value, values: Vec<Value>) -> Value {
    match template {
        Value::Vector(_) | Value::Slice(_) | Value::Range(_) => Value::vector(values),
        _ => Value::list(values),
    }
}

/// (map f seq) — f applied to each element; result takes the input's shape.
pub fn builtin_map(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("map", ARITY_TWO, args.len()));
    }
    let values = seq_arg(&args[1], "map", 1)?;
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        check_stop()?;
        out.push(apply(&args[0], vec![v], IndexMap::new(), env)?);
    }
    Ok(same_shape(&args[1], out))
}

/// (filter pred seq) — elements for which pred is truthy.
pub fn builtin_filter(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("filter", ARITY_TWO, args.len()));
    }
    let values = seq_arg(&args[1], "filter", 1)?;
    let mut out = Vec::new();
    for v in values {
        check_stop()?;
        if apply(&args[0], vec![v.clone()], IndexMap::new(), env)?.is_truthy() {
            out.push(v);
        }
    }
    Ok(same_shape(&args[1], out))
}

/// (reduce f init seq) or (reduce f seq) — left fold.
pub fn builtin_reduce(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    let (f, mut acc, values) = match args.len() {
        2 => {
            let mut values = seq_arg(&args[1], "reduce", 1)?;
            if values.is_empty() {
                return Ok(Value::Nil);
            }
            let first = values.remove(0);
            (&args[0], first, values)
        }
        3 => (&args[0], args[1].clone(), seq_arg(&args[2], "reduce", 2)?),
        n => return Err(BraidError::arity_error("reduce", "2-3", n)),
    };
    for v in values {
        check_stop()?;
        acc = apply(f, vec![acc, v], IndexMap::new(), env)?;
    }
    Ok(acc)
}

/// (apply f seq) — call f with the sequence as its positional arguments.
pub fn builtin_apply(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() < 2 {
        return Err(BraidError::arity_error("apply", ARITY_TWO, args.len()));
    }
    let mut call_args: Vec<Value> = args[1..args.len() - 1].to_vec();
    call_args.extend(seq_arg(&args[args.len() - 1], "apply", args.len() - 1)?);
    apply(&args[0], call_args, IndexMap::new(), env)
}

/// (range n), (range a b), (range a b step) — lazy arithmetic progression,
/// upper bound exclusive.
pub fn builtin_range(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    fn int(v: &Value, pos: usize) -> Result<i64, BraidError> {
        match v {
            Value::Int(i) => Ok(*i),
            other => Err(BraidError::type_error("range", "int", other, pos)),
        }
    }
    let (lower, upper, step) = match args.len() {
        1 => (0, int(&args[0], 0)?, 1),
        2 => (int(&args[0], 0)?, int(&args[1], 1)?, 1),
        3 => (int(&args[0], 0)?, int(&args[1], 1)?, int(&args[2], 2)?),
        n => return Err(BraidError::arity_error("range", "1-3", n)),
    };
    if step == 0 {
        return Err(BraidError::user("range: step must not be zero"));
    }
    Ok(Value::Range(Rc::new(RangeList { lower, upper, step })))
}

pub fn builtin_count(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    crate::builtins::lists::builtin_length(args, env)
}

pub fn builtin_empty(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("empty?", ARITY_ONE, args.len()));
    }
    let empty = match &args[0] {
        Value::Nil => true,
        Value::Str(s) => s.is_empty(),
        Value::Dict(d) => d.borrow().is_empty(),
        Value::Set(s) => s.borrow().is_empty(),
        other => seq_arg(other, "empty?", 0)?.is_empty(),
    };
    Ok(Value::Bool(empty))
}

/// (concat seq …) — flattened concatenation as a vector.
pub fn builtin_concat(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.is_empty() {
        return Err(BraidError::arity_error("concat", ARITY_AT_LEAST_ONE, 0));
    }
    let mut out = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        check_stop()?;
        out.extend(seq_arg(arg, "concat", i)?);
    }
    Ok(Value::vector(out))
}

pub fn builtin_take(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("take", ARITY_TWO, args.len()));
    }
    let n = match &args[0] {
        Value::Int(i) if *i >= 0 => *i as usize,
        other => return Err(BraidError::type_error("take", "non-negative int", other, 0)),
    };
    let values = seq_arg(&args[1], "take", 1)?;
    Ok(same_shape(&args[1], values.into_iter().take(n).collect()))
}

pub fn builtin_drop(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("drop", ARITY_TWO, args.len()));
    }
    let n = match &args[0] {
        Value::Int(i) if *i >= 0 => *i as usize,
        other => return Err(BraidError::type_error("drop", "non-negative int", other, 0)),
    };
    let values = seq_arg(&args[1], "drop", 1)?;
    Ok(same_shape(&args[1], values.into_iter().skip(n).collect()))
}

pub fn register(env: &Rc<Frame>) {
    super::define(env, "map", builtin_map);
    super::define(env, "filter", builtin_filter);
    super::define(env, "reduce", builtin_reduce);
    super::define(env, "apply", builtin_apply);
    super::define(env, "range", builtin_range);
    super::define(env, "count", builtin_count);
    super::define(env, "empty?", builtin_empty);
    super::define(env, "concat", builtin_concat);
    super::define(env, "take", builtin_take);
    super::define(env, "drop", builtin_drop);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Frame;

    fn env() -> Rc<Frame> {
        Frame::global()
    }

    #[test]
    fn test_range_values() {
        let r = builtin_range(&[Value::Int(3)], &env()).unwrap();
        assert_eq!(
            r.seq_values().unwrap(),
            vec![Value::Int(0), Value::Int(1), Value::Int(2)]
        );
        let r = builtin_range(&[Value::Int(5), Value::Int(1), Value::Int(-2)], &env()).unwrap();
        assert_eq!(r.seq_values().unwrap(), vec![Value::Int(5), Value::Int(3)]);
        assert!(builtin_range(&[Value::Int(1), Value::Int(2), Value::Int(0)], &env()).is_err());
    }

    #[test]
    fn test_take_drop() {
        let v = Value::vector(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(
            builtin_take(&[Value::Int(2), v.clone()], &env()).unwrap(),
            Value::vector(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            builtin_drop(&[Value::Int(2), v], &env()).unwrap(),
            Value::vector(vec![Value::Int(3)])
        );
    }

    #[test]
    fn test_empty_predicate() {
        assert_eq!(builtin_empty(&[Value::Nil], &env()).unwrap(), Value::Bool(true));
        assert_eq!(
            builtin_empty(&[Value::str("")], &env()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            builtin_empty(&[Value::vector(vec![Value::Int(1)])], &env()).unwrap(),
            Value::Bool(false)
        );
    }
}
