//! Dictionary and hash-set operations
//!
//! Dictionaries preserve insertion order; iteration order is observable.

use crate::env::Frame;
use crate::error::{BraidError, ARITY_ONE, ARITY_TWO};
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::rc::Rc;

fn dict_arg(
    v: &Value,
    function: &str,
    position: usize,
) -> Result<Rc<RefCell<IndexMap<Value, Value>>>, BraidError> {
    match v {
        Value::Dict(d) => Ok(d.clone()),
        other => Err(BraidError::type_error(function, "dict", other, position)),
    }
}

fn set_arg(
    v: &Value,
    function: &str,
    position: usize,
) -> Result<Rc<RefCell<IndexSet<Value>>>, BraidError> {
    match v {
        Value::Set(s) => Ok(s.clone()),
        other => Err(BraidError::type_error(function, "set", other, position)),
    }
}

/// (dict k v …) — a fresh ordered dictionary.
pub fn builtin_dict(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() % 2 != 0 {
        return Err(BraidError::user("dict: expected key/value pairs"));
    }
    let mut map = IndexMap::new();
    let mut iter = args.iter();
    while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
        map.insert(k.clone(), v.clone());
    }
    Ok(Value::dict(map))
}

/// (get dict key default?) — lookup with optional default.
pub fn builtin_get(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() < 2 || args.len() > 3 {
        return Err(BraidError::arity_error("get", "2-3", args.len()));
    }
    let map = dict_arg(&args[0], "get", 0)?;
    let found = map.borrow().get(&args[1]).cloned();
    Ok(found.unwrap_or_else(|| args.get(2).cloned().unwrap_or(Value::Nil)))
}

/// (put dict key value) — in-place write; returns the dictionary.
pub fn builtin_put(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 3 {
        return Err(BraidError::arity_error("put", "3", args.len()));
    }
    let map = dict_arg(&args[0], "put", 0)?;
    map.borrow_mut().insert(args[1].clone(), args[2].clone());
    Ok(args[0].clone())
}

pub fn builtin_keys(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("keys", ARITY_ONE, args.len()));
    }
    let map = dict_arg(&args[0], "keys", 0)?;
    let keys: Vec<Value> = map.borrow().keys().cloned().collect();
    Ok(Value::vector(keys))
}

pub fn builtin_vals(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("vals", ARITY_ONE, args.len()));
    }
    let map = dict_arg(&args[0], "vals", 0)?;
    let vals: Vec<Value> = map.borrow().values().cloned().collect();
    Ok(Value::vector(vals))
}

pub fn builtin_contains_key(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("contains-key?", ARITY_TWO, args.len()));
    }
    let map = dict_arg(&args[0], "contains-key?", 0)?;
    let found = map.borrow().contains_key(&args[1]);
    Ok(Value::Bool(found))
}

/// (dissoc dict key) — in-place removal preserving the remaining order.
pub fn builtin_dissoc(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("dissoc", ARITY_TWO, args.len()));
    }
    let map = dict_arg(&args[0], "dissoc", 0)?;
    map.borrow_mut().shift_remove(&args[1]);
    Ok(args[0].clone())
}

/// (merge a b …) — a fresh dictionary; later entries win.
pub fn builtin_merge(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut out = IndexMap::new();
    for (i, arg) in args.iter().enumerate() {
        let map = dict_arg(arg, "merge", i)?;
        for (k, v) in map.borrow().iter() {
            out.insert(k.clone(), v.clone());
        }
    }
    Ok(Value::dict(out))
}

/// (hash-set …) — a fresh set of the arguments.
pub fn builtin_hash_set(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut set = IndexSet::new();
    for arg in args {
        set.insert(arg.clone());
    }
    Ok(Value::Set(Rc::new(RefCell::new(set))))
}

pub fn builtin_set_add(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("set-add", ARITY_TWO, args.len()));
    }
    let set = set_arg(&args[0], "set-add", 0)?;
    set.borrow_mut().insert(args[1].clone());
    Ok(args[0].clone())
}

pub fn builtin_set_contains(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("set-contains?", ARITY_TWO, args.len()));
    }
    let set = set_arg(&args[0], "set-contains?", 0)?;
    let found = set.borrow().contains(&args[1]);
    Ok(Value::Bool(found))
}

pub fn builtin_union(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut out = IndexSet::new();
    for (i, arg) in args.iter().enumerate() {
        let set = set_arg(arg, "union", i)?;
        for v in set.borrow().iter() {
            out.insert(v.clone());
        }
    }
    Ok(Value::Set(Rc::new(RefCell::new(out))))
}

pub fn builtin_intersection(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() < 2 {
        return Err(BraidError::arity_error("intersection", ARITY_TWO, args.len()));
    }
    let first = set_arg(&args[0], "intersection", 0)?;
    let mut out: IndexSet<Value> = first.borrow().clone();
    for (i, arg) in args[1..].iter().enumerate() {
        let set = set_arg(arg, "intersection", i + 1)?;
        let keep = set.borrow();
        out.retain(|v| keep.contains(v));
    }
    Ok(Value::Set(Rc::new(RefCell::new(out))))
}

pub fn builtin_difference(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() < 2 {
        return Err(BraidError::arity_error("difference", ARITY_TWO, args.len()));
    }
    let first = set_arg(&args[0], "difference", 0)?;
    let mut out: IndexSet<Value> = first.borrow().clone();
    for (i, arg) in args[1..].iter().enumerate() {
        let set = set_arg(arg, "difference", i + 1)?;
        let remove = set.borrow();
        out.retain(|v| !remove.contains(v));
    }
    Ok(Value::Set(Rc::new(RefCell::new(out))))
}

pub fn register(env: &Rc<Frame>) {
    super::define(env, "dict", builtin_dict);
    super::define(env, "get", builtin_get);
    super::define(env, "put", builtin_put);
    super::define(env, "keys", builtin_keys);
    super::define(env, "vals", builtin_vals);
    super::define(env, "contains-key?", builtin_contains_key);
    super::define(env, "dissoc", builtin_dissoc);
    super::define(env, "merge", builtin_merge);
    super::define(env, "hash-set", builtin_hash_set);
    super::define(env, "set-add", builtin_set_add);
    super::define(env, "set-contains?", builtin_set_contains);
    super::define(env, "union", builtin_union);
    super::define(env, "intersection", builtin_intersection);
    super::define(env, "difference", builtin_difference);
}
