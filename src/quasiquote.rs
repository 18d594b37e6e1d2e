// ABOUTME: Quasiquote expander: rewrites backtick forms with unquote and splicing

use crate::env::Frame;
use crate::error::BraidError;
use crate::eval::eval;
use crate::value::{HeadKind, SourceInfo, Value};
use std::rc::Rc;

/// Expand the argument of a `quasiquote` form.
pub fn expand(form: &Value, env: &Rc<Frame>) -> Result<Value, BraidError> {
    qq(form, env, 1)
}

enum Expanded {
    One(Value),
    Splice(Vec<Value>),
}

fn second(form: &Value) -> Result<Value, BraidError> {
    form.list_values()
        .and_then(|items| items.get(1).cloned())
        .ok_or_else(|| BraidError::user("unquote: expected 1 argument"))
}

/// Elements of a cons chain plus its dotted tail, if any.
fn chain_parts(form: &Value) -> (Vec<Value>, Option<Value>) {
    let mut items = Vec::new();
    let mut cur = form.clone();
    loop {
        match cur {
            Value::Cons(cell) => {
                items.push(cell.car.borrow().clone());
                let next = cell.cdr.borrow().clone();
                cur = next;
            }
            Value::Nil => return (items, None),
            tail => return (items, Some(tail)),
        }
    }
}

fn rebuild(items: Vec<Value>, tail: Option<Value>, info: &SourceInfo) -> Value {
    let mut out = tail.unwrap_or(Value::Nil);
    for item in items.into_iter().rev() {
        out = Value::cons(item, out, info.clone());
    }
    out
}

fn wrap(head: crate::symbol::Symbol, inner: Value, info: &SourceInfo) -> Value {
    Value::cons(
        Value::Symbol(head),
        Value::cons(inner, Value::Nil, info.clone()),
        info.clone(),
    )
}

fn qq(form: &Value, env: &Rc<Frame>, depth: usize) -> Result<Value, BraidError> {
    match form {
        Value::Cons(cell) => match cell.head {
            HeadKind::Unquote => {
                let arg = second(form)?;
                if depth == 1 {
                    eval(&arg, env)
                } else {
                    let inner = qq(&arg, env, depth - 1)?;
                    Ok(wrap(crate::symbol::wk().unquote, inner, &cell.info))
                }
            }
            HeadKind::UnquoteSplice => {
                if depth == 1 {
                    Err(BraidError::user_at(
                        "unquote-splice is only valid inside a collection",
                        &cell.info,
                    ))
                } else {
                    let inner = qq(&second(form)?, env, depth - 1)?;
                    Ok(wrap(crate::symbol::wk().unquote_splice, inner, &cell.info))
                }
            }
            HeadKind::Quasiquote => {
                let inner = qq(&second(form)?, env, depth + 1)?;
                Ok(wrap(crate::symbol::wk().quasiquote, inner, &cell.info))
            }
            _ => {
                let (items, tail) = chain_parts(form);
                let mut out = Vec::new();
                for item in items {
                    match expand_element(&item, env, depth)? {
                        Expanded::One(v) => out.push(v),
                        Expanded::Splice(vs) => out.extend(vs),
                    }
                }
                let new_tail = match tail {
                    Some(t) => Some(qq(&t, env, depth)?),
                    None => None,
                };
                Ok(rebuild(out, new_tail, &cell.info))
            }
        },
        Value::VectorLit(items) => {
            Ok(Value::VectorLit(Rc::new(expand_all(items, env, depth)?)))
        }
        // Splicing a dictionary contributes interleaved key/value pairs,
        // which land as entries of the surrounding dictionary literal.
        Value::DictLit(items) => Ok(Value::DictLit(Rc::new(expand_all(items, env, depth)?))),
        Value::SetLit(items) => Ok(Value::SetLit(Rc::new(expand_all(items, env, depth)?))),
        other => Ok(other.clone()),
    }
}

fn expand_all(items: &[Value], env: &Rc<Frame>, depth: usize) -> Result<Vec<Value>, BraidError> {
    let mut out = Vec::new();
    for item in items {
        match expand_element(item, env, depth)? {
            Expanded::One(v) => out.push(v),
            Expanded::Splice(vs) => out.extend(vs),
        }
    }
    Ok(out)
}

fn expand_element(item: &Value, env: &Rc<Frame>, depth: usize) -> Result<Expanded, BraidError> {
    if depth == 1 {
        if let Value::Cons(cell) = item {
            if cell.head == HeadKind::UnquoteSplice {
                let spliced = eval(&second(item)?, env)?;
                let values = match &spliced {
                    Value::Dict(map) => {
                        let mut pairs = Vec::new();
                        for (k, v) in map.borrow().iter() {
                            pairs.push(k.clone());
                            pairs.push(v.clone());
                        }
                        pairs
                    }
                    other => other.seq_values().ok_or_else(|| {
                        BraidError::user_at(
                            format!("unquote-splice requires a sequence, got {}", other.type_name()),
                            &cell.info,
                        )
                    })?,
                };
                return Ok(Expanded::Splice(values));
            }
        }
    }
    Ok(Expanded::One(qq(item, env, depth)?))
}
