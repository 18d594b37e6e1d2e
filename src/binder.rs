// ABOUTME: User-function binder: argument binding, destructuring, and the recur loop

use crate::env::Frame;
use crate::error::BraidError;
use crate::eval::{check_stop, eval};
use crate::pattern::{match_positional, MatchElement, MatchOutcome};
use crate::symbol::Symbol;
use crate::types;
use crate::value::{UserFn, Value};
use indexmap::IndexMap;
use std::rc::Rc;

/// Bind a (possibly compound) name to a value.
///
/// A compound name `a:b:…:z` destructures a sequence: each leading component
/// takes one element. The last component takes the matching element when the
/// counts line up exactly, the remaining tail when elements are left over and
/// the name binds rest-to-last, or an empty sequence when the subject ran
/// short. A non-sequence subject destructures as a one-element sequence.
pub fn destructure(
    name: Symbol,
    value: &Value,
    out: &mut Vec<(Symbol, Value)>,
) -> Result<(), BraidError> {
    let Some(components) = name.components() else {
        out.push((name, value.clone()));
        return Ok(());
    };
    let seq = value
        .seq_values()
        .unwrap_or_else(|| vec![value.clone()]);
    let last = components.len() - 1;
    for (i, comp) in components.iter().enumerate() {
        if i < last {
            out.push((*comp, seq.get(i).cloned().unwrap_or(Value::Nil)));
            continue;
        }
        let bound = if seq.len() == components.len() {
            seq[i].clone()
        } else if seq.len() > components.len() {
            if name.bind_rest_to_last() {
                Value::vector(seq[i..].to_vec())
            } else {
                seq[i].clone()
            }
        } else if name.bind_rest_to_last() {
            Value::vector(Vec::new())
        } else {
            Value::Nil
        };
        out.push((*comp, bound));
    }
    Ok(())
}

fn declared_keywords(params: &[MatchElement]) -> Vec<Symbol> {
    params
        .iter()
        .filter_map(|e| match e {
            MatchElement::KeywordParam { name, .. } => Some(*name),
            _ => None,
        })
        .collect()
}

fn has_param_default(e: &MatchElement) -> bool {
    matches!(
        e,
        MatchElement::Var { default: Some(_), .. }
            | MatchElement::Type { default: Some(_), .. }
            | MatchElement::Literal { default: Some(_), .. }
    )
}

fn positional_arity(params: &[MatchElement]) -> (usize, bool) {
    let mut required = 0usize;
    let mut variadic = false;
    for e in params {
        match e {
            MatchElement::KeywordParam { .. } | MatchElement::FailStop => {}
            MatchElement::Rest { .. } => variadic = true,
            e if has_param_default(e) => {}
            _ => required += 1,
        }
    }
    (required, variadic)
}

/// Invoke a user function (or macro/special body — the discipline of how the
/// arguments were collected is the caller's business).
///
/// The binder walks the parameter elements over the argument vector, binds
/// declared keywords from the named-parameter map, evaluates the body, and
/// restarts in place when the body yields a matching `recur` token, so tail
/// loops never grow the host stack.
pub fn call_function(
    f: &UserFn,
    args: Vec<Value>,
    named: IndexMap<Symbol, Value>,
) -> Result<Value, BraidError> {
    let base = f.env.borrow().clone().unwrap_or_else(Frame::global);
    let own_name = *f.name.borrow();
    let fname = f.display_name();

    // Supplying a keyword the function does not declare raises.
    let declared = declared_keywords(&f.params);
    for key in named.keys() {
        if !declared.contains(key) {
            return Err(BraidError::user_at(
                format!("{}: unknown named parameter -{}", fname, key),
                &f.info,
            ));
        }
    }

    let mut args = args;
    loop {
        check_stop()?;
        let frame = Frame::child(&base);
        frame.set_args(args.clone());
        frame.set_named(named.clone());

        let mut binds = Vec::new();
        match match_positional(&f.params, &args, &frame, false, &mut binds)? {
            MatchOutcome::Matched { .. } => {}
            _ => {
                let (required, variadic) = positional_arity(&f.params);
                let expected = if variadic {
                    format!("at least {}", required)
                } else {
                    required.to_string()
                };
                return Err(BraidError::user_at(
                    format!(
                        "{}: arguments ({}) do not match parameter list (expected {})",
                        fname,
                        args.iter()
                            .map(|a| a.to_string())
                            .collect::<Vec<_>>()
                            .join(" "),
                        expected
                    ),
                    &f.info,
                ));
            }
        }
        for (name, value) in binds {
            frame.set_local(name, value);
        }

        let mut result = Value::Nil;
        for form in f.body.iter() {
            result = eval(form, &frame)?;
            if result.is_flow() {
                break;
            }
        }

        match result {
            Value::Return(v) => return finish(f, (*v).clone(), &frame),
            Value::Recur(tok) => {
                if tok.target.is_none() || tok.target == own_name {
                    args = tok.args.clone();
                    continue;
                }
                // A recur aimed at an outer function bubbles unchanged.
                return Ok(Value::Recur(tok));
            }
            // break/continue/fail pass through the function boundary.
            other => return finish(f, other, &frame),
        }
    }
}

fn finish(f: &UserFn, value: Value, frame: &Rc<Frame>) -> Result<Value, BraidError> {
    if value.is_flow() {
        return Ok(value);
    }
    match &f.return_type {
        Some(ty) => types::convert(&value, ty, Some(frame.as_ref())),
        None => Ok(value),
    }
}

/// Expand a macro: bind the unevaluated argument forms and evaluate the body.
/// The returned value replaces the call form.
pub fn expand_macro(
    mac: &UserFn,
    arg_forms: &[Value],
    named: IndexMap<Symbol, Value>,
) -> Result<Value, BraidError> {
    call_function(mac, arg_forms.to_vec(), named)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(binds: &[(Symbol, Value)]) -> Vec<String> {
        binds.iter().map(|(s, _)| s.text().to_string()).collect()
    }

    #[test]
    fn test_destructure_plain_name() {
        let mut out = Vec::new();
        destructure(Symbol::intern("x"), &Value::Int(5), &mut out).unwrap();
        assert_eq!(names(&out), vec!["x"]);
        assert_eq!(out[0].1, Value::Int(5));
    }

    #[test]
    fn test_destructure_exact_count_binds_scalars() {
        let mut out = Vec::new();
        let subject = Value::vector(vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
        destructure(Symbol::intern("a:b:c"), &subject, &mut out).unwrap();
        assert_eq!(out[0].1, Value::Int(10));
        assert_eq!(out[1].1, Value::Int(20));
        assert_eq!(out[2].1, Value::Int(30));
    }

    #[test]
    fn test_destructure_surplus_binds_tail() {
        let mut out = Vec::new();
        let subject = Value::vector(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4),
        ]);
        destructure(Symbol::intern("x:xs"), &subject, &mut out).unwrap();
        assert_eq!(out[0].1, Value::Int(1));
        assert_eq!(
            out[1].1,
            Value::vector(vec![Value::Int(2), Value::Int(3), Value::Int(4)])
        );
    }

    #[test]
    fn test_destructure_shortfall_binds_empty_tail() {
        let mut out = Vec::new();
        let subject = Value::vector(vec![Value::Int(5)]);
        destructure(Symbol::intern("x:xs"), &subject, &mut out).unwrap();
        assert_eq!(out[0].1, Value::Int(5));
        assert_eq!(out[1].1, Value::vector(Vec::new()));
    }

    #[test]
    fn test_destructure_trailing_colon_binds_scalar() {
        let mut out = Vec::new();
        let subject = Value::vector(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        destructure(Symbol::intern("a:b:"), &subject, &mut out).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].1, Value::Int(1));
        assert_eq!(out[1].1, Value::Int(2));
    }

    #[test]
    fn test_destructure_scalar_subject_coerces_to_singleton() {
        let mut out = Vec::new();
        destructure(Symbol::intern("x:xs"), &Value::Int(9), &mut out).unwrap();
        assert_eq!(out[0].1, Value::Int(9));
        assert_eq!(out[1].1, Value::vector(Vec::new()));
    }
}
