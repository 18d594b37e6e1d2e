//! String manipulation and regex helpers

use crate::env::Frame;
use crate::error::{BraidError, ARITY_ONE, ARITY_TWO};
use crate::value::Value;
use std::rc::Rc;

fn str_arg<'a>(v: &'a Value, function: &str, position: usize) -> Result<&'a str, BraidError> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(BraidError::type_error(function, "string", other, position)),
    }
}

fn regex_arg<'a>(
    v: &'a Value,
    function: &str,
    position: usize,
) -> Result<&'a regex::Regex, BraidError> {
    match v {
        Value::Regex(r) => Ok(r),
        other => Err(BraidError::type_error(function, "regex", other, position)),
    }
}

/// (str …) — concatenated display forms of all arguments.
pub fn builtin_str(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&arg.display_string());
    }
    Ok(Value::str(&out))
}

/// (format template …) — replaces each `{}` with the next argument.
pub fn builtin_format(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.is_empty() {
        return Err(BraidError::arity_error("format", ARITY_ONE, 0));
    }
    let template = str_arg(&args[0], "format", 0)?;
    let mut out = String::new();
    let mut rest = template;
    let mut next = 1;
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.get(next) {
            Some(v) => out.push_str(&v.display_string()),
            None => out.push_str("{}"),
        }
        next += 1;
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    Ok(Value::str(&out))
}

pub fn builtin_split(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("split", ARITY_TWO, args.len()));
    }
    let text = str_arg(&args[0], "split", 0)?;
    let parts: Vec<Value> = match &args[1] {
        Value::Str(sep) => text.split(&**sep).map(Value::str).collect(),
        Value::Regex(re) => re.split(text).map(Value::str).collect(),
        Value::Char(c) => text.split(*c).map(Value::str).collect(),
        other => return Err(BraidError::type_error("split", "string or regex", other, 1)),
    };
    Ok(Value::vector(parts))
}

pub fn builtin_join(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("join", ARITY_TWO, args.len()));
    }
    let sep = str_arg(&args[1], "join", 1)?;
    let values = args[0]
        .seq_values()
        .ok_or_else(|| BraidError::type_error("join", "sequence", &args[0], 0))?;
    let joined = values
        .iter()
        .map(|v| v.display_string())
        .collect::<Vec<_>>()
        .join(sep);
    Ok(Value::str(&joined))
}

pub fn builtin_trim(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("trim", ARITY_ONE, args.len()));
    }
    Ok(Value::str(str_arg(&args[0], "trim", 0)?.trim()))
}

pub fn builtin_upper(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("upper", ARITY_ONE, args.len()));
    }
    Ok(Value::str(&str_arg(&args[0], "upper", 0)?.to_uppercase()))
}

pub fn builtin_lower(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("lower", ARITY_ONE, args.len()));
    }
    Ok(Value::str(&str_arg(&args[0], "lower", 0)?.to_lowercase()))
}

pub fn builtin_contains(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("contains?", ARITY_TWO, args.len()));
    }
    let text = str_arg(&args[0], "contains?", 0)?;
    let needle = str_arg(&args[1], "contains?", 1)?;
    Ok(Value::Bool(text.contains(needle)))
}

pub fn builtin_starts_with(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("starts-with?", ARITY_TWO, args.len()));
    }
    Ok(Value::Bool(
        str_arg(&args[0], "starts-with?", 0)?.starts_with(str_arg(&args[1], "starts-with?", 1)?),
    ))
}

pub fn builtin_ends_with(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("ends-with?", ARITY_TWO, args.len()));
    }
    Ok(Value::Bool(
        str_arg(&args[0], "ends-with?", 0)?.ends_with(str_arg(&args[1], "ends-with?", 1)?),
    ))
}

/// (index-of s needle) — byte offset of the first occurrence, or nil.
pub fn builtin_index_of(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("index-of", ARITY_TWO, args.len()));
    }
    let text = str_arg(&args[0], "index-of", 0)?;
    let needle = str_arg(&args[1], "index-of", 1)?;
    Ok(match text.find(needle) {
        Some(i) => Value::Int(i as i64),
        None => Value::Nil,
    })
}

pub fn builtin_replace(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 3 {
        return Err(BraidError::arity_error("replace", "3", args.len()));
    }
    let text = str_arg(&args[0], "replace", 0)?;
    let to = str_arg(&args[2], "replace", 2)?;
    match &args[1] {
        Value::Str(from) => Ok(Value::str(&text.replace(&**from, to))),
        Value::Regex(re) => Ok(Value::str(&re.replace_all(text, to))),
        other => Err(BraidError::type_error("replace", "string or regex", other, 1)),
    }
}

/// (substring s start len?) — character-indexed window.
pub fn builtin_substring(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() < 2 || args.len() > 3 {
        return Err(BraidError::arity_error("substring", "2-3", args.len()));
    }
    let text = str_arg(&args[0], "substring", 0)?;
    let start = match &args[1] {
        Value::Int(i) if *i >= 0 => *i as usize,
        other => return Err(BraidError::type_error("substring", "non-negative int", other, 1)),
    };
    let chars: Vec<char> = text.chars().collect();
    let len = match args.get(2) {
        Some(Value::Int(i)) if *i >= 0 => *i as usize,
        Some(other) => return Err(BraidError::type_error("substring", "non-negative int", other, 2)),
        None => chars.len().saturating_sub(start),
    };
    let out: String = chars.into_iter().skip(start).take(len).collect();
    Ok(Value::str(&out))
}

/// (re-match re s) — vector of match groups, or nil when no match.
pub fn builtin_re_match(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("re-match", ARITY_TWO, args.len()));
    }
    let re = regex_arg(&args[0], "re-match", 0)?;
    let text = str_arg(&args[1], "re-match", 1)?;
    Ok(match re.captures(text) {
        Some(caps) => Value::vector(
            caps.iter()
                .map(|g| g.map(|m| Value::str(m.as_str())).unwrap_or(Value::Nil))
                .collect(),
        ),
        None => Value::Nil,
    })
}

/// (re-replace re s replacement) — replace every match.
pub fn builtin_re_replace(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 3 {
        return Err(BraidError::arity_error("re-replace", "3", args.len()));
    }
    let re = regex_arg(&args[0], "re-replace", 0)?;
    let text = str_arg(&args[1], "re-replace", 1)?;
    let replacement = str_arg(&args[2], "re-replace", 2)?;
    Ok(Value::str(&re.replace_all(text, replacement)))
}

pub fn register(env: &Rc<Frame>) {
    super::define(env, "str", builtin_str);
    super::define(env, "format", builtin_format);
    super::define(env, "split", builtin_split);
    super::define(env, "join", builtin_join);
    super::define(env, "trim", builtin_trim);
    super::define(env, "upper", builtin_upper);
    super::define(env, "lower", builtin_lower);
    super::define(env, "contains?", builtin_contains);
    super::define(env, "starts-with?", builtin_starts_with);
    super::define(env, "ends-with?", builtin_ends_with);
    super::define(env, "index-of", builtin_index_of);
    super::define(env, "replace", builtin_replace);
    super::define(env, "substring", builtin_substring);
    super::define(env, "re-match", builtin_re_match);
    super::define(env, "re-replace", builtin_re_replace);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Frame;

    fn env() -> Rc<Frame> {
        Frame::global()
    }

    #[test]
    fn test_str_concat_uses_display_form() {
        let args = [Value::str("n="), Value::Int(3)];
        assert_eq!(builtin_str(&args, &env()).unwrap(), Value::str("n=3"));
    }

    #[test]
    fn test_format_placeholders() {
        let args = [Value::str("{} + {} = {}"), Value::Int(1), Value::Int(2), Value::Int(3)];
        assert_eq!(
            builtin_format(&args, &env()).unwrap(),
            Value::str("1 + 2 = 3")
        );
    }

    #[test]
    fn test_split_and_join_round_trip() {
        let parts = builtin_split(&[Value::str("a,b,c"), Value::str(",")], &env()).unwrap();
        assert_eq!(
            parts,
            Value::vector(vec![Value::str("a"), Value::str("b"), Value::str("c")])
        );
        let joined = builtin_join(&[parts, Value::str("-")], &env()).unwrap();
        assert_eq!(joined, Value::str("a-b-c"));
    }

    #[test]
    fn test_re_match_groups() {
        let re = Value::Regex(Rc::new(regex::Regex::new(r"(\d+)-(\d+)").unwrap()));
        let m = builtin_re_match(&[re.clone(), Value::str("10-20")], &env()).unwrap();
        assert_eq!(
            m,
            Value::vector(vec![
                Value::str("10-20"),
                Value::str("10"),
                Value::str("20")
            ])
        );
        assert_eq!(
            builtin_re_match(&[re, Value::str("none")], &env()).unwrap(),
            Value::Nil
        );
    }

    #[test]
    fn test_substring() {
        let args = [Value::str("hello"), Value::Int(1), Value::Int(3)];
        assert_eq!(builtin_substring(&args, &env()).unwrap(), Value::str("ell"));
    }
}
