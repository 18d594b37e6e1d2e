//! Type predicates and conversions

use crate::env::Frame;
use crate::error::{BraidError, ARITY_ONE, ARITY_TWO};
use crate::types::{self, TypeLiteral};
use crate::value::Value;
use std::rc::Rc;

/// (type-of x) — the type name as a string.
pub fn builtin_type_of(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("type-of", ARITY_ONE, args.len()));
    }
    Ok(Value::str(&args[0].type_name()))
}

/// (instance? x ^T) — type membership test, honoring local aliases.
pub fn builtin_instance(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 2 {
        return Err(BraidError::arity_error("instance?", ARITY_TWO, args.len()));
    }
    match &args[1] {
        Value::Type(ty) => Ok(Value::Bool(types::instance_of(&args[0], ty, Some(env.as_ref())))),
        other => Err(BraidError::type_error("instance?", "type literal", other, 1)),
    }
}

macro_rules! simple_predicate {
    ($fn_name:ident, $name:literal, $pattern:pat) => {
        pub fn $fn_name(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
            if args.len() != 1 {
                return Err(BraidError::arity_error($name, ARITY_ONE, args.len()));
            }
            Ok(Value::Bool(matches!(&args[0], $pattern)))
        }
    };
}

simple_predicate!(builtin_nil_p, "nil?", Value::Nil);
simple_predicate!(builtin_bool_p, "bool?", Value::Bool(_));
simple_predicate!(
    builtin_number_p,
    "number?",
    Value::Int(_) | Value::BigInt(_) | Value::Float(_)
);
simple_predicate!(builtin_int_p, "int?", Value::Int(_));
simple_predicate!(builtin_float_p, "float?", Value::Float(_));
simple_predicate!(builtin_bigint_p, "bigint?", Value::BigInt(_));
simple_predicate!(builtin_string_p, "string?", Value::Str(_));
simple_predicate!(builtin_char_p, "char?", Value::Char(_));
simple_predicate!(builtin_symbol_p, "symbol?", Value::Symbol(_));
simple_predicate!(builtin_keyword_p, "keyword?", Value::Keyword(_));
simple_predicate!(builtin_list_p, "list?", Value::Cons(_) | Value::Nil);
simple_predicate!(builtin_vector_p, "vector?", Value::Vector(_) | Value::Slice(_));
simple_predicate!(builtin_dict_p, "dict?", Value::Dict(_));
simple_predicate!(builtin_set_p, "set?", Value::Set(_));
simple_predicate!(builtin_regex_p, "regex?", Value::Regex(_));
simple_predicate!(
    builtin_fn_p,
    "fn?",
    Value::Callable(_) | Value::FunctionLiteral(_)
);

fn convert_to(name: &str, args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error(name, ARITY_ONE, args.len()));
    }
    types::convert(&args[0], &TypeLiteral::named(name), Some(env.as_ref()))
}

pub fn builtin_int(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    convert_to("int", args, env)
}

pub fn builtin_float(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    convert_to("float", args, env)
}

pub fn builtin_string(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    convert_to("string", args, env)
}

pub fn builtin_symbol(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    convert_to("symbol", args, env)
}

pub fn builtin_keyword(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    convert_to("keyword", args, env)
}

pub fn builtin_char(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    convert_to("char", args, env)
}

pub fn register(env: &Rc<Frame>) {
    super::define(env, "type-of", builtin_type_of);
    super::define(env, "instance?", builtin_instance);
    super::define(env, "nil?", builtin_nil_p);
    super::define(env, "bool?", builtin_bool_p);
    super::define(env, "number?", builtin_number_p);
    super::define(env, "int?", builtin_int_p);
    super::define(env, "float?", builtin_float_p);
    super::define(env, "bigint?", builtin_bigint_p);
    super::define(env, "string?", builtin_string_p);
    super::define(env, "char?", builtin_char_p);
    super::define(env, "symbol?", builtin_symbol_p);
    super::define(env, "keyword?", builtin_keyword_p);
    super::define(env, "list?", builtin_list_p);
    super::define(env, "vector?", builtin_vector_p);
    super::define(env, "dict?", builtin_dict_p);
    super::define(env, "set?", builtin_set_p);
    super::define(env, "regex?", builtin_regex_p);
    super::define(env, "fn?", builtin_fn_p);
    super::define(env, "int", builtin_int);
    super::define(env, "float", builtin_float);
    super::define(env, "string", builtin_string);
    super::define(env, "symbol", builtin_symbol);
    super::define(env, "keyword", builtin_keyword);
    super::define(env, "char", builtin_char);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Frame;

    fn env() -> Rc<Frame> {
        Frame::global()
    }

    #[test]
    fn test_type_of() {
        assert_eq!(
            builtin_type_of(&[Value::Int(1)], &env()).unwrap(),
            Value::str("int")
        );
        assert_eq!(
            builtin_type_of(&[Value::Nil], &env()).unwrap(),
            Value::str("nil")
        );
    }

    #[test]
    fn test_predicates() {
        assert_eq!(builtin_nil_p(&[Value::Nil], &env()).unwrap(), Value::Bool(true));
        assert_eq!(
            builtin_number_p(&[Value::Float(1.5)], &env()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            builtin_list_p(&[Value::list(vec![Value::Int(1)])], &env()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            builtin_list_p(&[Value::Int(1)], &env()).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_conversions() {
        assert_eq!(
            builtin_int(&[Value::str("42")], &env()).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            builtin_string(&[Value::Int(42)], &env()).unwrap(),
            Value::str("42")
        );
        assert!(builtin_int(&[Value::str("xyz")], &env()).is_err());
    }
}
