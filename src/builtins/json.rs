//! JSON bridge: json-parse and json-stringify
//!
//! JSON objects map to ordered dictionaries with string keys, arrays to
//! vectors, null to nil. Numbers come back as exact integers when they fit.

use crate::env::Frame;
use crate::error::{BraidError, ARITY_ONE, ARITY_ONE_OR_TWO};
use crate::value::Value;
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::rc::Rc;

fn json_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::str(s),
        Json::Array(items) => Value::vector(items.iter().map(json_to_value).collect()),
        Json::Object(map) => {
            let mut out = IndexMap::new();
            for (k, v) in map {
                out.insert(Value::str(k), json_to_value(v));
            }
            Value::dict(out)
        }
    }
}

fn value_to_json(value: &Value) -> Result<Json, BraidError> {
    Ok(match value {
        Value::Nil => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::BigInt(b) => Json::String(b.to_string()),
        Value::Str(s) => Json::String(s.to_string()),
        Value::Char(c) => Json::String(c.to_string()),
        Value::Keyword(k) | Value::Symbol(k) => Json::String(k.text().to_string()),
        Value::Dict(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map.borrow().iter() {
                out.insert(k.display_string(), value_to_json(v)?);
            }
            Json::Object(out)
        }
        Value::Record(rec) => {
            let mut out = serde_json::Map::new();
            for (k, v) in rec.fields.borrow().iter() {
                out.insert(k.text().to_string(), value_to_json(v)?);
            }
            Json::Object(out)
        }
        other => match other.seq_values() {
            Some(items) => Json::Array(
                items
                    .iter()
                    .map(value_to_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => {
                return Err(BraidError::user(format!(
                    "json-stringify: cannot serialize a value of type {}",
                    other.type_name()
                )))
            }
        },
    })
}

/// (json-parse s) — parse JSON text into Braid values.
pub fn builtin_json_parse(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() != 1 {
        return Err(BraidError::arity_error("json-parse", ARITY_ONE, args.len()));
    }
    let text = match &args[0] {
        Value::Str(s) => s,
        other => return Err(BraidError::type_error("json-parse", "string", other, 0)),
    };
    let json: Json = serde_json::from_str(text)
        .map_err(|e| BraidError::user(format!("json-parse: {}", e)))?;
    Ok(json_to_value(&json))
}

/// (json-stringify v pretty?) — serialize a value as JSON text.
pub fn builtin_json_stringify(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.is_empty() || args.len() > 2 {
        return Err(BraidError::arity_error("json-stringify", ARITY_ONE_OR_TWO, args.len()));
    }
    let json = value_to_json(&args[0])?;
    let pretty = args.get(1).map(|v| v.is_truthy()).unwrap_or(false);
    let out = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    }
    .map_err(|e| BraidError::user(format!("json-stringify: {}", e)))?;
    Ok(Value::str(&out))
}

pub fn register(env: &Rc<Frame>) {
    super::define(env, "json-parse", builtin_json_parse);
    super::define(env, "json-stringify", builtin_json_stringify);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Frame;

    fn env() -> Rc<Frame> {
        Frame::global()
    }

    #[test]
    fn test_parse_object_preserves_order() {
        let v = builtin_json_parse(&[Value::str(r#"{"b": 1, "a": [true, null]}"#)], &env()).unwrap();
        match &v {
            Value::Dict(map) => {
                let keys: Vec<Value> = map.borrow().keys().cloned().collect();
                assert_eq!(keys, vec![Value::str("b"), Value::str("a")]);
            }
            other => panic!("expected dict, got {}", other),
        }
    }

    #[test]
    fn test_stringify_round_trip() {
        let original = Value::str(r#"{"n":42,"xs":[1,2.5,"x"],"ok":true,"missing":null}"#);
        let parsed = builtin_json_parse(&[original.clone()], &env()).unwrap();
        let back = builtin_json_stringify(&[parsed], &env()).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_stringify_rejects_functions() {
        let f = Value::Callable(Rc::new(crate::value::Callable::Builtin {
            name: "x",
            f: |_, _| Ok(Value::Nil),
        }));
        assert!(builtin_json_stringify(&[f], &env()).is_err());
    }
}
