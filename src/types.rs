// ABOUTME: Type literals, the conversion matrix, and user record types

use crate::env::Frame;
use crate::error::BraidError;
use crate::symbol::Symbol;
use crate::value::{RecordInstance, Value};
use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::{LazyLock, RwLock};

/// The host kinds a `^Type` literal can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Any,
    Nil,
    Bool,
    Int,
    BigInt,
    Float,
    Number,
    Char,
    Str,
    Symbol,
    Keyword,
    List,
    Vector,
    Slice,
    Dict,
    Set,
    Regex,
    Callable,
}

/// A `^Name` literal. Generic arguments are accepted by the reader and
/// discarded (Braid is dynamically typed); a trailing `?` marks the type
/// nullable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeLiteral {
    pub name: Symbol,
    pub nullable: bool,
}

impl TypeLiteral {
    pub fn named(name: &str) -> TypeLiteral {
        TypeLiteral {
            name: Symbol::intern(name),
            nullable: false,
        }
    }
}

impl fmt::Display for TypeLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "^{}{}", self.name, if self.nullable { "?" } else { "" })
    }
}

/// A user-defined record type created by `deftype`.
#[derive(Debug, Clone)]
pub struct RecordType {
    pub name: Symbol,
    pub fields: Vec<Symbol>,
}

// The record registry is process-wide, shared across evaluator threads.
static RECORD_REGISTRY: LazyLock<RwLock<HashMap<Symbol, RecordType>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

pub fn register_record(record: RecordType) {
    RECORD_REGISTRY
        .write()
        .expect("record registry poisoned")
        .insert(record.name, record);
}

pub fn lookup_record(name: Symbol) -> Option<RecordType> {
    RECORD_REGISTRY
        .read()
        .expect("record registry poisoned")
        .get(&name)
        .cloned()
}

/// Parse the text after `^`: base name, optional `[…]` generics (dropped),
/// optional `?` suffix.
pub fn parse_type_text(text: &str) -> TypeLiteral {
    let mut base = text;
    let nullable = base.ends_with('?');
    if nullable {
        base = &base[..base.len() - 1];
    }
    if let Some(open) = base.find('[') {
        base = &base[..open];
    }
    TypeLiteral {
        name: Symbol::intern(base),
        nullable,
    }
}

#[derive(Debug, Clone)]
pub enum Resolved {
    Builtin(TypeKind),
    Record(RecordType),
    Unknown,
}

fn builtin_kind(name: &str) -> Option<TypeKind> {
    Some(match name {
        "any" | "object" => TypeKind::Any,
        "nil" => TypeKind::Nil,
        "bool" | "boolean" => TypeKind::Bool,
        "int" | "long" => TypeKind::Int,
        "bigint" => TypeKind::BigInt,
        "float" | "double" => TypeKind::Float,
        "number" => TypeKind::Number,
        "char" => TypeKind::Char,
        "string" | "str" => TypeKind::Str,
        "symbol" => TypeKind::Symbol,
        "keyword" => TypeKind::Keyword,
        "list" | "cons" => TypeKind::List,
        "vector" => TypeKind::Vector,
        "slice" => TypeKind::Slice,
        "dict" | "hashtable" | "map" => TypeKind::Dict,
        "set" | "hashset" => TypeKind::Set,
        "regex" => TypeKind::Regex,
        "lambda" | "fn" | "callable" => TypeKind::Callable,
        _ => return None,
    })
}

/// Resolve a type literal against the local alias table, the builtin names,
/// and the record registry, in that order.
pub fn resolve(ty: &TypeLiteral, env: Option<&Frame>) -> Resolved {
    let mut current = *ty;
    for _ in 0..16 {
        if let Some(frame) = env {
            if let Some(aliased) = frame.alias_lookup(current.name) {
                if aliased.name != current.name {
                    current = aliased;
                    continue;
                }
            }
        }
        break;
    }
    if let Some(kind) = builtin_kind(&current.name.text()) {
        return Resolved::Builtin(kind);
    }
    if let Some(record) = lookup_record(current.name) {
        return Resolved::Record(record);
    }
    Resolved::Unknown
}

pub fn instance_of(v: &Value, ty: &TypeLiteral, env: Option<&Frame>) -> bool {
    if ty.nullable && matches!(v, Value::Nil) {
        return true;
    }
    match resolve(ty, env) {
        Resolved::Builtin(kind) => kind_matches(v, kind),
        Resolved::Record(record) => match v {
            Value::Record(r) => r.ty == record.name,
            _ => false,
        },
        Resolved::Unknown => false,
    }
}

fn kind_matches(v: &Value, kind: TypeKind) -> bool {
    match kind {
        TypeKind::Any => true,
        TypeKind::Nil => matches!(v, Value::Nil),
        TypeKind::Bool => matches!(v, Value::Bool(_)),
        TypeKind::Int => matches!(v, Value::Int(_)),
        TypeKind::BigInt => matches!(v, Value::BigInt(_)),
        TypeKind::Float => matches!(v, Value::Float(_)),
        TypeKind::Number => matches!(v, Value::Int(_) | Value::BigInt(_) | Value::Float(_)),
        TypeKind::Char => matches!(v, Value::Char(_)),
        TypeKind::Str => matches!(v, Value::Str(_) | Value::ExpandableStr(_)),
        TypeKind::Symbol => matches!(v, Value::Symbol(_)),
        TypeKind::Keyword => matches!(v, Value::Keyword(_)),
        TypeKind::List => matches!(v, Value::Cons(_) | Value::Nil),
        TypeKind::Vector => matches!(v, Value::Vector(_) | Value::VectorLit(_)),
        TypeKind::Slice => matches!(v, Value::Slice(_)),
        TypeKind::Dict => matches!(v, Value::Dict(_)),
        TypeKind::Set => matches!(v, Value::Set(_)),
        TypeKind::Regex => matches!(v, Value::Regex(_)),
        TypeKind::Callable => matches!(v, Value::Callable(_) | Value::FunctionLiteral(_)),
    }
}

/// Convert a value to the given type; conversion failure is a user error.
pub fn convert(v: &Value, ty: &TypeLiteral, env: Option<&Frame>) -> Result<Value, BraidError> {
    if ty.nullable && matches!(v, Value::Nil) {
        return Ok(Value::Nil);
    }
    let resolved = resolve(ty, env);
    match &resolved {
        Resolved::Builtin(kind) => {
            if kind_matches(v, *kind) {
                return Ok(v.clone());
            }
            convert_builtin(v, *kind)
                .ok_or_else(|| BraidError::user(format!("cannot convert {} to {}", v.type_name(), ty)))
        }
        Resolved::Record(record) => match v {
            Value::Record(r) if r.ty == record.name => Ok(v.clone()),
            _ => Err(BraidError::user(format!(
                "cannot convert {} to {}",
                v.type_name(),
                ty
            ))),
        },
        Resolved::Unknown => Err(BraidError::user(format!("unknown type {}", ty))),
    }
}

fn convert_builtin(v: &Value, kind: TypeKind) -> Option<Value> {
    match kind {
        TypeKind::Int => match v {
            Value::Float(f) if f.fract() == 0.0 => Some(Value::Int(*f as i64)),
            Value::BigInt(b) => b.to_i64().map(Value::Int),
            Value::Str(s) => s.trim().parse::<i64>().ok().map(Value::Int),
            Value::Char(c) => Some(Value::Int(*c as i64)),
            Value::Bool(b) => Some(Value::Int(i64::from(*b))),
            _ => None,
        },
        TypeKind::BigInt => match v {
            Value::Int(i) => Some(Value::BigInt(Rc::new(BigInt::from(*i)))),
            Value::Str(s) => s.trim().parse::<BigInt>().ok().map(|b| Value::BigInt(Rc::new(b))),
            _ => None,
        },
        TypeKind::Float => match v {
            Value::Int(i) => Some(Value::Float(*i as f64)),
            Value::BigInt(b) => b.to_f64().map(Value::Float),
            Value::Str(s) => s.trim().parse::<f64>().ok().map(Value::Float),
            _ => None,
        },
        TypeKind::Number => match v {
            Value::Str(s) => {
                let t = s.trim();
                t.parse::<i64>()
                    .ok()
                    .map(Value::Int)
                    .or_else(|| t.parse::<f64>().ok().map(Value::Float))
            }
            _ => None,
        },
        TypeKind::Str => Some(Value::str(&v.display_string())),
        TypeKind::Char => match v {
            Value::Str(s) if s.chars().count() == 1 => s.chars().next().map(Value::Char),
            Value::Int(i) => u32::try_from(*i).ok().and_then(char::from_u32).map(Value::Char),
            _ => None,
        },
        TypeKind::Symbol => match v {
            Value::Str(s) => Some(Value::sym(s)),
            Value::Keyword(k) => Some(Value::Symbol(*k)),
            _ => None,
        },
        TypeKind::Keyword => match v {
            Value::Str(s) => Some(Value::keyword(s.trim_start_matches(':'))),
            Value::Symbol(s) => Some(Value::Keyword(*s)),
            _ => None,
        },
        TypeKind::Bool => Some(Value::Bool(v.is_truthy())),
        TypeKind::List => v.seq_values().map(Value::list),
        TypeKind::Vector => v.seq_values().map(Value::vector),
        TypeKind::Regex => match v {
            Value::Str(s) => regex::Regex::new(s).ok().map(|r| Value::Regex(Rc::new(r))),
            _ => None,
        },
        _ => None,
    }
}

/// Construct a record instance from positional field values.
pub fn construct_record(
    record: &RecordType,
    args: &[Value],
) -> Result<Value, BraidError> {
    if args.len() != record.fields.len() {
        return Err(BraidError::arity_error(
            &record.name.text(),
            &record.fields.len().to_string(),
            args.len(),
        ));
    }
    let mut fields = IndexMap::new();
    for (name, value) in record.fields.iter().zip(args.iter()) {
        fields.insert(*name, value.clone());
    }
    Ok(Value::Record(Rc::new(RecordInstance {
        ty: record.name,
        fields: Rc::new(RefCell::new(fields)),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_text() {
        let ty = parse_type_text("int");
        assert_eq!(&*ty.name.text(), "int");
        assert!(!ty.nullable);

        let ty = parse_type_text("Vector[int]?");
        assert_eq!(&*ty.name.text(), "Vector");
        assert!(ty.nullable);
    }

    #[test]
    fn test_instance_of_builtin() {
        assert!(instance_of(&Value::Int(1), &TypeLiteral::named("int"), None));
        assert!(instance_of(&Value::Int(1), &TypeLiteral::named("number"), None));
        assert!(!instance_of(&Value::str("x"), &TypeLiteral::named("int"), None));
    }

    #[test]
    fn test_nullable_accepts_nil() {
        let ty = parse_type_text("int?");
        assert!(instance_of(&Value::Nil, &ty, None));
        assert_eq!(convert(&Value::Nil, &ty, None).unwrap(), Value::Nil);
    }

    #[test]
    fn test_convert_string_to_int() {
        let ty = TypeLiteral::named("int");
        assert_eq!(convert(&Value::str("42"), &ty, None).unwrap(), Value::Int(42));
        assert!(convert(&Value::str("nope"), &ty, None).is_err());
    }

    #[test]
    fn test_convert_to_string() {
        let ty = TypeLiteral::named("string");
        assert_eq!(convert(&Value::Int(7), &ty, None).unwrap(), Value::str("7"));
    }

    #[test]
    fn test_record_registry_and_construction() {
        let record = RecordType {
            name: Symbol::intern("PointT"),
            fields: vec![Symbol::intern("x"), Symbol::intern("y")],
        };
        register_record(record.clone());
        assert!(lookup_record(Symbol::intern("PointT")).is_some());

        let inst = construct_record(&record, &[Value::Int(1), Value::Int(2)]).unwrap();
        assert!(instance_of(&inst, &TypeLiteral::named("PointT"), None));
        assert!(!instance_of(&Value::Int(3), &TypeLiteral::named("PointT"), None));

        assert!(construct_record(&record, &[Value::Int(1)]).is_err());
    }
}
