// ABOUTME: The tagged value universe shared by the reader, evaluator and pattern engine

use crate::config::MAX_PRINT_DEPTH;
use crate::env::Frame;
use crate::error::BraidError;
use crate::pattern::{MatchElement, PatternFunction};
use crate::symbol::Symbol;
use crate::types::TypeLiteral;
use indexmap::{IndexMap, IndexSet};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use regex::Regex;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Source context attached to every cons cell and callable.
///
/// The reader populates it; the error printer and tracer consume it.
#[derive(Debug, Clone, Default)]
pub struct SourceInfo {
    pub file: Option<Rc<str>>,
    pub line: u32,
    pub offset: u32,
    pub text: Option<Rc<str>>,
    pub function: Option<Symbol>,
}

/// Precomputed classification of a cons cell's head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadKind {
    Other,
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplice,
    Splat,
    Lambda,
}

/// A (car, cdr) pair. Lists are cons chains terminated by Nil; a non-cons,
/// non-nil cdr makes a dotted pair.
#[derive(Debug)]
pub struct ConsCell {
    pub car: RefCell<Value>,
    pub cdr: RefCell<Value>,
    pub info: SourceInfo,
    pub head: HeadKind,
}

impl ConsCell {
    pub fn new(car: Value, cdr: Value, info: SourceInfo) -> Rc<ConsCell> {
        let head = match &car {
            Value::Symbol(s) => {
                let wk = crate::symbol::wk();
                if *s == wk.quote {
                    HeadKind::Quote
                } else if *s == wk.quasiquote {
                    HeadKind::Quasiquote
                } else if *s == wk.unquote {
                    HeadKind::Unquote
                } else if *s == wk.unquote_splice {
                    HeadKind::UnquoteSplice
                } else if *s == wk.splat {
                    HeadKind::Splat
                } else if *s == wk.lambda {
                    HeadKind::Lambda
                } else {
                    HeadKind::Other
                }
            }
            _ => HeadKind::Other,
        };
        Rc::new(ConsCell {
            car: RefCell::new(car),
            cdr: RefCell::new(cdr),
            info,
            head,
        })
    }
}

/// Read-only window over a vector or string.
#[derive(Debug, Clone)]
pub enum SliceBase {
    Vector(Rc<RefCell<Vec<Value>>>),
    Str(Rc<str>),
}

#[derive(Debug, Clone)]
pub struct SliceValue {
    pub base: SliceBase,
    pub start: usize,
    pub len: usize,
}

impl SliceValue {
    pub fn get(&self, index: usize) -> Option<Value> {
        if index >= self.len {
            return None;
        }
        match &self.base {
            SliceBase::Vector(v) => v.borrow().get(self.start + index).cloned(),
            SliceBase::Str(s) => s.chars().nth(self.start + index).map(Value::Char),
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        (0..self.len).filter_map(|i| self.get(i)).collect()
    }
}

/// Lazy arithmetic progression; `upper` is exclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeList {
    pub lower: i64,
    pub upper: i64,
    pub step: i64,
}

impl RangeList {
    pub fn values(&self) -> Vec<Value> {
        let mut out = Vec::new();
        if self.step == 0 {
            return out;
        }
        let mut v = self.lower;
        while (self.step > 0 && v < self.upper) || (self.step < 0 && v > self.upper) {
            out.push(Value::Int(v));
            v += self.step;
        }
        out
    }

    pub fn len(&self) -> usize {
        if self.step == 0 {
            return 0;
        }
        let span = (self.upper - self.lower) as f64 / self.step as f64;
        if span <= 0.0 {
            0
        } else {
            span.ceil() as usize
        }
    }
}

/// One piece of an interpolating string literal.
#[derive(Debug, Clone)]
pub enum StrSegment {
    Lit(Rc<str>),
    /// Parsed form from a `${…}` hole, evaluated at interpolation time.
    Expr(Value),
}

#[derive(Debug, Clone)]
pub struct ExpandableString {
    pub segments: Vec<StrSegment>,
    pub raw: Rc<str>,
}

/// Tail-call directive returned by `recur`; re-enters the dispatch loop of
/// the enclosing function. A token whose target names a different function
/// is bubbled upward unchanged.
#[derive(Debug, Clone)]
pub struct RecurToken {
    pub args: Vec<Value>,
    pub target: Option<Symbol>,
}

/// A user-defined record type instance created by a `deftype` constructor.
#[derive(Debug, Clone)]
pub struct RecordInstance {
    pub ty: Symbol,
    pub fields: Rc<RefCell<IndexMap<Symbol, Value>>>,
}

pub type BuiltinFn = fn(&[Value], &Rc<Frame>) -> Result<Value, BraidError>;

/// A compiled user function: `defn` body, `lambda`, `defmacro`, `defspecial`.
#[derive(Debug, Clone)]
pub struct UserFn {
    pub name: RefCell<Option<Symbol>>,
    pub params: Rc<Vec<MatchElement>>,
    pub return_type: Option<TypeLiteral>,
    pub body: Rc<Vec<Value>>,
    /// Captured lexical frame; None until the literal is evaluated.
    pub env: RefCell<Option<Rc<Frame>>>,
    pub info: SourceInfo,
}

impl UserFn {
    pub fn display_name(&self) -> String {
        self.name
            .borrow()
            .map(|s| s.text().to_string())
            .unwrap_or_else(|| "lambda".to_string())
    }

    /// A copy of this function closed over `env`.
    pub fn captured(&self, env: &Rc<Frame>) -> UserFn {
        let mut copy = self.clone();
        copy.env = RefCell::new(Some(env.clone()));
        copy
    }
}

/// Anything that can be invoked with a positional vector and a keyword map.
#[derive(Debug, Clone)]
pub enum Callable {
    Builtin { name: &'static str, f: BuiltinFn },
    Function(UserFn),
    Special(UserFn),
    Macro(UserFn),
    Pattern(PatternFunction),
}

impl Callable {
    pub fn name(&self) -> String {
        match self {
            Callable::Builtin { name, .. } => (*name).to_string(),
            Callable::Function(f) | Callable::Special(f) | Callable::Macro(f) => f.display_name(),
            Callable::Pattern(p) => p.display_name(),
        }
    }
}

/// The runtime value universe.
///
/// Heap kinds are reference-counted; mutable collections carry interior
/// mutability and no internal synchronisation (two threads mutating the
/// same collection is a program error, per the concurrency contract).
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    BigInt(Rc<BigInt>),
    Float(f64),
    Char(char),
    Str(Rc<str>),
    Symbol(Symbol),
    Keyword(Symbol),
    Cons(Rc<ConsCell>),
    Vector(Rc<RefCell<Vec<Value>>>),
    Slice(Rc<SliceValue>),
    Dict(Rc<RefCell<IndexMap<Value, Value>>>),
    Set(Rc<RefCell<IndexSet<Value>>>),
    Regex(Rc<Regex>),
    Type(TypeLiteral),
    Record(Rc<RecordInstance>),
    Callable(Rc<Callable>),
    /// Unevaluated wrapper around a callable; preserves identity when a
    /// function value flows through evaluation again.
    FunctionLiteral(Rc<Callable>),
    Range(Rc<RangeList>),
    // Self-evaluating constructs produced by the reader. Evaluating one
    // evaluates its elements and builds the corresponding collection.
    VectorLit(Rc<Vec<Value>>),
    DictLit(Rc<Vec<Value>>),
    SetLit(Rc<Vec<Value>>),
    ExpandableStr(Rc<ExpandableString>),
    // Flow-control tokens: produced only by their special forms, filtered at
    // function/loop/pattern boundaries, never stored in user collections.
    Return(Rc<Value>),
    Break(Option<Rc<Value>>),
    Continue,
    Recur(Rc<RecurToken>),
    Fail,
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn sym(s: &str) -> Value {
        Value::Symbol(Symbol::intern(s))
    }

    pub fn keyword(s: &str) -> Value {
        Value::Keyword(Symbol::intern(s))
    }

    pub fn vector(items: Vec<Value>) -> Value {
        Value::Vector(Rc::new(RefCell::new(items)))
    }

    pub fn dict(map: IndexMap<Value, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(map)))
    }

    pub fn cons(car: Value, cdr: Value, info: SourceInfo) -> Value {
        Value::Cons(ConsCell::new(car, cdr, info))
    }

    /// Build a proper list (cons chain ending in Nil).
    pub fn list(items: Vec<Value>) -> Value {
        Self::list_with_info(items, SourceInfo::default())
    }

    pub fn list_with_info(items: Vec<Value>, info: SourceInfo) -> Value {
        let mut tail = Value::Nil;
        for item in items.into_iter().rev() {
            tail = Value::cons(item, tail, info.clone());
        }
        tail
    }

    /// Elements of a cons chain. A dotted tail is appended as a final
    /// element. Returns None for non-lists (but Some(vec![]) for Nil).
    pub fn list_values(&self) -> Option<Vec<Value>> {
        match self {
            Value::Nil => Some(Vec::new()),
            Value::Cons(_) => {
                let mut out = Vec::new();
                let mut cur = self.clone();
                loop {
                    match cur {
                        Value::Cons(cell) => {
                            out.push(cell.car.borrow().clone());
                            let next = cell.cdr.borrow().clone();
                            cur = next;
                        }
                        Value::Nil => break,
                        other => {
                            out.push(other);
                            break;
                        }
                    }
                }
                Some(out)
            }
            _ => None,
        }
    }

    /// Elements of any sequence-like value: lists, vectors, slices, ranges,
    /// strings (chars), sets, dictionaries ([key value] pairs). Nil is the
    /// empty sequence.
    pub fn seq_values(&self) -> Option<Vec<Value>> {
        match self {
            Value::Nil | Value::Cons(_) => self.list_values(),
            Value::Vector(v) => Some(v.borrow().clone()),
            Value::VectorLit(v) => Some(v.as_ref().clone()),
            Value::Slice(s) => Some(s.to_vec()),
            Value::Range(r) => Some(r.values()),
            Value::Str(s) => Some(s.chars().map(Value::Char).collect()),
            Value::Set(s) => Some(s.borrow().iter().cloned().collect()),
            Value::Dict(d) => Some(
                d.borrow()
                    .iter()
                    .map(|(k, v)| Value::vector(vec![k.clone(), v.clone()]))
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_flow(&self) -> bool {
        matches!(
            self,
            Value::Return(_) | Value::Break(_) | Value::Continue | Value::Recur(_) | Value::Fail
        )
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::Cons(_) => "list",
            Value::Vector(_) | Value::VectorLit(_) => "vector",
            Value::Slice(_) => "slice",
            Value::Dict(_) | Value::DictLit(_) => "dict",
            Value::Set(_) | Value::SetLit(_) => "set",
            Value::Regex(_) => "regex",
            Value::Type(_) => "type",
            Value::Record(r) => return r.ty.text().to_string(),
            Value::Callable(_) | Value::FunctionLiteral(_) => "lambda",
            Value::Range(_) => "range",
            Value::ExpandableStr(_) => "string",
            Value::Return(_) => "return-token",
            Value::Break(_) => "break-token",
            Value::Continue => "continue-token",
            Value::Recur(_) => "recur-token",
            Value::Fail => "fail-token",
        }
        .to_string()
    }

    /// Source info when this value is a cons, else a default.
    pub fn info(&self) -> SourceInfo {
        match self {
            Value::Cons(cell) => cell.info.clone(),
            _ => SourceInfo::default(),
        }
    }

    /// Printable form with raw (unquoted) strings and characters, used by
    /// `print`/`str` and string interpolation.
    pub fn display_string(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Char(c) => c.to_string(),
            _ => self.to_string(),
        }
    }
}

// ===== numeric helpers =====

fn num_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::BigInt(b) => b.to_f64(),
        _ => None,
    }
}

fn numeric_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::BigInt(x), Value::BigInt(y)) => x == y,
        (Value::Int(x), Value::BigInt(y)) | (Value::BigInt(y), Value::Int(x)) => {
            **y == BigInt::from(*x)
        }
        _ => match (num_as_f64(a), num_as_f64(b)) {
            (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
            _ => false,
        },
    }
}

fn is_numeric(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::BigInt(_) | Value::Float(_))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if is_numeric(self) && is_numeric(other) {
            return numeric_eq(self, other);
        }
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Cons(a), Value::Cons(b)) => {
                *a.car.borrow() == *b.car.borrow() && *a.cdr.borrow() == *b.cdr.borrow()
            }
            (Value::Vector(a), Value::Vector(b)) => *a.borrow() == *b.borrow(),
            (Value::VectorLit(a), Value::VectorLit(b)) => a == b,
            (Value::Vector(a), Value::VectorLit(b)) | (Value::VectorLit(b), Value::Vector(a)) => {
                *a.borrow() == **b
            }
            (Value::DictLit(a), Value::DictLit(b)) => a == b,
            (Value::SetLit(a), Value::SetLit(b)) => a == b,
            (Value::Slice(a), Value::Slice(b)) => a.to_vec() == b.to_vec(),
            (Value::Slice(a), Value::Vector(b)) | (Value::Vector(b), Value::Slice(a)) => {
                a.to_vec() == *b.borrow()
            }
            (Value::Dict(a), Value::Dict(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|v| b.contains(v))
            }
            (Value::Regex(a), Value::Regex(b)) => a.as_str() == b.as_str(),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => {
                a.ty == b.ty && {
                    let (fa, fb) = (a.fields.borrow(), b.fields.borrow());
                    fa.len() == fb.len() && fa.iter().all(|(k, v)| fb.get(k) == Some(v))
                }
            }
            (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
            (Value::FunctionLiteral(a), Value::FunctionLiteral(b)) => Rc::ptr_eq(a, b),
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::ExpandableStr(a), Value::ExpandableStr(b)) => a.raw == b.raw,
            (Value::Continue, Value::Continue) => true,
            (Value::Fail, Value::Fail) => true,
            _ => false,
        }
    }
}

// NaN compares equal to itself above, which keeps equality reflexive so
// values can key dictionaries and sets.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Nil => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            // All numbers hash through a common scheme consistent with
            // cross-kind numeric equality.
            Value::Int(_) | Value::BigInt(_) | Value::Float(_) => {
                2u8.hash(state);
                match self {
                    Value::Int(i) => i.hash(state),
                    Value::BigInt(b) => match b.to_i64() {
                        Some(i) => i.hash(state),
                        None => b.hash(state),
                    },
                    Value::Float(f) => {
                        if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                            (*f as i64).hash(state)
                        } else {
                            f.to_bits().hash(state)
                        }
                    }
                    _ => unreachable!(),
                }
            }
            Value::Char(c) => {
                3u8.hash(state);
                c.hash(state);
            }
            Value::Str(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::Symbol(s) => {
                5u8.hash(state);
                s.hash(state);
            }
            Value::Keyword(k) => {
                6u8.hash(state);
                k.hash(state);
            }
            Value::Cons(cell) => {
                7u8.hash(state);
                cell.car.borrow().hash(state);
                cell.cdr.borrow().hash(state);
            }
            Value::Vector(v) => {
                8u8.hash(state);
                for item in v.borrow().iter() {
                    item.hash(state);
                }
            }
            Value::VectorLit(v) => {
                8u8.hash(state);
                for item in v.iter() {
                    item.hash(state);
                }
            }
            Value::Slice(s) => {
                8u8.hash(state);
                for item in s.to_vec() {
                    item.hash(state);
                }
            }
            Value::Dict(d) => {
                9u8.hash(state);
                d.borrow().len().hash(state);
            }
            Value::Set(s) => {
                10u8.hash(state);
                s.borrow().len().hash(state);
            }
            Value::Regex(r) => {
                11u8.hash(state);
                r.as_str().hash(state);
            }
            Value::Type(t) => {
                12u8.hash(state);
                t.name.hash(state);
            }
            Value::Record(r) => {
                13u8.hash(state);
                r.ty.hash(state);
            }
            Value::Callable(c) => {
                14u8.hash(state);
                (Rc::as_ptr(c) as usize).hash(state);
            }
            Value::FunctionLiteral(c) => {
                15u8.hash(state);
                (Rc::as_ptr(c) as usize).hash(state);
            }
            Value::Range(r) => {
                16u8.hash(state);
                r.lower.hash(state);
                r.upper.hash(state);
                r.step.hash(state);
            }
            Value::DictLit(v) | Value::SetLit(v) => {
                17u8.hash(state);
                v.len().hash(state);
            }
            Value::ExpandableStr(s) => {
                18u8.hash(state);
                s.raw.hash(state);
            }
            Value::Return(_) | Value::Break(_) | Value::Continue | Value::Recur(_) | Value::Fail => {
                19u8.hash(state)
            }
        }
    }
}

// ===== printing =====

fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn fmt_char(c: char, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match c {
        ' ' => write!(f, "\\space"),
        '\n' => write!(f, "\\newline"),
        '\t' => write!(f, "\\tab"),
        '\r' => write!(f, "\\return"),
        '\u{1b}' => write!(f, "\\esc"),
        c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32),
        c => write!(f, "\\{}", c),
    }
}

fn fmt_seq(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    close: &str,
    items: &[Value],
    depth: usize,
) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        fmt_value(item, f, depth + 1)?;
    }
    write!(f, "{}", close)
}

fn fmt_value(v: &Value, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    if depth > MAX_PRINT_DEPTH {
        return write!(f, "...");
    }
    match v {
        Value::Nil => write!(f, "()"),
        Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
        Value::Int(i) => write!(f, "{}", i),
        Value::BigInt(b) => write!(f, "{}i", b),
        Value::Float(n) => {
            if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                write!(f, "{:.1}", n)
            } else {
                write!(f, "{}", n)
            }
        }
        Value::Char(c) => fmt_char(*c, f),
        Value::Str(s) => write!(f, "\"{}\"", escape_str(s)),
        Value::Symbol(s) => write!(f, "{}", s),
        Value::Keyword(k) => write!(f, ":{}", k),
        Value::Cons(_) => {
            write!(f, "(")?;
            let mut first = true;
            let mut cur = v.clone();
            let mut steps = 0usize;
            loop {
                if steps > 10_000 {
                    write!(f, " ...")?;
                    break;
                }
                steps += 1;
                match cur {
                    Value::Cons(ref c) => {
                        if !first {
                            write!(f, " ")?;
                        }
                        first = false;
                        fmt_value(&c.car.borrow(), f, depth + 1)?;
                        let next = c.cdr.borrow().clone();
                        cur = next;
                    }
                    Value::Nil => break,
                    ref tail => {
                        write!(f, " . ")?;
                        fmt_value(tail, f, depth + 1)?;
                        break;
                    }
                }
            }
            write!(f, ")")
        }
        Value::Vector(items) => fmt_seq(f, "[", "]", &items.borrow(), depth),
        Value::VectorLit(items) => fmt_seq(f, "[", "]", items, depth),
        Value::Slice(s) => fmt_seq(f, "[", "]", &s.to_vec(), depth),
        Value::Dict(map) => {
            write!(f, "{{")?;
            for (i, (k, val)) in map.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                fmt_value(k, f, depth + 1)?;
                write!(f, " ")?;
                fmt_value(val, f, depth + 1)?;
            }
            write!(f, "}}")
        }
        Value::DictLit(items) => fmt_seq(f, "{", "}", items, depth),
        Value::Set(items) => {
            let vec: Vec<Value> = items.borrow().iter().cloned().collect();
            fmt_seq(f, "#{", "}", &vec, depth)
        }
        Value::SetLit(items) => fmt_seq(f, "#{", "}", items, depth),
        Value::Regex(r) => write!(f, "#\"{}\"", r.as_str()),
        Value::Type(t) => write!(f, "{}", t),
        Value::Record(r) => {
            write!(f, "#{}{{", r.ty)?;
            for (i, (k, val)) in r.fields.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, ":{} ", k)?;
                fmt_value(val, f, depth + 1)?;
            }
            write!(f, "}}")
        }
        Value::Callable(c) => match c.as_ref() {
            Callable::Builtin { name, .. } => write!(f, "#<builtin {}>", name),
            Callable::Function(u) => write!(f, "#<fn {}>", u.display_name()),
            Callable::Special(u) => write!(f, "#<special {}>", u.display_name()),
            Callable::Macro(u) => write!(f, "#<macro {}>", u.display_name()),
            Callable::Pattern(p) => write!(f, "#<pattern-fn {}>", p.display_name()),
        },
        Value::FunctionLiteral(c) => write!(f, "#<fn-literal {}>", c.name()),
        Value::Range(r) => write!(f, "#<range {} {} {}>", r.lower, r.upper, r.step),
        Value::ExpandableStr(s) => write!(f, "\"{}\"", escape_str(&s.raw)),
        Value::Return(v) => write!(f, "#<return {}>", v),
        Value::Break(Some(v)) => write!(f, "#<break {}>", v),
        Value::Break(None) => write!(f, "#<break>"),
        Value::Continue => write!(f, "#<continue>"),
        Value::Recur(_) => write!(f, "#<recur>"),
        Value::Fail => write!(f, "#<fail>"),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(self, f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_display() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(list.to_string(), "(1 2 3)");
        assert_eq!(Value::Nil.to_string(), "()");
    }

    #[test]
    fn test_dotted_pair_display() {
        let pair = Value::cons(Value::sym("a"), Value::sym("b"), SourceInfo::default());
        assert_eq!(pair.to_string(), "(a . b)");
    }

    #[test]
    fn test_vector_and_dict_display() {
        let vec = Value::vector(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(vec.to_string(), "[1 2]");

        let mut map = IndexMap::new();
        map.insert(Value::keyword("a"), Value::Int(1));
        map.insert(Value::keyword("b"), Value::Int(2));
        assert_eq!(Value::dict(map).to_string(), "{:a 1 :b 2}");
    }

    #[test]
    fn test_char_display() {
        assert_eq!(Value::Char('a').to_string(), "\\a");
        assert_eq!(Value::Char(' ').to_string(), "\\space");
        assert_eq!(Value::Char('\n').to_string(), "\\newline");
    }

    #[test]
    fn test_float_display_keeps_point() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(-2.5).to_string(), "-2.5");
        assert_eq!(Value::Int(2).to_string(), "2");
    }

    #[test]
    fn test_numeric_cross_kind_equality() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_eq!(Value::Int(7), Value::BigInt(Rc::new(BigInt::from(7))));
        assert_ne!(Value::Int(2), Value::Float(2.5));
    }

    #[test]
    fn test_list_values_walks_chain() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let items = list.list_values().unwrap();
        assert_eq!(items, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(Value::Nil.list_values().unwrap().len(), 0);
        assert!(Value::Int(1).list_values().is_none());
    }

    #[test]
    fn test_seq_values_over_string_and_range() {
        let chars = Value::str("ab").seq_values().unwrap();
        assert_eq!(chars, vec![Value::Char('a'), Value::Char('b')]);

        let range = Value::Range(Rc::new(RangeList {
            lower: 0,
            upper: 3,
            step: 1,
        }));
        assert_eq!(
            range.seq_values().unwrap(),
            vec![Value::Int(0), Value::Int(1), Value::Int(2)]
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::str("").is_truthy());
    }

    #[test]
    fn test_slice_window() {
        let backing = Rc::new(RefCell::new(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4),
        ]));
        let slice = SliceValue {
            base: SliceBase::Vector(backing),
            start: 1,
            len: 2,
        };
        assert_eq!(slice.get(0), Some(Value::Int(2)));
        assert_eq!(slice.get(1), Some(Value::Int(3)));
        assert_eq!(slice.get(2), None);
        assert_eq!(slice.to_vec(), vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_head_kind_precomputed() {
        let quoted = Value::cons(
            Value::sym("quote"),
            Value::cons(Value::sym("x"), Value::Nil, SourceInfo::default()),
            SourceInfo::default(),
        );
        match quoted {
            Value::Cons(cell) => assert_eq!(cell.head, HeadKind::Quote),
            _ => unreachable!(),
        }
    }
}
