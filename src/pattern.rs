// ABOUTME: Pattern engine: clause compilation, match drivers, destructuring dispatch

use crate::binder::destructure;
use crate::env::Frame;
use crate::error::BraidError;
use crate::eval::{check_stop, eval};
use crate::symbol::{wk, Symbol};
use crate::types::{self, TypeLiteral};
use crate::value::{Callable, SliceBase, SliceValue, SourceInfo, UserFn, Value};
use indexmap::IndexMap;
use regex::Regex;
use std::cell::RefCell;
use std::rc::Rc;

/// One compiled element of a pattern or parameter list.
#[derive(Debug, Clone)]
pub enum MatchElement {
    /// `name` — binds one argument; compound names destructure.
    Var { name: Symbol, default: Option<Value> },
    /// `:name` — declared keyword parameter; consumes no positional argument.
    KeywordParam { name: Symbol, default: Option<Value> },
    /// `%x` or `(v %x)` — tests the subject against the current value of `x`.
    Pinned { name: Symbol, bind: Option<Symbol> },
    /// `^T` or `(^T var default?)` — matches when the subject converts to T.
    Type {
        ty: TypeLiteral,
        bind: Option<Symbol>,
        default: Option<Value>,
    },
    /// `#"…"` or `(#"…" var)` — matches a string subject, binds group vector.
    RegexMatch { re: Rc<Regex>, bind: Option<Symbol> },
    /// `{ :k pat … }` — subject must have each key, values match sub-patterns.
    Property { entries: Vec<(Value, Box<MatchElement>)> },
    /// `[pat…]` — subject is a sequence matched element-wise.
    VectorPat { elements: Vec<MatchElement> },
    /// `*f` or `(*f var)` — defer matching of the tail to another pattern fn.
    Star { func: Symbol, bind: Option<Symbol> },
    /// Any literal — matches by deep equality.
    Literal { value: Value, default: Option<Value> },
    /// `!` — stops backtracking; later mismatches become hard failures.
    FailStop,
    /// `_` — matches and consumes one element, binds nothing.
    Ignore,
    /// `&name` — binds the remaining arguments as a slice; must come last.
    Rest { name: Symbol },
}

impl MatchElement {
    fn default_expr(&self) -> Option<&Value> {
        match self {
            MatchElement::Var { default, .. }
            | MatchElement::Type { default, .. }
            | MatchElement::Literal { default, .. } => default.as_ref(),
            _ => None,
        }
    }

    /// Name this element binds on a default/missing argument.
    fn bound_name(&self) -> Option<Symbol> {
        match self {
            MatchElement::Var { name, .. } => Some(*name),
            MatchElement::Type { bind, .. } => *bind,
            _ => None,
        }
    }
}

/// One `| patterns :where cond -> actions` arm.
#[derive(Debug, Clone)]
pub struct Clause {
    pub elements: Vec<MatchElement>,
    pub where_cond: Option<Value>,
    pub actions: Vec<Value>,
    pub backtrack: bool,
}

/// A callable whose body is an ordered list of clauses tried in source order,
/// with optional begin (`^`), end (`$`) and default (empty-pattern) clauses.
#[derive(Debug, Clone)]
pub struct PatternFunction {
    pub name: RefCell<Option<Symbol>>,
    pub clauses: Rc<Vec<Clause>>,
    pub begin: Option<Rc<Vec<Value>>>,
    pub end: Option<Rc<Vec<Value>>>,
    pub default: Option<Rc<Clause>>,
    pub env: RefCell<Option<Rc<Frame>>>,
    pub info: SourceInfo,
}

impl PatternFunction {
    pub fn display_name(&self) -> String {
        self.name
            .borrow()
            .map(|s| s.text().to_string())
            .unwrap_or_else(|| "pattern".to_string())
    }

    pub fn captured(&self, env: &Rc<Frame>) -> PatternFunction {
        let mut copy = self.clone();
        copy.env = RefCell::new(Some(env.clone()));
        copy
    }
}

// ===== compilation =====

fn symbol_of(form: &Value, what: &str) -> Result<Symbol, BraidError> {
    match form {
        Value::Symbol(s) => Ok(*s),
        other => Err(BraidError::compile(format!(
            "{} must be a symbol, got {}",
            what,
            other.type_name()
        ))),
    }
}

/// Compile one pattern/parameter form into a match element.
pub fn compile_element(form: &Value) -> Result<MatchElement, BraidError> {
    match form {
        Value::Symbol(s) => {
            let text = s.text();
            if *s == wk().underscore {
                Ok(MatchElement::Ignore)
            } else if *s == wk().bang {
                Ok(MatchElement::FailStop)
            } else if s.is_rest() {
                Ok(MatchElement::Rest { name: s.base() })
            } else if text.starts_with('%') && text.len() > 1 {
                Ok(MatchElement::Pinned {
                    name: Symbol::intern(&text[1..]),
                    bind: None,
                })
            } else if text.starts_with('*') && text.len() > 1 {
                Ok(MatchElement::Star {
                    func: Symbol::intern(&text[1..]),
                    bind: None,
                })
            } else {
                Ok(MatchElement::Var {
                    name: *s,
                    default: None,
                })
            }
        }
        Value::Keyword(k) => Ok(MatchElement::KeywordParam {
            name: *k,
            default: None,
        }),
        Value::Type(ty) => Ok(MatchElement::Type {
            ty: *ty,
            bind: None,
            default: None,
        }),
        Value::Regex(re) => Ok(MatchElement::RegexMatch {
            re: re.clone(),
            bind: None,
        }),
        Value::VectorLit(items) => Ok(MatchElement::VectorPat {
            elements: items
                .iter()
                .map(compile_element)
                .collect::<Result<Vec<_>, _>>()?,
        }),
        Value::DictLit(items) => {
            let mut entries = Vec::new();
            let mut iter = items.iter().peekable();
            while let Some(key) = iter.next() {
                let sub = match iter.peek() {
                    Some(next) => {
                        let next = (*next).clone();
                        iter.next();
                        compile_element(&next)?
                    }
                    // An omitted sub-variable defaults to the key's name.
                    None => MatchElement::Var {
                        name: key_name(key)?,
                        default: None,
                    },
                };
                entries.push((key.clone(), Box::new(sub)));
            }
            Ok(MatchElement::Property { entries })
        }
        Value::Cons(_) => compile_grouped(form),
        literal => Ok(MatchElement::Literal {
            value: literal.clone(),
            default: None,
        }),
    }
}

fn key_name(key: &Value) -> Result<Symbol, BraidError> {
    match key {
        Value::Keyword(k) | Value::Symbol(k) => Ok(*k),
        Value::Str(s) => Ok(Symbol::intern(s)),
        other => Err(BraidError::compile(format!(
            "property pattern key must be a keyword, symbol or string, got {}",
            other.type_name()
        ))),
    }
}

/// Compile a parenthesized pattern group: `(^T var default)`, `(#"re" var)`,
/// `(*f var)`, `(v %pred)`, or `(pat default-expr)`.
fn compile_grouped(form: &Value) -> Result<MatchElement, BraidError> {
    let items = form.list_values().unwrap_or_default();
    if items.is_empty() {
        return Err(BraidError::compile("empty pattern group"));
    }
    match &items[0] {
        Value::Type(ty) => {
            let bind = match items.get(1) {
                Some(v) => Some(symbol_of(v, "type pattern binding")?),
                None => None,
            };
            Ok(MatchElement::Type {
                ty: *ty,
                bind,
                default: items.get(2).cloned(),
            })
        }
        Value::Regex(re) => {
            let bind = match items.get(1) {
                Some(v) => Some(symbol_of(v, "regex pattern binding")?),
                None => None,
            };
            Ok(MatchElement::RegexMatch {
                re: re.clone(),
                bind,
            })
        }
        Value::Symbol(s) if s.text().starts_with('*') && s.text().len() > 1 => {
            let bind = match items.get(1) {
                Some(v) => Some(symbol_of(v, "star pattern binding")?),
                None => None,
            };
            Ok(MatchElement::Star {
                func: Symbol::intern(&s.text()[1..]),
                bind,
            })
        }
        _ => {
            // `(v %pred)` pins, everything else is `(pat default-expr)`.
            if items.len() == 2 {
                if let Value::Symbol(p) = &items[1] {
                    let text = p.text();
                    if text.starts_with('%') && text.len() > 1 {
                        let bind = symbol_of(&items[0], "pinned pattern binding")?;
                        return Ok(MatchElement::Pinned {
                            name: Symbol::intern(&text[1..]),
                            bind: Some(bind),
                        });
                    }
                }
            }
            if items.len() != 2 {
                return Err(BraidError::compile(
                    "pattern group must be (pattern default-expr)",
                ));
            }
            let mut inner = compile_element(&items[0])?;
            let default = items[1].clone();
            match &mut inner {
                MatchElement::Var { default: d, .. }
                | MatchElement::Type { default: d, .. }
                | MatchElement::Literal { default: d, .. } => *d = Some(default),
                _ => {
                    return Err(BraidError::compile(
                        "only variable, type, and literal patterns take defaults",
                    ))
                }
            }
            Ok(inner)
        }
    }
}

/// Compile a parameter vector; validates that `&rest` is in trailing position.
pub fn compile_params(forms: &[Value]) -> Result<Vec<MatchElement>, BraidError> {
    let elements = forms
        .iter()
        .map(compile_element)
        .collect::<Result<Vec<_>, _>>()?;
    let mut seen_rest = false;
    for e in &elements {
        if seen_rest && !matches!(e, MatchElement::KeywordParam { .. }) {
            return Err(BraidError::compile(
                "&rest parameter must be the last positional parameter",
            ));
        }
        if matches!(e, MatchElement::Rest { .. }) {
            seen_rest = true;
        }
    }
    Ok(elements)
}

/// Compile a function body: `[params] ^return-type? form…`.
pub fn compile_function(
    name: Option<Symbol>,
    forms: &[Value],
    info: SourceInfo,
) -> Result<UserFn, BraidError> {
    let params_form = forms
        .first()
        .ok_or_else(|| BraidError::compile("function definition requires a parameter vector"))?;
    let param_items = match params_form {
        Value::VectorLit(items) => items.as_ref().clone(),
        Value::Nil => Vec::new(),
        other => {
            return Err(BraidError::compile(format!(
                "parameter list must be a vector, got {}",
                other.type_name()
            )))
        }
    };
    let params = compile_params(&param_items)?;
    let mut body_start = 1;
    let return_type = match forms.get(1) {
        Some(Value::Type(ty)) if forms.len() > 2 => {
            body_start = 2;
            Some(*ty)
        }
        _ => None,
    };
    Ok(UserFn {
        name: RefCell::new(name),
        params: Rc::new(params),
        return_type,
        body: Rc::new(forms[body_start..].to_vec()),
        env: RefCell::new(None),
        info,
    })
}

/// True when a definition body is written in clause form (`| pat -> …`).
pub fn has_clause_bars(forms: &[Value]) -> bool {
    matches!(forms.first(), Some(Value::Symbol(s)) if *s == wk().bar)
}

pub struct CompiledClauses {
    pub clauses: Vec<Clause>,
    pub begin: Option<Vec<Value>>,
    pub end: Option<Vec<Value>>,
    pub default: Option<Clause>,
}

/// Split `| pats :where cond -> actions | …` into compiled clauses.
pub fn compile_clauses(forms: &[Value]) -> Result<CompiledClauses, BraidError> {
    if !has_clause_bars(forms) {
        return Err(BraidError::compile("expected clause list starting with |"));
    }
    let mut chunks: Vec<Vec<Value>> = Vec::new();
    for form in forms {
        if matches!(form, Value::Symbol(s) if *s == wk().bar) {
            chunks.push(Vec::new());
        } else if let Some(chunk) = chunks.last_mut() {
            chunk.push(form.clone());
        }
    }

    let mut out = CompiledClauses {
        clauses: Vec::new(),
        begin: None,
        end: None,
        default: None,
    };
    for chunk in chunks {
        let arrow = chunk
            .iter()
            .position(|f| matches!(f, Value::Symbol(s) if *s == wk().arrow))
            .ok_or_else(|| BraidError::compile("pattern clause is missing ->"))?;
        let mut pats = chunk[..arrow].to_vec();
        let actions = chunk[arrow + 1..].to_vec();

        // `^` begin clause, `$` end clause, empty pattern = default clause.
        if pats.len() == 1 {
            if matches!(&pats[0], Value::Symbol(s) if *s == wk().begin_clause) {
                out.begin = Some(actions);
                continue;
            }
            if matches!(&pats[0], Value::Symbol(s) if *s == wk().end_clause) {
                out.end = Some(actions);
                continue;
            }
        }
        let mut where_cond = None;
        if pats.len() >= 2 {
            if matches!(&pats[pats.len() - 2], Value::Keyword(k) if *k == wk().where_) {
                where_cond = Some(pats[pats.len() - 1].clone());
                pats.truncate(pats.len() - 2);
            }
        }
        let elements = pats.iter().map(compile_element).collect::<Result<Vec<_>, _>>()?;
        let clause = Clause {
            elements,
            where_cond,
            actions,
            backtrack: true,
        };
        if clause.elements.is_empty() {
            out.default = Some(clause);
        } else {
            out.clauses.push(clause);
        }
    }
    Ok(out)
}

pub fn compile_pattern_function(
    name: Option<Symbol>,
    forms: &[Value],
    info: SourceInfo,
) -> Result<PatternFunction, BraidError> {
    let compiled = compile_clauses(forms)?;
    Ok(PatternFunction {
        name: RefCell::new(name),
        clauses: Rc::new(compiled.clauses),
        begin: compiled.begin.map(Rc::new),
        end: compiled.end.map(Rc::new),
        default: compiled.default.map(Rc::new),
        env: RefCell::new(None),
        info,
    })
}

// ===== match drivers =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched { consumed: usize },
    NoMatch,
    HardFail,
}

fn rest_slice(subject: &[Value], from: usize) -> Value {
    let remaining: Vec<Value> = subject[from.min(subject.len())..].to_vec();
    let len = remaining.len();
    Value::Slice(Rc::new(SliceValue {
        base: SliceBase::Vector(Rc::new(RefCell::new(remaining))),
        start: 0,
        len,
    }))
}

/// Drive a sequence of elements over a positional subject.
///
/// This is the clause matcher and the user-function binder's core walk.
/// With `allow_partial` (star-function mode) trailing subject elements are
/// permitted; otherwise unconsumed arguments fail the clause.
pub fn match_positional(
    elements: &[MatchElement],
    subject: &[Value],
    env: &Rc<Frame>,
    allow_partial: bool,
    binds: &mut Vec<(Symbol, Value)>,
) -> Result<MatchOutcome, BraidError> {
    let mut idx = 0usize;
    let mut hard = false;
    let mut rest_bound = false;

    for element in elements {
        match element {
            MatchElement::FailStop => {
                hard = true;
                continue;
            }
            MatchElement::KeywordParam { name, default } => {
                let value = match env.named(*name) {
                    Some(v) => v,
                    None => match default {
                        Some(expr) => eval(expr, env)?,
                        None => Value::Nil,
                    },
                };
                binds.push((*name, value));
                continue;
            }
            MatchElement::Rest { name } => {
                binds.push((*name, rest_slice(subject, idx)));
                idx = subject.len();
                rest_bound = true;
                continue;
            }
            _ => {}
        }

        if idx >= subject.len() {
            if let Some(expr) = element.default_expr() {
                let value = eval(expr, env)?;
                let value = match element {
                    MatchElement::Type { ty, .. } => types::convert(&value, ty, Some(env.as_ref()))?,
                    _ => value,
                };
                if let Some(name) = element.bound_name() {
                    binds.push((name, value));
                }
                continue;
            }
            return Ok(if hard { MatchOutcome::HardFail } else { MatchOutcome::NoMatch });
        }

        match match_element(element, subject, idx, binds, env)? {
            MatchOutcome::Matched { consumed } => idx += consumed,
            MatchOutcome::NoMatch => {
                return Ok(if hard { MatchOutcome::HardFail } else { MatchOutcome::NoMatch })
            }
            MatchOutcome::HardFail => return Ok(MatchOutcome::HardFail),
        }
    }

    if !rest_bound && !allow_partial && idx < subject.len() {
        return Ok(if hard { MatchOutcome::HardFail } else { MatchOutcome::NoMatch });
    }
    Ok(MatchOutcome::Matched { consumed: idx })
}

fn match_element(
    element: &MatchElement,
    subject: &[Value],
    idx: usize,
    binds: &mut Vec<(Symbol, Value)>,
    env: &Rc<Frame>,
) -> Result<MatchOutcome, BraidError> {
    let one = MatchOutcome::Matched { consumed: 1 };
    let arg = &subject[idx];
    match element {
        MatchElement::Ignore => Ok(one),
        MatchElement::Var { name, .. } => {
            destructure(*name, arg, binds)?;
            Ok(one)
        }
        MatchElement::Literal { value, .. } => {
            if value == arg {
                Ok(one)
            } else if let (Value::VectorLit(lit), Some(seq)) = (value, arg.seq_values()) {
                // A literal collection compares element-wise against any sequence.
                if lit.as_ref() == &seq {
                    Ok(one)
                } else {
                    Ok(MatchOutcome::NoMatch)
                }
            } else {
                Ok(MatchOutcome::NoMatch)
            }
        }
        MatchElement::Pinned { name, bind } => {
            let pinned = env
                .lookup(*name)
                .ok_or_else(|| BraidError::user(format!("pinned variable {} is unbound", name)))?;
            let ok = match &pinned {
                Value::Callable(_) | Value::FunctionLiteral(_) => {
                    crate::eval::apply(&pinned, vec![arg.clone()], IndexMap::new(), env)?.is_truthy()
                }
                Value::Regex(re) => match arg {
                    Value::Str(s) => re.is_match(s),
                    _ => false,
                },
                Value::Type(ty) => types::instance_of(arg, ty, Some(env.as_ref())),
                other => other == arg,
            };
            if ok {
                if let Some(b) = bind {
                    binds.push((*b, arg.clone()));
                }
                Ok(one)
            } else {
                Ok(MatchOutcome::NoMatch)
            }
        }
        MatchElement::Type { ty, bind, .. } => match types::convert(arg, ty, Some(env.as_ref())) {
            Ok(converted) => {
                if let Some(b) = bind {
                    binds.push((*b, converted));
                }
                Ok(one)
            }
            Err(_) => Ok(MatchOutcome::NoMatch),
        },
        MatchElement::RegexMatch { re, bind } => {
            let text = match arg {
                Value::Str(s) => s.to_string(),
                Value::Char(c) => c.to_string(),
                _ => return Ok(MatchOutcome::NoMatch),
            };
            match re.captures(&text) {
                Some(caps) => {
                    if let Some(b) = bind {
                        let groups: Vec<Value> = caps
                            .iter()
                            .map(|g| match g {
                                Some(m) => Value::str(m.as_str()),
                                None => Value::Nil,
                            })
                            .collect();
                        binds.push((*b, Value::vector(groups)));
                    }
                    Ok(one)
                }
                None => Ok(MatchOutcome::NoMatch),
            }
        }
        MatchElement::Property { entries } => {
            for (key, sub) in entries {
                let value = match arg {
                    Value::Dict(map) => map.borrow().get(key).cloned(),
                    Value::Record(rec) => {
                        let name = key_name(key)?;
                        rec.fields.borrow().get(&name).cloned()
                    }
                    _ => return Ok(MatchOutcome::NoMatch),
                };
                let Some(value) = value else {
                    return Ok(MatchOutcome::NoMatch);
                };
                match match_element(sub, &[value], 0, binds, env)? {
                    MatchOutcome::Matched { .. } => {}
                    other => return Ok(other),
                }
            }
            Ok(one)
        }
        MatchElement::VectorPat { elements } => {
            let Some(inner) = arg.seq_values() else {
                return Ok(MatchOutcome::NoMatch);
            };
            match match_positional(elements, &inner, env, false, binds)? {
                MatchOutcome::Matched { .. } => Ok(one),
                other => Ok(other),
            }
        }
        MatchElement::Star { func, bind } => {
            let target = env
                .lookup(*func)
                .ok_or_else(|| BraidError::user(format!("star pattern function {} is unbound", func)))?;
            let pf = match &target {
                Value::Callable(c) => match c.as_ref() {
                    Callable::Pattern(p) => p.clone(),
                    _ => {
                        return Err(BraidError::user(format!(
                            "star pattern {} is not a pattern function",
                            func
                        )))
                    }
                },
                _ => {
                    return Err(BraidError::user(format!(
                        "star pattern {} is not a pattern function",
                        func
                    )))
                }
            };
            match match_star(&pf, &subject[idx..], env)? {
                Some((value, consumed)) => {
                    binds.push((bind.unwrap_or(*func), value));
                    Ok(MatchOutcome::Matched { consumed })
                }
                None => Ok(MatchOutcome::NoMatch),
            }
        }
        // Handled by match_positional before reaching here.
        MatchElement::FailStop | MatchElement::Rest { .. } | MatchElement::KeywordParam { .. } => {
            Ok(MatchOutcome::Matched { consumed: 0 })
        }
    }
}

/// Run the actions of a matched clause with its bindings in a frame.
/// Returns None when the `:where` guard rejects the clause.
fn run_clause_actions(
    clause: &Clause,
    binds: Vec<(Symbol, Value)>,
    frame: &Rc<Frame>,
) -> Result<Option<Value>, BraidError> {
    for (name, value) in binds {
        frame.set_local(name, value);
    }
    if let Some(cond) = &clause.where_cond {
        if !eval(cond, frame)?.is_truthy() {
            return Ok(None);
        }
    }
    let mut result = Value::Nil;
    for action in &clause.actions {
        result = eval(action, frame)?;
        if result.is_flow() {
            break;
        }
    }
    Ok(Some(result))
}

/// Drive a pattern function as a callable: dispatch over the argument vector,
/// first matching clause wins, `recur` re-enters without growing the stack.
pub fn call_pattern(
    pf: &PatternFunction,
    args: Vec<Value>,
    named: IndexMap<Symbol, Value>,
    _caller: &Rc<Frame>,
) -> Result<Value, BraidError> {
    let base = pf
        .env
        .borrow()
        .clone()
        .unwrap_or_else(Frame::global);
    let frame = Frame::child(&base);
    frame.set_args(args.clone());
    frame.set_named(named);

    if let Some(begin) = &pf.begin {
        for form in begin.iter() {
            eval(form, &frame)?;
        }
    }

    let result = dispatch_clauses(pf, args, &frame);

    if let Some(end) = &pf.end {
        // End clause runs unconditionally, like finally.
        for form in end.iter() {
            eval(form, &frame)?;
        }
    }
    result
}

fn dispatch_clauses(
    pf: &PatternFunction,
    mut args: Vec<Value>,
    frame: &Rc<Frame>,
) -> Result<Value, BraidError> {
    let own_name = *pf.name.borrow();
    'dispatch: loop {
        check_stop()?;
        for clause in pf.clauses.iter() {
            check_stop()?;
            let cframe = Frame::child(frame);
            let mut binds = Vec::new();
            match match_positional(&clause.elements, &args, &cframe, false, &mut binds)? {
                MatchOutcome::NoMatch => continue,
                MatchOutcome::HardFail => {
                    return Err(BraidError::user_at(
                        format!("{}: match failed past a ! element", pf.display_name()),
                        &pf.info,
                    ))
                }
                MatchOutcome::Matched { .. } => {}
            }
            let Some(result) = run_clause_actions(clause, binds, &cframe)? else {
                continue;
            };
            match result {
                Value::Fail => {
                    if clause.backtrack {
                        continue;
                    }
                    return Ok(Value::Nil);
                }
                Value::Recur(tok) => {
                    let mine = tok.target.is_none() || tok.target == own_name;
                    if mine {
                        check_stop()?;
                        args = tok.args.clone();
                        continue 'dispatch;
                    }
                    return Ok(Value::Recur(tok));
                }
                Value::Return(v) => return Ok((*v).clone()),
                other => return Ok(other),
            }
        }
        // No positional clause matched; fall back to the default clause.
        if let Some(default) = &pf.default {
            let cframe = Frame::child(frame);
            let result = run_clause_actions(default, Vec::new(), &cframe)?.unwrap_or(Value::Nil);
            return match result {
                Value::Return(v) => Ok((*v).clone()),
                Value::Recur(tok) if tok.target.is_none() || tok.target == own_name => {
                    args = tok.args.clone();
                    continue 'dispatch;
                }
                other => Ok(other),
            };
        }
        return Err(BraidError::user_at(
            format!(
                "{}: no matching clause for ({})",
                pf.display_name(),
                args.iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
            &pf.info,
        ));
    }
}

/// Re-enter the engine for a `*f` element: clauses may consume a prefix of
/// the remaining subject; the matched value and consumed count come back so
/// the outer driver can advance its cursor.
pub fn match_star(
    pf: &PatternFunction,
    subject: &[Value],
    env: &Rc<Frame>,
) -> Result<Option<(Value, usize)>, BraidError> {
    let base = pf.env.borrow().clone().unwrap_or_else(|| env.clone());
    for clause in pf.clauses.iter() {
        check_stop()?;
        let cframe = Frame::child(&base);
        let mut binds = Vec::new();
        match match_positional(&clause.elements, subject, &cframe, true, &mut binds)? {
            MatchOutcome::NoMatch => continue,
            MatchOutcome::HardFail => break,
            MatchOutcome::Matched { consumed } => {
                let Some(result) = run_clause_actions(clause, binds, &cframe)? else {
                    continue;
                };
                match result {
                    Value::Fail => continue,
                    Value::Return(v) => return Ok(Some(((*v).clone(), consumed))),
                    other => return Ok(Some((other, consumed))),
                }
            }
        }
    }
    Ok(None)
}

/// Inline `match`/`matchp`: clauses run against one subject value, binding
/// into the caller's frame rather than a fresh child scope.
pub fn match_inline(
    subject: Value,
    clause_forms: &[Value],
    env: &Rc<Frame>,
) -> Result<Value, BraidError> {
    let compiled = compile_clauses(clause_forms)?;
    let subject_slice = [subject];
    for clause in &compiled.clauses {
        check_stop()?;
        let mut binds = Vec::new();
        match match_positional(&clause.elements, &subject_slice, env, false, &mut binds)? {
            MatchOutcome::NoMatch => continue,
            MatchOutcome::HardFail => break,
            MatchOutcome::Matched { .. } => {}
        }
        let Some(result) = run_clause_actions(clause, binds, env)? else {
            continue;
        };
        match result {
            Value::Fail => continue,
            other => return Ok(other),
        }
    }
    if let Some(default) = &compiled.default {
        return Ok(run_clause_actions(default, Vec::new(), env)?.unwrap_or(Value::Nil));
    }
    Ok(Value::Nil)
}
