// ABOUTME: Tree-walking evaluator: dispatch, special forms, argument collection

use crate::binder;
use crate::config::{MAX_EVAL_DEPTH, TRACE_WIDTH};
use crate::env::Frame;
use crate::error::BraidError;
use crate::pattern;
use crate::quasiquote;
use crate::symbol::{wk, Symbol};
use crate::types::{self, TypeLiteral};
use crate::value::{Callable, ConsCell, HeadKind, RecurToken, SourceInfo, StrSegment, Value};
use indexmap::{IndexMap, IndexSet};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

// ===== cancellation =====

// One process-wide stop flag; cancellation is cooperative and global.
static STOP: AtomicBool = AtomicBool::new(false);

/// Request that all active evaluations stop at their next checkpoint.
pub fn stop() {
    STOP.store(true, Ordering::SeqCst);
}

pub fn clear_stop() {
    STOP.store(false, Ordering::SeqCst);
}

/// Checkpoint: polled at dispatch, between sequence elements, between
/// pattern clauses, and before each recur restart.
pub fn check_stop() -> Result<(), BraidError> {
    if STOP.load(Ordering::Relaxed) {
        Err(BraidError::Stop)
    } else {
        Ok(())
    }
}

// ===== per-thread evaluator state =====

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static TRACE: Cell<bool> = const { Cell::new(false) };
}

pub fn trace_enabled() -> bool {
    TRACE.with(|t| t.get())
}

pub fn set_trace(on: bool) -> bool {
    TRACE.with(|t| t.replace(on))
}

struct DepthGuard;

impl DepthGuard {
    fn enter(info: &SourceInfo) -> Result<DepthGuard, BraidError> {
        let depth = DEPTH.with(|d| {
            let v = d.get() + 1;
            d.set(v);
            v
        });
        if depth > MAX_EVAL_DEPTH {
            DEPTH.with(|d| d.set(d.get() - 1));
            return Err(BraidError::user_at(
                format!("evaluation too deep ({} levels); runaway recursion?", MAX_EVAL_DEPTH),
                info,
            ));
        }
        Ok(DepthGuard)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

fn truncated(text: String) -> String {
    if text.chars().count() > TRACE_WIDTH {
        let cut: String = text.chars().take(TRACE_WIDTH).collect();
        format!("{}...", cut)
    } else {
        text
    }
}

// ===== entry points =====

/// Evaluate one form in the given environment.
pub fn eval(expr: &Value, env: &Rc<Frame>) -> Result<Value, BraidError> {
    match expr {
        // Self-evaluating atoms.
        Value::Nil
        | Value::Bool(_)
        | Value::Int(_)
        | Value::BigInt(_)
        | Value::Float(_)
        | Value::Char(_)
        | Value::Str(_)
        | Value::Keyword(_)
        | Value::Regex(_)
        | Value::Type(_)
        | Value::Record(_)
        | Value::Vector(_)
        | Value::Slice(_)
        | Value::Dict(_)
        | Value::Set(_)
        | Value::Range(_)
        | Value::Callable(_) => Ok(expr.clone()),

        // Flow tokens are already evaluator results.
        Value::Return(_) | Value::Break(_) | Value::Continue | Value::Recur(_) | Value::Fail => {
            Ok(expr.clone())
        }

        // A function literal captures the frame active where it is evaluated.
        Value::FunctionLiteral(c) => Ok(capture_callable(c, env)),

        // Reader literals build fresh collections from evaluated elements.
        Value::VectorLit(items) => Ok(Value::vector(eval_elements(items, env)?)),
        Value::SetLit(items) => {
            let mut set = IndexSet::new();
            for v in eval_elements(items, env)? {
                set.insert(v);
            }
            Ok(Value::Set(Rc::new(std::cell::RefCell::new(set))))
        }
        Value::DictLit(items) => {
            let flat = eval_elements(items, env)?;
            if flat.len() % 2 != 0 {
                return Err(BraidError::user(
                    "dictionary literal requires an even number of elements",
                ));
            }
            let mut map = IndexMap::new();
            let mut iter = flat.into_iter();
            while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                map.insert(k, v);
            }
            Ok(Value::dict(map))
        }
        Value::ExpandableStr(s) => {
            let mut out = String::new();
            for seg in &s.segments {
                match seg {
                    StrSegment::Lit(text) => out.push_str(text),
                    StrSegment::Expr(form) => out.push_str(&eval(form, env)?.display_string()),
                }
            }
            Ok(Value::str(&out))
        }

        Value::Symbol(s) => eval_symbol(*s, env),

        Value::Cons(cell) => {
            check_stop()?;
            let _guard = DepthGuard::enter(&cell.info)?;
            env.set_caller(Some(expr.clone()));
            eval_cons(expr, cell, env).map_err(|e| e.annotate(&cell.info))
        }
    }
}

/// Evaluate forms sequentially; a flow token stops the walk and is returned.
pub fn eval_forms(forms: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut result = Value::Nil;
    for form in forms {
        result = eval(form, env)?;
        if result.is_flow() {
            break;
        }
    }
    Ok(result)
}

fn capture_callable(c: &Rc<Callable>, env: &Rc<Frame>) -> Value {
    match c.as_ref() {
        Callable::Function(u) if u.env.borrow().is_none() => {
            Value::Callable(Rc::new(Callable::Function(u.captured(env))))
        }
        Callable::Special(u) if u.env.borrow().is_none() => {
            Value::Callable(Rc::new(Callable::Special(u.captured(env))))
        }
        Callable::Macro(u) if u.env.borrow().is_none() => {
            Value::Callable(Rc::new(Callable::Macro(u.captured(env))))
        }
        Callable::Pattern(p) if p.env.borrow().is_none() => {
            Value::Callable(Rc::new(Callable::Pattern(p.captured(env))))
        }
        _ => Value::Callable(c.clone()),
    }
}

// ===== symbols =====

fn eval_symbol(sym: Symbol, env: &Rc<Frame>) -> Result<Value, BraidError> {
    let text = sym.text();
    if sym == wk().nil {
        return Ok(Value::Nil);
    }
    if sym == wk().args_star {
        return Ok(Value::vector(env.args_vector().unwrap_or_default()));
    }
    if let Some(rest) = text.strip_prefix('%') {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            // %0..%9: positional argument of the nearest enclosing call.
            if let Some(local) = env.lookup(sym) {
                return Ok(local);
            }
            let n: usize = rest.parse().unwrap_or(0);
            return Ok(env.arg(n).unwrap_or(Value::Nil));
        }
    }
    // Member literals (`.name`) are self-evaluating accessors.
    if text.starts_with('.') && text.len() > 1 {
        return Ok(Value::Symbol(sym));
    }
    match env.lookup(sym) {
        Some(v) => Ok(v),
        None => {
            // Unbound-symbol hook: suggest the closest visible binding.
            let suggestion = closest_name(&text, env);
            Err(BraidError::unbound_symbol(&text, suggestion.as_deref()))
        }
    }
}

fn closest_name(name: &str, env: &Rc<Frame>) -> Option<String> {
    let mut best: Option<(usize, String)> = None;
    for candidate in env.visible_names() {
        let cand = candidate.text();
        let d = edit_distance(name, &cand, 2);
        if let Some(d) = d {
            if d > 0 && best.as_ref().map(|(bd, _)| d < *bd).unwrap_or(true) {
                best = Some((d, cand.to_string()));
            }
        }
    }
    best.map(|(_, s)| s)
}

/// Bounded Levenshtein distance; None when the distance exceeds `max`.
fn edit_distance(a: &str, b: &str, max: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut row = vec![i + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            row.push((prev[j] + cost).min(prev[j + 1] + 1).min(row[j] + 1));
        }
        if row.iter().min().copied().unwrap_or(0) > max {
            return None;
        }
        prev = row;
    }
    if prev[b.len()] <= max {
        Some(prev[b.len()])
    } else {
        None
    }
}

// ===== cons dispatch =====

fn list_items(form: &Value) -> Vec<Value> {
    form.list_values().unwrap_or_default()
}

fn quote_value(v: Value) -> Value {
    Value::cons(
        Value::Symbol(wk().quote),
        Value::cons(v, Value::Nil, SourceInfo::default()),
        SourceInfo::default(),
    )
}

fn eval_cons(expr: &Value, cell: &Rc<ConsCell>, env: &Rc<Frame>) -> Result<Value, BraidError> {
    match cell.head {
        HeadKind::Quote => {
            let items = list_items(expr);
            items
                .get(1)
                .cloned()
                .ok_or_else(|| BraidError::user("quote: expected 1 argument"))
        }
        HeadKind::Quasiquote => {
            let items = list_items(expr);
            let arg = items
                .get(1)
                .ok_or_else(|| BraidError::user("quasiquote: expected 1 argument"))?;
            quasiquote::expand(arg, env)
        }
        // Splat forms are consumed by the argument collector; standing alone
        // they evaluate to themselves.
        HeadKind::Splat => Ok(expr.clone()),
        HeadKind::Unquote | HeadKind::UnquoteSplice => Err(BraidError::user_at(
            "unquote is only valid inside quasiquote",
            &cell.info,
        )),
        HeadKind::Lambda => {
            let items = list_items(expr);
            let f = pattern::compile_function(None, &items[1..], cell.info.clone())?;
            Ok(Value::Callable(Rc::new(Callable::Function(f.captured(env)))))
        }
        HeadKind::Other => {
            let items = list_items(expr);
            let Some(head) = items.first() else {
                return Ok(Value::Nil);
            };
            if let Value::Symbol(s) = head {
                if let Some(result) = eval_special_form(*s, &items, cell, env)? {
                    return Ok(result);
                }
            }
            eval_application(&items, env)
        }
    }
}

/// Native special forms, dispatched on the interned head symbol.
/// Returns None when the head is not a special form.
fn eval_special_form(
    head: Symbol,
    items: &[Value],
    cell: &Rc<ConsCell>,
    env: &Rc<Frame>,
) -> Result<Option<Value>, BraidError> {
    let w = wk();
    let args = &items[1..];
    let result = if head == w.defn {
        sf_defn(args, cell, env)?
    } else if head == w.defmacro {
        sf_def_callable(args, cell, env, CallableKind::Macro)?
    } else if head == w.defspecial {
        sf_def_callable(args, cell, env, CallableKind::Special)?
    } else if head == w.deftype {
        sf_deftype(args, env)?
    } else if head == w.let_ {
        sf_let(args, env)?
    } else if head == w.set {
        sf_set(args, env)?
    } else if head == w.if_ {
        sf_if(args, env)?
    } else if head == w.do_ {
        eval_forms(args, env)?
    } else if head == w.while_ {
        sf_while(args, env)?
    } else if head == w.foreach {
        sf_foreach(args, env)?
    } else if head == w.match_ || head == w.matchp {
        let subject = eval(
            args.first()
                .ok_or_else(|| BraidError::user("match: expected a subject"))?,
            env,
        )?;
        pattern::match_inline(subject, &args[1..], env)?
    } else if head == w.pipe {
        sf_pipe(args, env)?
    } else if head == w.and {
        sf_and(args, env)?
    } else if head == w.or {
        sf_or(args, env)?
    } else if head == w.return_ {
        let v = match args.first() {
            Some(f) => eval(f, env)?,
            None => Value::Nil,
        };
        Value::Return(Rc::new(v))
    } else if head == w.break_ {
        let v = match args.first() {
            Some(f) => Some(Rc::new(eval(f, env)?)),
            None => None,
        };
        Value::Break(v)
    } else if head == w.continue_ {
        Value::Continue
    } else if head == w.fail {
        Value::Fail
    } else if head == w.recur {
        check_stop()?;
        let (recur_args, _named) = collect_args(args, env)?;
        Value::Recur(Rc::new(RecurToken {
            args: recur_args,
            target: None,
        }))
    } else if head == w.try_ {
        sf_try(args, env)?
    } else if head == w.trace {
        match args.first() {
            Some(f) => {
                let on = eval(f, env)?.is_truthy();
                set_trace(on);
                Value::Bool(on)
            }
            None => Value::Bool(trace_enabled()),
        }
    } else if head == w.load {
        let path = eval(
            args.first()
                .ok_or_else(|| BraidError::user("load: expected a file path"))?,
            env,
        )?;
        match path {
            Value::Str(p) => load_file(&p, env)?,
            other => return Err(BraidError::type_error("load", "string", &other, 0)),
        }
    } else if head == w.quit {
        let code = match args.first() {
            Some(f) => match eval(f, env)? {
                Value::Int(i) => i as i32,
                _ => 0,
            },
            None => 0,
        };
        return Err(BraidError::Exit(code));
    } else {
        return Ok(None);
    };
    Ok(Some(result))
}

enum CallableKind {
    Macro,
    Special,
}

fn name_of(form: Option<&Value>, what: &str) -> Result<Symbol, BraidError> {
    match form {
        Some(Value::Symbol(s)) => Ok(*s),
        _ => Err(BraidError::compile(format!("{}: expected a name symbol", what))),
    }
}

fn sf_defn(args: &[Value], cell: &Rc<ConsCell>, env: &Rc<Frame>) -> Result<Value, BraidError> {
    let name = name_of(args.first(), "defn")?;
    let rest = &args[1..];
    let value = if pattern::has_clause_bars(rest) {
        let pf = pattern::compile_pattern_function(Some(name), rest, cell.info.clone())?;
        Value::Callable(Rc::new(Callable::Pattern(pf.captured(env))))
    } else {
        let f = pattern::compile_function(Some(name), rest, cell.info.clone())?;
        Value::Callable(Rc::new(Callable::Function(f.captured(env))))
    };
    env.set_local(name, value.clone());
    Ok(value)
}

fn sf_def_callable(
    args: &[Value],
    cell: &Rc<ConsCell>,
    env: &Rc<Frame>,
    kind: CallableKind,
) -> Result<Value, BraidError> {
    let what = match kind {
        CallableKind::Macro => "defmacro",
        CallableKind::Special => "defspecial",
    };
    let name = name_of(args.first(), what)?;
    let f = pattern::compile_function(Some(name), &args[1..], cell.info.clone())?.captured(env);
    let value = Value::Callable(Rc::new(match kind {
        CallableKind::Macro => Callable::Macro(f),
        CallableKind::Special => Callable::Special(f),
    }));
    env.set_local(name, value.clone());
    Ok(value)
}

fn sf_deftype(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    let name = name_of(args.first(), "deftype")?;
    // (deftype name ^other) declares a local type alias.
    if let Some(Value::Type(ty)) = args.get(1) {
        env.define_alias(name, *ty);
        return Ok(Value::Type(TypeLiteral {
            name,
            nullable: false,
        }));
    }
    let mut fields = Vec::new();
    for field in &args[1..] {
        match field {
            Value::Symbol(s) => fields.push(*s),
            Value::Keyword(k) => fields.push(*k),
            other => {
                return Err(BraidError::compile(format!(
                    "deftype: field name must be a symbol, got {}",
                    other.type_name()
                )))
            }
        }
    }
    types::register_record(types::RecordType { name, fields });
    let ty = Value::Type(TypeLiteral {
        name,
        nullable: false,
    });
    env.set_local(name, ty.clone());
    Ok(ty)
}

fn sf_let(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    match args.first() {
        // (let [a 1 b 2] body…) — scoped bindings.
        Some(Value::VectorLit(bindings)) => {
            if bindings.len() % 2 != 0 {
                return Err(BraidError::compile("let: bindings must come in name/value pairs"));
            }
            let frame = Frame::child(env);
            let mut iter = bindings.iter();
            while let (Some(name_form), Some(value_form)) = (iter.next(), iter.next()) {
                let name = match name_form {
                    Value::Symbol(s) => *s,
                    other => {
                        return Err(BraidError::compile(format!(
                            "let: binding name must be a symbol, got {}",
                            other.type_name()
                        )))
                    }
                };
                let value = eval(value_form, &frame)?;
                let mut binds = Vec::new();
                binder::destructure(name, &value, &mut binds)?;
                for (n, v) in binds {
                    frame.set_local(n, v);
                }
            }
            eval_forms(&args[1..], &frame)
        }
        // (let name value) — definition in the current frame, destructuring
        // compound names.
        Some(Value::Symbol(name)) => {
            let value = eval(
                args.get(1)
                    .ok_or_else(|| BraidError::user("let: expected a value"))?,
                env,
            )?;
            let mut binds = Vec::new();
            binder::destructure(*name, &value, &mut binds)?;
            for (n, v) in binds {
                env.set_local(n, v);
            }
            Ok(value)
        }
        _ => Err(BraidError::compile(
            "let: expected a binding vector or a name",
        )),
    }
}

fn sf_set(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    let name = name_of(args.first(), "set")?;
    let value = eval(
        args.get(1)
            .ok_or_else(|| BraidError::user("set: expected a value"))?,
        env,
    )?;
    let mut binds = Vec::new();
    binder::destructure(name, &value, &mut binds)?;
    for (n, v) in binds {
        env.set(n, v);
    }
    Ok(value)
}

fn sf_if(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    if args.len() < 2 || args.len() > 3 {
        return Err(BraidError::user("if: expected 2 or 3 arguments"));
    }
    let cond = eval(&args[0], env)?;
    if cond.is_flow() {
        return Ok(cond);
    }
    if cond.is_truthy() {
        eval(&args[1], env)
    } else if let Some(alt) = args.get(2) {
        eval(alt, env)
    } else {
        Ok(Value::Nil)
    }
}

fn sf_while(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    let cond = args
        .first()
        .ok_or_else(|| BraidError::user("while: expected a condition"))?;
    let body = &args[1..];
    let mut result = Value::Nil;
    'outer: loop {
        check_stop()?;
        if !eval(cond, env)?.is_truthy() {
            break;
        }
        for form in body {
            let v = eval(form, env)?;
            match v {
                Value::Break(out) => {
                    result = out.map(|v| (*v).clone()).unwrap_or(Value::Nil);
                    break 'outer;
                }
                Value::Continue => continue 'outer,
                Value::Return(_) | Value::Recur(_) | Value::Fail => return Ok(v),
                _ => {}
            }
        }
    }
    Ok(result)
}

fn sf_foreach(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    let name = name_of(args.first(), "foreach")?;
    let seq = eval(
        args.get(1)
            .ok_or_else(|| BraidError::user("foreach: expected a sequence"))?,
        env,
    )?;
    let values = seq
        .seq_values()
        .ok_or_else(|| BraidError::type_error("foreach", "sequence", &seq, 1))?;
    let body = &args[2..];
    let mut result = Value::Nil;
    'outer: for item in values {
        check_stop()?;
        let frame = Frame::child(env);
        let mut binds = Vec::new();
        binder::destructure(name, &item, &mut binds)?;
        for (n, v) in binds {
            frame.set_local(n, v);
        }
        for form in body {
            let v = eval(form, &frame)?;
            match v {
                Value::Break(out) => {
                    result = out.map(|v| (*v).clone()).unwrap_or(Value::Nil);
                    break 'outer;
                }
                Value::Continue => continue 'outer,
                Value::Return(_) | Value::Recur(_) | Value::Fail => return Ok(v),
                _ => {}
            }
        }
    }
    Ok(result)
}

fn sf_pipe(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut value = eval(
        args.first()
            .ok_or_else(|| BraidError::user("pipe: expected at least one segment"))?,
        env,
    )?;
    for segment in &args[1..] {
        check_stop()?;
        if value.is_flow() {
            return Ok(value);
        }
        // The previous segment's result becomes the final argument.
        let call = match segment {
            Value::Cons(cell) => {
                let mut items = list_items(segment);
                items.push(quote_value(value));
                Value::list_with_info(items, cell.info.clone())
            }
            other => Value::list(vec![other.clone(), quote_value(value)]),
        };
        value = eval(&call, env)?;
    }
    Ok(value)
}

fn sf_and(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut result = Value::Bool(true);
    for form in args {
        result = eval(form, env)?;
        if result.is_flow() || !result.is_truthy() {
            return Ok(result);
        }
    }
    Ok(result)
}

fn sf_or(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut result = Value::Nil;
    for form in args {
        result = eval(form, env)?;
        if result.is_flow() || result.is_truthy() {
            return Ok(result);
        }
    }
    Ok(result)
}

fn sf_try(args: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut body = Vec::new();
    let mut catch: Option<(Symbol, Vec<Value>)> = None;
    let mut finally: Option<Vec<Value>> = None;
    for form in args {
        if let Value::Cons(_) = form {
            let items = list_items(form);
            match items.first() {
                Some(Value::Symbol(s)) if *s == wk().catch => {
                    let name = name_of(items.get(1), "catch")?;
                    catch = Some((name, items[2..].to_vec()));
                    continue;
                }
                Some(Value::Symbol(s)) if *s == wk().finally => {
                    finally = Some(items[1..].to_vec());
                    continue;
                }
                _ => {}
            }
        }
        body.push(form.clone());
    }

    let outcome = match eval_forms(&body, env) {
        // Only user errors are catchable; exit, stop, and compile errors
        // bypass the handler.
        Err(err @ BraidError::User { .. }) => match &catch {
            Some((name, handler)) => {
                let message = match &err {
                    BraidError::User { message, .. } => message.clone(),
                    _ => unreachable!(),
                };
                let frame = Frame::child(env);
                frame.set_local(*name, Value::str(&message));
                eval_forms(handler, &frame)
            }
            None => Err(err),
        },
        other => other,
    };

    if let Some(forms) = finally {
        eval_forms(&forms, env)?;
    }
    outcome
}

// ===== argument collection =====

fn splat_inner(form: &Value) -> Result<Value, BraidError> {
    form.list_values()
        .and_then(|items| items.get(1).cloned())
        .ok_or_else(|| BraidError::user("splat: expected 1 argument"))
}

fn expand_splat(value: &Value, out: &mut Vec<Value>) -> Result<(), BraidError> {
    match value {
        // Dictionaries splat as interleaved keys and values.
        Value::Dict(map) => {
            for (k, v) in map.borrow().iter() {
                out.push(k.clone());
                out.push(v.clone());
            }
            Ok(())
        }
        other => match other.seq_values() {
            Some(values) => {
                out.extend(values);
                Ok(())
            }
            None => Err(BraidError::user(format!(
                "cannot splat a value of type {}",
                other.type_name()
            ))),
        },
    }
}

/// Evaluate literal elements, expanding `@expr` splats in place.
fn eval_elements(items: &[Value], env: &Rc<Frame>) -> Result<Vec<Value>, BraidError> {
    let mut out = Vec::new();
    for item in items {
        check_stop()?;
        if let Value::Cons(cell) = item {
            if cell.head == HeadKind::Splat {
                let spliced = eval(&splat_inner(item)?, env)?;
                expand_splat(&spliced, &mut out)?;
                continue;
            }
        }
        out.push(eval(item, env)?);
    }
    Ok(out)
}

/// Collect call arguments left-to-right: evaluate positionals, expand
/// splats, and capture `-flag` switches into the named-parameter map.
pub fn collect_args(
    forms: &[Value],
    env: &Rc<Frame>,
) -> Result<(Vec<Value>, IndexMap<Symbol, Value>), BraidError> {
    collect(forms, env, true)
}

/// Collect arguments without evaluating them (macro/special discipline);
/// switches are still extracted, their values left unevaluated.
pub fn collect_raw(
    forms: &[Value],
    env: &Rc<Frame>,
) -> Result<(Vec<Value>, IndexMap<Symbol, Value>), BraidError> {
    collect(forms, env, false)
}

fn collect(
    forms: &[Value],
    env: &Rc<Frame>,
    evaluate: bool,
) -> Result<(Vec<Value>, IndexMap<Symbol, Value>), BraidError> {
    let mut args = Vec::new();
    let mut named = IndexMap::new();
    let mut i = 0;
    while i < forms.len() {
        check_stop()?;
        match &forms[i] {
            Value::Symbol(s) if s.is_switch() => {
                let key = s.switch_name();
                if s.switch_takes_value() {
                    i += 1;
                    let form = forms.get(i).ok_or_else(|| {
                        BraidError::user(format!("-{}: expected a value after the switch", key))
                    })?;
                    let value = if evaluate { eval(form, env)? } else { form.clone() };
                    named.insert(key, value);
                } else {
                    named.insert(key, Value::Bool(true));
                }
            }
            Value::Cons(cell) if cell.head == HeadKind::Splat && evaluate => {
                let spliced = eval(&splat_inner(&forms[i])?, env)?;
                expand_splat(&spliced, &mut args)?;
            }
            form => {
                let value = if evaluate { eval(form, env)? } else { form.clone() };
                args.push(value);
            }
        }
        i += 1;
    }
    Ok((args, named))
}

// ===== application =====

fn eval_application(items: &[Value], env: &Rc<Frame>) -> Result<Value, BraidError> {
    let head = &items[0];
    let arg_forms = &items[1..];

    let func = eval(head, env)?;

    // Macros and special forms receive their arguments unevaluated.
    if let Value::Callable(c) = &func {
        match c.as_ref() {
            Callable::Macro(mac) => {
                let (args, named) = collect_raw(arg_forms, env)?;
                let expansion = binder::expand_macro(mac, &args, named)?;
                return eval(&expansion, env);
            }
            Callable::Special(special) => {
                let (args, named) = collect_raw(arg_forms, env)?;
                return binder::call_function(special, args, named);
            }
            _ => {}
        }
    }

    let (args, named) = collect_args(arg_forms, env)?;
    apply(&func, args, named, env)
}

/// Invoke any callable value with evaluated arguments.
pub fn apply(
    func: &Value,
    args: Vec<Value>,
    named: IndexMap<Symbol, Value>,
    env: &Rc<Frame>,
) -> Result<Value, BraidError> {
    let tracing = trace_enabled();
    if tracing {
        if let Value::Callable(c) = func {
            let shown: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            eprintln!("--> {} ({})", c.name(), truncated(shown.join(" ")));
        }
    }
    let result = apply_inner(func, args, named, env);
    if tracing {
        if let (Value::Callable(c), Ok(v)) = (func, &result) {
            eprintln!("<-- {} = {}", c.name(), truncated(v.to_string()));
        }
    }
    result
}

fn apply_inner(
    func: &Value,
    args: Vec<Value>,
    named: IndexMap<Symbol, Value>,
    env: &Rc<Frame>,
) -> Result<Value, BraidError> {
    match func {
        Value::Callable(c) => match c.as_ref() {
            Callable::Builtin { f, .. } => f(&args, env),
            Callable::Function(u) => binder::call_function(u, args, named),
            Callable::Special(u) => binder::call_function(u, args, named),
            Callable::Macro(_) => Err(BraidError::user(
                "macros cannot be applied to evaluated arguments",
            )),
            Callable::Pattern(p) => pattern::call_pattern(p, args, named, env),
        },
        Value::FunctionLiteral(c) => {
            let captured = capture_callable(c, env);
            apply_inner(&captured, args, named, env)
        }

        // Dictionaries read with one argument and write with two.
        Value::Dict(map) => match args.len() {
            1 => Ok(map.borrow().get(&args[0]).cloned().unwrap_or(Value::Nil)),
            2 => {
                map.borrow_mut().insert(args[0].clone(), args[1].clone());
                Ok(args[1].clone())
            }
            n => Err(BraidError::arity_error("dict", crate::error::ARITY_ONE_OR_TWO, n)),
        },

        // (:key coll) looks the keyword up in a dictionary or record.
        Value::Keyword(k) => match args.first() {
            Some(Value::Dict(map)) => Ok(map
                .borrow()
                .get(&Value::Keyword(*k))
                .cloned()
                .unwrap_or(Value::Nil)),
            Some(Value::Record(rec)) => {
                Ok(rec.fields.borrow().get(k).cloned().unwrap_or(Value::Nil))
            }
            Some(Value::Nil) | None => Ok(Value::Nil),
            Some(other) => Err(BraidError::type_error(":keyword", "dict", other, 0)),
        },

        // (.member obj) reads a field by name.
        Value::Symbol(s) if s.text().starts_with('.') && s.text().len() > 1 => {
            let key = Symbol::intern(&s.text()[1..]);
            match args.first() {
                Some(Value::Dict(map)) => Ok(map
                    .borrow()
                    .get(&Value::Keyword(key))
                    .cloned()
                    .unwrap_or(Value::Nil)),
                Some(Value::Record(rec)) => {
                    Ok(rec.fields.borrow().get(&key).cloned().unwrap_or(Value::Nil))
                }
                Some(Value::Nil) | None => Ok(Value::Nil),
                Some(other) => Err(BraidError::type_error(".member", "dict or record", other, 0)),
            }
        }

        // Sequences index with an integer.
        Value::Vector(v) => match args.first() {
            Some(Value::Int(i)) => Ok(v.borrow().get(*i as usize).cloned().unwrap_or(Value::Nil)),
            Some(other) => Err(BraidError::type_error("vector", "int index", other, 0)),
            None => Err(BraidError::arity_error("vector", crate::error::ARITY_ONE, 0)),
        },
        Value::Slice(s) => match args.first() {
            Some(Value::Int(i)) => Ok(s.get(*i as usize).unwrap_or(Value::Nil)),
            Some(other) => Err(BraidError::type_error("slice", "int index", other, 0)),
            None => Err(BraidError::arity_error("slice", crate::error::ARITY_ONE, 0)),
        },

        // A type applies as a record constructor or a conversion.
        Value::Type(ty) => match types::resolve(ty, Some(env.as_ref())) {
            types::Resolved::Record(record) => types::construct_record(&record, &args),
            _ => match args.first() {
                Some(v) if args.len() == 1 => types::convert(v, ty, Some(env.as_ref())),
                _ => Err(BraidError::arity_error(&ty.to_string(), crate::error::ARITY_ONE, args.len())),
            },
        },

        // A regex applies as a matcher, yielding the group vector or nil.
        Value::Regex(re) => match args.first() {
            Some(Value::Str(s)) => match re.captures(s) {
                Some(caps) => Ok(Value::vector(
                    caps.iter()
                        .map(|g| g.map(|m| Value::str(m.as_str())).unwrap_or(Value::Nil))
                        .collect(),
                )),
                None => Ok(Value::Nil),
            },
            Some(other) => Err(BraidError::type_error("regex", "string", other, 0)),
            None => Err(BraidError::arity_error("regex", crate::error::ARITY_ONE, 0)),
        },

        other => Err(BraidError::user(format!(
            "value of type {} is not callable",
            other.type_name()
        ))),
    }
}

// ===== source loading =====

/// Read and evaluate a Braid source file; returns the last form's value.
/// Reading is interleaved with evaluation so `defmacro` definitions are
/// visible to the reader for the forms that follow them. A path without an
/// extension falls back to `name.tl`.
pub fn load_file(path: &str, env: &Rc<Frame>) -> Result<Value, BraidError> {
    let mut resolved = path.to_string();
    if !std::path::Path::new(path).exists() && !path.contains('.') {
        resolved = format!("{}.{}", path, crate::config::SOURCE_EXTENSION);
    }
    let source = std::fs::read_to_string(&resolved)
        .map_err(|e| BraidError::user(format!("load: cannot read {}: {}", resolved, e)))?;
    eval_source(&source, Some(&resolved), env)
}

/// Read and evaluate a source string form by form.
pub fn eval_source(
    source: &str,
    file: Option<&str>,
    env: &Rc<Frame>,
) -> Result<Value, BraidError> {
    let mut reader = crate::reader::Reader::new(source, file, Some(env.clone()))?;
    let mut result = Value::Nil;
    while let Some(form) = reader.next_form()? {
        result = eval(&form, env)?;
    }
    Ok(result)
}
