// ABOUTME: Global symbol interner with compound-name and rest-marker analysis

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock};

/// An interned name. Equality is by interner id, so two symbols spelled the
/// same way are the same symbol on every thread.
///
/// Compound names (`a:b:c`) and the `&` rest-marker prefix are analyzed once
/// at intern time and cached alongside the text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

struct SymbolData {
    text: Arc<str>,
    /// Component ids for compound names (`a:b:c` → ids of `a`, `b`, `c`).
    components: Option<Vec<u32>>,
    /// False iff the textual name ends with `:` (trailing colon requests a
    /// scalar binding of the tail instead of the remaining sequence).
    bind_rest_to_last: bool,
    /// Name begins with `&`.
    is_rest: bool,
    /// Id of the name without its `&` prefix (self when there is none).
    base: u32,
    /// Name is a caller-side switch: `-flag` or `-flag:`.
    is_switch: bool,
    /// Switch takes a value (`-flag:`).
    switch_takes_value: bool,
}

struct Interner {
    map: HashMap<Arc<str>, u32>,
    data: Vec<SymbolData>,
}

static INTERNER: LazyLock<RwLock<Interner>> = LazyLock::new(|| {
    RwLock::new(Interner {
        map: HashMap::new(),
        data: Vec::new(),
    })
});

impl Symbol {
    pub fn intern(name: &str) -> Symbol {
        {
            let interner = INTERNER.read().expect("interner poisoned");
            if let Some(&id) = interner.map.get(name) {
                return Symbol(id);
            }
        }

        // Analyze before taking the write lock; component interning recurses.
        let is_switch = name.len() > 1
            && name.starts_with('-')
            && name[1..].starts_with(|c: char| c.is_alphabetic());
        let switch_takes_value = is_switch && name.ends_with(':');

        let is_rest = name.len() > 1 && name.starts_with('&');
        let base = if is_rest {
            Some(Symbol::intern(&name[1..]).0)
        } else {
            None
        };

        let components = if !is_switch && !is_rest {
            analyze_compound(name)
        } else {
            None
        };
        let bind_rest_to_last = !name.ends_with(':');

        let mut interner = INTERNER.write().expect("interner poisoned");
        if let Some(&id) = interner.map.get(name) {
            return Symbol(id);
        }
        let text: Arc<str> = Arc::from(name);
        let id = interner.data.len() as u32;
        interner.data.push(SymbolData {
            text: text.clone(),
            components,
            bind_rest_to_last,
            is_rest,
            base: base.unwrap_or(id),
            is_switch,
            switch_takes_value,
        });
        interner.map.insert(text, id);
        Symbol(id)
    }

    pub fn text(self) -> Arc<str> {
        let interner = INTERNER.read().expect("interner poisoned");
        interner.data[self.0 as usize].text.clone()
    }

    /// Ordered component symbols for a compound name, or None.
    pub fn components(self) -> Option<Vec<Symbol>> {
        let interner = INTERNER.read().expect("interner poisoned");
        interner.data[self.0 as usize]
            .components
            .as_ref()
            .map(|ids| ids.iter().map(|&id| Symbol(id)).collect())
    }

    pub fn is_compound(self) -> bool {
        let interner = INTERNER.read().expect("interner poisoned");
        interner.data[self.0 as usize].components.is_some()
    }

    pub fn bind_rest_to_last(self) -> bool {
        let interner = INTERNER.read().expect("interner poisoned");
        interner.data[self.0 as usize].bind_rest_to_last
    }

    pub fn is_rest(self) -> bool {
        let interner = INTERNER.read().expect("interner poisoned");
        interner.data[self.0 as usize].is_rest
    }

    /// The name with any `&` marker stripped.
    pub fn base(self) -> Symbol {
        let interner = INTERNER.read().expect("interner poisoned");
        Symbol(interner.data[self.0 as usize].base)
    }

    pub fn is_switch(self) -> bool {
        let interner = INTERNER.read().expect("interner poisoned");
        interner.data[self.0 as usize].is_switch
    }

    pub fn switch_takes_value(self) -> bool {
        let interner = INTERNER.read().expect("interner poisoned");
        interner.data[self.0 as usize].switch_takes_value
    }

    /// Switch name without its `-` prefix and trailing `:`.
    pub fn switch_name(self) -> Symbol {
        let text = self.text();
        Symbol::intern(text.trim_start_matches('-').trim_end_matches(':'))
    }
}

/// Split a compound name into component ids.
///
/// A name is compound when it contains `:` between non-empty pieces. A
/// single empty piece after a trailing colon is dropped (the trailing colon
/// only flips `bind_rest_to_last`).
fn analyze_compound(name: &str) -> Option<Vec<u32>> {
    if !name.contains(':') || name.len() < 2 {
        return None;
    }
    let trimmed = name.strip_suffix(':').unwrap_or(name);
    if trimmed.is_empty() || trimmed.contains("::") || trimmed.starts_with(':') {
        return None;
    }
    let pieces: Vec<&str> = trimmed.split(':').collect();
    if pieces.len() < 2 {
        return None;
    }
    Some(pieces.iter().map(|p| Symbol::intern(p).0).collect())
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.text())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Interned ids for the names the reader and evaluator dispatch on.
pub struct WellKnown {
    pub quote: Symbol,
    pub quasiquote: Symbol,
    pub unquote: Symbol,
    pub unquote_splice: Symbol,
    pub splat: Symbol,
    pub lambda: Symbol,
    pub defn: Symbol,
    pub defmacro: Symbol,
    pub defspecial: Symbol,
    pub deftype: Symbol,
    pub matchp: Symbol,
    pub match_: Symbol,
    pub let_: Symbol,
    pub if_: Symbol,
    pub do_: Symbol,
    pub while_: Symbol,
    pub foreach: Symbol,
    pub pipe: Symbol,
    pub and: Symbol,
    pub or: Symbol,
    pub set: Symbol,
    pub return_: Symbol,
    pub break_: Symbol,
    pub continue_: Symbol,
    pub recur: Symbol,
    pub fail: Symbol,
    pub try_: Symbol,
    pub catch: Symbol,
    pub finally: Symbol,
    pub trace: Symbol,
    pub load: Symbol,
    pub quit: Symbol,
    pub bar: Symbol,
    pub arrow: Symbol,
    pub dot: Symbol,
    pub where_: Symbol,
    pub begin_clause: Symbol,
    pub end_clause: Symbol,
    pub underscore: Symbol,
    pub bang: Symbol,
    pub true_: Symbol,
    pub false_: Symbol,
    pub nil: Symbol,
    pub rest_args: Symbol,
    pub args_star: Symbol,
}

static WK: LazyLock<WellKnown> = LazyLock::new(|| WellKnown {
    quote: Symbol::intern("quote"),
    quasiquote: Symbol::intern("quasiquote"),
    unquote: Symbol::intern("unquote"),
    unquote_splice: Symbol::intern("unquote-splice"),
    splat: Symbol::intern("splat"),
    lambda: Symbol::intern("lambda"),
    defn: Symbol::intern("defn"),
    defmacro: Symbol::intern("defmacro"),
    defspecial: Symbol::intern("defspecial"),
    deftype: Symbol::intern("deftype"),
    matchp: Symbol::intern("matchp"),
    match_: Symbol::intern("match"),
    let_: Symbol::intern("let"),
    if_: Symbol::intern("if"),
    do_: Symbol::intern("do"),
    while_: Symbol::intern("while"),
    foreach: Symbol::intern("foreach"),
    pipe: Symbol::intern("pipe"),
    and: Symbol::intern("and"),
    or: Symbol::intern("or"),
    set: Symbol::intern("set"),
    return_: Symbol::intern("return"),
    break_: Symbol::intern("break"),
    continue_: Symbol::intern("continue"),
    recur: Symbol::intern("recur"),
    fail: Symbol::intern("fail"),
    try_: Symbol::intern("try"),
    catch: Symbol::intern("catch"),
    finally: Symbol::intern("finally"),
    trace: Symbol::intern("trace"),
    load: Symbol::intern("load"),
    quit: Symbol::intern("quit"),
    bar: Symbol::intern("|"),
    arrow: Symbol::intern("->"),
    dot: Symbol::intern("."),
    where_: Symbol::intern("where"),
    begin_clause: Symbol::intern("^"),
    end_clause: Symbol::intern("$"),
    underscore: Symbol::intern("_"),
    bang: Symbol::intern("!"),
    true_: Symbol::intern("true"),
    false_: Symbol::intern("false"),
    nil: Symbol::intern("nil"),
    rest_args: Symbol::intern("_rest"),
    args_star: Symbol::intern("%*"),
});

pub fn wk() -> &'static WellKnown {
    &WK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_identity() {
        let a = Symbol::intern("foo");
        let b = Symbol::intern("foo");
        let c = Symbol::intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(&*a.text(), "foo");
    }

    #[test]
    fn test_compound_components() {
        let sym = Symbol::intern("a:b:c");
        let comps = sym.components().expect("compound");
        assert_eq!(comps.len(), 3);
        assert_eq!(&*comps[0].text(), "a");
        assert_eq!(&*comps[1].text(), "b");
        assert_eq!(&*comps[2].text(), "c");
        assert!(sym.bind_rest_to_last());
    }

    #[test]
    fn test_trailing_colon_requests_scalar_tail() {
        let sym = Symbol::intern("x:xs:");
        let comps = sym.components().expect("compound");
        assert_eq!(comps.len(), 2);
        assert!(!sym.bind_rest_to_last());
    }

    #[test]
    fn test_simple_name_has_no_components() {
        assert!(Symbol::intern("plain").components().is_none());
        assert!(!Symbol::intern("plain").is_compound());
    }

    #[test]
    fn test_rest_marker() {
        let sym = Symbol::intern("&rest");
        assert!(sym.is_rest());
        assert_eq!(&*sym.base().text(), "rest");
        assert!(!Symbol::intern("rest").is_rest());
    }

    #[test]
    fn test_switch_analysis() {
        let flag = Symbol::intern("-verbose");
        assert!(flag.is_switch());
        assert!(!flag.switch_takes_value());
        assert_eq!(&*flag.switch_name().text(), "verbose");

        let valued = Symbol::intern("-out:");
        assert!(valued.is_switch());
        assert!(valued.switch_takes_value());
        assert_eq!(&*valued.switch_name().text(), "out");

        // Plain operators never read as switches.
        assert!(!Symbol::intern("-").is_switch());
        assert!(!Symbol::intern("->").is_switch());
        assert!(!Symbol::intern("-1abc").is_switch());
    }
}
