// ABOUTME: Environment frames: bindings, caller info, named parameters, type aliases

use crate::symbol::Symbol;
use crate::types::TypeLiteral;
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One frame of the call stack.
///
/// Bindings are insertion-ordered. A frame also carries the cons currently
/// being evaluated (for error annotation), the inbound keyword arguments,
/// the positional arguments (for `%0`..`%9` and `%*`), and a local type
/// alias table inherited through the parent chain.
#[derive(Debug)]
pub struct Frame {
    vars: RefCell<IndexMap<Symbol, Value>>,
    parent: Option<Rc<Frame>>,
    caller: RefCell<Option<Value>>,
    named: RefCell<Option<IndexMap<Symbol, Value>>>,
    args: RefCell<Option<Vec<Value>>>,
    aliases: RefCell<HashMap<Symbol, TypeLiteral>>,
}

impl Frame {
    /// The root (global) frame.
    pub fn global() -> Rc<Frame> {
        Rc::new(Frame {
            vars: RefCell::new(IndexMap::new()),
            parent: None,
            caller: RefCell::new(None),
            named: RefCell::new(None),
            args: RefCell::new(None),
            aliases: RefCell::new(HashMap::new()),
        })
    }

    /// A child frame, created on function entry or scoped `let`.
    pub fn child(parent: &Rc<Frame>) -> Rc<Frame> {
        Rc::new(Frame {
            vars: RefCell::new(IndexMap::new()),
            parent: Some(parent.clone()),
            caller: RefCell::new(None),
            named: RefCell::new(None),
            args: RefCell::new(None),
            aliases: RefCell::new(HashMap::new()),
        })
    }

    pub fn lookup(&self, sym: Symbol) -> Option<Value> {
        if let Some(v) = self.vars.borrow().get(&sym) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(sym))
    }

    /// Assign in the nearest frame already containing `sym`, else define
    /// globally.
    pub fn set(&self, sym: Symbol, value: Value) {
        if self.vars.borrow().contains_key(&sym) {
            self.vars.borrow_mut().insert(sym, value);
            return;
        }
        match &self.parent {
            Some(parent) => parent.set(sym, value),
            None => {
                self.vars.borrow_mut().insert(sym, value);
            }
        }
    }

    /// Always define in this frame.
    pub fn set_local(&self, sym: Symbol, value: Value) {
        self.vars.borrow_mut().insert(sym, value);
    }

    /// Shallow detached copy of the visible bindings and aliases, for
    /// handing to a worker. The snapshot has no parent, caller, or call
    /// arguments; nearer bindings shadow farther ones as in live lookup.
    pub fn snapshot(&self) -> Rc<Frame> {
        let mut chain: Vec<&Frame> = Vec::new();
        let mut cur = Some(self);
        while let Some(frame) = cur {
            chain.push(frame);
            cur = frame.parent.as_deref();
        }
        let snap = Frame::global();
        for frame in chain.iter().rev() {
            for (k, v) in frame.vars.borrow().iter() {
                snap.vars.borrow_mut().insert(*k, v.clone());
            }
            for (k, t) in frame.aliases.borrow().iter() {
                snap.aliases.borrow_mut().insert(*k, *t);
            }
        }
        snap
    }

    // ===== caller info =====

    pub fn set_caller(&self, form: Option<Value>) {
        *self.caller.borrow_mut() = form;
    }

    pub fn caller(&self) -> Option<Value> {
        self.caller.borrow().clone()
    }

    // ===== named parameters =====

    pub fn set_named(&self, named: IndexMap<Symbol, Value>) {
        *self.named.borrow_mut() = Some(named);
    }

    /// Look a keyword argument up in the nearest call boundary. Frames
    /// without a named-parameter map (scoped lets, clause frames) defer to
    /// their parent; a call frame answers definitively.
    pub fn named(&self, sym: Symbol) -> Option<Value> {
        match self.named.borrow().as_ref() {
            Some(map) => map.get(&sym).cloned(),
            None => self.parent.as_ref().and_then(|p| p.named(sym)),
        }
    }

    pub fn named_map(&self) -> IndexMap<Symbol, Value> {
        match self.named.borrow().as_ref() {
            Some(map) => map.clone(),
            None => self
                .parent
                .as_ref()
                .map(|p| p.named_map())
                .unwrap_or_default(),
        }
    }

    // ===== positional arguments =====

    pub fn set_args(&self, args: Vec<Value>) {
        *self.args.borrow_mut() = Some(args);
    }

    /// The positional argument vector of the nearest enclosing call.
    pub fn args_vector(&self) -> Option<Vec<Value>> {
        if let Some(args) = self.args.borrow().as_ref() {
            return Some(args.clone());
        }
        self.parent.as_ref().and_then(|p| p.args_vector())
    }

    pub fn arg(&self, index: usize) -> Option<Value> {
        self.args_vector().and_then(|v| v.get(index).cloned())
    }

    // ===== type aliases =====

    pub fn define_alias(&self, name: Symbol, ty: TypeLiteral) {
        self.aliases.borrow_mut().insert(name, ty);
    }

    pub fn alias_lookup(&self, name: Symbol) -> Option<TypeLiteral> {
        if let Some(t) = self.aliases.borrow().get(&name) {
            return Some(*t);
        }
        self.parent.as_ref().and_then(|p| p.alias_lookup(name))
    }

    // ===== diagnostics =====

    /// All visible binding names, used by the unbound-symbol suggestion hook.
    pub fn visible_names(&self) -> Vec<Symbol> {
        let mut out = Vec::new();
        let mut cur = Some(self);
        while let Some(frame) = cur {
            out.extend(frame.vars.borrow().keys().copied());
            cur = frame.parent.as_deref();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_lookup() {
        let env = Frame::global();
        env.set_local(Symbol::intern("x"), Value::Int(42));
        assert_eq!(env.lookup(Symbol::intern("x")), Some(Value::Int(42)));
        assert_eq!(env.lookup(Symbol::intern("missing")), None);
    }

    #[test]
    fn test_shadowing_and_parent_lookup() {
        let parent = Frame::global();
        parent.set_local(Symbol::intern("x"), Value::Int(1));
        parent.set_local(Symbol::intern("y"), Value::Int(2));

        let child = Frame::child(&parent);
        child.set_local(Symbol::intern("x"), Value::Int(10));

        assert_eq!(child.lookup(Symbol::intern("x")), Some(Value::Int(10)));
        assert_eq!(child.lookup(Symbol::intern("y")), Some(Value::Int(2)));
        assert_eq!(parent.lookup(Symbol::intern("x")), Some(Value::Int(1)));
    }

    #[test]
    fn test_set_assigns_nearest_containing_frame() {
        let parent = Frame::global();
        parent.set_local(Symbol::intern("x"), Value::Int(1));
        let child = Frame::child(&parent);

        child.set(Symbol::intern("x"), Value::Int(5));
        assert_eq!(parent.lookup(Symbol::intern("x")), Some(Value::Int(5)));
        assert!(!child.vars.borrow().contains_key(&Symbol::intern("x")));
    }

    #[test]
    fn test_set_defines_globally_when_unbound() {
        let root = Frame::global();
        let mid = Frame::child(&root);
        let leaf = Frame::child(&mid);

        leaf.set(Symbol::intern("fresh"), Value::Int(9));
        assert_eq!(root.lookup(Symbol::intern("fresh")), Some(Value::Int(9)));
    }

    #[test]
    fn test_args_vector_walks_to_nearest_call() {
        let root = Frame::global();
        let call = Frame::child(&root);
        call.set_args(vec![Value::Int(1), Value::Int(2)]);
        let inner = Frame::child(&call);

        assert_eq!(inner.arg(0), Some(Value::Int(1)));
        assert_eq!(inner.arg(1), Some(Value::Int(2)));
        assert_eq!(inner.arg(2), None);
        assert_eq!(root.arg(0), None);
    }

    #[test]
    fn test_snapshot_detaches_and_flattens() {
        let root = Frame::global();
        root.set_local(Symbol::intern("a"), Value::Int(1));
        let child = Frame::child(&root);
        child.set_local(Symbol::intern("a"), Value::Int(2));
        child.set_local(Symbol::intern("b"), Value::Int(3));

        let snap = child.snapshot();
        assert_eq!(snap.lookup(Symbol::intern("a")), Some(Value::Int(2)));
        assert_eq!(snap.lookup(Symbol::intern("b")), Some(Value::Int(3)));

        // Mutations after the snapshot do not leak into it.
        child.set_local(Symbol::intern("b"), Value::Int(99));
        assert_eq!(snap.lookup(Symbol::intern("b")), Some(Value::Int(3)));
    }

    #[test]
    fn test_alias_table_inherited() {
        let root = Frame::global();
        root.define_alias(
            Symbol::intern("text"),
            crate::types::TypeLiteral::named("string"),
        );
        let child = Frame::child(&root);
        let found = child.alias_lookup(Symbol::intern("text")).unwrap();
        assert_eq!(&*found.name.text(), "string");
    }
}
