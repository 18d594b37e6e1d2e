//! # Built-in Functions
//!
//! Core builtins for the Braid interpreter, one concern per sub-module:
//!
//! - **[arithmetic]**: `+ - * / % inc dec abs` over the Int/BigInt/Float tower
//! - **[comparison]**: `== != < > <= >=`
//! - **[logic]**: `not`
//! - **[lists]**: `cons car cdr list first rest last nth length reverse append`
//! - **[seq]**: `map filter reduce apply range count empty? concat take drop`
//! - **[strings]**: string manipulation and regex helpers
//! - **[maps]**: dictionaries and hash sets
//! - **[types]**: predicates and conversions
//! - **[console]**: `print println newline read-line`
//! - **[errors]**: `throw assert`
//! - **[json]**: `.json` data bridge
//!
//! Each sub-module exposes a `register` function that binds its functions
//! into an environment frame.

use crate::env::Frame;
use crate::symbol::Symbol;
use crate::value::{BuiltinFn, Callable, Value};
use std::rc::Rc;

pub mod arithmetic;
pub mod comparison;
pub mod console;
pub mod errors;
pub mod json;
pub mod lists;
pub mod logic;
pub mod maps;
pub mod seq;
pub mod strings;
pub mod types;

/// Bind one builtin function into the frame.
pub(crate) fn define(env: &Rc<Frame>, name: &'static str, f: BuiltinFn) {
    env.set_local(
        Symbol::intern(name),
        Value::Callable(Rc::new(Callable::Builtin { name, f })),
    );
}

/// Register every builtin category in the environment.
pub fn register_builtins(env: &Rc<Frame>) {
    arithmetic::register(env);
    comparison::register(env);
    logic::register(env);
    lists::register(env);
    seq::register(env);
    strings::register(env);
    maps::register(env);
    types::register(env);
    console::register(env);
    errors::register(env);
    json::register(env);
}

/// Bindings exposed at driver initialization: process id, OS flags, version.
pub fn register_globals(env: &Rc<Frame>) {
    env.set_local(Symbol::intern("pid"), Value::Int(std::process::id() as i64));
    env.set_local(
        Symbol::intern("IsWindows"),
        Value::Bool(cfg!(target_os = "windows")),
    );
    env.set_local(
        Symbol::intern("IsLinux"),
        Value::Bool(cfg!(target_os = "linux")),
    );
    env.set_local(
        Symbol::intern("IsMacOS"),
        Value::Bool(cfg!(target_os = "macos")),
    );
    env.set_local(Symbol::intern("IsUnix"), Value::Bool(cfg!(unix)));
    env.set_local(
        Symbol::intern("*version*"),
        Value::str(crate::config::VERSION),
    );
}
