//! Console I/O: print, println, newline, read-line

use crate::env::Frame;
use crate::error::BraidError;
use crate::value::Value;
use std::io::{BufRead, Write};
use std::rc::Rc;

fn render(args: &[Value]) -> String {
    args.iter()
        .map(|v| v.display_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// (print …) — write arguments separated by spaces, no trailing newline.
pub fn builtin_print(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    print!("{}", render(args));
    let _ = std::io::stdout().flush();
    Ok(Value::Nil)
}

/// (println …) — like print, with a trailing newline.
pub fn builtin_println(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    println!("{}", render(args));
    Ok(Value::Nil)
}

pub fn builtin_newline(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if !args.is_empty() {
        return Err(BraidError::arity_error("newline", "0", args.len()));
    }
    println!();
    Ok(Value::Nil)
}

/// (read-line) — one line from stdin, without the newline; nil on EOF.
pub fn builtin_read_line(args: &[Value], _env: &Rc<Frame>) -> Result<Value, BraidError> {
    if !args.is_empty() {
        return Err(BraidError::arity_error("read-line", "0", args.len()));
    }
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) => Ok(Value::Nil),
        Ok(_) => Ok(Value::str(line.trim_end_matches(['\n', '\r']))),
        Err(e) => Err(BraidError::user(format!("read-line: {}", e))),
    }
}

pub fn register(env: &Rc<Frame>) {
    super::define(env, "print", builtin_print);
    super::define(env, "println", builtin_println);
    super::define(env, "newline", builtin_newline);
    super::define(env, "read-line", builtin_read_line);
}
