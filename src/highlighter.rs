// ABOUTME: REPL helper: token-stream syntax highlighting and continue-read validation
// Implements rustyline's Highlighter over the reader's token stream so the
// colors always agree with what the reader will actually parse.

use crate::reader::{self, Token, TokenKind};
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline_derive::{Completer, Helper, Hinter};
use std::borrow::Cow;

// ANSI color codes (3-bit/4-bit for maximum terminal compatibility)
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_PARENS: &str = "\x1b[1;34m"; // Bold blue
const COLOR_SPECIAL_FORM: &str = "\x1b[1;35m"; // Bold magenta
const COLOR_NUMBER: &str = "\x1b[33m"; // Yellow
const COLOR_STRING: &str = "\x1b[32m"; // Green
const COLOR_KEYWORD: &str = "\x1b[33m"; // Yellow
const COLOR_COMMENT: &str = "\x1b[90m"; // Gray
const COLOR_QUOTE: &str = "\x1b[1;33m"; // Bold yellow
const COLOR_TYPE: &str = "\x1b[36m"; // Cyan

const SPECIAL_FORMS: &[&str] = &[
    "defn", "defmacro", "defspecial", "deftype", "lambda", "let", "set", "if", "do", "while",
    "foreach", "match", "matchp", "pipe", "and", "or", "quote", "quasiquote", "unquote",
    "unquote-splice", "return", "break", "continue", "recur", "fail", "try", "catch", "finally",
    "trace", "load", "quit",
];

#[derive(Completer, Helper, Hinter, Default)]
pub struct BraidHelper;

impl BraidHelper {
    pub fn new() -> Self {
        BraidHelper
    }

    /// Colorize an already-rendered value for REPL output.
    pub fn highlight_output(text: &str) -> String {
        highlight_text(text)
    }
}

fn color_for(token: &Token) -> Option<&'static str> {
    match &token.kind {
        TokenKind::LParen
        | TokenKind::RParen
        | TokenKind::LBracket
        | TokenKind::RBracket
        | TokenKind::LBrace
        | TokenKind::RBrace
        | TokenKind::SetOpen
        | TokenKind::FnOpen => Some(COLOR_PARENS),
        TokenKind::Int(_) | TokenKind::Big(_) | TokenKind::Float(_) => Some(COLOR_NUMBER),
        TokenKind::Str(_) | TokenKind::Expandable { .. } | TokenKind::RegexLit(_) => {
            Some(COLOR_STRING)
        }
        TokenKind::CharLit(_) => Some(COLOR_STRING),
        TokenKind::Keyword(_) => Some(COLOR_KEYWORD),
        TokenKind::TypeName(_) | TokenKind::Member(_) => Some(COLOR_TYPE),
        TokenKind::Comment(_) => Some(COLOR_COMMENT),
        TokenKind::Quote
        | TokenKind::Quasiquote
        | TokenKind::Unquote
        | TokenKind::UnquoteSplice
        | TokenKind::Splat => Some(COLOR_QUOTE),
        TokenKind::Sym(name) => {
            if SPECIAL_FORMS.contains(&name.as_str())
                || name == "true"
                || name == "false"
                || name == "nil"
            {
                Some(COLOR_SPECIAL_FORM)
            } else {
                None
            }
        }
        TokenKind::Comma | TokenKind::Colon => None,
    }
}

fn highlight_text(text: &str) -> String {
    let tokens = match reader::tokenize(text) {
        Ok(tokens) => tokens,
        // Unlexable input (mid-edit) renders uncolored.
        Err(_) => return text.to_string(),
    };
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    for token in &tokens {
        if token.start > last {
            out.push_str(&text[last..token.start]);
        }
        let span = &text[token.start..token.end];
        match color_for(token) {
            Some(color) => {
                out.push_str(color);
                out.push_str(span);
                out.push_str(COLOR_RESET);
            }
            None => out.push_str(span),
        }
        last = token.end;
    }
    if last < text.len() {
        out.push_str(&text[last..]);
    }
    out
}

impl Highlighter for BraidHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let highlighted = highlight_text(line);
        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

impl Validator for BraidHelper {
    /// Incomplete parses make the REPL continue reading instead of
    /// submitting the buffer.
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        // A lone backslash is the multi-line entry request, not a form.
        if input.trim() == "\\" {
            return Ok(ValidationResult::Valid(None));
        }
        if reader::is_incomplete(input) {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_symbols_unchanged() {
        assert_eq!(highlight_text("foo bar"), "foo bar");
    }

    #[test]
    fn test_special_form_and_number_colored() {
        let out = highlight_text("(defn f [x] 42)");
        assert!(out.contains(COLOR_SPECIAL_FORM));
        assert!(out.contains(COLOR_NUMBER));
        assert!(out.contains(COLOR_PARENS));
    }

    #[test]
    fn test_string_colored() {
        let out = highlight_text("\"hi\"");
        assert!(out.starts_with(COLOR_STRING));
    }

    #[test]
    fn test_unlexable_input_passes_through() {
        // A stray dispatch prefix cannot lex; the line must come back as-is.
        assert_eq!(highlight_text("#q"), "#q");
    }
}
