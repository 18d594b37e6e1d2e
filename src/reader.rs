// ABOUTME: Reader: lexer and parser turning source text into the value graph

use crate::binder;
use crate::env::Frame;
use crate::error::BraidError;
use crate::eval;
use crate::pattern;
use crate::symbol::{wk, Symbol};
use crate::types;
use crate::value::{
    Callable, ExpandableString, SourceInfo, StrSegment, Value,
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, one_of},
    combinator::{opt, recognize},
    IResult, Parser,
};
use num_bigint::BigInt;
use std::collections::BTreeSet;
use std::rc::Rc;

// ===== tokens =====

/// Raw pieces of an interpolating string before its `${…}` holes are parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSeg {
    Lit(String),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    /// `#{`
    SetOpen,
    /// `#(`
    FnOpen,
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplice,
    Splat,
    Int(i64),
    Big(BigInt),
    Float(f64),
    Str(String),
    Expandable { segments: Vec<RawSeg>, raw: String },
    CharLit(char),
    RegexLit(String),
    /// Text after `^`, including generics and `?` suffix.
    TypeName(String),
    /// Name after `.`.
    Member(String),
    Keyword(String),
    Sym(String),
    Comma,
    Colon,
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub line: u32,
}

// ===== nom token recognizers =====

const SYMBOL_START: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ+-*/%<>=!?_&$";

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || "+-*/%<>=!?_&:$".contains(c)
}

fn symbol_text(input: &str) -> IResult<&str, &str> {
    recognize((one_of(SYMBOL_START), take_while(is_symbol_char))).parse(input)
}

fn keyword_text(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || "-_?!*+<>=/".contains(c))(input)
}

fn digits(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit() || c == '_')(input)
}

fn plain_digits(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit())(input)
}

fn number_text(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(char('-')),
        alt((
            recognize((tag("0x"), take_while1(|c: char| c.is_ascii_hexdigit() || c == '_'))),
            recognize((tag("0b"), take_while1(|c: char| c == '0' || c == '1' || c == '_'))),
            recognize((
                digits,
                opt((char('.'), plain_digits)),
                opt((one_of("eE"), opt(one_of("+-")), plain_digits)),
            )),
            recognize((char('.'), plain_digits)),
        )),
        opt(char('i')),
    ))
    .parse(input)
}

fn switch_text(input: &str) -> IResult<&str, &str> {
    recognize((
        char('-'),
        take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_'),
        opt(char(':')),
    ))
    .parse(input)
}

/// Turn recognized number text into a token, promoting to big integers when
/// an `i` suffix is present or an `i64` overflows.
fn make_number(text: &str) -> Result<TokenKind, BraidError> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let big_suffix = cleaned.ends_with('i');
    let body = if big_suffix {
        cleaned[..cleaned.len() - 1].to_string()
    } else {
        cleaned
    };
    let negative = body.starts_with('-');
    let digits_part = if negative {
        body[1..].to_string()
    } else {
        body.clone()
    };

    let radix = if digits_part.starts_with("0x") {
        16
    } else if digits_part.starts_with("0b") {
        2
    } else {
        10
    };

    if radix != 10 {
        let stripped = &digits_part[2..];
        let value = i64::from_str_radix(stripped, radix).ok();
        return Ok(match value {
            Some(v) if !big_suffix => TokenKind::Int(if negative { -v } else { v }),
            _ => {
                let mut b = BigInt::parse_bytes(stripped.as_bytes(), radix)
                    .ok_or_else(|| BraidError::compile(format!("malformed number {}", text)))?;
                if negative {
                    b = -b;
                }
                TokenKind::Big(b)
            }
        });
    }

    let is_float = digits_part.contains('.') || digits_part.contains('e') || digits_part.contains('E');
    if is_float {
        if big_suffix {
            return Err(BraidError::compile(format!(
                "big-integer suffix is not valid on a float: {}",
                text
            )));
        }
        let v: f64 = body
            .parse()
            .map_err(|_| BraidError::compile(format!("malformed number {}", text)))?;
        return Ok(TokenKind::Float(v));
    }

    if big_suffix {
        let b: BigInt = body
            .parse()
            .map_err(|_| BraidError::compile(format!("malformed number {}", text)))?;
        return Ok(TokenKind::Big(b));
    }
    match body.parse::<i64>() {
        Ok(v) => Ok(TokenKind::Int(v)),
        // Exact integers promote widening automatically on overflow.
        Err(_) => {
            let b: BigInt = body
                .parse()
                .map_err(|_| BraidError::compile(format!("malformed number {}", text)))?;
            Ok(TokenKind::Big(b))
        }
    }
}

// ===== lexer =====

struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: u32,
}

impl<'s> Lexer<'s> {
    fn new(src: &'s str) -> Lexer<'s> {
        Lexer { src, pos: 0, line: 1 }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn advance(&mut self, bytes: usize) {
        let consumed = &self.src[self.pos..self.pos + bytes];
        self.line += consumed.matches('\n').count() as u32;
        self.pos += bytes;
    }

    fn advance_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.advance(c.len_utf8());
        Some(c)
    }

    fn take_nom<F>(&mut self, f: F) -> Option<&'s str>
    where
        F: FnOnce(&'s str) -> IResult<&'s str, &'s str>,
    {
        match f(self.rest()) {
            Ok((_, matched)) => {
                self.advance(matched.len());
                Some(matched)
            }
            Err(_) => None,
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
    }

    fn incomplete(&self, what: &str) -> BraidError {
        BraidError::Incomplete(format!("unterminated {}", what))
    }

    fn compile_error(&self, message: String) -> BraidError {
        BraidError::compile_at(message, None, self.line, None)
    }

    fn next_token(&mut self) -> Result<Option<Token>, BraidError> {
        self.skip_ws();
        let start = self.pos;
        let line = self.line;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let kind = match c {
            ';' => {
                let text: String = self.rest().chars().take_while(|c| *c != '\n').collect();
                self.advance(text.len());
                TokenKind::Comment(text)
            }
            '(' if self.rest().starts_with("(;") => {
                self.lex_block_comment()?
            }
            '(' => {
                self.advance(1);
                TokenKind::LParen
            }
            ')' => {
                self.advance(1);
                TokenKind::RParen
            }
            '[' => {
                self.advance(1);
                TokenKind::LBracket
            }
            ']' => {
                self.advance(1);
                TokenKind::RBracket
            }
            '{' => {
                self.advance(1);
                TokenKind::LBrace
            }
            '}' => {
                self.advance(1);
                TokenKind::RBrace
            }
            '#' => match self.peek_at(1) {
                Some('{') => {
                    self.advance(2);
                    TokenKind::SetOpen
                }
                Some('(') => {
                    self.advance(2);
                    TokenKind::FnOpen
                }
                Some('"') => {
                    self.advance(2);
                    self.lex_regex()?
                }
                other => {
                    return Err(self.compile_error(format!(
                        "unknown dispatch form #{}",
                        other.map(String::from).unwrap_or_default()
                    )))
                }
            },
            '\'' => {
                self.advance(1);
                TokenKind::Quote
            }
            '`' => {
                self.advance(1);
                TokenKind::Quasiquote
            }
            '~' => {
                if self.peek_at(1) == Some('@') {
                    self.advance(2);
                    TokenKind::UnquoteSplice
                } else {
                    self.advance(1);
                    TokenKind::Unquote
                }
            }
            '@' => {
                if self.peek_at(1) == Some('"') {
                    self.advance(2);
                    self.lex_verbatim()?
                } else {
                    self.advance(1);
                    TokenKind::Splat
                }
            }
            '"' => self.lex_string()?,
            '\\' => {
                self.advance(1);
                self.lex_char()?
            }
            '^' => {
                if self
                    .peek_at(1)
                    .map(|c| c.is_alphabetic() || c == '_')
                    .unwrap_or(false)
                {
                    self.advance(1);
                    self.lex_type_name()?
                } else {
                    self.advance(1);
                    TokenKind::Sym("^".to_string())
                }
            }
            ':' => {
                if self.peek_at(1).map(|c| c.is_alphanumeric()).unwrap_or(false) {
                    self.advance(1);
                    let text = self
                        .take_nom(keyword_text)
                        .ok_or_else(|| self.compile_error("malformed keyword".to_string()))?;
                    TokenKind::Keyword(text.to_string())
                } else {
                    self.advance(1);
                    TokenKind::Colon
                }
            }
            ',' => {
                self.advance(1);
                TokenKind::Comma
            }
            '|' => {
                self.advance(1);
                TokenKind::Sym("|".to_string())
            }
            '.' => {
                if self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    let text = self
                        .take_nom(number_text)
                        .ok_or_else(|| self.compile_error("malformed number".to_string()))?;
                    make_number(text)?
                } else if self
                    .peek_at(1)
                    .map(|c| c.is_alphabetic() || c == '_')
                    .unwrap_or(false)
                {
                    self.advance(1);
                    let text = self
                        .take_nom(keyword_text)
                        .ok_or_else(|| self.compile_error("malformed member name".to_string()))?;
                    TokenKind::Member(text.to_string())
                } else {
                    self.advance(1);
                    TokenKind::Sym(".".to_string())
                }
            }
            '-' => {
                let next = self.peek_at(1);
                let digit_follows = next.map(|c| c.is_ascii_digit()).unwrap_or(false)
                    || (next == Some('.')
                        && self.peek_at(2).map(|c| c.is_ascii_digit()).unwrap_or(false));
                if digit_follows {
                    let text = self
                        .take_nom(number_text)
                        .ok_or_else(|| self.compile_error("malformed number".to_string()))?;
                    make_number(text)?
                } else if next.map(|c| c.is_alphabetic()).unwrap_or(false) {
                    let text = self
                        .take_nom(switch_text)
                        .ok_or_else(|| self.compile_error("malformed switch".to_string()))?;
                    TokenKind::Sym(text.to_string())
                } else {
                    let text = self
                        .take_nom(symbol_text)
                        .ok_or_else(|| self.compile_error("malformed symbol".to_string()))?;
                    TokenKind::Sym(text.to_string())
                }
            }
            c if c.is_ascii_digit() => {
                let text = self
                    .take_nom(number_text)
                    .ok_or_else(|| self.compile_error("malformed number".to_string()))?;
                make_number(text)?
            }
            c if SYMBOL_START.contains(c) => {
                let text = self
                    .take_nom(symbol_text)
                    .ok_or_else(|| self.compile_error("malformed symbol".to_string()))?;
                TokenKind::Sym(text.to_string())
            }
            other => return Err(self.compile_error(format!("unexpected character '{}'", other))),
        };

        Ok(Some(Token {
            kind,
            start,
            end: self.pos,
            line,
        }))
    }

    fn lex_block_comment(&mut self) -> Result<TokenKind, BraidError> {
        let start = self.pos;
        self.advance(2); // consume "(;"
        let mut depth = 1usize;
        while depth > 0 {
            if self.rest().starts_with("(;") {
                depth += 1;
                self.advance(2);
            } else if self.rest().starts_with(";)") {
                depth -= 1;
                self.advance(2);
            } else if self.advance_char().is_none() {
                return Err(self.incomplete("block comment"));
            }
        }
        Ok(TokenKind::Comment(self.src[start..self.pos].to_string()))
    }

    fn lex_regex(&mut self) -> Result<TokenKind, BraidError> {
        let mut pattern = String::new();
        loop {
            match self.advance_char() {
                None => return Err(self.incomplete("regex literal")),
                Some('"') => break,
                Some('\\') => match self.advance_char() {
                    None => return Err(self.incomplete("regex literal")),
                    Some('"') => pattern.push('"'),
                    Some(c) => {
                        pattern.push('\\');
                        pattern.push(c);
                    }
                },
                Some(c) => pattern.push(c),
            }
        }
        Ok(TokenKind::RegexLit(pattern))
    }

    fn lex_type_name(&mut self) -> Result<TokenKind, BraidError> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                name.push(c);
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        // Generic suffix: a balanced bracket group, kept in the raw text.
        if self.peek() == Some('[') {
            let mut depth = 0usize;
            loop {
                match self.advance_char() {
                    None => return Err(self.incomplete("type literal")),
                    Some('[') => {
                        depth += 1;
                        name.push('[');
                    }
                    Some(']') => {
                        depth -= 1;
                        name.push(']');
                        if depth == 0 {
                            break;
                        }
                    }
                    Some(c) => name.push(c),
                }
            }
        }
        if self.peek() == Some('?') {
            self.advance(1);
            name.push('?');
        }
        Ok(TokenKind::TypeName(name))
    }

    fn lex_char(&mut self) -> Result<TokenKind, BraidError> {
        let run: String = self
            .rest()
            .chars()
            .take_while(|c| c.is_alphanumeric())
            .collect();
        if run.is_empty() {
            return match self.advance_char() {
                Some(c) => Ok(TokenKind::CharLit(c)),
                None => Err(self.incomplete("character literal")),
            };
        }
        self.advance(run.len());
        if run.chars().count() == 1 {
            return Ok(TokenKind::CharLit(run.chars().next().unwrap()));
        }
        match run.as_str() {
            "space" => Ok(TokenKind::CharLit(' ')),
            "newline" => Ok(TokenKind::CharLit('\n')),
            "tab" => Ok(TokenKind::CharLit('\t')),
            "return" => Ok(TokenKind::CharLit('\r')),
            "esc" => Ok(TokenKind::CharLit('\u{1b}')),
            _ => {
                if let Some(hex) = run.strip_prefix('u') {
                    if hex.len() == 4 {
                        if let Ok(cp) = u32::from_str_radix(hex, 16) {
                            if let Some(c) = char::from_u32(cp) {
                                return Ok(TokenKind::CharLit(c));
                            }
                        }
                    }
                }
                if let Some(hex) = run.strip_prefix('x') {
                    if (1..=2).contains(&hex.len()) {
                        if let Ok(cp) = u32::from_str_radix(hex, 16) {
                            if let Some(c) = char::from_u32(cp) {
                                return Ok(TokenKind::CharLit(c));
                            }
                        }
                    }
                }
                Err(self.compile_error(format!("unknown character literal \\{}", run)))
            }
        }
    }

    fn lex_verbatim(&mut self) -> Result<TokenKind, BraidError> {
        // `@"…"`: no escapes, no interpolation; `""` stands for a quote.
        let mut out = String::new();
        loop {
            match self.advance_char() {
                None => return Err(self.incomplete("string")),
                Some('"') => {
                    if self.peek() == Some('"') {
                        self.advance(1);
                        out.push('"');
                    } else {
                        break;
                    }
                }
                Some(c) => out.push(c),
            }
        }
        Ok(TokenKind::Str(out))
    }

    fn lex_string(&mut self) -> Result<TokenKind, BraidError> {
        let triple = self.rest().starts_with("\"\"\"");
        let body_start;
        if triple {
            self.advance(3);
            body_start = self.pos;
        } else {
            self.advance(1);
            body_start = self.pos;
        }

        let mut segments: Vec<RawSeg> = Vec::new();
        let mut current = String::new();
        loop {
            if triple {
                if self.rest().starts_with("\"\"\"") {
                    let raw = self.src[body_start..self.pos].to_string();
                    self.advance(3);
                    return Ok(finish_string(segments, current, raw));
                }
            }
            match self.advance_char() {
                None => return Err(self.incomplete("string")),
                Some('"') if !triple => {
                    let raw = self.src[body_start..self.pos - 1].to_string();
                    return Ok(finish_string(segments, current, raw));
                }
                Some('\\') => match self.advance_char() {
                    None => return Err(self.incomplete("string")),
                    Some('n') => current.push('\n'),
                    Some('t') => current.push('\t'),
                    Some('r') => current.push('\r'),
                    Some('\\') => current.push('\\'),
                    Some('"') => current.push('"'),
                    Some('$') => current.push('$'),
                    Some('u') => {
                        let hex: String = self.rest().chars().take(4).collect();
                        if hex.len() == 4 {
                            if let Ok(cp) = u32::from_str_radix(&hex, 16) {
                                if let Some(c) = char::from_u32(cp) {
                                    self.advance(4);
                                    current.push(c);
                                    continue;
                                }
                            }
                        }
                        return Err(self.compile_error("malformed \\u escape".to_string()));
                    }
                    Some('x') => {
                        let hex: String = self.rest().chars().take(2).collect();
                        if hex.len() == 2 {
                            if let Ok(cp) = u32::from_str_radix(&hex, 16) {
                                if let Some(c) = char::from_u32(cp) {
                                    self.advance(2);
                                    current.push(c);
                                    continue;
                                }
                            }
                        }
                        return Err(self.compile_error("malformed \\x escape".to_string()));
                    }
                    Some(other) => {
                        current.push('\\');
                        current.push(other);
                    }
                },
                Some('$') if self.peek() == Some('{') => {
                    self.advance(1);
                    let expr = self.scan_interpolation()?;
                    if !current.is_empty() {
                        segments.push(RawSeg::Lit(std::mem::take(&mut current)));
                    }
                    segments.push(RawSeg::Expr(expr));
                }
                Some(c) => current.push(c),
            }
        }
    }

    /// Scan a `${…}` hole; braces nest, strings inside are skipped over.
    fn scan_interpolation(&mut self) -> Result<String, BraidError> {
        let mut depth = 1usize;
        let mut out = String::new();
        let mut in_string = false;
        loop {
            match self.advance_char() {
                None => return Err(self.incomplete("string interpolation")),
                Some('"') => {
                    in_string = !in_string;
                    out.push('"');
                }
                Some('\\') if in_string => {
                    out.push('\\');
                    if let Some(c) = self.advance_char() {
                        out.push(c);
                    }
                }
                Some('{') if !in_string => {
                    depth += 1;
                    out.push('{');
                }
                Some('}') if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push('}');
                }
                Some(c) => out.push(c),
            }
        }
    }
}

fn finish_string(mut segments: Vec<RawSeg>, current: String, raw: String) -> TokenKind {
    if segments.is_empty() {
        return TokenKind::Str(current);
    }
    if !current.is_empty() {
        segments.push(RawSeg::Lit(current));
    }
    TokenKind::Expandable { segments, raw }
}

/// Lex a whole source string into a token stream (comments included), with
/// byte spans for the syntax highlighter.
pub fn tokenize(src: &str) -> Result<Vec<Token>, BraidError> {
    let mut lexer = Lexer::new(src);
    let mut out = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        out.push(tok);
    }
    Ok(out)
}

// ===== parser =====

/// The forms whose clause/parameter syntax exempts them from the pipeline
/// rewrite.
fn pipeline_exempt(head: Symbol) -> bool {
    let w = wk();
    head == w.defn
        || head == w.matchp
        || head == w.match_
        || head == w.lambda
        || head == w.defspecial
        || head == w.defmacro
        || head == w.deftype
        || head == w.pipe
}

pub struct Reader<'s> {
    src: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    file: Option<Rc<str>>,
    env: Option<Rc<Frame>>,
}

impl<'s> Reader<'s> {
    /// Tokenize a source string; `env` enables read-time user-macro
    /// expansion against the current bindings.
    pub fn new(
        src: &'s str,
        file: Option<&str>,
        env: Option<Rc<Frame>>,
    ) -> Result<Reader<'s>, BraidError> {
        let tokens = tokenize(src)?
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Comment(_)))
            .collect();
        Ok(Reader {
            src,
            tokens,
            pos: 0,
            file: file.map(Rc::from),
            env,
        })
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn info_span(&self, start: usize, end: usize, line: u32) -> SourceInfo {
        SourceInfo {
            file: self.file.clone(),
            line,
            offset: start as u32,
            text: Some(Rc::from(&self.src[start.min(self.src.len())..end.min(self.src.len())])),
            function: None,
        }
    }

    /// Parse the next top-level form; None at end of input.
    pub fn next_form(&mut self) -> Result<Option<Value>, BraidError> {
        if self.pos >= self.tokens.len() {
            return Ok(None);
        }
        Ok(Some(self.parse_form()?))
    }

    fn parse_form(&mut self) -> Result<Value, BraidError> {
        let tok = self
            .next()
            .ok_or_else(|| BraidError::Incomplete("unexpected end of input".to_string()))?;
        let info = self.info_span(tok.start, tok.end, tok.line);
        match tok.kind {
            TokenKind::Int(v) => Ok(Value::Int(v)),
            TokenKind::Big(b) => Ok(Value::BigInt(Rc::new(b))),
            TokenKind::Float(f) => Ok(Value::Float(f)),
            TokenKind::Str(s) => Ok(Value::str(&s)),
            TokenKind::CharLit(c) => Ok(Value::Char(c)),
            TokenKind::Keyword(k) => Ok(Value::keyword(&k)),
            TokenKind::Member(m) => Ok(Value::Symbol(Symbol::intern(&format!(".{}", m)))),
            TokenKind::TypeName(t) => Ok(Value::Type(types::parse_type_text(&t))),
            TokenKind::RegexLit(pattern) => regex::Regex::new(&pattern)
                .map(|r| Value::Regex(Rc::new(r)))
                .map_err(|e| {
                    BraidError::compile_at(
                        format!("malformed regex literal: {}", e),
                        self.file.as_deref(),
                        tok.line,
                        Some(&pattern),
                    )
                }),
            TokenKind::Expandable { segments, raw } => self.parse_expandable(segments, raw),
            TokenKind::Sym(s) => Ok(match s.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "nil" => Value::Nil,
                _ => Value::Symbol(Symbol::intern(&s)),
            }),
            TokenKind::Quote => self.parse_prefixed(wk().quote, info),
            TokenKind::Quasiquote => self.parse_prefixed(wk().quasiquote, info),
            TokenKind::Unquote => self.parse_prefixed(wk().unquote, info),
            TokenKind::UnquoteSplice => self.parse_prefixed(wk().unquote_splice, info),
            TokenKind::Splat => self.parse_prefixed(wk().splat, info),
            TokenKind::LParen => self.parse_list(&tok),
            TokenKind::FnOpen => self.parse_fn_literal(&tok),
            TokenKind::LBracket => {
                let items = self.parse_until(TokenKind::RBracket, true, false, "vector literal")?;
                Ok(Value::VectorLit(Rc::new(items)))
            }
            TokenKind::LBrace => {
                let items = self.parse_until(TokenKind::RBrace, true, true, "dictionary literal")?;
                Ok(Value::DictLit(Rc::new(items)))
            }
            TokenKind::SetOpen => {
                let items = self.parse_until(TokenKind::RBrace, true, false, "set literal")?;
                Ok(Value::SetLit(Rc::new(items)))
            }
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => Err(
                BraidError::compile_at(
                    "unexpected closing delimiter".to_string(),
                    self.file.as_deref(),
                    tok.line,
                    None,
                ),
            ),
            TokenKind::Comma => Err(BraidError::compile_at(
                "',' is only valid inside vector and dictionary literals".to_string(),
                self.file.as_deref(),
                tok.line,
                None,
            )),
            TokenKind::Colon => Err(BraidError::compile_at(
                "':' is only valid inside dictionary literals".to_string(),
                self.file.as_deref(),
                tok.line,
                None,
            )),
            TokenKind::Comment(_) => self.parse_form(),
        }
    }

    fn parse_prefixed(&mut self, head: Symbol, info: SourceInfo) -> Result<Value, BraidError> {
        let inner = self.parse_form()?;
        Ok(Value::cons(
            Value::Symbol(head),
            Value::cons(inner, Value::Nil, info.clone()),
            info,
        ))
    }

    fn parse_expandable(
        &mut self,
        segments: Vec<RawSeg>,
        raw: String,
    ) -> Result<Value, BraidError> {
        let mut out = Vec::new();
        for seg in segments {
            match seg {
                RawSeg::Lit(text) => out.push(StrSegment::Lit(Rc::from(text.as_str()))),
                RawSeg::Expr(text) => {
                    let mut sub = Reader::new(&text, self.file.as_deref(), self.env.clone())?;
                    let form = sub.next_form()?.ok_or_else(|| {
                        BraidError::compile(format!("empty interpolation in \"{}\"", raw))
                    })?;
                    out.push(StrSegment::Expr(form));
                }
            }
        }
        Ok(Value::ExpandableStr(Rc::new(ExpandableString {
            segments: out,
            raw: Rc::from(raw.as_str()),
        })))
    }

    /// Collect forms until `close`, optionally treating `,` (and `:` for
    /// dictionary literals, at this literal's own nesting level only) as
    /// whitespace.
    fn parse_until(
        &mut self,
        close: TokenKind,
        skip_comma: bool,
        skip_colon: bool,
        what: &str,
    ) -> Result<Vec<Value>, BraidError> {
        let mut items = Vec::new();
        loop {
            match self.peek_kind() {
                None => return Err(BraidError::Incomplete(format!("unterminated {}", what))),
                Some(k) if *k == close => {
                    self.next();
                    return Ok(items);
                }
                Some(TokenKind::Comma) if skip_comma => {
                    self.next();
                }
                Some(TokenKind::Colon) if skip_colon => {
                    self.next();
                }
                _ => items.push(self.parse_form()?),
            }
        }
    }

    fn parse_list(&mut self, open: &Token) -> Result<Value, BraidError> {
        let mut items = Vec::new();
        let close_end;
        loop {
            match self.peek_kind() {
                None => {
                    return Err(BraidError::Incomplete("unterminated list".to_string()));
                }
                Some(TokenKind::RParen) => {
                    let tok = self.next().unwrap();
                    close_end = tok.end;
                    break;
                }
                _ => items.push(self.parse_form()?),
            }
        }
        let info = self.info_span(open.start, close_end, open.line);
        self.finish_list(items, info)
    }

    /// Apply the read-time output transformations to a freshly closed list:
    /// dotted pairs, pipelines, lambda compilation, user-macro expansion.
    fn finish_list(&mut self, items: Vec<Value>, info: SourceInfo) -> Result<Value, BraidError> {
        if items.is_empty() {
            return Ok(Value::Nil);
        }

        // (a . b) is exactly one dotted pair.
        if items.len() == 3 {
            if matches!(&items[1], Value::Symbol(s) if *s == wk().dot) {
                return Ok(Value::cons(items[0].clone(), items[2].clone(), info));
            }
        }

        // A top-level | turns the form into a pipeline, unless the head is a
        // function-definition form whose clause syntax owns the bars.
        let exempt = matches!(items.first(), Some(Value::Symbol(s)) if pipeline_exempt(*s));
        let has_bar = items
            .iter()
            .any(|i| matches!(i, Value::Symbol(s) if *s == wk().bar));
        if !exempt && has_bar {
            let mut rewritten = vec![Value::Symbol(wk().pipe)];
            let mut segment: Vec<Value> = Vec::new();
            for item in items {
                if matches!(&item, Value::Symbol(s) if *s == wk().bar) {
                    if segment.is_empty() {
                        return Err(BraidError::compile("empty pipeline segment"));
                    }
                    rewritten.push(segment_value(std::mem::take(&mut segment), &info));
                } else {
                    segment.push(item);
                }
            }
            if segment.is_empty() {
                return Err(BraidError::compile("empty pipeline segment"));
            }
            rewritten.push(segment_value(segment, &info));
            return Ok(Value::list_with_info(rewritten, info));
        }

        // A bare (lambda …) compiles immediately, by the same routine used
        // for defn bodies.
        if matches!(items.first(), Some(Value::Symbol(s)) if *s == wk().lambda) {
            let f = pattern::compile_function(None, &items[1..], info)?;
            return Ok(Value::FunctionLiteral(Rc::new(Callable::Function(f))));
        }

        // If the head names a macro binding, expand it now; the returned
        // value replaces the list.
        if let Some(Value::Symbol(head)) = items.first() {
            if let Some(env) = self.env.clone() {
                if !head.is_switch() {
                    if let Some(Value::Callable(c)) = env.lookup(*head) {
                        if let Callable::Macro(mac) = c.as_ref() {
                            let (args, named) = eval::collect_raw(&items[1..], &env)?;
                            return binder::expand_macro(mac, &args, named);
                        }
                    }
                }
            }
        }

        Ok(Value::list_with_info(items, info))
    }

    /// `#( … %n … )` becomes a lambda whose parameters are the argument
    /// indices seen, in order and deduplicated, plus a trailing `&_rest`.
    fn parse_fn_literal(&mut self, open: &Token) -> Result<Value, BraidError> {
        let mut items = Vec::new();
        let close_end;
        loop {
            match self.peek_kind() {
                None => return Err(BraidError::Incomplete("unterminated function literal".to_string())),
                Some(TokenKind::RParen) => {
                    let tok = self.next().unwrap();
                    close_end = tok.end;
                    break;
                }
                _ => items.push(self.parse_form()?),
            }
        }
        let info = self.info_span(open.start, close_end, open.line);
        let body = self.finish_list(items, info.clone())?;

        let mut indices = BTreeSet::new();
        collect_arg_indices(&body, &mut indices);
        let mut params: Vec<pattern::MatchElement> = indices
            .into_iter()
            .map(|n| pattern::MatchElement::Var {
                name: Symbol::intern(&format!("%{}", n)),
                default: None,
            })
            .collect();
        params.push(pattern::MatchElement::Rest {
            name: wk().rest_args,
        });

        let f = crate::value::UserFn {
            name: std::cell::RefCell::new(None),
            params: Rc::new(params),
            return_type: None,
            body: Rc::new(vec![body]),
            env: std::cell::RefCell::new(None),
            info,
        };
        Ok(Value::FunctionLiteral(Rc::new(Callable::Function(f))))
    }
}

fn segment_value(mut segment: Vec<Value>, info: &SourceInfo) -> Value {
    if segment.len() == 1 {
        segment.pop().unwrap()
    } else {
        Value::list_with_info(segment, info.clone())
    }
}

fn collect_arg_indices(form: &Value, out: &mut BTreeSet<u32>) {
    match form {
        Value::Symbol(s) => {
            let text = s.text();
            if let Some(rest) = text.strip_prefix('%') {
                if !rest.is_empty() && rest.len() <= 1 && rest.bytes().all(|b| b.is_ascii_digit()) {
                    out.insert(rest.parse().unwrap_or(0));
                }
            }
        }
        Value::Cons(cell) => {
            collect_arg_indices(&cell.car.borrow(), out);
            collect_arg_indices(&cell.cdr.borrow(), out);
        }
        Value::VectorLit(items) | Value::DictLit(items) | Value::SetLit(items) => {
            for item in items.iter() {
                collect_arg_indices(item, out);
            }
        }
        _ => {}
    }
}

// ===== public conveniences =====

/// Read every top-level form of a source string.
///
/// Note: read-time macro expansion only sees macros already bound in `env`;
/// drivers that must honor `defmacro` within the same source interleave
/// reading and evaluation instead (see `eval::eval_source`).
pub fn read_program(
    src: &str,
    file: Option<&str>,
    env: Option<Rc<Frame>>,
) -> Result<Vec<Value>, BraidError> {
    let mut reader = Reader::new(src, file, env)?;
    let mut out = Vec::new();
    while let Some(form) = reader.next_form()? {
        out.push(form);
    }
    Ok(out)
}

/// True when the source text ends inside an unterminated form, so an
/// interactive driver should request more input.
pub fn is_incomplete(src: &str) -> bool {
    match read_program(src, None, None) {
        Err(BraidError::Incomplete(_)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one(src: &str) -> Value {
        let forms = read_program(src, None, None).expect("parse");
        assert_eq!(forms.len(), 1, "expected one form from {:?}", src);
        forms.into_iter().next().unwrap()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(read_one("42"), Value::Int(42));
        assert_eq!(read_one("-42"), Value::Int(-42));
        assert_eq!(read_one("2.5"), Value::Float(2.5));
        assert_eq!(read_one("-.5"), Value::Float(-0.5));
        assert_eq!(read_one("0x10"), Value::Int(16));
        assert_eq!(read_one("0b101"), Value::Int(5));
        assert_eq!(read_one("1_000_000"), Value::Int(1_000_000));
        assert_eq!(read_one("1e3"), Value::Float(1000.0));
    }

    #[test]
    fn test_bigint_literals() {
        match read_one("7i") {
            Value::BigInt(b) => assert_eq!(*b, BigInt::from(7)),
            other => panic!("expected bigint, got {}", other),
        }
        // i64 overflow promotes automatically.
        match read_one("123456789012345678901234567890") {
            Value::BigInt(_) => {}
            other => panic!("expected bigint, got {}", other),
        }
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(read_one(r#""hello""#), Value::str("hello"));
        assert_eq!(read_one(r#""a\nb""#), Value::str("a\nb"));
        assert_eq!(read_one(r#""say \"hi\"""#), Value::str("say \"hi\""));
        assert_eq!(read_one("\"\"\"two\nlines\"\"\""), Value::str("two\nlines"));
    }

    #[test]
    fn test_verbatim_string_suppresses_interpolation() {
        assert_eq!(read_one(r#"@"no ${x} here""#), Value::str("no ${x} here"));
    }

    #[test]
    fn test_interpolated_string_splits_segments() {
        match read_one(r#""a ${(+ 1 2)} b""#) {
            Value::ExpandableStr(s) => {
                assert_eq!(s.segments.len(), 3);
                assert!(matches!(&s.segments[0], StrSegment::Lit(t) if &**t == "a "));
                assert!(matches!(&s.segments[1], StrSegment::Expr(_)));
            }
            other => panic!("expected expandable string, got {}", other),
        }
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(read_one("\\a"), Value::Char('a'));
        assert_eq!(read_one("\\space"), Value::Char(' '));
        assert_eq!(read_one("\\newline"), Value::Char('\n'));
        assert_eq!(read_one("\\u0041"), Value::Char('A'));
        assert_eq!(read_one("\\x41"), Value::Char('A'));
    }

    #[test]
    fn test_quote_prefixes() {
        assert_eq!(read_one("'x").to_string(), "(quote x)");
        assert_eq!(read_one("`x").to_string(), "(quasiquote x)");
        assert_eq!(read_one("~x").to_string(), "(unquote x)");
        assert_eq!(read_one("~@x").to_string(), "(unquote-splice x)");
        assert_eq!(read_one("@x").to_string(), "(splat x)");
    }

    #[test]
    fn test_collection_literals() {
        assert!(matches!(read_one("[1 2 3]"), Value::VectorLit(_)));
        assert!(matches!(read_one("{:a 1}"), Value::DictLit(_)));
        assert!(matches!(read_one("#{1 2}"), Value::SetLit(_)));
    }

    #[test]
    fn test_json_compat_whitespace() {
        match read_one(r#"{"a": 1, "b": 2}"#) {
            Value::DictLit(items) => assert_eq!(items.len(), 4),
            other => panic!("expected dict literal, got {}", other),
        }
        match read_one("[1, 2, 3]") {
            Value::VectorLit(items) => assert_eq!(items.len(), 3),
            other => panic!("expected vector literal, got {}", other),
        }
    }

    #[test]
    fn test_dotted_pair() {
        let v = read_one("(a . b)");
        assert_eq!(v.to_string(), "(a . b)");
        match v {
            Value::Cons(cell) => {
                assert_eq!(cell.cdr.borrow().to_string(), "b");
            }
            other => panic!("expected cons, got {}", other),
        }
    }

    #[test]
    fn test_pipeline_rewrite() {
        let v = read_one("(f 1 | g 2 | h)");
        assert_eq!(v.to_string(), "(pipe (f 1) (g 2) h)");
    }

    #[test]
    fn test_defn_exempt_from_pipeline() {
        let v = read_one("(defn f | 0 -> 1 | n -> n)");
        match &v {
            Value::Cons(_) => {
                let items = v.list_values().unwrap();
                assert!(matches!(&items[0], Value::Symbol(s) if &*s.text() == "defn"));
            }
            other => panic!("expected defn form, got {}", other),
        }
    }

    #[test]
    fn test_lambda_compiles_to_function_literal() {
        assert!(matches!(
            read_one("(lambda [x] x)"),
            Value::FunctionLiteral(_)
        ));
    }

    #[test]
    fn test_fn_literal_collects_arg_indices() {
        match read_one("#(+ %0 %1)") {
            Value::FunctionLiteral(c) => match c.as_ref() {
                Callable::Function(f) => {
                    // %0, %1 plus the implicit &_rest.
                    assert_eq!(f.params.len(), 3);
                }
                other => panic!("expected function, got {:?}", other),
            },
            other => panic!("expected function literal, got {}", other),
        }
    }

    #[test]
    fn test_type_and_member_literals() {
        match read_one("^int?") {
            Value::Type(t) => {
                assert_eq!(&*t.name.text(), "int");
                assert!(t.nullable);
            }
            other => panic!("expected type literal, got {}", other),
        }
        assert_eq!(read_one(".name").to_string(), ".name");
    }

    #[test]
    fn test_regex_literal() {
        match read_one(r##"#"\d+""##) {
            Value::Regex(r) => assert_eq!(r.as_str(), r"\d+"),
            other => panic!("expected regex, got {}", other),
        }
    }

    #[test]
    fn test_comments_are_skipped() {
        let forms = read_program("; line\n(; block (; nested ;) ;) 42", None, None).unwrap();
        assert_eq!(forms, vec![Value::Int(42)]);
    }

    #[test]
    fn test_incomplete_detection() {
        assert!(is_incomplete("(f 1 2"));
        assert!(is_incomplete("\"unterminated"));
        assert!(is_incomplete("\"\"\"still open"));
        assert!(is_incomplete("#\"regex"));
        assert!(is_incomplete("(; comment"));
        assert!(!is_incomplete("(f 1 2)"));
        assert!(!is_incomplete(")")); // malformed, but not incomplete
    }

    #[test]
    fn test_switch_tokens_read_as_symbols() {
        let forms = read_program("(f -verbose -out: 3)", None, None).unwrap();
        let items = forms[0].list_values().unwrap();
        assert!(matches!(&items[1], Value::Symbol(s) if s.is_switch()));
        assert!(matches!(&items[2], Value::Symbol(s) if s.switch_takes_value()));
    }

    #[test]
    fn test_source_info_populated() {
        let forms = read_program("(+ 1\n   2)", Some("demo.tl"), None).unwrap();
        match &forms[0] {
            Value::Cons(cell) => {
                assert_eq!(cell.info.line, 1);
                assert_eq!(cell.info.file.as_deref(), Some("demo.tl"));
                assert_eq!(cell.info.text.as_deref(), Some("(+ 1\n   2)"));
            }
            other => panic!("expected cons, got {}", other),
        }
    }
}
