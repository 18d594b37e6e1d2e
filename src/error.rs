// ABOUTME: Error taxonomy for the Braid reader, evaluator and primitives

use crate::value::{SourceInfo, Value};
use thiserror::Error;

// ===== Arity constant strings (eliminates allocations in error paths) =====
pub const ARITY_ONE: &str = "1";
pub const ARITY_TWO: &str = "2";
pub const ARITY_ONE_OR_TWO: &str = "1-2";
pub const ARITY_AT_LEAST_ONE: &str = "at least 1";
pub const ARITY_AT_LEAST_TWO: &str = "at least 2";

/// Every failure surfaced by the interpreter.
///
/// `Incomplete` is recoverable: an interactive driver responds by reading
/// more input instead of aborting. `Exit` and `Stop` unwind past the generic
/// handlers to the outermost driver. Flow-control tokens (`return`, `break`,
/// `continue`, `recur`, `fail`) are *values*, not errors — see `value::Value`.
#[derive(Error, Debug, Clone)]
pub enum BraidError {
    /// The reader hit end-of-input inside an unterminated form.
    #[error("incomplete input: {0}")]
    Incomplete(String),

    /// The current form cannot be compiled; fatal for that form only.
    #[error("{message}")]
    Compile {
        message: String,
        file: Option<String>,
        line: u32,
        snippet: Option<String>,
    },

    /// Default error kind: anything raised while evaluating user code.
    #[error("{message}")]
    User {
        message: String,
        file: Option<String>,
        line: u32,
        snippet: Option<String>,
        /// One rendered caller annotation per evaluator level.
        trace: Vec<String>,
    },

    /// `quit` was evaluated; unwinds to the outermost driver.
    #[error("exit requested ({0})")]
    Exit(i32),

    /// The process-wide stop flag was observed at a checkpoint.
    #[error("evaluation stopped")]
    Stop,
}

impl BraidError {
    /// Create a plain user error with no source position yet.
    pub fn user(message: impl Into<String>) -> Self {
        BraidError::User {
            message: message.into(),
            file: None,
            line: 0,
            snippet: None,
            trace: Vec::new(),
        }
    }

    /// Create a user error annotated with a source position.
    pub fn user_at(message: impl Into<String>, info: &SourceInfo) -> Self {
        BraidError::User {
            message: message.into(),
            file: info.file.as_ref().map(|f| f.to_string()),
            line: info.line,
            snippet: info.text.as_ref().map(|t| first_line(t)),
            trace: Vec::new(),
        }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        BraidError::Compile {
            message: message.into(),
            file: None,
            line: 0,
            snippet: None,
        }
    }

    pub fn compile_at(message: impl Into<String>, file: Option<&str>, line: u32, snippet: Option<&str>) -> Self {
        BraidError::Compile {
            message: message.into(),
            file: file.map(str::to_string),
            line,
            snippet: snippet.map(first_line),
        }
    }

    /// Type mismatch with function name, expected type, offending value, and position.
    pub fn type_error(function: &str, expected: &str, actual: &Value, position: usize) -> Self {
        BraidError::user(format!(
            "{}: expected {}, got {} at argument {}",
            function,
            expected,
            actual.type_name(),
            position
        ))
    }

    /// Arity mismatch with expected count/range and actual count.
    pub fn arity_error(function: &str, expected: &str, actual: usize) -> Self {
        let plural = if expected == ARITY_ONE { "" } else { "s" };
        BraidError::user(format!(
            "{}: expected {} argument{}, got {}",
            function, expected, plural, actual
        ))
    }

    pub fn unbound_symbol(name: &str, suggestion: Option<&str>) -> Self {
        match suggestion {
            Some(s) => BraidError::user(format!("undefined symbol: {} (did you mean {}?)", name, s)),
            None => BraidError::user(format!("undefined symbol: {}", name)),
        }
    }

    /// Attach a caller-frame annotation while an error bubbles upward.
    ///
    /// The first annotated frame fills the error's own file/line; later
    /// frames append `-> at (file:line) snippet` entries to the trace.
    /// A snippet identical to the previous one collapses to `:`.
    pub fn annotate(self, info: &SourceInfo) -> Self {
        match self {
            BraidError::User {
                message,
                file,
                line,
                snippet,
                mut trace,
            } => {
                if file.is_none() && line == 0 {
                    BraidError::User {
                        message,
                        file: info.file.as_ref().map(|f| f.to_string()),
                        line: info.line,
                        snippet: info.text.as_ref().map(|t| first_line(t)),
                        trace,
                    }
                } else {
                    let rendered = first_line(info.text.as_deref().unwrap_or(""));
                    let duplicate = trace
                        .last()
                        .map(|t| t.ends_with(&rendered))
                        .unwrap_or_else(|| snippet.as_deref() == Some(rendered.as_str()));
                    let entry = if duplicate && !rendered.is_empty() {
                        format!(
                            "-> at ({}:{}) :",
                            info.file.as_deref().unwrap_or("<input>"),
                            info.line
                        )
                    } else {
                        format!(
                            "-> at ({}:{}) {}",
                            info.file.as_deref().unwrap_or("<input>"),
                            info.line,
                            rendered
                        )
                    };
                    trace.push(entry);
                    BraidError::User {
                        message,
                        file,
                        line,
                        snippet,
                        trace,
                    }
                }
            }
            other => other,
        }
    }

    /// Render the user-visible failure: source pointer, location line, trace.
    pub fn render(&self) -> String {
        match self {
            BraidError::User {
                message,
                file,
                line,
                snippet,
                trace,
            } => {
                let mut out = String::new();
                if let Some(snip) = snippet {
                    out.push_str(snip);
                    out.push('\n');
                    out.push_str("^\n");
                }
                out.push_str(&format!(
                    "-> at ({}:{}) {}",
                    file.as_deref().unwrap_or("<input>"),
                    line,
                    message
                ));
                for entry in trace {
                    out.push('\n');
                    out.push_str(entry);
                }
                out
            }
            BraidError::Compile {
                message,
                file,
                line,
                snippet,
            } => {
                let mut out = String::new();
                if let Some(snip) = snippet {
                    out.push_str(snip);
                    out.push('\n');
                    out.push_str("^\n");
                }
                out.push_str(&format!(
                    "-> at ({}:{}) {}",
                    file.as_deref().unwrap_or("<input>"),
                    line,
                    message
                ));
                out
            }
            other => other.to_string(),
        }
    }
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > 120 {
        let cut: String = line.chars().take(117).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_error_message() {
        let err = BraidError::arity_error("car", ARITY_ONE, 3);
        assert_eq!(err.to_string(), "car: expected 1 argument, got 3");
    }

    #[test]
    fn test_annotate_fills_position_then_traces() {
        let info = SourceInfo {
            file: Some("demo.tl".into()),
            line: 3,
            offset: 0,
            text: Some("(car nil)".into()),
            function: None,
        };
        let err = BraidError::user("boom").annotate(&info);
        match &err {
            BraidError::User { line, trace, .. } => {
                assert_eq!(*line, 3);
                assert!(trace.is_empty());
            }
            _ => panic!("expected user error"),
        }

        let outer = SourceInfo {
            file: Some("demo.tl".into()),
            line: 9,
            offset: 0,
            text: Some("(outer)".into()),
            function: None,
        };
        let err = err.annotate(&outer);
        match &err {
            BraidError::User { trace, .. } => {
                assert_eq!(trace.len(), 1);
                assert!(trace[0].contains("demo.tl:9"));
            }
            _ => panic!("expected user error"),
        }
    }

    #[test]
    fn test_duplicate_snippet_collapses() {
        let info = SourceInfo {
            file: Some("x.tl".into()),
            line: 1,
            offset: 0,
            text: Some("(f)".into()),
            function: None,
        };
        let err = BraidError::user("e").annotate(&info).annotate(&info);
        match &err {
            BraidError::User { trace, .. } => {
                assert!(trace[0].ends_with(':'));
            }
            _ => panic!("expected user error"),
        }
    }

    #[test]
    fn test_render_contains_location() {
        let info = SourceInfo {
            file: Some("m.tl".into()),
            line: 7,
            offset: 0,
            text: Some("(bad form)".into()),
            function: None,
        };
        let rendered = BraidError::user("no such thing").annotate(&info).render();
        assert!(rendered.contains("(m.tl:7)"));
        assert!(rendered.contains("no such thing"));
        assert!(rendered.contains("(bad form)"));
    }
}
