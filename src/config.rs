// ABOUTME: Version info, limits, and REPL text for the Braid interpreter

pub const VERSION: &str = "0.4.0";
pub const WELCOME_MESSAGE: &str = "Braid v0.4";
pub const WELCOME_SUBTITLE: &str = "A homoiconic, pattern-matching Lisp";
pub const WELCOME_FOOTER: &str = "Type 'quit' to exit, '\\' alone to enter multi-line mode (end with ;;).";

/// File extension for Braid source files.
pub const SOURCE_EXTENSION: &str = "tl";

/// Maximum evaluator nesting before a stack-overflow error is raised.
pub const MAX_EVAL_DEPTH: usize = 500;

/// Printer truncates nested structures past this depth.
pub const MAX_PRINT_DEPTH: usize = 100;

/// REPL output is truncated past this many characters.
pub const MAX_OUTPUT_CHARS: usize = 50_000;

/// Width at which traced arguments and results are truncated.
pub const TRACE_WIDTH: usize = 60;

/// History file used by the interactive REPL.
pub const HISTORY_FILE: &str = ".braid_history";
