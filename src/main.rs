// ABOUTME: Command-line driver: script runner and interactive REPL

use braid::builtins::{register_builtins, register_globals};
use braid::config;
use braid::env::Frame;
use braid::error::BraidError;
use braid::eval;
use braid::highlighter::BraidHelper;
use braid::reader;
use braid::symbol::Symbol;
use braid::value::Value;
use clap::Parser;
use indexmap::IndexMap;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::path::PathBuf;
use std::rc::Rc;

const COLOR_ERROR: &str = "\x1b[31m";
const COLOR_RESET: &str = "\x1b[0m";

/// Braid: a homoiconic, pattern-matching Lisp
#[derive(Parser, Debug)]
#[command(name = "braid")]
#[command(version = config::VERSION)]
#[command(about = "A homoiconic, pattern-matching Lisp with tail calls via recur")]
struct CliArgs {
    /// Script file to run; the REPL starts when omitted
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Pause before starting, for debugger attach
    #[arg(long = "wait", short = 'w')]
    wait: bool,

    /// Arguments passed to the script; -flag tokens become switches
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,
}

fn main() {
    let args = CliArgs::parse();

    if args.wait {
        eprintln!("pid {}: waiting; press Enter to continue", std::process::id());
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
    }

    let env = Frame::global();
    register_builtins(&env);
    register_globals(&env);
    bind_script_args(&env, &args.script_args);

    if let Some(script) = args.script {
        let path = script.to_string_lossy().to_string();
        match eval::load_file(&path, &env) {
            Ok(_) => std::process::exit(0),
            Err(BraidError::Exit(code)) => std::process::exit(code),
            Err(e) => {
                eprintln!("{}{}{}", COLOR_ERROR, e.render(), COLOR_RESET);
                std::process::exit(-1);
            }
        }
    }

    let code = repl(&env);
    std::process::exit(code);
}

/// Expose script arguments: positionals as `*args*`, `-flag` switches (with
/// `-flag:` taking the following token as its value) as `*switches*`.
fn bind_script_args(env: &Rc<Frame>, raw: &[String]) {
    let mut positional = Vec::new();
    let mut switches = IndexMap::new();
    let mut i = 0;
    while i < raw.len() {
        let arg = &raw[i];
        if arg.len() > 1 && arg.starts_with('-') && !arg[1..].starts_with(|c: char| c.is_ascii_digit()) {
            let name = arg.trim_start_matches('-');
            if let Some(name) = name.strip_suffix(':') {
                i += 1;
                let value = raw.get(i).map(|s| Value::str(s)).unwrap_or(Value::Nil);
                switches.insert(Value::keyword(name), value);
            } else {
                switches.insert(Value::keyword(name), Value::Bool(true));
            }
        } else {
            positional.push(Value::str(arg));
        }
        i += 1;
    }
    env.set_local(Symbol::intern("*args*"), Value::vector(positional));
    env.set_local(Symbol::intern("*switches*"), Value::dict(switches));
}

fn repl(env: &Rc<Frame>) -> i32 {
    let rl_config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<BraidHelper, DefaultHistory> = match Editor::with_config(rl_config) {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("failed to initialize the line editor: {}", e);
            return -1;
        }
    };
    rl.set_helper(Some(BraidHelper::new()));
    let _ = rl.load_history(config::HISTORY_FILE);

    println!("{}", config::WELCOME_MESSAGE);
    println!("{}", config::WELCOME_SUBTITLE);
    println!("{}", config::WELCOME_FOOTER);

    let exit_code;
    loop {
        match rl.readline("braid> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "quit" {
                    exit_code = 0;
                    break;
                }
                // A lone backslash enters multi-line input, ended by ;;
                let source = if trimmed == "\\" {
                    match read_multiline(&mut rl) {
                        Some(text) => text,
                        None => continue,
                    }
                } else {
                    line
                };
                if let Some(code) = run_input(&source, env) {
                    exit_code = code;
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                eval::clear_stop();
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                exit_code = 0;
                break;
            }
            Err(e) => {
                eprintln!("input error: {}", e);
                exit_code = -1;
                break;
            }
        }
    }
    let _ = rl.save_history(config::HISTORY_FILE);
    exit_code
}

fn read_multiline(rl: &mut Editor<BraidHelper, DefaultHistory>) -> Option<String> {
    let mut lines = Vec::new();
    loop {
        match rl.readline("..... ") {
            Ok(line) => {
                if line.trim() == ";;" {
                    return Some(lines.join("\n"));
                }
                lines.push(line);
            }
            Err(_) => return None,
        }
    }
}

/// Evaluate one REPL submission and print its result. Returns an exit code
/// when the evaluation requested one.
fn run_input(source: &str, env: &Rc<Frame>) -> Option<i32> {
    // Bare tokens auto-wrap in parens: `+ 1 2` reads as `(+ 1 2)`.
    let wrapped;
    let text: &str = match reader::read_program(source, None, None) {
        Ok(forms) if forms.len() > 1 && !source.trim_start().starts_with('(') => {
            wrapped = format!("({})", source.trim());
            &wrapped
        }
        _ => source,
    };

    match eval::eval_source(text, None, env) {
        Ok(value) => {
            let rendered = value.to_string();
            let rendered = if rendered.chars().count() > config::MAX_OUTPUT_CHARS {
                let mut cut: String = rendered.chars().take(config::MAX_OUTPUT_CHARS).collect();
                cut.push_str("...");
                cut
            } else {
                rendered
            };
            println!("=> {}", BraidHelper::highlight_output(&rendered));
            None
        }
        Err(BraidError::Exit(code)) => Some(code),
        Err(BraidError::Incomplete(message)) => {
            eprintln!("{}parse error: {}{}", COLOR_ERROR, message, COLOR_RESET);
            None
        }
        Err(e) => {
            eval::clear_stop();
            eprintln!("{}{}{}", COLOR_ERROR, e.render(), COLOR_RESET);
            None
        }
    }
}
