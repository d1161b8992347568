use std::env;
use std::path::PathBuf;
use std::process;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use wonder_core::ErrorKind;
use wonderscript::{Interpreter, LispError};

/// Enable with `RUST_LOG=wonderscript=debug`.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Only initialize if RUST_LOG is set
    if env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn history_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".wonder_history"))
}

/// True when the reader ran out of input inside a form.
fn is_incomplete(err: &LispError) -> bool {
    match err.kind() {
        ErrorKind::Syntax { message, .. } => {
            message.starts_with("Unterminated") || message.starts_with("Unexpected end of input")
        }
        _ => false,
    }
}

fn repl() -> Result<(), ReadlineError> {
    let interp = Interpreter::new();
    let mut rl = DefaultEditor::new()?;
    let history = history_file();
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    println!("WonderScript {}", wonderscript::interpreter::VERSION);
    println!("Type expressions to evaluate, or Ctrl-D to quit");
    println!();

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() {
            format!("{}> ", interp.current_module())
        } else {
            "... ".to_string()
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                if buffer.is_empty() && line.trim().is_empty() {
                    continue;
                }
                buffer.push_str(&line);
                buffer.push('\n');

                // Keep reading lines until the input holds complete forms
                if let Err(e) = interp.read(&buffer, "repl")
                    && is_incomplete(&e)
                {
                    continue;
                }

                let _ = rl.add_history_entry(buffer.trim_end());
                match interp.eval_str(&buffer, "repl") {
                    Ok(result) => println!("{result}"),
                    Err(e) => eprintln!("{}", e.report()),
                }
                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e),
        }
    }

    if let Some(path) = &history {
        let _ = rl.save_history(path);
    }
    Ok(())
}

fn run_file(filename: &str) -> Result<(), LispError> {
    let interp = Interpreter::new();
    let result = interp.load_file(filename)?;
    println!("{result}");
    Ok(())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  ws             Start interactive REPL");
    eprintln!("  ws <file.ws>   Run a WonderScript file");
    eprintln!("  ws --help      Show this help message");
}

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();

    match args.len() {
        1 => {
            if let Err(e) = repl() {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
        2 => {
            let arg = &args[1];
            if arg == "--help" || arg == "-h" {
                print_usage();
            } else if let Err(e) = run_file(arg) {
                eprintln!("{}", e.report());
                process::exit(1);
            }
        }
        _ => {
            eprintln!("Error: Too many arguments");
            print_usage();
            process::exit(1);
        }
    }
}
