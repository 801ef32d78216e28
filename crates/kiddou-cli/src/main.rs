use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::{env, fs};

use kiddou::{Kiddou, StdPrint};

const EXIT_USAGE: u8 = 64;
const EXIT_COMPILE_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 75;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        0 | 1 => run_prompt(),
        2 => run_file(&args[1]),
        _ => {
            eprintln!("Usage: kiddou [path]");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

/// Runs a Kiddou program from a file.
fn run_file(path: &str) -> ExitCode {
    let source = match read_file(path) {
        Ok(source) => source,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let mut kiddou = Kiddou::new();
    let mut output = StdPrint::new();
    kiddou.run(&source, &mut output);

    if kiddou.has_error() {
        kiddou.flush_errors();
        return ExitCode::from(EXIT_COMPILE_ERROR);
    }
    if kiddou.had_runtime_error() {
        return ExitCode::from(EXIT_RUNTIME_ERROR);
    }
    ExitCode::SUCCESS
}

/// Runs Kiddou line-by-line as a REPL.
///
/// Bindings persist across lines; errors of either tier are reported after
/// each line and the session continues. EOF ends the session.
fn run_prompt() -> ExitCode {
    let mut kiddou = Kiddou::new();
    let mut output = StdPrint::new();
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => {
                println!("\nExiting.");
                return ExitCode::SUCCESS;
            }
            Ok(_) => {}
        }

        kiddou.run(&line, &mut output);
        kiddou.flush_errors();
    }
}

fn read_file(path: &str) -> Result<String, String> {
    match fs::metadata(path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("Error: {path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("Error reading {path}: {err}"));
        }
    }
    fs::read_to_string(path).map_err(|err| format!("Error reading file: {err}"))
}
