use clap::Parser;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use treelox::{Lox, RunStatus};

/// A tree-walking interpreter for Lox.
#[derive(Parser, Debug)]
#[command(name = "treelox", version, about)]
struct Cli {
    /// Script to run. Starts an interactive prompt when omitted.
    script: Option<PathBuf>,
    /// Print the parsed program as S-expressions instead of running it.
    #[arg(long)]
    ast: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match &cli.script {
        Some(path) => run_file(path, cli.ast),
        None => run_prompt(cli.ast),
    }
}

// Logging stays off unless RUST_LOG asks for it.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn run(lox: &mut Lox, source: &str, ast: bool) -> RunStatus {
    if ast {
        lox.print_ast(source)
    } else {
        lox.run(source)
    }
}

fn run_file(path: &Path, ast: bool) -> ExitCode {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("Could not read {}: {}", path.display(), e);
            return ExitCode::from(66);
        }
    };
    let mut lox = Lox::new();
    match run(&mut lox, &contents, ast) {
        RunStatus::Ok => ExitCode::SUCCESS,
        RunStatus::CompileError => ExitCode::from(65),
        RunStatus::RuntimeError => ExitCode::from(70),
    }
}

fn run_prompt(ast: bool) -> ExitCode {
    let mut lox = Lox::new();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                run(&mut lox, &line, ast);
            }
            Err(e) => {
                eprintln!("Could not read input: {}", e);
                break;
            }
        }
    }
    ExitCode::SUCCESS
}
