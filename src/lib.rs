pub mod ast;
pub mod callable;
pub mod class;
pub mod environment;
pub mod error;
pub mod instance;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;

use crate::ast::{AstPrinter, ExprIds, Statement};
use crate::callable::standard_natives;
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use std::io::{self, Write};

/// Outcome of running one piece of source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    /// A scan, parse or resolve error. Nothing was executed.
    CompileError,
    RuntimeError,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Ok)
    }
}

/// Scans and parses `source`. Every scan error, or every parse error, is
/// returned together.
pub fn parse_source(source: &str, ids: &mut ExprIds) -> Result<Vec<Statement>, LoxError> {
    let tokens = scanner::scan_tokens(source).map_err(LoxError::Scan)?;
    let (statements, errors) = parser::parse(&tokens, ids);
    if !errors.is_empty() {
        return Err(LoxError::Parse(errors));
    }
    Ok(statements)
}

/// An interpreter session. Globals, functions and resolver annotations
/// persist from one `run` to the next.
pub struct Lox<W: Write = io::Stdout, E: Write = io::Stderr> {
    interpreter: Interpreter<W>,
    ids: ExprIds,
    diagnostics: E,
}

impl Lox<io::Stdout, io::Stderr> {
    pub fn new() -> Self {
        Lox::with_io(io::stdout(), io::stderr())
    }
}

impl Default for Lox<io::Stdout, io::Stderr> {
    fn default() -> Self {
        Lox::new()
    }
}

impl<W: Write, E: Write> Lox<W, E> {
    /// Program output goes to `output`, error reports to `diagnostics`.
    pub fn with_io(output: W, diagnostics: E) -> Self {
        Lox {
            interpreter: Interpreter::new(output, standard_natives()),
            ids: ExprIds::default(),
            diagnostics,
        }
    }
    pub fn run(&mut self, source: &str) -> RunStatus {
        let status = match self.execute(source) {
            Ok(()) => RunStatus::Ok,
            Err(err) => self.fail(err),
        };
        if let Err(e) = self.interpreter.output_mut().flush() {
            tracing::warn!("could not flush output: {}", e);
        }
        status
    }
    /// Parses `source` and writes it back out as S-expressions instead of
    /// running it.
    pub fn print_ast(&mut self, source: &str) -> RunStatus {
        let statements = match parse_source(source, &mut self.ids) {
            Ok(statements) => statements,
            Err(err) => return self.fail(err),
        };
        let rendered = AstPrinter {}.print(&statements);
        let output = self.interpreter.output_mut();
        if let Err(e) = writeln!(output, "{}", rendered).and_then(|_| output.flush()) {
            tracing::warn!("could not write syntax tree: {}", e);
        }
        RunStatus::Ok
    }
    pub fn interpreter(&self) -> &Interpreter<W> {
        &self.interpreter
    }
    pub fn into_parts(self) -> (W, E) {
        (self.interpreter.into_output(), self.diagnostics)
    }
    fn execute(&mut self, source: &str) -> Result<(), LoxError> {
        let statements = parse_source(source, &mut self.ids)?;
        tracing::debug!(statements = statements.len(), "parsed");
        self.interpreter.resolve(&statements)?;
        self.interpreter.interpret(&statements)?;
        Ok(())
    }
    fn fail(&mut self, err: LoxError) -> RunStatus {
        let reported = err
            .report(&mut self.diagnostics)
            .and_then(|_| self.diagnostics.flush());
        if let Err(e) = reported {
            tracing::warn!("could not write diagnostics: {}", e);
        }
        if err.is_runtime() {
            RunStatus::RuntimeError
        } else {
            RunStatus::CompileError
        }
    }
}

#[cfg(test)]
mod lox_tests {
    use crate::{Lox, RunStatus};
    use pretty_assertions::assert_eq;
    use std::io::{self, Write};

    /// Accepts writes but can never flush them.
    struct StuckSink(Vec<u8>);

    impl Write for StuckSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "stuck"))
        }
    }

    fn run(source: &str) -> (RunStatus, String, String) {
        let mut lox = Lox::with_io(Vec::new(), Vec::new());
        let status = lox.run(source);
        let (out, err) = lox.into_parts();
        (
            status,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn success() {
        assert_eq!(run("print 1;"), (RunStatus::Ok, "1\n".to_string(), String::new()));
        assert!(RunStatus::Ok.is_success());
        assert!(!RunStatus::CompileError.is_success());
    }

    #[test]
    fn parse_errors_stop_execution() {
        let (status, out, err) = run("print 1;\nvar = 2;\nprint 3;");
        assert_eq!(status, RunStatus::CompileError);
        assert_eq!(out, "");
        assert_eq!(err, "[line 2] Error at '=': Expect variable name.\n");
    }

    #[test]
    fn ast_mode_does_not_execute() {
        let mut lox = Lox::with_io(Vec::new(), Vec::new());
        assert_eq!(lox.print_ast("print 1 + 2;"), RunStatus::Ok);
        let (out, _) = lox.into_parts();
        assert_eq!(String::from_utf8(out).unwrap(), "(print (+ 1 2))\n");
    }

    #[test]
    fn flush_failure_is_not_a_program_error() {
        let mut lox = Lox::with_io(StuckSink(Vec::new()), Vec::new());
        assert_eq!(lox.run("print 1;"), RunStatus::Ok);
        let (out, err) = lox.into_parts();
        assert_eq!(String::from_utf8(out.0).unwrap(), "1\n");
        assert_eq!(String::from_utf8(err).unwrap(), "");
    }
}
