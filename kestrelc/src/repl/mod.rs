//! Interactive session: functions are entered one input at a time and the
//! session module is recompiled after each accepted input.

pub mod highlighter;

use std::borrow::Cow;
use std::io::{self, IsTerminal, Write};

use anyhow::Result;
use kestrel::parser::ast::{FunctionDecl, Program};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Context, Editor, Helper};
use tracing::debug;

use crate::ir::Module;
use crate::{CompileError, Compiler};

const MODULE_NAME: &str = "<repl>";

/// Accepted functions of a REPL session.
#[derive(Debug, Default)]
pub struct Session {
    functions: Vec<FunctionDecl>,
    compiler: Compiler,
}

impl Session {
    /// Empty session with default compiler options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `input` and compile it together with the functions accepted so
    /// far. A function whose name is already defined replaces the earlier
    /// definition. On success the new functions are kept and their IR is
    /// returned; on failure the session is unchanged.
    pub fn submit(&mut self, input: &str) -> Result<String, CompileError> {
        let program = kestrel::parse_source(input)
            .into_result()
            .map_err(CompileError::Frontend)?;

        let mut functions = self
            .functions
            .iter()
            .filter(|existing| program.functions.iter().all(|f| f.name != existing.name))
            .cloned()
            .collect::<Vec<_>>();
        functions.extend(program.functions.iter().cloned());

        let candidate = Program { functions };
        let module = self.compiler.compile_program(&candidate, MODULE_NAME)?;

        let rendered = program
            .functions
            .iter()
            .filter_map(|function| module.function(&function.name))
            .map(|function| function.to_string())
            .collect::<Vec<_>>()
            .join("\n");

        self.functions = candidate.functions;
        debug!(functions = self.functions.len(), "session updated");
        Ok(rendered)
    }

    /// Compile every accepted function.
    pub fn module(&self) -> Result<Module, CompileError> {
        let program = Program {
            functions: self.functions.clone(),
        };
        self.compiler.compile_program(&program, MODULE_NAME)
    }

    /// Names of the accepted functions, in definition order.
    pub fn function_names(&self) -> Vec<String> {
        self.functions.iter().map(|f| f.name.clone()).collect()
    }

    /// Forget every accepted function.
    pub fn reset(&mut self) {
        self.functions.clear();
    }

    /// JIT-compile the session and run `main`.
    #[cfg(feature = "cranelift-backend")]
    pub fn run_main(&self) -> Result<i64, CompileError> {
        let module = self.module()?;
        crate::backend::cranelift::CraneliftBackend::new()?.run_main(&module)
    }

    /// Native execution needs the cranelift backend.
    #[cfg(not(feature = "cranelift-backend"))]
    pub fn run_main(&self) -> Result<i64, CompileError> {
        Err(CompileError::Backend(
            "kestrelc was built without the cranelift backend".to_string(),
        ))
    }
}

/// Result of a `:` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    /// Not a command; treat the line as source.
    NotHandled,
    /// Command executed.
    Handled,
    /// Leave the REPL.
    Exit,
}

/// Execute a `:` command against the session.
pub fn handle_meta_command(command: &str, session: &mut Session) -> CommandAction {
    if command.is_empty() {
        return CommandAction::NotHandled;
    }
    if command.eq_ignore_ascii_case("exit") || command.eq_ignore_ascii_case("quit") {
        return CommandAction::Exit;
    }
    if !command.starts_with(':') {
        return CommandAction::NotHandled;
    }

    let directive = command.split_whitespace().next().unwrap_or_default();
    match directive {
        ":quit" | ":exit" => return CommandAction::Exit,
        ":help" => {
            println!(":help                   Show this message");
            println!(":ir                     Print the IR of the whole session");
            println!(":run                    Compile the session and run main()");
            println!(":functions              List the defined functions");
            println!(":reset                  Forget every function");
            println!(":quit                   Exit REPL");
        }
        ":ir" => match session.module() {
            Ok(module) => print!("{}", module),
            Err(err) => eprintln!("{}", err),
        },
        ":run" => match session.run_main() {
            Ok(code) => println!("main returned {}", code),
            Err(err) => eprintln!("{}", err),
        },
        ":functions" => {
            for name in session.function_names() {
                println!("{}", name);
            }
        }
        ":reset" => {
            session.reset();
            println!("session cleared");
        }
        other => {
            eprintln!("unknown command '{}'; use :help", other);
        }
    }

    CommandAction::Handled
}

#[derive(Clone, Default)]
struct ReplEditorHelper {
    symbols: Vec<String>,
}

impl Helper for ReplEditorHelper {}

impl Hinter for ReplEditorHelper {
    type Hint = String;
}

impl Validator for ReplEditorHelper {
    fn validate(
        &self,
        context: &mut ValidationContext<'_>,
    ) -> Result<ValidationResult, ReadlineError> {
        if highlighter::needs_more_input(context.input()) {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

impl Highlighter for ReplEditorHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Owned(highlighter::colorize(line))
    }
}

impl Completer for ReplEditorHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> Result<(usize, Vec<Pair>), ReadlineError> {
        let line = &line[..pos.min(line.len())];
        let mut start = line.len();
        for (idx, ch) in line.char_indices().rev() {
            if ch == '_' || ch.is_ascii_alphanumeric() {
                start = idx;
            } else {
                break;
            }
        }

        let prefix = &line[start..];
        if prefix.is_empty() {
            return Ok((start, Vec::new()));
        }

        let pairs = highlighter::complete(prefix, &self.symbols)
            .into_iter()
            .map(|value| Pair {
                display: value.clone(),
                replacement: value,
            })
            .collect();
        Ok((start, pairs))
    }
}

/// Feed one complete input to the session and report the outcome.
fn evaluate(session: &mut Session, input: &str) {
    match session.submit(input) {
        Ok(rendered) if rendered.is_empty() => {}
        Ok(rendered) => println!("{}", rendered),
        Err(CompileError::Frontend(errors)) => eprintln!(
            "{}",
            kestrel::errors::pretty::format_parse_errors(MODULE_NAME, input, &errors)
        ),
        Err(err) => eprintln!("{}", err),
    }
}

/// Run the interactive loop on stdin until `:quit` or end of input.
pub fn run() -> Result<()> {
    let mut session = Session::new();
    let mut buffer = String::new();

    println!("Kestrel REPL {}", crate::VERSION);
    println!("Commands: :help, :ir, :run, :functions, :reset, :quit");

    if io::stdin().is_terminal() {
        let mut editor = Editor::<ReplEditorHelper, DefaultHistory>::new()?;
        editor.set_helper(Some(ReplEditorHelper::default()));

        loop {
            let prompt = if buffer.is_empty() { "kestrel> " } else { "   ...> " };
            let raw_line = match editor.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            };

            if buffer.is_empty() {
                match handle_meta_command(raw_line.trim(), &mut session) {
                    CommandAction::NotHandled => {}
                    CommandAction::Handled => continue,
                    CommandAction::Exit => break,
                }
            }

            if let Some(input) = accumulate(&mut buffer, &raw_line) {
                let _ = editor.add_history_entry(input.as_str());
                evaluate(&mut session, &input);
                if let Some(helper) = editor.helper_mut() {
                    helper.symbols = session.function_names();
                }
            }
        }
    } else {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            if stdin.read_line(&mut line)? == 0 {
                break;
            }

            let raw_line = line.trim_end_matches(['\n', '\r']);
            if buffer.is_empty() {
                match handle_meta_command(raw_line.trim(), &mut session) {
                    CommandAction::NotHandled => {}
                    CommandAction::Handled => {
                        io::stdout().flush()?;
                        continue;
                    }
                    CommandAction::Exit => break,
                }
            }

            if let Some(input) = accumulate(&mut buffer, raw_line) {
                evaluate(&mut session, &input);
            }
        }
    }

    Ok(())
}

/// Append a line to the pending buffer and hand back the whole input once
/// it is complete.
fn accumulate(buffer: &mut String, raw_line: &str) -> Option<String> {
    let normalized = highlighter::normalize_line(raw_line);
    if buffer.is_empty() && normalized.trim().is_empty() {
        return None;
    }

    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(&normalized);

    if highlighter::needs_more_input(buffer) {
        return None;
    }
    Some(std::mem::take(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_until_braces_close() {
        let mut buffer = String::new();
        assert_eq!(accumulate(&mut buffer, "func main() -> int {"), None);
        assert_eq!(accumulate(&mut buffer, "  return 1"), None);
        assert_eq!(
            accumulate(&mut buffer, "}"),
            Some("func main() -> int {\n  return 1\n}".to_string())
        );
        assert!(buffer.is_empty());
        assert_eq!(accumulate(&mut buffer, "   "), None);
    }

    #[test]
    fn commands_are_recognised() {
        let mut session = Session::new();
        assert_eq!(handle_meta_command(":quit", &mut session), CommandAction::Exit);
        assert_eq!(handle_meta_command("func f() {}", &mut session), CommandAction::NotHandled);
        assert_eq!(handle_meta_command(":reset", &mut session), CommandAction::Handled);
    }
}
