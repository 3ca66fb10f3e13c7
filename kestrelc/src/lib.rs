//! kestrelc - code generation for Kestrel
//!
//! Turns a parsed Kestrel program into an LLVM-style IR module, renders it
//! as LLVM assembly text, and (with the `cranelift-backend` feature)
//! compiles it to native code for object emission or in-process execution.

#![warn(missing_docs)]

pub mod backend;
pub mod codegen;
pub mod ir;
pub mod repl;

use std::path::Path;

use kestrel::parser::ast::Program;
use kestrel::ParseError;
use thiserror::Error;
use tracing::info;

/// kestrelc version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main compiler interface
#[derive(Debug, Clone)]
pub struct Compiler {
    /// Run the IR verifier on every generated function
    pub verify: bool,
}

impl Compiler {
    /// Create a new compiler with default settings
    pub fn new() -> Self {
        Self {
            verify: true,
        }
    }

    /// Compile Kestrel source text into IR.
    pub fn compile_source(&self, source: &str, module_name: &str) -> Result<ir::Module, CompileError> {
        let program = kestrel::parse_source(source)
            .into_result()
            .map_err(CompileError::Frontend)?;
        self.compile_program(&program, module_name)
    }

    /// Read and compile a source file; the module is named after the file.
    pub fn compile_file(&self, path: &Path) -> Result<ir::Module, CompileError> {
        let source = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let module_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("main");
        self.compile_source(&source, module_name)
    }

    /// Compile a parsed program into IR.
    pub fn compile_program(
        &self,
        program: &Program,
        module_name: &str,
    ) -> Result<ir::Module, CompileError> {
        let mut generator = codegen::CodeGenerator::new(module_name);
        generator.verify = self.verify;
        let module = generator.generate(program)?;
        info!(
            module = module_name,
            functions = module.functions.len(),
            globals = module.globals.len(),
            "generated module"
        );
        Ok(module)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compilation errors
#[derive(Debug, Error)]
pub enum CompileError {
    /// Every lexical and syntax diagnostic of the input
    #[error("{}", render_diagnostics(.0))]
    Frontend(Vec<ParseError>),
    /// Semantic error during code generation
    #[error("codegen error: {0}")]
    Codegen(#[from] codegen::CodegenError),
    /// IR validation failed
    #[error("invalid IR: {0}")]
    InvalidIr(String),
    /// Backend error
    #[error("backend error: {0}")]
    Backend(String),
    /// Source file could not be read
    #[error("failed to read '{path}': {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        source: std::io::Error,
    },
}

fn render_diagnostics(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|err| err.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_creation() {
        let compiler = Compiler::new();
        assert!(compiler.verify);
    }

    #[test]
    fn frontend_errors_are_listed_one_per_line() {
        let err = Compiler::new()
            .compile_source("func f( {}\n@", "bad")
            .unwrap_err();
        let CompileError::Frontend(errors) = &err else {
            panic!("expected frontend error, got {:?}", err);
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(err.to_string().lines().count(), 2);
    }
}
