//! Code generation orchestration
//!
//! Generation runs in two passes over a parsed program:
//! 1. every function signature is recorded, so bodies may call functions
//!    defined later in the file (including mutual recursion);
//! 2. each body is lowered into basic blocks by [`lowering`].
//!
//! Runtime helpers are appended after the user functions, and only the
//! ones the program actually uses are added.

pub mod builtins;
mod coerce;
pub mod interner;
pub mod lowering;
pub mod scope;

use std::collections::HashMap;

use kestrel::parser::ast::{Program, TypeName};
use thiserror::Error;
use tracing::debug;

use crate::ir::{Module, Type, VerifyError};
use builtins::{Builtin, RuntimeUsage};
use interner::StringInterner;

/// Semantic errors raised while lowering. The first one aborts generation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("undefined function: {0}")]
    UndefinedFunction(String),
    #[error("cannot assign to {0}: not a variable")]
    NotAssignable(String),
    #[error("{name} expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("cannot convert {from} to {to}")]
    CannotConvert { from: Type, to: Type },
    #[error("operator '{op}' cannot be applied to {lhs} and {rhs}")]
    InvalidOperands {
        op: &'static str,
        lhs: Type,
        rhs: Type,
    },
    #[error("cannot infer type for variable {0} without initialization")]
    MissingInitializer(String),
    #[error("printf requires a format string")]
    MissingFormat,
    #[error("printf format must be a string, got {0}")]
    FormatNotString(Type),
    #[error("integer literal {0} does not fit in 32 bits")]
    IntegerOutOfRange(i64),
    #[error("function {0} is defined more than once")]
    DuplicateFunction(String),
    #[error("{0} is a built-in function and cannot be redefined")]
    ReservedName(String),
    #[error("invalid IR: {0}")]
    InvalidIr(#[from] VerifyError),
}

/// Parameter and return types of a user function.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
}

/// Name → signature for every user function in the program.
pub type SignatureTable = HashMap<String, Signature>;

/// Map a source-level type keyword to its IR type.
pub fn lower_type(ty: TypeName) -> Type {
    match ty {
        TypeName::Int => Type::Int32,
        TypeName::Float => Type::Float32,
        TypeName::Bool => Type::Bool1,
        TypeName::String => Type::StringPtr,
        TypeName::Void => Type::Void,
    }
}

/// Main codegen entry point.
pub struct CodeGenerator {
    module_name: String,
    /// Run the IR verifier on each lowered function.
    pub verify: bool,
}

impl CodeGenerator {
    /// Create a new code generator.
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            verify: true,
        }
    }

    /// Lower a whole program into a module.
    pub fn generate(&self, program: &Program) -> Result<Module, CodegenError> {
        let signatures = declare_signatures(program)?;

        let mut module = Module::new(self.module_name.clone());
        let mut interner = StringInterner::new();
        let mut runtime = RuntimeUsage::default();

        for decl in &program.functions {
            let function =
                lowering::lower_function(decl, &signatures, &mut interner, &mut runtime)?;
            if self.verify {
                function.verify()?;
            }
            debug!(
                function = %function.name,
                blocks = function.blocks.len(),
                "lowered function"
            );
            module.functions.push(function);
        }

        builtins::emit_runtime(&mut module, &mut interner, &runtime);
        module.globals = interner.into_globals();
        Ok(module)
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new("main")
    }
}

/// Pass 1: record every signature before any body is lowered.
fn declare_signatures(program: &Program) -> Result<SignatureTable, CodegenError> {
    let mut signatures = SignatureTable::new();
    for decl in &program.functions {
        if Builtin::from_name(&decl.name).is_some() {
            return Err(CodegenError::ReservedName(decl.name.clone()));
        }
        let signature = Signature {
            params: decl.params.iter().map(|param| lower_type(param.ty)).collect(),
            ret: lower_type(decl.return_type),
        };
        if signatures.insert(decl.name.clone(), signature).is_some() {
            return Err(CodegenError::DuplicateFunction(decl.name.clone()));
        }
    }
    Ok(signatures)
}
