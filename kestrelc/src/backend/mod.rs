//! Code generation backends
//!
//! Cranelift is the only native backend. The textual LLVM rendering lives
//! in [`crate::ir::printer`] and needs no backend.

#[cfg(feature = "cranelift-backend")]
pub mod cranelift;

pub mod runtime;

use crate::ir::Module;
use crate::CompileError;

/// Code generation backend trait
pub trait Backend {
    /// Generate a relocatable object file from IR
    fn generate(&self, module: &Module) -> Result<Vec<u8>, CompileError>;

    /// Get backend name
    fn name(&self) -> &'static str;
}
