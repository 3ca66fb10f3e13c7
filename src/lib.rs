//! Kestrel front end.
//!
//! Source text is tokenized by [`lexer`], parsed by [`parser`] into the AST
//! in [`parser::ast`], and handed to the `kestrelc` code generator.

pub mod errors;
pub mod lexer;
pub mod parser;

pub use parser::{parse_source, ParseError, Parsed};
