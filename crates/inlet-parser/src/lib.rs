//! Inlet parser: converts a module-text token stream into an AST.

mod literal;
mod parse_instr;
mod parse_module;
mod parse_type;
mod parser;

pub use parser::{ParseResult, Parser};
