//! Inlet code generator: compiles a parsed module AST to a binary module.
//!
//! # Architecture
//!
//! Compilation is a direct structural translation with no optimisation:
//!
//! 1. Register type, function and global names (imports occupy the lowest
//!    indices of each space)
//! 2. Lower GC type definitions; function signatures used inline are interned
//!    after the declared types
//! 3. Lower function bodies and global initialisers
//! 4. Synthesize field accessor exports for GC types reachable from the
//!    export surface (see [`accessors`])
//! 5. Assemble sections and validate with `wasmparser` (GC enabled)
//!
//! Binary input (`\0asm` magic) bypasses steps 1–4; see [`binary`].

pub mod accessors;
pub mod binary;
pub mod compiler;
pub mod error;
pub(crate) mod instr;
pub mod source_map;
pub mod types;

pub use binary::{inspect_binary, BinarySurface};
pub use compiler::{compile, CodegenOutput};
pub use error::{CodegenError, CodegenResult};
pub use source_map::{FuncKind, SourceMap, SourceMapEntry};
