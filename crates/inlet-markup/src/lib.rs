//! Inlet markup layer.
//!
//! Two pieces sit in front of the compilers:
//!
//! - [`ScriptTypeRegistry`] answers two separate questions about a script
//!   element: which [`ResolvedKind`](inlet_types::ResolvedKind) it has (for
//!   compiler dispatch), and whether its body must be captured literally
//!   (for the tokenizer). Front ends register the identifiers they claim.
//! - [`Tokenizer`] is a structural markup tokenizer that switches to raw
//!   capture for every claimed script type, so module text containing `<`,
//!   quotes or `&` reaches the compiler byte for byte.

pub mod classify;
pub mod tokenizer;

pub use classify::{ScriptTypeClaim, ScriptTypeRegistry, TextPrefixPolicy};
pub use tokenizer::{
    Attribute, CaptureMode, MarkupNote, MarkupOutput, MarkupToken, ScriptElement, Tokenizer,
};
