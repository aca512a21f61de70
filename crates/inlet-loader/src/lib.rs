//! Inlet loader: turns a [`CompiledArtifact`](inlet_types::CompiledArtifact)
//! into glue code for the host scripting environment.
//!
//! [`LoaderPlan`] is the explicit name → binding mapping for one artifact;
//! [`render_glue`] renders it as a self-contained script that instantiates
//! the module asynchronously, records its exports in a process-wide registry
//! and (optionally) exposes them as globals. Instantiation failures are
//! caught inside the glue and reported, never thrown.

mod glue;
mod js;
mod plan;

pub use glue::{render_glue, GlueOptions};
pub use js::{byte_array_literal, js_string};
pub use plan::{Binding, LoaderPlan};
