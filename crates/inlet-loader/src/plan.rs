//! The binding plan for one compiled artifact.

use inlet_types::{Accessor, CompiledArtifact, ImportRequirement, SymbolKind};
use serde::Serialize;

/// One export bound into the environment under its export name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub name: String,
    pub kind: SymbolKind,
}

/// What the glue for one artifact binds. Borrows the artifact.
#[derive(Debug, Clone)]
pub struct LoaderPlan<'a> {
    artifact: &'a CompiledArtifact,
    /// Registry key and report label.
    pub module_name: String,
    pub bindings: Vec<Binding>,
}

impl<'a> LoaderPlan<'a> {
    /// Plan the bindings for `artifact`, one per export in module order.
    pub fn from_artifact(artifact: &'a CompiledArtifact) -> Self {
        let bindings = artifact
            .exports
            .iter()
            .map(|e| Binding {
                name: e.name.clone(),
                kind: e.kind,
            })
            .collect();
        Self {
            artifact,
            module_name: "module".to_string(),
            bindings,
        }
    }

    /// Set the registry key.
    pub fn named(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = module_name.into();
        self
    }

    pub fn artifact(&self) -> &'a CompiledArtifact {
        self.artifact
    }

    pub fn accessors(&self) -> &'a [Accessor] {
        &self.artifact.accessors
    }

    pub fn imports(&self) -> &'a [ImportRequirement] {
        &self.artifact.imports
    }

    /// Look up a binding by export name.
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}
