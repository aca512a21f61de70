//! Binary module passthrough and validation.
//!
//! Sources that already carry the `\0asm` magic skip the text front end. They
//! are validated with the same feature set as compiled output and their
//! export/import surface is read back from the binary.

use inlet_types::{ExportEntry, ImportRequirement, SymbolKind};
use wasmparser::{
    BinaryReaderError, ExternalKind, Parser, Payload, TypeRef, Validator, WasmFeatures,
};

/// The export and import surface of a validated binary module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinarySurface {
    /// Function and global exports, in module order.
    pub exports: Vec<ExportEntry>,
    /// Function and global imports, in module order.
    pub imports: Vec<ImportRequirement>,
    /// Exports of other kinds (memory, table, tag) that the loader ignores.
    pub skipped_exports: Vec<String>,
}

/// Features enabled for validation: the default set plus GC.
pub fn features() -> WasmFeatures {
    WasmFeatures::default()
        | WasmFeatures::GC
        | WasmFeatures::REFERENCE_TYPES
        | WasmFeatures::FUNCTION_REFERENCES
}

/// Validate a complete binary module.
pub fn validate(bytes: &[u8]) -> Result<(), BinaryReaderError> {
    Validator::new_with_features(features()).validate_all(bytes)?;
    Ok(())
}

/// Validate `bytes` and read back its exports and imports.
pub fn inspect_binary(bytes: &[u8]) -> Result<BinarySurface, BinaryReaderError> {
    validate(bytes)?;

    let mut surface = BinarySurface::default();
    for payload in Parser::new(0).parse_all(bytes) {
        match payload? {
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export?;
                    let kind = match export.kind {
                        ExternalKind::Func => SymbolKind::Function,
                        ExternalKind::Global => SymbolKind::Global,
                        _ => {
                            surface.skipped_exports.push(export.name.to_string());
                            continue;
                        }
                    };
                    surface.exports.push(ExportEntry {
                        name: export.name.to_string(),
                        kind,
                    });
                }
            }
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import?;
                    let kind = match import.ty {
                        TypeRef::Func(_) => SymbolKind::Function,
                        TypeRef::Global(_) => SymbolKind::Global,
                        _ => continue,
                    };
                    surface.imports.push(ImportRequirement {
                        module: import.module.to_string(),
                        name: import.name.to_string(),
                        kind,
                    });
                }
            }
            _ => {}
        }
    }

    tracing::debug!(
        exports = surface.exports.len(),
        imports = surface.imports.len(),
        "binary module inspected"
    );
    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_encoder::{
        CodeSection, ExportKind, ExportSection, Function, FunctionSection, Instruction, Module,
        TypeSection, ValType,
    };

    fn tiny_module() -> Vec<u8> {
        let mut module = Module::new();
        let mut types = TypeSection::new();
        types.ty().function([], [ValType::I32]);
        module.section(&types);
        let mut funcs = FunctionSection::new();
        funcs.function(0);
        module.section(&funcs);
        let mut exports = ExportSection::new();
        exports.export("answer", ExportKind::Func, 0);
        module.section(&exports);
        let mut code = CodeSection::new();
        let mut f = Function::new(vec![]);
        f.instruction(&Instruction::I32Const(42));
        f.instruction(&Instruction::End);
        code.function(&f);
        module.section(&code);
        module.finish()
    }

    #[test]
    fn test_inspect_reads_exports() {
        let surface = inspect_binary(&tiny_module()).unwrap();
        assert_eq!(
            surface.exports,
            vec![ExportEntry {
                name: "answer".into(),
                kind: SymbolKind::Function
            }]
        );
        assert!(surface.imports.is_empty());
    }

    #[test]
    fn test_inspect_rejects_truncated_module() {
        let mut bytes = tiny_module();
        bytes.truncate(bytes.len() - 3);
        assert!(inspect_binary(&bytes).is_err());
    }

    #[test]
    fn test_inspect_rejects_garbage_after_magic() {
        assert!(inspect_binary(b"\0asm\x01\x00\x00\x00\xff\xff").is_err());
    }
}
