//! Type table and value-type lowering.
//!
//! Declared types keep their declaration order, so type index `N` in the
//! module text is type index `N` in the binary. Function signatures written
//! inline (`(param …) (result …)` without `(type $t)`) are interned after the
//! declared types: an identical existing function type is reused, otherwise a
//! new one is appended.

use inlet_types::ast;
use wasm_encoder::{
    AbstractHeapType, FieldType, HeapType, RefType, StorageType, TypeSection, ValType,
};

use crate::error::CodegenResult;

/// Custom section name for compiler metadata.
pub const CUSTOM_SECTION_NAME: &str = "inlet";
/// Compiler version embedded in the custom section.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A lowered struct field or array element.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: Option<String>,
    pub storage: StorageType,
    pub mutable: bool,
}

impl FieldInfo {
    pub fn is_packed(&self) -> bool {
        matches!(self.storage, StorageType::I8 | StorageType::I16)
    }

    /// The type a read produces on the operand stack (packed → `i32`).
    pub fn unpacked(&self) -> ValType {
        match self.storage {
            StorageType::Val(v) => v,
            StorageType::I8 | StorageType::I16 => ValType::I32,
        }
    }
}

/// A lowered type definition.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeEntry {
    Func {
        params: Vec<ValType>,
        results: Vec<ValType>,
    },
    Struct(Vec<FieldInfo>),
    Array(FieldInfo),
}

impl TypeEntry {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeEntry::Func { .. } => "func",
            TypeEntry::Struct(_) => "struct",
            TypeEntry::Array(_) => "array",
        }
    }

    /// Concrete type indices this definition refers to.
    pub fn referenced_types(&self) -> Vec<u32> {
        let vals: Vec<ValType> = match self {
            TypeEntry::Func { params, results } => {
                params.iter().chain(results.iter()).copied().collect()
            }
            TypeEntry::Struct(fields) => fields.iter().map(FieldInfo::unpacked).collect(),
            TypeEntry::Array(elem) => vec![elem.unpacked()],
        };
        vals.into_iter().filter_map(concrete_index).collect()
    }
}

/// The concrete type index behind a reference type, if any.
pub fn concrete_index(ty: ValType) -> Option<u32> {
    match ty {
        ValType::Ref(RefType {
            heap_type: HeapType::Concrete(idx),
            ..
        }) => Some(idx),
        _ => None,
    }
}

/// All type definitions of a module in index order.
#[derive(Debug, Default)]
pub struct TypeTable {
    entries: Vec<(Option<String>, TypeEntry)>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a declared type; returns its index.
    pub fn push(&mut self, name: Option<String>, entry: TypeEntry) -> u32 {
        self.entries.push((name, entry));
        (self.entries.len() - 1) as u32
    }

    /// Index of a function type with this signature, appending one if needed.
    pub fn intern_func(&mut self, params: Vec<ValType>, results: Vec<ValType>) -> u32 {
        let wanted = TypeEntry::Func { params, results };
        if let Some(idx) = self.entries.iter().position(|(_, e)| *e == wanted) {
            return idx as u32;
        }
        self.push(None, wanted)
    }

    pub fn get(&self, idx: u32) -> Option<&TypeEntry> {
        self.entries.get(idx as usize).map(|(_, e)| e)
    }

    /// Display name used for diagnostics and accessor exports.
    pub fn display_name(&self, idx: u32) -> String {
        match self.entries.get(idx as usize) {
            Some((Some(name), _)) => name.clone(),
            _ => format!("type{idx}"),
        }
    }

    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode the type section.
    pub fn encode(&self) -> TypeSection {
        let mut types = TypeSection::new();
        for (_, entry) in &self.entries {
            match entry {
                TypeEntry::Func { params, results } => {
                    types
                        .ty()
                        .function(params.iter().copied(), results.iter().copied());
                }
                TypeEntry::Struct(fields) => {
                    let fields: Vec<FieldType> = fields
                        .iter()
                        .map(|f| FieldType {
                            element_type: f.storage,
                            mutable: f.mutable,
                        })
                        .collect();
                    types.ty().struct_(fields);
                }
                TypeEntry::Array(elem) => {
                    types.ty().array(&elem.storage, elem.mutable);
                }
            }
        }
        types
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Lowering
// ══════════════════════════════════════════════════════════════════════════════

fn abstract_heap(ty: AbstractHeapType) -> HeapType {
    HeapType::Abstract { shared: false, ty }
}

/// Lower a heap type, resolving type indices through `resolve`.
pub fn lower_heap_type(
    heap: &ast::HeapType,
    resolve: &mut dyn FnMut(&ast::Index) -> CodegenResult<u32>,
) -> CodegenResult<HeapType> {
    Ok(match heap {
        ast::HeapType::Func => abstract_heap(AbstractHeapType::Func),
        ast::HeapType::Extern => abstract_heap(AbstractHeapType::Extern),
        ast::HeapType::Any => abstract_heap(AbstractHeapType::Any),
        ast::HeapType::Eq => abstract_heap(AbstractHeapType::Eq),
        ast::HeapType::I31 => abstract_heap(AbstractHeapType::I31),
        ast::HeapType::Struct => abstract_heap(AbstractHeapType::Struct),
        ast::HeapType::Array => abstract_heap(AbstractHeapType::Array),
        ast::HeapType::None => abstract_heap(AbstractHeapType::None),
        ast::HeapType::NoFunc => abstract_heap(AbstractHeapType::NoFunc),
        ast::HeapType::NoExtern => abstract_heap(AbstractHeapType::NoExtern),
        ast::HeapType::Index(index) => HeapType::Concrete(resolve(index)?),
    })
}

/// Lower a value type.
pub fn lower_val_type(
    ty: &ast::ValType,
    resolve: &mut dyn FnMut(&ast::Index) -> CodegenResult<u32>,
) -> CodegenResult<ValType> {
    Ok(match ty {
        ast::ValType::I32 => ValType::I32,
        ast::ValType::I64 => ValType::I64,
        ast::ValType::F32 => ValType::F32,
        ast::ValType::F64 => ValType::F64,
        ast::ValType::Ref(r) => ValType::Ref(RefType {
            nullable: r.nullable,
            heap_type: lower_heap_type(&r.heap, resolve)?,
        }),
    })
}

/// Lower a storage type.
pub fn lower_storage_type(
    ty: &ast::StorageType,
    resolve: &mut dyn FnMut(&ast::Index) -> CodegenResult<u32>,
) -> CodegenResult<StorageType> {
    Ok(match ty {
        ast::StorageType::I8 => StorageType::I8,
        ast::StorageType::I16 => StorageType::I16,
        ast::StorageType::Val(v) => StorageType::Val(lower_val_type(v, resolve)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_reuses_identical_signature() {
        let mut table = TypeTable::new();
        let a = table.intern_func(vec![ValType::I32, ValType::I32], vec![ValType::I32]);
        let b = table.intern_func(vec![ValType::I32, ValType::I32], vec![ValType::I32]);
        let c = table.intern_func(vec![], vec![]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_intern_does_not_match_struct() {
        let mut table = TypeTable::new();
        table.push(Some("Empty".into()), TypeEntry::Struct(vec![]));
        let f = table.intern_func(vec![], vec![]);
        assert_eq!(f, 1);
    }

    #[test]
    fn test_display_name_falls_back_to_index() {
        let mut table = TypeTable::new();
        table.push(Some("Point".into()), TypeEntry::Struct(vec![]));
        table.push(None, TypeEntry::Struct(vec![]));
        assert_eq!(table.display_name(0), "Point");
        assert_eq!(table.display_name(1), "type1");
    }

    #[test]
    fn test_packed_field_reads_as_i32() {
        let field = FieldInfo {
            name: None,
            storage: StorageType::I8,
            mutable: true,
        };
        assert!(field.is_packed());
        assert_eq!(field.unpacked(), ValType::I32);
    }
}
