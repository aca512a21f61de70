//! GC accessor synthesis.
//!
//! Struct and array values cross the host boundary as opaque references. For
//! every GC type reachable from the export surface the compiler appends small
//! exported functions that read and write through the reference:
//!
//! | Type   | Export                  | Signature                        |
//! |--------|-------------------------|----------------------------------|
//! | struct | `<Type>_get_<field>`    | `(ref null T) → field`           |
//! | struct | `<Type>_set_<field>`    | `(ref null T, field) → ()`       |
//! | array  | `<Type>_len`            | `(ref null T) → i32`             |
//! | array  | `<Type>_get`            | `(ref null T, i32) → elem`       |
//! | array  | `<Type>_set`            | `(ref null T, i32, elem) → ()`   |
//!
//! Setters exist only for mutable fields/elements. Packed (`i8`/`i16`) reads
//! zero-extend. An existing export with the same name suppresses the
//! accessor.

use std::collections::{BTreeSet, HashSet};

use inlet_types::{Accessor, AccessorOp};
use wasm_encoder::{HeapType, Instruction, RefType, ValType};

use crate::types::{FieldInfo, TypeEntry, TypeTable};

/// One synthesized accessor function, ready to encode.
#[derive(Debug, Clone)]
pub struct AccessorFunc {
    pub accessor: Accessor,
    /// Function type index (interned).
    pub type_index: u32,
    /// Body without the trailing `end`.
    pub body: Vec<Instruction<'static>>,
}

/// GC types reachable from `roots`, following struct fields, array elements
/// and function signatures. Returned in ascending index order.
pub fn reachable_types(roots: impl IntoIterator<Item = u32>, types: &TypeTable) -> Vec<u32> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<u32> = roots.into_iter().collect();
    while let Some(idx) = stack.pop() {
        if !seen.insert(idx) {
            continue;
        }
        if let Some(entry) = types.get(idx) {
            stack.extend(entry.referenced_types());
        }
    }
    seen.into_iter()
        .filter(|idx| matches!(types.get(*idx), Some(TypeEntry::Struct(_) | TypeEntry::Array(_))))
        .collect()
}

fn nullable_ref(type_index: u32) -> ValType {
    ValType::Ref(RefType {
        nullable: true,
        heap_type: HeapType::Concrete(type_index),
    })
}

/// Synthesize accessors for the GC types reachable from `roots`.
///
/// `taken` holds export names already in use; synthesized names are added to
/// it as they are claimed.
pub fn synthesize(
    types: &mut TypeTable,
    roots: impl IntoIterator<Item = u32>,
    taken: &mut HashSet<String>,
) -> Vec<AccessorFunc> {
    let mut out = Vec::new();
    for idx in reachable_types(roots, types) {
        let type_name = types.display_name(idx);
        match types.get(idx).cloned() {
            Some(TypeEntry::Struct(fields)) => {
                for (field_index, field) in fields.iter().enumerate() {
                    struct_accessors(
                        types,
                        &mut out,
                        taken,
                        idx,
                        &type_name,
                        field_index as u32,
                        field,
                    );
                }
            }
            Some(TypeEntry::Array(elem)) => {
                array_accessors(types, &mut out, taken, idx, &type_name, &elem);
            }
            _ => {}
        }
    }
    out
}

/// Claim `name` unless an export already uses it.
fn claim(taken: &mut HashSet<String>, name: &str) -> bool {
    if taken.contains(name) {
        tracing::debug!(export = name, "user export shadows synthesized accessor");
        return false;
    }
    taken.insert(name.to_string());
    true
}

fn struct_accessors(
    types: &mut TypeTable,
    out: &mut Vec<AccessorFunc>,
    taken: &mut HashSet<String>,
    struct_type_index: u32,
    type_name: &str,
    field_index: u32,
    field: &FieldInfo,
) {
    let field_name = field
        .name
        .clone()
        .unwrap_or_else(|| field_index.to_string());
    let value = field.unpacked();

    let getter = format!("{type_name}_get_{field_name}");
    if claim(taken, &getter) {
        let get = if field.is_packed() {
            Instruction::StructGetU {
                struct_type_index,
                field_index,
            }
        } else {
            Instruction::StructGet {
                struct_type_index,
                field_index,
            }
        };
        out.push(AccessorFunc {
            accessor: Accessor {
                export_name: getter,
                type_name: type_name.to_string(),
                field: Some(field_name.clone()),
                op: AccessorOp::Get,
            },
            type_index: types.intern_func(vec![nullable_ref(struct_type_index)], vec![value]),
            body: vec![Instruction::LocalGet(0), get],
        });
    }

    if !field.mutable {
        return;
    }
    let setter = format!("{type_name}_set_{field_name}");
    if claim(taken, &setter) {
        out.push(AccessorFunc {
            accessor: Accessor {
                export_name: setter,
                type_name: type_name.to_string(),
                field: Some(field_name),
                op: AccessorOp::Set,
            },
            type_index: types.intern_func(vec![nullable_ref(struct_type_index), value], vec![]),
            body: vec![
                Instruction::LocalGet(0),
                Instruction::LocalGet(1),
                Instruction::StructSet {
                    struct_type_index,
                    field_index,
                },
            ],
        });
    }
}

fn array_accessors(
    types: &mut TypeTable,
    out: &mut Vec<AccessorFunc>,
    taken: &mut HashSet<String>,
    array_type_index: u32,
    type_name: &str,
    elem: &FieldInfo,
) {
    let value = elem.unpacked();
    let this = nullable_ref(array_type_index);

    let len = format!("{type_name}_len");
    if claim(taken, &len) {
        out.push(AccessorFunc {
            accessor: Accessor {
                export_name: len,
                type_name: type_name.to_string(),
                field: None,
                op: AccessorOp::Len,
            },
            type_index: types.intern_func(vec![this], vec![ValType::I32]),
            body: vec![Instruction::LocalGet(0), Instruction::ArrayLen],
        });
    }

    let getter = format!("{type_name}_get");
    if claim(taken, &getter) {
        let get = if elem.is_packed() {
            Instruction::ArrayGetU(array_type_index)
        } else {
            Instruction::ArrayGet(array_type_index)
        };
        out.push(AccessorFunc {
            accessor: Accessor {
                export_name: getter,
                type_name: type_name.to_string(),
                field: None,
                op: AccessorOp::Get,
            },
            type_index: types.intern_func(vec![this, ValType::I32], vec![value]),
            body: vec![Instruction::LocalGet(0), Instruction::LocalGet(1), get],
        });
    }

    if !elem.mutable {
        return;
    }
    let setter = format!("{type_name}_set");
    if claim(taken, &setter) {
        out.push(AccessorFunc {
            accessor: Accessor {
                export_name: setter,
                type_name: type_name.to_string(),
                field: None,
                op: AccessorOp::Set,
            },
            type_index: types.intern_func(vec![this, ValType::I32, value], vec![]),
            body: vec![
                Instruction::LocalGet(0),
                Instruction::LocalGet(1),
                Instruction::LocalGet(2),
                Instruction::ArraySet(array_type_index),
            ],
        });
    }
}
