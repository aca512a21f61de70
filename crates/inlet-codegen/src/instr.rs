//! Instruction lowering.
//!
//! Resolves symbolic operands (locals, labels, functions, globals, types and
//! fields) against the module scope and emits binary instructions in order.

use std::collections::HashMap;

use inlet_types::ast::{BlockType, Extension, Ident, Index, Instr, InstrKind, Local, NumericOp};
use inlet_types::Span;
use wasm_encoder::{BlockType as WasmBlockType, Instruction};

use crate::compiler::Scope;
use crate::error::{CodegenError, CodegenResult};

macro_rules! lower_numeric {
    ($($variant:ident => $text:literal,)*) => {
        /// The binary instruction for an operand-free numeric operator.
        fn numeric_instruction(op: NumericOp) -> Instruction<'static> {
            match op {
                $(NumericOp::$variant => Instruction::$variant,)*
            }
        }
    };
}

inlet_types::for_each_numeric_op!(lower_numeric);

/// Lowering state for one function body or constant expression.
pub(crate) struct FuncBuilder<'s> {
    scope: &'s mut Scope,
    /// `$name` → local index.
    local_names: HashMap<String, u32>,
    local_count: u32,
    /// Enclosing block labels, innermost last.
    labels: Vec<Option<String>>,
    out: Vec<Instruction<'static>>,
}

impl<'s> FuncBuilder<'s> {
    pub(crate) fn new(scope: &'s mut Scope) -> Self {
        Self {
            scope,
            local_names: HashMap::new(),
            local_count: 0,
            labels: Vec::new(),
            out: Vec::new(),
        }
    }

    /// Declare a parameter or local slot.
    pub(crate) fn declare_local(&mut self, id: Option<&Ident>) -> CodegenResult<()> {
        if let Some(id) = id {
            if self.local_names.contains_key(&id.name) {
                return Err(CodegenError::DuplicateIdentifier {
                    space: "local",
                    name: id.name.clone(),
                    span: id.span,
                });
            }
            self.local_names.insert(id.name.clone(), self.local_count);
        }
        self.local_count += 1;
        Ok(())
    }

    /// Declare the locals of a `(local …)` list.
    pub(crate) fn declare_locals(&mut self, locals: &[Local]) -> CodegenResult<()> {
        for local in locals {
            self.declare_local(local.id.as_ref())?;
        }
        Ok(())
    }

    /// Lower a sequence of instructions.
    pub(crate) fn lower_seq(&mut self, instrs: &[Instr]) -> CodegenResult<()> {
        for instr in instrs {
            self.lower(instr)?;
        }
        Ok(())
    }

    /// The emitted instructions, without the trailing `end`.
    pub(crate) fn finish(self) -> Vec<Instruction<'static>> {
        self.out
    }

    fn emit(&mut self, instr: Instruction<'static>) {
        self.out.push(instr);
    }

    fn resolve_local(&self, index: &Index) -> CodegenResult<u32> {
        match index {
            Index::Num(n, _) if *n < self.local_count => Ok(*n),
            Index::Num(n, span) => Err(CodegenError::UnknownIdentifier {
                space: "local",
                name: n.to_string(),
                span: *span,
            }),
            Index::Id(id) => {
                self.local_names
                    .get(&id.name)
                    .copied()
                    .ok_or_else(|| CodegenError::UnknownIdentifier {
                        space: "local",
                        name: format!("${}", id.name),
                        span: id.span,
                    })
            }
        }
    }

    /// Branch depth for a label reference.
    fn resolve_label(&self, index: &Index) -> CodegenResult<u32> {
        match index {
            // Depth `labels.len()` targets the function body itself.
            Index::Num(n, span) => {
                if (*n as usize) <= self.labels.len() {
                    Ok(*n)
                } else {
                    Err(CodegenError::UnknownLabel {
                        name: n.to_string(),
                        span: *span,
                    })
                }
            }
            Index::Id(id) => self
                .labels
                .iter()
                .rev()
                .position(|l| l.as_deref() == Some(id.name.as_str()))
                .map(|depth| depth as u32)
                .ok_or_else(|| CodegenError::UnknownLabel {
                    name: format!("${}", id.name),
                    span: id.span,
                }),
        }
    }

    fn block_type(&mut self, ty: &BlockType, span: Span) -> CodegenResult<WasmBlockType> {
        Ok(match ty {
            BlockType::Empty => WasmBlockType::Empty,
            BlockType::Value(v) => WasmBlockType::Result(self.scope.lower_val_type(v)?),
            BlockType::Func(type_use) => {
                let (type_index, _) = self.scope.resolve_type_use(type_use, span)?;
                WasmBlockType::FunctionType(type_index)
            }
        })
    }

    fn structured(&mut self, label: &Option<Ident>, body: &[Instr]) -> CodegenResult<()> {
        self.labels.push(label.as_ref().map(|l| l.name.clone()));
        let result = self.lower_seq(body);
        self.labels.pop();
        result
    }

    fn lower(&mut self, instr: &Instr) -> CodegenResult<()> {
        let span = instr.span;
        match &instr.kind {
            // ── Control ──
            InstrKind::Block { label, ty, body } => {
                let bt = self.block_type(ty, span)?;
                self.emit(Instruction::Block(bt));
                self.structured(label, body)?;
                self.emit(Instruction::End);
            }
            InstrKind::Loop { label, ty, body } => {
                let bt = self.block_type(ty, span)?;
                self.emit(Instruction::Loop(bt));
                self.structured(label, body)?;
                self.emit(Instruction::End);
            }
            InstrKind::If {
                label,
                ty,
                then,
                otherwise,
            } => {
                let bt = self.block_type(ty, span)?;
                self.emit(Instruction::If(bt));
                self.structured(label, then)?;
                if !otherwise.is_empty() {
                    self.emit(Instruction::Else);
                    self.structured(label, otherwise)?;
                }
                self.emit(Instruction::End);
            }
            InstrKind::Br(index) => {
                let depth = self.resolve_label(index)?;
                self.emit(Instruction::Br(depth));
            }
            InstrKind::BrIf(index) => {
                let depth = self.resolve_label(index)?;
                self.emit(Instruction::BrIf(depth));
            }
            InstrKind::Return => self.emit(Instruction::Return),
            InstrKind::Call(index) => {
                let func = self.scope.resolve_func(index)?;
                self.emit(Instruction::Call(func));
            }
            InstrKind::Drop => self.emit(Instruction::Drop),
            InstrKind::Select => self.emit(Instruction::Select),
            InstrKind::Nop => self.emit(Instruction::Nop),
            InstrKind::Unreachable => self.emit(Instruction::Unreachable),

            // ── Variables ──
            InstrKind::LocalGet(index) => {
                let local = self.resolve_local(index)?;
                self.emit(Instruction::LocalGet(local));
            }
            InstrKind::LocalSet(index) => {
                let local = self.resolve_local(index)?;
                self.emit(Instruction::LocalSet(local));
            }
            InstrKind::LocalTee(index) => {
                let local = self.resolve_local(index)?;
                self.emit(Instruction::LocalTee(local));
            }
            InstrKind::GlobalGet(index) => {
                let global = self.scope.resolve_global(index)?;
                self.emit(Instruction::GlobalGet(global));
            }
            InstrKind::GlobalSet(index) => {
                let global = self.scope.resolve_global(index)?;
                self.emit(Instruction::GlobalSet(global));
            }

            // ── Constants ──
            InstrKind::I32Const(v) => self.emit(Instruction::I32Const(*v)),
            InstrKind::I64Const(v) => self.emit(Instruction::I64Const(*v)),
            InstrKind::F32Const(bits) => self.emit(Instruction::F32Const(f32::from_bits(*bits))),
            InstrKind::F64Const(bits) => self.emit(Instruction::F64Const(f64::from_bits(*bits))),

            InstrKind::Numeric(op) => self.emit(numeric_instruction(*op)),

            // ── GC structs ──
            InstrKind::StructNew(ty) => {
                let ty = self.scope.resolve_struct(ty)?;
                self.emit(Instruction::StructNew(ty));
            }
            InstrKind::StructNewDefault(ty) => {
                let ty = self.scope.resolve_struct(ty)?;
                self.emit(Instruction::StructNewDefault(ty));
            }
            InstrKind::StructGet { ty, field, ext } => {
                let struct_type_index = self.scope.resolve_struct(ty)?;
                let field_index = self.scope.resolve_field(struct_type_index, field)?;
                self.emit(match ext {
                    None => Instruction::StructGet {
                        struct_type_index,
                        field_index,
                    },
                    Some(Extension::Signed) => Instruction::StructGetS {
                        struct_type_index,
                        field_index,
                    },
                    Some(Extension::Unsigned) => Instruction::StructGetU {
                        struct_type_index,
                        field_index,
                    },
                });
            }
            InstrKind::StructSet { ty, field } => {
                let struct_type_index = self.scope.resolve_struct(ty)?;
                let field_index = self.scope.resolve_field(struct_type_index, field)?;
                self.emit(Instruction::StructSet {
                    struct_type_index,
                    field_index,
                });
            }

            // ── GC arrays ──
            InstrKind::ArrayNew(ty) => {
                let ty = self.scope.resolve_array(ty)?;
                self.emit(Instruction::ArrayNew(ty));
            }
            InstrKind::ArrayNewDefault(ty) => {
                let ty = self.scope.resolve_array(ty)?;
                self.emit(Instruction::ArrayNewDefault(ty));
            }
            InstrKind::ArrayNewFixed(ty, len) => {
                let array_type_index = self.scope.resolve_array(ty)?;
                self.emit(Instruction::ArrayNewFixed {
                    array_type_index,
                    array_size: *len,
                });
            }
            InstrKind::ArrayGet(ty, ext) => {
                let ty = self.scope.resolve_array(ty)?;
                self.emit(match ext {
                    None => Instruction::ArrayGet(ty),
                    Some(Extension::Signed) => Instruction::ArrayGetS(ty),
                    Some(Extension::Unsigned) => Instruction::ArrayGetU(ty),
                });
            }
            InstrKind::ArraySet(ty) => {
                let ty = self.scope.resolve_array(ty)?;
                self.emit(Instruction::ArraySet(ty));
            }
            InstrKind::ArrayLen => self.emit(Instruction::ArrayLen),

            // ── References ──
            InstrKind::RefNull(heap) => {
                let heap = self.scope.lower_heap_type(heap)?;
                self.emit(Instruction::RefNull(heap));
            }
            InstrKind::RefIsNull => self.emit(Instruction::RefIsNull),
            InstrKind::RefAsNonNull => self.emit(Instruction::RefAsNonNull),
            InstrKind::RefEq => self.emit(Instruction::RefEq),
            InstrKind::RefFunc(index) => {
                let func = self.scope.resolve_func(index)?;
                self.scope.declare_func_ref(func);
                self.emit(Instruction::RefFunc(func));
            }
            InstrKind::RefI31 => self.emit(Instruction::RefI31),
            InstrKind::I31Get(Extension::Signed) => self.emit(Instruction::I31GetS),
            InstrKind::I31Get(Extension::Unsigned) => self.emit(Instruction::I31GetU),
        }
        Ok(())
    }
}
