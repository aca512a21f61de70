//! AST node types for the textual module format.
//!
//! Every node carries a [`Span`] for error reporting. Folded instructions are
//! flattened by the parser, so instruction bodies are always in stack order;
//! only structured control (`block`, `loop`, `if`) nests.

use crate::Span;

// ══════════════════════════════════════════════════════════════════════════════
// Top Level
// ══════════════════════════════════════════════════════════════════════════════

/// A complete module: `(module $name? field*)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: Option<Ident>,
    pub fields: Vec<ModuleField>,
    pub span: Span,
}

impl Module {
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.fields.iter().filter_map(|f| match f {
            ModuleField::Type(t) => Some(t),
            _ => None,
        })
    }

    pub fn funcs(&self) -> impl Iterator<Item = &Func> {
        self.fields.iter().filter_map(|f| match f {
            ModuleField::Func(func) => Some(func),
            _ => None,
        })
    }

    pub fn globals(&self) -> impl Iterator<Item = &Global> {
        self.fields.iter().filter_map(|f| match f {
            ModuleField::Global(g) => Some(g),
            _ => None,
        })
    }

    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        self.fields.iter().filter_map(|f| match f {
            ModuleField::Import(i) => Some(i),
            _ => None,
        })
    }

    pub fn exports(&self) -> impl Iterator<Item = &Export> {
        self.fields.iter().filter_map(|f| match f {
            ModuleField::Export(e) => Some(e),
            _ => None,
        })
    }
}

/// One top-level module field.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleField {
    Type(TypeDef),
    Import(Import),
    Func(Func),
    Global(Global),
    Export(Export),
    Start(Index),
}

// ══════════════════════════════════════════════════════════════════════════════
// Identifiers & indices
// ══════════════════════════════════════════════════════════════════════════════

/// A spanned `$identifier` (stored without the leading `$`).
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// A reference to an indexed entity: either numeric or symbolic.
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    Num(u32, Span),
    Id(Ident),
}

impl Index {
    pub fn span(&self) -> Span {
        match self {
            Index::Num(_, span) => *span,
            Index::Id(id) => id.span,
        }
    }
}

impl std::fmt::Display for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Index::Num(n, _) => write!(f, "{n}"),
            Index::Id(id) => write!(f, "${}", id.name),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Types
// ══════════════════════════════════════════════════════════════════════════════

/// `(type $id? composite)`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub id: Option<Ident>,
    pub composite: CompositeType,
    pub span: Span,
}

/// The body of a type definition.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositeType {
    Func(FuncSig),
    Struct(Vec<FieldDef>),
    Array(FieldDef),
}

/// A struct field or array element: `(field $id? (mut? storage))`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub id: Option<Ident>,
    pub storage: StorageType,
    pub mutable: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageType {
    I8,
    I16,
    Val(ValType),
}

impl StorageType {
    pub fn is_packed(&self) -> bool {
        matches!(self, StorageType::I8 | StorageType::I16)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
    Ref(RefType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefType {
    pub nullable: bool,
    pub heap: HeapType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeapType {
    Func,
    Extern,
    Any,
    Eq,
    I31,
    Struct,
    Array,
    None,
    NoFunc,
    NoExtern,
    Index(Index),
}

/// A function signature with optional parameter names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FuncSig {
    pub params: Vec<Local>,
    pub results: Vec<ValType>,
}

impl FuncSig {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.results.is_empty()
    }
}

/// A named or anonymous parameter / local slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub id: Option<Ident>,
    pub ty: ValType,
    pub span: Span,
}

/// `(type $t)? (param ...)* (result ...)*`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeUse {
    pub index: Option<Index>,
    pub inline: FuncSig,
}

// ══════════════════════════════════════════════════════════════════════════════
// Imports, functions, globals, exports
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub desc: ImportDesc,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportDesc {
    Func { id: Option<Ident>, ty: TypeUse },
    Global { id: Option<Ident>, ty: GlobalType },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub id: Option<Ident>,
    /// Inline `(export "name")` abbreviations.
    pub exports: Vec<String>,
    pub ty: TypeUse,
    pub locals: Vec<Local>,
    pub body: Vec<Instr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalType {
    pub val: ValType,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub id: Option<Ident>,
    pub exports: Vec<String>,
    pub ty: GlobalType,
    pub init: Vec<Instr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Global,
}

/// `(export "name" (func $f))`
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
    pub index: Index,
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Instructions
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub kind: InstrKind,
    pub span: Span,
}

impl Instr {
    pub fn new(kind: InstrKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Result type of a structured block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockType {
    Empty,
    Value(ValType),
    Func(TypeUse),
}

/// Sign extension for packed reads (`*_s` / `*_u`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Signed,
    Unsigned,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    // ── Control ──
    Block {
        label: Option<Ident>,
        ty: BlockType,
        body: Vec<Instr>,
    },
    Loop {
        label: Option<Ident>,
        ty: BlockType,
        body: Vec<Instr>,
    },
    If {
        label: Option<Ident>,
        ty: BlockType,
        then: Vec<Instr>,
        otherwise: Vec<Instr>,
    },
    Br(Index),
    BrIf(Index),
    Return,
    Call(Index),
    Drop,
    Select,
    Nop,
    Unreachable,

    // ── Variables ──
    LocalGet(Index),
    LocalSet(Index),
    LocalTee(Index),
    GlobalGet(Index),
    GlobalSet(Index),

    // ── Constants (bit patterns for floats) ──
    I32Const(i32),
    I64Const(i64),
    F32Const(u32),
    F64Const(u64),

    Numeric(NumericOp),

    // ── GC ──
    StructNew(Index),
    StructNewDefault(Index),
    StructGet {
        ty: Index,
        field: Index,
        ext: Option<Extension>,
    },
    StructSet {
        ty: Index,
        field: Index,
    },
    ArrayNew(Index),
    ArrayNewDefault(Index),
    ArrayNewFixed(Index, u32),
    ArrayGet(Index, Option<Extension>),
    ArraySet(Index),
    ArrayLen,

    // ── References ──
    RefNull(HeapType),
    RefIsNull,
    RefAsNonNull,
    RefEq,
    RefFunc(Index),
    RefI31,
    I31Get(Extension),
}

// ══════════════════════════════════════════════════════════════════════════════
// Numeric operators
// ══════════════════════════════════════════════════════════════════════════════

/// Invokes `$mac!` with every operand-free numeric instruction as
/// `Variant => "keyword",`. Variant names match the binary encoder's.
#[macro_export]
macro_rules! for_each_numeric_op {
    ($mac:ident) => {
        $mac! {
            I32Eqz => "i32.eqz", I32Eq => "i32.eq", I32Ne => "i32.ne",
            I32LtS => "i32.lt_s", I32LtU => "i32.lt_u", I32GtS => "i32.gt_s",
            I32GtU => "i32.gt_u", I32LeS => "i32.le_s", I32LeU => "i32.le_u",
            I32GeS => "i32.ge_s", I32GeU => "i32.ge_u",
            I64Eqz => "i64.eqz", I64Eq => "i64.eq", I64Ne => "i64.ne",
            I64LtS => "i64.lt_s", I64LtU => "i64.lt_u", I64GtS => "i64.gt_s",
            I64GtU => "i64.gt_u", I64LeS => "i64.le_s", I64LeU => "i64.le_u",
            I64GeS => "i64.ge_s", I64GeU => "i64.ge_u",
            F32Eq => "f32.eq", F32Ne => "f32.ne", F32Lt => "f32.lt",
            F32Gt => "f32.gt", F32Le => "f32.le", F32Ge => "f32.ge",
            F64Eq => "f64.eq", F64Ne => "f64.ne", F64Lt => "f64.lt",
            F64Gt => "f64.gt", F64Le => "f64.le", F64Ge => "f64.ge",
            I32Clz => "i32.clz", I32Ctz => "i32.ctz", I32Popcnt => "i32.popcnt",
            I32Add => "i32.add", I32Sub => "i32.sub", I32Mul => "i32.mul",
            I32DivS => "i32.div_s", I32DivU => "i32.div_u",
            I32RemS => "i32.rem_s", I32RemU => "i32.rem_u",
            I32And => "i32.and", I32Or => "i32.or", I32Xor => "i32.xor",
            I32Shl => "i32.shl", I32ShrS => "i32.shr_s", I32ShrU => "i32.shr_u",
            I32Rotl => "i32.rotl", I32Rotr => "i32.rotr",
            I64Clz => "i64.clz", I64Ctz => "i64.ctz", I64Popcnt => "i64.popcnt",
            I64Add => "i64.add", I64Sub => "i64.sub", I64Mul => "i64.mul",
            I64DivS => "i64.div_s", I64DivU => "i64.div_u",
            I64RemS => "i64.rem_s", I64RemU => "i64.rem_u",
            I64And => "i64.and", I64Or => "i64.or", I64Xor => "i64.xor",
            I64Shl => "i64.shl", I64ShrS => "i64.shr_s", I64ShrU => "i64.shr_u",
            I64Rotl => "i64.rotl", I64Rotr => "i64.rotr",
            F32Abs => "f32.abs", F32Neg => "f32.neg", F32Ceil => "f32.ceil",
            F32Floor => "f32.floor", F32Trunc => "f32.trunc",
            F32Nearest => "f32.nearest", F32Sqrt => "f32.sqrt",
            F32Add => "f32.add", F32Sub => "f32.sub", F32Mul => "f32.mul",
            F32Div => "f32.div", F32Min => "f32.min", F32Max => "f32.max",
            F32Copysign => "f32.copysign",
            F64Abs => "f64.abs", F64Neg => "f64.neg", F64Ceil => "f64.ceil",
            F64Floor => "f64.floor", F64Trunc => "f64.trunc",
            F64Nearest => "f64.nearest", F64Sqrt => "f64.sqrt",
            F64Add => "f64.add", F64Sub => "f64.sub", F64Mul => "f64.mul",
            F64Div => "f64.div", F64Min => "f64.min", F64Max => "f64.max",
            F64Copysign => "f64.copysign",
            I32WrapI64 => "i32.wrap_i64",
            I32TruncF32S => "i32.trunc_f32_s", I32TruncF32U => "i32.trunc_f32_u",
            I32TruncF64S => "i32.trunc_f64_s", I32TruncF64U => "i32.trunc_f64_u",
            I64ExtendI32S => "i64.extend_i32_s", I64ExtendI32U => "i64.extend_i32_u",
            I64TruncF32S => "i64.trunc_f32_s", I64TruncF32U => "i64.trunc_f32_u",
            I64TruncF64S => "i64.trunc_f64_s", I64TruncF64U => "i64.trunc_f64_u",
            F32ConvertI32S => "f32.convert_i32_s", F32ConvertI32U => "f32.convert_i32_u",
            F32ConvertI64S => "f32.convert_i64_s", F32ConvertI64U => "f32.convert_i64_u",
            F32DemoteF64 => "f32.demote_f64",
            F64ConvertI32S => "f64.convert_i32_s", F64ConvertI32U => "f64.convert_i32_u",
            F64ConvertI64S => "f64.convert_i64_s", F64ConvertI64U => "f64.convert_i64_u",
            F64PromoteF32 => "f64.promote_f32",
            I32ReinterpretF32 => "i32.reinterpret_f32",
            I64ReinterpretF64 => "i64.reinterpret_f64",
            F32ReinterpretI32 => "f32.reinterpret_i32",
            F64ReinterpretI64 => "f64.reinterpret_i64",
            I32Extend8S => "i32.extend8_s", I32Extend16S => "i32.extend16_s",
            I64Extend8S => "i64.extend8_s", I64Extend16S => "i64.extend16_s",
            I64Extend32S => "i64.extend32_s",
            I32TruncSatF32S => "i32.trunc_sat_f32_s", I32TruncSatF32U => "i32.trunc_sat_f32_u",
            I32TruncSatF64S => "i32.trunc_sat_f64_s", I32TruncSatF64U => "i32.trunc_sat_f64_u",
            I64TruncSatF32S => "i64.trunc_sat_f32_s", I64TruncSatF32U => "i64.trunc_sat_f32_u",
            I64TruncSatF64S => "i64.trunc_sat_f64_s", I64TruncSatF64U => "i64.trunc_sat_f64_u",
        }
    };
}

macro_rules! define_numeric_op {
    ($($variant:ident => $text:literal,)*) => {
        /// An operand-free numeric instruction.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NumericOp {
            $($variant,)*
        }

        impl NumericOp {
            /// Look up an instruction keyword such as `i32.add`.
            pub fn from_keyword(text: &str) -> Option<Self> {
                match text {
                    $($text => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn keyword(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                }
            }
        }
    };
}

for_each_numeric_op!(define_numeric_op);
