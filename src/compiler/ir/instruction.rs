//! Operation definitions: memref ops, RISC-V instructions and structural ops

use super::types::{BufferType, Dim, IntRegister};
use std::fmt;

/// SSA value (index into the module's value table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(pub u32);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Dense constant payload of a global
#[derive(Debug, Clone, PartialEq)]
pub enum DenseElements {
    /// Integer elements
    Int(Vec<i64>),
    /// Float elements
    Float(Vec<f64>),
}

impl DenseElements {
    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            DenseElements::Int(values) => values.len(),
            DenseElements::Float(values) => values.len(),
        }
    }

    /// Returns true when there are no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for DenseElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = match self {
            DenseElements::Int(values) => values.iter().map(|v| v.to_string()).collect(),
            DenseElements::Float(values) => values.iter().map(|v| format!("{:?}", v)).collect(),
        };
        write!(f, "dense<[{}]>", items.join(", "))
    }
}

/// Initial value of a `memref.global`
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalInit {
    /// Dense element data
    Dense(DenseElements),
    /// Declared without an initializer
    Uninitialized,
    /// Any other attribute (sparse, resource blob, ...), kept as text
    Opaque(String),
}

impl fmt::Display for GlobalInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalInit::Dense(elements) => write!(f, "{}", elements),
            GlobalInit::Uninitialized => write!(f, "uninitialized"),
            GlobalInit::Opaque(text) => write!(f, "{}", text),
        }
    }
}

/// Buffer operations recognized by the lowering
#[derive(Debug, Clone, PartialEq)]
pub enum MemrefOp {
    /// `result = memref.alloc()`
    Alloc {
        /// Buffer-typed result
        result: Value,
    },
    /// `memref.dealloc memref`
    Dealloc {
        /// Buffer to release
        memref: Value,
    },
    /// `result = memref.load memref[indices]`
    Load {
        /// Buffer operand
        memref: Value,
        /// One index per dimension
        indices: Vec<Value>,
        /// Element-typed result
        result: Value,
    },
    /// `memref.store value, memref[indices]`
    Store {
        /// Value to store
        value: Value,
        /// Buffer operand
        memref: Value,
        /// One index per dimension
        indices: Vec<Value>,
    },
    /// `memref.global @sym_name : ty = initial_value`
    Global {
        /// Symbol name
        sym_name: String,
        /// Declared buffer type
        ty: BufferType,
        /// Initializer
        initial_value: GlobalInit,
        /// Whether the global is read-only
        constant: bool,
    },
    /// `result = memref.get_global @name`
    GetGlobal {
        /// Referenced symbol
        name: String,
        /// Buffer-typed result
        result: Value,
    },
    /// `result = memref.subview source[offsets][sizes][strides]`
    Subview {
        /// Source buffer
        source: Value,
        /// Runtime offsets, one per `Dim::Dynamic` in `static_offsets`
        offsets: Vec<Value>,
        /// Runtime sizes, one per `Dim::Dynamic` in `static_sizes`
        sizes: Vec<Value>,
        /// Runtime strides, one per `Dim::Dynamic` in `static_strides`
        strides: Vec<Value>,
        /// Per-dimension offsets
        static_offsets: Vec<Dim>,
        /// Per-dimension sizes
        static_sizes: Vec<Dim>,
        /// Per-dimension strides
        static_strides: Vec<Dim>,
        /// Buffer-typed result
        result: Value,
    },
}

/// Tag of a [`MemrefOp`], used to name lowering rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemrefOpKind {
    /// `memref.alloc`
    Alloc,
    /// `memref.dealloc`
    Dealloc,
    /// `memref.load`
    Load,
    /// `memref.store`
    Store,
    /// `memref.global`
    Global,
    /// `memref.get_global`
    GetGlobal,
    /// `memref.subview`
    Subview,
}

impl MemrefOpKind {
    /// Operation name as it appears in IR text
    pub fn name(&self) -> &'static str {
        match self {
            MemrefOpKind::Alloc => "memref.alloc",
            MemrefOpKind::Dealloc => "memref.dealloc",
            MemrefOpKind::Load => "memref.load",
            MemrefOpKind::Store => "memref.store",
            MemrefOpKind::Global => "memref.global",
            MemrefOpKind::GetGlobal => "memref.get_global",
            MemrefOpKind::Subview => "memref.subview",
        }
    }
}

impl MemrefOp {
    /// Tag of this operation
    pub fn kind(&self) -> MemrefOpKind {
        match self {
            MemrefOp::Alloc { .. } => MemrefOpKind::Alloc,
            MemrefOp::Dealloc { .. } => MemrefOpKind::Dealloc,
            MemrefOp::Load { .. } => MemrefOpKind::Load,
            MemrefOp::Store { .. } => MemrefOpKind::Store,
            MemrefOp::Global { .. } => MemrefOpKind::Global,
            MemrefOp::GetGlobal { .. } => MemrefOpKind::GetGlobal,
            MemrefOp::Subview { .. } => MemrefOpKind::Subview,
        }
    }
}

/// Immediate operand of `li`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Immediate {
    /// Integer constant
    Int(i64),
    /// Address of a symbol, resolved by the assembler
    Symbol(String),
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Immediate::Int(value) => write!(f, "{}", value),
            Immediate::Symbol(name) => write!(f, "{}", name),
        }
    }
}

/// RISC-V instruction (register operands are SSA values)
#[derive(Debug, Clone, PartialEq)]
pub enum RiscvInstruction {
    /// Load immediate: rd = imm
    Li { rd: Value, imm: Immediate },
    /// Register move: rd = rs
    Mv { rd: Value, rs: Value },
    /// Addition: rd = rs1 + rs2
    Add { rd: Value, rs1: Value, rs2: Value },
    /// Multiplication: rd = rs1 * rs2
    Mul { rd: Value, rs1: Value, rs2: Value },
    /// Add immediate: rd = rs1 + imm
    Addi { rd: Value, rs1: Value, imm: i64 },
    /// Load word: rd = *(rs1 + offset)
    Lw { rd: Value, rs1: Value, offset: i64 },
    /// Store word: *(rs1 + offset) = rs2
    Sw { rs1: Value, rs2: Value, offset: i64 },
    /// Load single-precision float
    Flw { rd: Value, rs1: Value, offset: i64 },
    /// Store single-precision float
    Fsw { rs1: Value, rs2: Value, offset: i64 },
    /// Load double-precision float
    Fld { rd: Value, rs1: Value, offset: i64 },
    /// Store double-precision float
    Fsd { rs1: Value, rs2: Value, offset: i64 },
    /// Call with explicit argument and result registers
    Call {
        callee: String,
        args: Vec<Value>,
        results: Vec<Value>,
    },
    /// Assembly label
    Label(String),
    /// Assembler directive: `.word 0x1,0x2`
    Directive { name: String, value: String },
}

impl RiscvInstruction {
    /// Values defined by this instruction
    pub fn results(&self) -> Vec<Value> {
        match self {
            RiscvInstruction::Li { rd, .. }
            | RiscvInstruction::Mv { rd, .. }
            | RiscvInstruction::Add { rd, .. }
            | RiscvInstruction::Mul { rd, .. }
            | RiscvInstruction::Addi { rd, .. }
            | RiscvInstruction::Lw { rd, .. }
            | RiscvInstruction::Flw { rd, .. }
            | RiscvInstruction::Fld { rd, .. } => vec![*rd],
            RiscvInstruction::Call { results, .. } => results.clone(),
            RiscvInstruction::Sw { .. }
            | RiscvInstruction::Fsw { .. }
            | RiscvInstruction::Fsd { .. }
            | RiscvInstruction::Label(_)
            | RiscvInstruction::Directive { .. } => Vec::new(),
        }
    }

    /// Values used by this instruction
    pub fn operands(&self) -> Vec<Value> {
        match self {
            RiscvInstruction::Li { .. }
            | RiscvInstruction::Label(_)
            | RiscvInstruction::Directive { .. } => Vec::new(),
            RiscvInstruction::Mv { rs, .. } => vec![*rs],
            RiscvInstruction::Add { rs1, rs2, .. } | RiscvInstruction::Mul { rs1, rs2, .. } => {
                vec![*rs1, *rs2]
            }
            RiscvInstruction::Addi { rs1, .. }
            | RiscvInstruction::Lw { rs1, .. }
            | RiscvInstruction::Flw { rs1, .. }
            | RiscvInstruction::Fld { rs1, .. } => vec![*rs1],
            RiscvInstruction::Sw { rs1, rs2, .. }
            | RiscvInstruction::Fsw { rs1, rs2, .. }
            | RiscvInstruction::Fsd { rs1, rs2, .. } => vec![*rs1, *rs2],
            RiscvInstruction::Call { args, .. } => args.clone(),
        }
    }

    /// Assembly mnemonic
    pub fn mnemonic(&self) -> &'static str {
        match self {
            RiscvInstruction::Li { .. } => "li",
            RiscvInstruction::Mv { .. } => "mv",
            RiscvInstruction::Add { .. } => "add",
            RiscvInstruction::Mul { .. } => "mul",
            RiscvInstruction::Addi { .. } => "addi",
            RiscvInstruction::Lw { .. } => "lw",
            RiscvInstruction::Sw { .. } => "sw",
            RiscvInstruction::Flw { .. } => "flw",
            RiscvInstruction::Fsw { .. } => "fsw",
            RiscvInstruction::Fld { .. } => "fld",
            RiscvInstruction::Fsd { .. } => "fsd",
            RiscvInstruction::Call { .. } => "call",
            RiscvInstruction::Label(_) => "label",
            RiscvInstruction::Directive { .. } => "directive",
        }
    }
}

/// Symbol visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Visible outside the module
    #[default]
    Public,
    /// Module-local
    Private,
}

/// RISC-V function (a declaration when the body is empty)
#[derive(Debug, Clone, PartialEq)]
pub struct FuncOp {
    /// Symbol name
    pub name: String,
    /// Argument registers
    pub inputs: Vec<IntRegister>,
    /// Result registers
    pub outputs: Vec<IntRegister>,
    /// Symbol visibility
    pub visibility: Visibility,
    /// Function body
    pub body: Region,
}

impl FuncOp {
    /// Private external declaration with integer register signature
    pub fn external(name: &str, inputs: Vec<IntRegister>, outputs: Vec<IntRegister>) -> Self {
        Self {
            name: name.to_string(),
            inputs,
            outputs,
            visibility: Visibility::Private,
            body: Region::new(),
        }
    }

    /// Returns true when the function has no body
    pub fn is_declaration(&self) -> bool {
        self.body.is_empty()
    }
}

/// Assembly section (`.data`, `.text`) owning a region of labels and directives
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblySection {
    /// Section directive
    pub directive: String,
    /// Section contents
    pub body: Region,
}

/// Operation from a dialect this pass does not know about
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueOp {
    /// Operation name, e.g. `func.func`
    pub name: String,
    /// Symbol defined by this op, if any
    pub symbol: Option<String>,
    /// Operands
    pub operands: Vec<Value>,
    /// Results
    pub results: Vec<Value>,
    /// Nested regions
    pub regions: Vec<Region>,
}

impl OpaqueOp {
    /// Opaque op without regions or symbol
    pub fn new(name: &str, operands: Vec<Value>, results: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            symbol: None,
            operands,
            results,
            regions: Vec::new(),
        }
    }
}

/// Any operation in a module
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Buffer operation, to be lowered
    Memref(MemrefOp),
    /// Target instruction
    Riscv {
        /// The instruction
        instr: RiscvInstruction,
        /// Assembly comment
        comment: Option<String>,
    },
    /// Typed no-op bridging cast (`builtin.unrealized_conversion_cast`)
    Cast {
        /// Values being reinterpreted
        inputs: Vec<Value>,
        /// Reinterpreted values, typed by the value table
        results: Vec<Value>,
    },
    /// Function definition or declaration
    Func(FuncOp),
    /// Assembly section
    Section(AssemblySection),
    /// Foreign operation, never rewritten
    Opaque(OpaqueOp),
}

impl Operation {
    /// Instruction without a comment
    pub fn riscv(instr: RiscvInstruction) -> Self {
        Operation::Riscv {
            instr,
            comment: None,
        }
    }

    /// Single-value bridging cast
    pub fn cast(input: Value, result: Value) -> Self {
        Operation::Cast {
            inputs: vec![input],
            results: vec![result],
        }
    }

    /// Symbol defined by this operation, if any
    pub fn symbol_name(&self) -> Option<&str> {
        match self {
            Operation::Func(func) => Some(&func.name),
            Operation::Memref(MemrefOp::Global { sym_name, .. }) => Some(sym_name),
            Operation::Opaque(op) => op.symbol.as_deref(),
            _ => None,
        }
    }

    /// Nested regions
    pub fn regions(&self) -> Vec<&Region> {
        match self {
            Operation::Func(func) => vec![&func.body],
            Operation::Section(section) => vec![&section.body],
            Operation::Opaque(op) => op.regions.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Nested regions, mutably
    pub fn regions_mut(&mut self) -> Vec<&mut Region> {
        match self {
            Operation::Func(func) => vec![&mut func.body],
            Operation::Section(section) => vec![&mut section.body],
            Operation::Opaque(op) => op.regions.iter_mut().collect(),
            _ => Vec::new(),
        }
    }
}

/// Ordered list of operations
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Region {
    /// Operations in program order
    pub ops: Vec<Operation>,
}

impl Region {
    /// Create an empty region
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Create a region holding the given ops
    pub fn from_ops(ops: Vec<Operation>) -> Self {
        Self { ops }
    }

    /// Returns true when the region holds no ops
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Visit every operation depth-first, parents before their regions
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Operation)) {
        for op in &self.ops {
            visit(op);
            for region in op.regions() {
                region.walk(visit);
            }
        }
    }
}
