//! # Intermediate Representation (IR) for memref lowering
//!
//! A minimal SSA substrate holding both the abstract buffer operations the
//! pass consumes and the RISC-V instructions it produces.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── types.rs        # ElementType, Dim, Layout, BufferType, registers, RegisterClass
//! ├── instruction.rs  # Value, MemrefOp, RiscvInstruction, Operation, Region
//! └── program.rs      # ValueTable, Module (symbol table)
//! ```
//!
//! ## Key Types
//!
//! - [`Value`] - SSA value handle; its type lives in the module's [`ValueTable`]
//! - [`MemrefOp`] - The seven buffer operations recognized by the lowering
//! - [`RiscvInstruction`] - Target instructions produced by the lowering
//! - [`Operation`] - Closed union of everything a [`Region`] can hold
//! - [`Module`] - Top-level region plus value table and symbol lookup
//!
//! Replacement sequences re-define the result values of the operation they
//! replace, so uses never need rewriting.

mod instruction;
mod program;
mod types;

pub use instruction::{
    AssemblySection, DenseElements, FuncOp, GlobalInit, Immediate, MemrefOp, MemrefOpKind,
    OpaqueOp, Operation, Region, RiscvInstruction, Value, Visibility,
};
pub use program::{Module, ValueInfo, ValueTable};
pub use types::{
    BufferType, Dim, ElementType, FloatRegister, IntRegister, Layout, RegisterClass, Type,
};
