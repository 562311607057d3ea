//! # memref-riscv - Buffer lowering for RISC-V
//!
//! [![License: MIT](https://img.shields.io/badge/License-MIT-yellow.svg)](https://opensource.org/licenses/MIT)
//!
//! A compiler pass that lowers shape-typed buffer (memref) operations to
//! RISC-V instruction sequences on raw pointers held in registers.
//!
//! ## Features
//!
//! - **Seven lowerings** - `alloc`, `dealloc`, `load`, `store`, `global`,
//!   `get_global` and `subview`
//! - **Strided layouts** - default row-major and explicit stride layouts,
//!   with multiplies elided for unit strides
//! - **Runtime support** - `malloc`/`free` declarations inserted only when used
//! - **Post-lowering verification** - no buffer op survives, every call resolves
//!
//! ## Quick Start
//!
//! ```rust
//! use memref_riscv::compiler::ir::{BufferType, ElementType, MemrefOp, Module, Operation, Type};
//! use memref_riscv::compiler::{ConvertMemrefToRiscv, LoweringOptions};
//!
//! # fn main() -> memref_riscv::Result<()> {
//! let mut module = Module::new();
//! let buffer = module.new_value(Type::Buffer(BufferType::new(ElementType::Int(32), [2, 3])));
//! module.push(Operation::Memref(MemrefOp::Alloc { result: buffer }));
//! module.push(Operation::Memref(MemrefOp::Dealloc { memref: buffer }));
//!
//! let report = ConvertMemrefToRiscv::new(LoweringOptions::default()).apply(&mut module)?;
//! assert!(report.alloc_matched && report.dealloc_matched);
//! assert_eq!(module.symbols(), vec!["malloc", "free"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────┐   ┌──────────┐
//! │  Module   │──▶│ RewriteWalker│──▶│ lowerings │──▶│ Verifier │
//! │ (memref)  │   │  (fixpoint)  │   │ + address │   │          │
//! └───────────┘   └──────────────┘   └───────────┘   └──────────┘
//! ```
//!
//! - [`compiler::ir`] - SSA substrate: values, types, operations, module
//! - [`compiler::layout`] - Stride resolution
//! - [`compiler::address`] - Element address computation
//! - [`compiler::lowering`] - Per-operation lowerings
//! - [`compiler::rewriter`] - Pattern rewriter and fixpoint walker
//! - [`compiler::verifier`] - Post-lowering checks
//! - [`error`] - Diagnostics
//!
//! ## Logging
//!
//! The pass emits [`tracing`] events (`debug` per phase, `trace` per lowered
//! op). Install a subscriber in the embedding application to see them.

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compiler;
pub mod error;

// Re-export main types
pub use compiler::{ConvertMemrefToRiscv, LoweringOptions, LoweringReport};
pub use error::{Error, Result};
