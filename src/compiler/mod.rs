//! # Memref to RISC-V lowering pass
//!
//! Rewrites the abstract buffer operations of a [`Module`] into RISC-V
//! instruction sequences operating on raw pointers held in registers.
//!
//! ## Architecture
//!
//! ```text
//! Module (memref ops) → alloc → dealloc → {dealloc, store, load, global,
//!                       get_global, subview} → runtime declarations → verify
//! ```
//!
//! Each arrow is one fixpoint run of a [`RewriteWalker`] over the module.
//! Allocation and deallocation run alone first so that the module-wide
//! [`SupportFlags`] are settled before the remaining lowerings see the IR.
//!
//! ## Usage
//!
//! ```ignore
//! use memref_riscv::compiler::{ConvertMemrefToRiscv, LoweringOptions};
//!
//! let pass = ConvertMemrefToRiscv::new(LoweringOptions::default());
//! let report = pass.apply(&mut module)?;
//! assert!(report.alloc_matched);
//! ```

pub mod address;
pub mod debug;
pub mod ir;
pub mod layout;
pub mod lowering;
pub mod rewriter;
pub mod verifier;

pub use address::{compute_address, strided_pointer, InstructionSink};
pub use debug::{dump_module, format_module, format_op, format_riscv};
pub use ir::{Module, Operation, Region};
pub use layout::{element_count, resolve_strides, strides_for_shape, ResolvedLayout};
pub use lowering::{encode_global_words, PassContext, SupportFlags};
pub use rewriter::{PatternRewriter, RewriteWalker};
pub use verifier::{ModuleStats, Verifier, VerifyError, VerifyResult};

use crate::{Error, Result};
use ir::{FuncOp, IntRegister, MemrefOpKind};
use serde::{Deserialize, Serialize};

/// Lowering options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoweringOptions {
    /// Runtime function called by lowered allocations
    pub allocator_symbol: String,
    /// Runtime function called by lowered deallocations
    pub deallocator_symbol: String,
    /// Maximum number of whole-module walks per phase
    pub max_iterations: usize,
    /// Attach assembly comments to emitted instructions
    pub annotate: bool,
    /// Run the post-lowering verifier
    pub verify: bool,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            allocator_symbol: "malloc".to_string(),
            deallocator_symbol: "free".to_string(),
            max_iterations: 64,
            annotate: true,
            verify: true,
        }
    }
}

impl LoweringOptions {
    /// Load options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject options the pass cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.allocator_symbol.is_empty() || self.deallocator_symbol.is_empty() {
            return Err(Error::Config(
                "runtime symbol names must not be empty".to_string(),
            ));
        }
        if self.allocator_symbol == self.deallocator_symbol {
            return Err(Error::Config(format!(
                "allocator and deallocator share the symbol {}",
                self.allocator_symbol
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one pass invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoweringReport {
    /// At least one allocation was lowered
    pub alloc_matched: bool,
    /// At least one deallocation was lowered
    pub dealloc_matched: bool,
    /// Ops rewritten by the allocation phase
    pub alloc_rewrites: usize,
    /// Ops rewritten by the deallocation phase
    pub dealloc_rewrites: usize,
    /// Ops rewritten by the combined phase
    pub combined_rewrites: usize,
    /// Runtime declarations inserted or updated, in insertion order
    pub declarations: Vec<String>,
}

impl LoweringReport {
    /// Total ops rewritten across all phases
    pub fn total_rewrites(&self) -> usize {
        self.alloc_rewrites + self.dealloc_rewrites + self.combined_rewrites
    }
}

const ALLOC_RULES: &[MemrefOpKind] = &[MemrefOpKind::Alloc];
const DEALLOC_RULES: &[MemrefOpKind] = &[MemrefOpKind::Dealloc];
const COMBINED_RULES: &[MemrefOpKind] = &[
    MemrefOpKind::Dealloc,
    MemrefOpKind::Store,
    MemrefOpKind::Load,
    MemrefOpKind::Global,
    MemrefOpKind::GetGlobal,
    MemrefOpKind::Subview,
];

/// The `convert-memref-to-riscv` pass
#[derive(Debug, Clone, Default)]
pub struct ConvertMemrefToRiscv {
    options: LoweringOptions,
}

impl ConvertMemrefToRiscv {
    /// Registered pass name
    pub const NAME: &'static str = "convert-memref-to-riscv";

    /// Create the pass with options
    pub fn new(options: LoweringOptions) -> Self {
        Self { options }
    }

    /// Options this pass runs with
    pub fn options(&self) -> &LoweringOptions {
        &self.options
    }

    /// Lower every memref operation of `module`
    ///
    /// On error the module may be partially rewritten; the op that failed and
    /// everything after it in its region are left as they were.
    pub fn apply(&self, module: &mut Module) -> Result<LoweringReport> {
        self.options.validate()?;

        let mut ctx = PassContext::new(&self.options);
        let mut report = LoweringReport::default();
        let limit = self.options.max_iterations;

        // Phase 1: allocations
        report.alloc_rewrites =
            RewriteWalker::new(ALLOC_RULES, limit).rewrite_module(module, &mut ctx)?;
        tracing::debug!(rewritten = report.alloc_rewrites, "alloc phase finished");

        // Phase 2: deallocations
        report.dealloc_rewrites =
            RewriteWalker::new(DEALLOC_RULES, limit).rewrite_module(module, &mut ctx)?;
        tracing::debug!(rewritten = report.dealloc_rewrites, "dealloc phase finished");

        // Phase 3: everything else
        report.combined_rewrites =
            RewriteWalker::new(COMBINED_RULES, limit).rewrite_module(module, &mut ctx)?;
        tracing::debug!(rewritten = report.combined_rewrites, "combined phase finished");

        report.alloc_matched = ctx.flags.uses_alloc;
        report.dealloc_matched = ctx.flags.uses_dealloc;

        // Phase 4: runtime support declarations
        if ctx.flags.uses_alloc {
            let name = &self.options.allocator_symbol;
            let replaced = module.insert_or_update(Operation::Func(FuncOp::external(
                name,
                vec![IntRegister::A0],
                vec![IntRegister::A0],
            )))?;
            tracing::debug!(symbol = %name, replaced, "declared allocator");
            report.declarations.push(name.clone());
        }
        if ctx.flags.uses_dealloc {
            let name = &self.options.deallocator_symbol;
            let replaced = module.insert_or_update(Operation::Func(FuncOp::external(
                name,
                vec![IntRegister::A0],
                vec![],
            )))?;
            tracing::debug!(symbol = %name, replaced, "declared deallocator");
            report.declarations.push(name.clone());
        }

        if self.options.verify {
            let result = Verifier::new().verify(module);
            if !result.valid {
                return Err(Error::VerificationFailed {
                    errors: result.errors.iter().map(|e| e.to_string()).collect(),
                });
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{
        BufferType, ElementType, MemrefOp, OpaqueOp, RiscvInstruction, Type, Visibility,
    };

    #[test]
    fn test_default_options() {
        let options = LoweringOptions::default();
        assert_eq!(options.allocator_symbol, "malloc");
        assert_eq!(options.deallocator_symbol, "free");
        assert_eq!(options.max_iterations, 64);
        assert!(options.annotate);
        assert!(options.verify);
    }

    #[test]
    fn test_options_from_partial_json() {
        let options = LoweringOptions::from_json(r#"{"annotate": false}"#).unwrap();
        assert!(!options.annotate);
        assert_eq!(options.allocator_symbol, "malloc");

        assert!(matches!(
            LoweringOptions::from_json("{not json"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            LoweringOptions::from_json(r#"{"max_iterations": 0}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_empty_module_declares_nothing() {
        let mut module = Module::new();
        let report = ConvertMemrefToRiscv::default().apply(&mut module).unwrap();
        assert_eq!(report, LoweringReport::default());
        assert!(module.body.is_empty());
    }

    #[test]
    fn test_alloc_declares_malloc_only() {
        let mut module = Module::new();
        let result = module.new_value(Type::Buffer(BufferType::new(ElementType::F32, [4])));
        module.push(Operation::Memref(MemrefOp::Alloc { result }));

        let report = ConvertMemrefToRiscv::default().apply(&mut module).unwrap();
        assert!(report.alloc_matched);
        assert!(!report.dealloc_matched);
        assert_eq!(report.alloc_rewrites, 1);
        assert_eq!(report.declarations, vec!["malloc".to_string()]);

        match module.lookup_symbol("malloc") {
            Some(Operation::Func(func)) => {
                assert_eq!(func.visibility, Visibility::Private);
                assert_eq!(func.inputs, vec![IntRegister::A0]);
                assert_eq!(func.outputs, vec![IntRegister::A0]);
                assert!(func.is_declaration());
            }
            other => panic!("Expected malloc declaration, got {:?}", other),
        }
        assert!(module.lookup_symbol("free").is_none());
    }

    #[test]
    fn test_existing_declaration_is_updated_in_place() {
        let mut module = Module::new();
        module.push(Operation::Func(FuncOp::external("free", vec![], vec![])));
        let memref = module.new_value(Type::Buffer(BufferType::new(ElementType::Int(8), [16])));
        module.push(Operation::Memref(MemrefOp::Dealloc { memref }));

        ConvertMemrefToRiscv::default().apply(&mut module).unwrap();
        let frees = module
            .body
            .ops
            .iter()
            .filter(|op| op.symbol_name() == Some("free"))
            .count();
        assert_eq!(frees, 1);
        match module.lookup_symbol("free") {
            Some(Operation::Func(func)) => assert_eq!(func.inputs, vec![IntRegister::A0]),
            other => panic!("Expected free declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_module_call_passes_verification() {
        let mut module = Module::new();
        module.push(Operation::Opaque(OpaqueOp {
            name: "builtin.module".to_string(),
            symbol: None,
            operands: vec![],
            results: vec![],
            regions: vec![Region::from_ops(vec![
                Operation::Func(FuncOp::external("helper", vec![], vec![])),
                Operation::riscv(RiscvInstruction::Call {
                    callee: "helper".to_string(),
                    args: vec![],
                    results: vec![],
                }),
            ])],
        }));

        let report = ConvertMemrefToRiscv::default().apply(&mut module).unwrap();
        assert_eq!(report.total_rewrites(), 0);
        assert!(report.declarations.is_empty());
    }

    #[test]
    fn test_oversized_alloc_fails_without_rewriting() {
        let mut module = Module::new();
        let result = module.new_value(Type::Buffer(BufferType::new(
            ElementType::Int(32),
            [2147483648, 2147483648],
        )));
        module.push(Operation::Memref(MemrefOp::Alloc { result }));
        let before = module.body.clone();

        assert!(matches!(
            ConvertMemrefToRiscv::default().apply(&mut module),
            Err(Error::SizeOverflow { .. })
        ));
        assert_eq!(module.body, before);
    }

    #[test]
    fn test_invalid_options_fail_before_rewriting() {
        let mut module = Module::new();
        let result = module.new_value(Type::Buffer(BufferType::new(ElementType::F32, [4])));
        module.push(Operation::Memref(MemrefOp::Alloc { result }));

        let pass = ConvertMemrefToRiscv::new(LoweringOptions {
            deallocator_symbol: "malloc".to_string(),
            ..LoweringOptions::default()
        });
        assert!(matches!(pass.apply(&mut module), Err(Error::Config(_))));
        assert_eq!(module.body.ops.len(), 1);
    }

    #[test]
    fn test_report_serializes() {
        let report = LoweringReport {
            alloc_matched: true,
            alloc_rewrites: 2,
            declarations: vec!["malloc".to_string()],
            ..LoweringReport::default()
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"alloc_rewrites\":2"));
        assert_eq!(report.total_rewrites(), 2);
    }
}
