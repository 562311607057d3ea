//! # Address Computer
//!
//! Emits the instruction sequence turning a base pointer and one index per
//! dimension into a byte-granular element pointer:
//!
//! ```text
//! offset  = sum(index[i] * stride[i])     (no mul when stride[i] == 1)
//! pointer = base + offset * element_size
//! ```
//!
//! Instructions are appended to an explicit [`InstructionSink`], which hands
//! the accumulated sequence back to its owner on [`InstructionSink::finish`].

use super::ir::{
    Immediate, IntRegister, Operation, RiscvInstruction, Type, Value, ValueTable,
};
use super::layout::ResolvedLayout;
use crate::Result;

/// Name hints of values synthesized by the address computation
pub mod hint {
    /// Materialized stride constant
    pub const DIM_STRIDE: &str = "pointer_dim_stride";
    /// Index times stride of one dimension
    pub const DIM_OFFSET: &str = "pointer_dim_offset";
    /// Running sum of per-dimension offsets
    pub const OFFSET: &str = "pointer_offset";
    /// Materialized element size
    pub const BYTES_PER_ELEMENT: &str = "bytes_per_element";
    /// Element offset scaled to bytes
    pub const SCALED_OFFSET: &str = "scaled_pointer_offset";
    /// Base plus byte offset
    pub const POINTER: &str = "offset_pointer";
    /// Per-dimension index rebuilt by subview lowering
    pub const SUBVIEW_INDEX: &str = "subview_dim_index";
}

/// Accumulates instructions for one lowering step
pub struct InstructionSink<'a> {
    values: &'a mut ValueTable,
    ops: Vec<Operation>,
    annotate: bool,
}

impl<'a> InstructionSink<'a> {
    /// Create an empty sink allocating fresh values from `values`
    pub fn new(values: &'a mut ValueTable) -> Self {
        Self {
            values,
            ops: Vec::new(),
            annotate: true,
        }
    }

    /// Set whether assembly comments are kept
    pub fn annotate(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Value table backing this sink
    pub fn values(&self) -> &ValueTable {
        &*self.values
    }

    /// Append an arbitrary operation
    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// Attach an assembly comment to the last appended instruction
    pub fn comment_last(&mut self, text: impl Into<String>) {
        if !self.annotate {
            return;
        }
        if let Some(Operation::Riscv { comment, .. }) = self.ops.last_mut() {
            *comment = Some(text.into());
        }
    }

    /// Allocate a fresh value, optionally tagged with a role hint
    pub fn fresh(&mut self, ty: Type, hint: Option<&str>) -> Value {
        match hint {
            Some(hint) => self.values.alloc_named(ty, hint),
            None => self.values.alloc(ty),
        }
    }

    fn fresh_int(&mut self, hint: Option<&str>) -> Value {
        self.fresh(Type::IntReg(IntRegister::Unallocated), hint)
    }

    fn emit(&mut self, instr: RiscvInstruction) {
        self.ops.push(Operation::riscv(instr));
    }

    /// `rd = imm`
    pub fn li(&mut self, imm: Immediate, hint: Option<&str>) -> Value {
        let rd = self.fresh_int(hint);
        self.emit(RiscvInstruction::Li { rd, imm });
        rd
    }

    /// `rd = rs` with `rd` in the given register
    pub fn mv(&mut self, rs: Value, rd_reg: IntRegister) -> Value {
        let rd = self.fresh(Type::IntReg(rd_reg), None);
        self.emit(RiscvInstruction::Mv { rd, rs });
        rd
    }

    /// `rd = rs1 + rs2`
    pub fn add(&mut self, rs1: Value, rs2: Value, hint: Option<&str>) -> Value {
        let rd = self.fresh_int(hint);
        self.emit(RiscvInstruction::Add { rd, rs1, rs2 });
        rd
    }

    /// `rd = rs1 * rs2`
    pub fn mul(&mut self, rs1: Value, rs2: Value, hint: Option<&str>) -> Value {
        let rd = self.fresh_int(hint);
        self.emit(RiscvInstruction::Mul { rd, rs1, rs2 });
        rd
    }

    /// `rd = rs1 + imm`
    pub fn addi(&mut self, rs1: Value, imm: i64) -> Value {
        let rd = self.fresh_int(None);
        self.emit(RiscvInstruction::Addi { rd, rs1, imm });
        rd
    }

    /// `call callee` with the given argument values; one fresh result per
    /// entry of `result_regs`
    pub fn call(&mut self, callee: &str, args: Vec<Value>, result_regs: &[IntRegister]) -> Vec<Value> {
        let results: Vec<Value> = result_regs
            .iter()
            .map(|&reg| self.fresh(Type::IntReg(reg), None))
            .collect();
        self.emit(RiscvInstruction::Call {
            callee: callee.to_string(),
            args,
            results: results.clone(),
        });
        results
    }

    /// Bridge `input` to a fresh value of type `ty`
    pub fn cast(&mut self, input: Value, ty: Type, hint: Option<&str>) -> Value {
        let result = self.fresh(ty, hint);
        self.ops.push(Operation::cast(input, result));
        result
    }

    /// Bridge `input` to an already declared value
    pub fn cast_into(&mut self, input: Value, result: Value) {
        self.ops.push(Operation::cast(input, result));
    }

    /// Hand the accumulated sequence to the caller
    pub fn finish(self) -> Vec<Operation> {
        self.ops
    }
}

/// Emit the address of the element at `indices` and return the pointer value
///
/// With no indices the base pointer is returned unchanged and nothing is
/// emitted. Panics if `indices` and the layout differ in rank.
pub fn compute_address(
    sink: &mut InstructionSink<'_>,
    base: Value,
    indices: &[Value],
    layout: &ResolvedLayout,
) -> Result<Value> {
    assert_eq!(
        indices.len(),
        layout.rank(),
        "index count does not match rank of {}",
        layout.buffer
    );

    let mut head: Option<Value> = None;

    for (dim, &index) in indices.iter().enumerate() {
        let stride = layout.stride(dim)?;

        // A unit stride leaves the index as the offset
        let increment = if stride == 1 {
            index
        } else {
            let stride_rd = sink.li(Immediate::Int(stride), Some(hint::DIM_STRIDE));
            sink.mul(index, stride_rd, Some(hint::DIM_OFFSET))
        };

        head = Some(match head {
            None => increment,
            Some(acc) => sink.add(acc, increment, Some(hint::OFFSET)),
        });
    }

    let Some(offset) = head else {
        return Ok(base);
    };

    let size_rd = sink.li(
        Immediate::Int(layout.element_size),
        Some(hint::BYTES_PER_ELEMENT),
    );
    let bytes = sink.mul(offset, size_rd, Some(hint::SCALED_OFFSET));
    sink.comment_last("multiply by element size");
    Ok(sink.add(base, bytes, Some(hint::POINTER)))
}

/// Standalone form of [`compute_address`]: returns the emitted instructions
/// together with the result pointer
pub fn strided_pointer(
    values: &mut ValueTable,
    base: Value,
    indices: &[Value],
    layout: &ResolvedLayout,
) -> Result<(Vec<Operation>, Value)> {
    let mut sink = InstructionSink::new(values);
    let pointer = compute_address(&mut sink, base, indices, layout)?;
    Ok((sink.finish(), pointer))
}
