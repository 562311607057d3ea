//! # Memref operation lowerings
//!
//! One lowering per [`MemrefOp`] kind. Each consumes the matched op and emits
//! its RISC-V replacement through a [`PatternRewriter`]:
//!
//! | Op | Replacement |
//! |----|-------------|
//! | `alloc` | `li size; mv a0; call malloc; mv; cast` |
//! | `dealloc` | `cast; mv a0; call free` |
//! | `load` | operand casts, address computation, `lw`/`flw`/`fld`, cast |
//! | `store` | operand casts, address computation, `sw`/`fsw`/`fsd` |
//! | `global` | `.data` section with a label and a `.word` directive |
//! | `get_global` | `li @symbol; cast` |
//! | `subview` | cast, `addi`, or a full address computation |
//!
//! The replacement always re-defines the result value of the matched op
//! through a typed bridging cast.

use super::address::{compute_address, hint};
use super::ir::{
    AssemblySection, BufferType, DenseElements, Dim, ElementType, GlobalInit, Immediate,
    IntRegister, Layout, MemrefOp, Operation, RegisterClass, Region, RiscvInstruction, Type,
    Value,
};
use super::layout::{element_count, ResolvedLayout};
use super::rewriter::PatternRewriter;
use super::LoweringOptions;
use crate::{Error, Result};

/// Module-scoped record of which runtime support functions are needed
///
/// Both flags are set-once for the duration of a pass invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupportFlags {
    /// An allocation was lowered to a call of the runtime allocator
    pub uses_alloc: bool,
    /// A deallocation was lowered to a call of the runtime deallocator
    pub uses_dealloc: bool,
}

/// Mutable state threaded through every lowering of one pass invocation
#[derive(Debug)]
pub struct PassContext<'o> {
    /// Options of the running pass
    pub options: &'o LoweringOptions,
    /// Runtime support flags
    pub flags: SupportFlags,
}

impl<'o> PassContext<'o> {
    /// Fresh context with both flags cleared
    pub fn new(options: &'o LoweringOptions) -> Self {
        Self {
            options,
            flags: SupportFlags::default(),
        }
    }
}

/// Lower one memref operation
pub fn lower(op: &MemrefOp, rewriter: &mut PatternRewriter<'_>, ctx: &mut PassContext<'_>) -> Result<()> {
    tracing::trace!(op = op.kind().name(), "lowering memref op");
    match op {
        MemrefOp::Alloc { result } => lower_alloc(*result, rewriter, ctx),
        MemrefOp::Dealloc { memref } => lower_dealloc(*memref, rewriter, ctx),
        MemrefOp::Load {
            memref,
            indices,
            result,
        } => lower_load(*memref, indices, *result, rewriter),
        MemrefOp::Store {
            value,
            memref,
            indices,
        } => lower_store(*value, *memref, indices, rewriter),
        MemrefOp::Global {
            sym_name,
            ty,
            initial_value,
            ..
        } => lower_global(sym_name, ty, initial_value, rewriter),
        MemrefOp::GetGlobal { name, result } => lower_get_global(name, *result, rewriter),
        MemrefOp::Subview {
            source,
            offsets,
            static_offsets,
            result,
            ..
        } => lower_subview(*source, offsets, static_offsets, *result, rewriter),
    }
}

fn lower_alloc(
    result: Value,
    rewriter: &mut PatternRewriter<'_>,
    ctx: &mut PassContext<'_>,
) -> Result<()> {
    let ty = rewriter.buffer_type_of(result)?;
    let size = element_count(&ty)?
        .checked_mul(ty.element.byte_size()?)
        .ok_or_else(|| Error::SizeOverflow { ty: ty.to_string() })?;

    let mut sink = rewriter.sink();
    let size_rd = sink.li(Immediate::Int(size), None);
    sink.comment_last("memref alloc size");
    let arg = sink.mv(size_rd, IntRegister::A0);
    let returned = sink.call(
        &ctx.options.allocator_symbol,
        vec![arg],
        &[IntRegister::A0],
    );
    let pointer = sink.mv(returned[0], IntRegister::Unallocated);
    sink.cast_into(pointer, result);
    let ops = sink.finish();

    rewriter.replace_matched_op(ops);
    ctx.flags.uses_alloc = true;
    Ok(())
}

fn lower_dealloc(
    memref: Value,
    rewriter: &mut PatternRewriter<'_>,
    ctx: &mut PassContext<'_>,
) -> Result<()> {
    rewriter.buffer_type_of(memref)?;

    let mut sink = rewriter.sink();
    let pointer = sink.cast(memref, Type::IntReg(IntRegister::Unallocated), None);
    let arg = sink.mv(pointer, IntRegister::A0);
    sink.call(&ctx.options.deallocator_symbol, vec![arg], &[]);
    let ops = sink.finish();

    rewriter.replace_matched_op(ops);
    ctx.flags.uses_dealloc = true;
    Ok(())
}

/// Bridge each operand to the register type of its declared type, inserting
/// the casts before the matched op
fn cast_operands_to_regs(
    rewriter: &mut PatternRewriter<'_>,
    operands: &[Value],
) -> Result<Vec<Value>> {
    let mut sink = rewriter.sink();
    let mut regs = Vec::with_capacity(operands.len());
    for &operand in operands {
        let ty = sink.values().type_of(operand)?.register_type();
        regs.push(sink.cast(operand, ty, None));
    }
    let ops = sink.finish();
    rewriter.insert_before_matched_op(ops);
    Ok(regs)
}

fn check_rank(ty: &BufferType, indices: &[Value]) -> Result<()> {
    if indices.len() != ty.rank() {
        return Err(Error::malformed(format!(
            "{} indices for {} of rank {}",
            indices.len(),
            ty,
            ty.rank()
        )));
    }
    Ok(())
}

/// Emit the element address for `indices` before the matched op
fn insert_element_pointer(
    rewriter: &mut PatternRewriter<'_>,
    base: Value,
    indices: &[Value],
    ty: &BufferType,
) -> Result<Value> {
    let layout = ResolvedLayout::resolve(ty)?;
    let mut sink = rewriter.sink();
    let pointer = compute_address(&mut sink, base, indices, &layout)?;
    let ops = sink.finish();
    rewriter.insert_before_matched_op(ops);
    Ok(pointer)
}

fn lower_load(
    memref: Value,
    indices: &[Value],
    result: Value,
    rewriter: &mut PatternRewriter<'_>,
) -> Result<()> {
    let ty = rewriter.buffer_type_of(memref)?;
    check_rank(&ty, indices)?;
    let result_reg = rewriter.type_of(result)?.register_type();

    let mut operands = Vec::with_capacity(indices.len() + 1);
    operands.push(memref);
    operands.extend_from_slice(indices);
    let regs = cast_operands_to_regs(rewriter, &operands)?;
    let pointer = insert_element_pointer(rewriter, regs[0], &regs[1..], &ty)?;

    let class = RegisterClass::for_element(&ty.element)?;
    assert_eq!(
        matches!(result_reg, Type::FloatReg(_)),
        class.is_float(),
        "Unexpected register type {} for load from {}",
        result_reg,
        ty
    );

    let shape = ty.shape_string();
    let mut sink = rewriter.sink();
    let rd = sink.fresh(class.unallocated(), None);
    let (instr, comment) = match class {
        RegisterClass::Int => (
            RiscvInstruction::Lw {
                rd,
                rs1: pointer,
                offset: 0,
            },
            format!("load word from memref of shape {}", shape),
        ),
        RegisterClass::Float32 => (
            RiscvInstruction::Flw {
                rd,
                rs1: pointer,
                offset: 0,
            },
            format!("load float from memref of shape {}", shape),
        ),
        RegisterClass::Float64 => (
            RiscvInstruction::Fld {
                rd,
                rs1: pointer,
                offset: 0,
            },
            format!("load double from memref of shape {}", shape),
        ),
    };
    sink.push(Operation::riscv(instr));
    sink.comment_last(comment);
    sink.cast_into(rd, result);
    let ops = sink.finish();

    rewriter.replace_matched_op(ops);
    Ok(())
}

fn lower_store(
    value: Value,
    memref: Value,
    indices: &[Value],
    rewriter: &mut PatternRewriter<'_>,
) -> Result<()> {
    let ty = rewriter.buffer_type_of(memref)?;
    check_rank(&ty, indices)?;

    let mut operands = Vec::with_capacity(indices.len() + 2);
    operands.push(value);
    operands.push(memref);
    operands.extend_from_slice(indices);
    let regs = cast_operands_to_regs(rewriter, &operands)?;
    let value_reg = regs[0];
    let pointer = insert_element_pointer(rewriter, regs[1], &regs[2..], &ty)?;

    let class = RegisterClass::for_element(&ty.element)?;
    let value_type = rewriter.type_of(value_reg)?;
    assert_eq!(
        matches!(value_type, Type::FloatReg(_)),
        class.is_float(),
        "Unexpected register type {} for store to {}",
        value_type,
        ty
    );

    let shape = ty.shape_string();
    let (instr, comment) = match class {
        RegisterClass::Int => (
            RiscvInstruction::Sw {
                rs1: pointer,
                rs2: value_reg,
                offset: 0,
            },
            format!("store int value to memref of shape {}", shape),
        ),
        RegisterClass::Float32 => (
            RiscvInstruction::Fsw {
                rs1: pointer,
                rs2: value_reg,
                offset: 0,
            },
            format!("store float value to memref of shape {}", shape),
        ),
        RegisterClass::Float64 => (
            RiscvInstruction::Fsd {
                rs1: pointer,
                rs2: value_reg,
                offset: 0,
            },
            format!("store double value to memref of shape {}", shape),
        ),
    };

    let mut sink = rewriter.sink();
    sink.push(Operation::riscv(instr));
    sink.comment_last(comment);
    let ops = sink.finish();

    rewriter.replace_matched_op(ops);
    Ok(())
}

/// Encode a dense payload as little-endian 32-bit words
///
/// Only i32, f32 and f64 elements are supported; f64 elements take two words.
pub fn encode_global_words(element: &ElementType, elements: &DenseElements) -> Result<Vec<u32>> {
    let bytes: Vec<u8> = match (element, elements) {
        (ElementType::Int(32), DenseElements::Int(values)) => {
            let mut bytes = Vec::with_capacity(values.len() * 4);
            for &value in values {
                if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
                    return Err(Error::unsupported_global(
                        "value out of range for i32",
                        value,
                    ));
                }
                bytes.extend_from_slice(&(value as u32).to_le_bytes());
            }
            bytes
        }
        (ElementType::F32, DenseElements::Float(values)) => values
            .iter()
            .flat_map(|&value| (value as f32).to_le_bytes())
            .collect(),
        (ElementType::F64, DenseElements::Float(values)) => values
            .iter()
            .flat_map(|&value| value.to_le_bytes())
            .collect(),
        (ElementType::Int(32) | ElementType::F32 | ElementType::F64, _) => {
            return Err(Error::unsupported_global(
                format!("initial value for {}", element),
                elements,
            ));
        }
        _ => return Err(Error::unsupported_global("element type", element)),
    };

    Ok(bytes
        .chunks_exact(4)
        .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .collect())
}

fn lower_global(
    sym_name: &str,
    ty: &BufferType,
    initial_value: &GlobalInit,
    rewriter: &mut PatternRewriter<'_>,
) -> Result<()> {
    let elements = match initial_value {
        GlobalInit::Dense(elements) => elements,
        other => return Err(Error::unsupported_global("initial value", other)),
    };
    let words = encode_global_words(&ty.element, elements)?;

    let mut body = vec![Operation::riscv(RiscvInstruction::Label(
        sym_name.to_string(),
    ))];
    if !words.is_empty() {
        let text: Vec<String> = words.iter().map(|word| format!("{:#x}", word)).collect();
        body.push(Operation::riscv(RiscvInstruction::Directive {
            name: ".word".to_string(),
            value: text.join(","),
        }));
    }

    rewriter.replace_matched_op(vec![Operation::Section(AssemblySection {
        directive: ".data".to_string(),
        body: Region::from_ops(body),
    })]);
    Ok(())
}

fn lower_get_global(
    name: &str,
    result: Value,
    rewriter: &mut PatternRewriter<'_>,
) -> Result<()> {
    rewriter.buffer_type_of(result)?;

    let mut sink = rewriter.sink();
    let pointer = sink.li(Immediate::Symbol(name.to_string()), None);
    sink.cast_into(pointer, result);
    let ops = sink.finish();

    rewriter.replace_matched_op(ops);
    Ok(())
}

// The result keeps no runtime offset/size/stride metadata: consumers address
// it through the strides and offset of its type alone.
fn lower_subview(
    source: Value,
    offsets: &[Value],
    static_offsets: &[Dim],
    result: Value,
    rewriter: &mut PatternRewriter<'_>,
) -> Result<()> {
    let source_ty = rewriter.buffer_type_of(source)?;
    let result_ty = rewriter.buffer_type_of(result)?;

    let offset = match &result_ty.layout {
        Layout::Default => {
            rewriter.replace_matched_op(vec![Operation::cast(source, result)]);
            return Ok(());
        }
        Layout::Strided { offset, .. } => *offset,
        Layout::AffineMap(_) => {
            return Err(Error::LayoutUnsupported {
                layout: result_ty.layout.to_string(),
            })
        }
    };

    let factor = result_ty.element.byte_size()?;

    if offset == Dim::Static(0) {
        rewriter.replace_matched_op(vec![Operation::cast(source, result)]);
        return Ok(());
    }

    let mut sink = rewriter.sink();
    let src = sink.cast(source, Type::IntReg(IntRegister::Unallocated), None);

    let pointer = match offset {
        Dim::Static(offset) => {
            let bytes = offset.checked_mul(factor).ok_or_else(|| Error::SizeOverflow {
                ty: result_ty.to_string(),
            })?;
            let pointer = sink.addi(src, bytes);
            sink.comment_last("subview offset");
            pointer
        }
        Dim::Dynamic => {
            let mut dynamic_offsets = offsets.iter();
            let mut indices = Vec::with_capacity(static_offsets.len());
            for static_offset in static_offsets {
                let index = match static_offset {
                    Dim::Dynamic => {
                        let operand = dynamic_offsets.next().ok_or_else(|| {
                            Error::malformed("subview has fewer offset operands than dynamic offsets")
                        })?;
                        sink.cast(
                            *operand,
                            Type::IntReg(IntRegister::Unallocated),
                            Some(hint::SUBVIEW_INDEX),
                        )
                    }
                    Dim::Static(value) => {
                        sink.li(Immediate::Int(*value), Some(hint::SUBVIEW_INDEX))
                    }
                };
                indices.push(index);
            }
            if dynamic_offsets.next().is_some() {
                return Err(Error::malformed(
                    "subview has more offset operands than dynamic offsets",
                ));
            }
            check_rank(&source_ty, &indices)?;
            let layout = ResolvedLayout::resolve(&source_ty)?;
            compute_address(&mut sink, src, &indices, &layout)?
        }
    };

    sink.cast_into(pointer, result);
    let ops = sink.finish();
    rewriter.replace_matched_op(ops);
    Ok(())
}
