//! Debug utilities for memref lowering
//!
//! Tools for inspecting a module before and after the pass.

use super::ir::{
    Dim, IntRegister, MemrefOp, Module, Operation, RiscvInstruction, Value, ValueTable, Visibility,
};

fn values_list(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print a module in human-readable format
pub fn dump_module(module: &Module) {
    println!("═══════════════════════════════════════════════════════════");
    println!("                    MODULE DUMP");
    println!("═══════════════════════════════════════════════════════════");
    println!("Symbols: {:?}", module.symbols());
    println!("Values: {}", module.values.len());
    println!("───────────────────────────────────────────────────────────");
    print!("{}", format_module(module));
    println!("═══════════════════════════════════════════════════════════\n");
}

/// Render every operation of a module, one per line, nested regions indented
pub fn format_module(module: &Module) -> String {
    let mut out = String::new();
    format_ops(&module.body.ops, &module.values, 0, &mut out);
    out
}

fn format_ops(ops: &[Operation], values: &ValueTable, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for op in ops {
        out.push_str(&indent);
        out.push_str(&format_op(op, values));
        out.push('\n');
        for region in op.regions() {
            format_ops(&region.ops, values, depth + 1, out);
        }
    }
}

/// Format a single operation
pub fn format_op(op: &Operation, values: &ValueTable) -> String {
    match op {
        Operation::Memref(memref_op) => format_memref(memref_op, values),
        Operation::Riscv { instr, comment } => {
            let text = format_riscv(instr);
            match comment {
                Some(comment) => format!("{}  # {}", text, comment),
                None => text,
            }
        }
        Operation::Cast { inputs, results } => {
            let types: Vec<String> = results
                .iter()
                .map(|v| match values.type_of(*v) {
                    Ok(ty) => ty.to_string(),
                    Err(_) => "<unknown>".to_string(),
                })
                .collect();
            format!(
                "{} = cast {} to {}",
                values_list(results),
                values_list(inputs),
                types.join(", ")
            )
        }
        Operation::Func(func) => {
            let regs = |regs: &[IntRegister]| {
                regs.iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let visibility = match func.visibility {
                Visibility::Private => "private ",
                Visibility::Public => "",
            };
            format!(
                "func {}@{}({}) -> ({})",
                visibility,
                func.name,
                regs(&func.inputs),
                regs(&func.outputs)
            )
        }
        Operation::Section(section) => format!("section {}", section.directive),
        Operation::Opaque(opaque) => {
            let name = match &opaque.symbol {
                Some(symbol) => format!("{} @{}", opaque.name, symbol),
                None => opaque.name.clone(),
            };
            if opaque.results.is_empty() {
                format!("{}({})", name, values_list(&opaque.operands))
            } else {
                format!(
                    "{} = {}({})",
                    values_list(&opaque.results),
                    name,
                    values_list(&opaque.operands)
                )
            }
        }
    }
}

fn format_memref(op: &MemrefOp, values: &ValueTable) -> String {
    let ty = |v: &Value| match values.type_of(*v) {
        Ok(ty) => ty.to_string(),
        Err(_) => "<unknown>".to_string(),
    };
    let name = op.kind().name();
    match op {
        MemrefOp::Alloc { result } => format!("{} = {} : {}", result, name, ty(result)),
        MemrefOp::Dealloc { memref } => format!("{} {} : {}", name, memref, ty(memref)),
        MemrefOp::Load {
            memref,
            indices,
            result,
        } => format!(
            "{} = {} {}[{}] : {}",
            result,
            name,
            memref,
            values_list(indices),
            ty(memref)
        ),
        MemrefOp::Store {
            value,
            memref,
            indices,
        } => format!(
            "{} {}, {}[{}] : {}",
            name,
            value,
            memref,
            values_list(indices),
            ty(memref)
        ),
        MemrefOp::Global {
            sym_name,
            ty: buffer,
            initial_value,
            constant,
        } => format!(
            "{} {}@{} : {} = {}",
            name,
            if *constant { "constant " } else { "" },
            sym_name,
            buffer,
            initial_value
        ),
        MemrefOp::GetGlobal { name: symbol, result } => {
            format!("{} = {} @{} : {}", result, name, symbol, ty(result))
        }
        MemrefOp::Subview {
            source,
            static_offsets,
            static_sizes,
            static_strides,
            result,
            ..
        } => {
            let dims = |dims: &[Dim]| {
                dims.iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!(
                "{} = {} {}[{}] [{}] [{}] : {}",
                result,
                name,
                source,
                dims(static_offsets),
                dims(static_sizes),
                dims(static_strides),
                ty(result)
            )
        }
    }
}

/// Format a single target instruction
pub fn format_riscv(instr: &RiscvInstruction) -> String {
    match instr {
        RiscvInstruction::Li { rd, imm } => format!("{} = li {}", rd, imm),
        RiscvInstruction::Mv { rd, rs } => format!("{} = mv {}", rd, rs),
        RiscvInstruction::Add { rd, rs1, rs2 } => format!("{} = add {}, {}", rd, rs1, rs2),
        RiscvInstruction::Mul { rd, rs1, rs2 } => format!("{} = mul {}, {}", rd, rs1, rs2),
        RiscvInstruction::Addi { rd, rs1, imm } => format!("{} = addi {}, {}", rd, rs1, imm),
        RiscvInstruction::Lw { rd, rs1, offset }
        | RiscvInstruction::Flw { rd, rs1, offset }
        | RiscvInstruction::Fld { rd, rs1, offset } => {
            format!("{} = {} {}({})", rd, instr.mnemonic(), offset, rs1)
        }
        RiscvInstruction::Sw { rs1, rs2, offset }
        | RiscvInstruction::Fsw { rs1, rs2, offset }
        | RiscvInstruction::Fsd { rs1, rs2, offset } => {
            format!("{} {}, {}({})", instr.mnemonic(), rs2, offset, rs1)
        }
        RiscvInstruction::Call {
            callee,
            args,
            results,
        } => {
            if results.is_empty() {
                format!("call {}({})", callee, values_list(args))
            } else {
                format!(
                    "{} = call {}({})",
                    values_list(results),
                    callee,
                    values_list(args)
                )
            }
        }
        RiscvInstruction::Label(name) => format!("{}:", name),
        RiscvInstruction::Directive { name, value } => format!("{} {}", name, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{
        AssemblySection, BufferType, ElementType, FuncOp, Immediate, IntRegister, Region, Type,
    };

    #[test]
    fn test_format_li_with_comment() {
        let values = ValueTable::new();
        let op = Operation::Riscv {
            instr: RiscvInstruction::Li {
                rd: Value(3),
                imm: Immediate::Int(24),
            },
            comment: Some("memref alloc size".to_string()),
        };
        assert_eq!(format_op(&op, &values), "%3 = li 24  # memref alloc size");
    }

    #[test]
    fn test_format_memory_instructions() {
        let load = RiscvInstruction::Flw {
            rd: Value(2),
            rs1: Value(1),
            offset: 0,
        };
        assert_eq!(format_riscv(&load), "%2 = flw 0(%1)");

        let store = RiscvInstruction::Sw {
            rs1: Value(1),
            rs2: Value(0),
            offset: 0,
        };
        assert_eq!(format_riscv(&store), "sw %0, 0(%1)");
    }

    #[test]
    fn test_format_cast_shows_result_type() {
        let mut values = ValueTable::new();
        let input = values.alloc(Type::IntReg(IntRegister::Unallocated));
        let result = values.alloc(Type::Buffer(BufferType::new(ElementType::Int(32), [2, 3])));
        assert_eq!(
            format_op(&Operation::cast(input, result), &values),
            "%1 = cast %0 to memref<2x3xi32>"
        );
    }

    #[test]
    fn test_format_module_indents_regions() {
        let mut module = Module::new();
        module.push(Operation::Func(FuncOp::external(
            "free",
            vec![IntRegister::A0],
            vec![],
        )));
        module.push(Operation::Section(AssemblySection {
            directive: ".data".to_string(),
            body: Region::from_ops(vec![
                Operation::riscv(RiscvInstruction::Label("g".to_string())),
                Operation::riscv(RiscvInstruction::Directive {
                    name: ".word".to_string(),
                    value: "0x1".to_string(),
                }),
            ]),
        }));

        let text = format_module(&module);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "func private @free(!riscv.reg<a0>) -> ()",
                "section .data",
                "  g:",
                "  .word 0x1",
            ]
        );
    }
}
