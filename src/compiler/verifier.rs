//! # Lowered Module Verifier
//!
//! Validates a module after memref lowering.
//! Ensures no buffer operation survived and every emitted call resolves
//! against a symbol defined in its own region or an enclosing one.

use super::ir::{Module, Operation, Region, RiscvInstruction};

/// Verification result with statistics
#[derive(Debug)]
pub struct VerifyResult {
    /// Module is fully lowered and consistent
    pub valid: bool,
    /// Problems found
    pub errors: Vec<VerifyError>,
    /// Statistics
    pub stats: ModuleStats,
}

/// Module statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModuleStats {
    /// Total target instruction count, labels and directives included
    pub instruction_count: usize,
    /// Number of bridging casts
    pub cast_count: usize,
    /// Number of call instructions
    pub call_count: usize,
    /// Number of assembly sections
    pub section_count: usize,
}

/// Verification error types
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyError {
    /// A buffer operation was not lowered.
    UnloweredMemref {
        /// Operation name, e.g. `memref.load`
        op: &'static str,
    },

    /// A call targets a symbol the module does not define.
    UndefinedCallee {
        /// The callee symbol
        callee: String,
    },

    /// A bridging cast does not map inputs to results one to one.
    CastArityMismatch {
        /// Number of cast inputs
        inputs: usize,
        /// Number of cast results
        results: usize,
    },
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::UnloweredMemref { op } => {
                write!(f, "Unlowered operation {}", op)
            }
            VerifyError::UndefinedCallee { callee } => {
                write!(f, "Call to undefined symbol {}", callee)
            }
            VerifyError::CastArityMismatch { inputs, results } => {
                write!(
                    f,
                    "Cast with {} inputs and {} results",
                    inputs, results
                )
            }
        }
    }
}

/// Lowered module verifier
#[derive(Debug, Default)]
pub struct Verifier;

impl Verifier {
    /// Creates a new verifier.
    pub fn new() -> Self {
        Self
    }

    /// Verify a module
    pub fn verify(&self, module: &Module) -> VerifyResult {
        let mut errors = Vec::new();
        let mut stats = ModuleStats::default();
        let mut scopes = Vec::new();

        self.verify_region(&module.body, &mut scopes, &mut errors, &mut stats);

        VerifyResult {
            valid: errors.is_empty(),
            errors,
            stats,
        }
    }

    /// Check `region` and everything nested in it
    ///
    /// `scopes` holds the symbols defined by each enclosing region, outermost
    /// first. A callee resolves if any of them defines it.
    fn verify_region<'a>(
        &self,
        region: &'a Region,
        scopes: &mut Vec<Vec<&'a str>>,
        errors: &mut Vec<VerifyError>,
        stats: &mut ModuleStats,
    ) {
        scopes.push(region.ops.iter().filter_map(Operation::symbol_name).collect());

        for op in &region.ops {
            match op {
                Operation::Memref(memref_op) => {
                    errors.push(VerifyError::UnloweredMemref {
                        op: memref_op.kind().name(),
                    });
                }
                Operation::Riscv { instr, .. } => {
                    stats.instruction_count += 1;
                    if let RiscvInstruction::Call { callee, .. } = instr {
                        stats.call_count += 1;
                        let resolved = scopes
                            .iter()
                            .any(|scope| scope.iter().any(|name| *name == callee.as_str()));
                        if !resolved {
                            errors.push(VerifyError::UndefinedCallee {
                                callee: callee.clone(),
                            });
                        }
                    }
                }
                Operation::Cast { inputs, results } => {
                    stats.cast_count += 1;
                    if inputs.len() != results.len() {
                        errors.push(VerifyError::CastArityMismatch {
                            inputs: inputs.len(),
                            results: results.len(),
                        });
                    }
                }
                Operation::Section(_) => stats.section_count += 1,
                Operation::Func(_) | Operation::Opaque(_) => {}
            }

            for nested in op.regions() {
                self.verify_region(nested, scopes, errors, stats);
            }
        }

        scopes.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{
        BufferType, ElementType, FuncOp, IntRegister, MemrefOp, OpaqueOp, Type, Value,
    };

    fn call(module: &mut Module, callee: &str) -> Operation {
        let arg = module.new_value(Type::IntReg(IntRegister::A0));
        Operation::riscv(RiscvInstruction::Call {
            callee: callee.to_string(),
            args: vec![arg],
            results: vec![],
        })
    }

    #[test]
    fn test_empty_module() {
        let result = Verifier::new().verify(&Module::new());
        assert!(result.valid);
        assert_eq!(result.stats, ModuleStats::default());
    }

    #[test]
    fn test_resolved_call_is_valid() {
        let mut module = Module::new();
        let op = call(&mut module, "free");
        module.push(op);
        module.push(Operation::Func(FuncOp::external(
            "free",
            vec![IntRegister::A0],
            vec![],
        )));

        let result = Verifier::new().verify(&module);
        assert!(result.valid, "Errors: {:?}", result.errors);
        assert_eq!(result.stats.call_count, 1);
        assert_eq!(result.stats.instruction_count, 1);
    }

    #[test]
    fn test_undefined_callee() {
        let mut module = Module::new();
        let op = call(&mut module, "malloc");
        module.push(op);

        let result = Verifier::new().verify(&module);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![VerifyError::UndefinedCallee {
                callee: "malloc".to_string()
            }]
        );
    }

    #[test]
    fn test_call_resolves_in_nested_region() {
        let mut module = Module::new();
        let inner = Operation::Opaque(OpaqueOp {
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
        });
        module.push(inner);

        let result = Verifier::new().verify(&module);
        assert!(result.valid, "Errors: {:?}", result.errors);
        assert_eq!(result.stats.call_count, 1);
    }

    #[test]
    fn test_call_does_not_see_sibling_region_symbols() {
        let mut module = Module::new();
        let nested = |ops| {
            Operation::Opaque(OpaqueOp {
                name: "builtin.module".to_string(),
                symbol: None,
                operands: vec![],
                results: vec![],
                regions: vec![Region::from_ops(ops)],
            })
        };
        module.push(nested(vec![Operation::Func(FuncOp::external(
            "helper",
            vec![],
            vec![],
        ))]));
        let op = call(&mut module, "helper");
        module.push(nested(vec![op]));

        let result = Verifier::new().verify(&module);
        assert_eq!(
            result.errors,
            vec![VerifyError::UndefinedCallee {
                callee: "helper".to_string()
            }]
        );
    }

    #[test]
    fn test_unlowered_memref_op() {
        let mut module = Module::new();
        let result = module.new_value(Type::Buffer(BufferType::new(ElementType::F32, [2])));
        module.push(Operation::Memref(MemrefOp::Alloc { result }));

        let result = Verifier::new().verify(&module);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.to_string() == "Unlowered operation memref.alloc"));
    }

    #[test]
    fn test_cast_arity_mismatch() {
        let mut module = Module::new();
        module.push(Operation::Cast {
            inputs: vec![Value(0), Value(1)],
            results: vec![Value(2)],
        });

        let result = Verifier::new().verify(&module);
        assert!(!result.valid);
        assert_eq!(result.stats.cast_count, 1);
        assert!(matches!(
            result.errors[0],
            VerifyError::CastArityMismatch {
                inputs: 2,
                results: 1
            }
        ));
    }
}
