//! Property-based tests for the memref lowering
//!
//! These tests use proptest to generate random buffer types and verify that:
//! 1. Default strides follow the row-major product law
//! 2. Address computation multiplies only for non-unit strides
//! 3. Allocation size is element count times element size
//! 4. Lowering a lowered module changes nothing

use memref_riscv::compiler::ir::{
    BufferType, DenseElements, Dim, ElementType, Immediate, IntRegister, Layout, MemrefOp, Module,
    Operation, RiscvInstruction, Type, Value, ValueTable,
};
use memref_riscv::compiler::{
    encode_global_words, strided_pointer, strides_for_shape, ConvertMemrefToRiscv, ResolvedLayout,
};
use proptest::prelude::*;

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

fn static_shape() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..9, 0..5)
}

fn element_type() -> impl Strategy<Value = ElementType> {
    prop_oneof![
        Just(ElementType::Int(8)),
        Just(ElementType::Int(16)),
        Just(ElementType::Int(32)),
        Just(ElementType::Int(64)),
        Just(ElementType::F32),
        Just(ElementType::F64),
    ]
}

fn count(ops: &[Operation], mnemonic: &str) -> usize {
    ops.iter()
        .filter(|op| matches!(op, Operation::Riscv { instr, .. } if instr.mnemonic() == mnemonic))
        .count()
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn default_strides_are_row_major(shape in static_shape()) {
        let dims: Vec<Dim> = shape.iter().copied().map(Dim::Static).collect();
        let strides = strides_for_shape(&dims).unwrap();
        prop_assert_eq!(strides.len(), shape.len());

        if let Some(last) = strides.last() {
            prop_assert_eq!(*last, Dim::Static(1));
        }
        for i in 0..strides.len().saturating_sub(1) {
            let inner = strides[i + 1].as_static().unwrap();
            prop_assert_eq!(strides[i], Dim::Static(inner * shape[i + 1]));
        }
    }

    #[test]
    fn multiplies_only_for_non_unit_strides(
        strides in prop::collection::vec(1i64..5, 1..5),
        element in element_type(),
    ) {
        let rank = strides.len();
        let ty = BufferType::new(element, vec![4; rank])
            .with_layout(Layout::strided(strides.iter().copied().map(Dim::Static)))
            .unwrap();
        let layout = ResolvedLayout::resolve(&ty).unwrap();

        let mut values = ValueTable::new();
        let base = values.alloc(Type::IntReg(IntRegister::Unallocated));
        let indices: Vec<Value> = (0..rank)
            .map(|_| values.alloc(Type::IntReg(IntRegister::Unallocated)))
            .collect();
        let (ops, pointer) = strided_pointer(&mut values, base, &indices, &layout).unwrap();

        let non_unit = strides.iter().filter(|&&s| s != 1).count();
        prop_assert_eq!(count(&ops, "mul"), non_unit + 1);
        prop_assert_eq!(count(&ops, "li"), non_unit + 1);
        prop_assert_eq!(count(&ops, "add"), rank);
        prop_assert_ne!(pointer, base);
    }

    #[test]
    fn rank_zero_address_is_base(element in element_type()) {
        let ty = BufferType::new(element, Vec::<i64>::new());
        let layout = ResolvedLayout::resolve(&ty).unwrap();
        let mut values = ValueTable::new();
        let base = values.alloc(Type::IntReg(IntRegister::Unallocated));

        let (ops, pointer) = strided_pointer(&mut values, base, &[], &layout).unwrap();
        prop_assert!(ops.is_empty());
        prop_assert_eq!(pointer, base);
    }

    #[test]
    fn alloc_size_is_count_times_element_size(
        shape in static_shape(),
        element in element_type(),
    ) {
        let mut module = Module::new();
        let ty = BufferType::new(element, shape.clone());
        let result = module.new_value(Type::Buffer(ty));
        module.push(Operation::Memref(MemrefOp::Alloc { result }));

        ConvertMemrefToRiscv::default().apply(&mut module).unwrap();

        let expected = shape.iter().product::<i64>() * element.byte_size().unwrap();
        match &module.body.ops[0] {
            Operation::Riscv { instr: RiscvInstruction::Li { imm, .. }, .. } => {
                prop_assert_eq!(imm, &Immediate::Int(expected));
            }
            other => prop_assert!(false, "Expected li, got {:?}", other),
        }
    }

    #[test]
    fn lowering_is_idempotent(
        shapes in prop::collection::vec(static_shape(), 1..4),
        element in element_type(),
    ) {
        let mut module = Module::new();
        for shape in &shapes {
            let memref = module.new_value(Type::Buffer(BufferType::new(element, shape.clone())));
            let indices: Vec<Value> = shape
                .iter()
                .map(|_| module.new_value(Type::Element(ElementType::Index)))
                .collect();
            let loaded = module.new_value(Type::Element(element));
            module.push(Operation::Memref(MemrefOp::Alloc { result: memref }));
            module.push(Operation::Memref(MemrefOp::Load { memref, indices, result: loaded }));
            module.push(Operation::Memref(MemrefOp::Dealloc { memref }));
        }

        let pass = ConvertMemrefToRiscv::default();
        let first = pass.apply(&mut module).unwrap();
        prop_assert_eq!(first.total_rewrites(), shapes.len() * 3);

        let lowered = module.body.clone();
        let second = pass.apply(&mut module).unwrap();
        prop_assert_eq!(second.total_rewrites(), 0);
        prop_assert_eq!(&module.body, &lowered);
    }

    #[test]
    fn global_word_count_follows_element_width(values in prop::collection::vec(-1000i32..1000, 0..16)) {
        let ints = DenseElements::Int(values.iter().map(|&v| i64::from(v)).collect());
        let words = encode_global_words(&ElementType::Int(32), &ints).unwrap();
        prop_assert_eq!(words.len(), values.len());
        for (word, value) in words.iter().zip(&values) {
            prop_assert_eq!(*word, *value as u32);
        }

        let floats = DenseElements::Float(values.iter().map(|&v| f64::from(v)).collect());
        prop_assert_eq!(
            encode_global_words(&ElementType::F64, &floats).unwrap().len(),
            values.len() * 2
        );
        prop_assert_eq!(
            encode_global_words(&ElementType::F32, &floats).unwrap().len(),
            values.len()
        );
    }
}
