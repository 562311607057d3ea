//! Element, buffer and register type definitions

use crate::{Error, Result};
use std::fmt;

/// Scalar element types a buffer can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Signless integer of the given bit-width (`i1`, `i8`, `i32`, ...)
    Int(u32),
    /// Target-sized index type
    Index,
    /// 16-bit IEEE float
    F16,
    /// 32-bit IEEE float
    F32,
    /// 64-bit IEEE float
    F64,
}

impl ElementType {
    /// Returns true for all float kinds, including ones the lowering rejects
    pub fn is_float(&self) -> bool {
        matches!(self, ElementType::F16 | ElementType::F32 | ElementType::F64)
    }

    /// Returns the width of this element type in bits
    ///
    /// Only integers, f32 and f64 have a width the lowering can address.
    pub fn bitwidth(&self) -> Result<u32> {
        match self {
            ElementType::Int(width) => Ok(*width),
            ElementType::F32 => Ok(32),
            ElementType::F64 => Ok(64),
            ElementType::Index | ElementType::F16 => Err(Error::UnsupportedElementType {
                element: self.to_string(),
            }),
        }
    }

    /// Returns the width of this element type in bytes
    pub fn byte_size(&self) -> Result<i64> {
        let bitwidth = self.bitwidth()?;
        if bitwidth % 8 != 0 {
            return Err(Error::UnrepresentableElementSize {
                element: self.to_string(),
                bitwidth,
            });
        }
        Ok(i64::from(bitwidth / 8))
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Int(width) => write!(f, "i{}", width),
            ElementType::Index => write!(f, "index"),
            ElementType::F16 => write!(f, "f16"),
            ElementType::F32 => write!(f, "f32"),
            ElementType::F64 => write!(f, "f64"),
        }
    }
}

/// A statically known extent, stride or offset, or a runtime one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    /// Known at compile time
    Static(i64),
    /// Only known at runtime
    Dynamic,
}

impl Dim {
    /// Returns the static value, if known
    pub fn as_static(&self) -> Option<i64> {
        match self {
            Dim::Static(value) => Some(*value),
            Dim::Dynamic => None,
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Static(value) => write!(f, "{}", value),
            Dim::Dynamic => write!(f, "?"),
        }
    }
}

/// Addressing scheme of a buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Dense row-major
    Default,
    /// Explicit per-dimension element strides plus an element offset
    Strided {
        /// Element stride of each dimension
        strides: Vec<Dim>,
        /// Element offset of the first element from the base pointer
        offset: Dim,
    },
    /// Arbitrary affine map (kept as text, never lowered)
    AffineMap(String),
}

impl Layout {
    /// Strided layout with a zero offset
    pub fn strided(strides: impl IntoIterator<Item = Dim>) -> Self {
        Layout::Strided {
            strides: strides.into_iter().collect(),
            offset: Dim::Static(0),
        }
    }

    /// Strided layout with an explicit offset
    pub fn strided_with_offset(strides: impl IntoIterator<Item = Dim>, offset: Dim) -> Self {
        Layout::Strided {
            strides: strides.into_iter().collect(),
            offset,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Default => write!(f, "none"),
            Layout::Strided { strides, offset } => {
                let strides: Vec<String> = strides.iter().map(|s| s.to_string()).collect();
                write!(f, "strided<[{}], offset: {}>", strides.join(", "), offset)
            }
            Layout::AffineMap(map) => write!(f, "affine_map<{}>", map),
        }
    }
}

/// Shape-typed buffer ("memref") type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferType {
    /// Element type
    pub element: ElementType,
    /// Extent of each dimension (rank 0 allowed)
    pub shape: Vec<Dim>,
    /// Addressing scheme
    pub layout: Layout,
}

impl BufferType {
    /// Dense row-major buffer with a fully static shape
    pub fn new(element: ElementType, shape: impl IntoIterator<Item = i64>) -> Self {
        Self {
            element,
            shape: shape.into_iter().map(Dim::Static).collect(),
            layout: Layout::Default,
        }
    }

    /// Dense row-major buffer with possibly dynamic extents
    pub fn with_dims(element: ElementType, shape: impl IntoIterator<Item = Dim>) -> Self {
        Self {
            element,
            shape: shape.into_iter().collect(),
            layout: Layout::Default,
        }
    }

    /// Replace the layout, checking that strided layouts match the rank
    pub fn with_layout(mut self, layout: Layout) -> Result<Self> {
        if let Layout::Strided { strides, .. } = &layout {
            if strides.len() != self.shape.len() {
                return Err(Error::malformed(format!(
                    "strided layout {} has {} strides for rank {} shape",
                    layout,
                    strides.len(),
                    self.shape.len()
                )));
            }
        }
        self.layout = layout;
        Ok(self)
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// All extents, or None if any is dynamic
    pub fn static_shape(&self) -> Option<Vec<i64>> {
        self.shape.iter().map(Dim::as_static).collect()
    }

    /// Shape rendered as `2x3`, or `scalar` for rank 0
    pub fn shape_string(&self) -> String {
        if self.shape.is_empty() {
            return "scalar".to_string();
        }
        let dims: Vec<String> = self.shape.iter().map(|d| d.to_string()).collect();
        dims.join("x")
    }
}

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memref<")?;
        for dim in &self.shape {
            write!(f, "{}x", dim)?;
        }
        write!(f, "{}", self.element)?;
        if self.layout != Layout::Default {
            write!(f, ", {}", self.layout)?;
        }
        write!(f, ">")
    }
}

/// ABI names of the 32 integer registers, indexed by register number
const INT_ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// ABI names of the 32 float registers, indexed by register number
const FLOAT_ABI_NAMES: [&str; 32] = [
    "ft0", "ft1", "ft2", "ft3", "ft4", "ft5", "ft6", "ft7", "fs0", "fs1", "fa0", "fa1", "fa2",
    "fa3", "fa4", "fa5", "fa6", "fa7", "fs2", "fs3", "fs4", "fs5", "fs6", "fs7", "fs8", "fs9",
    "fs10", "fs11", "ft8", "ft9", "ft10", "ft11",
];

/// Integer register, physical or left for the register allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntRegister {
    /// Resolved by a later register allocation pass
    Unallocated,
    /// Physical register x0-x31
    Physical(u8),
}

impl IntRegister {
    /// First argument / return value register
    pub const A0: IntRegister = IntRegister::Physical(10);
    /// Hard-wired zero
    pub const ZERO: IntRegister = IntRegister::Physical(0);

    /// ABI name, None when unallocated
    pub fn name(&self) -> Option<&'static str> {
        match self {
            IntRegister::Unallocated => None,
            IntRegister::Physical(n) => INT_ABI_NAMES.get(*n as usize).copied(),
        }
    }
}

impl fmt::Display for IntRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "!riscv.reg<{}>", name),
            None => write!(f, "!riscv.reg"),
        }
    }
}

/// Float register, physical or left for the register allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatRegister {
    /// Resolved by a later register allocation pass
    Unallocated,
    /// Physical register f0-f31
    Physical(u8),
}

impl FloatRegister {
    /// First float argument / return value register
    pub const FA0: FloatRegister = FloatRegister::Physical(10);

    /// ABI name, None when unallocated
    pub fn name(&self) -> Option<&'static str> {
        match self {
            FloatRegister::Unallocated => None,
            FloatRegister::Physical(n) => FLOAT_ABI_NAMES.get(*n as usize).copied(),
        }
    }
}

impl fmt::Display for FloatRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "!riscv.freg<{}>", name),
            None => write!(f, "!riscv.freg"),
        }
    }
}

/// Type of an SSA value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Scalar (index, integer or float)
    Element(ElementType),
    /// Buffer
    Buffer(BufferType),
    /// Value held in an integer register
    IntReg(IntRegister),
    /// Value held in a float register
    FloatReg(FloatRegister),
}

impl Type {
    /// Register type a value of this type lives in after lowering
    ///
    /// Floats go to float registers, everything else (buffers, index,
    /// integers) to integer registers.
    pub fn register_type(&self) -> Type {
        match self {
            Type::Element(element) if element.is_float() => {
                Type::FloatReg(FloatRegister::Unallocated)
            }
            Type::FloatReg(reg) => Type::FloatReg(*reg),
            Type::IntReg(reg) => Type::IntReg(*reg),
            _ => Type::IntReg(IntRegister::Unallocated),
        }
    }

    /// Returns the buffer type, if this is one
    pub fn as_buffer(&self) -> Option<&BufferType> {
        match self {
            Type::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Element(element) => write!(f, "{}", element),
            Type::Buffer(buffer) => write!(f, "{}", buffer),
            Type::IntReg(reg) => write!(f, "{}", reg),
            Type::FloatReg(reg) => write!(f, "{}", reg),
        }
    }
}

/// Register class selecting load/store instruction width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    /// Word-sized integer access (`lw`/`sw`)
    Int,
    /// Single-precision float access (`flw`/`fsw`)
    Float32,
    /// Double-precision float access (`fld`/`fsd`)
    Float64,
}

impl RegisterClass {
    /// Register class for values of an element type
    pub fn for_element(element: &ElementType) -> Result<Self> {
        match element {
            ElementType::Int(_) | ElementType::Index => Ok(RegisterClass::Int),
            ElementType::F32 => Ok(RegisterClass::Float32),
            ElementType::F64 => Ok(RegisterClass::Float64),
            ElementType::F16 => Err(Error::UnsupportedElementType {
                element: element.to_string(),
            }),
        }
    }

    /// Returns true for the float classes
    pub fn is_float(&self) -> bool {
        !matches!(self, RegisterClass::Int)
    }

    /// Unallocated register type of this class
    pub fn unallocated(&self) -> Type {
        if self.is_float() {
            Type::FloatReg(FloatRegister::Unallocated)
        } else {
            Type::IntReg(IntRegister::Unallocated)
        }
    }
}
