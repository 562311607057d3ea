//! Error types for memref lowering

use thiserror::Error;

/// Lowering diagnostics
///
/// Every variant is fatal to the pass invocation: a lowering either fully
/// succeeds for an operation or the whole pass fails.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Buffer layout is neither the default row-major layout nor a strided layout
    ///
    /// **Triggered by:** an affine-map layout on a loaded, stored or subviewed buffer
    #[error("Unsupported layout type {layout}")]
    LayoutUnsupported {
        /// The offending layout, rendered
        layout: String,
    },

    /// A dimension stride consumed by an address computation is not statically known
    #[error("MemRef {ty} with dynamic stride is not yet implemented")]
    UnstridedDynamic {
        /// The buffer type carrying the dynamic stride
        ty: String,
    },

    /// Element bit-width is not a whole number of bytes
    ///
    /// **Example:** `memref<4xi1>` has 1-bit elements
    #[error("Cannot determine size for element type {element} with bitwidth {bitwidth}")]
    UnrepresentableElementSize {
        /// Element type, rendered
        element: String,
        /// Declared bit-width
        bitwidth: u32,
    },

    /// Global initializer is not dense, or its element kind is not i32, f32 or f64
    #[error("Unsupported memref.global {reason}: {attr}")]
    UnsupportedGlobal {
        /// What is wrong with the global
        reason: String,
        /// The offending initializer or element type, rendered
        attr: String,
    },

    /// Element kind outside {integer, f32, f64} where a bit-width is needed
    #[error("Unsupported memref element type for riscv lowering: {element}")]
    UnsupportedElementType {
        /// Element type, rendered
        element: String,
    },

    /// Allocation of a buffer whose shape is not fully static
    #[error("Cannot allocate memref {ty} with dynamic shape")]
    DynamicShape {
        /// The buffer type, rendered
        ty: String,
    },

    /// Byte size or byte offset of a buffer does not fit in 64 bits
    ///
    /// **Example:** `memref<2147483648x2147483648xi32>` needs 2^64 bytes
    #[error("Size of memref {ty} overflows 64-bit arithmetic")]
    SizeOverflow {
        /// The buffer type, rendered
        ty: String,
    },

    /// The module is not well-formed for this pass
    #[error("Malformed IR: {0}")]
    MalformedIr(String),

    /// Rewrite walk did not reach a fixpoint
    #[error("Rewrite did not converge after {limit} walks")]
    IterationLimit {
        /// Maximum number of walks allowed
        limit: usize,
    },

    /// Post-lowering verification failed
    #[error("Lowered module failed verification: {}", errors.join("; "))]
    VerificationFailed {
        /// One message per verification error
        errors: Vec<String>,
    },

    /// Options could not be loaded
    #[error("Invalid lowering options: {0}")]
    Config(String),
}

impl Error {
    /// Create a malformed-IR error with a message
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedIr(msg.into())
    }

    /// Create an unsupported-global error
    pub fn unsupported_global(reason: impl Into<String>, attr: impl ToString) -> Self {
        Error::UnsupportedGlobal {
            reason: reason.into(),
            attr: attr.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type for lowering operations
pub type Result<T> = std::result::Result<T, Error>;
