//! # Layout Resolver
//!
//! Maps a buffer type to the element stride of each of its dimensions.
//!
//! Dynamic strides are returned as [`Dim::Dynamic`] rather than rejected: a
//! stride is only an error once an address computation consumes it.

use super::ir::{BufferType, Dim, Layout};
use crate::{Error, Result};

/// Row-major strides of a dense buffer of the given shape
///
/// The last dimension has stride 1; every other dimension's stride is the
/// product of all extents to its right. A dynamic extent makes every stride
/// to its left dynamic. Returns `None` if a stride does not fit in an `i64`.
pub fn strides_for_shape(shape: &[Dim]) -> Option<Vec<Dim>> {
    let mut strides = vec![Dim::Static(1); shape.len()];
    let mut running = Dim::Static(1);
    for (i, (stride, extent)) in strides.iter_mut().zip(shape).enumerate().rev() {
        *stride = running;
        // the product past the outermost dimension is never a stride
        if i == 0 {
            break;
        }
        running = match (running, extent) {
            (Dim::Static(acc), Dim::Static(size)) => Dim::Static(acc.checked_mul(*size)?),
            _ => Dim::Dynamic,
        };
    }
    Some(strides)
}

/// Element strides of a buffer, per dimension
pub fn resolve_strides(ty: &BufferType) -> Result<Vec<Dim>> {
    match &ty.layout {
        Layout::Default => strides_for_shape(&ty.shape).ok_or_else(|| Error::SizeOverflow {
            ty: ty.to_string(),
        }),
        Layout::Strided { strides, .. } => Ok(strides.clone()),
        Layout::AffineMap(_) => Err(Error::LayoutUnsupported {
            layout: ty.layout.to_string(),
        }),
    }
}

/// Strides and element size of a buffer, ready for address computation
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayout {
    /// Element stride of each dimension
    pub strides: Vec<Dim>,
    /// Element size in bytes
    pub element_size: i64,
    /// Buffer type the layout was resolved from, for diagnostics
    pub buffer: String,
}

impl ResolvedLayout {
    /// Resolve element size and strides of a buffer type
    pub fn resolve(ty: &BufferType) -> Result<Self> {
        let element_size = ty.element.byte_size()?;
        let strides = resolve_strides(ty)?;
        Ok(Self {
            strides,
            element_size,
            buffer: ty.to_string(),
        })
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.strides.len()
    }

    /// Static stride of a dimension
    pub fn stride(&self, dim: usize) -> Result<i64> {
        match self.strides.get(dim) {
            Some(Dim::Static(stride)) => Ok(*stride),
            Some(Dim::Dynamic) => Err(Error::UnstridedDynamic {
                ty: self.buffer.clone(),
            }),
            None => Err(Error::malformed(format!(
                "dimension {} out of range for {}",
                dim, self.buffer
            ))),
        }
    }
}

/// Total number of elements of a fully static buffer
pub fn element_count(ty: &BufferType) -> Result<i64> {
    let shape = ty.static_shape().ok_or_else(|| Error::DynamicShape {
        ty: ty.to_string(),
    })?;
    shape
        .iter()
        .try_fold(1i64, |acc, &extent| acc.checked_mul(extent))
        .ok_or_else(|| Error::SizeOverflow { ty: ty.to_string() })
}
