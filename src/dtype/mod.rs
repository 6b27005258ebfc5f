//! Element types for linear systems and device buffers
//!
//! The solver is generic over the floating point precision of its elements.
//! `DType` is the runtime tag a backend uses to decide whether it can hold a
//! given element type; `Real` connects Rust's `f32`/`f64` to that tag.

mod element;

pub use element::Real;

use std::fmt;

// ============================================================================
// DType Enum
// ============================================================================

/// Floating point types a backend may support
///
/// The discriminant values are stable (F64=0, F32=1).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point
    F32 = 1,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 => 8,
            Self::F32 => 4,
        }
    }

    /// Short name of the dtype
    pub const fn name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
