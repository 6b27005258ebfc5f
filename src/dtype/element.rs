//! Real trait for mapping Rust float types to DType

use super::DType;
use bytemuck::Pod;
use num_traits::Float;
use std::fmt::{Debug, Display};

/// Trait for floating point types that can be elements of a linear system
///
/// # Bounds
/// - `Float` - arithmetic, `abs`, `infinity` (num-traits)
/// - `Pod` - safe transmutation into device transfer bytes (bytemuck)
/// - `Send + Sync + 'static` - shared between host and device workers
///
/// Device memory on the host-emulated backend is a slice of 64-bit atomic
/// words. `to_word`/`from_word` move an element in and out of such a word
/// without changing its bit pattern.
pub trait Real: Float + Pod + Send + Sync + Debug + Display + 'static {
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 (lossless for both supported types)
    fn into_f64(self) -> f64;

    /// Convert from f64, rounding to nearest for `f32`
    fn cast_f64(v: f64) -> Self;

    /// Raw bit pattern, zero-extended into a device word
    fn to_word(self) -> u64;

    /// Inverse of `to_word`
    fn from_word(word: u64) -> Self;
}

impl Real for f64 {
    const DTYPE: DType = DType::F64;

    #[inline]
    fn into_f64(self) -> f64 {
        self
    }

    #[inline]
    fn cast_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn to_word(self) -> u64 {
        self.to_bits()
    }

    #[inline]
    fn from_word(word: u64) -> Self {
        f64::from_bits(word)
    }
}

impl Real for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn into_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn cast_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn to_word(self) -> u64 {
        self.to_bits() as u64
    }

    #[inline]
    fn from_word(word: u64) -> Self {
        f32::from_bits(word as u32)
    }
}
