//! Host-side algorithms that run without a device
//!
//! - [`reference`] - sequential Gauss-Seidel, the correctness oracle for the
//!   parallel solver in [`crate::solver`]

pub mod reference;

pub use reference::{ReferenceReport, max_abs_diff, solve, sweep};
