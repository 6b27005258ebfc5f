//! # relaxr
//!
//! **Parallel relaxation solver for dense linear systems `A·x = b`.**
//!
//! relaxr runs a relaxation sweep over all unknowns at once on a compute
//! device, reduces the per-unknown update magnitudes to a single residual
//! with a two-stage block reduction, and repeats until the residual drops
//! below a tolerance. A sequential Gauss-Seidel solver is included as the
//! correctness reference.
//!
//! ## Features
//!
//! - **Backends**: a host-emulated device (CPU, `f32`/`f64`) and WebGPU
//!   (`f32`) behind one [`ComputeBackend`](runtime::ComputeBackend) trait
//! - **Explicit sessions**: a [`DeviceSession`](solver::DeviceSession) owns
//!   every buffer and bound routine of a solve
//! - **Pluggable kernels**: the WGSL routines can be replaced at run time
//!   through [`KernelSource`](runtime::source::KernelSource)
//!
//! ## Quick Start
//!
//! ```
//! use relaxr::prelude::*;
//!
//! let system = LinearSystem::<f64>::canonical(64);
//! let session = DeviceSession::new(CpuClient::default(), &system, SolverOptions::default())?;
//! let solution = session.solve()?;
//!
//! let mut reference = system.clone();
//! relaxr::algorithm::solve(&mut reference, 1e-4);
//! for (p, r) in solution.x.iter().zip(reference.x()) {
//!     assert!((p - r).abs() < 1e-3);
//! }
//! # Ok::<(), relaxr::error::Error>(())
//! ```
//!
//! ## Hazards
//!
//! Neither solver has an iteration cap. A zero pivot, a matrix that is not
//! diagonally dominant, or a relaxation factor outside (0, 2) makes a solve
//! loop forever; these are not detected.
//!
//! ## Feature Flags
//!
//! - `rayon` (default): run groups of the CPU device concurrently
//! - `wgpu`: cross-platform GPU via WebGPU
//! - `cli` (default): the `relaxr` demo binary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithm;
pub mod dtype;
pub mod error;
pub mod runtime;
pub mod solver;
pub mod system;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::{DType, Real};
    pub use crate::error::{Error, Result};
    pub use crate::runtime::cpu::{CpuClient, CpuDevice};
    pub use crate::runtime::source::KernelSource;
    pub use crate::runtime::{Access, ComputeBackend, Device, DeviceBuffer};
    pub use crate::solver::{ConvergenceLoop, DeviceSession, LoopState, Solution, SolverOptions};
    pub use crate::system::LinearSystem;

    #[cfg(feature = "wgpu")]
    pub use crate::runtime::wgpu::{WgpuClient, WgpuDevice};
}

/// Backend used when none is chosen: the CPU device in `f64`
///
/// The WebGPU backend needs a kernel source and an adapter, so it is always
/// opened explicitly.
pub type DefaultBackend = runtime::cpu::CpuClient<f64>;
