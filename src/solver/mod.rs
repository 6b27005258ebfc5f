//! Parallel relaxation solver
//!
//! A [`DeviceSession`] uploads a [`LinearSystem`](crate::system::LinearSystem)
//! and binds the two routines; a [`ConvergenceLoop`] drives them:
//!
//! ```
//! use relaxr::prelude::*;
//!
//! let system = LinearSystem::<f64>::canonical(16);
//! let session = DeviceSession::new(CpuClient::default(), &system, SolverOptions::default())?;
//! let solution = session.solve()?;
//! assert!(solution.residual <= 1e-4);
//! # Ok::<(), relaxr::error::Error>(())
//! ```

pub mod convergence;
pub mod options;
pub mod reduce;
pub mod relax;
pub mod session;

pub use convergence::{ConvergenceLoop, LoopState, Solution};
pub use options::{DEFAULT_GROUP_SIZE, DEFAULT_OMEGA, DEFAULT_TOLERANCE, SolverOptions};
pub use reduce::{PartialsLayout, ResidualReduction};
pub use relax::RelaxationKernel;
pub use session::DeviceSession;
