//! Host-side convergence loop
//!
//! ```text
//!            ┌───────────── residual > tol ─────────────┐
//!            v                                          │
//! Iterating: relax_sweep → block_sum ×2 → read scalar ──┤
//!                                                       │ residual ≤ tol
//!                                                       v
//!                                                   Converged → read x
//! ```
//!
//! There is no iteration cap. A NaN residual compares false against the
//! tolerance, so a diverged solve keeps iterating; callers that need a bound
//! drive [`ConvergenceLoop::step`] themselves.

use num_traits::Float;
use tracing::{info, trace};

use super::session::DeviceSession;
use crate::error::Result;
use crate::runtime::ComputeBackend;

/// State of a [`ConvergenceLoop`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Residual still above tolerance
    Iterating,
    /// Residual at or below tolerance
    Converged,
}

/// Result of a converged parallel solve
#[derive(Clone, Debug, PartialEq)]
pub struct Solution<T> {
    /// Unknowns after the final sweep
    pub x: Vec<T>,
    /// Number of sweeps performed
    pub sweeps: usize,
    /// Reduced `Σ|Δx|` of the final sweep
    pub residual: T,
}

/// Alternates relaxation sweeps and residual reductions until convergence
pub struct ConvergenceLoop<'s, B: ComputeBackend> {
    session: &'s DeviceSession<B>,
    tol: B::Elem,
    state: LoopState,
    sweeps: usize,
    residual: B::Elem,
}

impl<'s, B: ComputeBackend> ConvergenceLoop<'s, B> {
    /// Start a loop over `session` that stops once `Σ|Δx| ≤ tol`.
    ///
    /// The residual starts at +∞, so the first step always sweeps.
    pub fn new(session: &'s DeviceSession<B>, tol: B::Elem) -> Self {
        Self {
            session,
            tol,
            state: LoopState::Iterating,
            sweeps: 0,
            residual: B::Elem::infinity(),
        }
    }

    /// Perform one iteration: a sweep, both reduction stages and a blocking
    /// read of the scalar. A converged loop does nothing.
    pub fn step(&mut self) -> Result<LoopState> {
        if self.state == LoopState::Converged {
            return Ok(self.state);
        }

        let backend = self.session.backend();
        self.session.relaxation().launch(backend)?;
        self.residual = self.session.reduction().reduce(backend)?;
        self.sweeps += 1;
        trace!(sweep = self.sweeps, residual = %self.residual, "relaxation sweep");

        if self.residual <= self.tol {
            self.state = LoopState::Converged;
            info!(sweeps = self.sweeps, residual = %self.residual, "parallel solve converged");
        }
        Ok(self.state)
    }

    /// Step until converged, then read the unknowns.
    ///
    /// Never returns on a system that does not converge.
    pub fn run(&mut self) -> Result<Solution<B::Elem>> {
        while self.step()? == LoopState::Iterating {}
        Ok(Solution {
            x: self.session.read_x()?,
            sweeps: self.sweeps,
            residual: self.residual,
        })
    }

    /// Current state
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Sweeps performed so far
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Residual of the latest sweep (+∞ before the first)
    pub fn residual(&self) -> B::Elem {
        self.residual
    }
}
