//! Sequential Gauss-Seidel reference solver
//!
//! Each unknown is updated in place, so later updates in the same sweep see
//! the values written earlier in that sweep. This is true Gauss-Seidel and
//! serves as the oracle the parallel solver is compared against.
//!
//! # Termination
//!
//! There is no iteration cap. A system that does not converge (not
//! diagonally dominant, zero or tiny pivot) keeps [`solve`] looping forever.
//! Callers that need a bound drive [`sweep`] themselves.

use tracing::{debug, trace};

use crate::dtype::Real;
use crate::system::{LinearSystem, col_major};

/// Outcome of a converged reference solve
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceReport<T> {
    /// Number of sweeps performed
    pub sweeps: usize,
    /// Accumulated `Σ|Δx|` of the final sweep
    pub residual: T,
}

/// Perform one in-place Gauss-Seidel sweep and return `Σ|x_new − x_old|`.
pub fn sweep<T: Real>(system: &mut LinearSystem<T>) -> T {
    let n = system.n();
    let (a, b, x) = system.parts_mut();

    let mut resid = T::zero();
    for i in 0..n {
        let mut off_diag = T::zero();
        for j in 0..n {
            if j != i {
                off_diag = off_diag + a[col_major(i, j, n)] * x[j];
            }
        }
        let temp = (b[i] - off_diag) / a[col_major(i, i, n)];
        resid = resid + (temp - x[i]).abs();
        x[i] = temp;
    }
    resid
}

/// Sweep until the accumulated residual is at most `tol`.
///
/// Loops indefinitely on non-convergent input.
pub fn solve<T: Real>(system: &mut LinearSystem<T>, tol: T) -> ReferenceReport<T> {
    let mut sweeps = 0;
    loop {
        let residual = sweep(system);
        sweeps += 1;
        trace!(sweeps, residual = %residual, "reference sweep");
        if residual <= tol {
            debug!(sweeps, residual = %residual, "reference solver converged");
            return ReferenceReport { sweeps, residual };
        }
    }
}

/// Largest elementwise `|a[i] − b[i]|`, widened to f64.
///
/// Compares the common prefix when the lengths differ.
pub fn max_abs_diff<T: Real>(a: &[T], b: &[T]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(p, r)| (*p - *r).abs().into_f64())
        .fold(0.0, f64::max)
}
