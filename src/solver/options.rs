//! Solver configuration

use tracing::warn;

use crate::error::{Error, Result};
use crate::runtime::DeviceLimits;

/// Default convergence tolerance on `Σ|Δx|`
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Default relaxation factor (plain Jacobi)
pub const DEFAULT_OMEGA: f64 = 1.0;

/// Default cooperative group size for both routines
pub const DEFAULT_GROUP_SIZE: usize = 64;

/// Options for a parallel solve
///
/// # Example
///
/// ```
/// use relaxr::solver::SolverOptions;
///
/// let options = SolverOptions::default()
///     .with_tolerance(1e-6)
///     .with_omega(1.2)
///     .with_num_blocks(4);
/// assert_eq!(options.num_blocks(1000), 4);
/// assert_eq!(SolverOptions::default().num_blocks(130), 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SolverOptions {
    /// Convergence threshold: the loop stops once `Σ|Δx| ≤ tolerance`
    pub tolerance: f64,
    /// Relaxation factor ω; values outside (0, 2) are accepted but diverge
    pub omega: f64,
    /// Workers per group for `relax_sweep`
    pub relax_group_size: usize,
    /// Workers per group for `block_sum`
    pub reduce_group_size: usize,
    /// Stage-1 reduction blocks; `None` means `ceil(n / reduce_group_size)`
    pub num_blocks: Option<usize>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            omega: DEFAULT_OMEGA,
            relax_group_size: DEFAULT_GROUP_SIZE,
            reduce_group_size: DEFAULT_GROUP_SIZE,
            num_blocks: None,
        }
    }
}

impl SolverOptions {
    /// Set the convergence tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the relaxation factor
    pub fn with_omega(mut self, omega: f64) -> Self {
        self.omega = omega;
        self
    }

    /// Set the group size of the relaxation routine
    pub fn with_relax_group_size(mut self, group_size: usize) -> Self {
        self.relax_group_size = group_size;
        self
    }

    /// Set the group size of the reduction routine
    pub fn with_reduce_group_size(mut self, group_size: usize) -> Self {
        self.reduce_group_size = group_size;
        self
    }

    /// Fix the number of stage-1 reduction blocks
    pub fn with_num_blocks(mut self, num_blocks: usize) -> Self {
        self.num_blocks = Some(num_blocks);
        self
    }

    /// Stage-1 block count for a system of `n` unknowns
    pub fn num_blocks(&self, n: usize) -> usize {
        self.num_blocks
            .unwrap_or_else(|| n.div_ceil(self.reduce_group_size.max(1)).max(1))
    }

    /// Check the options for a system of size `n` on a device with `limits`.
    ///
    /// An ω outside (0, 2) is only logged: it is a numerical hazard, not an
    /// argument error.
    pub fn validate(&self, n: usize, limits: &DeviceLimits) -> Result<()> {
        if n == 0 {
            return Err(Error::invalid_argument("n", "system size must be positive"));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(Error::invalid_argument(
                "tolerance",
                format!("{} is not a non-negative number", self.tolerance),
            ));
        }
        if !self.omega.is_finite() {
            return Err(Error::invalid_argument(
                "omega",
                format!("{} is not finite", self.omega),
            ));
        }
        if self.omega <= 0.0 || self.omega >= 2.0 {
            warn!(omega = self.omega, "relaxation factor outside (0, 2); the solve may not converge");
        }

        check_group_size("relax_group_size", self.relax_group_size, limits)?;
        check_group_size("reduce_group_size", self.reduce_group_size, limits)?;

        if n > limits.max_scratch_elems {
            return Err(Error::backend_limitation(
                "device",
                "relax_sweep",
                format!(
                    "{} unknowns do not fit the group-local scratch of {} elements",
                    n, limits.max_scratch_elems
                ),
            ));
        }
        if self.num_blocks == Some(0) {
            return Err(Error::invalid_argument(
                "num_blocks",
                "at least one reduction block is required",
            ));
        }
        check_group_count("relax_sweep", n.div_ceil(self.relax_group_size), limits)?;
        check_group_count("block_sum", self.num_blocks(n), limits)

    }
}

fn check_group_size(arg: &'static str, size: usize, limits: &DeviceLimits) -> Result<()> {
    if size == 0 || !size.is_power_of_two() {
        return Err(Error::invalid_argument(
            arg,
            format!("{} is not a power of two", size),
        ));
    }
    if size > limits.max_group_size {
        return Err(Error::invalid_argument(
            arg,
            format!("{} exceeds the device maximum of {}", size, limits.max_group_size),
        ));
    }
    Ok(())
}

fn check_group_count(operation: &'static str, groups: usize, limits: &DeviceLimits) -> Result<()> {
    if groups > limits.max_groups {
        return Err(Error::backend_limitation(
            "device",
            operation,
            format!("{} groups exceed the device maximum of {}", groups, limits.max_groups),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: DeviceLimits = DeviceLimits {
        max_group_size: 256,
        max_scratch_elems: 1024,
        max_groups: 512,
        view_alignment: 8,
    };

    #[test]
    fn test_defaults() {
        let options = SolverOptions::default();
        assert_eq!(options.tolerance, 1e-4);
        assert_eq!(options.omega, 1.0);
        assert_eq!(options.num_blocks(128), 2);
        assert_eq!(options.num_blocks(1), 1);
        assert!(options.validate(128, &LIMITS).is_ok());
    }

    #[test]
    fn test_rejects_bad_group_sizes() {
        let options = SolverOptions::default().with_relax_group_size(48);
        assert!(options.validate(16, &LIMITS).is_err());
        let options = SolverOptions::default().with_reduce_group_size(512);
        assert!(options.validate(16, &LIMITS).is_err());
    }

    #[test]
    fn test_rejects_oversized_system() {
        let err = SolverOptions::default().validate(2048, &LIMITS).unwrap_err();
        assert!(matches!(err, Error::BackendLimitation { .. }));
    }

    #[test]
    fn test_rejects_block_count_over_device_maximum() {
        let options = SolverOptions::default().with_num_blocks(512);
        assert!(options.validate(16, &LIMITS).is_ok());
        let err = SolverOptions::default()
            .with_num_blocks(usize::MAX)
            .validate(16, &LIMITS)
            .unwrap_err();
        assert!(matches!(err, Error::BackendLimitation { .. }));
    }

    #[test]
    fn test_rejects_relax_group_count_over_device_maximum() {
        let options = SolverOptions::default().with_relax_group_size(1);
        assert!(options.validate(512, &LIMITS).is_ok());
        assert!(options.validate(513, &LIMITS).is_err());
    }

    #[test]
    fn test_divergent_omega_is_accepted() {
        let options = SolverOptions::default().with_omega(2.5);
        assert!(options.validate(8, &LIMITS).is_ok());
        let options = SolverOptions::default().with_tolerance(f64::NAN);
        assert!(options.validate(8, &LIMITS).is_err());
    }
}
