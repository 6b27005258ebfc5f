//! Kernel descriptions shared by all backends
//!
//! A backend receives a [`Kernel`] (which routine, which arguments) and a
//! [`LaunchDims`] (how many workers, how they are grouped). The checks in
//! this module run before anything reaches a device, so an invalid launch is
//! reported as an error instead of an out-of-bounds access on the device.

use super::{Access, DeviceBuffer, DeviceLimits};
use crate::dtype::Real;
use crate::error::{Error, Result};

/// Entry point of the relaxation routine
pub const RELAX_ENTRY: &str = "relax_sweep";

/// Entry point of the block reduction routine
pub const BLOCK_SUM_ENTRY: &str = "block_sum";

// ============================================================================
// Kernel
// ============================================================================

/// A parallel routine together with its arguments.
#[derive(Clone, Debug)]
pub enum Kernel<B, T> {
    /// One relaxation sweep over all `n` unknowns.
    ///
    /// Worker `i` reads a group-local snapshot of `x`, computes
    /// `temp = (b[i] − Σ_{j≠i} A[i,j]·x[j]) / A[i,i]`, blends it with
    /// `x_new = x + omega·(temp − x)`, stores `|x_new − x|` into `resid[i]`
    /// and writes `x[i]`. Only worker `i` writes slot `i`.
    ///
    /// Every worker reads the snapshot taken by its own group, so this is a
    /// Jacobi update with over-relaxation, not Gauss-Seidel. The CPU device
    /// finishes every group's snapshot before any group writes, which makes
    /// the sweep exact Jacobi. On a GPU nothing orders groups within a
    /// dispatch, so a group that loads late may see some new values.
    RelaxSweep {
        /// Unknowns (read-write)
        x: B,
        /// Column-major `n × n` coefficients
        a: B,
        /// Right-hand side
        b: B,
        /// Per-unknown update magnitude (read-write)
        resid: B,
        /// System size
        n: usize,
        /// Relaxation factor
        omega: T,
    },

    /// Fold `count` elements of `input` into one sum per group.
    ///
    /// Group `g` covers `[g·chunk, min((g+1)·chunk, count))` with
    /// `chunk = ceil(count / num_groups)` and writes its sum to `output[g]`.
    BlockSum {
        /// Elements to reduce
        input: B,
        /// One slot per group (read-write)
        output: B,
        /// Number of input elements
        count: usize,
    },
}

impl<B: DeviceBuffer, T: Real> Kernel<B, T> {
    /// Entry point name of the routine
    pub fn entry_point(&self) -> &'static str {
        match self {
            Kernel::RelaxSweep { .. } => RELAX_ENTRY,
            Kernel::BlockSum { .. } => BLOCK_SUM_ENTRY,
        }
    }

    /// Group-local scratch length in elements for a given group size
    pub fn scratch_len(&self, group_size: usize) -> usize {
        match self {
            Kernel::RelaxSweep { n, .. } => *n,
            Kernel::BlockSum { .. } => group_size,
        }
    }

    /// Validate argument buffers; called by every backend's `bind`.
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Kernel::RelaxSweep {
                x,
                a,
                b,
                resid,
                n,
                ..
            } => {
                if *n == 0 {
                    return Err(Error::invalid_argument("n", "system size must be positive"));
                }
                require_len(a, n * n)?;
                for v in [x, b, resid] {
                    require_len(v, *n)?;
                }
                require_writable(RELAX_ENTRY, x)?;
                require_writable(RELAX_ENTRY, resid)
            }
            Kernel::BlockSum {
                input,
                output,
                count,
            } => {
                require_len(input, *count)?;
                if output.is_empty() {
                    return Err(Error::invalid_argument(
                        "output",
                        "reduction output must hold at least one element",
                    ));
                }
                require_writable(BLOCK_SUM_ENTRY, output)
            }
        }
    }

    /// Validate a launch of this kernel against its arguments and device limits.
    pub(crate) fn validate_launch(&self, dims: LaunchDims, limits: &DeviceLimits) -> Result<()> {
        dims.validate(limits)?;
        let scratch = self.scratch_len(dims.group_size);
        if scratch > limits.max_scratch_elems {
            return Err(Error::invalid_argument(
                "scratch",
                format!(
                    "{} needs {} scratch elements per group, device allows {}",
                    self.entry_point(),
                    scratch,
                    limits.max_scratch_elems
                ),
            ));
        }
        match self {
            Kernel::RelaxSweep { n, .. } => {
                if dims.global_size < *n {
                    return Err(Error::invalid_argument(
                        "global_size",
                        format!("{} workers cannot cover {} unknowns", dims.global_size, n),
                    ));
                }
            }
            Kernel::BlockSum { output, .. } => {
                if output.len() < dims.num_groups() {
                    return Err(Error::LengthMismatch {
                        expected: dims.num_groups(),
                        got: output.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn require_len<B: DeviceBuffer>(buffer: &B, len: usize) -> Result<()> {
    if buffer.len() < len {
        return Err(Error::LengthMismatch {
            expected: len,
            got: buffer.len(),
        });
    }
    Ok(())
}

fn require_writable<B: DeviceBuffer>(kernel: &'static str, buffer: &B) -> Result<()> {
    if buffer.access() == Access::ReadOnly {
        return Err(Error::ReadOnlyOutput {
            kernel,
            buffer: buffer.label().to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// Launch Dimensions
// ============================================================================

/// Total worker count and cooperative group size of one dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaunchDims {
    /// Total number of workers; a multiple of `group_size`
    pub global_size: usize,
    /// Workers per cooperative group; a power of two
    pub group_size: usize,
}

impl LaunchDims {
    /// Create launch dimensions (validated when the dispatch is enqueued)
    pub const fn new(global_size: usize, group_size: usize) -> Self {
        Self {
            global_size,
            group_size,
        }
    }

    /// Smallest launch covering `elements` workers with groups of `group_size`
    pub fn covering(elements: usize, group_size: usize) -> Self {
        let groups = elements.div_ceil(group_size.max(1)).max(1);
        Self::new(groups * group_size, group_size)
    }

    /// Launch with exactly `groups` groups
    pub const fn groups(groups: usize, group_size: usize) -> Self {
        Self::new(groups * group_size, group_size)
    }

    /// Number of cooperative groups
    #[inline]
    pub fn num_groups(&self) -> usize {
        self.global_size / self.group_size
    }

    /// Check the geometry against device limits
    pub fn validate(&self, limits: &DeviceLimits) -> Result<()> {
        if self.group_size == 0 || !self.group_size.is_power_of_two() {
            return Err(Error::invalid_argument(
                "group_size",
                format!("{} is not a power of two", self.group_size),
            ));
        }
        if self.group_size > limits.max_group_size {
            return Err(Error::invalid_argument(
                "group_size",
                format!(
                    "{} exceeds the device maximum of {}",
                    self.group_size, limits.max_group_size
                ),
            ));
        }
        if self.global_size == 0 || self.global_size % self.group_size != 0 {
            return Err(Error::invalid_argument(
                "global_size",
                format!(
                    "{} is not a positive multiple of the group size {}",
                    self.global_size, self.group_size
                ),
            ));
        }
        if self.num_groups() > limits.max_groups {
            return Err(Error::backend_limitation(
                "device",
                "launch",
                format!(
                    "{} groups exceed the device maximum of {}",
                    self.num_groups(),
                    limits.max_groups
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: DeviceLimits = DeviceLimits {
        max_group_size: 256,
        max_scratch_elems: 4096,
        max_groups: 16,
        view_alignment: 4,
    };

    #[test]
    fn test_covering_rounds_up() {
        assert_eq!(LaunchDims::covering(128, 64), LaunchDims::new(128, 64));
        assert_eq!(LaunchDims::covering(130, 64), LaunchDims::new(192, 64));
        assert_eq!(LaunchDims::covering(1, 64).num_groups(), 1);
        assert_eq!(LaunchDims::groups(3, 32).global_size, 96);
    }

    #[test]
    fn test_launch_validation() {
        assert!(LaunchDims::new(128, 64).validate(&LIMITS).is_ok());
        assert!(LaunchDims::new(128, 48).validate(&LIMITS).is_err());
        assert!(LaunchDims::new(100, 64).validate(&LIMITS).is_err());
        assert!(LaunchDims::new(1024, 512).validate(&LIMITS).is_err());
        assert!(LaunchDims::new(0, 64).validate(&LIMITS).is_err());
    }

    #[test]
    fn test_launch_rejects_too_many_groups() {
        assert!(LaunchDims::groups(16, 8).validate(&LIMITS).is_ok());
        let err = LaunchDims::groups(17, 8).validate(&LIMITS).unwrap_err();
        assert!(matches!(err, Error::BackendLimitation { .. }));
    }
}
