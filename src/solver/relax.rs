//! Host launcher for the relaxation routine

use crate::error::Result;
use crate::runtime::{ComputeBackend, Kernel, LaunchDims};

/// `relax_sweep` bound to a system's buffers, with its launch geometry.
///
/// One launch performs one sweep over all `n` unknowns: `n` workers rounded
/// up to whole groups of `group_size`. Each worker blends its Jacobi update
/// into `x` with factor ω and records `|Δx|` in `resid`.
///
/// The update is Jacobi with over-relaxation even though the routine is
/// often described as Gauss-Seidel: no worker sees a value written by
/// another worker of its own group during the same sweep. On the CPU device
/// no worker sees any value written during the sweep. On a GPU, groups that
/// load their snapshot late may see values from groups that finished earlier.
pub struct RelaxationKernel<B: ComputeBackend> {
    bound: B::Bound,
    dims: LaunchDims,
}

impl<B: ComputeBackend> RelaxationKernel<B> {
    /// Bind the routine to `x`, `a`, `b` and `resid` of an `n`-unknown system.
    #[allow(clippy::too_many_arguments)]
    pub fn bind(
        backend: &B,
        x: &B::Buffer,
        a: &B::Buffer,
        b: &B::Buffer,
        resid: &B::Buffer,
        n: usize,
        omega: B::Elem,
        group_size: usize,
    ) -> Result<Self> {
        let bound = backend.bind(Kernel::RelaxSweep {
            x: x.clone(),
            a: a.clone(),
            b: b.clone(),
            resid: resid.clone(),
            n,
            omega,
        })?;
        Ok(Self {
            bound,
            dims: LaunchDims::covering(n, group_size),
        })
    }

    /// Enqueue one sweep.
    pub fn launch(&self, backend: &B) -> Result<()> {
        backend.enqueue(&self.bound, self.dims)
    }

    /// Launch geometry of a sweep
    pub fn dims(&self) -> LaunchDims {
        self.dims
    }
}
