//! Device session: everything one parallel solve needs
//!
//! A [`DeviceSession`] owns the backend, the device copies of the system,
//! the residual and partials buffers and both bound routines. Solver
//! components borrow the session instead of reaching for global handles.

use tracing::debug;

use super::options::SolverOptions;
use super::reduce::{PartialsLayout, ResidualReduction};
use super::relax::RelaxationKernel;
use crate::dtype::Real;
use crate::error::{Error, Result};
use crate::runtime::{Access, ComputeBackend, Device};
use crate::system::LinearSystem;

/// Backend, buffers and bound routines of one system on one device
pub struct DeviceSession<B: ComputeBackend> {
    backend: B,
    options: SolverOptions,
    n: usize,
    x: B::Buffer,
    a: B::Buffer,
    b: B::Buffer,
    resid: B::Buffer,
    partials: B::Buffer,
    layout: PartialsLayout,
    relax: RelaxationKernel<B>,
    reduce: ResidualReduction<B>,
}

impl<B: ComputeBackend> DeviceSession<B> {
    /// Upload `system` to `backend` and bind both routines.
    ///
    /// # Errors
    ///
    /// Fails if the options are invalid for the system size or the device,
    /// or on the first failing device operation.
    pub fn new(backend: B, system: &LinearSystem<B::Elem>, options: SolverOptions) -> Result<Self> {
        let n = system.n();
        let limits = backend.limits();
        options.validate(n, &limits)?;

        let x = backend.upload("x", system.x(), Access::ReadWrite)?;
        let a = backend.upload("a", system.matrix(), Access::ReadOnly)?;
        let b = backend.upload("b", system.b(), Access::ReadOnly)?;
        let resid = backend.alloc("resid", n, Access::ReadWrite)?;
        let (partials, layout) =
            ResidualReduction::alloc_partials(&backend, options.num_blocks(n))?;

        let relax = RelaxationKernel::bind(
            &backend,
            &x,
            &a,
            &b,
            &resid,
            n,
            B::Elem::cast_f64(options.omega),
            options.relax_group_size,
        )?;
        let reduce = ResidualReduction::bind(
            &backend,
            &resid,
            n,
            &partials,
            layout,
            options.reduce_group_size,
        )?;

        debug!(
            backend = backend.name(),
            device = %backend.device().name(),
            dtype = %<B::Elem as Real>::DTYPE,
            n,
            num_blocks = layout.num_blocks,
            relax_groups = relax.dims().num_groups(),
            "device session created"
        );

        Ok(Self {
            backend,
            options,
            n,
            x,
            a,
            b,
            resid,
            partials,
            layout,
            relax,
            reduce,
        })
    }

    /// Overwrite the device copy of the system with `system`.
    pub fn load(&self, system: &LinearSystem<B::Elem>) -> Result<()> {
        if system.n() != self.n {
            return Err(Error::LengthMismatch {
                expected: self.n,
                got: system.n(),
            });
        }
        self.backend.write(&self.a, system.matrix())?;
        self.backend.write(&self.b, system.b())?;
        self.backend.write(&self.x, system.x())
    }

    /// Read the current unknowns (blocking).
    pub fn read_x(&self) -> Result<Vec<B::Elem>> {
        self.backend.to_vec(&self.x)
    }

    /// Run the convergence loop with the session's tolerance.
    pub fn solve(&self) -> Result<super::Solution<B::Elem>> {
        let tol = B::Elem::cast_f64(self.options.tolerance);
        super::ConvergenceLoop::new(self, tol).run()
    }

    /// Backend the session dispatches to
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Options the session was created with
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Number of unknowns
    pub fn n(&self) -> usize {
        self.n
    }

    /// Bound relaxation routine
    pub fn relaxation(&self) -> &RelaxationKernel<B> {
        &self.relax
    }

    /// Bound two-stage reduction
    pub fn reduction(&self) -> &ResidualReduction<B> {
        &self.reduce
    }

    /// Device buffer of the unknowns
    pub fn x(&self) -> &B::Buffer {
        &self.x
    }

    /// Per-unknown `|Δx|` of the latest sweep
    pub fn residuals(&self) -> &B::Buffer {
        &self.resid
    }

    /// Partials buffer, including the scalar slot
    pub fn partials(&self) -> &B::Buffer {
        &self.partials
    }

    /// Placement of blocks and scalar inside [`partials`](Self::partials)
    pub fn partials_layout(&self) -> PartialsLayout {
        self.layout
    }
}

impl<B: ComputeBackend + std::fmt::Debug> std::fmt::Debug for DeviceSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("backend", &self.backend)
            .field("n", &self.n)
            .field("options", &self.options)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
