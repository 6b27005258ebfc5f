//! Dense linear system state `A·x = b`
//!
//! `LinearSystem` owns the coefficient matrix, the unknown vector and the
//! right-hand side. Solvers borrow it; none of them own its lifetime.
//!
//! # Storage Convention
//!
//! The matrix is stored column-major: row `i`, column `j` lives at
//! `i + j * n`. Every access goes through [`col_major`] so the convention is
//! written down exactly once.

use crate::dtype::Real;
use crate::error::{Error, Result};

/// Flat index of entry `(i, j)` in a column-major `n × n` matrix.
#[inline]
pub const fn col_major(i: usize, j: usize, n: usize) -> usize {
    i + j * n
}

/// Dense `n × n` linear system with its current solution estimate.
///
/// Every diagonal entry is assumed non-zero. This is not checked: a zero
/// pivot produces non-finite values in either solver rather than an error.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearSystem<T: Real> {
    n: usize,
    a: Vec<T>,
    x: Vec<T>,
    b: Vec<T>,
}

impl<T: Real> LinearSystem<T> {
    /// Create an all-zero system of size `n`.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            a: vec![T::zero(); n * n],
            x: vec![T::zero(); n],
            b: vec![T::zero(); n],
        }
    }

    /// Create the canonical example system of size `n` (see [`Self::reset_canonical`]).
    pub fn canonical(n: usize) -> Self {
        let mut system = Self::zeros(n);
        system.reset_canonical();
        system
    }

    /// Build a system from column-major `a`, right-hand side `b` and initial guess `x`.
    pub fn from_parts(n: usize, a: Vec<T>, b: Vec<T>, x: Vec<T>) -> Result<Self> {
        if n == 0 {
            return Err(Error::invalid_argument("n", "system size must be positive"));
        }
        if a.len() != n * n {
            return Err(Error::LengthMismatch {
                expected: n * n,
                got: a.len(),
            });
        }
        for v in [&b, &x] {
            if v.len() != n {
                return Err(Error::LengthMismatch {
                    expected: n,
                    got: v.len(),
                });
            }
        }
        Ok(Self { n, a, x, b })
    }

    /// Reset to the canonical tridiagonal example.
    ///
    /// `b[0] = 1100`, `b[i] = 100` otherwise; `A[i,i] = 15` except
    /// `A[0,0] = 20` and `A[n-1,n-1] = 10`; `A[i,i±1] = -5`; all other
    /// entries and `x` are zero. Calling this twice yields bit-identical state.
    pub fn reset_canonical(&mut self) {
        let n = self.n;
        let c = T::cast_f64;

        self.b.fill(c(100.0));
        if let Some(first) = self.b.first_mut() {
            *first = c(1100.0);
        }

        self.a.fill(T::zero());
        for i in 0..n {
            self.a[col_major(i, i, n)] = c(15.0);
            if i + 1 < n {
                self.a[col_major(i, i + 1, n)] = c(-5.0);
            }
            if i >= 1 {
                self.a[col_major(i, i - 1, n)] = c(-5.0);
            }
        }
        if n > 0 {
            self.a[col_major(0, 0, n)] = c(20.0);
            self.a[col_major(n - 1, n - 1, n)] = c(10.0);
        }

        self.x.fill(T::zero());
    }

    /// System size `n`.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Coefficient `A[i, j]`.
    #[inline]
    pub fn a(&self, i: usize, j: usize) -> T {
        self.a[col_major(i, j, self.n)]
    }

    /// Set coefficient `A[i, j]`.
    #[inline]
    pub fn set_a(&mut self, i: usize, j: usize, value: T) {
        self.a[col_major(i, j, self.n)] = value;
    }

    /// Column-major coefficient storage.
    pub fn matrix(&self) -> &[T] {
        &self.a
    }

    /// Current solution estimate.
    pub fn x(&self) -> &[T] {
        &self.x
    }

    /// Mutable solution estimate.
    pub fn x_mut(&mut self) -> &mut [T] {
        &mut self.x
    }

    /// Right-hand side.
    pub fn b(&self) -> &[T] {
        &self.b
    }

    /// Overwrite the solution estimate, e.g. with a device result.
    pub fn set_x(&mut self, x: &[T]) -> Result<()> {
        if x.len() != self.n {
            return Err(Error::LengthMismatch {
                expected: self.n,
                got: x.len(),
            });
        }
        self.x.copy_from_slice(x);
        Ok(())
    }

    /// Split borrow used by the in-place sweep: `(a, b, x)`.
    pub(crate) fn parts_mut(&mut self) -> (&[T], &[T], &mut [T]) {
        (&self.a, &self.b, &mut self.x)
    }
}
