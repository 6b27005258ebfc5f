//! Parallel routines of the host-emulated device
//!
//! Each routine is written per cooperative group. Loops over `lid` run the
//! workers of the group; a `// barrier` line marks where one phase ends and
//! the next starts.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::memory::CpuBuffer;
use crate::dtype::Real;
use crate::runtime::{Kernel, LaunchDims};
use crate::system::col_major;

/// Identity of one cooperative group within a dispatch
#[derive(Clone, Copy, Debug)]
struct WorkGroup {
    /// Group index
    id: usize,
    /// Workers per group
    size: usize,
    /// Groups in the dispatch
    count: usize,
}

impl WorkGroup {
    #[inline]
    fn global_id(&self, lid: usize) -> usize {
        self.id * self.size + lid
    }
}

/// Execute one dispatch to completion.
///
/// Returns once every group has finished, so all writes of this dispatch are
/// visible to whatever runs next.
///
/// For `RelaxSweep` the snapshot phase of every group completes before any
/// group computes, so all workers read the pre-sweep `x` regardless of how
/// groups are scheduled onto threads.
pub(super) fn run_dispatch<T: Real>(kernel: &Kernel<CpuBuffer<T>, T>, dims: LaunchDims) {
    let scratch_len = kernel.scratch_len(dims.group_size);
    match kernel {
        Kernel::RelaxSweep {
            x,
            a,
            b,
            resid,
            n,
            omega,
        } => {
            // all groups load the same snapshot, so one copy serves them all
            let snapshot: Vec<T> = (0..*n).map(|k| x.load(k)).collect();

            // barrier

            for_each_group::<T, _>(dims, 0, |group, _| {
                relax_sweep(&group, x, a, b, resid, *n, *omega, &snapshot)
            });
        }
        Kernel::BlockSum {
            input,
            output,
            count,
        } => for_each_group(dims, scratch_len, |group, scratch| {
            block_sum(&group, input, output, *count, scratch)
        }),
    }
}

/// Run `body` once per group with a group-local scratch of `scratch_len`.
fn for_each_group<T, F>(dims: LaunchDims, scratch_len: usize, body: F)
where
    T: Real,
    F: Fn(WorkGroup, &mut [T]) + Send + Sync,
{
    let count = dims.num_groups();
    let run = |id: usize, scratch: &mut Vec<T>| {
        scratch.resize(scratch_len, T::zero());
        let group = WorkGroup {
            id,
            size: dims.group_size,
            count,
        };
        body(group, scratch.as_mut_slice())
    };

    #[cfg(feature = "rayon")]
    (0..count)
        .into_par_iter()
        .for_each_init(Vec::new, |scratch, id| run(id, scratch));

    #[cfg(not(feature = "rayon"))]
    {
        let mut scratch = Vec::new();
        for id in 0..count {
            run(id, &mut scratch);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn relax_sweep<T: Real>(
    group: &WorkGroup,
    x: &CpuBuffer<T>,
    a: &CpuBuffer<T>,
    b: &CpuBuffer<T>,
    resid: &CpuBuffer<T>,
    n: usize,
    omega: T,
    snapshot: &[T],
) {
    for lid in 0..group.size {
        let i = group.global_id(lid);
        if i >= n {
            continue;
        }
        let mut off_diag = T::zero();
        for (j, &xj) in snapshot.iter().enumerate().take(n) {
            if j != i {
                off_diag = off_diag + a.load(col_major(i, j, n)) * xj;
            }
        }
        let temp = (b.load(i) - off_diag) / a.load(col_major(i, i, n));
        let x_old = snapshot[i];
        let x_new = x_old + omega * (temp - x_old);
        resid.store(i, (x_new - x_old).abs());
        x.store(i, x_new);
    }
}

fn block_sum<T: Real>(
    group: &WorkGroup,
    input: &CpuBuffer<T>,
    output: &CpuBuffer<T>,
    count: usize,
    scratch: &mut [T],
) {
    let chunk = count.div_ceil(group.count);
    let start = (group.id * chunk).min(count);
    let end = (start + chunk).min(count);

    for (lid, slot) in scratch.iter_mut().enumerate().take(group.size) {
        let mut acc = T::zero();
        for k in (start + lid..end).step_by(group.size) {
            acc = acc + input.load(k);
        }
        *slot = acc;
    }

    // barrier

    let mut s = group.size / 2;
    while s > 0 {
        for lid in 0..s {
            scratch[lid] = scratch[lid] + scratch[lid + s];
        }
        // barrier
        s >>= 1;
    }

    output.store(group.id, scratch[0]);
}
