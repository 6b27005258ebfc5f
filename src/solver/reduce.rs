//! Two-stage residual reduction
//!
//! Stage 1 folds the `n` per-unknown residuals into `num_blocks` partial
//! sums. Stage 2 runs the same routine with a single group over those
//! partials and writes the scalar into a slot of the same buffer:
//!
//! ```text
//! partials: [ p0 p1 … p(num_blocks-1) | padding | scalar ]
//!             └──── stage 1 output ──┘           └ stage 2 output (view)
//! ```
//!
//! The scalar slot starts at the first offset past the block region that
//! satisfies the backend's view alignment, so the two regions never overlap.
//! Stage 2 reads the partials only after stage 1 completed because both are
//! dispatched on the same in-order stream.

use num_traits::Zero;
use tracing::debug;

use crate::error::{Error, Result};
use crate::runtime::{Access, ComputeBackend, DeviceBuffer, DeviceLimits, Kernel, LaunchDims};

/// Placement of the stage-1 block region and the scalar slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartialsLayout {
    /// Number of stage-1 blocks
    pub num_blocks: usize,
    /// Byte offset of the scalar slot
    pub scalar_offset: u64,
    /// Total buffer length in elements
    pub len: usize,
}

impl PartialsLayout {
    /// Layout for `num_blocks` partials of `elem_size`-byte elements
    pub fn new(num_blocks: usize, elem_size: usize, limits: &DeviceLimits) -> Self {
        let elem = elem_size as u64;
        let align = limits.view_alignment.max(1).next_multiple_of(elem);
        let scalar_offset = (num_blocks as u64 * elem).next_multiple_of(align);
        Self {
            num_blocks,
            scalar_offset,
            len: (scalar_offset / elem) as usize + 1,
        }
    }
}

/// `block_sum` bound twice: `input → partials` and `partials → scalar`
pub struct ResidualReduction<B: ComputeBackend> {
    stage1: B::Bound,
    stage1_dims: LaunchDims,
    stage2: B::Bound,
    stage2_dims: LaunchDims,
    scalar: B::Buffer,
}

impl<B: ComputeBackend> ResidualReduction<B> {
    /// Allocate a partials buffer laid out for `num_blocks` blocks.
    pub fn alloc_partials(backend: &B, num_blocks: usize) -> Result<(B::Buffer, PartialsLayout)> {
        let layout = PartialsLayout::new(
            num_blocks,
            std::mem::size_of::<B::Elem>(),
            &backend.limits(),
        );
        let partials = backend.alloc("partials", layout.len, Access::ReadWrite)?;
        Ok((partials, layout))
    }

    /// Bind both stages over the first `count` elements of `input`.
    ///
    /// `partials` must be laid out by [`PartialsLayout`] for the same block
    /// count, e.g. allocated with [`alloc_partials`](Self::alloc_partials).
    pub fn bind(
        backend: &B,
        input: &B::Buffer,
        count: usize,
        partials: &B::Buffer,
        layout: PartialsLayout,
        group_size: usize,
    ) -> Result<Self> {
        if layout.num_blocks == 0 {
            return Err(Error::invalid_argument(
                "num_blocks",
                "at least one reduction block is required",
            ));
        }
        if partials.len() < layout.len {
            return Err(Error::LengthMismatch {
                expected: layout.len,
                got: partials.len(),
            });
        }

        let elem = std::mem::size_of::<B::Elem>() as u64;
        let blocks = backend.view(
            partials,
            0,
            layout.num_blocks as u64 * elem,
            Access::ReadWrite,
        )?;
        let scalar = backend.view(partials, layout.scalar_offset, elem, Access::ReadWrite)?;

        let stage1 = backend.bind(Kernel::BlockSum {
            input: input.clone(),
            output: blocks.clone(),
            count,
        })?;
        let stage2 = backend.bind(Kernel::BlockSum {
            input: blocks,
            output: scalar.clone(),
            count: layout.num_blocks,
        })?;

        debug!(
            count,
            num_blocks = layout.num_blocks,
            group_size,
            scalar_offset = layout.scalar_offset,
            "residual reduction bound"
        );
        Ok(Self {
            stage1,
            stage1_dims: LaunchDims::groups(layout.num_blocks, group_size),
            stage2,
            stage2_dims: LaunchDims::groups(1, group_size),
            scalar,
        })
    }

    /// Enqueue stage 1 and stage 2.
    pub fn launch(&self, backend: &B) -> Result<()> {
        backend.enqueue(&self.stage1, self.stage1_dims)?;
        backend.enqueue(&self.stage2, self.stage2_dims)
    }

    /// Launch both stages and read the scalar back (blocking).
    pub fn reduce(&self, backend: &B) -> Result<B::Elem> {
        self.launch(backend)?;
        let mut out = [B::Elem::zero()];
        backend.read(&self.scalar, &mut out)?;
        Ok(out[0])
    }

    /// View over the scalar slot
    pub fn scalar(&self) -> &B::Buffer {
        &self.scalar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuClient;

    fn limits(view_alignment: u64) -> DeviceLimits {
        DeviceLimits {
            max_group_size: 256,
            max_scratch_elems: 1024,
            max_groups: 1024,
            view_alignment,
        }
    }

    #[test]
    fn test_layout_pads_scalar_slot() {
        let layout = PartialsLayout::new(3, 4, &limits(256));
        assert_eq!(layout.scalar_offset, 256);
        assert_eq!(layout.len, 65);

        let layout = PartialsLayout::new(3, 8, &limits(8));
        assert_eq!(layout.scalar_offset, 24);
        assert_eq!(layout.len, 4);

        // already aligned block region: scalar sits right after it
        let layout = PartialsLayout::new(64, 4, &limits(256));
        assert_eq!(layout.scalar_offset, 256);
    }

    #[test]
    fn test_two_stage_sum() {
        let backend = CpuClient::<f64>::default();
        let data: Vec<f64> = (0..1000).map(|i| (i % 7) as f64 * 0.5).collect();
        let expected: f64 = data.iter().sum();

        let input = backend.upload("input", &data, Access::ReadOnly).unwrap();
        let (partials, layout) = ResidualReduction::alloc_partials(&backend, 16).unwrap();
        let reduction =
            ResidualReduction::bind(&backend, &input, data.len(), &partials, layout, 32).unwrap();

        let sum = reduction.reduce(&backend).unwrap();
        assert!((sum - expected).abs() <= 1e-9 * expected);

        let parent = backend.to_vec(&partials).unwrap();
        let blocks: f64 = parent[..16].iter().sum();
        assert!((blocks - expected).abs() <= 1e-9 * expected);
        assert_eq!(parent[layout.len - 1], sum);
    }

    #[test]
    fn test_bind_rejects_short_partials() {
        let backend = CpuClient::<f32>::default();
        let input = backend.alloc("input", 8, Access::ReadOnly).unwrap();
        let partials = backend.alloc("partials", 2, Access::ReadWrite).unwrap();
        let layout = PartialsLayout::new(2, 4, &backend.limits());
        assert_eq!(layout.len, 3);
        assert!(partials.len() < layout.len);
        assert!(ResidualReduction::bind(&backend, &input, 8, &partials, layout, 4).is_err());
    }
}
