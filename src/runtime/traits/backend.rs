//! Device-runtime binding used by the solver core

use super::{Access, Device, DeviceBuffer};
use crate::dtype::Real;
use crate::error::Result;
use crate::runtime::{Kernel, LaunchDims};

/// Capabilities a backend reports to the launch validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Largest cooperative group a dispatch may use
    pub max_group_size: usize,
    /// Largest group-local scratch array, in elements
    pub max_scratch_elems: usize,
    /// Largest number of groups in one dispatch
    pub max_groups: usize,
    /// Required alignment of a view's byte offset
    pub view_alignment: u64,
}

/// A compute device with one in-order command stream.
///
/// All dispatches and transfers issued through one backend instance execute
/// in issue order. `write` and `read` are blocking: `read` returns only after
/// every command enqueued before it has completed, and there is no way to
/// start a host read that completes later.
///
/// # Example
///
/// ```ignore
/// let backend = CpuClient::<f64>::new(CpuDevice::new());
/// let input = backend.alloc("input", 1000, Access::ReadWrite)?;
/// let output = backend.alloc("output", 4, Access::ReadWrite)?;
/// backend.write(&input, &data)?;
/// let sum = backend.bind(Kernel::BlockSum { input, output: output.clone(), count: 1000 })?;
/// backend.enqueue(&sum, LaunchDims::new(4 * 64, 64))?;
/// let mut partials = [0.0; 4];
/// backend.read(&output, &mut partials)?;
/// ```
pub trait ComputeBackend: Send + Sync {
    /// Element type held by device buffers
    type Elem: Real;

    /// Device identifier type
    type Device: Device;

    /// Buffer handle type
    type Buffer: DeviceBuffer;

    /// Kernel with its arguments attached, ready to dispatch repeatedly
    type Bound: Send + Sync;

    /// Human-readable name of this backend
    fn name(&self) -> &'static str;

    /// Device this backend dispatches to
    fn device(&self) -> &Self::Device;

    /// Device capabilities
    fn limits(&self) -> DeviceLimits;

    /// Allocate a zero-initialized buffer of `len` elements.
    fn alloc(&self, label: &str, len: usize, access: Access) -> Result<Self::Buffer>;

    /// Create a view over `byte_len` bytes of `parent` starting at `byte_offset`.
    ///
    /// The view aliases the parent's storage: writes through either handle
    /// are visible through the other once the writing command completed.
    fn view(
        &self,
        parent: &Self::Buffer,
        byte_offset: u64,
        byte_len: u64,
        access: Access,
    ) -> Result<Self::Buffer>;

    /// Blocking host → device copy of the whole buffer.
    fn write(&self, dst: &Self::Buffer, data: &[Self::Elem]) -> Result<()>;

    /// Blocking device → host copy of the whole buffer.
    fn read(&self, src: &Self::Buffer, out: &mut [Self::Elem]) -> Result<()>;

    /// Attach arguments to a kernel.
    fn bind(&self, kernel: Kernel<Self::Buffer, Self::Elem>) -> Result<Self::Bound>;

    /// Append a dispatch of `bound` to the command stream.
    fn enqueue(&self, bound: &Self::Bound, dims: LaunchDims) -> Result<()>;

    /// Block until every enqueued command has completed.
    fn finish(&self) -> Result<()>;

    /// Allocate a buffer and fill it from `data`.
    fn upload(&self, label: &str, data: &[Self::Elem], access: Access) -> Result<Self::Buffer> {
        let buffer = self.alloc(label, data.len(), access)?;
        self.write(&buffer, data)?;
        Ok(buffer)
    }

    /// Read a whole buffer into a new vector.
    fn to_vec(&self, src: &Self::Buffer) -> Result<Vec<Self::Elem>> {
        let mut out = vec![<Self::Elem as num_traits::Zero>::zero(); src.len()];
        self.read(src, &mut out)?;
        Ok(out)
    }
}
