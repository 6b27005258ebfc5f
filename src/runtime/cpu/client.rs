//! CPU client: command stream of the host-emulated device

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::device::CpuDevice;
use super::kernels::run_dispatch;
use super::memory::CpuBuffer;
use crate::dtype::Real;
use crate::error::Result;
use crate::runtime::{Access, ComputeBackend, DeviceBuffer, DeviceLimits, Kernel, LaunchDims};

/// Largest cooperative group the CPU device accepts
const MAX_GROUP_SIZE: usize = 1024;

/// Largest group-local scratch array, in elements
const MAX_SCRATCH_ELEMS: usize = 1 << 20;

/// Largest number of groups in one dispatch
const MAX_GROUPS: usize = 65_535;

/// Kernel bound to CPU buffers
#[derive(Clone, Debug)]
pub struct CpuKernel<T: Real>(Arc<Kernel<CpuBuffer<T>, T>>);

struct Command<T: Real> {
    kernel: CpuKernel<T>,
    dims: LaunchDims,
}

/// CPU client for operation dispatch
///
/// Dispatches are recorded in an in-order queue and executed when the host
/// next synchronizes (`read`, `write` or `finish`). Each recorded dispatch
/// completes before the next one starts.
pub struct CpuClient<T: Real> {
    device: CpuDevice,
    queue: Mutex<VecDeque<Command<T>>>,
    limits: DeviceLimits,
    _elem: PhantomData<fn() -> T>,
}

impl<T: Real> CpuClient<T> {
    /// Create a new CPU client
    pub fn new(device: CpuDevice) -> Self {
        Self::with_limits(
            device,
            DeviceLimits {
                max_group_size: MAX_GROUP_SIZE,
                max_scratch_elems: MAX_SCRATCH_ELEMS,
                max_groups: MAX_GROUPS,
                view_alignment: std::mem::size_of::<T>() as u64,
            },
        )
    }

    /// Create a client that reports custom limits, e.g. to mimic a smaller GPU.
    ///
    /// The view alignment is never allowed below one element.
    pub fn with_limits(device: CpuDevice, mut limits: DeviceLimits) -> Self {
        let elem = std::mem::size_of::<T>() as u64;
        limits.view_alignment = limits.view_alignment.max(elem).next_multiple_of(elem);
        debug!(
            threads = device.parallelism(),
            dtype = %T::DTYPE,
            ?limits,
            "cpu: client ready"
        );
        Self {
            device,
            queue: Mutex::new(VecDeque::new()),
            limits,
            _elem: PhantomData,
        }
    }

    /// Number of recorded dispatches that have not run yet
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run every recorded dispatch in order.
    fn flush(&self) {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            return;
        }
        trace!(dispatches = queue.len(), "cpu: flushing command queue");
        while let Some(cmd) = queue.pop_front() {
            run_dispatch(&cmd.kernel.0, cmd.dims);
        }
    }
}

impl<T: Real> Default for CpuClient<T> {
    fn default() -> Self {
        Self::new(CpuDevice::new())
    }
}

impl<T: Real> std::fmt::Debug for CpuClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuClient")
            .field("device", &self.device)
            .field("dtype", &T::DTYPE)
            .field("pending", &self.pending())
            .finish()
    }
}

impl<T: Real> ComputeBackend for CpuClient<T> {
    type Elem = T;
    type Device = CpuDevice;
    type Buffer = CpuBuffer<T>;
    type Bound = CpuKernel<T>;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn alloc(&self, label: &str, len: usize, access: Access) -> Result<CpuBuffer<T>> {
        Ok(CpuBuffer::zeroed(label, len, access))
    }

    fn view(
        &self,
        parent: &CpuBuffer<T>,
        byte_offset: u64,
        byte_len: u64,
        access: Access,
    ) -> Result<CpuBuffer<T>> {
        let absolute = parent.byte_offset() + byte_offset;
        if absolute % self.limits.view_alignment != 0 {
            return Err(crate::error::Error::InvalidView {
                offset: byte_offset,
                len: byte_len,
                parent_len: (parent.len() * std::mem::size_of::<T>()) as u64,
                reason: "offset not aligned to the device view alignment",
            });
        }
        parent.view(byte_offset, byte_len, access)
    }

    fn write(&self, dst: &CpuBuffer<T>, data: &[T]) -> Result<()> {
        self.flush();
        dst.copy_from_host(data)
    }

    fn read(&self, src: &CpuBuffer<T>, out: &mut [T]) -> Result<()> {
        self.flush();
        src.copy_to_host(out)
    }

    fn bind(&self, kernel: Kernel<CpuBuffer<T>, T>) -> Result<CpuKernel<T>> {
        kernel.validate()?;
        Ok(CpuKernel(Arc::new(kernel)))
    }

    fn enqueue(&self, bound: &CpuKernel<T>, dims: LaunchDims) -> Result<()> {
        bound.0.validate_launch(dims, &self.limits)?;
        self.queue.lock().push_back(Command {
            kernel: bound.clone(),
            dims,
        });
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.flush();
        Ok(())
    }
}
