//! WebGPU client implementation.
//!
//! `WgpuClient` owns the WebGPU device and queue. Every dispatch is encoded
//! into its own command buffer and submitted immediately; the queue executes
//! submissions in order, and `read`/`write`/`finish` wait for the queue to
//! drain.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;
use tracing::{debug, error};
use wgpu::{Buffer, BufferDescriptor, BufferUsages, Queue};

use super::device::{WgpuDevice, query_adapter_info_blocking};
use super::pipeline::{BindingRange, LayoutKey, PipelineCache};
use crate::error::{Error, Result};
use crate::runtime::source::KernelSource;
use crate::runtime::{Access, ComputeBackend, DeviceBuffer, DeviceLimits, Kernel, LaunchDims};

const ELEM: u64 = std::mem::size_of::<f32>() as u64;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct RelaxParams {
    n: u32,
    omega: f32,
    _pad: [u32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct BlockSumParams {
    count: u32,
    _pad: [u32; 3],
}

// ============================================================================
// WgpuBuffer
// ============================================================================

/// Storage buffer (or a view into one) on a WebGPU device
#[derive(Clone, Debug)]
pub struct WgpuBuffer {
    raw: Arc<Buffer>,
    /// Byte offset into `raw`
    offset: u64,
    len: usize,
    access: Access,
    label: Arc<str>,
}

impl WgpuBuffer {
    fn byte_len(&self) -> u64 {
        self.len as u64 * ELEM
    }

    fn binding(&self) -> BindingRange<'_> {
        BindingRange {
            buffer: &self.raw,
            offset: self.offset,
            size: self.byte_len(),
        }
    }

    /// True if both handles share backing storage
    pub fn aliases(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.raw, &other.raw)
    }
}

impl DeviceBuffer for WgpuBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn byte_offset(&self) -> u64 {
        self.offset
    }

    fn access(&self) -> Access {
        self.access
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Kernel bound to WebGPU buffers
pub struct WgpuKernel {
    kernel: Kernel<WgpuBuffer, f32>,
    layout: LayoutKey,
    bind_group: wgpu::BindGroup,
    /// Keeps the params uniform alive as long as the bind group
    _params: Buffer,
}

// ============================================================================
// WgpuClient
// ============================================================================

/// WebGPU client for operation dispatch.
///
/// Only `f32` is supported: WGSL has no portable 64-bit float type.
pub struct WgpuClient {
    device_id: WgpuDevice,
    wgpu_device: Arc<wgpu::Device>,
    queue: Arc<Queue>,
    pipeline_cache: PipelineCache,
    module: Arc<wgpu::ShaderModule>,
    limits: DeviceLimits,
    /// First error reported by the device since it was last checked
    device_error: Arc<Mutex<Option<String>>>,
}

impl std::fmt::Debug for WgpuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuClient")
            .field("device", &self.device_id)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl WgpuClient {
    /// Open a device and compile `source` for it.
    ///
    /// # Errors
    ///
    /// Returns an error if no adapter is found, the device cannot be
    /// created, or the kernel source fails to compile.
    pub fn new(device: WgpuDevice, source: &KernelSource) -> Result<Self> {
        let (adapter, info) = query_adapter_info_blocking(device.index)?;

        let (wgpu_device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("relaxr WebGPU Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
                experimental_features: wgpu::ExperimentalFeatures::default(),
            },
        ))
        .map_err(|e| Error::device("request_device", e.to_string()))?;

        let device_error = Arc::new(Mutex::new(None));
        let sink = device_error.clone();
        wgpu_device.on_uncaptured_error(Arc::new(move |err: wgpu::Error| {
            error!("wgpu uncaptured error: {}", err);
            sink.lock().get_or_insert_with(|| err.to_string());
        }));

        let device_limits = wgpu_device.limits();
        let limits = DeviceLimits {
            max_group_size: device_limits
                .max_compute_workgroup_size_x
                .min(device_limits.max_compute_invocations_per_workgroup)
                as usize,
            max_scratch_elems: (device_limits.max_compute_workgroup_storage_size as u64 / ELEM)
                as usize,
            max_groups: device_limits.max_compute_workgroups_per_dimension as usize,
            view_alignment: u64::from(device_limits.min_storage_buffer_offset_alignment),
        };

        let wgpu_device = Arc::new(wgpu_device);
        let pipeline_cache = PipelineCache::new(wgpu_device.clone());
        let module = pipeline_cache.get_or_create_module(source.origin(), source.text());

        let client = Self {
            device_id: WgpuDevice::with_info(device.index, info),
            wgpu_device,
            queue: Arc::new(queue),
            pipeline_cache,
            module,
            limits,
            device_error,
        };
        client.check_device("create_shader_module")?;

        debug!(
            adapter = %client.device_id.adapter_name(),
            source = source.origin(),
            ?limits,
            "wgpu: client ready"
        );
        Ok(client)
    }

    /// Surface an error the device reported asynchronously.
    #[track_caller]
    fn check_device(&self, op: &'static str) -> Result<()> {
        match self.device_error.lock().take() {
            Some(reason) => Err(Error::device(op, reason)),
            None => Ok(()),
        }
    }

    /// Submit commands and wait for completion.
    #[track_caller]
    fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<()> {
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: None,
            })
            .map_err(|e| Error::device("poll", e.to_string()))?;
        self.check_device("submit")
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.wgpu_device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn uniform<P: Pod>(&self, label: &str, params: &P) -> Buffer {
        let buffer = self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<P>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&buffer, 0, bytemuck::bytes_of(params));
        buffer
    }

    /// Map a staging buffer and copy it out (blocking).
    fn read_staging(&self, staging: &Buffer, out: &mut [f32]) -> Result<()> {
        let slice = staging.slice(..);

        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| Error::device("poll", e.to_string()))?;

        receiver
            .recv()
            .map_err(|_| Error::device("map_async", "callback was not invoked"))?
            .map_err(|e| Error::device("map_async", e.to_string()))?;

        {
            let data = slice.get_mapped_range();
            let src: &[f32] = bytemuck::cast_slice(&data);
            out.copy_from_slice(&src[..out.len()]);
        }

        staging.unmap();
        Ok(())
    }
}

impl ComputeBackend for WgpuClient {
    type Elem = f32;
    type Device = WgpuDevice;
    type Buffer = WgpuBuffer;
    type Bound = WgpuKernel;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn device(&self) -> &WgpuDevice {
        &self.device_id
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn alloc(&self, label: &str, len: usize, access: Access) -> Result<WgpuBuffer> {
        // zero-sized bindings are invalid; keep at least one element of backing
        let size = len.max(1) as u64 * ELEM;
        let raw = self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        self.check_device("create_buffer")?;
        Ok(WgpuBuffer {
            raw: Arc::new(raw),
            offset: 0,
            len,
            access,
            label: label.into(),
        })
    }

    fn view(
        &self,
        parent: &WgpuBuffer,
        byte_offset: u64,
        byte_len: u64,
        access: Access,
    ) -> Result<WgpuBuffer> {
        let reject = |reason| Error::InvalidView {
            offset: byte_offset,
            len: byte_len,
            parent_len: parent.byte_len(),
            reason,
        };

        if byte_offset % ELEM != 0 || byte_len % ELEM != 0 {
            return Err(reject("not a whole number of elements"));
        }
        if byte_len == 0 {
            return Err(reject("empty view"));
        }
        match byte_offset.checked_add(byte_len) {
            Some(end) if end <= parent.byte_len() => {}
            _ => return Err(reject("past the end of the parent")),
        }
        let offset = parent.offset + byte_offset;
        if offset % self.limits.view_alignment != 0 {
            return Err(reject("offset not aligned to the device view alignment"));
        }

        let start = byte_offset / ELEM;
        Ok(WgpuBuffer {
            raw: parent.raw.clone(),
            offset,
            len: (byte_len / ELEM) as usize,
            access,
            label: format!("{}[{}..{}]", parent.label, start, start + byte_len / ELEM).into(),
        })
    }

    fn write(&self, dst: &WgpuBuffer, data: &[f32]) -> Result<()> {
        if data.len() != dst.len {
            return Err(Error::LengthMismatch {
                expected: dst.len,
                got: data.len(),
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        self.queue
            .write_buffer(&dst.raw, dst.offset, bytemuck::cast_slice(data));
        self.submit_and_wait(self.encoder("relaxr_write"))
    }

    fn read(&self, src: &WgpuBuffer, out: &mut [f32]) -> Result<()> {
        if out.len() != src.len {
            return Err(Error::LengthMismatch {
                expected: src.len,
                got: out.len(),
            });
        }
        if out.is_empty() {
            return self.finish();
        }

        let staging = self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some("relaxr_staging"),
            size: src.byte_len(),
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self.encoder("relaxr_read");
        encoder.copy_buffer_to_buffer(&src.raw, src.offset, &staging, 0, src.byte_len());
        self.submit_and_wait(encoder)?;
        self.read_staging(&staging, out)
    }

    fn bind(&self, kernel: Kernel<WgpuBuffer, f32>) -> Result<WgpuKernel> {
        kernel.validate()?;

        let (layout_key, params, ranges) = match &kernel {
            Kernel::RelaxSweep {
                x,
                a,
                b,
                resid,
                n,
                omega,
            } => {
                let params = self.uniform(
                    "relax_params",
                    &RelaxParams {
                        n: *n as u32,
                        omega: *omega,
                        _pad: [0; 2],
                    },
                );
                let key = LayoutKey {
                    num_storage_buffers: 4,
                    num_uniform_buffers: 1,
                };
                (key, params, Vec::from([x, a, b, resid].map(WgpuBuffer::binding)))
            }
            Kernel::BlockSum {
                input,
                output,
                count,
            } => {
                let params = self.uniform(
                    "block_sum_params",
                    &BlockSumParams {
                        count: *count as u32,
                        _pad: [0; 3],
                    },
                );
                let key = LayoutKey {
                    num_storage_buffers: 2,
                    num_uniform_buffers: 1,
                };
                (key, params, Vec::from([input, output].map(WgpuBuffer::binding)))
            }
        };

        let mut ranges = ranges;
        ranges.push(BindingRange {
            buffer: &params,
            offset: 0,
            size: params.size(),
        });
        let layout = self.pipeline_cache.get_or_create_layout(layout_key);
        let bind_group =
            self.pipeline_cache
                .create_bind_group(kernel.entry_point(), &layout, &ranges);
        drop(ranges);
        self.check_device("create_bind_group")?;

        debug!(entry = kernel.entry_point(), "wgpu: kernel bound");
        Ok(WgpuKernel {
            kernel,
            layout: layout_key,
            bind_group,
            _params: params,
        })
    }

    fn enqueue(&self, bound: &WgpuKernel, dims: LaunchDims) -> Result<()> {
        bound.kernel.validate_launch(dims, &self.limits)?;

        let entry = bound.kernel.entry_point();
        let layout = self.pipeline_cache.get_or_create_layout(bound.layout);
        let pipeline = self.pipeline_cache.get_or_create_pipeline(
            entry,
            &self.module,
            &layout,
            dims.group_size as u32,
            bound.kernel.scratch_len(dims.group_size) as u32,
        );
        self.check_device("create_compute_pipeline")?;

        let mut encoder = self.encoder(entry);
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(entry),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, Some(&bound.bind_group), &[]);
            pass.dispatch_workgroups(dims.num_groups() as u32, 1, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.check_device("enqueue")
    }

    fn finish(&self) -> Result<()> {
        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| Error::device("poll", e.to_string()))?;
        self.check_device("finish")
    }
}
