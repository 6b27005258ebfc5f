//! WebGPU backend (requires `wgpu` feature)
//!
//! Runs the solver's routines as WGSL compute shaders. The shader text is a
//! [`KernelSource`](crate::runtime::source::KernelSource): the built-in WGSL
//! or a file loaded at run time.

mod client;
mod device;
mod pipeline;

pub use client::{WgpuBuffer, WgpuClient, WgpuKernel};
pub use device::WgpuDevice;

/// Check if a WebGPU adapter is available on this machine
pub fn is_wgpu_available() -> bool {
    device::query_adapter_info_blocking(0).is_ok()
}
