//! Core traits for compute backends

mod backend;
mod buffer;
mod device;

pub use backend::{ComputeBackend, DeviceLimits};
pub use buffer::{Access, DeviceBuffer};
pub use device::Device;
