//! Runtime backends for the parallel solver
//!
//! This module defines the device-runtime binding the solver core talks to
//! and provides two implementations of it.
//!
//! # Architecture
//!
//! ```text
//! ComputeBackend (one ordered command stream per instance)
//! ├── Device       (identifies the CPU or a GPU adapter)
//! ├── Buffer       (typed device storage or an aliasing view into it)
//! ├── Bound        (a kernel with its arguments attached)
//! └── enqueue / read / write / finish
//! ```
//!
//! # Synchronization Contract
//!
//! - Workers of one cooperative group may synchronize with a group barrier.
//! - Workers of different groups never synchronize inside a dispatch.
//! - Every dispatch observes all writes of the dispatches enqueued before it
//!   on the same backend: the dispatch boundary is the only global barrier.
//! - `read` completes every previously enqueued command before copying, so a
//!   host read can never observe a stale value.

pub mod cpu;
mod kernel;
pub mod source;
mod traits;

#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use kernel::{BLOCK_SUM_ENTRY, Kernel, LaunchDims, RELAX_ENTRY};
pub use traits::{Access, ComputeBackend, Device, DeviceBuffer, DeviceLimits};
