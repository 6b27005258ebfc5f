//! Host-emulated compute device
//!
//! The CPU backend executes the solver's parallel routines with the same
//! execution model a GPU uses:
//!
//! - A dispatch is split into cooperative groups of `group_size` workers.
//! - Groups run concurrently on the rayon pool (feature `rayon`), or one
//!   after another without it. Nothing orders groups within a dispatch.
//! - Inside a group the workers advance in lock-step phases. A group barrier
//!   is the boundary between two phases: every worker finishes phase `k`
//!   before any worker starts phase `k + 1`.
//! - A dispatch returns only when all of its groups have finished, which is
//!   the dispatch-boundary synchronization the command stream relies on.
//!
//! - The relaxation routine loads its snapshot of `x` for all groups before
//!   any group computes, so every worker reads the pre-sweep values no
//!   matter how groups are scheduled.
//!
//! Device memory is a slice of 64-bit atomic words accessed with relaxed
//! ordering. Buffers handed out as views may alias, and concurrent groups
//! never race on a slot in a way that is undefined behaviour.

mod client;
mod device;
mod kernels;
mod memory;

pub use client::{CpuClient, CpuKernel};
pub use device::CpuDevice;
pub use memory::CpuBuffer;
