//! Device buffer handles

/// Access mode a buffer is created with, as seen by kernels.
///
/// Host transfers may target any buffer; `ReadOnly` only forbids binding the
/// buffer as a kernel output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    /// Kernels may only read the buffer
    ReadOnly,
    /// Kernels may read and write the buffer
    ReadWrite,
}

/// Handle to typed device storage, or to a view aliasing part of it.
///
/// Handles are cheap to clone; clones refer to the same storage.
pub trait DeviceBuffer: Clone + Send + Sync {
    /// Number of elements addressable through this handle
    fn len(&self) -> usize;

    /// Returns true if the handle addresses no elements
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte offset of this handle inside its backing storage (0 for a root buffer)
    fn byte_offset(&self) -> u64;

    /// Access mode
    fn access(&self) -> Access;

    /// Debug label
    fn label(&self) -> &str;
}
