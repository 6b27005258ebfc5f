//! Error types for relaxr

use std::panic::Location;
use thiserror::Error;

/// Result type alias using relaxr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or running a solve.
///
/// Every device-runtime failure is terminal: the first error propagates to
/// the caller and nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Length mismatch between a host slice and a device buffer or system size
    #[error("Length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        /// Expected number of elements
        expected: usize,
        /// Actual number of elements
        got: usize,
    },

    /// A buffer view does not fit inside its parent or is misaligned
    #[error("Invalid view: offset {offset} bytes, length {len} bytes over a {parent_len}-byte buffer ({reason})")]
    InvalidView {
        /// Byte offset of the requested view
        offset: u64,
        /// Byte length of the requested view
        len: u64,
        /// Byte length of the parent buffer
        parent_len: u64,
        /// Why the view was rejected
        reason: &'static str,
    },

    /// A kernel tried to bind a read-only buffer as an output
    #[error("Kernel '{kernel}' writes to read-only buffer '{buffer}'")]
    ReadOnlyOutput {
        /// Kernel entry point
        kernel: &'static str,
        /// Label of the offending buffer
        buffer: String,
    },

    /// Device operation failed; carries the call site that issued it
    #[error("Device call '{op}' failed at {location}: {reason}")]
    Device {
        /// Name of the device operation
        op: &'static str,
        /// Call site in the host program
        location: &'static Location<'static>,
        /// Backend-provided reason
        reason: String,
    },

    /// Backend limitation - operation valid but exceeds backend capabilities
    #[error("{backend} limitation: {operation} - {reason}")]
    BackendLimitation {
        /// The backend that has the limitation
        backend: &'static str,
        /// The operation being attempted
        operation: &'static str,
        /// Description of the limitation
        reason: String,
    },

    /// Kernel source artifact could not be found or read
    #[error("Failed to load kernel source '{path}': {source}")]
    MissingSource {
        /// Path that was requested
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Kernel source was loaded but is not usable
    #[error("Kernel source '{origin}' rejected: {reason}")]
    KernelSource {
        /// Where the source came from
        origin: String,
        /// Why it was rejected
        reason: String,
    },
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create a device error tagged with the caller's location
    #[track_caller]
    pub fn device(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Device {
            op,
            location: Location::caller(),
            reason: reason.into(),
        }
    }

    /// Create a backend limitation error
    pub fn backend_limitation(
        backend: &'static str,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::BackendLimitation {
            backend,
            operation,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_records_call_site() {
        let err = Error::device("enqueue", "queue lost");
        match &err {
            Error::Device { location, .. } => {
                assert!(location.file().ends_with("error.rs"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("enqueue"));
        assert!(msg.contains("queue lost"));
    }
}
