//! Device memory of the host-emulated backend

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::dtype::Real;
use crate::error::{Error, Result};
use crate::runtime::{Access, DeviceBuffer};

/// Backing storage shared by a buffer and all views into it
struct Storage {
    words: Box<[AtomicU64]>,
}

/// Buffer (or view) on the CPU device.
///
/// Elements live in atomic words so that concurrently running groups can
/// share the buffer without locking. Clones and views alias the same words.
pub struct CpuBuffer<T> {
    storage: Arc<Storage>,
    /// First element addressed by this handle
    offset: usize,
    len: usize,
    access: Access,
    label: String,
    _elem: PhantomData<fn() -> T>,
}

impl<T> Clone for CpuBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            offset: self.offset,
            len: self.len,
            access: self.access,
            label: self.label.clone(),
            _elem: PhantomData,
        }
    }
}

impl<T> fmt::Debug for CpuBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuBuffer")
            .field("label", &self.label)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("access", &self.access)
            .finish()
    }
}

impl<T: Real> CpuBuffer<T> {
    pub(super) fn zeroed(label: &str, len: usize, access: Access) -> Self {
        let words = (0..len).map(|_| AtomicU64::new(T::zero().to_word())).collect();
        Self {
            storage: Arc::new(Storage { words }),
            offset: 0,
            len,
            access,
            label: label.to_string(),
            _elem: PhantomData,
        }
    }

    /// Alias `byte_len` bytes starting `byte_offset` bytes into this handle.
    pub(super) fn view(&self, byte_offset: u64, byte_len: u64, access: Access) -> Result<Self> {
        let elem = std::mem::size_of::<T>() as u64;
        let parent_len = self.len as u64 * elem;
        let reject = |reason| Error::InvalidView {
            offset: byte_offset,
            len: byte_len,
            parent_len,
            reason,
        };

        if byte_offset % elem != 0 || byte_len % elem != 0 {
            return Err(reject("not a whole number of elements"));
        }
        if byte_len == 0 {
            return Err(reject("empty view"));
        }
        match byte_offset.checked_add(byte_len) {
            Some(end) if end <= parent_len => {}
            _ => return Err(reject("past the end of the parent")),
        }

        let start = (byte_offset / elem) as usize;
        Ok(Self {
            storage: self.storage.clone(),
            offset: self.offset + start,
            len: (byte_len / elem) as usize,
            access,
            label: format!("{}[{}..{}]", self.label, start, start + (byte_len / elem) as usize),
            _elem: PhantomData,
        })
    }

    /// Load element `i` of this handle.
    #[inline]
    pub(super) fn load(&self, i: usize) -> T {
        debug_assert!(i < self.len, "{}: load {} out of {}", self.label, i, self.len);
        T::from_word(self.storage.words[self.offset + i].load(Ordering::Relaxed))
    }

    /// Store element `i` of this handle.
    #[inline]
    pub(super) fn store(&self, i: usize, value: T) {
        debug_assert!(i < self.len, "{}: store {} out of {}", self.label, i, self.len);
        self.storage.words[self.offset + i].store(value.to_word(), Ordering::Relaxed);
    }

    pub(super) fn copy_to_host(&self, out: &mut [T]) -> Result<()> {
        self.check_host_len(out.len())?;
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.load(i);
        }
        Ok(())
    }

    pub(super) fn copy_from_host(&self, data: &[T]) -> Result<()> {
        self.check_host_len(data.len())?;
        for (i, &v) in data.iter().enumerate() {
            self.store(i, v);
        }
        Ok(())
    }

    fn check_host_len(&self, got: usize) -> Result<()> {
        if got != self.len {
            return Err(Error::LengthMismatch {
                expected: self.len,
                got,
            });
        }
        Ok(())
    }

    /// True if both handles share backing storage
    pub fn aliases(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }
}

impl<T> DeviceBuffer for CpuBuffer<T> {
    fn len(&self) -> usize {
        self.len
    }

    fn byte_offset(&self) -> u64 {
        (self.offset * std::mem::size_of::<T>()) as u64
    }

    fn access(&self) -> Access {
        self.access
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_aliases_parent() {
        let parent = CpuBuffer::<f64>::zeroed("parent", 8, Access::ReadWrite);
        let view = parent.view(5 * 8, 2 * 8, Access::ReadWrite).unwrap();
        assert!(view.aliases(&parent));
        assert_eq!(view.len(), 2);
        assert_eq!(view.byte_offset(), 40);

        view.store(1, 3.5);
        assert_eq!(parent.load(6), 3.5);
        parent.store(5, -1.0);
        assert_eq!(view.load(0), -1.0);
    }

    #[test]
    fn test_view_of_view_accumulates_offset() {
        let parent = CpuBuffer::<f32>::zeroed("parent", 16, Access::ReadWrite);
        let outer = parent.view(4 * 4, 8 * 4, Access::ReadWrite).unwrap();
        let inner = outer.view(2 * 4, 4, Access::ReadWrite).unwrap();
        inner.store(0, 9.0);
        assert_eq!(parent.load(6), 9.0);
        assert_eq!(inner.byte_offset(), 24);
    }

    #[test]
    fn test_view_rejects_bad_ranges() {
        let parent = CpuBuffer::<f32>::zeroed("parent", 4, Access::ReadWrite);
        assert!(parent.view(2, 4, Access::ReadWrite).is_err());
        assert!(parent.view(0, 0, Access::ReadWrite).is_err());
        assert!(parent.view(12, 8, Access::ReadWrite).is_err());
        assert!(parent.view(u64::MAX - 3, 4, Access::ReadWrite).is_err());
        assert!(parent.view(12, 4, Access::ReadWrite).is_ok());
    }

    #[test]
    fn test_host_copies_check_length() {
        let buf = CpuBuffer::<f64>::zeroed("buf", 3, Access::ReadOnly);
        assert!(buf.copy_from_host(&[1.0, 2.0]).is_err());
        buf.copy_from_host(&[1.0, 2.0, 3.0]).unwrap();
        let mut out = [0.0; 3];
        buf.copy_to_host(&mut out).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0]);
    }
}
