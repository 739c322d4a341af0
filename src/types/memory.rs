//! Reference-counted sample buffers

use super::DType;
use crate::error::{MdaError, Result};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// One contiguous, typed byte buffer shared by any number of array views
///
/// Cloning (or [`MemoryObject::share`]) adds a reference to the same bytes;
/// there is no copy-on-write, so a write through one reference is seen by
/// all of them. The buffer is freed when the last reference is dropped.
/// Not thread-safe: share across threads only with external serialization.
#[derive(Debug, Clone)]
pub struct MemoryObject {
    dtype: DType,
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl MemoryObject {
    /// Allocate a zero-filled buffer of `byte_len` bytes
    pub fn allocate(dtype: DType, byte_len: usize) -> Result<Self> {
        if byte_len % dtype.element_size() != 0 {
            return Err(MdaError::mismatch(
                byte_len.next_multiple_of(dtype.element_size()),
                byte_len,
            ));
        }
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(byte_len)
            .map_err(|_| MdaError::Allocation { bytes: byte_len })?;
        bytes.resize(byte_len, 0);
        Ok(Self {
            dtype,
            bytes: Rc::new(RefCell::new(bytes)),
        })
    }

    /// Take ownership of existing bytes
    pub fn from_bytes(dtype: DType, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() % dtype.element_size() != 0 {
            return Err(MdaError::mismatch(
                bytes.len().next_multiple_of(dtype.element_size()),
                bytes.len(),
            ));
        }
        Ok(Self {
            dtype,
            bytes: Rc::new(RefCell::new(bytes)),
        })
    }

    /// New reference to the same buffer
    pub fn share(&self) -> Self {
        self.clone()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.borrow().len()
    }

    /// Number of elements of [`MemoryObject::dtype`] in the buffer
    pub fn len(&self) -> usize {
        self.byte_len() / self.dtype.element_size()
    }

    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }

    /// Number of live references to this buffer
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.bytes)
    }

    /// True if both objects refer to the same buffer
    pub fn ptr_eq(&self, other: &MemoryObject) -> bool {
        Rc::ptr_eq(&self.bytes, &other.bytes)
    }

    /// Copy of the raw bytes
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.borrow().clone()
    }

    /// Overwrite the whole buffer; `bytes` must have the same length
    pub fn copy_from_slice(&self, bytes: &[u8]) -> Result<()> {
        let mut buffer = self.bytes.borrow_mut();
        if bytes.len() != buffer.len() {
            return Err(MdaError::mismatch(buffer.len(), bytes.len()));
        }
        buffer.copy_from_slice(bytes);
        Ok(())
    }

    // A guard must not be held across a call that borrows again
    pub(crate) fn borrow(&self) -> Ref<'_, Vec<u8>> {
        self.bytes.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, Vec<u8>> {
        self.bytes.borrow_mut()
    }
}
