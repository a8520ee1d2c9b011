//! Buffer descriptors for collective participants

use crate::dtype::DType;

/// Where a buffer's memory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Resident on the GPU with the given ordinal.
    Device(i32),
    /// Host memory. Never a legal collective participant; descriptors with
    /// this location are rejected by validation, not copied to a device.
    Host,
}

/// Metadata view of one caller-owned buffer taking part in a collective.
///
/// The descriptor never owns the memory it points at: the core only reads
/// the pointer and layout, and the caller keeps the allocation alive for
/// the duration of the call (plus any asynchronous device-side completion).
#[derive(Debug, Clone)]
pub struct DeviceBuffer {
    location: Location,
    ptr: u64,
    dtype: DType,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl DeviceBuffer {
    /// Create a descriptor from an explicit layout.
    ///
    /// # Panics
    /// Panics if `shape` and `strides` have different lengths.
    #[must_use]
    pub fn new(
        location: Location,
        ptr: u64,
        dtype: DType,
        shape: Vec<usize>,
        strides: Vec<usize>,
    ) -> Self {
        assert_eq!(
            shape.len(),
            strides.len(),
            "shape {shape:?} and strides {strides:?} must have the same rank",
        );
        Self {
            location,
            ptr,
            dtype,
            shape,
            strides,
        }
    }

    /// Create a device-resident descriptor with canonical row-major strides.
    #[must_use]
    pub fn contiguous(device: i32, ptr: u64, dtype: DType, shape: &[usize]) -> Self {
        let mut strides = vec![1; shape.len()];
        for d in (0..shape.len().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * shape[d + 1];
        }
        Self::new(Location::Device(device), ptr, dtype, shape.to_vec(), strides)
    }

    /// Device ordinal this buffer resides on, or `None` for host memory.
    #[must_use]
    pub fn device(&self) -> Option<i32> {
        match self.location {
            Location::Device(d) => Some(d),
            Location::Host => None,
        }
    }

    /// Raw base pointer in device address space.
    #[must_use]
    pub fn ptr(&self) -> u64 {
        self.ptr
    }

    /// Element type tag.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Dimension sizes.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Per-dimension strides, in elements.
    #[must_use]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Total number of elements. A zero-dimensional buffer is empty.
    #[must_use]
    pub fn element_count(&self) -> usize {
        if self.shape.is_empty() {
            0
        } else {
            self.shape.iter().product()
        }
    }

    /// Whether the layout matches the canonical row-major stride pattern.
    ///
    /// Scans dimensions from innermost outward: the expected stride starts
    /// at 1 and multiplies by each non-unit dimension size; every non-unit
    /// dimension's actual stride must equal the expected one. Unit
    /// dimensions may carry any stride.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 1;
        for (&size, &stride) in self.shape.iter().zip(&self.strides).rev() {
            if size != 1 {
                if stride != expected {
                    return false;
                }
                expected *= size;
            }
        }
        true
    }
}
