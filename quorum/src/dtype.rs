//! Element types for collective buffers

use std::fmt;

/// Supported element types for device buffers.
///
/// This is a closed set: the binding layer resolves its dynamic tensor type
/// to one of these tags before a descriptor ever reaches the dispatcher.
/// Whether a given tag can actually be moved by a transport is a transport
/// capability, queried once at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit floating point
    F32,
    /// 16-bit floating point (IEEE 754)
    F16,
    /// Brain floating point (16-bit)
    BF16,
    /// 64-bit signed integer
    I64,
    /// 32-bit signed integer
    I32,
    /// 8-bit signed integer
    I8,
    /// 8-bit unsigned integer
    U8,
}

impl DType {
    /// Size of the dtype in bytes
    #[must_use]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::I64 => 8,
            Self::F32 | Self::I32 => 4,
            Self::F16 | Self::BF16 => 2,
            Self::I8 | Self::U8 => 1,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F32 => write!(f, "f32"),
            Self::F16 => write!(f, "f16"),
            Self::BF16 => write!(f, "bf16"),
            Self::I64 => write!(f, "i64"),
            Self::I32 => write!(f, "i32"),
            Self::I8 => write!(f, "i8"),
            Self::U8 => write!(f, "u8"),
        }
    }
}
