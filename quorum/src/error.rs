//! Error types for Quorum

use thiserror::Error;

use crate::dtype::DType;

/// Result type alias using Quorum's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for collective operations.
///
/// Validation failures identify the first violated precondition; transport
/// failures carry the raw status code reported by the collective library.
#[derive(Error, Debug)]
pub enum Error {
    #[error("inputs and outputs must be non-empty sequences of equal length (got {inputs} inputs, {outputs} outputs)")]
    ShapeMismatch { inputs: usize, outputs: usize },

    #[error("{side} buffer {index} is not resident in device memory")]
    DeviceType { side: &'static str, index: usize },

    #[error("{side} buffer {index} is not contiguous")]
    NotContiguous { side: &'static str, index: usize },

    #[error("inputs must be on distinct devices (device {device} appears more than once)")]
    DuplicateDevice { device: i32 },

    #[error("input {index} is on device {input} but its output is on device {output}")]
    DeviceMismatch { index: usize, input: i32, output: i32 },

    #[error("buffer {index} has {got} elements, expected {expected}")]
    SizeMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("element type {0} has no transport equivalent")]
    UnsupportedType(DType),

    #[error("transport error {code}: {message}")]
    Transport { code: i32, message: String },

    #[error("{0}")]
    Usage(String),
}
