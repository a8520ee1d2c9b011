//! Shape and placement validation for collective buffer sets.
//!
//! A pure precondition check: no side effects, no device access. The rules
//! run in a fixed order and the first violated rule decides the error, so
//! every failure mode maps to exactly one [`Error`] variant.

use std::collections::HashSet;

use crate::buffer::DeviceBuffer;
use crate::{Error, Result};

/// Check that `inputs` and `outputs` form a legal collective operation.
///
/// `size_multiplier` is the expected ratio of output to input element
/// counts: 1 for reduce/broadcast/all-reduce, the participant count for
/// gather-style collectives.
///
/// # Errors
/// Returns the error for the first violated rule:
/// 1. `ShapeMismatch`: empty inputs, or unequal sequence lengths
/// 2. `DeviceType`: a buffer not resident in device memory
/// 3. `NotContiguous`: a buffer whose strides break row-major layout
/// 4. `DuplicateDevice`: two inputs on the same device
/// 5. `DeviceMismatch`: an output on a different device than its input
/// 6. `SizeMismatch`: inputs with differing element counts
/// 7. `SizeMismatch`: an output count not `input count * size_multiplier`
pub fn validate(
    inputs: &[DeviceBuffer],
    outputs: &[DeviceBuffer],
    size_multiplier: usize,
) -> Result<()> {
    if inputs.is_empty() || inputs.len() != outputs.len() {
        return Err(Error::ShapeMismatch {
            inputs: inputs.len(),
            outputs: outputs.len(),
        });
    }

    let input_devices = resident_devices("input", inputs)?;
    let output_devices = resident_devices("output", outputs)?;

    for (side, bufs) in [("input", inputs), ("output", outputs)] {
        for (index, buf) in bufs.iter().enumerate() {
            if !buf.is_contiguous() {
                return Err(Error::NotContiguous { side, index });
            }
        }
    }

    let mut seen = HashSet::new();
    for &device in &input_devices {
        if !seen.insert(device) {
            return Err(Error::DuplicateDevice { device });
        }
    }

    for (index, (&input, &output)) in input_devices.iter().zip(&output_devices).enumerate() {
        if input != output {
            return Err(Error::DeviceMismatch {
                index,
                input,
                output,
            });
        }
    }

    let count = inputs[0].element_count();
    for (index, input) in inputs.iter().enumerate().skip(1) {
        if input.element_count() != count {
            return Err(Error::SizeMismatch {
                index,
                expected: count,
                got: input.element_count(),
            });
        }
    }

    for (index, (input, output)) in inputs.iter().zip(outputs).enumerate() {
        let expected = input.element_count() * size_multiplier;
        if output.element_count() != expected {
            return Err(Error::SizeMismatch {
                index,
                expected,
                got: output.element_count(),
            });
        }
    }

    Ok(())
}

/// Collect the device ordinal of every buffer, rejecting host-resident ones.
fn resident_devices(side: &'static str, bufs: &[DeviceBuffer]) -> Result<Vec<i32>> {
    bufs.iter()
        .enumerate()
        .map(|(index, buf)| buf.device().ok_or(Error::DeviceType { side, index }))
        .collect()
}
