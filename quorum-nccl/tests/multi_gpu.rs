//! Multi-GPU integration tests for the NCCL backend.
//!
//! These need a CUDA toolkit, an NCCL runtime, and at least two GPUs; each
//! test skips itself when fewer devices are available. Run with:
//!
//!   cargo test -p quorum-nccl --features cuda
#![cfg(feature = "cuda")]

use std::sync::Arc;

use cudarc::driver::{CudaDevice, DevicePtr};

use quorum::{AllocatorLock, Collectives, DType, DeviceBuffer, ReduceOp};
use quorum_nccl::{CudaDeviceContext, NcclTransport};

fn collectives() -> Collectives {
    Collectives::new(
        Arc::new(NcclTransport::new()),
        Arc::new(CudaDeviceContext::new()),
        Arc::new(AllocatorLock::new()),
    )
}

fn two_devices() -> Option<(Arc<CudaDevice>, Arc<CudaDevice>)> {
    let n = CudaDevice::count().unwrap() as usize;
    if n < 2 {
        eprintln!("Skipping multi-GPU test: only {n} device(s) available");
        return None;
    }
    Some((CudaDevice::new(0).unwrap(), CudaDevice::new(1).unwrap()))
}

#[test]
fn reduce_sums_into_root() {
    let Some((d0, d1)) = two_devices() else {
        return;
    };

    let in0 = d0.htod_sync_copy(&vec![1.0f32; 100]).unwrap();
    let out0 = d0.alloc_zeros::<f32>(100).unwrap();
    let in1 = d1.htod_sync_copy(&vec![2.0f32; 100]).unwrap();
    let out1 = d1.alloc_zeros::<f32>(100).unwrap();

    let inputs = [
        DeviceBuffer::contiguous(0, *in0.device_ptr(), DType::F32, &[100]),
        DeviceBuffer::contiguous(1, *in1.device_ptr(), DType::F32, &[100]),
    ];
    let outputs = [
        DeviceBuffer::contiguous(0, *out0.device_ptr(), DType::F32, &[100]),
        DeviceBuffer::contiguous(1, *out1.device_ptr(), DType::F32, &[100]),
    ];

    let collectives = collectives();
    collectives
        .reduce(&inputs, &outputs, &[], 0, ReduceOp::Sum)
        .unwrap();
    d0.synchronize().unwrap();

    let host = d0.dtoh_sync_copy(&out0).unwrap();
    for v in &host {
        assert!((v - 3.0).abs() < 1e-6, "expected 3.0, got {v}");
    }

    collectives.shutdown().unwrap();
}

#[test]
fn all_reduce_makes_every_rank_equal() {
    let Some((d0, d1)) = two_devices() else {
        return;
    };

    let in0 = d0.htod_sync_copy(&vec![10.0f32; 64]).unwrap();
    let out0 = d0.alloc_zeros::<f32>(64).unwrap();
    let in1 = d1.htod_sync_copy(&vec![32.0f32; 64]).unwrap();
    let out1 = d1.alloc_zeros::<f32>(64).unwrap();

    let inputs = [
        DeviceBuffer::contiguous(0, *in0.device_ptr(), DType::F32, &[64]),
        DeviceBuffer::contiguous(1, *in1.device_ptr(), DType::F32, &[64]),
    ];
    let outputs = [
        DeviceBuffer::contiguous(0, *out0.device_ptr(), DType::F32, &[64]),
        DeviceBuffer::contiguous(1, *out1.device_ptr(), DType::F32, &[64]),
    ];

    let collectives = collectives();
    collectives
        .all_reduce(&inputs, &outputs, &[], ReduceOp::Sum)
        .unwrap();
    d0.synchronize().unwrap();
    d1.synchronize().unwrap();

    for (device, out) in [(&d0, &out0), (&d1, &out1)] {
        let host = device.dtoh_sync_copy(out).unwrap();
        for v in &host {
            assert!((v - 42.0).abs() < 1e-6, "expected 42.0, got {v}");
        }
    }

    collectives.shutdown().unwrap();
}

#[test]
fn communicators_are_reused_across_calls() {
    let Some((d0, d1)) = two_devices() else {
        return;
    };

    let in0 = d0.htod_sync_copy(&vec![1.0f32; 16]).unwrap();
    let out0 = d0.alloc_zeros::<f32>(16).unwrap();
    let in1 = d1.htod_sync_copy(&vec![1.0f32; 16]).unwrap();
    let out1 = d1.alloc_zeros::<f32>(16).unwrap();

    let inputs = [
        DeviceBuffer::contiguous(0, *in0.device_ptr(), DType::F32, &[16]),
        DeviceBuffer::contiguous(1, *in1.device_ptr(), DType::F32, &[16]),
    ];
    let outputs = [
        DeviceBuffer::contiguous(0, *out0.device_ptr(), DType::F32, &[16]),
        DeviceBuffer::contiguous(1, *out1.device_ptr(), DType::F32, &[16]),
    ];

    // Repeated calls must reuse the same communicator group; a second
    // ncclCommInitAll for the same devices would deadlock or error here.
    let collectives = collectives();
    for _ in 0..4 {
        collectives
            .all_reduce(&inputs, &outputs, &[], ReduceOp::Max)
            .unwrap();
    }
    d0.synchronize().unwrap();

    collectives.shutdown().unwrap();
}
