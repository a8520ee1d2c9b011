//! NCCL-backed [`Transport`] via `cudarc::nccl`.
//!
//! Communicators are created with `ncclCommInitAll` (one process, one
//! handle per device) and passed around as raw `ncclComm_t` values inside
//! opaque [`CommHandle`]s. All primitives enqueue on the stream the
//! dispatcher supplies; a null stream is the device's default stream.

use std::ffi::c_void;

use cudarc::nccl::result::{self, NcclError};
use cudarc::nccl::sys;

use quorum::{CommHandle, DType, Error, ReduceOp, Result, StreamHandle, Transport};

/// The NCCL transport. Stateless: communicator lifetimes are managed by
/// the caller (in practice, quorum's communicator cache).
#[derive(Debug, Default)]
pub struct NcclTransport;

impl NcclTransport {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Wire type for a dtype, if this NCCL generation can move it.
/// `ncclBfloat16` requires NCCL >= 2.10 at runtime, so bf16 is reported
/// unsupported rather than risking an `ncclInvalidArgument` mid-dispatch.
fn nccl_dtype(dtype: DType) -> Option<sys::ncclDataType_t> {
    use sys::ncclDataType_t as t;
    match dtype {
        DType::F32 => Some(t::ncclFloat32),
        DType::F16 => Some(t::ncclFloat16),
        DType::I64 => Some(t::ncclInt64),
        DType::I32 => Some(t::ncclInt32),
        DType::I8 => Some(t::ncclInt8),
        DType::U8 => Some(t::ncclUint8),
        DType::BF16 => None,
    }
}

fn nccl_op(op: ReduceOp) -> sys::ncclRedOp_t {
    match op {
        ReduceOp::Sum => sys::ncclRedOp_t::ncclSum,
        ReduceOp::Prod => sys::ncclRedOp_t::ncclProd,
        ReduceOp::Max => sys::ncclRedOp_t::ncclMax,
        ReduceOp::Min => sys::ncclRedOp_t::ncclMin,
    }
}

fn wire_dtype(dtype: DType) -> Result<sys::ncclDataType_t> {
    nccl_dtype(dtype).ok_or(Error::UnsupportedType(dtype))
}

fn transport_err(e: NcclError) -> Error {
    let message = match e.0 {
        sys::ncclResult_t::ncclUnhandledCudaError => "an unhandled CUDA error",
        sys::ncclResult_t::ncclSystemError => "a system call failed",
        sys::ncclResult_t::ncclInternalError => "an internal NCCL error",
        sys::ncclResult_t::ncclInvalidArgument => "an invalid argument was passed",
        sys::ncclResult_t::ncclInvalidUsage => "invalid API usage",
        _ => "unknown NCCL error code",
    };
    Error::Transport {
        code: e.0 as i32,
        message: message.to_string(),
    }
}

fn comm_of(handle: CommHandle) -> sys::ncclComm_t {
    handle.0 as sys::ncclComm_t
}

fn stream_of(stream: StreamHandle) -> *mut sys::CUstream_st {
    stream.0 as *mut sys::CUstream_st
}

impl Transport for NcclTransport {
    fn init_all(&self, devices: &[i32]) -> Result<Vec<CommHandle>> {
        let mut comms: Vec<sys::ncclComm_t> = vec![std::ptr::null_mut(); devices.len()];
        unsafe {
            result::comm_init_all(
                comms.as_mut_ptr(),
                devices.len() as i32,
                devices.as_ptr(),
            )
        }
        .map_err(transport_err)?;
        Ok(comms.into_iter().map(|c| CommHandle(c as u64)).collect())
    }

    fn destroy(&self, comm: CommHandle) -> Result<()> {
        unsafe { result::comm_destroy(comm_of(comm)) }.map_err(transport_err)
    }

    fn supports_grouping(&self) -> bool {
        // Group brackets exist on every NCCL 2.x release cudarc binds.
        true
    }

    fn supports_dtype(&self, dtype: DType) -> bool {
        nccl_dtype(dtype).is_some()
    }

    fn group_start(&self) -> Result<()> {
        result::group_start().map_err(transport_err)
    }

    fn group_end(&self) -> Result<()> {
        result::group_end().map_err(transport_err)
    }

    #[allow(clippy::too_many_arguments)]
    fn reduce(
        &self,
        src: u64,
        dst: u64,
        count: usize,
        dtype: DType,
        op: ReduceOp,
        root: usize,
        comm: CommHandle,
        stream: StreamHandle,
    ) -> Result<()> {
        let wire = wire_dtype(dtype)?;
        unsafe {
            result::reduce(
                src as *const c_void,
                dst as *mut c_void,
                count,
                wire,
                nccl_op(op),
                root as i32,
                comm_of(comm),
                stream_of(stream),
            )
        }
        .map_err(transport_err)
    }

    #[allow(clippy::too_many_arguments)]
    fn broadcast(
        &self,
        src: u64,
        dst: u64,
        count: usize,
        dtype: DType,
        root: usize,
        comm: CommHandle,
        stream: StreamHandle,
    ) -> Result<()> {
        let wire = wire_dtype(dtype)?;
        unsafe {
            result::broadcast(
                src as *const c_void,
                dst as *mut c_void,
                count,
                wire,
                root as i32,
                comm_of(comm),
                stream_of(stream),
            )
        }
        .map_err(transport_err)
    }

    #[allow(clippy::too_many_arguments)]
    fn all_reduce(
        &self,
        src: u64,
        dst: u64,
        count: usize,
        dtype: DType,
        op: ReduceOp,
        comm: CommHandle,
        stream: StreamHandle,
    ) -> Result<()> {
        let wire = wire_dtype(dtype)?;
        unsafe {
            result::all_reduce(
                src as *const c_void,
                dst as *mut c_void,
                count,
                wire,
                nccl_op(op),
                comm_of(comm),
                stream_of(stream),
            )
        }
        .map_err(transport_err)
    }

    fn all_gather(
        &self,
        src: u64,
        dst: u64,
        count: usize,
        dtype: DType,
        comm: CommHandle,
        stream: StreamHandle,
    ) -> Result<()> {
        let wire = wire_dtype(dtype)?;
        unsafe {
            result::all_gather(
                src as *const c_void,
                dst as *mut c_void,
                count,
                wire,
                comm_of(comm),
                stream_of(stream),
            )
        }
        .map_err(transport_err)
    }
}
