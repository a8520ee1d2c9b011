//! Quorum: single-process multi-GPU collective dispatch
//!
//! This crate coordinates collective communication operations (reduce,
//! broadcast, all-reduce, all-gather) across multiple GPU devices within
//! one process. It validates caller-supplied buffer sets, caches one
//! communicator group per ordered device set, and issues the per-device
//! primitives under the process-wide allocator lock.
//!
//! The vendor transport and the device-context API are trait seams
//! ([`Transport`], [`DeviceContext`]); backend implementations live in
//! separate crates (`quorum-nccl` for NCCL via cudarc). The core never
//! allocates or frees device memory.

pub mod buffer;
pub mod cache;
pub mod dispatch;
pub mod dtype;
pub mod error;
pub mod lock;
pub mod transport;
pub mod validate;

pub use buffer::{DeviceBuffer, Location};
pub use cache::{CommCache, CommGroup};
pub use dispatch::Collectives;
pub use dtype::DType;
pub use error::{Error, Result};
pub use lock::AllocatorLock;
pub use transport::{CommHandle, DeviceContext, ReduceOp, StreamHandle, Transport};
pub use validate::validate;
