//! Transport and device-context trait seams.
//!
//! The dispatcher talks to the outside world through two traits: a
//! [`Transport`] (the vendor collective library) and a [`DeviceContext`]
//! (the thread's current-device binding). Concrete backends live in
//! separate crates; tests substitute recording fakes.
//!
//! # Design notes
//!
//! - **Capabilities are queried, not compiled in.** Whether the library
//!   offers group bracketing or can move a given element type is asked of
//!   the transport once per dispatcher/call, so version differences never
//!   leak conditional compilation into the issue loop.
//! - **Handles are opaque.** A [`CommHandle`] is whatever the transport
//!   issued; the core only stores and passes it back.

use crate::dtype::DType;
use crate::Result;

/// Opaque per-participant communicator handle issued by a [`Transport`].
///
/// `handles[i]` of a group is bound to participant index `i`; the core
/// never interprets the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommHandle(pub u64);

/// Raw per-device stream handle. The zero value is the device's default
/// stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

impl StreamHandle {
    /// The device's default stream.
    pub const DEFAULT: Self = Self(0);

    /// Whether this is the default-stream sentinel.
    #[must_use]
    pub fn is_default(self) -> bool {
        self.0 == 0
    }
}

/// Reduction operator applied by reducing collectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Prod,
    Max,
    Min,
}

/// A vendor collective-communication library, reduced to the calls the
/// dispatcher needs.
///
/// Primitives execute asynchronously on the supplied stream; a returned
/// `Ok` means the operation was enqueued, not completed. Every method may
/// be called from any thread.
pub trait Transport: Send + Sync {
    /// Create one communicator per device, atomically for the whole set.
    ///
    /// This is itself a collective, synchronizing operation. Participant
    /// index `i` of the returned handles is bound to `devices[i]`.
    ///
    /// # Errors
    /// Returns `Error::Transport` if group initialization fails; no
    /// partial handle set is returned.
    fn init_all(&self, devices: &[i32]) -> Result<Vec<CommHandle>>;

    /// Destroy a single communicator. Only called during whole-cache
    /// teardown.
    ///
    /// # Errors
    /// Returns `Error::Transport` if the library reports a failure.
    fn destroy(&self, comm: CommHandle) -> Result<()>;

    /// Whether the library offers `group_start`/`group_end` bracketing.
    /// Version-dependent; the dispatcher reads this once at construction.
    fn supports_grouping(&self) -> bool;

    /// Whether `dtype` maps to a wire type this transport can move.
    fn supports_dtype(&self, dtype: DType) -> bool;

    /// Open a group bracket.
    ///
    /// # Errors
    /// Returns `Error::Transport` if the library reports a failure.
    fn group_start(&self) -> Result<()>;

    /// Close a group bracket, flushing the batched issuance.
    ///
    /// # Errors
    /// Returns `Error::Transport` if the library reports a failure.
    fn group_end(&self) -> Result<()>;

    /// Enqueue a rooted reduce: `dst[root] = op(src[0..n])`.
    ///
    /// # Errors
    /// Returns `Error::Transport` carrying the library's status code.
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
    ) -> Result<()>;

    /// Enqueue a broadcast from the root participant.
    ///
    /// # Errors
    /// Returns `Error::Transport` carrying the library's status code.
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
    ) -> Result<()>;

    /// Enqueue an all-reduce: every participant receives `op(src[0..n])`.
    ///
    /// # Errors
    /// Returns `Error::Transport` carrying the library's status code.
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
    ) -> Result<()>;

    /// Enqueue an all-gather: every participant receives the concatenation
    /// of all inputs. `count` is the per-participant input element count.
    ///
    /// # Errors
    /// Returns `Error::Transport` carrying the library's status code.
    fn all_gather(
        &self,
        src: u64,
        dst: u64,
        count: usize,
        dtype: DType,
        comm: CommHandle,
        stream: StreamHandle,
    ) -> Result<()>;
}

/// The device-context layer: which GPU the calling thread is bound to.
pub trait DeviceContext: Send + Sync {
    /// Ordinal of the calling thread's current device.
    ///
    /// # Errors
    /// Returns an error if the device API cannot report a current device.
    fn current(&self) -> Result<i32>;

    /// Bind the calling thread to `device`.
    ///
    /// # Errors
    /// Returns an error if the switch fails.
    fn set_current(&self, device: i32) -> Result<()>;
}
