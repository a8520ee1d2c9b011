//! The collective dispatcher: the per-device issue loop.
//!
//! One [`Collectives`] instance owns the communicator cache and coordinates
//! every collective call in the process: validate the buffer sets, resolve
//! the communicator group, then, under the allocator lock, walk the
//! devices in input order, switching the thread's device context and
//! enqueueing one transport primitive per device inside a group bracket.
//!
//! Calls are synchronous up to *enqueue*: when a method returns `Ok`, all
//! per-device work has been issued on its stream, not necessarily
//! completed. On a mid-loop transport failure the call fails fast;
//! primitives already enqueued keep running and the call's outputs must be
//! treated as undefined. Nothing is retried: re-issuing a reduce after a
//! partial dispatch could double-count.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::buffer::DeviceBuffer;
use crate::cache::{CommCache, CommGroup};
use crate::dtype::DType;
use crate::lock::AllocatorLock;
use crate::transport::{DeviceContext, ReduceOp, StreamHandle, Transport};
use crate::validate::validate;
use crate::{Error, Result};

/// Which collective to issue, with its scalar parameters.
#[derive(Debug, Clone, Copy)]
enum Collective {
    Reduce { root: usize, op: ReduceOp },
    Broadcast { root: usize },
    AllReduce { op: ReduceOp },
    AllGather,
}

impl Collective {
    /// Output element count per input element.
    fn size_multiplier(self, participants: usize) -> usize {
        match self {
            Self::AllGather => participants,
            Self::Reduce { .. } | Self::Broadcast { .. } | Self::AllReduce { .. } => 1,
        }
    }

    /// Root participant index, for rooted collectives.
    fn root(self) -> Option<usize> {
        match self {
            Self::Reduce { root, .. } | Self::Broadcast { root } => Some(root),
            Self::AllReduce { .. } | Self::AllGather => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Reduce { .. } => "reduce",
            Self::Broadcast { .. } => "broadcast",
            Self::AllReduce { .. } => "all_reduce",
            Self::AllGather => "all_gather",
        }
    }
}

/// One per-device issue in an [`ExecutionPlan`].
struct PlanEntry {
    device: i32,
    src: u64,
    dst: u64,
    stream: StreamHandle,
}

/// Transient zip of inputs, outputs, and streams for a single call.
/// Entry order is input order, which is also participant-index order.
struct ExecutionPlan {
    entries: Vec<PlanEntry>,
    devices: Vec<i32>,
    count: usize,
    dtype: DType,
}

impl ExecutionPlan {
    /// Zip the caller's sequences by position. `streams` is either empty
    /// (default stream everywhere) or parallel to `inputs`; the caller has
    /// already checked its length. Buffers have already passed validation.
    fn build(
        inputs: &[DeviceBuffer],
        outputs: &[DeviceBuffer],
        streams: &[Option<StreamHandle>],
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(inputs.len());
        let mut devices = Vec::with_capacity(inputs.len());

        for (index, (input, output)) in inputs.iter().zip(outputs).enumerate() {
            let device = input.device().ok_or(Error::DeviceType {
                side: "input",
                index,
            })?;
            let stream = streams
                .get(index)
                .copied()
                .flatten()
                .unwrap_or(StreamHandle::DEFAULT);
            entries.push(PlanEntry {
                device,
                src: input.ptr(),
                dst: output.ptr(),
                stream,
            });
            devices.push(device);
        }

        Ok(Self {
            entries,
            devices,
            count: inputs[0].element_count(),
            dtype: inputs[0].dtype(),
        })
    }
}

/// Process-scoped entry point for collective operations.
///
/// Construct one per process with the transport, the device-context layer,
/// and the allocator lock shared with the allocator subsystem. Methods may
/// be called from multiple threads; the allocator lock serializes the
/// device-switching critical sections.
pub struct Collectives {
    transport: Arc<dyn Transport>,
    device_ctx: Arc<dyn DeviceContext>,
    cache: CommCache,
    alloc_lock: Arc<AllocatorLock>,
    /// Group-bracket capability, read from the transport once.
    grouped: bool,
}

impl Collectives {
    /// Wire up a dispatcher. `alloc_lock` must be the same instance the
    /// allocator subsystem uses.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        device_ctx: Arc<dyn DeviceContext>,
        alloc_lock: Arc<AllocatorLock>,
    ) -> Self {
        let grouped = transport.supports_grouping();
        Self {
            transport,
            device_ctx,
            cache: CommCache::new(),
            alloc_lock,
            grouped,
        }
    }

    /// Reduce all inputs element-wise with `op` into the output of
    /// participant `root`.
    ///
    /// `streams` is either empty (default stream on every device) or one
    /// optional stream per input.
    ///
    /// # Errors
    /// Any validation failure or transport error; see the crate-level
    /// failure semantics.
    pub fn reduce(
        &self,
        inputs: &[DeviceBuffer],
        outputs: &[DeviceBuffer],
        streams: &[Option<StreamHandle>],
        root: usize,
        op: ReduceOp,
    ) -> Result<()> {
        self.launch(inputs, outputs, streams, Collective::Reduce { root, op })
    }

    /// Copy participant `root`'s input into every output.
    ///
    /// # Errors
    /// Any validation failure or transport error.
    pub fn broadcast(
        &self,
        inputs: &[DeviceBuffer],
        outputs: &[DeviceBuffer],
        streams: &[Option<StreamHandle>],
        root: usize,
    ) -> Result<()> {
        self.launch(inputs, outputs, streams, Collective::Broadcast { root })
    }

    /// Reduce all inputs element-wise with `op` into every output.
    ///
    /// # Errors
    /// Any validation failure or transport error.
    pub fn all_reduce(
        &self,
        inputs: &[DeviceBuffer],
        outputs: &[DeviceBuffer],
        streams: &[Option<StreamHandle>],
        op: ReduceOp,
    ) -> Result<()> {
        self.launch(inputs, outputs, streams, Collective::AllReduce { op })
    }

    /// Concatenate all inputs, in participant order, into every output.
    /// Outputs must hold `participants * input count` elements.
    ///
    /// # Errors
    /// Any validation failure or transport error.
    pub fn all_gather(
        &self,
        inputs: &[DeviceBuffer],
        outputs: &[DeviceBuffer],
        streams: &[Option<StreamHandle>],
    ) -> Result<()> {
        self.launch(inputs, outputs, streams, Collective::AllGather)
    }

    /// Destroy every cached communicator. Process-teardown only; no
    /// collectives may be in flight.
    ///
    /// # Errors
    /// Returns the first destruction failure, if any.
    pub fn shutdown(&self) -> Result<()> {
        self.cache.reset(&*self.transport)
    }

    fn launch(
        &self,
        inputs: &[DeviceBuffer],
        outputs: &[DeviceBuffer],
        streams: &[Option<StreamHandle>],
        collective: Collective,
    ) -> Result<()> {
        validate(inputs, outputs, collective.size_multiplier(inputs.len()))?;

        if !streams.is_empty() && streams.len() != inputs.len() {
            return Err(Error::Usage(format!(
                "number of streams ({}) does not match number of inputs ({})",
                streams.len(),
                inputs.len()
            )));
        }

        let dtype = inputs[0].dtype();
        if !self.transport.supports_dtype(dtype) {
            return Err(Error::UnsupportedType(dtype));
        }

        let plan = ExecutionPlan::build(inputs, outputs, streams)?;

        if let Some(root) = collective.root() {
            if root >= plan.entries.len() {
                return Err(Error::Usage(format!(
                    "root participant {root} out of range for {} devices",
                    plan.entries.len()
                )));
            }
        }

        let group = self.cache.get_or_create(&*self.transport, &plan.devices)?;
        let original = self.device_ctx.current()?;

        debug!(
            collective = collective.name(),
            devices = ?plan.devices,
            count = plan.count,
            "dispatching collective"
        );

        // Critical section: no allocator activity while device contexts are
        // being switched and primitives issued.
        let _guard = self.alloc_lock.acquire();

        if self.grouped {
            self.transport.group_start()?;
        }

        let issued = self.issue(&plan, &group, collective, original);
        // The original context comes back before any error surfaces, and
        // the bracket is closed even after a failed issue. A close failure
        // never masks the loop's error.
        let restored = self.device_ctx.set_current(original);
        let closed = if self.grouped {
            self.transport.group_end()
        } else {
            Ok(())
        };

        issued.and(restored).and(closed)
    }

    /// Walk the plan in participant order, switching device context as
    /// needed and enqueueing one primitive per device. Fails fast: entries
    /// after the first failure are not issued, entries before it stay
    /// enqueued on their streams.
    fn issue(
        &self,
        plan: &ExecutionPlan,
        group: &CommGroup,
        collective: Collective,
        original: i32,
    ) -> Result<()> {
        let mut current = original;
        for (participant, entry) in plan.entries.iter().enumerate() {
            if entry.device != current {
                self.device_ctx.set_current(entry.device)?;
                current = entry.device;
            }

            let comm = group.handles()[participant];
            trace!(
                collective = collective.name(),
                device = entry.device,
                participant,
                "issuing primitive"
            );
            match collective {
                Collective::Reduce { root, op } => self.transport.reduce(
                    entry.src,
                    entry.dst,
                    plan.count,
                    plan.dtype,
                    op,
                    root,
                    comm,
                    entry.stream,
                )?,
                Collective::Broadcast { root } => self.transport.broadcast(
                    entry.src,
                    entry.dst,
                    plan.count,
                    plan.dtype,
                    root,
                    comm,
                    entry.stream,
                )?,
                Collective::AllReduce { op } => self.transport.all_reduce(
                    entry.src,
                    entry.dst,
                    plan.count,
                    plan.dtype,
                    op,
                    comm,
                    entry.stream,
                )?,
                Collective::AllGather => self.transport.all_gather(
                    entry.src,
                    entry.dst,
                    plan.count,
                    plan.dtype,
                    comm,
                    entry.stream,
                )?,
            }
        }
        Ok(())
    }
}
