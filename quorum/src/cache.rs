//! Communicator-group cache keyed by ordered device set.
//!
//! Communicator creation is a collective, synchronizing-barrier operation,
//! and the transport's group protocol assumes the *same* handles are reused
//! across repeated collectives among the same participants. Groups are
//! therefore created once per device sequence and live until a whole-cache
//! reset at process teardown. There is no eviction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::transport::{CommHandle, Transport};
use crate::Result;

/// One communicator per device, created atomically for the whole set.
///
/// Handles are positional: `handles()[i]` is the communicator whose
/// participant index is `i`, bound to `devices()[i]`.
#[derive(Debug)]
pub struct CommGroup {
    devices: Vec<i32>,
    handles: Vec<CommHandle>,
}

impl CommGroup {
    /// Device ordinals, in the order the group was created with.
    #[must_use]
    pub fn devices(&self) -> &[i32] {
        &self.devices
    }

    /// Per-participant communicator handles, parallel to [`devices`](Self::devices).
    #[must_use]
    pub fn handles(&self) -> &[CommHandle] {
        &self.handles
    }

    /// Number of participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the group has no participants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Process-lifetime cache of communicator groups.
///
/// The key is the literal ordered device sequence, *not* a sorted set:
/// participant indices are assigned by position, so `[2, 1, 0]` names a
/// different group than `[0, 1, 2]`. Callers that vary their ordering pay
/// for extra groups; in exchange no index-mapping layer is needed.
///
/// Lookup takes a shared read lock; creation happens under the write lock
/// with a re-check, so at most one group is ever created per key even
/// under concurrent first requests.
#[derive(Debug, Default)]
pub struct CommCache {
    groups: RwLock<HashMap<Vec<i32>, Arc<CommGroup>>>,
}

impl CommCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached group for `devices`, creating it on first use.
    ///
    /// Every call with an equal device sequence returns the same group.
    ///
    /// # Errors
    /// Propagates the transport's group-initialization failure; nothing is
    /// cached in that case.
    ///
    /// # Panics
    /// Panics if the cache lock is poisoned.
    pub fn get_or_create(
        &self,
        transport: &dyn Transport,
        devices: &[i32],
    ) -> Result<Arc<CommGroup>> {
        if let Some(group) = self.groups.read().unwrap().get(devices) {
            return Ok(Arc::clone(group));
        }

        let mut groups = self.groups.write().unwrap();
        // Another thread may have created the group while we waited.
        if let Some(group) = groups.get(devices) {
            return Ok(Arc::clone(group));
        }

        let handles = transport.init_all(devices)?;
        debug!(?devices, "created communicator group");
        let group = Arc::new(CommGroup {
            devices: devices.to_vec(),
            handles,
        });
        groups.insert(devices.to_vec(), Arc::clone(&group));
        Ok(group)
    }

    /// Destroy every cached communicator and empty the cache.
    ///
    /// Intended for process teardown only: callers must not have
    /// collectives in flight. All handles are destroyed even if some
    /// destructions fail; the first failure is reported.
    ///
    /// # Errors
    /// Returns the first destruction failure, if any.
    ///
    /// # Panics
    /// Panics if the cache lock is poisoned.
    pub fn reset(&self, transport: &dyn Transport) -> Result<()> {
        let groups: Vec<Arc<CommGroup>> = self
            .groups
            .write()
            .unwrap()
            .drain()
            .map(|(_, group)| group)
            .collect();
        debug!(group_count = groups.len(), "destroying all communicator groups");

        let mut first_err: Result<()> = Ok(());
        for group in &groups {
            for &handle in group.handles() {
                if let Err(e) = transport.destroy(handle) {
                    if first_err.is_ok() {
                        first_err = Err(e);
                    }
                }
            }
        }
        first_err
    }

    /// Number of cached groups.
    ///
    /// # Panics
    /// Panics if the cache lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.read().unwrap().len()
    }

    /// Whether the cache holds no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
