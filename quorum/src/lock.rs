//! The process-wide allocator lock.
//!
//! The caching allocator must not change device memory layout while a
//! collective is being issued: the transport may trigger allocation-
//! sensitive work during cross-device setup. Both subsystems share one
//! instance of [`AllocatorLock`], created at process start and passed by
//! `Arc` into whoever needs it; there is no ambient global.

use std::sync::{Mutex, MutexGuard};

/// The single advisory mutex guarding the context-switch + issue window.
///
/// Non-reentrant: the dispatcher acquires it exactly once per call, and a
/// nested acquisition from the same thread deadlocks. Serializing
/// otherwise-independent collective calls through this lock is a known
/// throughput cost; correctness against allocator races takes priority.
#[derive(Debug, Default)]
pub struct AllocatorLock {
    inner: Mutex<()>,
}

impl AllocatorLock {
    /// Create the lock. One instance per process.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is held; the guard releases it on drop, on
    /// every exit path including panics.
    ///
    /// # Panics
    /// Panics if a previous holder panicked while holding the lock.
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.inner.lock().expect("allocator lock poisoned")
    }
}
