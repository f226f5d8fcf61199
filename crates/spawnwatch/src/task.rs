//! The transitioning task.
//!
//! A `Task` is the hook's view of the process changing identity: who it is
//! before the change, which security context it runs in, and the per-task
//! state the hook may touch.
//!
//! ## Filter Lock
//!
//! Seccomp state and the tracing flag live behind a task-local exclusive
//! lock (the equivalent of the kernel's `sighand->siglock`). Rules for the
//! critical section:
//!
//! - Only the owning task's state is reachable through the guard
//! - No allocation, no blocking call, no I/O
//! - Release happens when the guard drops, on every exit path
//!
//! A poisoned lock is recovered rather than reported: a panic in some other
//! holder must not stop a transition from completing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use spawnwatch_sys::TaskSeccomp;

use crate::identity::{SecurityContext, Uid};

/// State guarded by a task's filter lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterState {
    pub seccomp: TaskSeccomp,
    /// Syscall tracepoint flag. Only used by the extended variant.
    pub tracing: bool,
}

/// Scoped hold on a task's filter lock.
pub type FilterGuard<'a> = MutexGuard<'a, FilterState>;

#[derive(Debug)]
pub struct Task {
    pid: u32,
    uid: Uid,
    context: SecurityContext,
    filter: Mutex<FilterState>,
    isolated: AtomicBool,
}

impl Task {
    /// A task without seccomp.
    pub fn new(pid: u32, uid: Uid, context: SecurityContext) -> Self {
        Self {
            pid,
            uid,
            context,
            filter: Mutex::new(FilterState::default()),
            isolated: AtomicBool::new(false),
        }
    }

    /// Replace the task's seccomp state.
    pub fn with_seccomp(self, seccomp: TaskSeccomp) -> Self {
        self.lock_filter().seccomp = seccomp;
        self
    }

    #[inline]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Identity before the transition.
    #[inline]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    #[inline]
    pub fn context(&self) -> SecurityContext {
        self.context
    }

    /// Take the task's filter lock.
    pub fn lock_filter(&self) -> FilterGuard<'_> {
        self.filter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current filter state.
    pub fn filter_state(&self) -> FilterState {
        *self.lock_filter()
    }

    pub fn seccomp(&self) -> TaskSeccomp {
        self.lock_filter().seccomp
    }

    pub fn tracing_flag(&self) -> bool {
        self.lock_filter().tracing
    }

    /// Whether isolation already ran for this task.
    #[inline]
    pub fn is_isolated(&self) -> bool {
        self.isolated.load(Ordering::Acquire)
    }

    #[inline]
    pub fn mark_isolated(&self) {
        self.isolated.store(true, Ordering::Release);
    }
}
