//! Manager binding.
//!
//! Holds the one identity currently recognized as the management agent.
//! The binding is the only state shared across concurrent transitions, so
//! it is a single atomic cell and every update is one compare-and-swap.
//!
//! ## Rebinding
//!
//! The manager installed for a secondary user (work profile, private space)
//! runs under a different uid with the same app id. When such a uid shows
//! up, the binding floats to it:
//!
//! ```text
//! bound 10123, transition to 1010123  →  1010123 % 100000 == 10123 % 100000  →  rebind
//! bound 10123, transition to 1010124  →  different app id                     →  unchanged
//! ```
//!
//! Uids inside the first slot never rebind, and an unbound cell stays unbound.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::identity::{Uid, PER_USER_RANGE};

#[derive(Debug)]
pub struct ManagerBinding {
    uid: AtomicU32,
}

impl ManagerBinding {
    /// An unbound cell.
    pub const fn new() -> Self {
        Self {
            uid: AtomicU32::new(Uid::INVALID.0),
        }
    }

    pub const fn bound(uid: Uid) -> Self {
        Self {
            uid: AtomicU32::new(uid.0),
        }
    }

    pub fn get(&self) -> Option<Uid> {
        let uid = Uid(self.uid.load(Ordering::Acquire));
        uid.is_valid().then_some(uid)
    }

    /// Register `uid` as the manager, replacing any previous binding.
    pub fn bind(&self, uid: Uid) {
        self.uid.store(uid.0, Ordering::Release);
    }

    pub fn clear(&self) {
        self.uid.store(Uid::INVALID.0, Ordering::Release);
    }

    /// Exact match against the current binding.
    #[inline]
    pub fn is_manager(&self, uid: Uid) -> bool {
        uid.is_valid() && self.uid.load(Ordering::Acquire) == uid.0
    }

    /// Move the binding to `new` if it lies in the bound manager's slot
    /// family. Returns whether the binding changed.
    pub fn maybe_rebind(&self, new: Uid) -> bool {
        self.observe(new).rebound
    }

    /// Rebind as in [`maybe_rebind`](Self::maybe_rebind) and report the
    /// binding this call left in place or found there.
    ///
    /// A transition must classify against the returned view: a concurrent
    /// rebind from another profile may move the cell before a second load.
    pub fn observe(&self, new: Uid) -> BindingView {
        if !new.is_valid() || new.0 <= PER_USER_RANGE {
            return BindingView {
                manager: self.get(),
                rebound: false,
            };
        }

        let result = self
            .uid
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let current = Uid(current);
                if !current.is_valid() || current == new {
                    return None;
                }
                (current.app_id() == new.app_id()).then_some(new.0)
            });

        match result {
            Ok(_) => BindingView {
                manager: Some(new),
                rebound: true,
            },
            Err(current) => {
                let current = Uid(current);
                BindingView {
                    manager: current.is_valid().then_some(current),
                    rebound: false,
                }
            }
        }
    }
}

/// Binding as seen by one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingView {
    pub manager: Option<Uid>,
    /// This transition moved the binding.
    pub rebound: bool,
}

impl BindingView {
    #[inline]
    pub fn is_manager(&self, uid: Uid) -> bool {
        uid.is_valid() && self.manager == Some(uid)
    }
}

impl Default for ManagerBinding {
    fn default() -> Self {
        Self::new()
    }
}
