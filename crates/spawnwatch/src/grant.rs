//! Capability grants for trusted tasks.
//!
//! Applies the side effects of a positive trust decision to the transitioning
//! task and nothing else:
//!
//! | Grant | `cache` mechanism | `disable` mechanism |
//! |-------|-------------------|---------------------|
//! | Manager | channel + allow `reboot` in cache | drop filter + channel |
//! | Trusted | allow `reboot` if a filter is active | drop filter |
//!
//! In the extended variant a trusted (non-manager) grant also sets the task's
//! tracing flag, and [`CapabilityDispatcher::deny`] clears it again.
//!
//! All filter mutation happens under one acquisition of the task's filter
//! lock. Channel installation may allocate, so it stays outside the lock.

use dashmap::DashMap;
use spawnwatch_sys::SYS_REBOOT;

use crate::config::{FilterMechanism, Variant};
use crate::identity::Uid;
use crate::task::Task;

/// Hands the manager a live handle to the hook. Must be idempotent.
pub trait ChannelInstaller: Send + Sync {
    /// `manager` is the identity the task is transitioning to, not the one
    /// it currently runs as.
    fn install_channel(&self, task: &Task, manager: Uid);
}

/// Channel installer that records one channel per pid, keyed to the manager
/// identity it was granted to.
#[derive(Debug, Default)]
pub struct ChannelTable {
    installed: DashMap<u32, Uid>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self, pid: u32) -> bool {
        self.installed.contains_key(&pid)
    }

    /// Manager identity the channel of `pid` was installed for.
    pub fn holder(&self, pid: u32) -> Option<Uid> {
        self.installed.get(&pid).map(|uid| *uid)
    }

    pub fn len(&self) -> usize {
        self.installed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }
}

impl ChannelInstaller for ChannelTable {
    fn install_channel(&self, task: &Task, manager: Uid) {
        self.installed.entry(task.pid()).or_insert(manager);
    }
}

/// Kind of positive trust decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Manager grant for the bound manager identity.
    Manager(Uid),
    Trusted,
}

#[derive(Debug)]
pub struct CapabilityDispatcher<'a, C: ?Sized> {
    channels: &'a C,
    mechanism: FilterMechanism,
    tracing: bool,
}

impl<'a, C: ChannelInstaller + ?Sized> CapabilityDispatcher<'a, C> {
    pub fn new(channels: &'a C, mechanism: FilterMechanism, variant: Variant) -> Self {
        Self {
            channels,
            mechanism,
            tracing: variant == Variant::Extended,
        }
    }

    pub fn grant(&self, task: &Task, grant: Grant) {
        match self.mechanism {
            FilterMechanism::Cache => self.grant_cached(task, grant),
            FilterMechanism::Disable => self.grant_disabled(task, grant),
        }
    }

    /// Negative-case cleanup: drop the tracing flag of an untrusted task.
    pub fn deny(&self, task: &Task) {
        if self.tracing {
            task.lock_filter().tracing = false;
        }
    }

    fn grant_cached(&self, task: &Task, grant: Grant) {
        match grant {
            Grant::Manager(uid) => {
                self.channels.install_channel(task, uid);
                task.lock_filter().seccomp.allow_cached(SYS_REBOOT);
            }
            Grant::Trusted => {
                let mut state = task.lock_filter();
                if state.seccomp.has_active_filter() {
                    state.seccomp.allow_cached(SYS_REBOOT);
                }
                if self.tracing {
                    state.tracing = true;
                }
            }
        }
    }

    fn grant_disabled(&self, task: &Task, grant: Grant) {
        {
            let mut state = task.lock_filter();
            state.seccomp.disable();
            if self.tracing && grant == Grant::Trusted {
                state.tracing = true;
            }
        }
        if let Grant::Manager(uid) = grant {
            self.channels.install_channel(task, uid);
        }
    }
}
