//! Allowlist policy.
//!
//! The allowlist store itself belongs to the host; the hook only queries it
//! through the [`Allowlist`] trait. [`PolicyEvaluator`] adds the one rule the
//! store cannot express: the manager is trusted unconditionally. The manager
//! is kept out of the store, so asking the store about it would be
//! meaningless.
//!
//! [`MemoryAllowlist`] is a concurrent in-memory store used by the CLI and
//! by tests.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::identity::Uid;
use crate::manager::ManagerBinding;
use crate::task::Task;

/// Read side of the host's allowlist store.
///
/// Implementations must be non-blocking and bounded: they are called from
/// the transition hot path.
pub trait Allowlist: Send + Sync {
    /// Whether `uid` is granted elevated trust, as seen from `caller`.
    fn lookup(&self, caller: &Task, uid: Uid) -> bool;

    /// Whether an ordinary task running as `uid` should have sensitive
    /// mounts hidden from it.
    fn should_isolate(&self, uid: Uid) -> bool;
}

/// One allowlist record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowlistEntry {
    pub uid: Uid,
    pub granted: bool,
    /// Hide sensitive mounts from this identity when it is not granted.
    #[serde(default = "default_isolate")]
    pub isolate: bool,
}

fn default_isolate() -> bool {
    true
}

impl AllowlistEntry {
    pub fn granted(uid: Uid) -> Self {
        Self {
            uid,
            granted: true,
            isolate: false,
        }
    }

    pub fn denied(uid: Uid) -> Self {
        Self {
            uid,
            granted: false,
            isolate: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryAllowlist {
    entries: DashMap<Uid, AllowlistEntry>,
}

impl MemoryAllowlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = AllowlistEntry>) -> Self {
        let list = Self::new();
        for entry in entries {
            list.insert(entry);
        }
        list
    }

    pub fn insert(&self, entry: AllowlistEntry) {
        self.entries.insert(entry.uid, entry);
    }

    pub fn grant(&self, uid: Uid) {
        self.insert(AllowlistEntry::granted(uid));
    }

    pub fn deny(&self, uid: Uid) {
        self.insert(AllowlistEntry::denied(uid));
    }

    /// Keep `uid` denied but leave its mounts visible.
    pub fn exempt_from_isolation(&self, uid: Uid) {
        self.entries
            .entry(uid)
            .and_modify(|e| e.isolate = false)
            .or_insert(AllowlistEntry {
                uid,
                granted: false,
                isolate: false,
            });
    }

    pub fn remove(&self, uid: Uid) -> Option<AllowlistEntry> {
        self.entries.remove(&uid).map(|(_, e)| e)
    }

    pub fn get(&self, uid: Uid) -> Option<AllowlistEntry> {
        self.entries.get(&uid).map(|e| *e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Allowlist for MemoryAllowlist {
    fn lookup(&self, _caller: &Task, uid: Uid) -> bool {
        self.entries.get(&uid).is_some_and(|e| e.granted)
    }

    fn should_isolate(&self, uid: Uid) -> bool {
        match self.entries.get(&uid) {
            Some(e) => !e.granted && e.isolate,
            None => true,
        }
    }
}

/// Answers "is this identity trusted" for one transition.
#[derive(Debug)]
pub struct PolicyEvaluator<'a, A: ?Sized> {
    binding: &'a ManagerBinding,
    allowlist: &'a A,
}

impl<'a, A: Allowlist + ?Sized> PolicyEvaluator<'a, A> {
    pub fn new(binding: &'a ManagerBinding, allowlist: &'a A) -> Self {
        Self { binding, allowlist }
    }

    /// Manager first, without touching the store; then the store.
    pub fn is_trusted(&self, current: &Task, target: Uid) -> bool {
        if self.binding.is_manager(target) {
            return true;
        }
        self.allowlist.lookup(current, target)
    }

    pub fn should_isolate(&self, uid: Uid) -> bool {
        self.allowlist.should_isolate(uid)
    }
}
