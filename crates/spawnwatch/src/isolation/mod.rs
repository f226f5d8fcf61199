//! Mount isolation for untrusted tasks.
//!
//! When a task is judged ordinary, mounts marked as sensitive are hidden from
//! it before it runs any app code. The physical work is done by an
//! [`IsolationEngine`]; this module only sequences the calls:
//!
//! - **basic** - unmount
//! - **extended** - unmount, then reorder mount ids, reconcile hidden paths,
//!   and mark the task as processed
//!
//! - **umount** - Unmount list and the `rustix`-backed reference engine

mod umount;

pub use umount::{UmountEngine, UmountEntry, UmountError, UmountList, DEFAULT_UMOUNT_FLAGS};

use crate::config::Variant;
use crate::error::Result;
use crate::identity::Uid;
use crate::task::Task;

/// Mount/namespace isolation engine.
///
/// Every call must be bounded and must not fail the transition: engines log
/// their own failures and return.
pub trait IsolationEngine: Send + Sync {
    /// Called once when the hook starts.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Called once when the hook stops.
    fn shutdown(&self) {}

    /// Hide sensitive mounts from `task`, which is moving from `old` to `new`.
    fn unmount_sensitive_paths(&self, task: &Task, old: Uid, new: Uid);

    /// Compact mount ids after sensitive mounts are gone.
    fn reorder_mount_table(&self) {}

    /// Re-apply per-identity hidden paths.
    fn reconcile_hidden_paths(&self, _uid: Uid) {}

    /// Record that isolation already ran for `task`.
    fn mark_isolated(&self, task: &Task) {
        task.mark_isolated();
    }
}

#[derive(Debug)]
pub struct IsolationTrigger<'a, E: ?Sized> {
    engine: &'a E,
    variant: Variant,
}

impl<'a, E: IsolationEngine + ?Sized> IsolationTrigger<'a, E> {
    pub fn new(engine: &'a E, variant: Variant) -> Self {
        Self { engine, variant }
    }

    pub fn isolate(&self, task: &Task, old: Uid, new: Uid) {
        tracing::info!(pid = task.pid(), old = %old, new = %new, "hiding sensitive mounts");
        self.engine.unmount_sensitive_paths(task, old, new);

        if self.variant == Variant::Extended {
            self.engine.reorder_mount_table();
            self.engine.reconcile_hidden_paths(new);
            self.engine.mark_isolated(task);
        }
    }
}
