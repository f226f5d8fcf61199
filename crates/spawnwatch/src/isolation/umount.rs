//! Unmount list and reference isolation engine.
//!
//! The list holds mount points to detach from untrusted tasks, each with its
//! `umount2` flags. Entries are applied deepest path first so nested mounts
//! go before their parents.
//!
//! ```text
//! /data/adb/modules/foo/system   (depth 5)  → detached first
//! /data/adb/modules              (depth 3)
//! /debug_ramdisk                 (depth 1)  → detached last
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use rustix::io::Errno;
use rustix::mount::{unmount, UnmountFlags};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::IsolationEngine;
use crate::error::HookError;
use crate::identity::Uid;
use crate::task::Task;

/// `MNT_DETACH`: lazy unmount, the usual choice for hiding.
pub const DEFAULT_UMOUNT_FLAGS: u32 = UnmountFlags::DETACH.bits();

/// Every bit `umount2` understands.
const KNOWN_UMOUNT_FLAGS: u32 = UnmountFlags::FORCE.bits()
    | UnmountFlags::DETACH.bits()
    | UnmountFlags::EXPIRE.bits()
    | UnmountFlags::NOFOLLOW.bits();

#[derive(Debug, Error)]
pub enum UmountError {
    #[error("unmount path must be absolute: {0}")]
    RelativePath(PathBuf),

    #[error("unmount path must not be the root")]
    RootPath,

    #[error("invalid unmount flags {flags:#x} for {}", .path.display())]
    InvalidFlags { path: PathBuf, flags: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmountEntry {
    pub path: PathBuf,
    #[serde(default = "default_flags")]
    pub flags: u32,
}

fn default_flags() -> u32 {
    DEFAULT_UMOUNT_FLAGS
}

impl UmountEntry {
    /// Reject flags `umount2` would refuse: unknown bits, or `MNT_EXPIRE`
    /// combined with `MNT_FORCE` or `MNT_DETACH`.
    pub fn validate(&self) -> Result<(), UmountError> {
        let expire = self.flags & UnmountFlags::EXPIRE.bits() != 0;
        let eager = self.flags & (UnmountFlags::FORCE.bits() | UnmountFlags::DETACH.bits()) != 0;
        if self.flags & !KNOWN_UMOUNT_FLAGS != 0 || (expire && eager) {
            return Err(UmountError::InvalidFlags {
                path: self.path.clone(),
                flags: self.flags,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct UmountList {
    paths: DashMap<PathBuf, u32>,
}

impl UmountList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a mount point.
    pub fn add(&self, path: impl Into<PathBuf>, flags: u32) -> Result<(), UmountError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(UmountError::RelativePath(path));
        }
        if path == Path::new("/") {
            return Err(UmountError::RootPath);
        }
        self.paths.insert(path, flags);
        Ok(())
    }

    /// Returns whether the path was listed.
    pub fn remove(&self, path: &Path) -> bool {
        self.paths.remove(path).is_some()
    }

    pub fn wipe(&self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Entries in unmount order: deepest first, then lexical.
    pub fn entries(&self) -> Vec<UmountEntry> {
        let mut entries: Vec<UmountEntry> = self
            .paths
            .iter()
            .map(|e| UmountEntry {
                path: e.key().clone(),
                flags: *e.value(),
            })
            .collect();
        entries.sort_by(|a, b| {
            let depth = |p: &Path| p.components().count();
            depth(&b.path)
                .cmp(&depth(&a.path))
                .then_with(|| a.path.cmp(&b.path))
        });
        entries
    }
}

/// Isolation engine that lazily detaches every listed mount point.
///
/// Must run in the mount namespace of the task being isolated. In dry-run
/// mode no syscall is made; attempts are only logged and counted.
#[derive(Debug, Default)]
pub struct UmountEngine {
    list: UmountList,
    dry_run: bool,
    attempts: AtomicUsize,
}

impl UmountEngine {
    pub fn new(list: UmountList) -> Self {
        Self {
            list,
            dry_run: false,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn list(&self) -> &UmountList {
        &self.list
    }

    /// Number of unmount attempts made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    fn detach(&self, entry: &UmountEntry, new: Uid) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if self.dry_run {
            tracing::debug!(path = %entry.path.display(), uid = %new, "would unmount");
            return;
        }

        match unmount(entry.path.as_path(), UnmountFlags::from_bits_retain(entry.flags)) {
            Ok(()) => tracing::debug!(path = %entry.path.display(), uid = %new, "unmounted"),
            // Not a mount point, or already gone in this namespace.
            Err(Errno::INVAL | Errno::NOENT) => {}
            Err(e) => {
                tracing::warn!(path = %entry.path.display(), uid = %new, error = %e, "unmount failed");
            }
        }
    }
}

impl IsolationEngine for UmountEngine {
    fn init(&self) -> crate::error::Result<()> {
        for entry in self.list.entries() {
            entry
                .validate()
                .map_err(|e| HookError::Isolation(e.to_string()))?;
        }
        tracing::info!(entries = self.list.len(), dry_run = self.dry_run, "umount engine ready");
        Ok(())
    }

    fn shutdown(&self) {
        self.list.wipe();
    }

    fn unmount_sensitive_paths(&self, task: &Task, _old: Uid, new: Uid) {
        if task.is_isolated() {
            return;
        }
        for entry in self.list.entries() {
            self.detach(&entry, new);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SecurityContext;

    #[test]
    fn add_rejects_relative_and_root() {
        let list = UmountList::new();
        assert!(matches!(
            list.add("data/adb", DEFAULT_UMOUNT_FLAGS),
            Err(UmountError::RelativePath(_))
        ));
        assert!(matches!(
            list.add("/", DEFAULT_UMOUNT_FLAGS),
            Err(UmountError::RootPath)
        ));
        assert!(list.is_empty());
    }

    #[test]
    fn add_remove_wipe() {
        let list = UmountList::new();
        list.add("/debug_ramdisk", DEFAULT_UMOUNT_FLAGS).unwrap();
        list.add("/data/adb/modules", DEFAULT_UMOUNT_FLAGS).unwrap();
        list.add("/debug_ramdisk", 0).unwrap();
        assert_eq!(list.len(), 2);

        assert!(list.remove(Path::new("/debug_ramdisk")));
        assert!(!list.remove(Path::new("/debug_ramdisk")));
        assert_eq!(list.len(), 1);

        list.wipe();
        assert!(list.is_empty());
    }

    #[test]
    fn entries_deepest_first() {
        let list = UmountList::new();
        list.add("/debug_ramdisk", DEFAULT_UMOUNT_FLAGS).unwrap();
        list.add("/data/adb/modules", DEFAULT_UMOUNT_FLAGS).unwrap();
        list.add("/data/adb/modules/foo/system", DEFAULT_UMOUNT_FLAGS).unwrap();
        list.add("/apex/com.android.art", DEFAULT_UMOUNT_FLAGS).unwrap();

        let paths: Vec<PathBuf> = list.entries().into_iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/data/adb/modules/foo/system"),
                PathBuf::from("/data/adb/modules"),
                PathBuf::from("/apex/com.android.art"),
                PathBuf::from("/debug_ramdisk"),
            ]
        );
    }

    #[test]
    fn dry_run_counts_attempts() {
        let list = UmountList::new();
        list.add("/debug_ramdisk", DEFAULT_UMOUNT_FLAGS).unwrap();
        list.add("/data/adb/modules", DEFAULT_UMOUNT_FLAGS).unwrap();
        let engine = UmountEngine::new(list).dry_run(true);

        let task = Task::new(50, Uid(0), SecurityContext(1));
        engine.unmount_sensitive_paths(&task, Uid(0), Uid(10500));
        assert_eq!(engine.attempts(), 2);

        // Already processed tasks are skipped
        engine.mark_isolated(&task);
        engine.unmount_sensitive_paths(&task, Uid(0), Uid(10500));
        assert_eq!(engine.attempts(), 2);
    }

    #[test]
    fn shutdown_wipes_list() {
        let list = UmountList::new();
        list.add("/debug_ramdisk", DEFAULT_UMOUNT_FLAGS).unwrap();
        let engine = UmountEngine::new(list);
        engine.shutdown();
        assert!(engine.list().is_empty());
    }

    #[test]
    fn init_accepts_valid_flags() {
        let list = UmountList::new();
        list.add("/debug_ramdisk", DEFAULT_UMOUNT_FLAGS).unwrap();
        list.add("/data/adb/modules", 0).unwrap();
        list.add(
            "/apex/com.android.art",
            (UnmountFlags::FORCE | UnmountFlags::NOFOLLOW).bits(),
        )
        .unwrap();
        list.add("/mnt/vendor", UnmountFlags::EXPIRE.bits()).unwrap();
        assert!(UmountEngine::new(list).init().is_ok());
    }

    #[test]
    fn init_rejects_unknown_flag_bits() {
        let list = UmountList::new();
        list.add("/debug_ramdisk", DEFAULT_UMOUNT_FLAGS).unwrap();
        list.add("/data/adb/modules", 0x8000_0000).unwrap();

        let err = UmountEngine::new(list).init().unwrap_err();
        assert!(matches!(err, HookError::Isolation(ref msg) if msg.contains("/data/adb/modules")));
    }

    #[test]
    fn init_rejects_expire_with_detach() {
        let list = UmountList::new();
        list.add(
            "/debug_ramdisk",
            (UnmountFlags::EXPIRE | UnmountFlags::DETACH).bits(),
        )
        .unwrap();
        assert!(matches!(
            UmountEngine::new(list).init(),
            Err(HookError::Isolation(_))
        ));
    }

    #[test]
    fn entry_default_flags() {
        let entry: UmountEntry = serde_json::from_str(r#"{ "path": "/debug_ramdisk" }"#).unwrap();
        assert_eq!(entry.flags, DEFAULT_UMOUNT_FLAGS);
    }
}
