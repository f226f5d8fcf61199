//! Per-task seccomp state and the syscall action cache.
//!
//! A task carries a seccomp mode and, in filter mode, an attached BPF filter.
//! Kernels from 5.10 on keep an action cache next to each filter: a bitmap of
//! syscall numbers the filter is known to allow unconditionally. Setting a bit
//! in that bitmap lets the syscall through without running the BPF program.
//!
//! ## Structure
//!
//! ```text
//! TaskSeccomp
//!   ├── mode:   Disabled | Strict | Filter
//!   └── filter: Option<FilterCache>
//!                 └── allow: [u64; 8]   (bit N = syscall N allowed)
//! ```
//!
//! ## Mutation Contract
//!
//! Both [`FilterCache::allow`] and [`TaskSeccomp::disable`] must only be
//! called while holding the owning task's filter lock. Neither allocates, so
//! they are safe inside a critical section that must not block.

/// The one syscall a trusted task is granted on top of its filter.
///
/// The manager uses `reboot` with a magic argument pair to obtain its
/// communication channel, so it has to get past the app seccomp policy.
pub const SYS_REBOOT: u32 = libc::SYS_reboot as u32;

/// Highest syscall number (exclusive) tracked by the cache.
pub const CACHE_SYSCALLS: u32 = 512;

const WORDS: usize = (CACHE_SYSCALLS / 64) as usize;

/// Seccomp mode of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeccompMode {
    /// No seccomp. Every syscall is permitted.
    #[default]
    Disabled,
    /// `SECCOMP_MODE_STRICT`: read/write/exit/sigreturn only. No cache.
    Strict,
    /// `SECCOMP_MODE_FILTER`: BPF filter with an action cache.
    Filter,
}

/// Allow bitmap attached to a seccomp filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterCache {
    allow: [u64; WORDS],
}

impl FilterCache {
    pub const fn new() -> Self {
        Self { allow: [0; WORDS] }
    }

    /// Build a cache that already allows the given syscalls.
    pub fn with_allowed(syscalls: &[u32]) -> Self {
        let mut cache = Self::new();
        for &nr in syscalls {
            cache.allow(nr);
        }
        cache
    }

    /// Mark `nr` as always allowed. Returns `false` if `nr` is outside the
    /// range the cache tracks, in which case nothing changes.
    #[inline]
    pub fn allow(&mut self, nr: u32) -> bool {
        if nr >= CACHE_SYSCALLS {
            return false;
        }
        self.allow[(nr / 64) as usize] |= 1u64 << (nr % 64);
        true
    }

    #[inline]
    pub fn is_allowed(&self, nr: u32) -> bool {
        nr < CACHE_SYSCALLS && self.allow[(nr / 64) as usize] & (1u64 << (nr % 64)) != 0
    }

    /// Number of syscalls currently marked as allowed.
    pub fn allowed_count(&self) -> u32 {
        self.allow.iter().map(|w| w.count_ones()).sum()
    }
}

/// Seccomp state of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskSeccomp {
    pub mode: SeccompMode,
    pub filter: Option<FilterCache>,
}

impl TaskSeccomp {
    /// A task without seccomp.
    pub const fn none() -> Self {
        Self {
            mode: SeccompMode::Disabled,
            filter: None,
        }
    }

    /// A task running under a BPF filter with the given cache.
    pub const fn filtered(cache: FilterCache) -> Self {
        Self {
            mode: SeccompMode::Filter,
            filter: Some(cache),
        }
    }

    /// A task in strict mode.
    pub const fn strict() -> Self {
        Self {
            mode: SeccompMode::Strict,
            filter: None,
        }
    }

    /// Whether the task is in filter mode with a filter attached.
    #[inline]
    pub fn has_active_filter(&self) -> bool {
        self.mode == SeccompMode::Filter && self.filter.is_some()
    }

    /// Allow-list `nr` in the attached filter's cache.
    ///
    /// Returns `false` when there is no filter to update.
    #[inline]
    pub fn allow_cached(&mut self, nr: u32) -> bool {
        match self.filter.as_mut() {
            Some(cache) => cache.allow(nr),
            None => false,
        }
    }

    /// Drop seccomp for this task entirely (legacy kernels without a cache).
    #[inline]
    pub fn disable(&mut self) {
        self.mode = SeccompMode::Disabled;
        self.filter = None;
    }

    /// Whether `nr` would currently be permitted for this task.
    pub fn permits(&self, nr: u32) -> bool {
        match self.mode {
            SeccompMode::Disabled => true,
            SeccompMode::Strict => false,
            SeccompMode::Filter => self.filter.is_some_and(|c| c.is_allowed(nr)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reboot_is_tracked_by_cache() {
        assert!(SYS_REBOOT < CACHE_SYSCALLS);
    }

    #[test]
    fn allow_sets_single_bit() {
        let mut cache = FilterCache::new();
        assert!(!cache.is_allowed(SYS_REBOOT));
        assert!(cache.allow(SYS_REBOOT));
        assert!(cache.is_allowed(SYS_REBOOT));
        assert_eq!(cache.allowed_count(), 1);

        // Allowing twice changes nothing
        assert!(cache.allow(SYS_REBOOT));
        assert_eq!(cache.allowed_count(), 1);
    }

    #[test]
    fn allow_out_of_range_is_ignored() {
        let mut cache = FilterCache::new();
        assert!(!cache.allow(CACHE_SYSCALLS));
        assert!(!cache.allow(u32::MAX));
        assert_eq!(cache.allowed_count(), 0);
        assert!(!cache.is_allowed(u32::MAX));
    }

    #[test]
    fn word_boundaries() {
        let cache = FilterCache::with_allowed(&[0, 63, 64, 511]);
        assert!(cache.is_allowed(0));
        assert!(cache.is_allowed(63));
        assert!(cache.is_allowed(64));
        assert!(cache.is_allowed(511));
        assert!(!cache.is_allowed(65));
        assert_eq!(cache.allowed_count(), 4);
    }

    #[test]
    fn allow_cached_without_filter() {
        let mut task = TaskSeccomp::none();
        assert!(!task.allow_cached(SYS_REBOOT));
        assert!(!task.has_active_filter());
        assert!(task.permits(SYS_REBOOT));

        let mut strict = TaskSeccomp::strict();
        assert!(!strict.allow_cached(SYS_REBOOT));
        assert!(!strict.permits(SYS_REBOOT));
    }

    #[test]
    fn allow_cached_with_filter() {
        let mut task = TaskSeccomp::filtered(FilterCache::new());
        assert!(task.has_active_filter());
        assert!(!task.permits(SYS_REBOOT));
        assert!(task.allow_cached(SYS_REBOOT));
        assert!(task.permits(SYS_REBOOT));
    }

    #[test]
    fn disable_drops_filter() {
        let mut task = TaskSeccomp::filtered(FilterCache::with_allowed(&[0, 1]));
        task.disable();
        assert_eq!(task.mode, SeccompMode::Disabled);
        assert!(task.filter.is_none());
        assert!(task.permits(SYS_REBOOT));
    }
}
