//! Process identities and the transition record.
//!
//! Identities are Android-style uids: the per-user profile is encoded in the
//! high part (`uid / PER_USER_RANGE`) and the app id in the low part
//! (`uid % PER_USER_RANGE`). The same app installed for a secondary user
//! therefore has a different uid but the same app id.
//!
//! ```text
//!   uid 1010123  =  user 10  *  100000  +  app id 10123
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Size of one per-user identity slot.
pub const PER_USER_RANGE: u32 = 100_000;

/// App ids reserved for isolated services (`android:isolatedProcess`).
const ISOLATED_SERVICE_START: u32 = 99_000;
const ISOLATED_SERVICE_END: u32 = 100_000;

/// App ids handed out to ordinary installed applications.
const NORMAL_APP_START: u32 = 10_000;
const NORMAL_APP_END: u32 = 19_999;

/// A process user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub u32);

impl Uid {
    /// Sentinel for "no identity" (`(uid_t)-1`).
    pub const INVALID: Uid = Uid(u32::MAX);

    #[inline]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    /// Identity relative to its per-user slot.
    #[inline]
    pub const fn app_id(self) -> u32 {
        self.0 % PER_USER_RANGE
    }

    /// Per-user profile this identity belongs to.
    #[inline]
    pub const fn user_id(self) -> u32 {
        self.0 / PER_USER_RANGE
    }

    #[inline]
    pub const fn is_isolated_service(self) -> bool {
        let id = self.app_id();
        id >= ISOLATED_SERVICE_START && id < ISOLATED_SERVICE_END
    }

    #[inline]
    pub const fn is_normal_app(self) -> bool {
        let id = self.app_id();
        id >= NORMAL_APP_START && id < NORMAL_APP_END
    }
}

impl From<u32> for Uid {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("-1")
        }
    }
}

/// Security context id (SELinux sid) of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityContext(pub u32);

impl fmt::Display for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sid:{}", self.0)
    }
}

/// One privilege change of a task.
///
/// Built by the caller at the transition point and consumed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityTransition {
    pub old: Uid,
    pub new: Uid,
    pub effective: Uid,
}

impl IdentityTransition {
    pub const fn new(old: Uid, new: Uid, effective: Uid) -> Self {
        Self { old, new, effective }
    }

    /// Whether the real identity actually changes.
    #[inline]
    pub fn changes_identity(&self) -> bool {
        self.old != self.new
    }
}
