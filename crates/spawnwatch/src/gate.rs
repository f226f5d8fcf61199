//! Identity gate: only the trusted spawner's children are inspected.

use crate::identity::SecurityContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityGate {
    spawner: SecurityContext,
}

impl IdentityGate {
    pub const fn new(spawner: SecurityContext) -> Self {
        Self { spawner }
    }

    /// Whether a task running in `current` came from the trusted spawner.
    #[inline]
    pub fn admit(&self, current: SecurityContext) -> bool {
        current == self.spawner
    }

    pub fn spawner(&self) -> SecurityContext {
        self.spawner
    }
}
