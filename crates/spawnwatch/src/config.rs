//! Hook configuration.
//!
//! A `HookConfig` is resolved once when the hook starts and never changes
//! afterwards. It selects the coordinator strategy and the mechanism used to
//! let a trusted task past its syscall filter.
//!
//! ## Example
//!
//! ```ignore
//! use spawnwatch::{HookConfig, SecurityContext, Variant};
//!
//! let config = HookConfig::detect(SecurityContext(412))?
//!     .variant(Variant::Extended);
//! ```
//!
//! ## Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `variant` | `basic` |
//! | `mechanism` | `cache` (or detected from the kernel via `detect`) |
//! | `manual_setresuid` | false |

use serde::{Deserialize, Serialize};
use spawnwatch_sys::{host_kernel_version, KernelVersion};

use crate::error::{HookError, Result};
use crate::identity::SecurityContext;

/// Coordinator strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Manager, then allowlist, then unconditional unmount.
    #[default]
    Basic,
    /// Isolated services are always hidden; ordinary apps are hidden only
    /// when eligible, followed by mount reordering and hidden-path passes.
    /// Trusted tasks carry a tracing flag.
    Extended,
}

/// How a trusted task is let past its syscall filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMechanism {
    /// Allow-list the granted syscall in the filter's action cache.
    #[default]
    Cache,
    /// Drop the task's filter entirely. For kernels without an action cache.
    Disable,
}

impl FilterMechanism {
    /// Pick the mechanism a kernel supports.
    pub fn for_kernel(version: KernelVersion) -> Self {
        if version.has_filter_cache() {
            Self::Cache
        } else {
            Self::Disable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    /// Security context of the trusted spawner.
    pub spawner_context: SecurityContext,
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub mechanism: FilterMechanism,
    /// The host calls the single-identity hook itself, so the three-identity
    /// entry point must do nothing.
    #[serde(default)]
    pub manual_setresuid: bool,
}

impl HookConfig {
    pub fn new(spawner_context: SecurityContext) -> Self {
        Self {
            spawner_context,
            variant: Variant::default(),
            mechanism: FilterMechanism::default(),
            manual_setresuid: false,
        }
    }

    /// Build a config whose filter mechanism matches the running kernel.
    pub fn detect(spawner_context: SecurityContext) -> Result<Self> {
        let version = host_kernel_version()?;
        Ok(Self::new(spawner_context).mechanism(FilterMechanism::for_kernel(version)))
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn mechanism(mut self, mechanism: FilterMechanism) -> Self {
        self.mechanism = mechanism;
        self
    }

    pub fn manual_setresuid(mut self, manual: bool) -> Self {
        self.manual_setresuid = manual;
        self
    }

    pub fn validate(&self) -> Result<()> {
        // sid 0 is SECSID_NULL: it would admit tasks whose context was never resolved.
        if self.spawner_context.0 == 0 {
            return Err(HookError::InvalidConfig(
                "spawner_context must not be the null sid".into(),
            ));
        }
        Ok(())
    }
}
