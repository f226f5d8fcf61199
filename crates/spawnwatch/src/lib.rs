//! spawnwatch: identity-transition interception for spawned processes
//!
//! A trusted launcher (a zygote) forks each application instance and then
//! switches it to the app's identity. This crate hooks that switch and, before
//! it completes, decides what the new process is:
//!
//! - **Manager** - the management agent: gets a communication channel and
//!   the `reboot` syscall past its seccomp filter
//! - **Trusted** - allowlisted: gets the `reboot` syscall past its filter
//! - **Ordinary** - gets sensitive mounts hidden from it
//!
//! The hook never blocks or rejects the transition. It only reacts to it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use spawnwatch::{ChannelTable, HookConfig, MemoryAllowlist, SecurityContext, Task, TransitionHook, Uid};
//! use spawnwatch::isolation::{UmountEngine, UmountList};
//!
//! let config = HookConfig::detect(SecurityContext(412))?;
//! let hook = TransitionHook::init(config, MemoryAllowlist::new(), ChannelTable::new(), UmountEngine::new(UmountList::new()))?;
//! hook.manager().bind(Uid(10123));
//!
//! let task = Task::new(4242, Uid(0), SecurityContext(412));
//! let outcome = hook.handle_setresuid(&task, Uid(10123), Uid(10123), Uid(10123));
//! ```
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | `gate` | Only the spawner's children are inspected |
//! | `manager` | The one identity recognized as the manager |
//! | `allowlist` | Trust policy over the host's allowlist |
//! | `grant` | Channel and syscall grants |
//! | `isolation` | Mount hiding for ordinary identities |
//! | `coordinator` | Per-transition state machine |
//! | `hook` | Lifecycle and entry points |

#![allow(clippy::module_name_repetitions)]

pub mod allowlist;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gate;
pub mod grant;
pub mod hook;
pub mod identity;
pub mod isolation;
pub mod manager;
pub mod task;

pub use allowlist::{Allowlist, AllowlistEntry, MemoryAllowlist, PolicyEvaluator};
pub use config::{FilterMechanism, HookConfig, Variant};
pub use coordinator::{Coordinator, Outcome};
pub use error::{HookError, Result};
pub use gate::IdentityGate;
pub use grant::{CapabilityDispatcher, ChannelInstaller, ChannelTable, Grant};
pub use hook::TransitionHook;
pub use identity::{IdentityTransition, SecurityContext, Uid, PER_USER_RANGE};
pub use isolation::{IsolationEngine, IsolationTrigger};
pub use manager::{BindingView, ManagerBinding};
pub use task::{FilterGuard, FilterState, Task};
