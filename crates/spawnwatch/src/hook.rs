//! Hook lifecycle and entry points.
//!
//! `TransitionHook` owns the manager binding and the collaborators, and
//! exposes the two entry points the host calls at its identity-change sites:
//!
//! - [`TransitionHook::handle_setuid`] - `(new, old, effective)`
//! - [`TransitionHook::handle_setresuid`] - `(real, effective, saved)`
//!
//! Both return an [`Outcome`] for observability. The host must ignore it:
//! the transition always proceeds.

use crate::allowlist::Allowlist;
use crate::config::HookConfig;
use crate::coordinator::{Coordinator, Outcome};
use crate::error::Result;
use crate::grant::ChannelInstaller;
use crate::identity::{IdentityTransition, Uid};
use crate::isolation::IsolationEngine;
use crate::manager::ManagerBinding;
use crate::task::Task;

#[derive(Debug)]
pub struct TransitionHook<A, C, E> {
    config: HookConfig,
    binding: ManagerBinding,
    allowlist: A,
    channels: C,
    engine: E,
}

impl<A, C, E> TransitionHook<A, C, E>
where
    A: Allowlist,
    C: ChannelInstaller,
    E: IsolationEngine,
{
    /// Validate the config and start the isolation engine.
    pub fn init(config: HookConfig, allowlist: A, channels: C, engine: E) -> Result<Self> {
        config.validate()?;
        engine.init()?;
        tracing::info!(
            spawner = %config.spawner_context,
            variant = ?config.variant,
            mechanism = ?config.mechanism,
            "setuid hook init"
        );
        Ok(Self {
            config,
            binding: ManagerBinding::new(),
            allowlist,
            channels,
            engine,
        })
    }

    /// Stop the isolation engine and forget the manager.
    pub fn shutdown(self) {
        tracing::info!("setuid hook exit");
        self.binding.clear();
        self.engine.shutdown();
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// The manager binding (register the manager with `bind`).
    pub fn manager(&self) -> &ManagerBinding {
        &self.binding
    }

    pub fn allowlist(&self) -> &A {
        &self.allowlist
    }

    pub fn channels(&self) -> &C {
        &self.channels
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn handle_transition(&self, task: &Task, transition: IdentityTransition) -> Outcome {
        Coordinator::new(
            &self.config,
            &self.binding,
            &self.allowlist,
            &self.channels,
            &self.engine,
        )
        .run(task, transition)
    }

    /// Single-identity entry point: `task` changes from `old` to `new`.
    pub fn handle_setuid(&self, task: &Task, new: Uid, old: Uid, effective: Uid) -> Outcome {
        self.handle_transition(task, IdentityTransition::new(old, new, effective))
    }

    /// Three-identity entry point.
    ///
    /// The spawner always passes matching real and saved ids in one call, so
    /// the real id is forwarded as the new identity and the task's current
    /// uid as the old one. A mismatch is logged, not rejected.
    pub fn handle_setresuid(&self, task: &Task, real: Uid, effective: Uid, saved: Uid) -> Outcome {
        if self.config.manual_setresuid {
            return Outcome::Passthrough;
        }
        if real != saved && saved.is_valid() {
            tracing::warn!(pid = task.pid(), real = %real, saved = %saved, "setresuid with mismatched real/saved ids");
        }
        self.handle_setuid(task, real, task.uid(), effective)
    }
}
