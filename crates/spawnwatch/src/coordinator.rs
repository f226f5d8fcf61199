//! Transition coordinator.
//!
//! Sequences one identity transition through the gate, the manager binding,
//! the trust policy and finally the grant or isolation side effects.
//!
//! ## States
//!
//! ```text
//! Start ──gate fails──────────────────────────────▶ Passthrough
//!   │
//!   ▼ gate passes (rebind if the manager's family)
//! Classified ──▶ ManagerGranted   channel + syscall
//!            ──▶ TrustedGranted   syscall (+ tracing flag, extended)
//!            ──▶ Isolated         unmount (+ reorder, reconcile, mark, extended)
//!            ──▶ NoOp             extended only
//! ```
//!
//! ## Classification
//!
//! | Step | Basic | Extended |
//! |------|-------|----------|
//! | 1 | manager? | isolated service? → Isolated |
//! | 2 | allowlisted? | manager? |
//! | 3 | → Isolated | allowlisted? |
//! | 4 | | normal app and eligible? → Isolated, else NoOp |
//!
//! Every path ends in an [`Outcome`]. Nothing here can fail or delay the
//! underlying transition.

use serde::{Deserialize, Serialize};

use crate::allowlist::{Allowlist, PolicyEvaluator};
use crate::config::{HookConfig, Variant};
use crate::gate::IdentityGate;
use crate::grant::{CapabilityDispatcher, ChannelInstaller, Grant};
use crate::identity::{IdentityTransition, Uid};
use crate::isolation::{IsolationEngine, IsolationTrigger};
use crate::manager::{BindingView, ManagerBinding};
use crate::task::Task;

/// Terminal state of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Not the spawner's child (or the entry point is disabled). Nothing touched.
    Passthrough,
    ManagerGranted,
    TrustedGranted,
    Isolated,
    NoOp,
}

#[derive(Debug)]
pub struct Coordinator<'a, A: ?Sized, C: ?Sized, E: ?Sized> {
    gate: IdentityGate,
    variant: Variant,
    binding: &'a ManagerBinding,
    policy: PolicyEvaluator<'a, A>,
    dispatcher: CapabilityDispatcher<'a, C>,
    isolation: IsolationTrigger<'a, E>,
}

impl<'a, A, C, E> Coordinator<'a, A, C, E>
where
    A: Allowlist + ?Sized,
    C: ChannelInstaller + ?Sized,
    E: IsolationEngine + ?Sized,
{
    pub fn new(
        config: &HookConfig,
        binding: &'a ManagerBinding,
        allowlist: &'a A,
        channels: &'a C,
        engine: &'a E,
    ) -> Self {
        Self {
            gate: IdentityGate::new(config.spawner_context),
            variant: config.variant,
            binding,
            policy: PolicyEvaluator::new(binding, allowlist),
            dispatcher: CapabilityDispatcher::new(channels, config.mechanism, config.variant),
            isolation: IsolationTrigger::new(engine, config.variant),
        }
    }

    pub fn run(&self, task: &Task, transition: IdentityTransition) -> Outcome {
        if !self.gate.admit(task.context()) {
            return Outcome::Passthrough;
        }

        match self.variant {
            Variant::Basic if transition.changes_identity() => {
                tracing::debug!(pid = task.pid(), old = %transition.old, new = %transition.new, "identity change");
            }
            Variant::Extended => {
                tracing::debug!(target: "spawnwatch::sulog", pid = task.pid(), uid = %transition.new, "setuid");
            }
            Variant::Basic => {}
        }

        let view = self.binding.observe(transition.new);
        if view.rebound {
            tracing::debug!(uid = %transition.new, "manager rebound to secondary profile");
        }

        let outcome = match self.variant {
            Variant::Basic => self.classify_basic(task, transition.new, view),
            Variant::Extended => self.classify_extended(task, transition.new, view),
        };
        self.apply(task, transition, outcome);
        outcome
    }

    fn classify_basic(&self, task: &Task, new: Uid, view: BindingView) -> Outcome {
        if view.is_manager(new) {
            Outcome::ManagerGranted
        } else if self.policy.is_trusted(task, new) {
            Outcome::TrustedGranted
        } else {
            Outcome::Isolated
        }
    }

    fn classify_extended(&self, task: &Task, new: Uid, view: BindingView) -> Outcome {
        // Isolated services never see privileged mounts, allowlisted or not.
        if new.is_isolated_service() {
            return Outcome::Isolated;
        }
        if view.is_manager(new) {
            return Outcome::ManagerGranted;
        }
        if self.policy.is_trusted(task, new) {
            return Outcome::TrustedGranted;
        }
        if new.is_normal_app() && self.policy.should_isolate(new) {
            Outcome::Isolated
        } else {
            Outcome::NoOp
        }
    }

    fn apply(&self, task: &Task, transition: IdentityTransition, outcome: Outcome) {
        match outcome {
            Outcome::ManagerGranted => {
                tracing::info!(pid = task.pid(), uid = %transition.new, "install channel for manager");
                self.dispatcher.grant(task, Grant::Manager(transition.new));
            }
            Outcome::TrustedGranted => {
                tracing::debug!(pid = task.pid(), uid = %transition.new, "trusted identity");
                self.dispatcher.grant(task, Grant::Trusted);
            }
            Outcome::Isolated => {
                self.dispatcher.deny(task);
                self.isolation.isolate(task, transition.old, transition.new);
            }
            Outcome::NoOp => self.dispatcher.deny(task),
            Outcome::Passthrough => {}
        }
    }
}
