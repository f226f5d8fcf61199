//! Scenario replay.
//!
//! A scenario is a JSON document describing the hook configuration, the
//! allowlist, the unmount list and a sequence of transitions. Each
//! transition runs on a fresh task through a real `TransitionHook`, with the
//! unmount engine in dry-run mode so the host's mounts are never touched.
//!
//! ```json
//! {
//!   "config": { "spawner_context": 412, "variant": "extended" },
//!   "manager": 10123,
//!   "allowlist": [ { "uid": 10200, "granted": true } ],
//!   "umount": [ { "path": "/debug_ramdisk" } ],
//!   "transitions": [ { "pid": 4000, "new": 10123 } ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use spawnwatch::isolation::{UmountEngine, UmountEntry, UmountList};
use spawnwatch::{
    AllowlistEntry, ChannelTable, HookConfig, MemoryAllowlist, Outcome, SecurityContext, Task,
    TransitionHook, Uid,
};
use spawnwatch_sys::{FilterCache, TaskSeccomp, SYS_REBOOT};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub config: HookConfig,
    #[serde(default)]
    pub manager: Option<Uid>,
    #[serde(default)]
    pub allowlist: Vec<AllowlistEntry>,
    #[serde(default)]
    pub umount: Vec<UmountEntry>,
    pub transitions: Vec<TransitionSpec>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    #[default]
    Setuid,
    Setresuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionSpec {
    pub pid: u32,
    /// Defaults to the spawner's context.
    #[serde(default)]
    pub context: Option<SecurityContext>,
    /// Defaults to root, the identity a freshly forked child starts with.
    #[serde(default = "root")]
    pub old: Uid,
    pub new: Uid,
    /// Defaults to `new`.
    #[serde(default)]
    pub effective: Option<Uid>,
    #[serde(default)]
    pub entry: EntryPoint,
    /// Whether the task starts under a seccomp filter.
    #[serde(default = "default_filtered")]
    pub filtered: bool,
}

fn root() -> Uid {
    Uid(0)
}

fn default_filtered() -> bool {
    true
}

/// What happened to one replayed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub pid: u32,
    pub old: Uid,
    pub new: Uid,
    pub outcome: Outcome,
    pub channel: bool,
    pub reboot_allowed: bool,
    pub isolated: bool,
    pub tracing: bool,
}

impl Scenario {
    pub fn from_path(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = std::fs::read_to_string(path)?;
        let scenario: Self = serde_json::from_str(&json)?;
        scenario.config.validate()?;
        Ok(scenario)
    }

    pub fn run(&self) -> Result<Vec<Report>, Box<dyn std::error::Error>> {
        let umount = UmountList::new();
        for entry in &self.umount {
            umount.add(entry.path.clone(), entry.flags)?;
        }

        let hook = TransitionHook::init(
            self.config.clone(),
            MemoryAllowlist::from_entries(self.allowlist.iter().copied()),
            ChannelTable::new(),
            UmountEngine::new(umount).dry_run(true),
        )?;
        if let Some(manager) = self.manager {
            hook.manager().bind(manager);
        }

        let reports = self
            .transitions
            .iter()
            .map(|spec| self.replay(&hook, spec))
            .collect();
        hook.shutdown();
        Ok(reports)
    }

    fn replay(
        &self,
        hook: &TransitionHook<MemoryAllowlist, ChannelTable, UmountEngine>,
        spec: &TransitionSpec,
    ) -> Report {
        let context = spec.context.unwrap_or(self.config.spawner_context);
        let mut task = Task::new(spec.pid, spec.old, context);
        if spec.filtered {
            task = task.with_seccomp(TaskSeccomp::filtered(FilterCache::new()));
        }

        let effective = spec.effective.unwrap_or(spec.new);
        let outcome = match spec.entry {
            EntryPoint::Setuid => hook.handle_setuid(&task, spec.new, spec.old, effective),
            EntryPoint::Setresuid => hook.handle_setresuid(&task, spec.new, effective, spec.new),
        };

        tracing::debug!(pid = spec.pid, old = %spec.old, new = %spec.new, ?outcome, "replayed transition");

        let state = task.filter_state();
        Report {
            pid: spec.pid,
            old: spec.old,
            new: spec.new,
            outcome,
            channel: hook.channels().is_installed(spec.pid),
            reboot_allowed: state.seccomp.permits(SYS_REBOOT),
            isolated: task.is_isolated(),
            tracing: state.tracing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCENARIO: &str = r#"{
        "config": { "spawner_context": 412, "variant": "extended" },
        "manager": 10123,
        "allowlist": [
            { "uid": 10200, "granted": true },
            { "uid": 99100, "granted": true }
        ],
        "umount": [ { "path": "/debug_ramdisk" }, { "path": "/data/adb/modules" } ],
        "transitions": [
            { "pid": 1, "new": 10123 },
            { "pid": 2, "new": 1010123, "entry": "setresuid" },
            { "pid": 3, "new": 10200 },
            { "pid": 4, "new": 10500 },
            { "pid": 5, "new": 99100 },
            { "pid": 6, "new": 1000 },
            { "pid": 7, "new": 10500, "context": 9 }
        ]
    }"#;

    fn write_scenario(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn replays_every_transition() {
        let file = write_scenario(SCENARIO);
        let scenario = Scenario::from_path(file.path()).unwrap();
        let reports = scenario.run().unwrap();

        let outcomes: Vec<Outcome> = reports.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                Outcome::ManagerGranted,
                Outcome::ManagerGranted,
                Outcome::TrustedGranted,
                Outcome::Isolated,
                Outcome::Isolated,
                Outcome::NoOp,
                Outcome::Passthrough,
            ]
        );

        assert!(reports[0].channel && reports[0].reboot_allowed);
        assert!(reports[1].channel);
        assert!(!reports[2].channel && reports[2].reboot_allowed && reports[2].tracing);
        assert!(reports[3].isolated && !reports[3].reboot_allowed);
        assert!(reports[4].isolated && !reports[4].reboot_allowed);
        assert!(!reports[6].isolated);
    }

    #[test]
    fn legacy_basic_variant() {
        let file = write_scenario(SCENARIO);
        let mut scenario = Scenario::from_path(file.path()).unwrap();
        scenario.config.variant = spawnwatch::Variant::Basic;
        scenario.config.mechanism = spawnwatch::FilterMechanism::Disable;
        let reports = scenario.run().unwrap();

        assert_eq!(reports[2].outcome, Outcome::TrustedGranted);
        assert!(reports[2].reboot_allowed);
        assert!(!reports[2].tracing);
        // Isolated services are allowlisted like any other app in basic mode.
        assert_eq!(reports[4].outcome, Outcome::TrustedGranted);
        assert_eq!(reports[5].outcome, Outcome::Isolated);
        assert!(!reports[5].isolated);
    }

    #[test]
    fn rejects_relative_umount_path() {
        let file = write_scenario(
            r#"{
                "config": { "spawner_context": 412 },
                "umount": [ { "path": "debug_ramdisk" } ],
                "transitions": []
            }"#,
        );
        let scenario = Scenario::from_path(file.path()).unwrap();
        assert!(scenario.run().is_err());
    }

    #[test]
    fn rejects_unknown_umount_flags() {
        let file = write_scenario(
            r#"{
                "config": { "spawner_context": 412 },
                "umount": [ { "path": "/debug_ramdisk", "flags": 1024 } ],
                "transitions": [ { "pid": 1, "new": 10500 } ]
            }"#,
        );
        let scenario = Scenario::from_path(file.path()).unwrap();
        let err = scenario.run().unwrap_err();
        assert!(err.to_string().contains("/debug_ramdisk"));
    }

    #[test]
    fn rejects_null_spawner() {
        let file = write_scenario(r#"{ "config": { "spawner_context": 0 }, "transitions": [] }"#);
        assert!(Scenario::from_path(file.path()).is_err());
    }
}
