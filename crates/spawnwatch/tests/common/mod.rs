//! Shared collaborators for transition tests.
//!
//! `RecordingEngine` logs every isolation call in order; `CountingAllowlist`
//! counts how often the store is consulted, so tests can assert that some
//! paths never reach it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use spawnwatch::{
    Allowlist, ChannelTable, FilterMechanism, HookConfig, IsolationEngine, MemoryAllowlist,
    SecurityContext, Task, TransitionHook, Uid, Variant,
};
use spawnwatch_sys::{FilterCache, TaskSeccomp};

/// Context of the trusted spawner.
pub const SPAWNER: SecurityContext = SecurityContext(412);

/// Context of anything else (e.g. a shell).
pub const STRANGER: SecurityContext = SecurityContext(77);

/// Manager uid in the primary profile.
pub const MANAGER: Uid = Uid(10123);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Init,
    Shutdown,
    Unmount { pid: u32, old: Uid, new: Uid },
    Reorder,
    Reconcile(Uid),
    MarkIsolated(u32),
}

pub type CallLog = Arc<Mutex<Vec<EngineCall>>>;

#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: CallLog,
}

impl RecordingEngine {
    pub fn new() -> (Self, CallLog) {
        let calls = CallLog::default();
        (
            Self {
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl IsolationEngine for RecordingEngine {
    fn init(&self) -> spawnwatch::Result<()> {
        self.record(EngineCall::Init);
        Ok(())
    }

    fn shutdown(&self) {
        self.record(EngineCall::Shutdown);
    }

    fn unmount_sensitive_paths(&self, task: &Task, old: Uid, new: Uid) {
        self.record(EngineCall::Unmount {
            pid: task.pid(),
            old,
            new,
        });
    }

    fn reorder_mount_table(&self) {
        self.record(EngineCall::Reorder);
    }

    fn reconcile_hidden_paths(&self, uid: Uid) {
        self.record(EngineCall::Reconcile(uid));
    }

    fn mark_isolated(&self, task: &Task) {
        self.record(EngineCall::MarkIsolated(task.pid()));
        task.mark_isolated();
    }
}

#[derive(Debug, Default)]
pub struct CountingAllowlist {
    pub inner: MemoryAllowlist,
    lookups: AtomicUsize,
}

impl CountingAllowlist {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Allowlist for CountingAllowlist {
    fn lookup(&self, caller: &Task, uid: Uid) -> bool {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(caller, uid)
    }

    fn should_isolate(&self, uid: Uid) -> bool {
        self.inner.should_isolate(uid)
    }
}

pub type TestHook = TransitionHook<CountingAllowlist, ChannelTable, RecordingEngine>;

/// A started hook with `MANAGER` bound. Returns the engine's call log with
/// the `Init` entry already drained.
pub fn hook(variant: Variant, mechanism: FilterMechanism) -> (TestHook, CallLog) {
    let config = HookConfig::new(SPAWNER)
        .variant(variant)
        .mechanism(mechanism);
    let (engine, calls) = RecordingEngine::new();
    let hook = TransitionHook::init(
        config,
        CountingAllowlist::default(),
        ChannelTable::new(),
        engine,
    )
    .expect("hook should init");
    hook.manager().bind(MANAGER);
    calls.lock().unwrap().clear();
    (hook, calls)
}

pub fn basic() -> (TestHook, CallLog) {
    hook(Variant::Basic, FilterMechanism::Cache)
}

pub fn extended() -> (TestHook, CallLog) {
    hook(Variant::Extended, FilterMechanism::Cache)
}

/// A freshly forked spawner child: still root, under the app seccomp filter.
pub fn spawned(pid: u32) -> Task {
    Task::new(pid, Uid(0), SPAWNER).with_seccomp(TaskSeccomp::filtered(FilterCache::new()))
}

pub fn calls(log: &CallLog) -> Vec<EngineCall> {
    log.lock().unwrap().clone()
}
