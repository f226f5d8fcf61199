//! Host primitives for spawnwatch.
//!
//! This crate holds the pieces of the identity-transition hook that model or
//! query the host kernel directly. Everything above it (gating, trust
//! decisions, isolation) lives in the `spawnwatch` crate.
//!
//! ## Modules
//!
//! - **check** - Kernel version detection, used to select the filter mechanism
//! - **seccomp** - Per-task seccomp state and its syscall action cache
//!
//! ## Filter Mechanisms
//!
//! Kernels from 5.10 on keep a per-filter action cache. Granting a trusted
//! task one extra syscall is a single bit flip in that cache. Older kernels
//! have no cache, so the only way to express the same grant is to drop the
//! task's filter entirely.
//!
//! | Kernel | Mechanism |
//! |--------|-----------|
//! | >= 5.10 | `FilterCache::allow` |
//! | < 5.10 | `TaskSeccomp::disable` |

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod check;
pub mod seccomp;

pub use check::{host_kernel_version, CheckError, KernelVersion, FILTER_CACHE_MIN_KERNEL};
pub use seccomp::{FilterCache, SeccompMode, TaskSeccomp, SYS_REBOOT};
