//! Host kernel version detection.
//!
//! The running kernel's release string is read once with `uname` and cached
//! in a static `OnceLock`. The parsed version decides whether the seccomp
//! action cache can be used (see [`FILTER_CACHE_MIN_KERNEL`]).
//!
//! ## Usage
//!
//! ```ignore
//! match check::host_kernel_version() {
//!     Ok(v) if v.has_filter_cache() => println!("{v}: cache"),
//!     Ok(v) => println!("{v}: legacy disable"),
//!     Err(e) => eprintln!("cannot read kernel version: {e}"),
//! }
//! ```

use std::fmt;
use std::sync::OnceLock;

use rustix::system::uname;
use thiserror::Error;

/// A `major.minor.patch` kernel version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KernelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// First kernel release with the per-filter seccomp action cache.
pub const FILTER_CACHE_MIN_KERNEL: KernelVersion = KernelVersion::new(5, 10, 0);

impl KernelVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether this kernel can allow-list a single syscall in the filter cache.
    #[inline]
    pub fn has_filter_cache(self) -> bool {
        self >= FILTER_CACHE_MIN_KERNEL
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Errors that can occur while reading the host kernel version.
#[derive(Debug, Clone, Error)]
pub enum CheckError {
    #[error("kernel release is not valid UTF-8")]
    ReleaseNotUtf8,

    #[error("cannot parse kernel release {0:?}")]
    UnparsableRelease(String),
}

static HOST_VERSION: OnceLock<Result<KernelVersion, CheckError>> = OnceLock::new();

/// Read the running kernel's version and cache the result.
pub fn host_kernel_version() -> Result<KernelVersion, CheckError> {
    HOST_VERSION.get_or_init(read_host_version).clone()
}

fn read_host_version() -> Result<KernelVersion, CheckError> {
    let uts = uname();
    let release = uts
        .release()
        .to_str()
        .map_err(|_| CheckError::ReleaseNotUtf8)?;
    parse_kernel_version(release)
}

/// Parse a release string such as `5.10.198-android13-4-g1c2d3e4`.
pub fn parse_kernel_version(release: &str) -> Result<KernelVersion, CheckError> {
    let unparsable = || CheckError::UnparsableRelease(release.to_string());

    let mut parts = release.splitn(3, '.');
    let major = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .ok_or_else(unparsable)?;
    let minor = parts
        .next()
        .map(leading_digits)
        .and_then(|p| p.parse::<u32>().ok())
        .ok_or_else(unparsable)?;

    // Vendor kernels append anything after the patch level ("190+", "0-generic").
    let patch = parts
        .next()
        .map(leading_digits)
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(0);

    Ok(KernelVersion::new(major, minor, patch))
}

fn leading_digits(s: &str) -> &str {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    &s[..end]
}
