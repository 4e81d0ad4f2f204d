//! Platform support for POSIX shared-memory segments
//!
//! The shared-memory persistence strategy needs named segments that another
//! process can open by name. POSIX `shm_open`/`shm_unlink` provide that on
//! unix; other platforms report the capability as unavailable and the
//! dispatcher falls back to the file-backed strategy.

#[cfg(unix)]
mod posix;

#[cfg(unix)]
pub use posix::{create_segment, current_pid, open_segment, unlink_segment};

use std::sync::OnceLock;

static SHM_SUPPORTED: OnceLock<bool> = OnceLock::new();

/// Whether shared-memory segments are usable at runtime
///
/// The answer is resolved once per process by actually creating and
/// unlinking a probe segment, so strategy selection fails fast rather than
/// partway through serialization.
pub fn shm_supported() -> bool {
    *SHM_SUPPORTED.get_or_init(|| {
        #[cfg(unix)]
        {
            posix::probe()
        }
        #[cfg(not(unix))]
        {
            false
        }
    })
}

/// Stub implementations for platforms without POSIX shared memory
#[cfg(not(unix))]
mod stubs {
    use crate::error::{ShareError, ShareResult};
    use memmap2::{Mmap, MmapMut};

    /// Always fails: segments are unsupported on this platform
    pub fn create_segment(_name: &str, _len: usize) -> ShareResult<MmapMut> {
        Err(ShareError::ShmUnavailable)
    }

    /// Always fails: segments are unsupported on this platform
    pub fn open_segment(name: &str, _expected_len: usize) -> ShareResult<Mmap> {
        Err(ShareError::SegmentNotFound {
            name: name.to_string(),
        })
    }

    /// No-op: nothing to unlink on this platform
    pub fn unlink_segment(_name: &str) -> ShareResult<()> {
        Ok(())
    }

    /// Get current process ID
    pub fn current_pid() -> u32 {
        std::process::id()
    }
}

#[cfg(not(unix))]
pub use stubs::{create_segment, current_pid, open_segment, unlink_segment};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_shm_supported_on_unix() {
        assert!(shm_supported());
    }

    #[test]
    fn test_probe_is_cached() {
        // Two calls must agree (single OnceLock resolution)
        assert_eq!(shm_supported(), shm_supported());
    }
}
