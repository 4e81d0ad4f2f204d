//! POSIX shared-memory segment operations

use crate::error::{ShareError, ShareResult};
use memmap2::{Mmap, MmapMut, MmapOptions};
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::getpid;
use std::fs::File;

/// Create a new named segment of exactly `len` bytes and map it for writing
///
/// Creation is exclusive: an existing segment with the same name is an error,
/// so a crashed peer's leftovers never get silently reused.
pub fn create_segment(name: &str, len: usize) -> ShareResult<MmapMut> {
    let fd = shm_open(
        name,
        OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
        Mode::S_IRUSR | Mode::S_IWUSR, // Owner read/write only
    )?;
    let file = File::from(fd);
    file.set_len(len as u64)?;
    let map = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(map)
}

/// Open an existing named segment read-only and map it
///
/// The mapping must cover at least `expected_len` bytes, the length recorded
/// in the segment's descriptor.
pub fn open_segment(name: &str, expected_len: usize) -> ShareResult<Mmap> {
    let fd = shm_open(name, OFlag::O_RDONLY, Mode::empty()).map_err(|errno| {
        if errno == nix::errno::Errno::ENOENT {
            ShareError::SegmentNotFound {
                name: name.to_string(),
            }
        } else {
            ShareError::Nix { source: errno }
        }
    })?;
    let file = File::from(fd);
    let map = unsafe { MmapOptions::new().map(&file)? };
    if map.len() < expected_len {
        return Err(ShareError::SegmentTruncated {
            name: name.to_string(),
            expected: expected_len,
            actual: map.len(),
        });
    }
    Ok(map)
}

/// Remove a named segment from the system
pub fn unlink_segment(name: &str) -> ShareResult<()> {
    shm_unlink(name)?;
    Ok(())
}

/// Get current process ID
pub fn current_pid() -> u32 {
    getpid().as_raw() as u32
}

/// Check that segments can actually be created on this system
pub(crate) fn probe() -> bool {
    let name = format!("/mshare-probe-{}", current_pid());
    // Clear any leftover from a crashed run with the same pid
    let _ = unlink_segment(&name);
    match create_segment(&name, 16) {
        Ok(_) => {
            if let Err(e) = unlink_segment(&name) {
                tracing::warn!("failed to unlink probe segment {name}: {e}");
            }
            true
        }
        Err(e) => {
            tracing::debug!("shared memory probe failed: {e}");
            false
        }
    }
}
