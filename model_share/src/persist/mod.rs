//! Persistence dispatcher and persisted-model handles
//!
//! [`persist`] picks a strategy and returns a [`PersistedModel`] handle that
//! can be serialized and sent to a worker process. Strategy selection, in
//! order:
//!
//! 1. `MODEL_SHARE_TEMP_DIR` set — file-backed strategy rooted there
//! 2. shared-memory segments usable — shared-memory strategy
//! 3. otherwise — file-backed strategy in the system temp directory

pub mod file;
pub mod shm;

use crate::error::{ShareError, ShareResult};
use crate::model::Shareable;
use crate::platform;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use file::FilePersisted;
pub use shm::{BufferSpec, ShmPersisted};

/// Environment variable overriding the persistence temp directory
///
/// When set, the dispatcher always uses the file-backed strategy and anchors
/// its artifacts in this directory.
pub const TEMP_DIR_ENV: &str = "MODEL_SHARE_TEMP_DIR";

/// A persisted model handle, transmissible to worker processes
///
/// The strategy set is closed, so dispatch is an enum rather than trait
/// objects. A deserialized copy is always non-owning: it can materialize the
/// model but never releases the backing resources.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub enum PersistedModel<M: Shareable> {
    /// Backed by a memory-mappable temp artifact
    File(FilePersisted<M>),
    /// Backed by POSIX shared-memory segments
    Shm(ShmPersisted<M>),
}

impl<M: Shareable> PersistedModel<M> {
    /// Materialize the model, reconstructing it on first call and caching it
    pub fn get(&mut self) -> ShareResult<&M> {
        match self {
            PersistedModel::File(handle) => handle.get(),
            PersistedModel::Shm(handle) => handle.get(),
        }
    }

    /// Release backing resources; idempotent, teardown failures are logged
    pub fn close(&mut self, unlink: bool) {
        match self {
            PersistedModel::File(handle) => handle.close(unlink),
            PersistedModel::Shm(handle) => handle.close(unlink),
        }
    }

    /// Whether this instance may physically release the backing resources
    pub fn is_owner(&self) -> bool {
        match self {
            PersistedModel::File(handle) => handle.is_owner(),
            PersistedModel::Shm(handle) => handle.is_owner(),
        }
    }

    /// Short strategy name for diagnostics
    pub fn strategy(&self) -> &'static str {
        match self {
            PersistedModel::File(_) => "file",
            PersistedModel::Shm(_) => "shm",
        }
    }
}

/// Resolved persistence strategy
#[derive(Debug, Clone, PartialEq, Eq)]
enum Strategy {
    File { dir: Option<PathBuf> },
    Shm,
}

/// Strategy decision table; pure so each row is testable
fn choose(override_dir: Option<PathBuf>, shm_supported: bool) -> Strategy {
    if let Some(dir) = override_dir {
        Strategy::File { dir: Some(dir) }
    } else if shm_supported {
        Strategy::Shm
    } else {
        Strategy::File { dir: None }
    }
}

/// Persist a model for cross-process sharing using the best strategy
pub fn persist<M: Shareable>(model: &M) -> ShareResult<PersistedModel<M>> {
    let override_dir = std::env::var_os(TEMP_DIR_ENV).map(PathBuf::from);
    match choose(override_dir, platform::shm_supported()) {
        Strategy::File { dir } => persist_file(model, dir.as_deref()),
        Strategy::Shm => persist_shm(model),
    }
}

/// Persist a model with the file-backed strategy
/// (system temp directory when `dir` is `None`)
pub fn persist_file<M: Shareable>(
    model: &M,
    dir: Option<&Path>,
) -> ShareResult<PersistedModel<M>> {
    Ok(PersistedModel::File(FilePersisted::create(model, dir)?))
}

/// Persist a model with the shared-memory strategy
///
/// Fails fast with [`ShareError::ShmUnavailable`] before serializing
/// anything when segments are unusable on this platform.
pub fn persist_shm<M: Shareable>(model: &M) -> ShareResult<PersistedModel<M>> {
    if !platform::shm_supported() {
        return Err(ShareError::ShmUnavailable);
    }
    Ok(PersistedModel::Shm(ShmPersisted::create(model)?))
}
