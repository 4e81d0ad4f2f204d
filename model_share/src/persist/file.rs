//! File-backed persistence: one memory-mappable artifact on disk

use crate::artifact::{Artifact, ArtifactWriter};
use crate::error::ShareResult;
use crate::model::{Shareable, encode_skeleton};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A model persisted to a memory-mappable temp artifact
///
/// Transmitting the handle (serializing it) keeps the path but strips
/// ownership and the materialized cache: only the process that created the
/// artifact may delete it.
#[derive(Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct FilePersisted<M: Shareable> {
    path: PathBuf,
    #[serde(skip)]
    is_owner: bool,
    #[serde(skip)]
    artifact: Option<Artifact>,
    #[serde(skip)]
    model: Option<M>,
}

impl<M: Shareable> FilePersisted<M> {
    /// Persist `model` into a fresh temp artifact under `dir`
    /// (system temp directory when `None`)
    pub(crate) fn create(model: &M, dir: Option<&Path>) -> ShareResult<Self> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::temp_dir(),
        };
        let path = tempfile::Builder::new()
            .prefix("mshare-")
            .suffix(".mdl")
            .tempfile_in(&dir)?
            .into_temp_path()
            .keep()
            .map_err(std::io::Error::from)?;

        let mut writer = ArtifactWriter::create(&path)?;
        let skeleton = encode_skeleton(model, &mut writer)?;
        writer.finish(&skeleton)?;

        tracing::info!(path = %path.display(), "persisted model to artifact");
        Ok(Self {
            path,
            is_owner: true,
            artifact: None,
            model: None,
        })
    }

    /// Path of the backing artifact
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this instance owns the backing artifact
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Materialize the model, mapping the artifact on first call
    ///
    /// A corrupt or missing artifact is a fatal read error. The result is
    /// cached; the `&mut` receiver means concurrent materialization from one
    /// handle cannot compile.
    pub fn get(&mut self) -> ShareResult<&M> {
        if self.model.is_none() {
            let artifact = Artifact::open_mapped(&self.path)?;
            let model = artifact.decode()?;
            tracing::debug!(path = %self.path.display(), "materialized model from artifact");
            self.artifact = Some(artifact);
            self.model = Some(model);
        }
        Ok(self.model.as_ref().expect("cache populated above"))
    }

    /// Release the mapping and cache; delete the artifact when owner and
    /// `unlink` is set
    ///
    /// Idempotent: ownership is cleared after the deletion attempt, so a
    /// second call is a no-op. Deletion failures are logged, never raised,
    /// so teardown keeps going.
    pub fn close(&mut self, unlink: bool) {
        self.model = None;
        self.artifact = None;

        if self.is_owner && unlink {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), "failed to remove artifact: {e}");
            }
            self.is_owner = false;
        }
    }
}

impl<M: Shareable> Drop for FilePersisted<M> {
    fn drop(&mut self) {
        // Release the mapping only; deleting the artifact stays explicit
        self.close(false);
    }
}

impl<M: Shareable> std::fmt::Debug for FilePersisted<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePersisted")
            .field("path", &self.path)
            .field("is_owner", &self.is_owner)
            .field("materialized", &self.model.is_some())
            .finish()
    }
}
