//! Shared-memory persistence: skeleton bytes plus one segment per buffer

use crate::error::ShareResult;
use crate::model::{BufferSink, Shareable, decode_skeleton, encode_skeleton};
use crate::platform;
use memmap2::{Mmap, MmapMut};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Descriptor for one out-of-band buffer living in a named segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferSpec {
    /// POSIX segment name (empty-length buffers record a name but no segment)
    pub name: String,
    /// Exact byte length of the buffer (segments may be page-padded)
    pub len: usize,
}

/// Per-process counter so each persisted model gets a distinct segment group
static GROUP_SEQ: AtomicU64 = AtomicU64::new(0);

fn mint_group() -> String {
    let seq = GROUP_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("/mshare-{}-{}", platform::current_pid(), seq)
}

/// A model persisted into POSIX shared-memory segments
///
/// The handle carries the skeleton bytes and the ordered descriptor list;
/// a transmitted copy re-opens segments by name in the receiving process and
/// never owns them. Segment order must match the order buffers were reported
/// during serialization — reconstruction reattaches them in that order.
#[derive(Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct ShmPersisted<M: Shareable> {
    skeleton: Vec<u8>,
    buffers: Vec<BufferSpec>,
    #[serde(skip)]
    is_owner: bool,
    /// Owner-side writable mappings, kept alive until close
    #[serde(skip)]
    segments: Vec<MmapMut>,
    #[serde(skip)]
    model: Option<M>,
}

/// Sink that copies each reported buffer into a fresh segment
struct SegmentSink {
    group: String,
    specs: Vec<BufferSpec>,
    segments: Vec<MmapMut>,
}

impl BufferSink for SegmentSink {
    fn put(&mut self, bytes: &[u8]) -> ShareResult<()> {
        let name = format!("{}-{}", self.group, self.specs.len());
        if !bytes.is_empty() {
            let mut map = platform::create_segment(&name, bytes.len())?;
            map[..bytes.len()].copy_from_slice(bytes);
            tracing::debug!(segment = %name, bytes = bytes.len(), "copied buffer to segment");
            self.segments.push(map);
        }
        self.specs.push(BufferSpec {
            name,
            len: bytes.len(),
        });
        Ok(())
    }
}

impl SegmentSink {
    /// Unlink everything created so far; used when serialization fails
    /// partway so no partial handle leaks segments
    fn discard(self) {
        for spec in &self.specs {
            if spec.len == 0 {
                continue;
            }
            if let Err(e) = platform::unlink_segment(&spec.name) {
                tracing::warn!(segment = %spec.name, "failed to unlink segment: {e}");
            }
        }
    }
}

impl<M: Shareable> ShmPersisted<M> {
    /// Persist `model` into shared-memory segments
    pub(crate) fn create(model: &M) -> ShareResult<Self> {
        let mut sink = SegmentSink {
            group: mint_group(),
            specs: Vec::new(),
            segments: Vec::new(),
        };
        let skeleton = match encode_skeleton(model, &mut sink) {
            Ok(skeleton) => skeleton,
            Err(e) => {
                sink.discard();
                return Err(e);
            }
        };

        let shm_bytes: usize = sink.specs.iter().map(|spec| spec.len).sum();
        tracing::info!(
            skeleton_bytes = skeleton.len(),
            buffers = sink.specs.len(),
            shm_bytes,
            "persisted model to shared memory"
        );

        Ok(Self {
            skeleton,
            buffers: sink.specs,
            is_owner: true,
            segments: sink.segments,
            model: None,
        })
    }

    /// Ordered out-of-band buffer descriptors
    pub fn buffer_specs(&self) -> &[BufferSpec] {
        &self.buffers
    }

    /// Whether this instance owns the backing segments
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Materialize the model, attaching every segment on first call
    ///
    /// Each named segment is opened read-only and its first `len` bytes form
    /// the reconstruction view, in recorded order. A missing segment is a
    /// fatal lookup error.
    pub fn get(&mut self) -> ShareResult<&M> {
        if self.model.is_none() {
            let mut maps: Vec<Option<Mmap>> = Vec::with_capacity(self.buffers.len());
            for spec in &self.buffers {
                if spec.len == 0 {
                    maps.push(None);
                } else {
                    maps.push(Some(platform::open_segment(&spec.name, spec.len)?));
                }
            }
            let views: Vec<&[u8]> = maps
                .iter()
                .zip(&self.buffers)
                .map(|(map, spec)| match map {
                    Some(map) => &map[..spec.len],
                    None => &[][..],
                })
                .collect();
            let model = decode_skeleton(&self.skeleton, views)?;
            tracing::debug!(buffers = self.buffers.len(), "materialized model from segments");
            self.model = Some(model);
        }
        Ok(self.model.as_ref().expect("cache populated above"))
    }

    /// Drop the cache; when owner and `unlink` is set, release and unlink
    /// every segment exactly once
    ///
    /// Unlink failures are logged, never raised, and do not stop teardown of
    /// the remaining segments.
    pub fn close(&mut self, unlink: bool) {
        self.model = None;

        if self.is_owner && unlink {
            self.segments.clear();
            for spec in &self.buffers {
                if spec.len == 0 {
                    continue;
                }
                if let Err(e) = platform::unlink_segment(&spec.name) {
                    tracing::warn!(segment = %spec.name, "failed to unlink segment: {e}");
                }
            }
            self.is_owner = false;
        }
    }
}

impl<M: Shareable> Drop for ShmPersisted<M> {
    fn drop(&mut self) {
        // Segments have no other reclaim path, so the owner unlinks on drop
        self.close(true);
    }
}

impl<M: Shareable> std::fmt::Debug for ShmPersisted<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmPersisted")
            .field("skeleton_bytes", &self.skeleton.len())
            .field("buffers", &self.buffers)
            .field("is_owner", &self.is_owner)
            .field("materialized", &self.model.is_some())
            .finish()
    }
}
