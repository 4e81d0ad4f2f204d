//! Shareable model contract: skeleton plus out-of-band buffers
//!
//! Persistence splits a model into a small serde-encoded *skeleton*
//! (structure and small values) and zero or more large raw buffers that are
//! stored out of band — in shared-memory segments or in the aligned region
//! of a persisted artifact. Reconstruction reattaches the buffers in the
//! exact order they were exported.

use crate::error::{ShareError, ShareResult};
use crate::mode::SharingScope;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A model that can be persisted for cross-process sharing
///
/// The serde implementation produces the skeleton. Implementations should
/// consult [`crate::mode::is_sharing`] and elide any payload reported to
/// [`Shareable::export_buffers`] while a sharing scope is active, so the
/// durable encoding stays self-contained.
pub trait Shareable: Serialize + DeserializeOwned {
    /// Report every out-of-band buffer to `sink`, in a stable order
    fn export_buffers(&self, sink: &mut dyn BufferSink) -> ShareResult<()>;

    /// Reattach out-of-band buffers, pulling them in the exported order
    fn import_buffers(&mut self, buffers: &mut Buffers<'_>) -> ShareResult<()>;
}

/// Receives out-of-band buffers during serialization
///
/// The callback analogue on the persistence side: each strategy copies the
/// bytes into its backing resource (segment or artifact region) immediately.
pub trait BufferSink {
    /// Store one buffer's bytes out of band
    fn put(&mut self, bytes: &[u8]) -> ShareResult<()>;
}

/// Ordered cursor over reconstructed out-of-band buffer views
///
/// Reconstruction must consume exactly the recorded buffers; both
/// over-consumption and leftovers are fatal mismatches.
#[derive(Debug)]
pub struct Buffers<'a> {
    views: Vec<&'a [u8]>,
    cursor: usize,
}

impl<'a> Buffers<'a> {
    /// Wrap the recorded buffer views, in serialization order
    pub fn new(views: Vec<&'a [u8]>) -> Self {
        Self { views, cursor: 0 }
    }

    /// Number of recorded buffers
    pub fn recorded(&self) -> usize {
        self.views.len()
    }

    /// Number of buffers consumed so far
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    /// Take the next buffer view
    pub fn next(&mut self) -> ShareResult<&'a [u8]> {
        let view = self
            .views
            .get(self.cursor)
            .copied()
            .ok_or(ShareError::BufferMismatch {
                recorded: self.views.len(),
                consumed: self.cursor + 1,
            })?;
        self.cursor += 1;
        Ok(view)
    }

    /// Verify every recorded buffer was consumed
    pub fn finish(self) -> ShareResult<()> {
        if self.cursor != self.views.len() {
            return Err(ShareError::BufferMismatch {
                recorded: self.views.len(),
                consumed: self.cursor,
            });
        }
        Ok(())
    }
}

/// Serialize a model's skeleton and export its buffers inside a sharing scope
pub(crate) fn encode_skeleton<M: Shareable>(
    model: &M,
    sink: &mut dyn BufferSink,
) -> ShareResult<Vec<u8>> {
    let _scope = SharingScope::enter();
    let skeleton = serde_json::to_vec(model)?;
    model.export_buffers(sink)?;
    Ok(skeleton)
}

/// Rebuild a model from its skeleton and ordered buffer views
pub(crate) fn decode_skeleton<M: Shareable>(
    skeleton: &[u8],
    views: Vec<&[u8]>,
) -> ShareResult<M> {
    let mut model: M = serde_json::from_slice(skeleton)?;
    let mut buffers = Buffers::new(views);
    model.import_buffers(&mut buffers)?;
    buffers.finish()?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_in_order() -> ShareResult<()> {
        let a = [1u8, 2];
        let b = [3u8];
        let mut buffers = Buffers::new(vec![&a[..], &b[..]]);
        assert_eq!(buffers.recorded(), 2);
        assert_eq!(buffers.next()?, &[1, 2]);
        assert_eq!(buffers.next()?, &[3]);
        buffers.finish()
    }

    #[test]
    fn test_overconsumption_is_mismatch() {
        let mut buffers = Buffers::new(vec![]);
        assert!(matches!(
            buffers.next(),
            Err(ShareError::BufferMismatch {
                recorded: 0,
                consumed: 1
            })
        ));
    }

    #[test]
    fn test_leftover_is_mismatch() {
        let a = [0u8; 4];
        let buffers = Buffers::new(vec![&a[..]]);
        assert!(matches!(
            buffers.finish(),
            Err(ShareError::BufferMismatch {
                recorded: 1,
                consumed: 0
            })
        ));
    }
}
