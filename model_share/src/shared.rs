//! Scoped wrapper around models obtained from a store
//!
//! Ownership of a stored model is shared through an [`Arc`]; the wrapper
//! records the strong count at acquisition and compares it at release. A
//! count that rose means some caller kept a stray reference past the scope —
//! the wrapper cannot force that memory to be freed, it can only flag the
//! anomaly and warn.

use std::ops::Deref;
use std::sync::Arc;

/// A shared model acquired from a store, released exactly once
///
/// Deref gives borrowed access for the duration of the scope. Dropping the
/// wrapper releases it automatically; [`SharedObject::release`] does the same
/// explicitly and reports whether a leak was flagged.
pub struct SharedObject<M> {
    object: Option<Arc<M>>,
    baseline: usize,
}

impl<M> SharedObject<M> {
    /// Wrap a shared model, recording the current reference count as baseline
    pub fn new(object: Arc<M>) -> Self {
        let baseline = Arc::strong_count(&object);
        Self {
            object: Some(object),
            baseline,
        }
    }

    /// Hand out an additional owning reference
    ///
    /// Any reference obtained here must be dropped before the wrapper is
    /// released, or the release will flag a leak.
    pub fn retain(&self) -> Arc<M> {
        Arc::clone(self.object.as_ref().expect("released"))
    }

    /// Release the shared model, returning whether a leak was flagged
    ///
    /// A leak is a warning, not an error: the reference is dropped either
    /// way and processing continues.
    pub fn release(mut self) -> bool {
        self.release_inner()
    }

    fn release_inner(&mut self) -> bool {
        let Some(object) = self.object.take() else {
            return false;
        };
        let count = Arc::strong_count(&object);
        let leaked = count > self.baseline;
        if leaked {
            tracing::warn!(
                baseline = self.baseline,
                count,
                "reference count rose while shared object was held, object leak?"
            );
        }
        leaked
    }
}

impl<M> Deref for SharedObject<M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.object.as_ref().expect("released")
    }
}

impl<M> Drop for SharedObject<M> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl<M: std::fmt::Debug> std::fmt::Debug for SharedObject<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedObject")
            .field("object", &self.object)
            .field("baseline", &self.baseline)
            .finish()
    }
}
