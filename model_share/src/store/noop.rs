//! No-op store: models are their own keys
//!
//! The terminal/default case for single-process work — there is no real
//! isolation, so parent and "worker" must share one process.

use crate::error::ShareResult;
use crate::model::Shareable;
use crate::shared::SharedObject;
use crate::store::{Activation, ModelClient, ModelStore, StoreLifecycle};
use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

/// Store that does nothing: `put_model` returns the model itself as the key
pub struct NoopModelStore<M> {
    activation: Activation,
    _marker: PhantomData<M>,
}

impl<M> NoopModelStore<M> {
    /// Create a no-op store
    pub fn new() -> Self {
        Self {
            activation: Activation::default(),
            _marker: PhantomData,
        }
    }
}

impl<M> Default for NoopModelStore<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: 'static> StoreLifecycle for NoopModelStore<M> {
    fn label(&self) -> &str {
        "noop"
    }

    fn activation(&self) -> &Activation {
        &self.activation
    }

    fn as_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

impl<M: Shareable + 'static> ModelStore<M> for NoopModelStore<M> {
    type Key = Arc<M>;
    type Client = Rc<NoopModelStore<M>>;

    fn put_model(&self, model: M) -> ShareResult<Arc<M>> {
        Ok(Arc::new(model))
    }

    fn get_model(&self, key: &Arc<M>) -> ShareResult<SharedObject<M>> {
        Ok(SharedObject::new(Arc::clone(key)))
    }

    fn client(self: &Rc<Self>) -> ShareResult<Rc<NoopModelStore<M>>> {
        // Single process: the store is its own client
        Ok(Rc::clone(self))
    }
}

impl<M: Shareable + 'static> ModelClient<M> for Rc<NoopModelStore<M>> {
    type Key = Arc<M>;

    fn get_model(&self, key: &Arc<M>) -> ShareResult<SharedObject<M>> {
        ModelStore::get_model(self.as_ref(), key)
    }
}

impl<M> std::fmt::Debug for NoopModelStore<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoopModelStore")
            .field("depth", &self.activation.depth())
            .finish()
    }
}
