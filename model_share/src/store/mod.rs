//! Store / client protocol with reentrant activation
//!
//! A store maps opaque keys to stored models and lives through a counted
//! activation lifecycle: `init()` runs on the inactive→active transition,
//! `shutdown()` on the return to inactive, and nested activations reuse the
//! running instance through a thread-local activation stack.
//!
//! Stores themselves are never transmissible — none of them implement
//! `Serialize`, so shipping one to a worker is a compile error. Workers get
//! the cheap [`ModelClient`] derivative instead, which carries just the keys
//! and resource identifiers needed for lookups.

pub mod noop;

use crate::artifact::Artifact;
use crate::error::ShareResult;
use crate::model::Shareable;
use crate::shared::SharedObject;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

pub use noop::NoopModelStore;

/// Looks up stored models by key
///
/// Clients must be cheap to hand to worker processes; multiprocess backends
/// make theirs serializable, the in-process no-op client is the store itself.
pub trait ModelClient<M> {
    /// Key type produced by the matching store
    type Key;

    /// Get a stored model, wrapped for scoped release
    ///
    /// A key this client cannot resolve (not yet materialized, or already
    /// released) is a lookup failure, distinct from resource errors.
    fn get_model(&self, key: &Self::Key) -> ShareResult<SharedObject<M>>;
}

/// Object-safe lifecycle surface shared by every store backend
///
/// Backends embed an [`Activation`] counter and expose it here; the scope
/// machinery drives `init`/`shutdown` through it.
pub trait StoreLifecycle: Any {
    /// Store name for diagnostics
    fn label(&self) -> &str;

    /// Activation counter backing the reentrant scope protocol
    fn activation(&self) -> &Activation;

    /// Set up backing resources; runs exactly once per inactive→active
    /// transition
    fn init(&self) -> ShareResult<()> {
        Ok(())
    }

    /// Tear down backing resources; runs exactly once per active→inactive
    /// transition
    fn shutdown(&self) -> ShareResult<()> {
        Ok(())
    }

    /// Upcast for typed recovery from the activation stack
    fn as_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Keyed model store with a counted activation lifecycle
pub trait ModelStore<M: Shareable>: StoreLifecycle {
    /// Opaque key returned by [`ModelStore::put_model`]
    type Key;
    /// Cheap, transmissible lookup derivative
    type Client: ModelClient<M, Key = Self::Key>;

    /// Store a model, returning the key any client of this store can use
    ///
    /// Failures (disk full, segment allocation) are fatal and leave no
    /// partially stored state behind.
    fn put_model(&self, model: M) -> ShareResult<Self::Key>;

    /// Get a stored model, wrapped for scoped release
    fn get_model(&self, key: &Self::Key) -> ShareResult<SharedObject<M>>;

    /// Get a client bound to the same backing resource
    fn client(self: &Rc<Self>) -> ShareResult<Self::Client>;

    /// Load an externally serialized artifact and store the model
    ///
    /// `mapped` picks the memory-mapped deserialization path instead of the
    /// whole-file read.
    fn put_serialized(&self, path: &Path, mapped: bool) -> ShareResult<Self::Key> {
        let artifact = if mapped {
            Artifact::open_mapped(path)?
        } else {
            Artifact::open(path)?
        };
        self.put_model(artifact.decode()?)
    }
}

/// Reentrant activation counter
///
/// Thread-confined (single-writer per thread, like the activation stack);
/// backends needing cross-thread stores must add their own synchronization.
#[derive(Debug, Default)]
pub struct Activation {
    count: Cell<usize>,
}

impl Activation {
    /// Increment; returns whether this was the inactive→active transition
    pub fn enter(&self) -> bool {
        let count = self.count.get();
        self.count.set(count + 1);
        count == 0
    }

    /// Decrement; returns whether this was the active→inactive transition
    pub fn exit(&self) -> bool {
        let count = self.count.get();
        debug_assert!(count > 0, "activation count underflow");
        self.count.set(count.saturating_sub(1));
        count == 1
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.count.get()
    }
}

thread_local! {
    static ACTIVE_STORES: RefCell<Vec<Rc<dyn StoreLifecycle>>> = const { RefCell::new(Vec::new()) };
}

/// Guard for one activation of a store
///
/// Exiting pops this store from the activation stack; scopes must unwind in
/// LIFO order — dropping guards out of order is a programming error and
/// panics.
pub struct StoreScope {
    store: Rc<dyn StoreLifecycle>,
}

impl StoreScope {
    /// The store this scope activated
    pub fn store(&self) -> &Rc<dyn StoreLifecycle> {
        &self.store
    }
}

impl Drop for StoreScope {
    fn drop(&mut self) {
        if self.store.activation().exit() {
            // Teardown failures must not abort shutdown of the process
            if let Err(e) = self.store.shutdown() {
                tracing::warn!(store = self.store.label(), "store shutdown failed: {e}");
            }
        }
        let popped = ACTIVE_STORES.with(|stores| stores.borrow_mut().pop());
        match popped {
            Some(top) if Rc::ptr_eq(&top, &self.store) => {}
            _ if std::thread::panicking() => {
                // Already unwinding; a second panic would abort
                tracing::error!(
                    store = self.store.label(),
                    "store activation scopes exited out of LIFO order during unwind"
                );
            }
            _ => panic!(
                "store activation scopes exited out of LIFO order (store `{}`)",
                self.store.label()
            ),
        }
    }
}

/// Activate a store, pushing it onto this thread's activation stack
///
/// `init()` runs only when the store was inactive; if it fails, the
/// activation count is rolled back and the error propagates.
pub fn enter_store(store: Rc<dyn StoreLifecycle>) -> ShareResult<StoreScope> {
    if store.activation().enter() {
        if let Err(e) = store.init() {
            store.activation().exit();
            return Err(e);
        }
        tracing::debug!(store = store.label(), "store initialized");
    }
    ACTIVE_STORES.with(|stores| stores.borrow_mut().push(Rc::clone(&store)));
    Ok(StoreScope { store })
}

/// The innermost active store on this thread, if any
pub fn current_store() -> Option<Rc<dyn StoreLifecycle>> {
    ACTIVE_STORES.with(|stores| stores.borrow().last().cloned())
}

/// The innermost active store, downcast to a concrete backend type
pub fn current_store_as<S: StoreLifecycle>() -> Option<Rc<S>> {
    current_store().and_then(|store| store.as_any().downcast::<S>().ok())
}

/// Pick a store for in-process work
///
/// Reuses the innermost active [`NoopModelStore`] when `reuse` is set;
/// otherwise creates a fresh one. Multiprocess backends are external
/// collaborators that plug into the same activation machinery.
pub fn get_store<M: Shareable + 'static>(reuse: bool) -> Rc<NoopModelStore<M>> {
    if reuse {
        if let Some(store) = current_store_as::<NoopModelStore<M>>() {
            return store;
        }
    }
    Rc::new(NoopModelStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_transitions() {
        let activation = Activation::default();
        assert!(activation.enter());
        assert!(!activation.enter());
        assert_eq!(activation.depth(), 2);
        assert!(!activation.exit());
        assert!(activation.exit());
        assert_eq!(activation.depth(), 0);
    }

    #[test]
    fn test_current_store_empty_by_default() {
        assert!(current_store().is_none());
    }

    #[test]
    fn test_get_store_reuses_active() -> ShareResult<()> {
        let store = get_store::<crate::data::ScoreMatrix>(true);
        let scope = enter_store(store.clone())?;
        assert_eq!(scope.store().label(), "noop");

        let reused = get_store::<crate::data::ScoreMatrix>(true);
        assert!(Rc::ptr_eq(&store, &reused));

        let fresh = get_store::<crate::data::ScoreMatrix>(false);
        assert!(!Rc::ptr_eq(&store, &fresh));
        Ok(())
    }
}
