//! Store/client lifecycle protocol tests

use model_share::{
    Activation, ModelClient, ModelStore, NoopModelStore, ScoreMatrix, ShareError, ShareResult,
    SharedObject, StoreLifecycle, current_store, enter_store, get_store, persist_file,
    PersistedModel,
};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Collaborator-contract store: keyed map with observable lifecycle counts
struct MapStore<M> {
    activation: Activation,
    init_calls: Cell<usize>,
    shutdown_calls: Cell<usize>,
    fail_init: bool,
    next_key: Cell<u64>,
    models: RefCell<HashMap<u64, Arc<M>>>,
}

impl<M> MapStore<M> {
    fn new() -> Self {
        Self {
            activation: Activation::default(),
            init_calls: Cell::new(0),
            shutdown_calls: Cell::new(0),
            fail_init: false,
            next_key: Cell::new(0),
            models: RefCell::new(HashMap::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::new()
        }
    }
}

impl<M: 'static> StoreLifecycle for MapStore<M> {
    fn label(&self) -> &str {
        "map"
    }

    fn activation(&self) -> &Activation {
        &self.activation
    }

    fn init(&self) -> ShareResult<()> {
        if self.fail_init {
            return Err(ShareError::ShmUnavailable);
        }
        self.init_calls.set(self.init_calls.get() + 1);
        Ok(())
    }

    fn shutdown(&self) -> ShareResult<()> {
        self.shutdown_calls.set(self.shutdown_calls.get() + 1);
        self.models.borrow_mut().clear();
        Ok(())
    }

    fn as_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Lookup handle for a [`MapStore`]
struct MapClient<M>(Rc<MapStore<M>>);

impl<M: model_share::Shareable + 'static> ModelStore<M> for MapStore<M> {
    type Key = u64;
    type Client = MapClient<M>;

    fn put_model(&self, model: M) -> ShareResult<u64> {
        let key = self.next_key.get();
        self.next_key.set(key + 1);
        self.models.borrow_mut().insert(key, Arc::new(model));
        Ok(key)
    }

    fn get_model(&self, key: &u64) -> ShareResult<SharedObject<M>> {
        let models = self.models.borrow();
        let model = models.get(key).ok_or_else(|| ShareError::UnknownKey {
            key: key.to_string(),
        })?;
        Ok(SharedObject::new(Arc::clone(model)))
    }

    fn client(self: &Rc<Self>) -> ShareResult<MapClient<M>> {
        Ok(MapClient(Rc::clone(self)))
    }
}

impl<M: model_share::Shareable + 'static> ModelClient<M> for MapClient<M> {
    type Key = u64;

    fn get_model(&self, key: &u64) -> ShareResult<SharedObject<M>> {
        ModelStore::get_model(self.0.as_ref(), key)
    }
}

#[test]
fn test_init_once_per_activation_cycle() -> ShareResult<()> {
    let store = Rc::new(MapStore::<ScoreMatrix>::new());

    {
        let _outer = enter_store(store.clone())?;
        assert_eq!(store.init_calls.get(), 1);
        {
            let _inner = enter_store(store.clone())?;
            // Reentry must not re-initialize
            assert_eq!(store.init_calls.get(), 1);
            assert_eq!(store.activation().depth(), 2);
        }
        assert_eq!(store.shutdown_calls.get(), 0);
    }

    assert_eq!(store.init_calls.get(), 1);
    assert_eq!(store.shutdown_calls.get(), 1);
    assert_eq!(store.activation().depth(), 0);

    // A second cycle initializes again
    let _again = enter_store(store.clone())?;
    assert_eq!(store.init_calls.get(), 2);
    Ok(())
}

#[test]
fn test_failed_init_rolls_back_activation() {
    let store = Rc::new(MapStore::<ScoreMatrix>::failing());
    assert!(matches!(
        enter_store(store.clone()),
        Err(ShareError::ShmUnavailable)
    ));
    assert_eq!(store.activation().depth(), 0);
    assert!(current_store().is_none());
}

#[test]
#[should_panic(expected = "LIFO")]
fn test_out_of_order_exit_panics() {
    let first = Rc::new(NoopModelStore::<ScoreMatrix>::new());
    let second = Rc::new(NoopModelStore::<ScoreMatrix>::new());
    let outer = enter_store(first).unwrap();
    let _inner = enter_store(second).unwrap();
    drop(outer);
}

#[test]
fn test_noop_store_key_is_the_model() -> ShareResult<()> {
    let store = Rc::new(NoopModelStore::new());
    let model = ScoreMatrix::from_scores(1, 2, vec![0.25, 0.5])?;

    let key = store.put_model(model.clone())?;
    assert_eq!(key.as_ref(), &model);

    let shared = store.get_model(&key)?;
    assert_eq!(&*shared, &model);
    assert!(!shared.release());

    // In a single process the store is its own client
    let client = store.client()?;
    assert!(Rc::ptr_eq(&client, &store));
    let via_client = ModelClient::get_model(&client, &key)?;
    assert_eq!(&*via_client, &model);
    Ok(())
}

#[test]
fn test_unknown_key_is_a_lookup_failure() -> ShareResult<()> {
    let store = Rc::new(MapStore::<ScoreMatrix>::new());
    let key = store.put_model(ScoreMatrix::new(2, 2))?;
    assert!(store.get_model(&key).is_ok());
    assert!(matches!(
        store.get_model(&(key + 1)),
        Err(ShareError::UnknownKey { .. })
    ));
    Ok(())
}

#[test]
fn test_map_store_client_resolves_keys() -> ShareResult<()> {
    let store = Rc::new(MapStore::new());
    let model = ScoreMatrix::from_scores(1, 2, vec![0.25, 0.5])?;
    let key = store.put_model(model.clone())?;

    let client = store.client()?;
    let shared = client.get_model(&key)?;
    assert_eq!(&*shared, &model);
    assert!(matches!(
        client.get_model(&(key + 1)),
        Err(ShareError::UnknownKey { .. })
    ));
    Ok(())
}

#[test]
fn test_shutdown_releases_stored_models() -> ShareResult<()> {
    let store = Rc::new(MapStore::<ScoreMatrix>::new());
    let key = {
        let _scope = enter_store(store.clone())?;
        store.put_model(ScoreMatrix::new(1, 1))?
    };
    // Keys do not survive the activation cycle of this backend
    assert!(matches!(
        store.get_model(&key),
        Err(ShareError::UnknownKey { .. })
    ));
    Ok(())
}

#[test]
fn test_leak_warning_on_retained_model() -> ShareResult<()> {
    let store = Rc::new(NoopModelStore::new());
    let key = store.put_model(ScoreMatrix::new(2, 2))?;

    let shared = store.get_model(&key)?;
    let stray = shared.retain();
    assert!(shared.release());
    drop(stray);

    let clean = store.get_model(&key)?;
    assert!(!clean.release());
    Ok(())
}

#[test]
fn test_put_serialized_both_read_paths() -> ShareResult<()> {
    let model = ScoreMatrix::from_scores(2, 3, (0..6).map(|i| i as f32).collect())?;
    let mut handle = persist_file(&model, None)?;
    let path = match &handle {
        PersistedModel::File(file) => file.path().to_path_buf(),
        other => panic!("expected file strategy, got {}", other.strategy()),
    };

    let store = Rc::new(MapStore::<ScoreMatrix>::new());
    for mapped in [false, true] {
        let key = store.put_serialized(&path, mapped)?;
        let shared = store.get_model(&key)?;
        assert_eq!(&*shared, &model);
    }

    handle.close(true);
    Ok(())
}

#[test]
fn test_get_store_prefers_active_scope() -> ShareResult<()> {
    let fresh: Rc<NoopModelStore<ScoreMatrix>> = get_store(true);
    let _scope = enter_store(fresh.clone())?;

    let reused: Rc<NoopModelStore<ScoreMatrix>> = get_store(true);
    assert!(Rc::ptr_eq(&fresh, &reused));

    let separate: Rc<NoopModelStore<ScoreMatrix>> = get_store(false);
    assert!(!Rc::ptr_eq(&fresh, &separate));
    Ok(())
}
