//! # Cross-Process Model Persistence & Sharing
//!
//! Primitives for moving large trained model objects from a driver process
//! to worker processes without re-serializing them once per worker. A model
//! is persisted exactly once, the driver hands each worker a lightweight,
//! cheaply-copyable handle, and workers reconstruct (or directly map) the
//! model from the handle. The driver retains ownership and releases the
//! backing OS resources exactly once.
//!
//! ## Features
//!
//! - **Strategy-Selecting Dispatcher**: file-backed artifacts or POSIX
//!   shared-memory segments, chosen from configuration and a runtime
//!   capability probe, with graceful fallback
//! - **Skeleton/Buffer Split**: small structural skeleton plus out-of-band
//!   raw buffers, so large payloads are copied at most once
//! - **Ownership-Safe Transmission**: a serialized handle always arrives
//!   non-owning; only the creating process can release resources
//! - **Reentrant Store Activation**: nested consumers share one active store
//!   through a per-thread activation stack
//! - **Leak Detection**: shared objects flag stray references at release via
//!   reference-count comparison
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  persist()   ┌──────────────────┐   handle    ┌──────────────┐
//! │   Driver     ├─────────────►│ PersistedModel   ├────────────►│   Worker     │
//! │              │              │  File | Shm      │ (serialized)│              │
//! │ owns model   │              │ skeleton+buffers │             │ get() ──► M  │
//! └──────┬───────┘              └──────────────────┘             └──────────────┘
//!        │ close(unlink=true)            │
//!        └────────────────────► releases artifact / segments once
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use model_share::{ScoreMatrix, persist_file};
//!
//! # fn main() -> model_share::ShareResult<()> {
//! let model = ScoreMatrix::from_scores(2, 2, vec![0.1, 0.2, 0.3, 0.4])?;
//!
//! // Driver: persist once, send the handle to workers
//! let mut handle = persist_file(&model, None)?;
//!
//! // Worker (same process here): materialize from the handle
//! let restored = handle.get()?;
//! assert_eq!(restored.score(1, 1), 0.4);
//!
//! // Driver: release the backing artifact exactly once
//! handle.close(true);
//! # Ok(())
//! # }
//! ```
//!
//! ### Store activation
//!
//! ```rust
//! use model_share::{NoopModelStore, ModelStore, enter_store, get_store};
//! use model_share::ScoreMatrix;
//! use std::rc::Rc;
//!
//! # fn main() -> model_share::ShareResult<()> {
//! let store: Rc<NoopModelStore<ScoreMatrix>> = get_store(true);
//! let scope = enter_store(store.clone())?;
//!
//! let key = store.put_model(ScoreMatrix::new(4, 4))?;
//! let shared = store.get_model(&key)?;
//! assert_eq!(shared.n_users(), 4);
//! assert!(!shared.release());
//!
//! drop(scope);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`ShareResult`] with a [`ShareError`]
//! naming the resource and strategy involved. Resource creation failures are
//! fatal and never leave a partial handle behind; teardown failures are
//! logged warnings so release keeps going; a rising reference count at
//! release is a warning too, never an error.
//!
//! ## Thread Safety
//!
//! - **PersistedModel**: materialization caches behind `&mut self`; no
//!   internal synchronization — one handle, one thread at a time
//! - **Sharing-mode flag / activation stack**: per OS thread by design
//! - **SharedObject**: the wrapped `Arc` may be shared; the wrapper itself
//!   is confined to the acquiring scope
//!
//! ## Platform Support
//!
//! Shared-memory persistence needs POSIX `shm_open`; availability is probed
//! once at runtime and the dispatcher falls back to file-backed persistence
//! when segments are unusable. File-backed persistence works everywhere.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod data;
pub mod error;
pub mod mode;
pub mod model;
pub mod persist;
pub mod platform;
pub mod shared;
pub mod store;

pub use artifact::{Artifact, ArtifactWriter};
pub use data::{FeatureTable, ScoreMatrix};
pub use error::{ShareError, ShareResult};
pub use mode::{SharingScope, is_sharing};
pub use model::{BufferSink, Buffers, Shareable};
pub use persist::{
    BufferSpec, FilePersisted, PersistedModel, ShmPersisted, TEMP_DIR_ENV, persist, persist_file,
    persist_shm,
};
pub use shared::SharedObject;
pub use store::{
    Activation, ModelClient, ModelStore, NoopModelStore, StoreLifecycle, StoreScope, current_store,
    current_store_as, enter_store, get_store,
};

/// Initialize tracing for diagnostics
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
