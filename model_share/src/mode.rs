//! Thread-local sharing-mode flag
//!
//! Model types with custom serialization hooks consult this flag to pick a
//! transport-optimized encoding (elide large payloads that travel out of
//! band) instead of their durable-storage encoding. Both persistence
//! strategies serialize inside a [`SharingScope`].
//!
//! The flag is per OS thread with a single writer per thread: only the
//! serializing call stack flips it, via the RAII guard.

use std::cell::Cell;

thread_local! {
    static SHARING: Cell<bool> = const { Cell::new(false) };
}

/// Query whether the current thread is serializing for cross-process sharing
pub fn is_sharing() -> bool {
    SHARING.with(Cell::get)
}

/// RAII scope marking serialization as cross-process sharing
///
/// The previous mode is restored when the scope is dropped, on every exit
/// path including unwinding.
#[derive(Debug)]
pub struct SharingScope {
    prev: bool,
}

impl SharingScope {
    /// Enter sharing mode on the current thread
    pub fn enter() -> Self {
        let prev = SHARING.with(|flag| flag.replace(true));
        Self { prev }
    }
}

impl Drop for SharingScope {
    fn drop(&mut self) {
        SHARING.with(|flag| flag.set(self.prev));
    }
}
