//! Lock acquisition that survives poisoning.
//!
//! A panic inside a renderer must not take every later cache access down with
//! it, so poisoned locks are logged and recovered.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) fn read<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        recovered(source, op, "rwlock.read");
        poisoned.into_inner()
    })
}

pub(crate) fn write<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        recovered(source, op, "rwlock.write");
        poisoned.into_inner()
    })
}

pub(crate) fn lock<'a, T>(
    lock: &'a Mutex<T>,
    source: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        recovered(source, op, "mutex.lock");
        poisoned.into_inner()
    })
}

fn recovered(source: &'static str, op: &'static str, lock_kind: &'static str) {
    tracing::warn!(
        op,
        source_module = source,
        lock_kind,
        "Recovered from poisoned lock, state may be stale after a panic in another thread"
    );
}
