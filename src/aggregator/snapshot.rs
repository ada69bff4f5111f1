use std::sync::{Arc, RwLock};

/// Holds the dataset readers are currently served from.
///
/// A rebuild produces a whole new value which is swapped in at once, so a
/// reader sees either the old snapshot or the new one, never a mix.
pub struct SnapshotStore<T> {
    current: RwLock<Arc<T>>,
}

impl<T> SnapshotStore<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn current(&self) -> Arc<T> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Installs `next` and returns the snapshot it replaced.
    pub fn replace(&self, next: T) -> Arc<T> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(next))
    }
}
