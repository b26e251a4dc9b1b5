#![forbid(unsafe_code)]

//! Identity-bearing update callbacks.
//!
//! An [`Observer<T>`] is the unit of subscription. Two observers are equal
//! only if one is a clone of the other: identity comes from an
//! [`ObserverId`] drawn from a process-wide counter at construction, never
//! from the callback itself.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of an [`Observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

type UpdateFn<T> = dyn Fn(Option<&T>) + Send + Sync;

/// A delivery callback with stable identity.
///
/// Cloning shares both the callback and the identity, so a subscriber can
/// keep a clone around to call `remove` later.
pub struct Observer<T> {
    id: ObserverId,
    update: Arc<UpdateFn<T>>,
}

impl<T> Observer<T> {
    /// Wrap `update` with a fresh identity.
    pub fn new(update: impl Fn(Option<&T>) + Send + Sync + 'static) -> Self {
        Self {
            id: ObserverId::next(),
            update: Arc::new(update),
        }
    }

    /// Identity of this observer.
    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Invoke the callback.
    pub fn update(&self, value: Option<&T>) {
        (self.update)(value);
    }
}

// Manual impls: none of these depend on `T`.
impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            update: Arc::clone(&self.update),
        }
    }
}

impl<T> PartialEq for Observer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Observer<T> {}

impl<T> Hash for Observer<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn ids_are_unique() {
        let a = Observer::<i32>::new(|_| {});
        let b = Observer::<i32>::new(|_| {});
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }

    #[test]
    fn identical_callbacks_are_distinct() {
        fn noop(_: Option<&u8>) {}
        let a = Observer::new(noop);
        let b = Observer::new(noop);
        assert_ne!(a, b);
    }

    #[test]
    fn clone_keeps_identity() {
        let a = Observer::<i32>::new(|_| {});
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn hash_follows_identity() {
        let a = Observer::<i32>::new(|_| {});
        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(!set.insert(a.clone()));
        assert!(set.insert(Observer::new(|_| {})));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn update_invokes_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = Observer::new(move |v: Option<&i32>| sink.lock().unwrap().push(v.copied()));
        observer.update(Some(&7));
        observer.update(None);
        assert_eq!(*seen.lock().unwrap(), vec![Some(7), None]);
    }

    #[test]
    fn display_and_debug() {
        let observer = Observer::<()>::new(|_| {});
        let id = observer.id();
        assert_eq!(id.to_string(), format!("observer#{}", id.get()));
        assert!(format!("{observer:?}").contains("Observer"));
    }
}
