#![forbid(unsafe_code)]

//! Lifecycle-aware observable value.
//!
//! # Design
//!
//! [`LiveData<T>`] holds an optional value, a version counter and a set of
//! [`LifecycleBoundObserver`]s keyed by [`ObserverId`]. All of it sits behind
//! one `parking_lot::ReentrantMutex` per instance, wrapping a `RefCell` for
//! mutation. Cloning a `LiveData` creates another handle to the **same**
//! state.
//!
//! Every assignment bumps the version by one and dispatches. Dispatch prunes
//! destroyed observers, then walks the remaining ones and delivers the
//! current value to each observer that is active and has not seen the
//! current version yet. The observer's version is marked *before* its
//! callback runs, so each version reaches an observer at most once, even if
//! the callback panics or re-enters.
//!
//! # Re-entrancy
//!
//! Callbacks run on the dispatching thread with the reentrant lock held but
//! no interior borrow active. A callback may subscribe, remove, set or
//! dispatch on the same instance. Other threads wait for the outermost
//! operation to finish.
//!
//! A nested dispatch runs to completion before the outer one resumes. The
//! outer dispatch evaluates each remaining observer against the version and
//! value current *when it reaches that observer*, so observers already
//! served by the nested dispatch are skipped, observers removed meanwhile
//! are skipped, and nobody receives an older version after a newer one.
//! Observers registered during a dispatch are not visited by it.
//!
//! # Performance
//!
//! | Operation        | Complexity                       |
//! |------------------|----------------------------------|
//! | `get()`          | O(1) + clone of `T`              |
//! | `set()`          | O(S log S) where S = observers   |
//! | `observe*()`     | O(log S)                         |
//! | `remove()`       | O(log S)                         |
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Double registration | Same `Observer` subscribed twice | `Err(AlreadyRegistered)`, nothing changes |
//! | Unknown initiator | `dispatch_to` with an unsubscribed observer | `Err(UnknownInitiator)`, nothing delivered |
//! | Panicking callback | Callback panics | Lock released during unwind; version stays marked as delivered |
//! | Unknown removal | `remove` of an unsubscribed observer | Returns `false` |

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use lifebind_lifecycle::{DestroyHook, LifecycleOwner};
use parking_lot::ReentrantMutex;
use tracing::{debug, trace, warn};

use crate::bound::{HeldOwners, LifecycleBoundObserver, START_VERSION};
use crate::error::LiveDataError;
use crate::observer::{Observer, ObserverId};

struct State<T> {
    value: Option<T>,
    version: i64,
    observers: BTreeMap<ObserverId, LifecycleBoundObserver<T>>,
    /// Distinguishes successive registrations of the same observer, so a
    /// stale destruction hook cannot remove a newer registration.
    next_registration: u64,
}

struct Shared<T> {
    label: Option<String>,
    state: ReentrantMutex<RefCell<State<T>>>,
}

impl<T: Clone + Send + 'static> Shared<T> {
    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or_default()
    }

    /// Remove `id` if `registration` is still the live one. Called from
    /// destruction hooks.
    fn revoke(&self, id: ObserverId, registration: u64) {
        let guard = self.state.lock();
        let removed = {
            let mut state = guard.borrow_mut();
            let live = state
                .observers
                .get(&id)
                .is_some_and(|wrapper| wrapper.registration() == registration);
            if live { state.observers.remove(&id) } else { None }
        };
        if removed.is_some() {
            debug!(label = self.label(), observer = %id, "owner destroyed, observer revoked");
        }
    }

    /// Prune destroyed observers and return the ids of the remaining ones.
    fn sweep(&self, cell: &RefCell<State<T>>) -> Vec<ObserverId> {
        let mut held = HeldOwners::new();
        let (pruned, remaining) = {
            let mut state = cell.borrow_mut();
            let destroyed: Vec<ObserverId> = state
                .observers
                .iter_mut()
                .filter_map(|(id, wrapper)| {
                    wrapper.state_holding(&mut held).is_destroyed().then_some(*id)
                })
                .collect();
            let pruned: Vec<LifecycleBoundObserver<T>> = destroyed
                .iter()
                .filter_map(|id| state.observers.remove(id))
                .collect();
            let remaining: Vec<ObserverId> = state.observers.keys().copied().collect();
            (pruned, remaining)
        };
        if !pruned.is_empty() {
            debug!(
                label = self.label(),
                pruned = pruned.len(),
                remaining = remaining.len(),
                "pruned destroyed observers"
            );
        }
        drop(pruned);
        drop(held);
        remaining
    }

    /// Deliver the current value to `id` if it is active and behind.
    fn consider_notify(&self, cell: &RefCell<State<T>>, id: ObserverId) {
        let mut held = HeldOwners::new();
        let pending = {
            let mut guard = cell.borrow_mut();
            let state = &mut *guard;
            let version = state.version;
            match state.observers.get_mut(&id) {
                Some(wrapper) => {
                    if wrapper.should_deliver(version, &mut held) {
                        wrapper.mark_delivered(version);
                        Some((wrapper.observer().clone(), state.value.clone(), version))
                    } else {
                        None
                    }
                }
                None => None,
            }
        };
        drop(held);
        if let Some((observer, value, version)) = pending {
            trace!(label = self.label(), observer = %id, version, "delivering value");
            observer.update(value.as_ref());
        }
    }

    fn dispatch_all(&self, cell: &RefCell<State<T>>) {
        for id in self.sweep(cell) {
            self.consider_notify(cell, id);
        }
    }

    fn assign(&self, cell: &RefCell<State<T>>, value: Option<T>) {
        let previous = {
            let mut state = cell.borrow_mut();
            state.version += 1;
            std::mem::replace(&mut state.value, value)
        };
        drop(previous);
        self.dispatch_all(cell);
    }
}

/// A versioned value whose observers follow their owners' lifecycles.
///
/// ```
/// use std::sync::Arc;
/// use lifebind::{Lifecycle, LiveData};
///
/// let data = LiveData::new(Some("initial"));
/// let owner = Arc::new(Lifecycle::new());
/// owner.activate();
///
/// let observer = data.observe(&owner, |value| println!("{value:?}"));
/// data.dispatch(); // prints Some("initial")
/// data.set("next"); // prints Some("next")
///
/// owner.destroy();
/// data.set("ignored"); // nothing: the subscription was revoked
/// assert!(!data.remove(&observer));
/// ```
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 per assignment, equal values
///    included.
/// 2. No two registrations share an observer identity.
/// 3. Each version is delivered to each observer at most once.
/// 4. Inactive and destroyed owners never receive deliveries.
/// 5. Forever observers stay until removed.
pub struct LiveData<T> {
    shared: Arc<Shared<T>>,
}

// Manual Clone: shares the same state.
impl<T> Clone for LiveData<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> LiveData<T> {
    /// Create a value holder with an optional initial value.
    ///
    /// The version starts at [`START_VERSION`] and nothing is subscribed.
    #[must_use]
    pub fn new(value: Option<T>) -> Self {
        Self::build(None, value)
    }

    /// Create a holder with no value.
    #[must_use]
    pub fn empty() -> Self {
        Self::build(None, None)
    }

    /// Create a holder whose log output and `Debug` carry `label`.
    #[must_use]
    pub fn with_label(label: impl Into<String>, value: Option<T>) -> Self {
        Self::build(Some(label.into()), value)
    }

    fn build(label: Option<String>, value: Option<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                label,
                state: ReentrantMutex::new(RefCell::new(State {
                    value,
                    version: START_VERSION,
                    observers: BTreeMap::new(),
                    next_registration: 0,
                })),
            }),
        }
    }

    /// Label given at construction.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.shared.label.as_deref()
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.shared.state.lock().borrow().value.clone()
    }

    /// Access the current value by reference.
    ///
    /// `f` must not call back into this `LiveData`.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        let guard = self.shared.state.lock();
        let state = guard.borrow();
        f(state.value.as_ref())
    }

    /// Assign a new value, bump the version and dispatch to all observers.
    ///
    /// Assigning a value equal to the current one still counts.
    pub fn set(&self, value: impl Into<Option<T>>) {
        let guard = self.shared.state.lock();
        self.shared.assign(&guard, value.into());
    }

    /// Modify the value through a closure. Counts as one assignment.
    ///
    /// `f` works on a copy and runs with the lock held, so concurrent
    /// assignments from other threads cannot interleave.
    pub fn update(&self, f: impl FnOnce(&mut Option<T>)) {
        let guard = self.shared.state.lock();
        let mut value = guard.borrow().value.clone();
        f(&mut value);
        self.shared.assign(&guard, value);
    }

    /// Current version. [`START_VERSION`] until the first assignment.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.shared.state.lock().borrow().version
    }

    /// Subscribe `on_update` for as long as `owner` lives.
    ///
    /// Updates arrive only while the owner is active. When the owner is
    /// destroyed the subscription is revoked. Subscribing does not deliver
    /// anything by itself; the next `set` or `dispatch` does.
    pub fn observe<O: LifecycleOwner + 'static>(
        &self,
        owner: &Arc<O>,
        on_update: impl Fn(Option<&T>) + Send + Sync + 'static,
    ) -> Observer<T> {
        let observer = Observer::new(on_update);
        let registered = self.observe_with(owner, &observer);
        debug_assert!(registered.is_ok(), "fresh observer identity collided");
        observer
    }

    /// Subscribe an existing `observer` for as long as `owner` lives.
    ///
    /// # Errors
    ///
    /// [`LiveDataError::AlreadyRegistered`] if `observer` is already
    /// subscribed here.
    pub fn observe_with<O: LifecycleOwner + 'static>(
        &self,
        owner: &Arc<O>,
        observer: &Observer<T>,
    ) -> Result<(), LiveDataError> {
        let owner: Arc<dyn LifecycleOwner> = Arc::clone(owner) as Arc<dyn LifecycleOwner>;
        self.register(Some(owner), observer)
    }

    /// Subscribe `on_update` until it is removed.
    pub fn observe_forever(
        &self,
        on_update: impl Fn(Option<&T>) + Send + Sync + 'static,
    ) -> Observer<T> {
        let observer = Observer::new(on_update);
        let registered = self.observe_forever_with(&observer);
        debug_assert!(registered.is_ok(), "fresh observer identity collided");
        observer
    }

    /// Subscribe an existing `observer` until it is removed.
    ///
    /// # Errors
    ///
    /// [`LiveDataError::AlreadyRegistered`] if `observer` is already
    /// subscribed here.
    pub fn observe_forever_with(&self, observer: &Observer<T>) -> Result<(), LiveDataError> {
        self.register(None, observer)
    }

    fn register(
        &self,
        owner: Option<Arc<dyn LifecycleOwner>>,
        observer: &Observer<T>,
    ) -> Result<(), LiveDataError> {
        let id = observer.id();
        let guard = self.shared.state.lock();
        let registration = {
            let mut state = guard.borrow_mut();
            if state.observers.contains_key(&id) {
                warn!(label = self.shared.label(), observer = %id, "observer registered twice");
                return Err(LiveDataError::AlreadyRegistered(id));
            }
            state.next_registration += 1;
            let registration = state.next_registration;
            let wrapper =
                LifecycleBoundObserver::with_owner(observer.clone(), owner.as_ref().map(Arc::downgrade))
                    .with_registration(registration);
            state.observers.insert(id, wrapper);
            registration
        };
        trace!(
            label = self.shared.label(),
            observer = %id,
            bound = owner.is_some(),
            "observer registered"
        );
        if let Some(owner) = owner {
            owner.on_destroy(self.removal_hook(id, registration));
        }
        Ok(())
    }

    fn removal_hook(&self, id: ObserverId, registration: u64) -> DestroyHook {
        let shared: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        Box::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.revoke(id, registration);
            }
        })
    }

    /// Unsubscribe `observer`. Returns `false` if it was not subscribed.
    pub fn remove(&self, observer: &Observer<T>) -> bool {
        let guard = self.shared.state.lock();
        let removed = guard.borrow_mut().observers.remove(&observer.id());
        let found = removed.is_some();
        drop(removed);
        if found {
            trace!(label = self.shared.label(), observer = %observer.id(), "observer removed");
        }
        found
    }

    /// Whether `observer` is currently subscribed.
    ///
    /// Destroyed observers not yet pruned still count.
    #[must_use]
    pub fn contains(&self, observer: &Observer<T>) -> bool {
        self.shared
            .state
            .lock()
            .borrow()
            .observers
            .contains_key(&observer.id())
    }

    /// Number of subscribed observers, including destroyed ones not yet
    /// pruned.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.shared.state.lock().borrow().observers.len()
    }

    /// Whether anything is subscribed.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        self.observer_count() > 0
    }

    /// Whether any subscribed observer would currently receive updates.
    #[must_use]
    pub fn has_active_observers(&self) -> bool {
        let guard = self.shared.state.lock();
        let mut held = HeldOwners::new();
        let active = guard
            .borrow_mut()
            .observers
            .values_mut()
            .any(|wrapper| wrapper.state_holding(&mut held).is_active());
        drop(held);
        active
    }

    /// Deliver the current value to every eligible observer.
    ///
    /// Observers that already saw the current version are skipped, so
    /// repeated calls without an assignment deliver nothing new.
    pub fn dispatch(&self) {
        let guard = self.shared.state.lock();
        self.shared.dispatch_all(&guard);
    }

    /// Deliver the current value to `initiator` only, if it is eligible.
    ///
    /// # Errors
    ///
    /// [`LiveDataError::UnknownInitiator`] if `initiator` is not subscribed
    /// (after pruning destroyed observers).
    pub fn dispatch_to(&self, initiator: &Observer<T>) -> Result<(), LiveDataError> {
        let id = initiator.id();
        let guard = self.shared.state.lock();
        let remaining = self.shared.sweep(&guard);
        if !remaining.contains(&id) {
            warn!(label = self.shared.label(), observer = %id, "dispatch to unregistered initiator");
            return Err(LiveDataError::UnknownInitiator(id));
        }
        self.shared.consider_notify(&guard, id);
        Ok(())
    }
}

impl<T: Clone + Send + 'static> Default for LiveData<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: fmt::Debug> fmt::Debug for LiveData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.shared.state.lock();
        let mut debug = f.debug_struct("LiveData");
        if let Some(label) = &self.shared.label {
            debug.field("label", label);
        }
        let result = match guard.try_borrow() {
            Ok(state) => debug
                .field("value", &state.value)
                .field("version", &state.version)
                .field("observer_count", &state.observers.len())
                .finish(),
            Err(_) => debug.finish_non_exhaustive(),
        };
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
