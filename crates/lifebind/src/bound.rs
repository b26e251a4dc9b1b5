#![forbid(unsafe_code)]

//! Observers bound to an optional lifecycle owner.
//!
//! A [`LifecycleBoundObserver`] pairs an [`Observer`] with a *weak*
//! reference to its owner and remembers the last version delivered to it.
//! The owner is never kept alive by the binding.
//!
//! # State derivation
//!
//! | Owner | Reported state | Effective state |
//! |-------|----------------|-----------------|
//! | none (forever) | - | `Active` |
//! | alive | `Active` | `Active` |
//! | alive | `Inactive` | `Inactive` |
//! | alive | `Destroyed` | `Destroyed` (latched) |
//! | dropped | - | `Destroyed` (latched) |
//!
//! Once `Destroyed` has been observed it sticks, because a cleared weak
//! reference can never resolve again.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use lifebind_lifecycle::{LifecycleOwner, LifecycleState};

use crate::observer::{Observer, ObserverId};

/// Version the value starts at before its first assignment.
pub const START_VERSION: i64 = -1;

/// Version an observer has seen before any delivery. Below
/// [`START_VERSION`], so the first dispatch always qualifies.
pub const NEVER_DELIVERED: i64 = START_VERSION - 1;

/// Owners upgraded while resolving states.
///
/// Dropping the last handle of an owner may run its destruction hooks, which
/// re-enter the observable. Callers drop this only after releasing their
/// interior borrow.
pub(crate) type HeldOwners = Vec<Arc<dyn LifecycleOwner>>;

/// An [`Observer`] bound to an optional owner.
pub struct LifecycleBoundObserver<T> {
    observer: Observer<T>,
    owner: Option<Weak<dyn LifecycleOwner>>,
    last_version: i64,
    destroyed: bool,
    registration: u64,
}

impl<T> LifecycleBoundObserver<T> {
    /// Bind `observer` to `owner`.
    pub fn bound<O: LifecycleOwner + 'static>(observer: Observer<T>, owner: &Arc<O>) -> Self {
        let owner: Arc<dyn LifecycleOwner> = Arc::clone(owner) as Arc<dyn LifecycleOwner>;
        Self::with_owner(observer, Some(Arc::downgrade(&owner)))
    }

    /// An observer with no owner. Always active.
    pub fn forever(observer: Observer<T>) -> Self {
        Self::with_owner(observer, None)
    }

    pub(crate) fn with_owner(observer: Observer<T>, owner: Option<Weak<dyn LifecycleOwner>>) -> Self {
        Self {
            observer,
            owner,
            last_version: NEVER_DELIVERED,
            destroyed: false,
            registration: 0,
        }
    }

    pub(crate) fn with_registration(mut self, registration: u64) -> Self {
        self.registration = registration;
        self
    }

    pub(crate) fn registration(&self) -> u64 {
        self.registration
    }

    /// The wrapped observer.
    #[must_use]
    pub fn observer(&self) -> &Observer<T> {
        &self.observer
    }

    /// Identity of the wrapped observer.
    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.observer.id()
    }

    /// Whether this binding was created with an owner.
    #[must_use]
    pub fn has_owner(&self) -> bool {
        self.owner.is_some()
    }

    /// Last version delivered, or [`NEVER_DELIVERED`].
    #[must_use]
    pub fn last_version(&self) -> i64 {
        self.last_version
    }

    /// Effective delivery state, queried from the owner.
    pub fn state(&mut self) -> LifecycleState {
        let mut held = HeldOwners::new();
        self.state_holding(&mut held)
    }

    /// Like [`state`](Self::state), but parks the upgraded owner in `held`
    /// instead of dropping it here.
    pub(crate) fn state_holding(&mut self, held: &mut HeldOwners) -> LifecycleState {
        if self.destroyed {
            return LifecycleState::Destroyed;
        }
        let Some(weak) = &self.owner else {
            return LifecycleState::Active;
        };
        let state = match weak.upgrade() {
            Some(owner) => {
                let state = owner.lifecycle_state();
                held.push(owner);
                state
            }
            None => LifecycleState::Destroyed,
        };
        if state.is_destroyed() {
            self.destroyed = true;
        }
        state
    }

    /// Active and behind `version`.
    pub(crate) fn should_deliver(&mut self, version: i64, held: &mut HeldOwners) -> bool {
        self.state_holding(held).is_active() && self.last_version < version
    }

    pub(crate) fn mark_delivered(&mut self, version: i64) {
        self.last_version = version;
    }
}

impl<T> PartialEq for LifecycleBoundObserver<T> {
    fn eq(&self, other: &Self) -> bool {
        self.observer == other.observer
    }
}

impl<T> Eq for LifecycleBoundObserver<T> {}

impl<T> Hash for LifecycleBoundObserver<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.observer.hash(state);
    }
}

impl<T> fmt::Debug for LifecycleBoundObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleBoundObserver")
            .field("id", &self.observer.id())
            .field("has_owner", &self.owner.is_some())
            .field("last_version", &self.last_version)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
