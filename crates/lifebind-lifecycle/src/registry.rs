#![forbid(unsafe_code)]

//! A concrete [`LifecycleOwner`] with explicit transitions.
//!
//! # Design
//!
//! [`Lifecycle`] keeps its state and pending destruction hooks behind a
//! `parking_lot::Mutex`. Hooks are moved out of the lock before they run, so
//! a hook may freely query this lifecycle or register further hooks (which
//! then fire immediately, since the state is already `Destroyed`).
//!
//! # Invariants
//!
//! 1. `Destroyed` is terminal: no transition leaves it.
//! 2. Every registered hook fires exactly once.
//! 3. Hooks fire in registration order.
//! 4. Dropping a `Lifecycle` that was never destroyed still fires its hooks.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Transition after destroy | `set_state` on a destroyed owner | Refused, returns `false`, logged at warn |
//! | Repeated destroy | `destroy()` called twice | Second call is a no-op returning `false` |
//! | Panicking hook | Hook panics during `destroy()` | Panic propagates; later hooks are dropped unrun |

use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::owner::{DestroyHook, LifecycleOwner, LifecycleState};

struct LifecycleInner {
    state: LifecycleState,
    hooks: Vec<DestroyHook>,
}

/// An owner whose state is driven by explicit calls.
///
/// Share it as `Arc<Lifecycle>` so observables can hold weak references.
pub struct Lifecycle {
    inner: Mutex<LifecycleInner>,
}

impl Lifecycle {
    /// Create an `Inactive` lifecycle.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(LifecycleState::Inactive)
    }

    /// Create a lifecycle in the given state.
    ///
    /// Starting in `Destroyed` is allowed; hooks registered on such an owner
    /// fire immediately.
    #[must_use]
    pub fn with_state(state: LifecycleState) -> Self {
        Self {
            inner: Mutex::new(LifecycleInner {
                state,
                hooks: Vec::new(),
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Move to `state`. Returns `false` if the lifecycle is already destroyed.
    ///
    /// Moving to `Destroyed` is equivalent to [`destroy`](Self::destroy).
    pub fn set_state(&self, state: LifecycleState) -> bool {
        if state == LifecycleState::Destroyed {
            return self.destroy();
        }
        let mut inner = self.inner.lock();
        if inner.state.is_destroyed() {
            warn!(requested = %state, "ignoring transition of a destroyed lifecycle");
            return false;
        }
        trace!(from = %inner.state, to = %state, "lifecycle transition");
        inner.state = state;
        true
    }

    /// Shorthand for `set_state(LifecycleState::Active)`.
    pub fn activate(&self) -> bool {
        self.set_state(LifecycleState::Active)
    }

    /// Shorthand for `set_state(LifecycleState::Inactive)`.
    pub fn deactivate(&self) -> bool {
        self.set_state(LifecycleState::Inactive)
    }

    /// Move to `Destroyed` and fire all pending hooks.
    ///
    /// Returns `false` if the lifecycle was already destroyed.
    pub fn destroy(&self) -> bool {
        let hooks = {
            let mut inner = self.inner.lock();
            if inner.state.is_destroyed() {
                return false;
            }
            inner.state = LifecycleState::Destroyed;
            std::mem::take(&mut inner.hooks)
        };
        debug!(hooks = hooks.len(), "lifecycle destroyed");
        for hook in hooks {
            hook();
        }
        true
    }

    /// Number of hooks waiting for destruction.
    #[must_use]
    pub fn pending_hooks(&self) -> usize {
        self.inner.lock().hooks.len()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleOwner for Lifecycle {
    fn lifecycle_state(&self) -> LifecycleState {
        self.state()
    }

    fn on_destroy(&self, hook: DestroyHook) {
        let mut inner = self.inner.lock();
        if inner.state.is_destroyed() {
            drop(inner);
            hook();
            return;
        }
        inner.hooks.push(hook);
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.state = LifecycleState::Destroyed;
        let hooks = std::mem::take(&mut inner.hooks);
        if !hooks.is_empty() {
            debug!(hooks = hooks.len(), "lifecycle dropped with pending hooks");
        }
        for hook in hooks {
            hook();
        }
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Lifecycle")
            .field("state", &inner.state)
            .field("pending_hooks", &inner.hooks.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
