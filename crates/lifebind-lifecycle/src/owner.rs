#![forbid(unsafe_code)]

//! Owner state and the owner trait.

use std::fmt;

/// A one-shot callback run when an owner is destroyed.
pub type DestroyHook = Box<dyn FnOnce() + Send + 'static>;

/// Delivery-relevant lifecycle state of an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// The owner wants updates.
    Active,
    /// The owner is alive but should not receive updates right now.
    Inactive,
    /// The owner is gone. Terminal.
    Destroyed,
}

impl LifecycleState {
    /// Whether updates may be delivered in this state.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether this is the terminal state.
    #[must_use]
    pub const fn is_destroyed(self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Destroyed => "destroyed",
        })
    }
}

/// Something with a lifecycle that subscriptions can be bound to.
///
/// # Contract
///
/// - [`lifecycle_state`](Self::lifecycle_state) is cheap and may be called
///   on every dispatch.
/// - A hook passed to [`on_destroy`](Self::on_destroy) fires exactly once,
///   at or after destruction. If the owner is already destroyed the hook
///   fires immediately, on the calling thread.
/// - Holding a registered hook must not keep the owner alive. Hooks usually
///   capture only weak references.
pub trait LifecycleOwner: Send + Sync {
    /// Current lifecycle state.
    fn lifecycle_state(&self) -> LifecycleState;

    /// Register a hook to run when this owner is destroyed.
    fn on_destroy(&self, hook: DestroyHook);
}
