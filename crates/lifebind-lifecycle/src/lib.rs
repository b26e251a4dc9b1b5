#![forbid(unsafe_code)]

//! Lifecycle owners for lifebind.
//!
//! # Role in lifebind
//! `lifebind-lifecycle` defines what an *owner* is: something with a
//! queryable [`LifecycleState`] that can tell interested parties when it has
//! been destroyed. The observable engine (`lifebind`) only talks to owners
//! through the [`LifecycleOwner`] trait, so any component framework can plug
//! in its own lifecycle.
//!
//! # Primary responsibilities
//! - **LifecycleState**: the three delivery-relevant states.
//! - **LifecycleOwner**: state query plus one-shot destruction hooks.
//! - **Lifecycle**: a ready-made owner with explicit transitions that also
//!   fires its hooks when dropped.

pub mod owner;
pub mod registry;

pub use owner::{DestroyHook, LifecycleOwner, LifecycleState};
pub use registry::Lifecycle;
