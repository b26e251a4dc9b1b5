#![forbid(unsafe_code)]

//! Lifecycle-aware observable values.
//!
//! # Role in lifebind
//! `lifebind` is the dispatch engine. A [`LiveData<T>`] holds a value and a
//! version counter; subscribers are [`Observer`]s, optionally bound to a
//! [`LifecycleOwner`]. Updates reach an observer only while its owner is
//! active, each assignment reaches it at most once, and the subscription is
//! revoked as soon as the owner is destroyed.
//!
//! # Primary responsibilities
//! - **Observer**: identity-bearing callback, the unit of subscription.
//! - **LifecycleBoundObserver**: owner binding plus last-delivered version.
//! - **LiveData**: value, version, observer set, reentrant locking, dispatch.
//!
//! # How it fits in the system
//! Owners come from `lifebind-lifecycle` (re-exported here). Any type that
//! implements [`LifecycleOwner`] can own subscriptions; [`Lifecycle`] is a
//! ready-made one.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use lifebind::{Lifecycle, LiveData};
//!
//! let data = LiveData::new(None);
//! let owner = Arc::new(Lifecycle::new());
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! data.observe(&owner, move |value: Option<&i32>| sink.lock().unwrap().push(value.copied()));
//!
//! data.set(1); // owner inactive: nothing
//! owner.activate();
//! data.dispatch(); // catches up with 1
//! owner.destroy();
//! data.set(2); // revoked: nothing
//!
//! assert_eq!(*seen.lock().unwrap(), vec![Some(1)]);
//! ```

pub mod bound;
pub mod error;
pub mod live_data;
pub mod observer;

pub use bound::{LifecycleBoundObserver, NEVER_DELIVERED, START_VERSION};
pub use error::LiveDataError;
pub use live_data::LiveData;
pub use observer::{Observer, ObserverId};

pub use lifebind_lifecycle as lifecycle;
pub use lifebind_lifecycle::{DestroyHook, Lifecycle, LifecycleOwner, LifecycleState};
