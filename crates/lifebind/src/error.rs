#![forbid(unsafe_code)]

//! Contract-violation errors.
//!
//! Both variants signal a bug in the caller rather than an expected runtime
//! condition. They are returned instead of panicking so the caller decides
//! whether to propagate, log, or abort.

use std::fmt;

use crate::observer::ObserverId;

/// Errors from [`LiveData`](crate::LiveData) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveDataError {
    /// The observer is already subscribed to this value.
    AlreadyRegistered(ObserverId),
    /// `dispatch_to` named an observer that is not subscribed.
    UnknownInitiator(ObserverId),
}

impl LiveDataError {
    /// The observer the error is about.
    #[must_use]
    pub fn observer(&self) -> ObserverId {
        match self {
            Self::AlreadyRegistered(id) | Self::UnknownInitiator(id) => *id,
        }
    }
}

impl fmt::Display for LiveDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered(id) => write!(f, "{id} is already registered"),
            Self::UnknownInitiator(id) => {
                write!(f, "initiator {id} is not registered for observation")
            }
        }
    }
}

impl std::error::Error for LiveDataError {}
