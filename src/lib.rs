//! `rxsearch` is a small reactive-extensions library and, built on top of it, a
//! debounced search pipeline.
//!
//! The reactive part mirrors the usual Rx vocabulary: cold [`Observable`]s,
//! [`Subscriber`]s that receive `next`, `error` and `complete`, [`Subscription`]s
//! that tear down what a `subscribe` call started, multicasting [`Subject`]s with a
//! configurable history, and operators on [`ObservableExt`].
//!
//! The [`search`] module composes those into the classic typeahead chain:
//!
//! ```text
//! keystrokes -> Subject -> debounce -> distinct_until_changed -> switch_map(lookup) -> consumer
//! ```
//!
//! [`Subscriber`]: subscribe::Subscriber
//! [`Subscription`]: subscribe::Subscription
//! [`search`]: crate::search

mod observable;
mod observer;
pub mod search;
pub mod subjects;
mod subscription;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use observable::*;
pub use observer::Observer;
pub use subjects::Subject;
pub use subscription::*;
pub use subscription::subscribe::{Subscribeable, Unsubscribeable};

// Locks `mutex`, recovering the guard if a callback panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
