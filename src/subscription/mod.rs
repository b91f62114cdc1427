//! Provides structures and traits related to subscription management.
//!
//! This module includes `Subscriber` for handling observed values, errors and
//! completions, and `Subscription` for tearing down what a `subscribe` call
//! started: timers, in-flight lookups, registrations in a `Subject`.
pub mod subscribe;
