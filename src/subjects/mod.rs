//! The `subjects` module provides multicasting streams. A subject is both an
//! observer and an observable: values pushed into it reach every registered
//! observer.
//!
//! Subjects are split into emitter and receiver. The [`SubjectEmitter`] behaves
//! as an `Observer`, enabling `next()`, `error()` and `complete()` calls, and can
//! be passed to the `subscribe` method of another `Observable`. The
//! [`SubjectReceiver`] functions as an `Observable`, enabling `subscribe` and
//! `unsubscribe` and every operator.
//!
//! Three flavors differ only in what they replay to late observers: nothing
//! ([`Subject::emitter_receiver`]), the latest value ([`Subject::behavior`]), or a
//! bounded or unbounded history ([`Subject::replay`]).

mod subject;

pub use subject::*;
