use std::{error::Error, sync::Arc};

use tokio::task::{JoinError, JoinHandle};
use tracing::warn;

use crate::observer::Observer;

/// A trait for types that can be subscribed to, allowing consumers to receive
/// values emitted by an observable stream.
pub trait Subscribeable {
    /// The type of items emitted by the observable stream.
    type ObsType;

    /// Subscribes to the observable stream and specifies how to handle emitted values.
    ///
    /// The `Subscriber` parameter defines the behavior for processing values emitted
    /// by the observable stream. The returned `Subscription` allows the caller to
    /// stop the stream and release whatever the subscription started.
    fn subscribe(&mut self, s: Subscriber<Self::ObsType>) -> Subscription;
}

/// A trait for types that can be unsubscribed, allowing the clean release of resources
/// associated with a subscription.
pub trait Unsubscribeable {
    /// Unsubscribes and releases associated resources: pending timers are
    /// aborted, in-flight work is cancelled, registrations are removed.
    ///
    /// The instance is consumed, so the teardown logic runs at most once.
    fn unsubscribe(self);
}

type NextFn<T> = Box<dyn FnMut(T) + Send>;
type CompleteFn = Box<dyn FnMut() + Send>;
type ErrorFn = Box<dyn FnMut(Arc<dyn Error + Send + Sync>) + Send>;

/// A type that acts as an observer, allowing users to handle emitted values, errors,
/// and completion when subscribing to an `Observable` or `Subject`.
///
/// Once `error` or `complete` has been delivered the subscriber is stopped and
/// ignores every later notification.
pub struct Subscriber<NextFnType> {
    next_fn: NextFn<NextFnType>,
    complete_fn: Option<CompleteFn>,
    error_fn: Option<ErrorFn>,
    stopped: bool,
}

impl<NextFnType> Subscriber<NextFnType> {
    /// Creates a new `Subscriber` instance with custom handling functions for emitted
    /// values, errors, and completion.
    pub fn new(
        next_fn: impl FnMut(NextFnType) + 'static + Send,
        error_fn: impl FnMut(Arc<dyn Error + Send + Sync>) + 'static + Send,
        complete_fn: impl FnMut() + 'static + Send,
    ) -> Self {
        Subscriber {
            next_fn: Box::new(next_fn),
            complete_fn: Some(Box::new(complete_fn)),
            error_fn: Some(Box::new(error_fn)),
            stopped: false,
        }
    }

    /// Create a new Subscriber with the provided `next` function.
    ///
    /// Errors reaching a subscriber without an error function are logged and
    /// otherwise dropped.
    pub fn on_next(next_fn: impl FnMut(NextFnType) + 'static + Send) -> Self {
        Subscriber {
            next_fn: Box::new(next_fn),
            complete_fn: None,
            error_fn: None,
            stopped: false,
        }
    }

    /// Set the completion function for the Subscriber.
    pub fn on_complete(&mut self, complete_fn: impl FnMut() + 'static + Send) {
        self.complete_fn = Some(Box::new(complete_fn));
    }

    /// Set the error-handling function for the Subscriber.
    pub fn on_error(&mut self, error_fn: impl FnMut(Arc<dyn Error + Send + Sync>) + 'static + Send) {
        self.error_fn = Some(Box::new(error_fn));
    }

    /// Returns `true` once the subscriber has received `error` or `complete`.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl<T> Observer for Subscriber<T> {
    type NextFnType = T;

    fn next(&mut self, v: Self::NextFnType) {
        if self.stopped {
            return;
        }
        (self.next_fn)(v);
    }

    fn complete(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(cfn) = &mut self.complete_fn {
            (cfn)();
        }
    }

    fn error(&mut self, observable_error: Arc<dyn Error + Send + Sync>) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        match &mut self.error_fn {
            Some(efn) => (efn)(observable_error),
            None => warn!(error = %observable_error, "unhandled observable error"),
        }
    }
}

/// Enumeration representing different types of handles used by `Subscription` to
/// await the work an observable started.
pub enum SubscriptionHandle {
    /// No specific handle for task awaiting.
    Nil,

    /// Holds a join handle for awaiting an asynchronous observable using Tokio task.
    JoinTask(JoinHandle<()>),
}

/// Enumerates various unsubscribe logic options for a subscription.
pub enum UnsubscribeLogic {
    /// No specific unsubscribe logic.
    Nil,

    /// If one subscription depends on another. Wrapped subscription's unsubscribe
    /// will be called upon unsubscribing.
    Wrapped(Box<Subscription>),

    /// Unsubscribe logic defined by a function.
    Logic(Box<dyn FnOnce() + Send>),
}

impl UnsubscribeLogic {
    fn unsubscribe(self) {
        match self {
            UnsubscribeLogic::Nil => (),
            UnsubscribeLogic::Logic(fnc) => fnc(),
            UnsubscribeLogic::Wrapped(subscription) => subscription.unsubscribe(),
        }
    }
}

/// Represents a subscription to an observable or a subject, allowing control over
/// the subscription.
///
/// When an observable or subject is subscribed to, it returns a `Subscription`.
/// Dropping it leaves the stream running; call `unsubscribe` to stop it, or
/// `join_concurrent` to wait for an asynchronous observable to finish.
pub struct Subscription {
    pub(crate) unsubscribe_logic: UnsubscribeLogic,
    pub(crate) subscription_handle: SubscriptionHandle,
}

impl Subscription {
    /// Creates a new Subscription instance with the specified unsubscribe logic and
    /// subscription handle.
    ///
    /// See [`UnsubscribeLogic`] and [`SubscriptionHandle`] for the available
    /// variants.
    ///
    /// [`UnsubscribeLogic`]: enum.UnsubscribeLogic.html
    /// [`SubscriptionHandle`]: enum.SubscriptionHandle.html
    #[must_use]
    pub fn new(
        unsubscribe_logic: UnsubscribeLogic,
        subscription_handle: SubscriptionHandle,
    ) -> Self {
        Subscription {
            unsubscribe_logic,
            subscription_handle,
        }
    }

    /// Moves the join handle out, leaving `SubscriptionHandle::Nil` behind.
    /// Operators wrapping an upstream subscription use this to stay awaitable.
    pub(crate) fn take_handle(&mut self) -> SubscriptionHandle {
        std::mem::replace(&mut self.subscription_handle, SubscriptionHandle::Nil)
    }

    /// Awaits the completion of the Tokio task associated with this subscription.
    ///
    /// Returns immediately if the observable did not start a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task panicked or was aborted.
    pub async fn join_concurrent(self) -> Result<(), JoinError> {
        match self.subscription_handle {
            SubscriptionHandle::JoinTask(task_handle) => task_handle.await,
            SubscriptionHandle::Nil => Ok(()),
        }
    }
}

impl Unsubscribeable for Subscription {
    fn unsubscribe(self) {
        self.unsubscribe_logic.unsubscribe();
    }
}
