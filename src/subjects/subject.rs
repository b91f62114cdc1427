use std::{
    collections::VecDeque,
    error::Error,
    sync::{Arc, Mutex},
};

use crate::{
    lock,
    observer::Observer,
    subscribe::Unsubscribeable,
    subscription::subscribe::{
        Subscribeable, Subscriber, Subscription, SubscriptionHandle, UnsubscribeLogic,
    },
    Observable,
};

/// Specifies the buffer size for replaying previous emissions in a subject
/// created with [`Subject::replay`].
///
/// [`Subject::replay`]: struct.Subject.html#method.replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufSize {
    /// Specifies an infinite buffer size, allowing all emitted values to be replayed.
    Unbounded,

    /// Specifies a limited buffer size with the maximum number of values to be replayed.
    Bounded(usize),
}

// What a subject remembers for observers that register later.
enum History<T> {
    Nothing,
    Latest(T),
    Buffer(BufSize, VecDeque<T>),
}

impl<T: Clone> History<T> {
    fn record(&mut self, v: &T) {
        match self {
            History::Nothing => (),
            History::Latest(latest) => *latest = v.clone(),
            History::Buffer(BufSize::Unbounded, values) => values.push_back(v.clone()),
            History::Buffer(BufSize::Bounded(size), values) => {
                if *size == 0 {
                    return;
                }
                if values.len() == *size {
                    values.pop_front();
                }
                values.push_back(v.clone());
            }
        }
    }
}

/// A `Subject` multicasts values to every registered `Observer`.
///
/// Unlike regular `Observables`, which are unicast (each subscribed `Observer` has
/// its independent execution of the `Observable`), `Subjects` are multicast. What a
/// late observer sees depends on how the subject was created:
///
/// * [`emitter_receiver`]: nothing. Values emitted while no observer is
///   registered are lost.
/// * [`behavior`]: the latest value (initially the seed) right away.
/// * [`replay`]: the buffered values in emission order, even after the subject
///   has completed or errored, followed by that terminal notification.
///
/// After `complete` or `error` the subject stops emitting, and new observers only
/// receive the terminal notification (after the replay, for replay subjects).
///
/// Emitters may be cloned and used from several threads. Notifications are
/// delivered one at a time in the order they were emitted: a `next` issued while
/// another one is being delivered, also from inside an observer, is queued and
/// delivered right after it.
///
/// Each constructor returns a [`SubjectEmitter`] for emitting values and a
/// [`SubjectReceiver`] for subscribing to emitted values.
///
/// [`emitter_receiver`]: struct.Subject.html#method.emitter_receiver
/// [`behavior`]: struct.Subject.html#method.behavior
/// [`replay`]: struct.Subject.html#method.replay
/// [`SubjectEmitter`]: struct.SubjectEmitter.html
/// [`SubjectReceiver`]: struct.SubjectReceiver.html
///
/// # Examples
///
///```no_run
/// use rxsearch::{subjects::BufSize, subscribe::Subscriber};
/// use rxsearch::{Observer, Subject, Subscribeable};
///
/// let (mut emitter, mut receiver) = Subject::replay(BufSize::Unbounded);
///
/// emitter.next(10000);
/// emitter.next(25000);
///
/// // Receives 10000 and 25000 right away.
/// receiver.subscribe(Subscriber::on_next(|v| println!("Replay1 {}", v)));
///
/// emitter.next(36000);
///
/// // Receives 10000, 25000 and 36000.
/// receiver.subscribe(Subscriber::on_next(|v| println!("Replay2 {}", v)));
///```
pub struct Subject<T> {
    observers: Vec<(u64, Subscriber<T>)>,
    // Keys unsubscribed while their observer was out of `observers` for an emission.
    detached: Vec<u64>,
    // Notifications waiting for the caller that currently drives delivery.
    queue: VecDeque<Notification<T>>,
    emitting: bool,
    // A terminal notification is queued; later ones are ignored.
    stopping: bool,
    next_key: u64,
    history: History<T>,
    completed: bool,
    closed: bool,
    error: Option<Arc<dyn Error + Send + Sync>>,
}

enum Notification<T> {
    Next(T),
    Error(Arc<dyn Error + Send + Sync>),
    Complete,
}

impl<T: Clone + Send + 'static> Subject<T> {
    fn with_history(history: History<T>) -> (SubjectEmitter<T>, SubjectReceiver<T>) {
        let s = Arc::new(Mutex::new(Subject {
            observers: Vec::with_capacity(16),
            detached: Vec::new(),
            queue: VecDeque::new(),
            emitting: false,
            stopping: false,
            next_key: 0,
            history,
            completed: false,
            closed: false,
            error: None,
        }));

        (
            SubjectEmitter(Arc::clone(&s)),
            SubjectReceiver(Arc::clone(&s)),
        )
    }

    /// Creates a plain subject that keeps no history.
    pub fn emitter_receiver() -> (SubjectEmitter<T>, SubjectReceiver<T>) {
        Self::with_history(History::Nothing)
    }

    /// Creates a subject that remembers the latest value, seeded with `initial`,
    /// and emits it to every observer upon registration.
    pub fn behavior(initial: T) -> (SubjectEmitter<T>, SubjectReceiver<T>) {
        Self::with_history(History::Latest(initial))
    }

    /// Creates a subject that replays up to `buf_size` previous values to every
    /// observer upon registration.
    pub fn replay(buf_size: BufSize) -> (SubjectEmitter<T>, SubjectReceiver<T>) {
        let values = match buf_size {
            BufSize::Unbounded => VecDeque::with_capacity(16),
            BufSize::Bounded(size) => VecDeque::with_capacity(size),
        };
        Self::with_history(History::Buffer(buf_size, values))
    }
}

impl<T> Subject<T> {
    fn detach(&mut self, key: u64) {
        let before = self.observers.len();
        self.observers.retain(|(k, _)| *k != key);
        if self.observers.len() == before && self.emitting {
            self.detached.push(key);
        }
    }
}

// Observers handed out for one notification, so callbacks run without the
// subject locked. Dropping it puts them back, also when a callback panics.
struct Emission<'a, T> {
    subject: &'a Mutex<Subject<T>>,
    observers: Vec<(u64, Subscriber<T>)>,
}

impl<T> Drop for Emission<'_, T> {
    fn drop(&mut self) {
        let mut observers = std::mem::take(&mut self.observers);
        let mut src = lock(self.subject);
        let detached = std::mem::take(&mut src.detached);

        if std::thread::panicking() {
            src.emitting = false;
        }
        // Terminated observers are dropped.
        if src.closed || src.completed {
            return;
        }
        observers.retain(|(k, _)| !detached.contains(k));
        // Observers registered during the emission go after the existing ones.
        let added = std::mem::replace(&mut src.observers, observers);
        src.observers.extend(added);
    }
}

/// Subscription handler for `Subject`.
///
/// `SubjectReceiver` acts as an `Observable`, allowing you to utilize its
/// `subscribe` method for receiving emissions from the `Subject`'s multicasting.
/// You can also employ its `unsubscribe` method to close the `Subject` and
/// remove registered observers.
#[derive(Clone)]
pub struct SubjectReceiver<T>(Arc<Mutex<Subject<T>>>);

/// Multicasting emitter for `Subject`.
///
/// `SubjectEmitter` acts as an `Observer`, allowing you to utilize its `next`,
/// `error`, and `complete` methods for multicasting emissions to all registered
/// observers within the `Subject`.
#[derive(Clone)]
pub struct SubjectEmitter<T>(Arc<Mutex<Subject<T>>>);

impl<T> SubjectReceiver<T> {
    /// Returns the number of registered observers.
    pub fn len(&self) -> usize {
        lock(&self.0).observers.len()
    }

    /// Returns `true` if no observers are registered, `false` otherwise.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once the subject has been closed with `unsubscribe`.
    pub fn is_closed(&self) -> bool {
        lock(&self.0).closed
    }
}

impl<T: Clone + Send + 'static> Subscribeable for SubjectReceiver<T> {
    type ObsType = T;

    fn subscribe(&mut self, mut v: Subscriber<Self::ObsType>) -> Subscription {
        let mut src = lock(&self.0);

        // When closed Subject does not emit nor subscribes.
        if src.closed {
            return Subscription::new(UnsubscribeLogic::Nil, SubscriptionHandle::Nil);
        }

        match &src.history {
            History::Nothing => (),
            // A completed behavior subject has nothing current to hand out.
            History::Latest(latest) => {
                if !src.completed {
                    v.next(latest.clone());
                }
            }
            // Replayed even if the subject completed or errored.
            History::Buffer(_, values) => {
                for value in values {
                    v.next(value.clone());
                }
            }
        }

        if src.completed {
            match &src.error {
                Some(err) => v.error(Arc::clone(err)),
                None => v.complete(),
            }
            return Subscription::new(UnsubscribeLogic::Nil, SubscriptionHandle::Nil);
        }

        let key = src.next_key;
        src.next_key += 1;
        src.observers.push((key, v));
        drop(src);

        let source_cloned = Arc::clone(&self.0);

        Subscription::new(
            UnsubscribeLogic::Logic(Box::new(move || {
                lock(&source_cloned).detach(key);
            })),
            SubscriptionHandle::Nil,
        )
    }
}

impl<T> Unsubscribeable for SubjectReceiver<T> {
    fn unsubscribe(self) {
        let mut r = lock(&self.0);
        r.closed = true;
        r.observers.clear();
    }
}

impl<T: Clone> SubjectEmitter<T> {
    // Queues `n`. The caller that finds no emission running delivers the queue
    // in order, including notifications other callers add meanwhile.
    fn emit(&self, n: Notification<T>) {
        {
            let mut src = lock(&self.0);
            if src.stopping || src.closed {
                return;
            }
            if !matches!(n, Notification::Next(_)) {
                src.stopping = true;
            }
            src.queue.push_back(n);
            if src.emitting {
                return;
            }
            src.emitting = true;
        }
        self.drain();
    }

    fn drain(&self) {
        loop {
            let (n, observers) = {
                let mut src = lock(&self.0);
                let Some(n) = src.queue.pop_front() else {
                    src.emitting = false;
                    return;
                };
                if src.closed {
                    src.queue.clear();
                    src.emitting = false;
                    return;
                }
                match &n {
                    Notification::Next(v) => src.history.record(v),
                    Notification::Error(e) => {
                        src.completed = true;
                        src.error = Some(Arc::clone(e));
                    }
                    Notification::Complete => src.completed = true,
                }
                (n, std::mem::take(&mut src.observers))
            };

            let mut emission = Emission {
                subject: &self.0,
                observers,
            };
            for (_, o) in &mut emission.observers {
                match &n {
                    Notification::Next(v) => o.next(v.clone()),
                    Notification::Error(e) => o.error(Arc::clone(e)),
                    Notification::Complete => o.complete(),
                }
            }
        }
    }
}

impl<T: Clone> Observer for SubjectEmitter<T> {
    type NextFnType = T;

    fn next(&mut self, v: Self::NextFnType) {
        self.emit(Notification::Next(v));
    }

    fn error(&mut self, e: Arc<dyn Error + Send + Sync>) {
        self.emit(Notification::Error(e));
    }

    fn complete(&mut self) {
        self.emit(Notification::Complete);
    }
}

impl<T: Clone + Send + 'static> From<SubjectEmitter<T>> for Subscriber<T> {
    fn from(mut value: SubjectEmitter<T>) -> Self {
        let mut vn = value.clone();
        let mut ve = value.clone();
        Subscriber::new(
            move |v| {
                vn.next(v);
            },
            move |e| ve.error(e),
            move || value.complete(),
        )
    }
}

impl<T: Clone + Send + 'static> From<SubjectReceiver<T>> for Observable<T> {
    fn from(mut value: SubjectReceiver<T>) -> Self {
        Observable::new(move |subscriber| value.subscribe(subscriber))
    }
}
