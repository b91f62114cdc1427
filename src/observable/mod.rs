//! The `observable` module provides the building blocks for creating and manipulating
//! observables, allowing for reactive programming in Rust.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{runtime::Handle, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::lock;
use crate::subscription::subscribe::{
    Subscribeable, Subscriber, Subscription, SubscriptionHandle, UnsubscribeLogic,
    Unsubscribeable,
};
use crate::observer::Observer;

/// The `Observable` struct represents a source of values that can be observed
/// and transformed.
///
/// Observables are cold: nothing runs until `subscribe` is called, and every
/// subscription runs the subscribe function anew. The subscribe function returns a
/// `Subscription` whose unsubscribe logic stops whatever the subscription started.
/// Operators such as `take`, `debounce` and `switch_map` rely on that logic to
/// cancel upstream work.
///
/// # Example: asynchronous `Observable` with `Tokio`
///
///```no_run
/// use std::time::Duration;
///
/// use rxsearch::{subscribe::Subscriber, Observable, ObservableExt, Subscribeable};
///
/// #[tokio::main()]
/// async fn main() {
///     let subscription = Observable::interval(Duration::from_millis(1000))
///         .take(5)
///         .filter(|x| x % 2 == 0)
///         .map(|x| x * 10)
///         .subscribe(Subscriber::on_next(|x| println!("From Take {}", x)));
///
///     // Emits 0, 20 and 40, then completes.
///     if subscription.join_concurrent().await.is_err() {
///         // Handle error
///     }
/// }
///```
pub struct Observable<T> {
    subscribe_fn: Box<dyn FnMut(Subscriber<T>) -> Subscription + Send + Sync>,
}

impl<T> Observable<T> {
    /// Creates a new `Observable` with the provided subscribe function.
    ///
    /// When the `Observable` is subscribed to, `sf` is invoked to manage the
    /// delivery of values to the `Subscriber`. It returns a `Subscription` that
    /// enables unsubscribing and, for asynchronous observables, awaiting the
    /// `Tokio` task doing the work.
    pub fn new(sf: impl FnMut(Subscriber<T>) -> Subscription + Send + Sync + 'static) -> Self {
        Observable {
            subscribe_fn: Box::new(sf),
        }
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Emits every item of `values` synchronously, then completes.
    pub fn of<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
    {
        Observable::new(move |mut o| {
            for v in values.clone() {
                o.next(v);
            }
            o.complete();
            Subscription::new(UnsubscribeLogic::Nil, SubscriptionHandle::Nil)
        })
    }

    /// Runs the future produced by `make` in a `Tokio` task, emits its output and
    /// completes.
    ///
    /// Unsubscribing stops the task; nothing is emitted afterwards, not even if the
    /// future was just about to resolve. Must be subscribed inside a `Tokio`
    /// runtime.
    pub fn from_future<F, Fut>(mut make: F) -> Self
    where
        F: FnMut() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Observable::new(move |mut o| {
            let fut = make();
            let token = CancellationToken::new();
            let task_token = token.clone();

            let handle = tokio::spawn(async move {
                tokio::select! {
                    biased;
                    () = task_token.cancelled() => {}
                    v = fut => {
                        if !task_token.is_cancelled() {
                            o.next(v);
                            o.complete();
                        }
                    }
                }
            });

            Subscription::new(
                UnsubscribeLogic::Logic(Box::new(move || token.cancel())),
                SubscriptionHandle::JoinTask(handle),
            )
        })
    }
}

impl Observable<u64> {
    /// Emits `0, 1, 2, ...` from a `Tokio` task, one value per `period`, the first
    /// one after a full period. Runs until unsubscribed.
    pub fn interval(period: Duration) -> Self {
        Observable::new(move |mut o| {
            let token = CancellationToken::new();
            let task_token = token.clone();

            let handle = tokio::spawn(async move {
                let mut ticker = time::interval_at(time::Instant::now() + period, period);
                let mut i = 0;
                loop {
                    tokio::select! {
                        biased;
                        () = task_token.cancelled() => break,
                        _ = ticker.tick() => {
                            o.next(i);
                            i += 1;
                        }
                    }
                }
            });

            Subscription::new(
                UnsubscribeLogic::Logic(Box::new(move || token.cancel())),
                SubscriptionHandle::JoinTask(handle),
            )
        })
    }
}

impl<T: 'static> Subscribeable for Observable<T> {
    type ObsType = T;

    fn subscribe(&mut self, v: Subscriber<Self::ObsType>) -> Subscription {
        (self.subscribe_fn)(v)
    }
}

// Upstream subscriber for an operator: `next` is operator specific, `error` and
// `complete` pass straight through to `o`.
fn relay<T: 'static, U: 'static>(
    o: &Arc<Mutex<Subscriber<U>>>,
    next: impl FnMut(T) + Send + 'static,
) -> Subscriber<T> {
    let o_cloned_e = Arc::clone(o);
    let o_cloned_c = Arc::clone(o);

    Subscriber::new(
        next,
        move |observable_error| lock(&o_cloned_e).error(observable_error),
        move || lock(&o_cloned_c).complete(),
    )
}

#[derive(Default)]
struct TakeUpstream {
    done: bool,
    subscription: Option<Subscription>,
}

struct DebounceState<T> {
    pending: Option<T>,
    // Bumped whenever the pending value is replaced or dropped, so a timer that
    // already woke up can tell it lost the race.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    closed: bool,
}

impl<T> DebounceState<T> {
    fn clear(&mut self) {
        self.generation += 1;
        self.pending = None;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct SwitchState {
    // Token of the latest inner observable; only its notifications get through.
    token: u64,
    current: Option<Subscription>,
    inner_active: bool,
    outer_done: bool,
    closed: bool,
}

#[derive(Default)]
struct MergeState {
    next_key: u64,
    running: HashMap<u64, Option<Subscription>>,
    upstream: Option<Subscription>,
    outer_done: bool,
    closed: bool,
}

impl MergeState {
    // Marks the state closed and hands out everything still running, to be
    // unsubscribed once the lock is released.
    fn close(&mut self) -> Vec<Subscription> {
        self.closed = true;
        let mut running: Vec<Subscription> =
            self.running.drain().filter_map(|(_, s)| s).collect();
        running.extend(self.upstream.take());
        running
    }
}

/// The `ObservableExt` trait provides a set of extension methods that can be applied
/// to observables to transform and manipulate their behavior.
///
/// It is implemented for everything `Subscribeable`, so subject receivers get the
/// same operators as observables.
pub trait ObservableExt<T: 'static>: Subscribeable<ObsType = T> {
    /// Transforms the items emitted by the observable using a transformation
    /// function.
    fn map<U, F>(mut self, f: F) -> Observable<U>
    where
        Self: Sized + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
        U: 'static,
    {
        let f = Arc::new(f);
        Observable::new(move |o| {
            let o_shared = Arc::new(Mutex::new(o));
            let o_next = Arc::clone(&o_shared);
            let f = Arc::clone(&f);

            let u = relay(&o_shared, move |v| {
                let t = f(v);
                lock(&o_next).next(t);
            });
            self.subscribe(u)
        })
    }

    /// Filters the items emitted by the observable based on a predicate function.
    ///
    /// Only items for which the predicate function returns `true` will be emitted
    /// by the resulting observable.
    fn filter<P>(mut self, predicate: P) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        Observable::new(move |o| {
            let o_shared = Arc::new(Mutex::new(o));
            let o_next = Arc::clone(&o_shared);
            let predicate = Arc::clone(&predicate);

            let u = relay(&o_shared, move |v| {
                if predicate(&v) {
                    lock(&o_next).next(v);
                }
            });
            self.subscribe(u)
        })
    }

    /// Calls `f` with a reference to every item, then passes the item on unchanged.
    fn tap<F>(mut self, f: F) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Observable::new(move |o| {
            let o_shared = Arc::new(Mutex::new(o));
            let o_next = Arc::clone(&o_shared);
            let f = Arc::clone(&f);

            let u = relay(&o_shared, move |v| {
                f(&v);
                lock(&o_next).next(v);
            });
            self.subscribe(u)
        })
    }

    /// Emits at most the first `n` items emitted by the observable, then completes
    /// and unsubscribes from the source.
    ///
    /// `take(0)` completes without subscribing to the source at all.
    fn take(mut self, n: usize) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
    {
        Observable::new(move |o| {
            let o_shared = Arc::new(Mutex::new(o));

            if n == 0 {
                lock(&o_shared).complete();
                return Subscription::new(UnsubscribeLogic::Nil, SubscriptionHandle::Nil);
            }

            let upstream = Arc::new(Mutex::new(TakeUpstream::default()));
            let upstream_n = Arc::clone(&upstream);
            let o_next = Arc::clone(&o_shared);
            let mut taken = 0;

            let u = relay(&o_shared, move |v| {
                if taken == n {
                    return;
                }
                taken += 1;

                let mut o = lock(&o_next);
                o.next(v);
                if taken < n {
                    return;
                }
                o.complete();
                drop(o);

                // The source may still be inside its own `subscribe` call, in which
                // case there is no subscription yet and the caller below handles it.
                let subscription = {
                    let mut up = lock(&upstream_n);
                    up.done = true;
                    up.subscription.take()
                };
                if let Some(s) = subscription {
                    s.unsubscribe();
                }
            });

            let mut subscription = self.subscribe(u);
            let handle = subscription.take_handle();

            let mut up = lock(&upstream);
            if up.done {
                drop(up);
                subscription.unsubscribe();
                return Subscription::new(UnsubscribeLogic::Nil, handle);
            }
            up.subscription = Some(subscription);
            drop(up);

            Subscription::new(
                UnsubscribeLogic::Logic(Box::new(move || {
                    let subscription = lock(&upstream).subscription.take();
                    if let Some(s) = subscription {
                        s.unsubscribe();
                    }
                })),
                handle,
            )
        })
    }

    /// Emits an item only after `duration` has passed without the source emitting
    /// another one.
    ///
    /// Every new item aborts the running timer and starts a new one, so of a burst
    /// of items only the last is emitted, one `duration` after it arrived. When the
    /// source completes, a pending item is emitted right away before completion.
    /// When the source errors, a pending item is dropped. Unsubscribing aborts the
    /// timer.
    ///
    /// Timers are `Tokio` tasks. They run on the runtime the source emits from, or
    /// else on the runtime that was current when the operator was subscribed.
    /// Without either, the item is dropped with a warning.
    fn debounce(mut self, duration: Duration) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
        T: Send,
    {
        Observable::new(move |o| {
            let o_shared = Arc::new(Mutex::new(o));
            let o_next = Arc::clone(&o_shared);
            let o_cloned_e = Arc::clone(&o_shared);
            let o_cloned_c = Arc::clone(&o_shared);
            let subscribed_on = Handle::try_current().ok();

            let state = Arc::new(Mutex::new(DebounceState {
                pending: None,
                generation: 0,
                timer: None,
                closed: false,
            }));
            let state_n = Arc::clone(&state);
            let state_e = Arc::clone(&state);
            let state_c = Arc::clone(&state);

            let u = Subscriber::new(
                move |v| {
                    let mut st = lock(&state_n);
                    if st.closed {
                        return;
                    }
                    st.clear();

                    let runtime = Handle::try_current().ok().or_else(|| subscribed_on.clone());
                    let Some(runtime) = runtime else {
                        warn!("no Tokio runtime to run the debounce timer, item dropped");
                        return;
                    };
                    st.pending = Some(v);

                    let generation = st.generation;
                    let state = Arc::clone(&state_n);
                    let o = Arc::clone(&o_next);

                    st.timer = Some(runtime.spawn(async move {
                        time::sleep(duration).await;

                        let value = {
                            let mut st = lock(&state);
                            if st.closed || st.generation != generation {
                                return;
                            }
                            st.timer = None;
                            st.pending.take()
                        };
                        if let Some(v) = value {
                            trace!(generation, "debounce window elapsed");
                            lock(&o).next(v);
                        }
                    }));
                },
                move |observable_error| {
                    lock(&state_e).clear();
                    lock(&o_cloned_e).error(observable_error);
                },
                move || {
                    let value = {
                        let mut st = lock(&state_c);
                        let value = st.pending.take();
                        st.clear();
                        value
                    };
                    let mut o = lock(&o_cloned_c);
                    if let Some(v) = value {
                        o.next(v);
                    }
                    o.complete();
                },
            );

            let mut upstream = self.subscribe(u);
            let handle = upstream.take_handle();

            Subscription::new(
                UnsubscribeLogic::Logic(Box::new(move || {
                    {
                        let mut st = lock(&state);
                        st.closed = true;
                        st.clear();
                    }
                    upstream.unsubscribe();
                })),
                handle,
            )
        })
    }

    /// Suppresses items equal to the previously emitted item.
    ///
    /// The comparison is against the last item this operator let through, not the
    /// last item the source produced.
    fn distinct_until_changed(mut self) -> Observable<T>
    where
        Self: Sized + Send + Sync + 'static,
        T: PartialEq + Clone + Send,
    {
        Observable::new(move |o| {
            let o_shared = Arc::new(Mutex::new(o));
            let o_next = Arc::clone(&o_shared);
            let mut last: Option<T> = None;

            let u = relay(&o_shared, move |v: T| {
                if last.as_ref() == Some(&v) {
                    return;
                }
                last = Some(v.clone());
                lock(&o_next).next(v);
            });
            self.subscribe(u)
        })
    }

    /// Transforms the items emitted by an observable into observables, and flattens
    /// the emissions into a single observable, abandoning the previous inner
    /// observable once a new item arrives.
    ///
    /// Each item gets a new token. Before subscribing the new inner observable the
    /// previous inner subscription is unsubscribed, and anything a previous inner
    /// observable still manages to emit (values, errors, completion) is discarded
    /// because its token is no longer the latest.
    ///
    /// The resulting observable completes once the source has completed and the
    /// latest inner observable has completed.
    ///
    /// # Parameters
    /// - `project`: A closure that maps each source item to an observable.
    ///
    /// # Returns
    /// An observable that emits the items from the most recently created inner
    /// observable.
    fn switch_map<R: 'static, F>(mut self, project: F) -> Observable<R>
    where
        Self: Sized + Send + Sync + 'static,
        F: (FnMut(T) -> Observable<R>) + Sync + Send + 'static,
    {
        let project = Arc::new(Mutex::new(project));
        Observable::new(move |o| {
            let o_shared = Arc::new(Mutex::new(o));
            let o_cloned_e = Arc::clone(&o_shared);
            let o_cloned_c = Arc::clone(&o_shared);
            let o_next = Arc::clone(&o_shared);

            let state = Arc::new(Mutex::new(SwitchState::default()));
            let state_n = Arc::clone(&state);
            let state_e = Arc::clone(&state);
            let state_c = Arc::clone(&state);

            let project = Arc::clone(&project);

            let u = Subscriber::new(
                move |v| {
                    let (token, previous) = {
                        let mut st = lock(&state_n);
                        if st.closed {
                            return;
                        }
                        st.token += 1;
                        st.inner_active = true;
                        (st.token, st.current.take())
                    };
                    if let Some(previous) = previous {
                        trace!(token, "switching to a new inner observable");
                        previous.unsubscribe();
                    }

                    let mut inner_observable = (&mut *lock(&project))(v);

                    let state_in = Arc::clone(&state_n);
                    let state_ie = Arc::clone(&state_n);
                    let state_ic = Arc::clone(&state_n);
                    let o_in = Arc::clone(&o_next);
                    let o_ie = Arc::clone(&o_next);
                    let o_ic = Arc::clone(&o_next);

                    let inner_subscriber = Subscriber::new(
                        move |k| {
                            if lock(&state_in).token != token {
                                trace!(token, "discarding value of a superseded inner observable");
                                return;
                            }
                            lock(&o_in).next(k);
                        },
                        move |observable_error| {
                            if lock(&state_ie).token != token {
                                trace!(token, "discarding error of a superseded inner observable");
                                return;
                            }
                            lock(&o_ie).error(observable_error);
                        },
                        move || {
                            let finished = {
                                let mut st = lock(&state_ic);
                                if st.token != token {
                                    return;
                                }
                                st.inner_active = false;
                                st.outer_done
                            };
                            if finished {
                                lock(&o_ic).complete();
                            }
                        },
                    );

                    let subscription = inner_observable.subscribe(inner_subscriber);

                    let stale = {
                        let mut st = lock(&state_n);
                        if st.closed || st.token != token || !st.inner_active {
                            Some(subscription)
                        } else {
                            st.current = Some(subscription);
                            None
                        }
                    };
                    if let Some(s) = stale {
                        s.unsubscribe();
                    }
                },
                move |observable_error| {
                    let current = {
                        let mut st = lock(&state_e);
                        st.token += 1;
                        st.current.take()
                    };
                    if let Some(s) = current {
                        s.unsubscribe();
                    }
                    lock(&o_cloned_e).error(observable_error);
                },
                move || {
                    let finished = {
                        let mut st = lock(&state_c);
                        st.outer_done = true;
                        !st.inner_active
                    };
                    if finished {
                        lock(&o_cloned_c).complete();
                    }
                },
            );

            let mut upstream = self.subscribe(u);
            let handle = upstream.take_handle();

            Subscription::new(
                UnsubscribeLogic::Logic(Box::new(move || {
                    let current = {
                        let mut st = lock(&state);
                        st.closed = true;
                        st.token += 1;
                        st.current.take()
                    };
                    if let Some(s) = current {
                        s.unsubscribe();
                    }
                    upstream.unsubscribe();
                })),
                handle,
            )
        })
    }

    /// Transforms the items emitted by the source observable into other observables,
    /// and merges them into a single observable stream.
    ///
    /// Every inner observable keeps running when the next one starts; all of their
    /// items are emitted. The resulting observable completes once the source and
    /// every inner observable have completed. The first error, from the source or
    /// from any inner observable, is forwarded and unsubscribes everything else.
    ///
    /// # Parameters
    ///
    /// - `project`: A closure that maps each item emitted by the source observable
    ///   to another observable.
    fn merge_map<R: 'static, F>(mut self, project: F) -> Observable<R>
    where
        Self: Sized + Send + Sync + 'static,
        F: (FnMut(T) -> Observable<R>) + Sync + Send + 'static,
    {
        let project = Arc::new(Mutex::new(project));
        Observable::new(move |o| {
            let o_shared = Arc::new(Mutex::new(o));
            let o_cloned_e = Arc::clone(&o_shared);
            let o_cloned_c = Arc::clone(&o_shared);
            let o_next = Arc::clone(&o_shared);

            let state = Arc::new(Mutex::new(MergeState::default()));
            let state_n = Arc::clone(&state);
            let state_e = Arc::clone(&state);
            let state_c = Arc::clone(&state);

            let project = Arc::clone(&project);

            let u = Subscriber::new(
                move |v| {
                    let key = {
                        let mut st = lock(&state_n);
                        if st.closed {
                            return;
                        }
                        let key = st.next_key;
                        st.next_key += 1;
                        st.running.insert(key, None);
                        key
                    };

                    let mut inner_observable = (&mut *lock(&project))(v);

                    let state_ie = Arc::clone(&state_n);
                    let state_ic = Arc::clone(&state_n);
                    let o_in = Arc::clone(&o_next);
                    let o_ie = Arc::clone(&o_next);
                    let o_ic = Arc::clone(&o_next);

                    let inner_subscriber = Subscriber::new(
                        move |k| lock(&o_in).next(k),
                        move |observable_error| {
                            let running = {
                                let mut st = lock(&state_ie);
                                if st.closed {
                                    return;
                                }
                                st.close()
                            };
                            lock(&o_ie).error(observable_error);
                            for s in running {
                                s.unsubscribe();
                            }
                        },
                        move || {
                            let finished = {
                                let mut st = lock(&state_ic);
                                st.running.remove(&key);
                                st.outer_done && st.running.is_empty()
                            };
                            if finished {
                                lock(&o_ic).complete();
                            }
                        },
                    );

                    let subscription = inner_observable.subscribe(inner_subscriber);

                    let mut st = lock(&state_n);
                    if let Some(slot) = st.running.get_mut(&key) {
                        *slot = Some(subscription);
                    } else if st.closed {
                        // Torn down while the inner observable was being subscribed.
                        drop(st);
                        subscription.unsubscribe();
                    }
                },
                move |observable_error| {
                    let running = lock(&state_e).close();
                    lock(&o_cloned_e).error(observable_error);
                    for s in running {
                        s.unsubscribe();
                    }
                },
                move || {
                    let finished = {
                        let mut st = lock(&state_c);
                        st.outer_done = true;
                        st.running.is_empty()
                    };
                    if finished {
                        lock(&o_cloned_c).complete();
                    }
                },
            );

            let mut upstream = self.subscribe(u);
            let handle = upstream.take_handle();

            {
                let mut st = lock(&state);
                if st.closed {
                    // The source or an inner observable already errored.
                    drop(st);
                    upstream.unsubscribe();
                } else {
                    st.upstream = Some(upstream);
                }
            }

            Subscription::new(
                UnsubscribeLogic::Logic(Box::new(move || {
                    let running = lock(&state).close();
                    for s in running {
                        s.unsubscribe();
                    }
                })),
                handle,
            )
        })
    }
}

impl<O, T: 'static> ObservableExt<T> for O where O: Subscribeable<ObsType = T> {}
