use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rxsearch::{
    subscribe::{Subscriber, Subscription, SubscriptionHandle, UnsubscribeLogic},
    Observable, Observer,
};
use tokio_util::sync::CancellationToken;

/// Emits `0..=end` from a `Tokio` task, one value every `period`, then completes.
/// Stops early once unsubscribed. `last_emit_assert` receives the last value
/// emitted either way.
pub fn generate_u32_observable(
    end: u32,
    period: Duration,
    last_emit_assert: impl FnMut(u32) + Send + Sync + 'static,
) -> Observable<u32> {
    let last_emit_assert = Arc::new(Mutex::new(last_emit_assert));

    Observable::new(move |mut o: Subscriber<_>| {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let last_emit_assert = Arc::clone(&last_emit_assert);
        let handle = tokio::spawn(async move {
            let mut last_emit = 0;

            for i in 0..=end {
                tokio::select! {
                    biased;
                    () = task_token.cancelled() => break,
                    () = tokio::time::sleep(period) => {}
                }
                last_emit = i;
                o.next(i);
            }
            if !task_token.is_cancelled() {
                o.complete();
            }
            last_emit_assert.lock().unwrap()(last_emit);
        });

        Subscription::new(
            UnsubscribeLogic::Logic(Box::new(move || token.cancel())),
            SubscriptionHandle::JoinTask(handle),
        )
    })
}

/// Emits `value` once after `delay` and completes. Unsubscribing has no effect,
/// like a request that cannot be aborted.
pub fn generate_delayed_observable<T: Send + Clone + Sync + 'static>(
    value: T,
    delay: Duration,
) -> Observable<T> {
    Observable::new(move |mut o: Subscriber<_>| {
        let value = value.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            o.next(value);
            o.complete();
        });
        Subscription::new(UnsubscribeLogic::Nil, SubscriptionHandle::JoinTask(handle))
    })
}
