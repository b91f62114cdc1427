use std::sync::{Arc, Mutex};

use rxsearch::subscribe::Subscriber;

/// Ten subscriber factories sharing one log of `next` values and one counter
/// each for `complete` and `error` calls.
#[allow(clippy::type_complexity)]
pub fn register_emissions_subscriber<T: Send + 'static>() -> (
    Vec<impl FnOnce() -> Subscriber<T>>,
    Arc<Mutex<Vec<T>>>,
    Arc<Mutex<Vec<i32>>>,
    Arc<Mutex<Vec<i32>>>,
) {
    let nexts: Vec<T> = Vec::with_capacity(5);
    let nexts = Arc::new(Mutex::new(nexts));
    let nexts_c = Arc::clone(&nexts);

    let completes: Vec<i32> = Vec::with_capacity(5);
    let completes = Arc::new(Mutex::new(completes));
    let completes_c = Arc::clone(&completes);

    let errors: Vec<i32> = Vec::with_capacity(5);
    let errors = Arc::new(Mutex::new(errors));
    let errors_c = Arc::clone(&errors);

    let make_subscriber = vec![
        move || {
            Subscriber::new(
                move |n| {
                    // Track next() calls.
                    nexts_c.lock().unwrap().push(n);
                },
                move |_| {
                    // Track error() calls.
                    errors_c.lock().unwrap().push(1);
                },
                move || {
                    // Track complete() calls.
                    completes_c.lock().unwrap().push(1);
                },
            )
        };
        10
    ];
    (make_subscriber, nexts, completes, errors)
}
