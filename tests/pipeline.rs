mod fake_lookup;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use fake_lookup::FakeLookup;
use rxsearch::search::{SearchConfig, SearchError, SearchOutcome, SearchPipeline, SearchTerm};
use rxsearch::subscribe::Subscriber;
use rxsearch::Observer;
use serde_json::json;
use tokio::time::{sleep, Instant};

struct Consumer {
    outcomes: Arc<Mutex<Vec<(SearchOutcome, Instant)>>>,
    errors: Arc<Mutex<u32>>,
    completes: Arc<Mutex<u32>>,
}

impl Consumer {
    fn attach(pipeline: &mut SearchPipeline) -> Self {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let outcomes_c = Arc::clone(&outcomes);
        let errors = Arc::new(Mutex::new(0));
        let errors_c = Arc::clone(&errors);
        let completes = Arc::new(Mutex::new(0));
        let completes_c = Arc::clone(&completes);

        pipeline.subscribe(Subscriber::new(
            move |outcome| outcomes_c.lock().unwrap().push((outcome, Instant::now())),
            move |_| *errors_c.lock().unwrap() += 1,
            move || *completes_c.lock().unwrap() += 1,
        ));

        Consumer {
            outcomes,
            errors,
            completes,
        }
    }

    fn terms(&self) -> Vec<String> {
        self.outcomes
            .lock()
            .unwrap()
            .iter()
            .map(|(outcome, _)| match outcome {
                Ok(result) => result.term.to_string(),
                Err(err) => format!("error: {}", err.term().map(|t| t.as_str()).unwrap_or("")),
            })
            .collect()
    }

    fn assert_never_terminated(&self) {
        assert_eq!(*self.errors.lock().unwrap(), 0);
        assert_eq!(*self.completes.lock().unwrap(), 0);
    }
}

fn millis_since(start: Instant, at: Instant) -> u128 {
    at.duration_since(start).as_millis()
}

fn pipeline_with(lookup: &FakeLookup) -> SearchPipeline {
    SearchPipeline::new(SearchConfig::default(), lookup.clone())
}

#[tokio::test(start_paused = true)]
async fn burst_is_looked_up_once_after_quiet_period() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);
    let start = Instant::now();

    pipeline.submit("a");
    sleep(Duration::from_millis(50)).await;
    pipeline.submit("ab");
    sleep(Duration::from_millis(50)).await;
    pipeline.submit("abc");
    sleep(Duration::from_millis(1000)).await;

    let calls = lookup.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, SearchTerm::from("abc"));
    // Last keystroke at 100 ms plus the 200 ms debounce.
    assert!(millis_since(start, calls[0].1) >= 300);

    assert_eq!(consumer.terms(), vec!["abc"]);
    consumer.assert_never_terminated();
}

#[tokio::test(start_paused = true)]
async fn lookup_waits_for_full_debounce_window() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let mut pipeline = pipeline_with(&lookup);
    let _consumer = Consumer::attach(&mut pipeline);

    pipeline.submit("otter");
    sleep(Duration::from_millis(199)).await;
    assert!(lookup.calls().is_empty());

    sleep(Duration::from_millis(2)).await;
    assert_eq!(lookup.called_terms(), vec!["otter"]);
}

#[tokio::test(start_paused = true)]
async fn repeated_settled_term_is_not_looked_up_again() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);

    pipeline.submit("x");
    sleep(Duration::from_millis(300)).await;
    pipeline.submit("x");
    sleep(Duration::from_millis(300)).await;
    pipeline.submit("y");
    sleep(Duration::from_millis(300)).await;

    assert_eq!(lookup.called_terms(), vec!["x", "y"]);
    assert_eq!(consumer.terms(), vec!["x", "y"]);
}

#[tokio::test(start_paused = true)]
async fn term_changed_and_back_is_looked_up_again() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let mut pipeline = pipeline_with(&lookup);
    let _consumer = Consumer::attach(&mut pipeline);

    for term in ["x", "y", "x"] {
        pipeline.submit(term);
        sleep(Duration::from_millis(300)).await;
    }

    assert_eq!(lookup.called_terms(), vec!["x", "y", "x"]);
}

#[tokio::test(start_paused = true)]
async fn raw_term_matching_last_settled_still_restarts_debounce() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let mut pipeline = pipeline_with(&lookup);
    let _consumer = Consumer::attach(&mut pipeline);

    pipeline.submit("x");
    sleep(Duration::from_millis(300)).await;
    // "xy" never settles: "x" replaces it within the window, and "x" equals the
    // last looked up term.
    pipeline.submit("xy");
    sleep(Duration::from_millis(100)).await;
    pipeline.submit("x");
    sleep(Duration::from_millis(300)).await;

    assert_eq!(lookup.called_terms(), vec!["x"]);
}

#[tokio::test(start_paused = true)]
async fn newer_lookup_abandons_the_one_in_flight() {
    let lookup = FakeLookup::new(Duration::from_millis(500));
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);
    let start = Instant::now();

    pipeline.submit("x");
    sleep(Duration::from_millis(250)).await;
    // "x" was dispatched at 200 ms and is still in flight.
    assert_eq!(lookup.called_terms(), vec!["x"]);
    pipeline.submit("y");
    sleep(Duration::from_millis(2000)).await;

    assert_eq!(lookup.called_terms(), vec!["x", "y"]);
    assert_eq!(consumer.terms(), vec!["y"]);

    let outcomes = consumer.outcomes.lock().unwrap();
    // Dispatched at 450 ms, answered 500 ms later.
    assert_eq!(millis_since(start, outcomes[0].1), 950);
}

#[tokio::test(start_paused = true)]
async fn abandoned_failing_lookup_is_never_reported() {
    let lookup = FakeLookup::new(Duration::from_millis(500)).failing("x");
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);

    pipeline.submit("x");
    sleep(Duration::from_millis(250)).await;
    pipeline.submit("y");
    sleep(Duration::from_millis(2000)).await;

    assert_eq!(lookup.called_terms(), vec!["x", "y"]);
    assert_eq!(consumer.terms(), vec!["y"]);
    consumer.assert_never_terminated();
}

#[tokio::test(start_paused = true)]
async fn every_surviving_lookup_delivers_exactly_once() {
    let lookup = FakeLookup::new(Duration::from_millis(50));
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);

    for term in ["cats", "dogs", "owls"] {
        pipeline.submit(term);
        sleep(Duration::from_millis(1000)).await;
    }

    assert_eq!(consumer.terms(), vec!["cats", "dogs", "owls"]);
    let outcomes = consumer.outcomes.lock().unwrap();
    let (outcome, _) = &outcomes[1];
    let result = outcome.as_ref().unwrap();
    assert_eq!(result.payload, Some(json!(["dogs"])));
    assert!(!result.is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_field_is_an_empty_result() {
    let lookup = FakeLookup::new(Duration::from_millis(10)).without_field("nothing");
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);

    pipeline.submit("nothing");
    sleep(Duration::from_millis(500)).await;

    let outcomes = consumer.outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    let result = outcomes[0].0.as_ref().unwrap();
    assert_eq!(result.term, SearchTerm::from("nothing"));
    assert!(result.is_empty());
    consumer.assert_never_terminated();
}

#[tokio::test(start_paused = true)]
async fn custom_field_path_is_extracted() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let config = SearchConfig::default()
        .with_debounce(Duration::from_millis(50))
        .with_field_path(["data"]);
    let mut pipeline = SearchPipeline::new(config, lookup.clone());
    let consumer = Consumer::attach(&mut pipeline);
    let start = Instant::now();

    pipeline.submit("fox");
    sleep(Duration::from_millis(100)).await;

    assert!(millis_since(start, lookup.calls()[0].1) >= 50);
    let outcomes = consumer.outcomes.lock().unwrap();
    assert_eq!(
        outcomes[0].0.as_ref().unwrap().payload,
        Some(json!({ "children": ["fox"] }))
    );
}

#[tokio::test(start_paused = true)]
async fn failed_lookup_is_reported_and_pipeline_continues() {
    let lookup = FakeLookup::new(Duration::from_millis(10)).failing("bad");
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);

    pipeline.submit("bad");
    sleep(Duration::from_millis(500)).await;
    pipeline.submit("good");
    sleep(Duration::from_millis(500)).await;

    assert_eq!(consumer.terms(), vec!["error: bad", "good"]);
    {
        let outcomes = consumer.outcomes.lock().unwrap();
        assert!(matches!(
            outcomes[0].0,
            Err(SearchError::Status { status: 503, .. })
        ));
    }
    consumer.assert_never_terminated();
}

#[tokio::test(start_paused = true)]
async fn teardown_with_pending_timer_dispatches_nothing() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);

    pipeline.submit("x");
    sleep(Duration::from_millis(100)).await;
    pipeline.teardown();
    pipeline.teardown();
    sleep(Duration::from_millis(1000)).await;

    assert!(pipeline.is_torn_down());
    assert!(lookup.calls().is_empty());
    assert!(consumer.terms().is_empty());
    consumer.assert_never_terminated();
}

#[tokio::test(start_paused = true)]
async fn teardown_cancels_lookup_in_flight() {
    let lookup = FakeLookup::new(Duration::from_millis(500));
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);

    pipeline.submit("x");
    sleep(Duration::from_millis(300)).await;
    assert_eq!(lookup.called_terms(), vec!["x"]);

    pipeline.teardown();
    sleep(Duration::from_millis(1000)).await;

    assert!(consumer.terms().is_empty());
    consumer.assert_never_terminated();
}

#[tokio::test(start_paused = true)]
async fn submit_after_teardown_is_ignored() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);
    let mut input = pipeline.input();

    pipeline.teardown();
    pipeline.submit("late");
    input.next("later".into());
    sleep(Duration::from_millis(1000)).await;

    assert!(lookup.calls().is_empty());
    assert!(consumer.terms().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_pipeline_tears_it_down() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);

    pipeline.submit("x");
    drop(pipeline);
    sleep(Duration::from_millis(1000)).await;

    assert!(lookup.calls().is_empty());
    assert!(consumer.terms().is_empty());
}

#[tokio::test(start_paused = true)]
async fn input_emitter_feeds_pipeline_from_another_task() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);
    let mut input = pipeline.input();

    let typing = tokio::spawn(async move {
        for term in ["r", "ra", "rab", "rabbit"] {
            input.next(term.into());
            sleep(Duration::from_millis(30)).await;
        }
    });
    assert!(typing.await.is_ok());
    sleep(Duration::from_millis(500)).await;

    assert_eq!(lookup.called_terms(), vec!["rabbit"]);
    assert_eq!(consumer.terms(), vec!["rabbit"]);
}

#[tokio::test(start_paused = true)]
async fn consumers_run_independent_chains() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let mut pipeline = pipeline_with(&lookup);
    let first = Consumer::attach(&mut pipeline);
    let second = Consumer::attach(&mut pipeline);

    pipeline.submit("hare");
    sleep(Duration::from_millis(500)).await;

    // One lookup per consumer chain.
    assert_eq!(lookup.called_terms(), vec!["hare", "hare"]);
    assert_eq!(first.terms(), vec!["hare"]);
    assert_eq!(second.terms(), vec!["hare"]);
}

#[test]
fn submit_without_runtime_drops_the_term() {
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let mut pipeline = pipeline_with(&lookup);
    let consumer = Consumer::attach(&mut pipeline);

    pipeline.submit("x");
    pipeline.submit("y");
    pipeline.teardown();

    assert!(lookup.calls().is_empty());
    assert!(consumer.terms().is_empty());
}

#[test]
fn submit_from_plain_thread_runs_on_subscribing_runtime() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let lookup = FakeLookup::new(Duration::from_millis(10));
    let config = SearchConfig::default().with_debounce(Duration::from_millis(20));
    let mut pipeline = SearchPipeline::new(config, lookup.clone());

    let consumer = {
        let _guard = runtime.enter();
        Consumer::attach(&mut pipeline)
    };

    pipeline.submit("x");
    runtime.block_on(async { sleep(Duration::from_millis(300)).await });

    assert_eq!(lookup.called_terms(), vec!["x"]);
    assert_eq!(consumer.terms(), vec!["x"]);
    consumer.assert_never_terminated();
}
