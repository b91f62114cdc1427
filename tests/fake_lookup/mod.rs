use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rxsearch::search::{Lookup, LookupFuture, SearchError, SearchTerm};
use serde_json::json;
use tokio::time::Instant;

/// In-memory stand-in for the HTTP backend.
///
/// Answers every term with `{"data": {"children": [<term>]}}` after `delay`,
/// except for terms registered with `failing` (HTTP 503) or `without_field`
/// (`{"data": {}}`). Clones share the call log.
#[derive(Clone)]
pub struct FakeLookup {
    calls: Arc<Mutex<Vec<(SearchTerm, Instant)>>>,
    delay: Duration,
    failing: Vec<SearchTerm>,
    without_field: Vec<SearchTerm>,
}

impl FakeLookup {
    pub fn new(delay: Duration) -> Self {
        FakeLookup {
            calls: Arc::new(Mutex::new(Vec::new())),
            delay,
            failing: Vec::new(),
            without_field: Vec::new(),
        }
    }

    pub fn failing(mut self, term: &str) -> Self {
        self.failing.push(term.into());
        self
    }

    pub fn without_field(mut self, term: &str) -> Self {
        self.without_field.push(term.into());
        self
    }

    /// Terms looked up so far, with the instant each lookup started.
    pub fn calls(&self) -> Vec<(SearchTerm, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_terms(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|(term, _)| term.to_string())
            .collect()
    }
}

impl Lookup for FakeLookup {
    fn fetch(&self, term: &SearchTerm) -> LookupFuture {
        self.calls
            .lock()
            .unwrap()
            .push((term.clone(), Instant::now()));

        let term = term.clone();
        let delay = self.delay;
        let fails = self.failing.contains(&term);
        let empty = self.without_field.contains(&term);

        Box::pin(async move {
            tokio::time::sleep(delay).await;
            if fails {
                return Err(SearchError::Status { term, status: 503 });
            }
            if empty {
                return Ok(json!({ "data": {} }));
            }
            Ok(json!({ "data": { "children": [term.as_str()] } }))
        })
    }
}
