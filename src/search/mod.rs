//! Debounced search: turns a stream of raw search terms into at most one lookup
//! per settled term, and delivers only the result of the most recent lookup.
//!
//! ```text
//! submit(term) -> Subject -> debounce -> distinct_until_changed -> switch_map(lookup) -> consumer
//! ```
//!
//! See [`SearchPipeline`] for the wiring and its lifecycle.

mod config;
mod error;
mod extract;
mod lookup;
mod pipeline;

use std::fmt;

use serde_json::Value;

pub use config::{SearchConfig, DEFAULT_DEBOUNCE, DEFAULT_ENDPOINT};
pub use error::SearchError;
pub use extract::extract_field;
pub use lookup::{HttpLookup, Lookup, LookupFuture};
pub use pipeline::SearchPipeline;

/// A query string as typed by the user. Two terms are equal when their text is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchTerm(String);

impl SearchTerm {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SearchTerm {
    fn from(value: &str) -> Self {
        SearchTerm(value.to_string())
    }
}

impl From<String> for SearchTerm {
    fn from(value: String) -> Self {
        SearchTerm(value)
    }
}

/// The field extracted from the lookup payload of one term.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub term: SearchTerm,
    /// `None` when the payload did not contain the configured field.
    pub payload: Option<Value>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }
}

/// What a pipeline consumer receives for every completed lookup.
pub type SearchOutcome = Result<SearchResult, SearchError>;
