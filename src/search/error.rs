use thiserror::Error;

use super::SearchTerm;

/// Failures of the search pipeline.
///
/// A missing field in an otherwise valid payload is not an error; it yields an
/// empty [`SearchResult`](super::SearchResult).
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search endpoint `{endpoint}`: {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build the HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("lookup for `{term}` failed: {source}")]
    Transport {
        term: SearchTerm,
        #[source]
        source: reqwest::Error,
    },

    #[error("lookup for `{term}` returned HTTP {status}")]
    Status { term: SearchTerm, status: u16 },

    #[error("lookup for `{term}` returned a body that is not JSON: {source}")]
    Decode {
        term: SearchTerm,
        #[source]
        source: serde_json::Error,
    },
}

impl SearchError {
    /// The term whose lookup failed, if the error belongs to a lookup.
    pub fn term(&self) -> Option<&SearchTerm> {
        match self {
            SearchError::Transport { term, .. }
            | SearchError::Status { term, .. }
            | SearchError::Decode { term, .. } => Some(term),
            SearchError::Endpoint { .. } | SearchError::Client(_) => None,
        }
    }
}
