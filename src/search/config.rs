use std::time::Duration;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);
pub const DEFAULT_ENDPOINT: &str = "https://www.reddit.com/r/aww/search.json";

/// Tunables of a [`SearchPipeline`](super::SearchPipeline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Quiet period a term has to survive before it is looked up.
    pub debounce: Duration,
    /// Base URL; the term is appended as the `q` query parameter.
    pub endpoint: String,
    /// Object keys leading from the response root to the field handed to the
    /// consumer.
    pub field_path: Vec<String>,
    /// Per-request timeout for HTTP lookups. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            field_path: vec!["data".to_string(), "children".to_string()],
            request_timeout: None,
        }
    }
}

impl SearchConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_field_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}
