use std::{future::Future, pin::Pin, time::Duration};

use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{SearchConfig, SearchError, SearchTerm};

pub type LookupFuture = Pin<Box<dyn Future<Output = Result<Value, SearchError>> + Send>>;

/// Fetches the raw JSON payload for one term.
///
/// Implemented by [`HttpLookup`] and by any closure
/// `Fn(SearchTerm) -> impl Future<Output = Result<Value, SearchError>>`. The
/// returned future is dropped without being polled to completion when the lookup
/// is abandoned.
pub trait Lookup: Send + Sync {
    fn fetch(&self, term: &SearchTerm) -> LookupFuture;
}

impl<F, Fut> Lookup for F
where
    F: Fn(SearchTerm) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, SearchError>> + Send + 'static,
{
    fn fetch(&self, term: &SearchTerm) -> LookupFuture {
        Box::pin(self(term.clone()))
    }
}

/// `GET <endpoint>?q=<term>` returning the JSON body.
#[derive(Debug, Clone)]
pub struct HttpLookup {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Option<Duration>,
}

impl HttpLookup {
    pub fn new(endpoint: &str) -> Result<Self, SearchError> {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Result<Self, SearchError> {
        let endpoint = Url::parse(endpoint).map_err(|source| SearchError::Endpoint {
            endpoint: endpoint.to_string(),
            source,
        })?;
        Ok(Self {
            client,
            endpoint,
            timeout: None,
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(SearchError::Client)?;
        let mut lookup = Self::with_client(client, &config.endpoint)?;
        lookup.timeout = config.request_timeout;
        Ok(lookup)
    }

    /// The URL requested for `term`. Query parameters already present on the
    /// endpoint are kept.
    pub fn request_url(&self, term: &SearchTerm) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("q", term.as_str());
        url
    }
}

impl Lookup for HttpLookup {
    fn fetch(&self, term: &SearchTerm) -> LookupFuture {
        let url = self.request_url(term);
        let mut request = self.client.get(url.clone());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let term = term.clone();

        Box::pin(async move {
            debug!(%url, "sending search request");

            let response = request.send().await.map_err(|source| SearchError::Transport {
                term: term.clone(),
                source,
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(SearchError::Status {
                    term,
                    status: status.as_u16(),
                });
            }

            let body = response.bytes().await.map_err(|source| SearchError::Transport {
                term: term.clone(),
                source,
            })?;
            serde_json::from_slice(&body).map_err(|source| SearchError::Decode { term, source })
        })
    }
}
