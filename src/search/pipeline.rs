use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    extract_field, HttpLookup, Lookup, SearchConfig, SearchError, SearchOutcome, SearchResult,
    SearchTerm,
};
use crate::{
    subjects::{SubjectEmitter, SubjectReceiver},
    subscribe::{Subscriber, Subscription, Unsubscribeable},
    Observable, ObservableExt, Observer, Subject, Subscribeable,
};

/// Input subject, stabilizer and request dispatcher wired together.
///
/// Terms go in through [`submit`](SearchPipeline::submit) (or a cloned
/// [`input`](SearchPipeline::input) emitter). A term is looked up once it has
/// been the latest for `config.debounce` and differs from the previously looked
/// up term. Starting a lookup abandons the one in flight, so consumers only ever
/// see the result of the most recent lookup.
///
/// Every consumer attached with [`subscribe`](SearchPipeline::subscribe) runs its
/// own debounce timer and its own lookups. Failed lookups arrive as `Err`
/// outcomes and the pipeline keeps going; it never signals `error` or `complete`.
///
/// [`teardown`](SearchPipeline::teardown) aborts pending timers, cancels lookups
/// in flight and closes the input. It is idempotent and also runs on drop.
///
/// Lookups and timers are `Tokio` tasks. They run on the runtime `submit` is
/// called from, or else on the one that was current when the consumer
/// subscribed. Without either, submitted terms are dropped with a warning.
pub struct SearchPipeline {
    emitter: SubjectEmitter<SearchTerm>,
    receiver: SubjectReceiver<SearchTerm>,
    config: SearchConfig,
    lookup: Arc<dyn Lookup>,
    subscriptions: Vec<Subscription>,
    torn_down: bool,
}

impl SearchPipeline {
    pub fn new(config: SearchConfig, lookup: impl Lookup + 'static) -> Self {
        let (emitter, receiver) = Subject::emitter_receiver();
        SearchPipeline {
            emitter,
            receiver,
            config,
            lookup: Arc::new(lookup),
            subscriptions: Vec::new(),
            torn_down: false,
        }
    }

    /// A pipeline that looks terms up with [`HttpLookup`] against
    /// `config.endpoint`.
    ///
    /// # Errors
    ///
    /// Fails if the endpoint is not a valid URL or the HTTP client cannot be
    /// built.
    pub fn http(config: SearchConfig) -> Result<Self, SearchError> {
        let lookup = HttpLookup::from_config(&config)?;
        info!(endpoint = %config.endpoint, debounce = ?config.debounce, "search pipeline ready");
        Ok(Self::new(config, lookup))
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Pushes a raw term into the pipeline. Silently ignored after teardown.
    pub fn submit(&mut self, term: impl Into<SearchTerm>) {
        self.emitter.next(term.into());
    }

    /// An emitter feeding the pipeline, for code that produces terms on its own.
    pub fn input(&self) -> SubjectEmitter<SearchTerm> {
        self.emitter.clone()
    }

    /// The cold chain from the input subject to lookup outcomes. Nothing runs
    /// until the returned observable is subscribed.
    pub fn results(&self) -> Observable<SearchOutcome> {
        let lookup = Arc::clone(&self.lookup);
        let path = Arc::new(self.config.field_path.clone());

        self.receiver
            .clone()
            .tap(|term| debug!(%term, "term received"))
            .debounce(self.config.debounce)
            .distinct_until_changed()
            .tap(|term| debug!(%term, "term settled"))
            .switch_map(move |term: SearchTerm| {
                let lookup = Arc::clone(&lookup);
                let path = Arc::clone(&path);

                Observable::from_future(move || {
                    let fetch = lookup.fetch(&term);
                    let term = term.clone();
                    let path = Arc::clone(&path);

                    async move {
                        match fetch.await {
                            Ok(payload) => {
                                let payload = extract_field(&payload, &path).cloned();
                                if payload.is_none() {
                                    debug!(%term, path = ?path, "field missing from payload");
                                }
                                Ok(SearchResult { term, payload })
                            }
                            Err(err) => {
                                warn!(%term, error = %err, "lookup failed");
                                Err(err)
                            }
                        }
                    }
                })
            })
    }

    /// Attaches `consumer` to a fresh [`results`](SearchPipeline::results) chain.
    /// Ignored after teardown.
    pub fn subscribe(&mut self, consumer: Subscriber<SearchOutcome>) {
        if self.torn_down {
            return;
        }
        let subscription = self.results().subscribe(consumer);
        self.subscriptions.push(subscription);
    }

    /// Attaches a consumer that only handles outcomes.
    pub fn subscribe_fn(&mut self, consumer: impl FnMut(SearchOutcome) + Send + 'static) {
        self.subscribe(Subscriber::on_next(consumer));
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Stops everything the pipeline started. Calling it again does nothing.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        self.receiver.clone().unsubscribe();
        debug!("search pipeline torn down");
    }
}

impl Drop for SearchPipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}
