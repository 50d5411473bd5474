//! Mock rate provider.
//!
//! Responses are served from a queue; once the queue is drained the last
//! response repeats. An optional delay (on the tokio clock) simulates a
//! slow upstream.

use async_trait::async_trait;
use rate_service::{ProviderError, RateProvider, RateQuote};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    responses: Mutex<VecDeque<Result<Vec<RateQuote>, ProviderError>>>,
    last: Mutex<Option<Result<Vec<RateQuote>, ProviderError>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

/// Queue-driven `RateProvider`. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockRateProvider {
    inner: Arc<Inner>,
}

impl MockRateProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    #[must_use]
    pub fn then_quotes(self, quotes: Vec<RateQuote>) -> Self {
        self.push(Ok(quotes));
        self
    }

    /// Queue a failed response.
    #[must_use]
    pub fn then_error(self, error: ProviderError) -> Self {
        self.push(Err(error));
        self
    }

    /// Delay every response by `delay`.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.inner.delay.lock().unwrap() = Some(delay);
        self
    }

    /// Queue a response after construction.
    pub fn push(&self, response: Result<Vec<RateQuote>, ProviderError>) {
        self.inner.responses.lock().unwrap().push_back(response);
    }

    /// Number of fetches so far.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateProvider for MockRateProvider {
    async fn fetch_current_rates(&self) -> Result<Vec<RateQuote>, ProviderError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.inner.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.inner.responses.lock().unwrap().pop_front();
        let mut last = self.inner.last.lock().unwrap();
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(ProviderError::Unreachable("no response queued".to_string()))),
        }
    }
}
