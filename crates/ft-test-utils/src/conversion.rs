//! Conversion source and sink doubles.

use async_trait::async_trait;
use rate_service::tasks::{ConversionSink, ConversionSource};
use rate_service::{ConversionOutcome, ConversionRequest, SinkError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Channel-backed source that counts how many requests were pulled.
#[derive(Debug)]
pub struct CountingSource {
    receiver: mpsc::Receiver<ConversionRequest>,
    pulled: Arc<AtomicUsize>,
}

impl CountingSource {
    /// Returns the source, the sender feeding it, and a shared pull counter.
    #[must_use]
    pub fn channel(
        capacity: usize,
    ) -> (Self, mpsc::Sender<ConversionRequest>, Arc<AtomicUsize>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let pulled = Arc::new(AtomicUsize::new(0));
        (
            Self {
                receiver,
                pulled: Arc::clone(&pulled),
            },
            sender,
            pulled,
        )
    }
}

#[async_trait]
impl ConversionSource for CountingSource {
    async fn next_request(&mut self) -> Option<ConversionRequest> {
        let request = self.receiver.recv().await;
        if request.is_some() {
            self.pulled.fetch_add(1, Ordering::SeqCst);
        }
        request
    }
}

/// Sink that records every outcome. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    outcomes: Arc<Mutex<Vec<ConversionOutcome>>>,
    notify: Arc<tokio::sync::Notify>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes recorded so far, in publish order.
    pub fn outcomes(&self) -> Vec<ConversionOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    /// Wait until at least `count` outcomes are recorded.
    pub async fn wait_for(&self, count: usize) -> Vec<ConversionOutcome> {
        loop {
            let notified = self.notify.notified();
            {
                let outcomes = self.outcomes.lock().unwrap();
                if outcomes.len() >= count {
                    return outcomes.clone();
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ConversionSink for RecordingSink {
    async fn publish(&self, outcome: ConversionOutcome) -> Result<(), SinkError> {
        self.outcomes.lock().unwrap().push(outcome);
        self.notify.notify_waiters();
        Ok(())
    }
}
