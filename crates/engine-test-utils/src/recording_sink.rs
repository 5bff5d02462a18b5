//! Outcome sink that records events in memory.

use match_engine::outcome::{MatchOutcomeRecorded, OutcomeSink};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Keeps every recorded outcome, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MatchOutcomeRecorded>>,
    recorded: Notify,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<MatchOutcomeRecorded> {
        self.events.lock().unwrap().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` events were recorded.
    ///
    /// # Panics
    ///
    /// Panics if they do not arrive within five seconds.
    pub async fn wait_for(&self, count: usize) -> Vec<MatchOutcomeRecorded> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.recorded.notified();
                if self.len() >= count {
                    return self.events();
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for outcome events")
    }
}

#[async_trait::async_trait]
impl OutcomeSink for RecordingSink {
    async fn record(&self, event: MatchOutcomeRecorded) {
        self.events.lock().unwrap().push(event);
        self.recorded.notify_waiters();
    }
}
