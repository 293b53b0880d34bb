//! Confirmation poller for mobile-money payments.
//!
//! After an STK push is accepted the payer approves (or abandons) it on
//! their handset, so the outcome arrives asynchronously. One cancellable
//! task per checkout reference drives the adapter's status check at a
//! fixed interval until it observes a terminal state or the ceiling
//! elapses. There are no detached timers: the whole schedule lives inside
//! the task, so a terminal transition or an explicit cancel stops it
//! deterministically, and a status check that completes after cancellation
//! cannot resurrect anything.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::payments::traits::PaymentProvider;
use crate::payments::types::TransactionState;

/// Final result of one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollOutcome {
    Succeeded,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between status checks.
    pub interval: Duration,
    /// Total time allowed from entering POLLING before giving up.
    pub ceiling: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            ceiling: Duration::from_secs(120),
        }
    }
}

struct ActivePoll {
    outcome: watch::Receiver<Option<PollOutcome>>,
    task: AbortHandle,
}

/// Tracks one poll loop per outstanding checkout reference.
pub struct ConfirmationPoller {
    config: PollerConfig,
    active: Arc<Mutex<HashMap<String, ActivePoll>>>,
}

impl ConfirmationPoller {
    pub fn new(config: PollerConfig) -> Self {
        Self {
            config,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts polling a reference, or subscribes to the loop already
    /// running for it — there is never more than one loop per reference.
    pub fn watch(&self, provider: Arc<dyn PaymentProvider>, reference: impl Into<String>) -> PollWatch {
        let reference = reference.into();
        let mut active = self.active.lock().expect("poller registry poisoned");

        if let Some(existing) = active.get(&reference) {
            return PollWatch {
                outcome: existing.outcome.clone(),
            };
        }

        let (tx, rx) = watch::channel(None);
        let config = self.config.clone();
        let registry = Arc::clone(&self.active);
        let key = reference.clone();
        let task = tokio::spawn(async move {
            let outcome = run_poll(provider, &key, &config).await;
            let _ = tx.send(Some(outcome));
            registry
                .lock()
                .expect("poller registry poisoned")
                .remove(&key);
        })
        .abort_handle();

        active.insert(
            reference,
            ActivePoll {
                outcome: rx.clone(),
                task,
            },
        );
        PollWatch { outcome: rx }
    }

    /// Stops the loop for a reference, if one is running. Subscribers see
    /// the watch close without an outcome.
    pub fn cancel(&self, reference: &str) -> bool {
        let removed = self
            .active
            .lock()
            .expect("poller registry poisoned")
            .remove(reference);
        match removed {
            Some(poll) => {
                poll.task.abort();
                info!(reference, "confirmation polling cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, reference: &str) -> bool {
        self.active
            .lock()
            .expect("poller registry poisoned")
            .contains_key(reference)
    }
}

/// Subscription to a poll loop's final outcome.
pub struct PollWatch {
    outcome: watch::Receiver<Option<PollOutcome>>,
}

impl PollWatch {
    /// Waits for the loop to finish. `None` means it was cancelled before
    /// reaching an outcome.
    pub async fn outcome(mut self) -> Option<PollOutcome> {
        loop {
            if let Some(outcome) = *self.outcome.borrow() {
                return Some(outcome);
            }
            if self.outcome.changed().await.is_err() {
                return *self.outcome.borrow();
            }
        }
    }
}

async fn run_poll(
    provider: Arc<dyn PaymentProvider>,
    reference: &str,
    config: &PollerConfig,
) -> PollOutcome {
    let started = Instant::now();
    let deadline = started + config.ceiling;
    // POLLING entry: the push is outstanding on the payer's handset.
    let mut state = TransactionState::Pending;
    let mut next_check = started + config.interval;

    loop {
        if next_check >= deadline {
            tokio::time::sleep_until(deadline).await;
            warn!(reference, "confirmation polling timed out");
            return PollOutcome::TimedOut;
        }
        tokio::time::sleep_until(next_check).await;
        next_check += config.interval;

        let observed = match provider.check_status(reference).await {
            Ok(observed) => observed,
            Err(err) => {
                // Transient gateway trouble; keep polling until the ceiling.
                warn!(reference, error = %err, "status check failed");
                continue;
            }
        };

        if observed == state {
            continue;
        }
        if !state.can_transition_to(observed) {
            warn!(reference, from = %state, to = %observed, "ignoring illegal state regression");
            continue;
        }
        state = observed;
        info!(reference, %state, "payment state advanced");

        match state {
            TransactionState::Succeeded => return PollOutcome::Succeeded,
            TransactionState::Failed | TransactionState::Expired => return PollOutcome::Failed,
            _ => {}
        }
    }
}
