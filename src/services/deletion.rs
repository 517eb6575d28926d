// Deletion worker
// Photos evicted from the undo window are committed as intents. The worker deletes them
// off the caller's task, retries with linear backoff and reports every outcome back.

use crate::services::media::MediaSource;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DeletionError {
    #[error("Deletion worker has stopped")]
    WorkerStopped,

    #[error("Deletion worker panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionIntent {
    pub batch_id: Uuid,
    pub photo_ids: Vec<String>,
    /// Bytes the batch frees.
    pub bytes: u64,
}

impl DeletionIntent {
    pub fn new(photo_ids: Vec<String>, bytes: u64) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            photo_ids,
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Committed {
        intent: DeletionIntent,
        attempts: u32,
    },
    Failed {
        intent: DeletionIntent,
        attempts: u32,
        error: String,
    },
}

impl DeletionOutcome {
    pub fn intent(&self) -> &DeletionIntent {
        match self {
            DeletionOutcome::Committed { intent, .. } | DeletionOutcome::Failed { intent, .. } => intent,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DeletionOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

pub struct DeletionWorker {
    intents: mpsc::UnboundedSender<DeletionIntent>,
    outcomes: mpsc::UnboundedReceiver<DeletionOutcome>,
    handle: JoinHandle<()>,
}

impl DeletionWorker {
    /// Must be called inside a tokio runtime.
    pub fn spawn(media: Arc<dyn MediaSource>, policy: RetryPolicy) -> Self {
        let (intent_tx, mut intent_rx) = mpsc::unbounded_channel::<DeletionIntent>();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Some(intent) = intent_rx.recv().await {
                let outcome = execute(media.clone(), policy, intent).await;
                if outcome_tx.send(outcome).is_err() {
                    break;
                }
            }
            log::debug!("Deletion worker stopped");
        });

        Self {
            intents: intent_tx,
            outcomes: outcome_rx,
            handle,
        }
    }

    pub fn submit(&self, intent: DeletionIntent) -> Result<(), DeletionError> {
        log::debug!(
            "Queueing deletion batch {} ({} photo(s))",
            intent.batch_id,
            intent.photo_ids.len()
        );
        self.intents
            .send(intent)
            .map_err(|_| DeletionError::WorkerStopped)
    }

    /// Outcomes reported so far, without waiting.
    pub fn drain_outcomes(&mut self) -> Vec<DeletionOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(outcome) = self.outcomes.try_recv() {
            outcomes.push(outcome);
        }
        outcomes
    }

    pub async fn next_outcome(&mut self) -> Option<DeletionOutcome> {
        self.outcomes.recv().await
    }

    /// Stops accepting work, finishes queued batches and returns their outcomes.
    pub async fn shutdown(self) -> Result<Vec<DeletionOutcome>, DeletionError> {
        let DeletionWorker {
            intents,
            mut outcomes,
            handle,
        } = self;
        drop(intents);
        handle.await?;

        let mut remaining = Vec::new();
        while let Some(outcome) = outcomes.recv().await {
            remaining.push(outcome);
        }
        Ok(remaining)
    }
}

async fn execute(media: Arc<dyn MediaSource>, policy: RetryPolicy, intent: DeletionIntent) -> DeletionOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let source = media.clone();
        let ids = intent.photo_ids.clone();
        let result = tokio::task::spawn_blocking(move || source.bulk_delete(&ids)).await;

        match result {
            Ok(Ok(())) => {
                log::info!(
                    "Committed deletion batch {} ({} photo(s), {} bytes)",
                    intent.batch_id,
                    intent.photo_ids.len(),
                    intent.bytes
                );
                return DeletionOutcome::Committed { intent, attempts: attempt };
            }
            Ok(Err(e)) => last_error = e.to_string(),
            Err(e) => last_error = e.to_string(),
        }

        log::warn!(
            "Deletion batch {} failed (attempt {}/{}): {}",
            intent.batch_id,
            attempt,
            max_attempts,
            last_error
        );
        if attempt < max_attempts {
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }
    }

    log::error!(
        "Giving up on deletion batch {}; {} photo(s) remain in the library",
        intent.batch_id,
        intent.photo_ids.len()
    );
    DeletionOutcome::Failed {
        intent,
        attempts: max_attempts,
        error: last_error,
    }
}
