use std::collections::BTreeMap;

use survey_api_client::{ApiClient, PhotoPayload, Session};
use survey_core::{
    CheckpointError, FailedItem, PhotoUploadItem, ProgressPointer, ResumePoint, TransferError,
    TransferResult, TransferState, TransferSummary, UploadPlan,
};

use crate::checkpoint::CheckpointStore;

/// Receives the outcome of every attempted item.
pub trait ProgressObserver: Send + Sync {
    /// `fraction` is `(sequence_index + 1) / total`.
    fn on_item(&self, item: &PhotoUploadItem, fraction: f64, result: &TransferResult);
}

/// Reports progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ProgressObserver for LoggingObserver {
    fn on_item(&self, item: &PhotoUploadItem, fraction: f64, result: &TransferResult) {
        match result {
            TransferResult::Success => tracing::info!(
                server_id = %item.server_id,
                index = item.sequence_index,
                percent = fraction * 100.0,
                "Photo uploaded"
            ),
            TransferResult::Failure(reason) => tracing::warn!(
                server_id = %item.server_id,
                index = item.sequence_index,
                path = %item.local_path.display(),
                reason = %reason,
                "Photo upload failed"
            ),
        }
    }
}

/// Why a run stopped early.
enum Abort {
    Transfer(TransferError),
    Checkpoint(CheckpointError),
}

impl std::fmt::Display for Abort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transfer(e) => write!(f, "{}", e),
            Self::Checkpoint(e) => write!(f, "checkpoint write failed: {}", e),
        }
    }
}

/// Uploads the bytes of every planned photo, one at a time, keeping the
/// progress pointer and failed-item ledger on disk current after each item.
pub struct TransferEngine<'a> {
    client: &'a ApiClient,
    store: &'a CheckpointStore,
}

impl<'a> TransferEngine<'a> {
    pub fn new(client: &'a ApiClient, store: &'a CheckpointStore) -> Self {
        Self { client, store }
    }

    /// Attempts every item at or after `resume.start_index`, plus earlier
    /// items listed in `resume.retry`, in plan order. Failed items are
    /// recorded and skipped; an authorization failure or a checkpoint write
    /// failure aborts the run.
    pub async fn transfer(
        &self,
        session: &Session,
        plan: &UploadPlan,
        resume: &ResumePoint,
        observer: &dyn ProgressObserver,
    ) -> TransferSummary {
        let total = plan.len();
        let mut summary = TransferSummary {
            state: TransferState::Idle,
            total,
            attempted: Vec::new(),
            succeeded: 0,
            failed: Vec::new(),
        };

        let mut ledger: BTreeMap<usize, FailedItem> = BTreeMap::new();
        for failed in &resume.retry {
            match plan.items.get(failed.sequence_index) {
                Some(item) if item.server_id == failed.server_id => {
                    ledger.insert(failed.sequence_index, failed.clone());
                }
                _ => tracing::warn!(
                    server_id = %failed.server_id,
                    index = failed.sequence_index,
                    "Ignoring failed item that is not part of the upload plan"
                ),
            }
        }
        let mut pointer = resume.pointer.clone();

        let queue: Vec<&PhotoUploadItem> = plan
            .items
            .iter()
            .filter(|item| {
                item.sequence_index >= resume.start_index
                    || ledger.contains_key(&item.sequence_index)
            })
            .collect();

        tracing::info!(
            flight_id = %plan.flight_id,
            total = total,
            start_index = resume.start_index,
            queued = queue.len(),
            "Starting transfer"
        );
        summary.state = TransferState::Running;

        for item in queue {
            let outcome = self
                .transfer_one(session, item, total, &mut pointer, &mut ledger, observer, &mut summary)
                .await;
            if let Err(abort) = outcome {
                let reason = abort.to_string();
                tracing::error!(
                    server_id = %item.server_id,
                    index = item.sequence_index,
                    reason = %reason,
                    "Transfer aborted"
                );
                summary.state = TransferState::Aborted { reason };
                summary.failed = ledger.into_values().collect();
                return summary;
            }
        }

        summary.state = TransferState::Completed;
        summary.failed = ledger.into_values().collect();

        tracing::info!(
            flight_id = %plan.flight_id,
            succeeded = summary.succeeded,
            failed = summary.failed.len(),
            total = total,
            "Transfer finished"
        );
        summary
    }

    #[allow(clippy::too_many_arguments)]
    async fn transfer_one(
        &self,
        session: &Session,
        item: &PhotoUploadItem,
        total: usize,
        pointer: &mut Option<ProgressPointer>,
        ledger: &mut BTreeMap<usize, FailedItem>,
        observer: &dyn ProgressObserver,
        summary: &mut TransferSummary,
    ) -> Result<(), Abort> {
        if session.is_expired() {
            return Err(Abort::Transfer(TransferError::SessionExpired));
        }

        summary.attempted.push(item.server_id.clone());
        let fraction = (item.sequence_index + 1) as f64 / total as f64;

        match self.upload(session, item).await {
            Ok(()) => {
                summary.succeeded += 1;
                observer.on_item(item, fraction, &TransferResult::Success);

                let advances = pointer
                    .as_ref()
                    .map_or(true, |p| item.sequence_index > p.last_attempted_index);
                if advances {
                    let next = ProgressPointer::after(item, total);
                    self.store
                        .save_progress(&next)
                        .await
                        .map_err(Abort::Checkpoint)?;
                    *pointer = Some(next);
                }

                if ledger.remove(&item.sequence_index).is_some() {
                    self.save_ledger(ledger).await?;
                }
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                observer.on_item(item, fraction, &TransferResult::Failure(reason.clone()));
                ledger.insert(item.sequence_index, FailedItem::new(item, reason));
                self.save_ledger(ledger).await?;

                if e.is_fatal() {
                    return Err(Abort::Transfer(e));
                }
                Ok(())
            }
        }
    }

    async fn upload(&self, session: &Session, item: &PhotoUploadItem) -> Result<(), TransferError> {
        let bytes = tokio::fs::read(&item.local_path)
            .await
            .map_err(|source| TransferError::Io {
                path: item.local_path.clone(),
                source,
            })?;
        let payload = PhotoPayload::new(bytes);

        tracing::debug!(
            server_id = %item.server_id,
            index = item.sequence_index,
            size = payload.len(),
            md5 = %payload.md5(),
            "Uploading photo"
        );

        self.client
            .upload_photo(session, &item.server_id, payload)
            .await
    }

    async fn save_ledger(&self, ledger: &BTreeMap<usize, FailedItem>) -> Result<(), Abort> {
        let failed: Vec<FailedItem> = ledger.values().cloned().collect();
        self.store
            .save_failed(&failed)
            .await
            .map_err(Abort::Checkpoint)
    }
}
