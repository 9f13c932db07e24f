use survey_api_client::ApiClient;
use survey_core::{
    LocalPhoto, PipelineError, ProjectDescriptor, Survey, TransferState, TransferSummary,
};

use crate::checkpoint::CheckpointStore;
use crate::finalizer::Finalizer;
use crate::registrar::BatchRegistrar;
use crate::transfer::{ProgressObserver, TransferEngine};

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a run that reached finalization.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub project: ProjectDescriptor,
    pub summary: TransferSummary,
}

impl UploadReport {
    /// Every photo is on the server; `false` means the run finished with
    /// failed items that a `--continue` run will retry.
    pub fn is_complete(&self) -> bool {
        self.summary.is_complete()
    }
}

pub struct UploadPipeline {
    client: ApiClient,
    store: CheckpointStore,
}

impl UploadPipeline {
    pub fn new(client: ApiClient, store: CheckpointStore) -> Self {
        Self { client, store }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Runs authentication, registration, transfer and finalization in
    /// order. Any fatal error stops the run; per-photo failures do not.
    pub async fn run(
        &self,
        credentials: &Credentials,
        survey: &Survey,
        photos: &[LocalPhoto],
        resume: bool,
        observer: &dyn ProgressObserver,
    ) -> Result<UploadReport, PipelineError> {
        let session = self
            .client
            .authenticate(&credentials.username, &credentials.password)
            .await?;

        let registration = BatchRegistrar::new(&self.client, &self.store)
            .register(&session, survey, photos, resume)
            .await?;

        let summary = TransferEngine::new(&self.client, &self.store)
            .transfer(
                &session,
                &registration.plan,
                &registration.resume,
                observer,
            )
            .await;

        if let TransferState::Aborted { reason } = &summary.state {
            return Err(PipelineError::Aborted {
                reason: reason.clone(),
                summary: Box::new(summary),
            });
        }

        Finalizer::new(&self.client)
            .finalize(&session, &registration.plan.flight_id)
            .await?;

        if !summary.failed.is_empty() {
            tracing::warn!(
                failed = summary.failed.len(),
                total = summary.total,
                "Upload finished with failed photos; rerun with --continue to retry them"
            );
        }

        Ok(UploadReport {
            project: registration.project,
            summary,
        })
    }
}
