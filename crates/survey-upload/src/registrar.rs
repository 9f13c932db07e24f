use survey_api_client::{ApiClient, Session};
use survey_core::{
    CheckpointError, LocalPhoto, PhotoBatch, PhotoRecord, ProjectDescriptor, RegistrationError,
    ResumePoint, Survey, UploadPlan,
};

use crate::checkpoint::{CheckpointStore, PROGRESS_FILE};

/// Outcome of registration: the project, the server-confirmed plan and the
/// point the transfer starts from.
#[derive(Debug, Clone)]
pub struct Registration {
    pub project: ProjectDescriptor,
    pub plan: UploadPlan,
    pub resume: ResumePoint,
    /// Survey the project was created from. On resume this is the stored
    /// copy, `None` when the folder holds no survey checkpoint.
    pub submitted: Option<Survey>,
}

/// Creates the project and registers the photo batch exactly once per
/// survey, persisting each server response before anything else happens.
pub struct BatchRegistrar<'a> {
    client: &'a ApiClient,
    store: &'a CheckpointStore,
}

impl<'a> BatchRegistrar<'a> {
    pub fn new(client: &'a ApiClient, store: &'a CheckpointStore) -> Self {
        Self { client, store }
    }

    /// Returns the upload plan for `photos`.
    ///
    /// With `resume` set and both project and plan checkpointed, no request
    /// is made: the stored plan is returned together with the stored
    /// progress pointer and failed-item ledger. With only the project
    /// checkpointed, the project is reused and only the batch is registered.
    /// A stored plan for another flight is discarded and the batch is
    /// registered again for the stored project.
    pub async fn register(
        &self,
        session: &Session,
        survey: &Survey,
        photos: &[LocalPhoto],
        resume: bool,
    ) -> Result<Registration, RegistrationError> {
        let stored_project = if resume {
            self.store.load_project().await?
        } else {
            None
        };

        let mut submitted = None;
        if let Some(project) = &stored_project {
            submitted = self.stored_survey(photos).await?;
            match self.store.load_upload_plan().await? {
                Some(plan) if plan.flight_id == project.flight_id() => {
                    return self.resume_stored(project.clone(), plan, submitted).await;
                }
                Some(plan) => {
                    tracing::warn!(
                        plan_flight = %plan.flight_id,
                        project_flight = %project.flight_id(),
                        "Discarding upload plan from another flight"
                    );
                    self.store.clear_plan().await?;
                }
                None => {}
            }
        }

        if photos.is_empty() {
            return Err(RegistrationError::NoPhotos);
        }

        let project = match stored_project {
            Some(project) => {
                tracing::info!(
                    project_id = %project.project_id(),
                    flight_id = %project.flight_id(),
                    "Reusing checkpointed project"
                );
                project
            }
            None => {
                self.store.save_survey(survey).await?;
                let project = self.client.create_project(session, survey).await?;
                self.store.save_project(&project).await?;
                // Plan, pointer and ledger of an earlier project must not
                // survive next to the new one.
                self.store.clear_plan().await?;
                submitted = Some(survey.clone());
                project
            }
        };

        let camera_id = project
            .primary_camera_id()
            .ok_or(RegistrationError::NoCamera)?;
        let records = photos
            .iter()
            .map(|photo| PhotoRecord::for_upload(photo, &project, camera_id))
            .collect();
        let batch = PhotoBatch::for_project(&project, records);

        let registered = self.client.register_photos(session, &batch).await?;
        let plan = UploadPlan::from_registered(&project, registered)?;
        if plan.len() != photos.len() {
            return Err(RegistrationError::MalformedResponse(format!(
                "registered {} photos, submitted {}",
                plan.len(),
                photos.len()
            )));
        }

        // A pointer or ledger left over from an earlier plan must not be
        // applied to this one.
        self.store.clear_progress().await?;
        self.store.save_upload_plan(&plan).await?;

        tracing::info!(
            flight_id = %plan.flight_id,
            photos = plan.len(),
            "Photo batch registered"
        );

        Ok(Registration {
            project,
            plan,
            resume: ResumePoint::fresh(),
            submitted,
        })
    }

    async fn resume_stored(
        &self,
        project: ProjectDescriptor,
        plan: UploadPlan,
        submitted: Option<Survey>,
    ) -> Result<Registration, RegistrationError> {
        let pointer = self.store.load_progress().await?;
        if let Some(pointer) = &pointer {
            if pointer.total_count != plan.len() {
                return Err(CheckpointError::corrupt(
                    self.store.path(PROGRESS_FILE),
                    format!(
                        "pointer total {} does not match plan length {}",
                        pointer.total_count,
                        plan.len()
                    ),
                )
                .into());
            }
        }
        let failed = self.store.load_failed().await?;
        let resume = ResumePoint::from_checkpoint(pointer, failed);

        tracing::info!(
            flight_id = %plan.flight_id,
            total = plan.len(),
            start_index = resume.start_index,
            retry = resume.retry.len(),
            "Resuming from checkpoint"
        );

        Ok(Registration {
            project,
            plan,
            resume,
            submitted,
        })
    }

    /// Loads the survey submitted by an earlier run and reports it against
    /// the photos found now.
    async fn stored_survey(&self, photos: &[LocalPhoto]) -> Result<Option<Survey>, RegistrationError> {
        let stored = self.store.load_survey().await?;
        match &stored {
            Some(survey) => {
                tracing::info!(
                    survey = %survey.name,
                    photos = survey.number_of_photos,
                    survey_date = %survey.survey_date,
                    "Resuming submitted survey"
                );
                if !photos.is_empty() && survey.number_of_photos != photos.len() {
                    tracing::warn!(
                        survey = %survey.name,
                        submitted = survey.number_of_photos,
                        found = photos.len(),
                        "Photo folder no longer matches the submitted survey"
                    );
                }
            }
            None => tracing::warn!("No submitted survey recorded in the checkpoint"),
        }
        Ok(stored)
    }
}
