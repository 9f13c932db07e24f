//! File-based checkpoint store.
//!
//! All state needed to resume an interrupted upload lives next to the photos:
//!
//! | file | content |
//! |---|---|
//! | `upload_createdSurvey` | survey submitted for project creation (JSON) |
//! | `upload_createdProject` | created project, mission and flight (JSON) |
//! | `upload_project_template` | server-confirmed upload plan (JSON) |
//! | `upload_project_progress` | progress pointer, `serverId,index,total` |
//! | `upload_project_failed` | failed-item ledger (JSON) |
//!
//! Writes go to a hidden temporary sibling which is fsynced and then renamed
//! over the target, so a crash mid-write leaves the previous file intact.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use survey_core::{CheckpointError, FailedItem, ProgressPointer, ProjectDescriptor, Survey, UploadPlan};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const SURVEY_FILE: &str = "upload_createdSurvey";
pub const PROJECT_FILE: &str = "upload_createdProject";
pub const PLAN_FILE: &str = "upload_project_template";
pub const PROGRESS_FILE: &str = "upload_project_progress";
pub const FAILED_FILE: &str = "upload_project_failed";

#[derive(Clone, Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub async fn save_survey(&self, survey: &Survey) -> Result<(), CheckpointError> {
        self.save_json(SURVEY_FILE, survey).await
    }

    pub async fn load_survey(&self) -> Result<Option<Survey>, CheckpointError> {
        self.load_json(SURVEY_FILE).await
    }

    pub async fn save_project(&self, project: &ProjectDescriptor) -> Result<(), CheckpointError> {
        self.save_json(PROJECT_FILE, project).await
    }

    pub async fn load_project(&self) -> Result<Option<ProjectDescriptor>, CheckpointError> {
        self.load_json(PROJECT_FILE).await
    }

    pub async fn save_upload_plan(&self, plan: &UploadPlan) -> Result<(), CheckpointError> {
        self.save_json(PLAN_FILE, plan).await
    }

    pub async fn load_upload_plan(&self) -> Result<Option<UploadPlan>, CheckpointError> {
        self.load_json(PLAN_FILE).await
    }

    pub async fn save_progress(&self, pointer: &ProgressPointer) -> Result<(), CheckpointError> {
        self.write_atomic(PROGRESS_FILE, pointer.to_line().as_bytes())
            .await
    }

    /// An empty progress file is treated as absent.
    pub async fn load_progress(&self) -> Result<Option<ProgressPointer>, CheckpointError> {
        let Some(contents) = self.read_optional(PROGRESS_FILE).await? else {
            return Ok(None);
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }
        ProgressPointer::parse_line(&contents)
            .map(Some)
            .map_err(|reason| CheckpointError::corrupt(self.path(PROGRESS_FILE), reason))
    }

    pub async fn save_failed(&self, failed: &[FailedItem]) -> Result<(), CheckpointError> {
        self.save_json(FAILED_FILE, failed).await
    }

    pub async fn load_failed(&self) -> Result<Vec<FailedItem>, CheckpointError> {
        Ok(self.load_json(FAILED_FILE).await?.unwrap_or_default())
    }

    /// Removes the progress pointer and the failed-item ledger.
    pub async fn clear_progress(&self) -> Result<(), CheckpointError> {
        self.remove_files(&[PROGRESS_FILE, FAILED_FILE]).await
    }

    /// Removes the upload plan together with its pointer and ledger. The
    /// project and survey files are kept.
    pub async fn clear_plan(&self) -> Result<(), CheckpointError> {
        self.remove_files(&[PLAN_FILE, PROGRESS_FILE, FAILED_FILE]).await
    }

    async fn remove_files(&self, names: &[&str]) -> Result<(), CheckpointError> {
        for name in names {
            let path = self.path(name);
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CheckpointError::io(path, e)),
            }
        }
        Ok(())
    }

    async fn save_json<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<(), CheckpointError> {
        let contents = serde_json::to_vec_pretty(value)
            .map_err(|e| CheckpointError::io(self.path(name), e.into()))?;
        self.write_atomic(name, &contents).await
    }

    async fn load_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, CheckpointError> {
        let Some(contents) = self.read_optional(name).await? else {
            return Ok(None);
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| CheckpointError::corrupt(self.path(name), e))
    }

    async fn read_optional(&self, name: &str) -> Result<Option<String>, CheckpointError> {
        let path = self.path(name);
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CheckpointError::io(path, e)),
        }
    }

    async fn write_atomic(&self, name: &str, contents: &[u8]) -> Result<(), CheckpointError> {
        let target = self.path(name);
        let tmp = self.path(&format!(".{}.tmp", name));

        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| CheckpointError::io(&tmp, e))?;
        file.write_all(contents)
            .await
            .map_err(|e| CheckpointError::io(&tmp, e))?;
        file.sync_all()
            .await
            .map_err(|e| CheckpointError::io(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &target)
            .await
            .map_err(|e| CheckpointError::io(&target, e))?;

        tracing::debug!(
            path = %target.display(),
            size = contents.len(),
            "Checkpoint written"
        );
        Ok(())
    }
}
