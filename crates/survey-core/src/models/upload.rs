use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::photo::PhotoBatch;
use super::project::ProjectDescriptor;
use crate::error::RegistrationError;

/// One registered photo: the server id it was assigned and the local file
/// whose bytes belong to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoUploadItem {
    pub server_id: String,
    pub local_path: PathBuf,
    pub sequence_index: usize,
}

/// Server-confirmed upload plan. Order and ids are fixed at registration and
/// reused verbatim by every resumed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPlan {
    pub project_id: String,
    pub mission_id: String,
    pub flight_id: String,
    pub items: Vec<PhotoUploadItem>,
}

impl UploadPlan {
    /// Builds the plan from a batch registration response, in response order.
    pub fn from_registered(
        project: &ProjectDescriptor,
        batch: PhotoBatch,
    ) -> Result<Self, RegistrationError> {
        let mut items = Vec::with_capacity(batch.photos.len());
        for (sequence_index, photo) in batch.photos.into_iter().enumerate() {
            let server_id = photo.id.ok_or_else(|| {
                RegistrationError::MalformedResponse(format!(
                    "photo {} has no server id",
                    sequence_index
                ))
            })?;
            let local_path = photo.seq.ok_or_else(|| {
                RegistrationError::MalformedResponse(format!(
                    "photo {} ({}) has no local path",
                    sequence_index, server_id
                ))
            })?;
            items.push(PhotoUploadItem {
                server_id,
                local_path: PathBuf::from(local_path),
                sequence_index,
            });
        }

        if items.is_empty() {
            return Err(RegistrationError::MalformedResponse(
                "registration returned no photos".to_string(),
            ));
        }

        Ok(Self {
            project_id: project.project_id().to_string(),
            mission_id: project.mission_id().to_string(),
            flight_id: project.flight_id().to_string(),
            items,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn server_ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.server_id.as_str())
    }
}

/// Where a transfer run has got to. Only successful items move it.
///
/// Persisted as the single line `serverId,index,total`, where `index` is the
/// number of plan items up to and including the last successful one, which is
/// also the index the next run starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressPointer {
    pub last_attempted_index: usize,
    pub total_count: usize,
    pub last_server_id: String,
}

impl ProgressPointer {
    pub fn after(item: &PhotoUploadItem, total_count: usize) -> Self {
        Self {
            last_attempted_index: item.sequence_index,
            total_count,
            last_server_id: item.server_id.clone(),
        }
    }

    pub fn resume_index(&self) -> usize {
        self.last_attempted_index + 1
    }

    pub fn to_line(&self) -> String {
        format!(
            "{},{},{}",
            self.last_server_id,
            self.resume_index(),
            self.total_count
        )
    }

    pub fn parse_line(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let mut fields = line.rsplitn(3, ',');
        let total = fields.next();
        let index = fields.next();
        let server_id = fields.next();

        let (Some(total), Some(index), Some(server_id)) = (total, index, server_id) else {
            return Err(format!("expected 'serverId,index,total', got '{}'", line));
        };
        let total_count: usize = total
            .trim()
            .parse()
            .map_err(|e| format!("invalid total '{}': {}", total, e))?;
        let index: usize = index
            .trim()
            .parse()
            .map_err(|e| format!("invalid index '{}': {}", index, e))?;
        if index == 0 || index > total_count {
            return Err(format!("index {} out of range 1..={}", index, total_count));
        }
        if server_id.trim().is_empty() {
            return Err("empty server id".to_string());
        }

        Ok(Self {
            last_attempted_index: index - 1,
            total_count,
            last_server_id: server_id.trim().to_string(),
        })
    }
}

/// A plan item whose latest transfer attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub sequence_index: usize,
    pub server_id: String,
    pub local_path: PathBuf,
    pub reason: String,
}

impl FailedItem {
    pub fn new(item: &PhotoUploadItem, reason: impl Into<String>) -> Self {
        Self {
            sequence_index: item.sequence_index,
            server_id: item.server_id.clone(),
            local_path: item.local_path.clone(),
            reason: reason.into(),
        }
    }
}

/// Outcome of a single item transfer, as reported to the progress observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferResult {
    Success,
    Failure(String),
}

impl TransferResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Running,
    Completed,
    Aborted { reason: String },
}

/// Starting point of a transfer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumePoint {
    /// First plan index the run attempts.
    pub start_index: usize,
    /// Pointer persisted by a previous run, if any.
    pub pointer: Option<ProgressPointer>,
    /// Items that failed in a previous run; retried in plan order.
    pub retry: Vec<FailedItem>,
}

impl ResumePoint {
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn from_checkpoint(pointer: Option<ProgressPointer>, retry: Vec<FailedItem>) -> Self {
        Self {
            start_index: pointer.as_ref().map_or(0, ProgressPointer::resume_index),
            pointer,
            retry,
        }
    }
}

/// Result of a transfer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub state: TransferState,
    pub total: usize,
    /// Server ids in the order they were attempted.
    pub attempted: Vec<String>,
    pub succeeded: usize,
    /// Items still failed when the run ended, in plan order.
    pub failed: Vec<FailedItem>,
}

impl TransferSummary {
    /// Every item uploaded and nothing left to retry.
    pub fn is_complete(&self) -> bool {
        self.state == TransferState::Completed && self.failed.is_empty()
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.state, TransferState::Aborted { .. })
    }
}
