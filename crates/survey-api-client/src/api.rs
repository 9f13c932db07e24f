//! Endpoint methods used by the upload pipeline.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use survey_core::{
    content_md5, FinalizeError, PhotoBatch, ProjectDescriptor, RegistrationError, Survey,
    TransferError,
};

use crate::retry::with_retry;
use crate::{ApiClient, Session};

pub const TOKEN_PATH: &str = "/dxauth/oauth2/token";
pub const SURVEY_PATH: &str = "/uisrv/projects/survey";
pub const PHOTOS_PATH: &str = "/dxpm/photos";

const JSON_ACCEPT: &str = "application/json, text/plain, */*";

pub fn photo_upload_path(server_id: &str) -> String {
    format!("/dxds/photos/jpg/{}", server_id)
}

pub fn upload_status_path(flight_id: &str) -> String {
    format!("/dxpm/flights/{}/uploads/status", flight_id)
}

/// Photo bytes together with their Content-MD5 value, lowercase hex.
#[derive(Clone, Debug)]
pub struct PhotoPayload {
    bytes: Vec<u8>,
    md5: String,
}

impl PhotoPayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        let md5 = content_md5(&bytes);
        Self { bytes, md5 }
    }

    pub fn md5(&self) -> &str {
        &self.md5
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Failure of a single JSON request, before it is mapped to a stage error.
#[derive(Debug)]
enum RequestFailure {
    Transport { message: String, connect: bool },
    Status { status: u16, body: String },
}

impl RequestFailure {
    fn from_reqwest(e: reqwest::Error) -> Self {
        Self::Transport {
            connect: e.is_connect(),
            message: e.to_string(),
        }
    }

    /// Registration creates server state, so only failures where the request
    /// cannot have been processed are repeated.
    fn registration_retryable(&self) -> bool {
        match self {
            Self::Transport { connect, .. } => *connect,
            Self::Status { status, .. } => *status == StatusCode::SERVICE_UNAVAILABLE.as_u16(),
        }
    }

    fn finalize_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
        }
    }
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport { message, .. } => write!(f, "{}", message),
            Self::Status { status, body } => write!(f, "status {}: {}", status, body),
        }
    }
}

impl ApiClient {
    async fn post_json<B: Serialize + ?Sized>(
        &self,
        session: &Session,
        path: &str,
        body: &B,
    ) -> Result<String, RequestFailure> {
        let url = self.build_url(path);
        let request = self
            .client
            .post(&url)
            .header(ACCEPT, JSON_ACCEPT)
            .timeout(self.options.request_timeout)
            .json(body);
        let response = self
            .apply_session(request, session)
            .send()
            .await
            .map_err(RequestFailure::from_reqwest)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(RequestFailure::from_reqwest)?;

        if !status.is_success() {
            return Err(RequestFailure::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }

    /// Creates the project, mission and flight for `survey`.
    pub async fn create_project(
        &self,
        session: &Session,
        survey: &Survey,
    ) -> Result<ProjectDescriptor, RegistrationError> {
        tracing::info!(
            survey = %survey.name,
            photos = survey.number_of_photos,
            "Creating survey project"
        );

        let body = with_retry(
            &self.options.retry,
            "create_project",
            RequestFailure::registration_retryable,
            move || self.post_json(session, SURVEY_PATH, survey),
        )
        .await
        .map_err(|e| match e {
            RequestFailure::Status { status, body } => {
                RegistrationError::ProjectCreationFailed { status, body }
            }
            RequestFailure::Transport { message, .. } => RegistrationError::Transport(message),
        })?;

        let project: ProjectDescriptor = serde_json::from_str(&body).map_err(|e| {
            RegistrationError::MalformedResponse(format!("project creation response: {}", e))
        })?;

        tracing::info!(
            project_id = %project.project_id(),
            mission_id = %project.mission_id(),
            flight_id = %project.flight_id(),
            "Survey project created"
        );

        Ok(project)
    }

    /// Registers photo metadata. The response lists the same photos, in
    /// response order, with their server-assigned ids.
    pub async fn register_photos(
        &self,
        session: &Session,
        batch: &PhotoBatch,
    ) -> Result<PhotoBatch, RegistrationError> {
        tracing::info!(photos = batch.photos.len(), "Registering photo batch");

        let body = with_retry(
            &self.options.retry,
            "register_photos",
            RequestFailure::registration_retryable,
            move || self.post_json(session, PHOTOS_PATH, batch),
        )
        .await
        .map_err(|e| match e {
            RequestFailure::Status { status, body } => {
                RegistrationError::BatchCreationFailed { status, body }
            }
            RequestFailure::Transport { message, .. } => RegistrationError::Transport(message),
        })?;

        serde_json::from_str(&body).map_err(|e| {
            RegistrationError::MalformedResponse(format!("photo batch response: {}", e))
        })
    }

    /// Uploads the bytes of one registered photo. Not retried here; a failed
    /// photo is recorded by the caller and retried on a later run.
    pub async fn upload_photo(
        &self,
        session: &Session,
        server_id: &str,
        payload: PhotoPayload,
    ) -> Result<(), TransferError> {
        let url = self.build_url(&photo_upload_path(server_id));
        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(ACCEPT, "*/*")
            .header("Content-MD5", payload.md5.as_str())
            .timeout(self.options.upload_timeout)
            .body(payload.bytes);
        let response = self
            .apply_session(request, session)
            .send()
            .await
            .map_err(|e| TransferError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        if status == StatusCode::UNAUTHORIZED {
            return Err(TransferError::Unauthorized { body });
        }
        Err(TransferError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    /// Marks the flight's upload as complete so server-side processing can
    /// start. Safe to repeat.
    pub async fn mark_upload_complete(
        &self,
        session: &Session,
        flight_id: &str,
    ) -> Result<(), FinalizeError> {
        let body = serde_json::json!({
            "_id": flight_id,
            "status": "complete",
        });
        let path = upload_status_path(flight_id);
        let (path, body) = (path.as_str(), &body);

        with_retry(
            &self.options.retry,
            "mark_upload_complete",
            RequestFailure::finalize_retryable,
            move || self.post_json(session, path, body),
        )
        .await
        .map_err(|e| match e {
            RequestFailure::Status { status, body } => FinalizeError::Rejected { status, body },
            RequestFailure::Transport { message, .. } => FinalizeError::Transport(message),
        })?;

        tracing::info!(flight_id = %flight_id, "Upload marked complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_embed_ids() {
        assert_eq!(photo_upload_path("abc"), "/dxds/photos/jpg/abc");
        assert_eq!(upload_status_path("f1"), "/dxpm/flights/f1/uploads/status");
    }

    #[test]
    fn payload_checksum_matches_bytes() {
        let payload = PhotoPayload::new(b"jk8ssl".to_vec());
        assert_eq!(payload.md5(), "0000000018e6137ac2caab16074784a6");
        assert_eq!(payload.len(), 6);
    }

    #[test]
    fn registration_retries_only_unprocessed_requests() {
        let unavailable = RequestFailure::Status {
            status: 503,
            body: String::new(),
        };
        let server_error = RequestFailure::Status {
            status: 500,
            body: String::new(),
        };
        let reset = RequestFailure::Transport {
            message: "reset".into(),
            connect: false,
        };
        assert!(unavailable.registration_retryable());
        assert!(!server_error.registration_retryable());
        assert!(!reset.registration_retryable());

        assert!(server_error.finalize_retryable());
        assert!(reset.finalize_retryable());
        assert!(!RequestFailure::Status {
            status: 404,
            body: String::new()
        }
        .finalize_retryable());
    }
}
