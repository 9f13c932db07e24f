use survey_api_client::{ApiClient, Session};
use survey_core::FinalizeError;

/// Tells the service a flight's upload is finished.
pub struct Finalizer<'a> {
    client: &'a ApiClient,
}

impl<'a> Finalizer<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn finalize(&self, session: &Session, flight_id: &str) -> Result<(), FinalizeError> {
        self.client
            .mark_upload_complete(session, flight_id)
            .await
            .inspect_err(|e| {
                tracing::error!(flight_id = %flight_id, error = %e, "Upload finalization failed");
            })
    }
}
