use serde::{Deserialize, Serialize};

use super::survey::Camera;

/// Reference to a server entity. Only the id is kept; other fields in the
/// service response are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityId {
    #[serde(rename = "_id")]
    pub id: String,
}

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Project, mission and flight created for a survey, plus the cameras the
/// service registered for it. Deserializes directly from the
/// `POST /uisrv/projects/survey` response; a response missing any of the
/// three ids fails to parse instead of defaulting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub project: EntityId,
    pub mission: EntityId,
    pub flight: EntityId,
    #[serde(default)]
    pub cameras: Vec<Camera>,
}

impl ProjectDescriptor {
    pub fn project_id(&self) -> &str {
        &self.project.id
    }

    pub fn mission_id(&self) -> &str {
        &self.mission.id
    }

    pub fn flight_id(&self) -> &str {
        &self.flight.id
    }

    /// Id of the first registered camera. Photos are attributed to it.
    pub fn primary_camera_id(&self) -> Option<&str> {
        self.cameras.first().and_then(|c| c.id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_response_ignoring_extra_fields() {
        let body = r#"{
            "project": {"_id": "p1", "name": "field-7", "users": []},
            "mission": {"_id": "m1"},
            "flight": {"_id": "f1", "status": "created"},
            "cameras": [{"_id": "c1", "model": "SONY", "focalLength": 24}]
        }"#;
        let descriptor: ProjectDescriptor = serde_json::from_str(body).unwrap();
        assert_eq!(descriptor.project_id(), "p1");
        assert_eq!(descriptor.mission_id(), "m1");
        assert_eq!(descriptor.flight_id(), "f1");
        assert_eq!(descriptor.primary_camera_id(), Some("c1"));
    }

    #[test]
    fn missing_flight_id_is_an_error() {
        let body = r#"{"project": {"_id": "p1"}, "mission": {"_id": "m1"}, "flight": {}}"#;
        assert!(serde_json::from_str::<ProjectDescriptor>(body).is_err());
    }

    #[test]
    fn camera_without_id_is_not_primary() {
        let body = r#"{
            "project": {"_id": "p1"}, "mission": {"_id": "m1"}, "flight": {"_id": "f1"},
            "cameras": [{"model": "SONY"}]
        }"#;
        let descriptor: ProjectDescriptor = serde_json::from_str(body).unwrap();
        assert_eq!(descriptor.primary_camera_id(), None);
    }
}
