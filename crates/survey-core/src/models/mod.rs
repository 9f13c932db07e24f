//! Wire DTOs exchanged with the project-management service and the
//! upload-plan types persisted between runs.

pub mod auth;
pub mod photo;
pub mod project;
pub mod survey;
pub mod upload;

pub use auth::{OAuthRequest, OAuthResponse};
pub use photo::{LocalPhoto, PhotoBatch, PhotoGeometry, PhotoRecord};
pub use project::{EntityId, ProjectDescriptor};
pub use survey::{BoundingBox, Camera, Geometries, Inspection, Polygon, ProcessSettings, Survey};
pub use upload::{
    FailedItem, PhotoUploadItem, ProgressPointer, ResumePoint, TransferResult, TransferState,
    TransferSummary, UploadPlan,
};
