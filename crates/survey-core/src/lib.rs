//! Survey Uploader Core Library
//!
//! This crate provides the wire models, upload-plan types, error taxonomy,
//! configuration and checksum helpers shared by the API client, the upload
//! pipeline and the CLI.

pub mod checksum;
pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use checksum::content_md5;
pub use config::UploaderConfig;
pub use error::{
    AuthError, CheckpointError, FinalizeError, PipelineError, RegistrationError, TransferError,
};
pub use models::{
    BoundingBox, Camera, FailedItem, LocalPhoto, PhotoBatch, PhotoRecord, PhotoUploadItem,
    ProgressPointer, ProjectDescriptor, ResumePoint, Survey, TransferResult, TransferState,
    TransferSummary, UploadPlan,
};
